use std::io;

use thiserror::Error;

/// A hostname that cannot be turned into a wire-format name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("hostname is empty")]
    EmptyName,

    #[error("hostname {0:?} contains an empty label")]
    EmptyLabel(String),

    #[error("label {label:?} is {len} bytes, at most 63 allowed")]
    LabelTooLong { label: String, len: usize },

    #[error("encoded name is {0} bytes, at most 255 allowed")]
    NameTooLong(usize),

    #[error("hostname {0:?} contains non-ASCII characters")]
    NonAscii(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("receive timeout must be greater than zero")]
    ZeroTimeout,

    #[error("{0} buffer size must be greater than zero")]
    ZeroBuffer(&'static str),
}

/// Failure of a single send/receive attempt. Timeouts are not errors and
/// are reported through `ResolutionOutcome::TimedOut` instead.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("socket setup failed: {0}")]
    Setup(#[source] io::Error),

    #[error("send failed: {0}")]
    Send(#[source] io::Error),

    #[error("receive failed: {0}")]
    Receive(#[source] io::Error),

    #[error("query of {len} bytes is outside 1..={max}")]
    InvalidQuery { len: usize, max: usize },
}

/// Problems found while inspecting a received reply.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
    #[error("reply truncated at offset {0}")]
    Truncated(usize),

    #[error("reply id {actual:#06x} does not match query id {expected:#06x}")]
    IdMismatch { expected: u16, actual: u16 },

    #[error("message is a query, not a response")]
    NotAResponse,

    #[error("reply echoes a different question for {0:?}")]
    QuestionMismatch(String),

    #[error("bad compression pointer at offset {0}")]
    BadPointer(usize),

    #[error("label at offset {0} is not valid UTF-8")]
    BadLabel(usize),
}
