//! A tiny DNS client: builds a query for a hostname, fires it at a
//! nameserver over UDP and waits a bounded time for whatever comes back.

pub mod config;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod session;

pub use config::{NameserverEndpoint, ResolverConfig};
pub use error::{ConfigError, EncodingError, ResponseError, TransportError};
pub use protocol::{encode_query, inspect_reply, DnsQuery, QueryType};
pub use session::{resolve, ResolutionOutcome, ResolverSession};
