pub mod name;

use std::fmt;

use byteorder::{ByteOrder, NetworkEndian};
use tracing::trace;

use crate::error::{EncodingError, ResponseError};

pub const HEADER_LEN: usize = 12;
pub const CLASS_IN: u16 = 1;

pub const FLAG_QR: u16 = 0x8000;
pub const FLAG_RD: u16 = 0x0100;
const RCODE_MASK: u16 = 0x000F;

/// The record types this resolver knows how to ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    A,
    Mx,
}

impl QueryType {
    pub fn code(self) -> u16 {
        match self {
            QueryType::A => 1,
            QueryType::Mx => 15,
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QueryType::A => f.write_str("A"),
            QueryType::Mx => f.write_str("MX"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsHeader {
    pub transaction_id: u16,
    pub flags: u16,
    pub question_rr_count: u16,
    pub answer_rr_count: u16,
    pub authority_rr_count: u16,
    pub additional_rr_count: u16,
}

impl DnsHeader {
    fn query(transaction_id: u16, flags: u16) -> DnsHeader {
        DnsHeader {
            transaction_id,
            flags,
            question_rr_count: 1,
            answer_rr_count: 0,
            authority_rr_count: 0,
            additional_rr_count: 0,
        }
    }

    pub fn parse(buf: &[u8]) -> Result<DnsHeader, ResponseError> {
        if buf.len() < HEADER_LEN {
            return Err(ResponseError::Truncated(buf.len()));
        }
        Ok(DnsHeader {
            transaction_id: NetworkEndian::read_u16(&buf[0..2]),
            flags: NetworkEndian::read_u16(&buf[2..4]),
            question_rr_count: NetworkEndian::read_u16(&buf[4..6]),
            answer_rr_count: NetworkEndian::read_u16(&buf[6..8]),
            authority_rr_count: NetworkEndian::read_u16(&buf[8..10]),
            additional_rr_count: NetworkEndian::read_u16(&buf[10..12]),
        })
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        NetworkEndian::write_u16(&mut buf[0..2], self.transaction_id);
        NetworkEndian::write_u16(&mut buf[2..4], self.flags);
        NetworkEndian::write_u16(&mut buf[4..6], self.question_rr_count);
        NetworkEndian::write_u16(&mut buf[6..8], self.answer_rr_count);
        NetworkEndian::write_u16(&mut buf[8..10], self.authority_rr_count);
        NetworkEndian::write_u16(&mut buf[10..12], self.additional_rr_count);
        buf
    }

    pub fn is_response(&self) -> bool {
        self.flags & FLAG_QR != 0
    }

    pub fn rcode(&self) -> u8 {
        (self.flags & RCODE_MASK) as u8
    }

    /// Checks that this header belongs to a reply to `query`.
    pub fn check_reply_to(&self, query: &DnsQuery) -> Result<(), ResponseError> {
        if self.transaction_id != query.id() {
            return Err(ResponseError::IdMismatch {
                expected: query.id(),
                actual: self.transaction_id,
            });
        }
        if !self.is_response() {
            return Err(ResponseError::NotAResponse);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct QueryQuestion {
    name: String,
    encoded_name: Vec<u8>,
    qtype: QueryType,
}

impl QueryQuestion {
    fn encode(&self, buffer: &mut Vec<u8>) {
        let mut tail = [0u8; 4];
        NetworkEndian::write_u16(&mut tail[0..2], self.qtype.code());
        NetworkEndian::write_u16(&mut tail[2..4], CLASS_IN);
        buffer.extend_from_slice(&self.encoded_name);
        buffer.extend_from_slice(&tail);
    }
}

/// A question as read back off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: String,
    pub qtype: u16,
    pub qclass: u16,
}

impl Question {
    /// Parses the question starting at `start`, returning it together with
    /// the offset just past it.
    pub fn parse(message: &[u8], start: usize) -> Result<(Question, usize), ResponseError> {
        let (name, pos) = name::decode_name(message, start)?;
        let fixed = message
            .get(pos..pos + 4)
            .ok_or(ResponseError::Truncated(message.len()))?;
        let question = Question {
            name,
            qtype: NetworkEndian::read_u16(&fixed[0..2]),
            qclass: NetworkEndian::read_u16(&fixed[2..4]),
        };
        Ok((question, pos + 4))
    }

    pub fn labels(&self) -> Vec<&str> {
        self.name.split('.').collect()
    }
}

/// An outbound query: one header and exactly one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuery {
    header: DnsHeader,
    question: QueryQuestion,
}

impl DnsQuery {
    /// Builds a query with a caller-chosen transaction id. The hostname is
    /// validated and encoded here, so encoding the packet later cannot fail.
    pub fn new(transaction_id: u16, hostname: &str, qtype: QueryType) -> Result<DnsQuery, EncodingError> {
        let encoded_name = name::encode_name(hostname)?;
        Ok(DnsQuery {
            //Plain iterative query, all flags clear
            header: DnsHeader::query(transaction_id, 0),
            question: QueryQuestion {
                name: hostname.to_string(),
                encoded_name,
                qtype,
            },
        })
    }

    /// Address (A) query with a fresh random transaction id.
    pub fn addr_query(hostname: &str) -> Result<DnsQuery, EncodingError> {
        DnsQuery::new(rand::random::<u16>(), hostname, QueryType::A)
    }

    /// Mail exchanger (MX) query with a fresh random transaction id.
    pub fn mx_query(hostname: &str) -> Result<DnsQuery, EncodingError> {
        DnsQuery::new(rand::random::<u16>(), hostname, QueryType::Mx)
    }

    /// Asks the server to recurse on our behalf.
    pub fn with_recursion(mut self) -> DnsQuery {
        self.header.flags |= FLAG_RD;
        self
    }

    pub fn id(&self) -> u16 {
        self.header.transaction_id
    }

    pub fn header(&self) -> &DnsHeader {
        &self.header
    }

    pub fn hostname(&self) -> &str {
        &self.question.name
    }

    pub fn query_type(&self) -> QueryType {
        self.question.qtype
    }

    /// Length of the packet `encode_packet` produces.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.question.encoded_name.len() + 4
    }

    pub fn encode_packet(&self) -> Vec<u8> {
        trace!(query = ?self, "encoding packet");
        let mut buffer = Vec::with_capacity(self.encoded_len());
        buffer.extend_from_slice(&self.header.encode());
        self.question.encode(&mut buffer);
        buffer
    }
}

/// Encodes an A query for `hostname` with the given transaction id.
pub fn encode_query(hostname: &str, transaction_id: u16) -> Result<Vec<u8>, EncodingError> {
    Ok(DnsQuery::new(transaction_id, hostname, QueryType::A)?.encode_packet())
}

/// What can be said about a reply without parsing its records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplySummary {
    pub header: DnsHeader,
    pub question: Option<Question>,
}

/// Checks that `reply` answers `query` and reads back its echoed question.
///
/// Resource records are left alone.
pub fn inspect_reply(query: &DnsQuery, reply: &[u8]) -> Result<ReplySummary, ResponseError> {
    let header = DnsHeader::parse(reply)?;
    header.check_reply_to(query)?;

    let question = if header.question_rr_count > 0 {
        let (question, _) = Question::parse(reply, HEADER_LEN)?;
        let same_name = question
            .name
            .trim_end_matches('.')
            .eq_ignore_ascii_case(query.hostname().trim_end_matches('.'));
        if !same_name || question.qtype != query.query_type().code() {
            return Err(ResponseError::QuestionMismatch(question.name));
        }
        Some(question)
    } else {
        None
    };

    Ok(ReplySummary { header, question })
}
