use std::str;

use crate::error::{EncodingError, ResponseError};

pub const MAX_LABEL_LEN: usize = 63;
pub const MAX_NAME_LEN: usize = 255;

//Top two bits of a length byte set means "pointer", only ever seen in replies
const POINTER_MASK: u8 = 0xC0;

//Domain names are sent with "length" separators and are null-terminated
//The domain 'microsoft.com' becomes "0x09microsoft0x03com0x00"
pub fn encode_name(name: &str) -> Result<Vec<u8>, EncodingError> {
    //A single trailing dot just marks the name as fully qualified
    let trimmed = name.strip_suffix('.').unwrap_or(name);
    if trimmed.is_empty() {
        return Err(EncodingError::EmptyName);
    }
    if !trimmed.is_ascii() {
        return Err(EncodingError::NonAscii(name.to_string()));
    }

    //One byte for the size of each part, n bytes for the text, and a null byte
    let mut buffer = Vec::with_capacity(trimmed.len() + 2);
    for label in trimmed.split('.') {
        if label.is_empty() {
            return Err(EncodingError::EmptyLabel(name.to_string()));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(EncodingError::LabelTooLong {
                label: label.to_string(),
                len: label.len(),
            });
        }
        buffer.push(label.len() as u8);
        buffer.extend_from_slice(label.as_bytes());
    }
    buffer.push(0);

    if buffer.len() > MAX_NAME_LEN {
        return Err(EncodingError::NameTooLong(buffer.len()));
    }
    Ok(buffer)
}

/// Reads the name starting at `start` inside a whole DNS message.
///
/// Follows compression pointers. Returns the dotted name and the offset of
/// the first byte after the name as it sits at `start` (so after the first
/// pointer, if any). Every pointer has to jump strictly before the run of
/// labels it terminates, which rules out loops.
pub fn decode_name(message: &[u8], start: usize) -> Result<(String, usize), ResponseError> {
    let mut labels: Vec<&str> = Vec::new();
    let mut pos = start;
    let mut run_start = start;
    let mut end = None;

    loop {
        let len = *message.get(pos).ok_or(ResponseError::Truncated(pos))?;

        if len & POINTER_MASK == POINTER_MASK {
            let low = *message.get(pos + 1).ok_or(ResponseError::Truncated(pos + 1))?;
            let target = (usize::from(len & !POINTER_MASK) << 8) | usize::from(low);
            if target >= run_start {
                return Err(ResponseError::BadPointer(pos));
            }
            end.get_or_insert(pos + 2);
            pos = target;
            run_start = target;
            continue;
        }
        //0b01 and 0b10 prefixes are reserved
        if len & POINTER_MASK != 0 {
            return Err(ResponseError::BadPointer(pos));
        }

        if len == 0 {
            pos += 1;
            break;
        }

        let begin = pos + 1;
        let stop = begin + usize::from(len);
        let bytes = message
            .get(begin..stop)
            .ok_or(ResponseError::Truncated(message.len()))?;
        let label = str::from_utf8(bytes).map_err(|_| ResponseError::BadLabel(begin))?;
        labels.push(label);
        pos = stop;
    }

    Ok((labels.join("."), end.unwrap_or(pos)))
}

#[test]
fn encode_name_encodes() {
    let simple_domain = "ab.c";
    let encoded = encode_name(simple_domain).unwrap();
    let expected: Vec<u8> = vec![2, b'a', b'b', 1, b'c', 0];
    assert_eq!(expected, encoded);
}

#[test]
fn encode_name_accepts_trailing_dot() {
    assert_eq!(encode_name("ab.c.").unwrap(), encode_name("ab.c").unwrap());
}

#[test]
fn encode_name_rejects_bad_labels() {
    assert_eq!(encode_name(""), Err(EncodingError::EmptyName));
    assert_eq!(encode_name("."), Err(EncodingError::EmptyName));
    assert_eq!(
        encode_name("www..edu"),
        Err(EncodingError::EmptyLabel("www..edu".to_string()))
    );
    assert_eq!(
        encode_name(".edu"),
        Err(EncodingError::EmptyLabel(".edu".to_string()))
    );
    assert_eq!(
        encode_name("bücher.de"),
        Err(EncodingError::NonAscii("bücher.de".to_string()))
    );

    let long = "a".repeat(64);
    assert_eq!(
        encode_name(&format!("{}.com", long)),
        Err(EncodingError::LabelTooLong { label: long, len: 64 })
    );
}

#[test]
fn encode_name_limits_total_length() {
    //4 labels of 63 bytes: 4 * 64 + 1 = 257 bytes on the wire
    let label = "a".repeat(63);
    let name = vec![label.as_str(); 4].join(".");
    assert_eq!(encode_name(&name), Err(EncodingError::NameTooLong(257)));

    //3 labels of 63 and one of 61: exactly 255
    let name = format!("{}.{}", vec![label.as_str(); 3].join("."), "b".repeat(61));
    assert_eq!(encode_name(&name).unwrap().len(), MAX_NAME_LEN);
}

#[test]
fn encode_name_never_sets_pointer_bits() {
    let name = format!("{}.x.{}", "a".repeat(63), "b".repeat(40));
    let encoded = encode_name(&name).unwrap();
    let mut pos = 0;
    while encoded[pos] != 0 {
        assert_eq!(encoded[pos] & POINTER_MASK, 0);
        pos += usize::from(encoded[pos]) + 1;
    }
    assert_eq!(pos, encoded.len() - 1);
}

#[test]
fn decode_name_decodes() {
    let simple_domain = "example.com";
    let buf = encode_name(simple_domain).unwrap();
    let (decoded, end) = decode_name(&buf, 0).unwrap();
    assert_eq!(simple_domain, decoded);
    assert_eq!(end, buf.len());

    let domain_with_sub = "site.example.com";
    let buf = encode_name(domain_with_sub).unwrap();
    let (decoded, _) = decode_name(&buf, 0).unwrap();
    assert_eq!(domain_with_sub, decoded);
}

#[test]
fn decode_name_follows_pointers() {
    //"example.com" at 0, then "www" + pointer to 0 at 13
    let mut buf = encode_name("example.com").unwrap();
    assert_eq!(buf.len(), 13);
    buf.extend_from_slice(&[3, b'w', b'w', b'w', 0xC0, 0x00, 0xFF]);

    let (decoded, end) = decode_name(&buf, 13).unwrap();
    assert_eq!(decoded, "www.example.com");
    assert_eq!(end, 19);

    //a name that is nothing but a pointer
    buf.extend_from_slice(&[0xC0, 13]);
    let (decoded, end) = decode_name(&buf, 20).unwrap();
    assert_eq!(decoded, "www.example.com");
    assert_eq!(end, 22);
}

#[test]
fn decode_name_rejects_loops_and_overruns() {
    //label at 0, pointer at 2 back to 0: loops forever if allowed
    let looping = [1, b'x', 0xC0, 0x00];
    assert_eq!(decode_name(&looping, 0), Err(ResponseError::BadPointer(2)));

    let self_pointer = [0xC0, 0x00];
    assert_eq!(decode_name(&self_pointer, 0), Err(ResponseError::BadPointer(0)));

    let forward = [0xC0, 0x05, 0, 0, 0, 0];
    assert_eq!(decode_name(&forward, 0), Err(ResponseError::BadPointer(0)));

    let short_label = [5, b'a', b'b'];
    assert_eq!(decode_name(&short_label, 0), Err(ResponseError::Truncated(3)));

    let unterminated = [1, b'a'];
    assert_eq!(decode_name(&unterminated, 0), Err(ResponseError::Truncated(2)));

    let reserved = [0x40, 0x00];
    assert_eq!(decode_name(&reserved, 0), Err(ResponseError::BadPointer(0)));
}
