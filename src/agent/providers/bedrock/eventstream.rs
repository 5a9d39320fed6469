//! Decoder for the `application/vnd.amazon.eventstream` response framing.
//!
//! ```text
//! +-------------+--------------+-------------+---------+---------+-------------+
//! | total (4)   | headers (4)  | prelude CRC | headers | payload | message CRC |
//! | u32 BE      | u32 BE       | u32 BE      | ...     | ...     | u32 BE      |
//! +-------------+--------------+-------------+---------+---------+-------------+
//! ```
//!
//! Both checksums are CRC32 (IEEE). The prelude CRC covers the first 8 bytes, the
//! message CRC covers everything before it.

use crate::agent::InvocationError;

/// Prelude (12 bytes) plus the trailing message CRC (4 bytes).
const MIN_MESSAGE_LEN: usize = 16;
const PRELUDE_LEN: usize = 12;
/// Largest message the service may send (16 MiB).
pub const MAX_MESSAGE_LEN: usize = 16 * 1024 * 1024;
/// Largest header block the service may send (128 KiB).
const MAX_HEADERS_LEN: usize = 128 * 1024;

/// A typed header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Bool(bool),
    Byte(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Bytes(Vec<u8>),
    String(String),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
    Uuid([u8; 16]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: HeaderValue,
}

/// One decoded event-stream message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub headers: Vec<Header>,
    pub payload: Vec<u8>,
}

impl Message {
    /// Returns a string header by name, if present.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.iter().find_map(|header| match &header.value {
            HeaderValue::String(value) if header.name == name => Some(value.as_str()),
            _ => None,
        })
    }
}

fn framing(detail: impl Into<String>) -> InvocationError {
    InvocationError::Framing(detail.into())
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Buffers incoming bytes and yields complete messages.
#[derive(Debug, Default)]
pub struct MessageDecoder {
    buffer: Vec<u8>,
}

impl MessageDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Bytes received but not yet consumed by a complete message.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Try to decode the next message.
    ///
    /// Returns `Ok(None)` when more data is needed. A checksum mismatch or an
    /// impossible length is an error; the stream cannot be resynchronised after it.
    pub fn decode(&mut self) -> Result<Option<Message>, InvocationError> {
        if self.buffer.len() < PRELUDE_LEN {
            return Ok(None);
        }

        let total_len = read_u32(&self.buffer[0..4]) as usize;
        let headers_len = read_u32(&self.buffer[4..8]) as usize;
        let prelude_crc = read_u32(&self.buffer[8..12]);

        let actual = crc32fast::hash(&self.buffer[0..8]);
        if actual != prelude_crc {
            return Err(framing(format!(
                "prelude checksum mismatch (expected {prelude_crc:#010x}, got {actual:#010x})"
            )));
        }
        if !(MIN_MESSAGE_LEN..=MAX_MESSAGE_LEN).contains(&total_len) {
            return Err(framing(format!("invalid message length {total_len}")));
        }
        if headers_len > MAX_HEADERS_LEN || headers_len > total_len - MIN_MESSAGE_LEN {
            return Err(framing(format!("invalid headers length {headers_len}")));
        }

        if self.buffer.len() < total_len {
            return Ok(None);
        }

        let crc_offset = total_len - 4;
        let message_crc = read_u32(&self.buffer[crc_offset..total_len]);
        let actual = crc32fast::hash(&self.buffer[..crc_offset]);
        if actual != message_crc {
            return Err(framing(format!(
                "message checksum mismatch (expected {message_crc:#010x}, got {actual:#010x})"
            )));
        }

        let headers_end = PRELUDE_LEN + headers_len;
        let headers = parse_headers(&self.buffer[PRELUDE_LEN..headers_end])?;
        let payload = self.buffer[headers_end..crc_offset].to_vec();
        self.buffer.drain(..total_len);

        Ok(Some(Message { headers, payload }))
    }
}

/// Cursor over a header block.
struct HeaderReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> HeaderReader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], InvocationError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| framing("header block truncated"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], InvocationError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn is_done(&self) -> bool {
        self.pos >= self.bytes.len()
    }
}

fn parse_headers(bytes: &[u8]) -> Result<Vec<Header>, InvocationError> {
    let mut reader = HeaderReader { bytes, pos: 0 };
    let mut headers = Vec::new();
    while !reader.is_done() {
        let [name_len] = reader.take_array::<1>()?;
        let name = std::str::from_utf8(reader.take(name_len as usize)?)
            .map_err(|_| framing("header name is not UTF-8"))?
            .to_string();
        let [value_type] = reader.take_array::<1>()?;
        let value = match value_type {
            0 => HeaderValue::Bool(true),
            1 => HeaderValue::Bool(false),
            2 => HeaderValue::Byte(i8::from_be_bytes(reader.take_array()?)),
            3 => HeaderValue::Int16(i16::from_be_bytes(reader.take_array()?)),
            4 => HeaderValue::Int32(i32::from_be_bytes(reader.take_array()?)),
            5 => HeaderValue::Int64(i64::from_be_bytes(reader.take_array()?)),
            6 => {
                let len = u16::from_be_bytes(reader.take_array()?) as usize;
                HeaderValue::Bytes(reader.take(len)?.to_vec())
            }
            7 => {
                let len = u16::from_be_bytes(reader.take_array()?) as usize;
                let value = std::str::from_utf8(reader.take(len)?)
                    .map_err(|_| framing(format!("header `{name}` is not UTF-8")))?;
                HeaderValue::String(value.to_string())
            }
            8 => HeaderValue::Timestamp(i64::from_be_bytes(reader.take_array()?)),
            9 => HeaderValue::Uuid(reader.take_array()?),
            other => {
                return Err(framing(format!(
                    "unknown header value type {other} for `{name}`"
                )));
            }
        };
        headers.push(Header { name, value });
    }
    Ok(headers)
}
