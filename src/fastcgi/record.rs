//! FastCGI record framing.
//!
//! Every record is an 8-byte header followed by up to 65535 content bytes
//! and enough padding to keep records 8-byte aligned:
//!
//! ```text
//! version:u8 | type:u8 | request_id:u16be | content_len:u16be | padding_len:u8 | reserved:u8
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::FastCgiError;

pub const VERSION_1: u8 = 1;
pub const HEADER_LEN: usize = 8;
pub const MAX_CONTENT_LEN: usize = 65535;

/// The gateway multiplexes nothing; every connection carries request 1.
pub const REQUEST_ID: u16 = 1;

pub const ROLE_RESPONDER: u16 = 1;
const FLAG_KEEP_CONN: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    BeginRequest = 1,
    AbortRequest = 2,
    EndRequest = 3,
    Params = 4,
    Stdin = 5,
    Stdout = 6,
    Stderr = 7,
    Data = 8,
    GetValues = 9,
    GetValuesResult = 10,
    UnknownType = 11,
}

impl RecordType {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => RecordType::BeginRequest,
            2 => RecordType::AbortRequest,
            3 => RecordType::EndRequest,
            4 => RecordType::Params,
            5 => RecordType::Stdin,
            6 => RecordType::Stdout,
            7 => RecordType::Stderr,
            8 => RecordType::Data,
            9 => RecordType::GetValues,
            10 => RecordType::GetValuesResult,
            11 => RecordType::UnknownType,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub record_type: u8,
    pub request_id: u16,
    pub content_length: u16,
    pub padding_length: u8,
}

impl RecordHeader {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(VERSION_1);
        buf.put_u8(self.record_type);
        buf.put_u16(self.request_id);
        buf.put_u16(self.content_length);
        buf.put_u8(self.padding_length);
        buf.put_u8(0);
    }

    pub fn decode(raw: &[u8; HEADER_LEN]) -> Result<Self, FastCgiError> {
        if raw[0] != VERSION_1 {
            return Err(FastCgiError::Protocol(format!(
                "unsupported version {}",
                raw[0]
            )));
        }
        Ok(Self {
            record_type: raw[1],
            request_id: u16::from_be_bytes([raw[2], raw[3]]),
            content_length: u16::from_be_bytes([raw[4], raw[5]]),
            padding_length: raw[6],
        })
    }

    pub fn kind(&self) -> Option<RecordType> {
        RecordType::from_u8(self.record_type)
    }
}

/// Padding needed to align `len` content bytes to 8.
pub fn padding_for(len: usize) -> u8 {
    ((8 - len % 8) % 8) as u8
}

/// Append one record. `content` must fit in a single record.
pub fn encode_record(buf: &mut BytesMut, record_type: RecordType, content: &[u8]) {
    debug_assert!(content.len() <= MAX_CONTENT_LEN);
    let padding = padding_for(content.len());
    RecordHeader {
        record_type: record_type as u8,
        request_id: REQUEST_ID,
        content_length: content.len() as u16,
        padding_length: padding,
    }
    .encode(buf);
    buf.put_slice(content);
    buf.put_bytes(0, padding as usize);
}

/// Append `content` as a stream of records, splitting at the record size
/// limit. The empty terminating record is not written.
pub fn encode_stream(buf: &mut BytesMut, record_type: RecordType, content: &[u8]) {
    for chunk in content.chunks(MAX_CONTENT_LEN) {
        encode_record(buf, record_type, chunk);
    }
}

/// Body of a `BEGIN_REQUEST` record.
pub fn begin_request_body(role: u16, keep_conn: bool) -> [u8; 8] {
    let [hi, lo] = role.to_be_bytes();
    let flags = if keep_conn { FLAG_KEEP_CONN } else { 0 };
    [hi, lo, flags, 0, 0, 0, 0, 0]
}

fn encode_length(buf: &mut BytesMut, len: usize) {
    if len < 0x80 {
        buf.put_u8(len as u8);
    } else {
        buf.put_u32(len as u32 | 0x8000_0000);
    }
}

/// Append one name-value pair in the PARAMS encoding.
pub fn encode_name_value(buf: &mut BytesMut, name: &[u8], value: &[u8]) {
    encode_length(buf, name.len());
    encode_length(buf, value.len());
    buf.put_slice(name);
    buf.put_slice(value);
}

fn decode_length(input: &[u8], pos: &mut usize) -> Result<usize, FastCgiError> {
    let first = *input
        .get(*pos)
        .ok_or_else(|| FastCgiError::Protocol("truncated name-value length".into()))?;
    if first & 0x80 == 0 {
        *pos += 1;
        return Ok(first as usize);
    }
    let raw = input
        .get(*pos..*pos + 4)
        .ok_or_else(|| FastCgiError::Protocol("truncated name-value length".into()))?;
    *pos += 4;
    Ok((u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) & 0x7fff_ffff) as usize)
}

/// Decode a concatenated PARAMS stream into its pairs.
pub fn decode_name_values(input: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, FastCgiError> {
    let mut pairs = Vec::new();
    let mut pos = 0;
    while pos < input.len() {
        let name_len = decode_length(input, &mut pos)?;
        let value_len = decode_length(input, &mut pos)?;
        let name = input
            .get(pos..pos + name_len)
            .ok_or_else(|| FastCgiError::Protocol("truncated name".into()))?;
        pos += name_len;
        let value = input
            .get(pos..pos + value_len)
            .ok_or_else(|| FastCgiError::Protocol("truncated value".into()))?;
        pos += value_len;
        pairs.push((name.to_vec(), value.to_vec()));
    }
    Ok(pairs)
}

/// `END_REQUEST` body: application exit status and protocol status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndRequest {
    pub app_status: u32,
    pub protocol_status: u8,
}

impl EndRequest {
    pub fn decode(content: &[u8]) -> Result<Self, FastCgiError> {
        if content.len() < 5 {
            return Err(FastCgiError::Protocol("short END_REQUEST body".into()));
        }
        Ok(Self {
            app_status: u32::from_be_bytes([content[0], content[1], content[2], content[3]]),
            protocol_status: content[4],
        })
    }
}

/// One decoded record with padding removed.
#[derive(Debug, Clone)]
pub struct Record {
    pub header: RecordHeader,
    pub content: Bytes,
}

impl Record {
    pub fn kind(&self) -> Option<RecordType> {
        self.header.kind()
    }
}

/// Reads records off a byte stream.
#[derive(Debug)]
pub struct RecordReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Next record, or `None` when the peer closed cleanly between records.
    pub async fn next(&mut self) -> Result<Option<Record>, FastCgiError> {
        let mut raw = [0u8; HEADER_LEN];
        let mut filled = 0;
        while filled < HEADER_LEN {
            let n = self
                .inner
                .read(&mut raw[filled..])
                .await
                .map_err(FastCgiError::Read)?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(FastCgiError::Read(std::io::ErrorKind::UnexpectedEof.into()));
            }
            filled += n;
        }

        let header = RecordHeader::decode(&raw)?;
        let total = header.content_length as usize + header.padding_length as usize;
        let mut content = BytesMut::zeroed(total);
        self.inner
            .read_exact(&mut content)
            .await
            .map_err(FastCgiError::Read)?;
        content.truncate(header.content_length as usize);

        Ok(Some(Record {
            header,
            content: content.freeze(),
        }))
    }
}
