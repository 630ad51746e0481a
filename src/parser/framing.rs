//! Framing of complete requests off a byte stream.
//!
//! Bytes arrive from the connection in arbitrary pieces. [`RequestDecoder`]
//! accumulates them and hands out one request at a time once its head and
//! body are complete, keeping any bytes of a following (pipelined) request
//! buffered for the next call.

use crate::parser::error::Error;
use crate::parser::request::{parse_request, HttpRequest};

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// How the body of a request is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyFraming {
    Empty,
    Length(usize),
    Chunked,
}

/// Incremental HTTP/1.x request decoder.
#[derive(Debug)]
pub struct RequestDecoder {
    buf: Vec<u8>,
    max_head_size: usize,
    max_body_size: usize,
}

impl RequestDecoder {
    /// Create a decoder enforcing the given head and body size limits.
    pub fn new(max_head_size: usize, max_body_size: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_head_size,
            max_body_size,
        }
    }

    /// Append bytes read from the connection.
    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Whether no unconsumed bytes are buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Number of buffered bytes not yet consumed by a decoded request.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Try to decode the next complete request.
    ///
    /// Returns `Ok(None)` when more bytes are needed. On success the bytes of
    /// the returned request are removed from the buffer.
    pub fn decode(&mut self) -> Result<Option<HttpRequest>, Error> {
        // Tolerate stray CRLFs between pipelined requests (RFC 7230 3.5).
        let leading = self.buf.iter().take_while(|b| matches!(b, b'\r' | b'\n')).count();
        if leading > 0 {
            self.buf.drain(..leading);
        }

        let head_end = match find(&self.buf, HEAD_TERMINATOR) {
            Some(pos) => pos,
            None if self.buf.len() > self.max_head_size => {
                return Err(Error::HeadTooLarge(self.max_head_size))
            }
            None => return Ok(None),
        };
        if head_end > self.max_head_size {
            return Err(Error::HeadTooLarge(self.max_head_size));
        }

        let mut request = parse_request(&self.buf[..head_end])?;
        let body_start = head_end + HEAD_TERMINATOR.len();

        let (body, consumed) = match body_framing(&request)? {
            BodyFraming::Empty => (Vec::new(), body_start),
            BodyFraming::Length(len) => {
                if len > self.max_body_size {
                    return Err(Error::BodyTooLarge(self.max_body_size));
                }
                let end = body_start + len;
                if self.buf.len() < end {
                    return Ok(None);
                }
                (self.buf[body_start..end].to_vec(), end)
            }
            BodyFraming::Chunked => match decode_chunked(&self.buf[body_start..], self.max_body_size)? {
                Some((body, used)) => (body, body_start + used),
                None => return Ok(None),
            },
        };

        request.body = body;
        self.buf.drain(..consumed);
        Ok(Some(request))
    }
}

fn body_framing(request: &HttpRequest) -> Result<BodyFraming, Error> {
    if let Some(coding) = request.get_header("Transfer-Encoding") {
        // Chunked must be the final coding, and the only one we understand.
        return if coding.trim().eq_ignore_ascii_case("chunked") {
            Ok(BodyFraming::Chunked)
        } else {
            Err(Error::UnsupportedTransferEncoding(coding.clone()))
        };
    }

    match request.get_header("Content-Length") {
        Some(value) => {
            let len = content_length(value)?;
            Ok(if len == 0 { BodyFraming::Empty } else { BodyFraming::Length(len) })
        }
        None => Ok(BodyFraming::Empty),
    }
}

/// Digits only. Repeated fields arrive comma-joined and must all agree.
fn content_length(value: &str) -> Result<usize, Error> {
    let invalid = || Error::InvalidContentLength(value.to_string());

    let mut length = None;
    for part in value.split(',').map(str::trim) {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let parsed = part.parse::<usize>().map_err(|_| invalid())?;
        match length {
            Some(existing) if existing != parsed => return Err(invalid()),
            _ => length = Some(parsed),
        }
    }
    length.ok_or_else(invalid)
}

/// Decode a chunked body. Returns the body and the number of bytes consumed,
/// or `None` if the input ends before the terminating chunk.
fn decode_chunked(input: &[u8], max_body_size: usize) -> Result<Option<(Vec<u8>, usize)>, Error> {
    let mut body = Vec::new();
    let mut pos = 0;

    loop {
        let line_end = match find(&input[pos..], b"\r\n") {
            Some(offset) => pos + offset,
            None => return Ok(None),
        };
        let line = std::str::from_utf8(&input[pos..line_end])
            .map_err(|_| Error::InvalidChunk("size line is not UTF-8".to_string()))?;
        let size_str = line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_str, 16)
            .map_err(|_| Error::InvalidChunk(format!("bad chunk size {size_str:?}")))?;
        pos = line_end + 2;

        if size == 0 {
            // Skip trailer fields up to the final empty line.
            loop {
                let trailer_end = match find(&input[pos..], b"\r\n") {
                    Some(offset) => pos + offset,
                    None => return Ok(None),
                };
                let empty = trailer_end == pos;
                pos = trailer_end + 2;
                if empty {
                    return Ok(Some((body, pos)));
                }
            }
        }

        if size > max_body_size.saturating_sub(body.len()) {
            return Err(Error::BodyTooLarge(max_body_size));
        }
        if input.len() < pos + size + 2 {
            return Ok(None);
        }
        body.extend_from_slice(&input[pos..pos + size]);
        pos += size;
        if &input[pos..pos + 2] != b"\r\n" {
            return Err(Error::InvalidChunk("missing CRLF after chunk data".to_string()));
        }
        pos += 2;
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}
