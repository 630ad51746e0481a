//! HTTP response types and utilities.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::server::error::Error;

/// HTTP status codes with their standard reason phrases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok = 200,
    Created = 201,
    Accepted = 202,
    NoContent = 204,
    MovedPermanently = 301,
    Found = 302,
    SeeOther = 303,
    NotModified = 304,
    BadRequest = 400,
    Unauthorized = 401,
    Forbidden = 403,
    NotFound = 404,
    MethodNotAllowed = 405,
    RequestTimeout = 408,
    Conflict = 409,
    PayloadTooLarge = 413,
    UnprocessableEntity = 422,
    TooManyRequests = 429,
    InternalServerError = 500,
    NotImplemented = 501,
    BadGateway = 502,
    ServiceUnavailable = 503,
    GatewayTimeout = 504,
}

impl StatusCode {
    /// Get the reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::Accepted => "Accepted",
            StatusCode::NoContent => "No Content",
            StatusCode::MovedPermanently => "Moved Permanently",
            StatusCode::Found => "Found",
            StatusCode::SeeOther => "See Other",
            StatusCode::NotModified => "Not Modified",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Unauthorized => "Unauthorized",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::RequestTimeout => "Request Timeout",
            StatusCode::Conflict => "Conflict",
            StatusCode::PayloadTooLarge => "Payload Too Large",
            StatusCode::UnprocessableEntity => "Unprocessable Entity",
            StatusCode::TooManyRequests => "Too Many Requests",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::NotImplemented => "Not Implemented",
            StatusCode::BadGateway => "Bad Gateway",
            StatusCode::ServiceUnavailable => "Service Unavailable",
            StatusCode::GatewayTimeout => "Gateway Timeout",
        }
    }

    /// The numeric status code.
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Responses with these codes never carry a body.
    pub fn forbids_body(&self) -> bool {
        matches!(self, StatusCode::NoContent | StatusCode::NotModified)
    }
}

impl TryFrom<u16> for StatusCode {
    type Error = u16;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        let status = match code {
            200 => StatusCode::Ok,
            201 => StatusCode::Created,
            202 => StatusCode::Accepted,
            204 => StatusCode::NoContent,
            301 => StatusCode::MovedPermanently,
            302 => StatusCode::Found,
            303 => StatusCode::SeeOther,
            304 => StatusCode::NotModified,
            400 => StatusCode::BadRequest,
            401 => StatusCode::Unauthorized,
            403 => StatusCode::Forbidden,
            404 => StatusCode::NotFound,
            405 => StatusCode::MethodNotAllowed,
            408 => StatusCode::RequestTimeout,
            409 => StatusCode::Conflict,
            413 => StatusCode::PayloadTooLarge,
            422 => StatusCode::UnprocessableEntity,
            429 => StatusCode::TooManyRequests,
            500 => StatusCode::InternalServerError,
            501 => StatusCode::NotImplemented,
            502 => StatusCode::BadGateway,
            503 => StatusCode::ServiceUnavailable,
            504 => StatusCode::GatewayTimeout,
            other => return Err(other),
        };
        Ok(status)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason_phrase())
    }
}

/// Receiving end of a streamed body. An `Err` item aborts the response.
pub type BodyStream = mpsc::Receiver<Result<Vec<u8>, Error>>;

/// Sending end of a streamed body, returned by [`HttpResponse::streaming`].
pub type BodySender = mpsc::Sender<Result<Vec<u8>, Error>>;

/// The payload of a response.
pub enum Body {
    /// A body whose length is known up front; sent with `Content-Length`.
    Full(Vec<u8>),
    /// A body produced piece by piece; sent with chunked framing.
    Stream(BodyStream),
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            Body::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// Represents an HTTP response.
///
/// Built by handlers and middlewares, and frozen once the connection starts
/// writing it.
#[derive(Debug)]
pub struct HttpResponse {
    /// The HTTP status code
    pub status: StatusCode,
    /// The HTTP headers
    pub headers: HashMap<String, String>,
    /// The response body
    pub body: Body,
}

impl HttpResponse {
    /// Create a new HTTP response with the given status code.
    pub fn new(status: StatusCode) -> Self {
        let mut headers = HashMap::new();
        headers.insert("Server".to_string(), "sketch".to_string());

        Self {
            status,
            headers,
            body: Body::Full(Vec::new()),
        }
    }

    /// Create a response whose body is streamed through the returned sender.
    ///
    /// The body ends when every sender is dropped. Sending an `Err` aborts the
    /// response: the connection is closed without terminating the body.
    pub fn streaming(status: StatusCode, buffer: usize) -> (Self, BodySender) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let mut response = Self::new(status);
        response.body = Body::Stream(rx);
        (response, tx)
    }

    /// Set the response body with a string.
    pub fn with_body_string(self, body: impl Into<String>) -> Self {
        self.with_body_bytes(body.into().into_bytes())
    }

    /// Set the response body with bytes.
    pub fn with_body_bytes(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Body::Full(body.into());
        self
    }

    /// Add or replace a header. Names are compared case-insensitively.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Set the content type.
    pub fn with_content_type(self, content_type: impl Into<String>) -> Self {
        self.with_header("Content-Type", content_type)
    }

    /// Set the response body with a JSON value.
    ///
    /// This method serializes the provided value to JSON and sets it as the response body.
    pub fn with_json<T: Serialize>(self, value: &T) -> Result<Self, Error> {
        let json = serde_json::to_vec(value).map_err(Error::JsonError)?;
        Ok(self
            .with_header("Content-Type", "application/json")
            .with_body_bytes(json))
    }

    /// Add or replace a header in place.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
    }

    /// Remove a header, returning its value.
    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        let key = self.headers.keys().find(|k| k.eq_ignore_ascii_case(name))?.clone();
        self.headers.remove(&key)
    }

    /// Get a header value (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The full body, or `None` for streamed bodies.
    pub fn body_bytes(&self) -> Option<&[u8]> {
        match &self.body {
            Body::Full(bytes) => Some(bytes),
            Body::Stream(_) => None,
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.body, Body::Stream(_))
    }

    /// Convert the response to bytes.
    ///
    /// A `Content-Length` matching the body is always emitted. Streamed bodies
    /// are not drained; only their head is produced.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = match &self.body {
            Body::Full(body) => self.head_bytes(Framing::Length(body.len())),
            Body::Stream(_) => self.head_bytes(Framing::Chunked),
        };
        if let Body::Full(body) = &self.body {
            bytes.extend_from_slice(body);
        }
        bytes
    }

    fn head_bytes(&self, framing: Framing) -> Vec<u8> {
        let mut bytes = Vec::new();

        let status_line = format!("HTTP/1.1 {} {}\r\n", self.status.as_u16(), self.status.reason_phrase());
        bytes.extend_from_slice(status_line.as_bytes());

        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case("Content-Length") || name.eq_ignore_ascii_case("Transfer-Encoding") {
                continue;
            }
            let header_line = format!("{name}: {value}\r\n");
            bytes.extend_from_slice(header_line.as_bytes());
        }

        match framing {
            Framing::Length(len) if !self.status.forbids_body() => {
                bytes.extend_from_slice(format!("Content-Length: {len}\r\n").as_bytes());
            }
            Framing::Chunked if !self.status.forbids_body() => {
                bytes.extend_from_slice(b"Transfer-Encoding: chunked\r\n");
            }
            _ => {}
        }

        bytes.extend_from_slice(b"\r\n");
        bytes
    }

    /// Write the response to `writer`.
    ///
    /// `head_only` suppresses the body (responses to `HEAD`). With
    /// `chunked_allowed` unset (HTTP/1.0 peers) a streamed body is written raw
    /// and its end is signalled by closing the connection.
    ///
    /// An error after the head has been written leaves the body truncated; the
    /// caller must close the connection.
    pub async fn write_to<W>(self, writer: &mut W, head_only: bool, chunked_allowed: bool) -> Result<(), Error>
    where
        W: AsyncWrite + Unpin,
    {
        let framing = match &self.body {
            Body::Full(body) => Framing::Length(body.len()),
            Body::Stream(_) if chunked_allowed => Framing::Chunked,
            Body::Stream(_) => Framing::Close,
        };
        let mut bytes = self.head_bytes(framing);
        let send_body = !head_only && !self.status.forbids_body();

        match self.body {
            Body::Full(body) => {
                if send_body {
                    bytes.extend_from_slice(&body);
                }
                writer.write_all(&bytes).await?;
            }
            Body::Stream(mut chunks) => {
                writer.write_all(&bytes).await?;
                if send_body {
                    write_stream(writer, &mut chunks, chunked_allowed).await?;
                }
            }
        }
        writer.flush().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Framing {
    Length(usize),
    Chunked,
    Close,
}

async fn write_stream<W>(writer: &mut W, chunks: &mut BodyStream, chunked: bool) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
{
    while let Some(chunk) = chunks.recv().await {
        let chunk = chunk?;
        if chunk.is_empty() {
            continue;
        }
        if chunked {
            writer.write_all(format!("{:X}\r\n", chunk.len()).as_bytes()).await?;
            writer.write_all(&chunk).await?;
            writer.write_all(b"\r\n").await?;
        } else {
            writer.write_all(&chunk).await?;
        }
        // Flush each piece so slow producers still reach the peer.
        writer.flush().await?;
    }
    if chunked {
        writer.write_all(b"0\r\n\r\n").await?;
    }
    Ok(())
}

/// Build a `200 OK` JSON response from a serializable value.
pub fn json_response<T: Serialize>(value: &T) -> Result<HttpResponse, Error> {
    HttpResponse::new(StatusCode::Ok).with_json(value)
}
