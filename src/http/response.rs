//! Response status lines and heads.
//!
//! # Responsibilities
//! - Parse an origin's status line
//! - Render the heads the proxy writes itself (status, `Date`, type, length)
//! - Map leaf file names to content types

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{ProxyError, ProxyResult};
use crate::http::date;
use crate::http::request::HTTP_VERSION;

/// Statuses the proxy emits on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    NotModified,
    BadRequest,
    NotFound,
    InternalServerError,
    NotImplemented,
    BadGateway,
    GatewayTimeout,
    VersionNotSupported,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::NotModified => 304,
            Status::BadRequest => 400,
            Status::NotFound => 404,
            Status::InternalServerError => 500,
            Status::NotImplemented => 501,
            Status::BadGateway => 502,
            Status::GatewayTimeout => 504,
            Status::VersionNotSupported => 505,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::NotModified => "Not Modified",
            Status::BadRequest => "Bad Request",
            Status::NotFound => "Not Found",
            Status::InternalServerError => "Internal Server Error",
            Status::NotImplemented => "Method Not Implemented",
            Status::BadGateway => "Bad Gateway",
            Status::GatewayTimeout => "Gateway Timeout",
            Status::VersionNotSupported => "Version Not Supported",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

/// First line of a response: `HTTP/1.1 200 OK`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub version: String,
    pub code: u16,
    pub reason: String,
}

impl StatusLine {
    /// Parse a status line. The reason phrase may contain spaces or be empty.
    pub fn parse(line: &str) -> ProxyResult<Self> {
        let mut parts = line.splitn(3, ' ');
        let version = parts.next().filter(|v| v.starts_with("HTTP/"));
        let code = parts.next().and_then(|c| c.parse::<u16>().ok());
        match (version, code) {
            (Some(version), Some(code)) => Ok(Self {
                version: version.to_string(),
                code,
                reason: parts.next().unwrap_or("").to_string(),
            }),
            _ => Err(ProxyError::MalformedLine(line.to_string())),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == 200
    }

    pub fn is_not_modified(&self) -> bool {
        self.code == 304
    }
}

/// Content type for a leaf file name, matched case-insensitively by
/// extension.
pub fn content_type_for(file_name: &str) -> &'static str {
    let lower = file_name.to_ascii_lowercase();
    let ext = match lower.rsplit_once('.') {
        Some((_, ext)) => ext,
        None => return "application/octet-stream",
    };
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        // sic
        "png" => "image/jpegpng",
        "html" | "htm" => "text/html",
        _ => "application/octet-stream",
    }
}

/// Render a response head with a fresh `Date:` header.
pub fn render_head(status: Status, content_type: Option<&str>, content_length: u64) -> String {
    let mut head = format!("{} {}\r\nDate: {}\r\n", HTTP_VERSION, status, date::now());
    if let Some(content_type) = content_type {
        head.push_str("Content-Type: ");
        head.push_str(content_type);
        head.push_str("\r\n");
    }
    head.push_str(&format!("Content-Length: {}\r\n\r\n", content_length));
    head
}

/// Write a response head to a peer.
pub async fn write_head<W>(
    writer: &mut W,
    status: Status,
    content_type: Option<&str>,
    content_length: u64,
) -> ProxyResult<()>
where
    W: AsyncWrite + Unpin,
{
    let head = render_head(status, content_type, content_length);
    writer.write_all(head.as_bytes()).await?;
    Ok(())
}
