//! Header block scanning.
//!
//! Reads header lines up to the blank line and returns everything the
//! session needs as one [`HeaderBlock`] value: the declared body length, the
//! conditional timestamp, the host, and the verbatim bytes for relaying an
//! origin's error response unmodified.

use chrono::{DateTime, Utc};
use tokio::io::AsyncBufRead;

use crate::error::{ProxyError, ProxyResult};
use crate::http::date::parse_http_date;
use crate::http::line::{read_raw_line, strip_terminator};

/// Upper bound on header lines per message.
pub const MAX_HEADER_LINES: usize = 100;

/// Result of scanning one header block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBlock {
    /// Header lines without terminators, in arrival order.
    pub lines: Vec<String>,
    /// The block exactly as received, blank terminator line included.
    pub raw: Vec<u8>,
    /// `Content-Length`, or 0 when absent or unparseable.
    pub content_length: u64,
    /// Parsed `If-modified-since`.
    pub if_modified_since: Option<DateTime<Utc>>,
    /// `Host` value.
    pub host: Option<String>,
}

impl HeaderBlock {
    /// Value of the first header named `name` (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| {
            let (n, v) = split_header(line)?;
            n.eq_ignore_ascii_case(name).then_some(v)
        })
    }

    fn absorb(&mut self, line: &str) {
        let Some((name, value)) = split_header(line) else {
            return;
        };
        if name.eq_ignore_ascii_case("content-length") {
            self.content_length = value.parse().unwrap_or(0);
        } else if name.eq_ignore_ascii_case("if-modified-since") {
            self.if_modified_since = parse_http_date(value);
        } else if name.eq_ignore_ascii_case("host") {
            self.host = Some(value.to_string());
        }
    }
}

/// Split `Name: value` at the first colon, trimming the value.
fn split_header(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once(':')?;
    Some((name.trim(), value.trim()))
}

/// Consume header lines until the empty line.
///
/// A block with more than [`MAX_HEADER_LINES`] lines is rejected with
/// [`ProxyError::TooManyHeaders`] rather than read partially.
pub async fn scan_headers<R>(reader: &mut R) -> ProxyResult<HeaderBlock>
where
    R: AsyncBufRead + Unpin,
{
    let mut block = HeaderBlock::default();

    loop {
        let raw = read_raw_line(reader).await?;
        let line = String::from_utf8_lossy(strip_terminator(&raw)).into_owned();
        if line.is_empty() {
            block.raw.extend_from_slice(&raw);
            break;
        }
        if block.lines.len() == MAX_HEADER_LINES {
            return Err(ProxyError::TooManyHeaders(MAX_HEADER_LINES));
        }
        block.raw.extend_from_slice(&raw);
        block.absorb(&line);
        block.lines.push(line);
    }

    Ok(block)
}
