//! Line-oriented reading of protocol heads.
//!
//! # Responsibilities
//! - Return one LF-terminated line, dropping a CR immediately before the LF
//! - Keep bytes after the line buffered so the framer can read the body
//! - Bound line length
//!
//! Readers are expected to be `BufReader`s; one `read_until` call consumes
//! the buffer instead of issuing a syscall per byte.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::{ProxyError, ProxyResult};

/// Longest accepted protocol line, terminator included.
pub const MAX_LINE_LEN: usize = 8 * 1024;

/// Read one line with its terminator intact.
///
/// Fails with [`ProxyError::ConnectionClosed`] if the stream ends before a
/// line feed.
pub async fn read_raw_line<R>(reader: &mut R) -> ProxyResult<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let n = reader
        .take(MAX_LINE_LEN as u64)
        .read_until(b'\n', &mut line)
        .await?;

    if line.last() == Some(&b'\n') {
        return Ok(line);
    }
    if n >= MAX_LINE_LEN {
        return Err(ProxyError::LineTooLong(MAX_LINE_LEN));
    }
    Err(ProxyError::ConnectionClosed)
}

/// Read one line, stripping the LF and a CR directly before it.
pub async fn read_line<R>(reader: &mut R) -> ProxyResult<String>
where
    R: AsyncBufRead + Unpin,
{
    let raw = read_raw_line(reader).await?;
    Ok(String::from_utf8_lossy(strip_terminator(&raw)).into_owned())
}

/// Slice of `line` without its trailing `\n` / `\r\n`.
pub fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
