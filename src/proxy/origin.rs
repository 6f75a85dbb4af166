//! Origin client.
//!
//! # Responsibilities
//! - Connect to an origin with a deadline and retry with backoff
//! - Send a GET or conditional GET for a cache key
//! - Read the status line and headers, leaving the body on the stream
//!
//! # Design Decisions
//! - One connection per request, no keep-alive
//! - Only the connect step is retried
//! - The raw status line and header bytes are kept for verbatim relay

use std::time::SystemTime;

use tokio::io::{AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::cache::{CacheKey, CacheStore};
use crate::config::{ProxyConfig, RetryConfig};
use crate::error::{ProxyError, ProxyResult};
use crate::http::date::format_system_time;
use crate::http::framing::{copy_exact, discard_exact};
use crate::http::headers::scan_headers;
use crate::http::line::{read_raw_line, strip_terminator};
use crate::http::request::origin_get;
use crate::http::{HeaderBlock, StatusLine};
use crate::observability::metrics;
use crate::resilience::{retry, with_timeout};

/// Which kind of GET was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Unconditional,
    Conditional,
}

impl FetchKind {
    pub fn label(self) -> &'static str {
        match self {
            FetchKind::Unconditional => "get",
            FetchKind::Conditional => "conditional_get",
        }
    }
}

/// What a conditional GET told us about the cached copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revalidation {
    /// 304: the cached body is still current.
    Unchanged,
    /// 200: the origin sent a newer body.
    Changed,
}

/// Connects to origins and issues GETs.
#[derive(Debug, Clone)]
pub struct OriginClient {
    connect_secs: u64,
    read_secs: u64,
    retries: RetryConfig,
}

impl OriginClient {
    pub fn new(connect_secs: u64, read_secs: u64, retries: RetryConfig) -> Self {
        Self {
            connect_secs,
            read_secs,
            retries,
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(
            config.timeouts.connect_secs,
            config.timeouts.read_secs,
            config.retries.clone(),
        )
    }

    /// Open a connection to `host:port`.
    pub async fn connect(&self, host: &str, port: u16) -> ProxyResult<TcpStream> {
        let origin = format!("{}:{}", host, port);
        let secs = self.connect_secs;

        retry(&self.retries, "origin connect", |attempt| {
            let origin = origin.clone();
            async move {
                tracing::debug!(origin = %origin, attempt, "Connecting to origin");
                with_timeout(secs, "origin connect", async {
                    TcpStream::connect(origin.as_str())
                        .await
                        .map_err(|source| ProxyError::ConnectRefused {
                            origin: origin.clone(),
                            source,
                        })
                })
                .await
            }
        })
        .await
    }

    /// GET the resource behind `key`.
    ///
    /// With `since` set the request carries `If-modified-since` and the
    /// origin may answer 304.
    pub async fn fetch(
        &self,
        key: &CacheKey,
        since: Option<SystemTime>,
    ) -> ProxyResult<OriginResponse> {
        let kind = if since.is_some() {
            FetchKind::Conditional
        } else {
            FetchKind::Unconditional
        };
        let since = since.map(format_system_time);

        let stream = self.connect(key.host(), key.port()).await?;
        let mut reader = BufReader::new(stream);

        let request = origin_get(key.path(), key.host(), key.port(), since.as_deref());
        with_timeout(self.read_secs, "origin write", async {
            reader.get_mut().write_all(request.as_bytes()).await?;
            Ok::<(), ProxyError>(())
        })
        .await?;

        let (status_raw, status, headers) =
            with_timeout(self.read_secs, "origin response", read_head(&mut reader)).await?;

        tracing::debug!(
            key = %key,
            kind = kind.label(),
            status = status.code,
            content_length = headers.content_length,
            "Origin responded"
        );
        metrics::record_origin_fetch(kind.label(), status.code);

        Ok(OriginResponse {
            status,
            status_raw,
            headers,
            reader,
            read_secs: self.read_secs,
        })
    }
}

async fn read_head(
    reader: &mut BufReader<TcpStream>,
) -> ProxyResult<(Vec<u8>, StatusLine, HeaderBlock)> {
    let status_raw = read_raw_line(reader).await.map_err(invalid_head)?;
    let line = String::from_utf8_lossy(strip_terminator(&status_raw)).into_owned();
    let status = StatusLine::parse(&line).map_err(invalid_head)?;
    let headers = scan_headers(reader).await.map_err(invalid_head)?;
    Ok((status_raw, status, headers))
}

fn invalid_head(err: ProxyError) -> ProxyError {
    match err {
        ProxyError::MalformedLine(line) => ProxyError::InvalidOriginResponse(line),
        ProxyError::LineTooLong(max) => {
            ProxyError::InvalidOriginResponse(format!("line longer than {} bytes", max))
        }
        ProxyError::TooManyHeaders(max) => {
            ProxyError::InvalidOriginResponse(format!("more than {} header lines", max))
        }
        other => other,
    }
}

/// An origin response whose head has been read and whose body is still
/// on the wire.
#[derive(Debug)]
pub struct OriginResponse {
    pub status: StatusLine,
    status_raw: Vec<u8>,
    pub headers: HeaderBlock,
    reader: BufReader<TcpStream>,
    read_secs: u64,
}

impl OriginResponse {
    pub fn content_length(&self) -> u64 {
        self.headers.content_length
    }

    /// Interpret the answer to a conditional GET.
    pub fn revalidation(&self) -> ProxyResult<Revalidation> {
        match self.status.code {
            304 => Ok(Revalidation::Unchanged),
            200 => Ok(Revalidation::Changed),
            other => Err(ProxyError::UnexpectedStatus(other)),
        }
    }

    /// Stream the body into the cache entry for `key`.
    pub async fn store_body(&mut self, store: &CacheStore, key: &CacheKey) -> ProxyResult<u64> {
        let len = self.content_length();
        with_timeout(
            self.read_secs,
            "origin body",
            store.write_from(key, &mut self.reader, len),
        )
        .await
    }

    /// Read and drop the body (a 304 may still declare one).
    pub async fn discard_body(&mut self) -> ProxyResult<()> {
        let len = self.content_length();
        with_timeout(self.read_secs, "origin body", discard_exact(&mut self.reader, len)).await
    }

    /// Forward status line, headers and body to `client` byte for byte.
    ///
    /// Returns the number of body bytes relayed.
    pub async fn relay_verbatim<W>(&mut self, client: &mut W, chunk_size: usize) -> ProxyResult<u64>
    where
        W: AsyncWrite + Unpin,
    {
        client.write_all(&self.status_raw).await?;
        client.write_all(&self.headers.raw).await?;

        let len = self.content_length();
        with_timeout(
            self.read_secs,
            "origin body",
            copy_exact(&mut self.reader, client, len, chunk_size),
        )
        .await
    }
}
