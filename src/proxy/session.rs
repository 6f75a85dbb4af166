//! One client session, end to end.
//!
//! # State Machine
//! ```text
//! AwaitRequest → ResolveOrigin → ConsultCache ─┬─ Miss ──────────────┐
//!                                              ├─ Fresh (revalidate) ┼→ RelayToClient → Closed
//!                                              └─ Expired (refetch) ─┘
//! ```
//!
//! The key's guard is held while the cache is consulted and refreshed, so
//! concurrent sessions for one key fetch one after another. It is released
//! once the stored body has been opened; streaming that body to the client
//! runs unguarded under its own write deadline. A verbatim relay keeps the
//! guard until it ends.
//!
//! A failure before the response head is written becomes an error page;
//! after that the connection is just closed.

use std::time::{Instant, SystemTime};

use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};

use crate::cache::{CacheKey, Freshness, StoredBody};
use crate::cache::{CacheStore, FreshnessPolicy, KeyLocks};
use crate::config::ProxyConfig;
use crate::error::{ProxyError, ProxyResult};
use crate::http::framing::write_file;
use crate::http::headers::scan_headers;
use crate::http::line::read_line;
use crate::http::response::{content_type_for, write_head};
use crate::http::{RequestLine, Status};
use crate::observability::metrics;
use crate::proxy::error_pages::ErrorPages;
use crate::proxy::origin::{OriginClient, OriginResponse, Revalidation};
use crate::proxy::pending::PendingRequest;
use crate::resilience::with_timeout;

/// Everything sessions share.
#[derive(Debug)]
pub struct ProxyState {
    pub store: CacheStore,
    pub policy: FreshnessPolicy,
    pub locks: KeyLocks,
    pub origin: OriginClient,
    pub error_pages: ErrorPages,
    pub client_idle_secs: u64,
    pub client_write_secs: u64,
}

impl ProxyState {
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            store: CacheStore::new(&config.cache.root_dir).with_chunk_size(config.cache.buffer_size),
            policy: FreshnessPolicy::new(config.cache.expire_after()),
            locks: KeyLocks::new(),
            origin: OriginClient::from_config(config),
            error_pages: ErrorPages::new(config.error_pages.dir.as_ref().map(Into::into)),
            client_idle_secs: config.timeouts.client_idle_secs,
            client_write_secs: config.timeouts.client_write_secs,
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    /// Status sent to the client; `None` if nothing was sent.
    pub status: Option<u16>,
    pub outcome: &'static str,
}

impl SessionSummary {
    fn new(status: u16, outcome: &'static str) -> Self {
        Self {
            status: Some(status),
            outcome,
        }
    }
}

/// Result of consulting the cache under the key's guard.
#[derive(Debug)]
enum Reply {
    /// The client was already answered.
    Done(SessionSummary),
    /// Serve this body once the guard is released.
    Stored {
        body: StoredBody,
        outcome: &'static str,
    },
}

/// Serve one request read from `reader`, answering on `writer`.
///
/// Never fails: errors end up as an error page, or as a closed connection
/// when a response was already underway.
pub async fn serve<R, W>(
    state: &ProxyState,
    reader: &mut R,
    writer: &mut W,
    request_id: &str,
) -> SessionSummary
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let start = Instant::now();
    let mut session = Session {
        state,
        client: writer,
        sent: None,
    };

    let summary = match session.run(reader, request_id).await {
        Ok(summary) => summary,
        Err(err) => session.fail(err).await,
    };

    if let Some(status) = summary.status {
        metrics::record_request(status, summary.outcome, start);
    }
    tracing::info!(
        status = summary.status,
        outcome = summary.outcome,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Session finished"
    );
    summary
}

async fn read_request<R>(reader: &mut R, request_id: &str) -> ProxyResult<PendingRequest>
where
    R: AsyncBufRead + Unpin,
{
    let line = RequestLine::parse(&read_line(reader).await?)?;
    let headers = scan_headers(reader).await?;
    PendingRequest::from_parts(line, &headers, request_id.to_string())
}

struct Session<'a, W> {
    state: &'a ProxyState,
    client: &'a mut W,
    /// Status of the head already written, if any.
    sent: Option<u16>,
}

impl<W> Session<'_, W>
where
    W: AsyncWrite + Unpin,
{
    async fn run<R>(&mut self, reader: &mut R, request_id: &str) -> ProxyResult<SessionSummary>
    where
        R: AsyncBufRead + Unpin,
    {
        let state = self.state;
        let request = with_timeout(
            state.client_idle_secs,
            "client request",
            read_request(reader, request_id),
        )
        .await;

        let pending = match request {
            Ok(pending) => pending,
            Err(err @ (ProxyError::ConnectionClosed | ProxyError::Timeout(..))) => {
                tracing::debug!(error = %err, "Client went away before sending a request");
                return Ok(SessionSummary {
                    status: None,
                    outcome: "closed",
                });
            }
            Err(err) => return Err(err),
        };

        tracing::info!(
            method = %pending.method,
            target = %pending.target,
            origin = %pending.origin(),
            "Request received"
        );

        let key = pending.cache_key()?;
        let reply = {
            let _guard = state.locks.acquire(state.store.path_for(&key)).await;
            self.consult(&key).await?
        };

        match reply {
            Reply::Done(summary) => Ok(summary),
            Reply::Stored { body, outcome } => self.deliver(&pending, &key, body, outcome).await,
        }
    }

    /// Decide between cache and origin. Runs under the key's guard.
    async fn consult(&mut self, key: &CacheKey) -> ProxyResult<Reply> {
        let state = self.state;
        let modified = state.store.lookup(key).await?;
        let freshness = state.policy.classify(modified, SystemTime::now());
        metrics::record_cache_outcome(freshness.label());
        tracing::debug!(key = %key, freshness = freshness.label(), "Cache consulted");

        match freshness {
            Freshness::Miss => self.fetch_and_store(key, "miss").await,
            Freshness::Expired { age } => {
                tracing::debug!(key = %key, age_secs = age.as_secs(), "Entry expired");
                state.store.remove(key).await?;
                self.fetch_and_store(key, "expired").await
            }
            Freshness::FreshPendingRevalidation { modified } => {
                self.revalidate(key, modified).await
            }
        }
    }

    /// Unconditional GET; a 200 is stored and then served from the cache.
    async fn fetch_and_store(&mut self, key: &CacheKey, outcome: &'static str) -> ProxyResult<Reply> {
        let state = self.state;
        let mut response = state.origin.fetch(key, None).await?;
        if !response.status.is_ok() {
            return Ok(Reply::Done(self.relay(&mut response).await?));
        }

        let stored = response.store_body(&state.store, key).await?;
        tracing::info!(key = %key, bytes = stored, "Stored origin body");
        let body = state.store.open(key).await?;
        Ok(Reply::Stored { body, outcome })
    }

    /// Conditional GET for a young entry.
    async fn revalidate(&mut self, key: &CacheKey, modified: SystemTime) -> ProxyResult<Reply> {
        let state = self.state;
        let mut response = state.origin.fetch(key, Some(modified)).await?;

        let outcome = match response.revalidation() {
            Ok(Revalidation::Unchanged) => {
                response.discard_body().await?;
                "hit"
            }
            Ok(Revalidation::Changed) => {
                state.store.remove(key).await?;
                let stored = response.store_body(&state.store, key).await?;
                tracing::info!(key = %key, bytes = stored, "Replaced stale entry");
                "refreshed"
            }
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "Revalidation answered with an error");
                return Ok(Reply::Done(self.relay(&mut response).await?));
            }
        };

        let body = state.store.open(key).await?;
        Ok(Reply::Stored { body, outcome })
    }

    /// Forward an origin response untouched.
    async fn relay(&mut self, response: &mut OriginResponse) -> ProxyResult<SessionSummary> {
        let code = response.status.code;
        let chunk_size = self.state.store.chunk_size();
        self.sent = Some(code);
        with_timeout(
            self.state.client_write_secs,
            "client write",
            response.relay_verbatim(self.client, chunk_size),
        )
        .await?;
        Ok(SessionSummary::new(code, "relayed"))
    }

    /// Answer from a stored body opened while the key was held.
    async fn deliver(
        &mut self,
        pending: &PendingRequest,
        key: &CacheKey,
        mut body: StoredBody,
        outcome: &'static str,
    ) -> ProxyResult<SessionSummary> {
        let write_secs = self.state.client_write_secs;
        let chunk_size = self.state.store.chunk_size();

        if let Some(since) = pending.if_modified_since {
            if DateTime::<Utc>::from(body.modified) < since {
                let code = Status::NotModified.code();
                self.sent = Some(code);
                let client = &mut *self.client;
                with_timeout(write_secs, "client write", async {
                    write_head(client, Status::NotModified, None, 0).await?;
                    client.flush().await?;
                    Ok::<(), ProxyError>(())
                })
                .await?;
                return Ok(SessionSummary::new(code, "not_modified"));
            }
        }

        self.sent = Some(Status::Ok.code());
        let client = &mut *self.client;
        let content_type = content_type_for(key.leaf_name());
        with_timeout(write_secs, "client write", async {
            write_head(client, Status::Ok, Some(content_type), body.len).await?;
            write_file(client, &mut body.file, chunk_size).await
        })
        .await?;
        Ok(SessionSummary::new(Status::Ok.code(), outcome))
    }

    async fn fail(&mut self, err: ProxyError) -> SessionSummary {
        if let Some(code) = self.sent {
            tracing::warn!(status = code, error = %err, "Response aborted after head was sent");
            return SessionSummary::new(code, "aborted");
        }

        let status = err.status();
        if status.code() >= 500 {
            tracing::warn!(status = status.code(), error = %err, "Request failed");
        } else {
            tracing::info!(status = status.code(), error = %err, "Request rejected");
        }

        let page = self.state.error_pages.send(self.client, status);
        if let Err(e) = with_timeout(self.state.client_write_secs, "client write", page).await {
            tracing::debug!(error = %e, "Failed to send error page");
        }
        SessionSummary::new(status.code(), "error")
    }
}
