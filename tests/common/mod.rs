//! Shared utilities for integration tests: a programmable mock origin, a
//! raw TCP client and a proxy running on an ephemeral port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use caching_proxy::lifecycle::Shutdown;
use caching_proxy::net::Listener;
use caching_proxy::{ProxyConfig, ProxyServer};

/// What the mock origin saw.
#[derive(Debug, Clone)]
pub struct OriginRequest {
    pub request_line: String,
    pub host: Option<String>,
    pub if_modified_since: Option<String>,
}

impl OriginRequest {
    pub fn path(&self) -> &str {
        self.request_line.split(' ').nth(1).unwrap_or("")
    }
}

#[derive(Default)]
struct Counters {
    unconditional: AtomicU32,
    conditional: AtomicU32,
}

/// Handle to a running mock origin.
pub struct MockOrigin {
    pub addr: SocketAddr,
    counters: Arc<Counters>,
}

impl MockOrigin {
    /// Value a client puts in `Host:` to reach this origin.
    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    pub fn unconditional_gets(&self) -> u32 {
        self.counters.unconditional.load(Ordering::SeqCst)
    }

    pub fn conditional_gets(&self) -> u32 {
        self.counters.conditional.load(Ordering::SeqCst)
    }
}

/// Start a mock origin answering each request with the bytes `respond`
/// returns.
pub async fn start_origin<F>(respond: F) -> MockOrigin
where
    F: Fn(&OriginRequest) -> Vec<u8> + Send + Sync + 'static,
{
    start_origin_with_delay(Duration::ZERO, respond).await
}

/// Like [`start_origin`], sleeping `delay` before every response.
pub async fn start_origin_with_delay<F>(delay: Duration, respond: F) -> MockOrigin
where
    F: Fn(&OriginRequest) -> Vec<u8> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let counters = Arc::new(Counters::default());
    let respond = Arc::new(respond);

    let task_counters = Arc::clone(&counters);
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let counters = Arc::clone(&task_counters);
            let respond = Arc::clone(&respond);
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                let Some(request) = read_origin_request(&mut reader).await else {
                    return;
                };
                if request.if_modified_since.is_some() {
                    counters.conditional.fetch_add(1, Ordering::SeqCst);
                } else {
                    counters.unconditional.fetch_add(1, Ordering::SeqCst);
                }

                let response = respond(&request);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let socket = reader.get_mut();
                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    MockOrigin { addr, counters }
}

async fn read_origin_request(reader: &mut BufReader<TcpStream>) -> Option<OriginRequest> {
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await.ok()?;
    let mut request = OriginRequest {
        request_line: request_line.trim_end().to_string(),
        host: None,
        if_modified_since: None,
    };

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await.ok()? == 0 {
            return None;
        }
        let line = line.trim_end();
        if line.is_empty() {
            return Some(request);
        }
        if let Some((name, value)) = line.split_once(':') {
            let value = value.trim().to_string();
            if name.eq_ignore_ascii_case("host") {
                request.host = Some(value);
            } else if name.eq_ignore_ascii_case("if-modified-since") {
                request.if_modified_since = Some(value);
            }
        }
    }
}

/// `200 OK` with `body`.
pub fn ok(body: &[u8]) -> Vec<u8> {
    let mut response = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", body.len())
        .into_bytes();
    response.extend_from_slice(body);
    response
}

/// `304 Not Modified` without a body.
pub fn not_modified() -> Vec<u8> {
    b"HTTP/1.1 304 Not Modified\r\nContent-Length: 0\r\n\r\n".to_vec()
}

/// A response as the client received it.
#[derive(Debug)]
pub struct RawResponse {
    pub raw: Vec<u8>,
    pub status: u16,
    pub head: String,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (n, v) = line.split_once(':')?;
            n.trim().eq_ignore_ascii_case(name).then(|| v.trim())
        })
    }
}

/// Send `request` verbatim and read until the proxy closes.
pub async fn send_raw(proxy: SocketAddr, request: &str) -> RawResponse {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), stream.read_to_end(&mut raw))
        .await
        .expect("proxy did not close the connection")
        .unwrap();

    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response without header terminator");
    let head = String::from_utf8_lossy(&raw[..split]).into_owned();
    let body = raw[split + 4..].to_vec();
    let status = head
        .split(' ')
        .nth(1)
        .and_then(|code| code.parse().ok())
        .expect("response without status code");

    RawResponse {
        raw,
        status,
        head,
        body,
    }
}

/// GET `path` from `origin` through the proxy.
pub async fn get(proxy: SocketAddr, origin: &MockOrigin, path: &str) -> RawResponse {
    send_raw(proxy, &format!("GET {} HTTP/1.1\r\nHost: {}\r\n\r\n", path, origin.host())).await
}

/// A proxy serving from a temporary cache directory.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub cache: tempfile::TempDir,
    shutdown: Shutdown,
    handle: JoinHandle<u64>,
}

impl TestProxy {
    /// Where the body for `path` on `origin` is stored.
    pub fn entry_path(&self, origin: &MockOrigin, path: &str) -> PathBuf {
        self.cache
            .path()
            .join(format!("{}_{}", origin.addr.ip(), origin.addr.port()))
            .join(path.trim_start_matches('/'))
    }

    /// Trigger shutdown and wait for the server. Returns the sessions left
    /// running after the grace period.
    pub async fn stop(self) -> u64 {
        self.shutdown.trigger();
        self.handle.await.unwrap()
    }
}

/// Start a proxy on an ephemeral port. `configure` may adjust the config
/// after the test defaults are applied.
pub async fn start_proxy(configure: impl FnOnce(&mut ProxyConfig)) -> TestProxy {
    let cache = tempfile::tempdir().unwrap();

    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.cache.root_dir = cache.path().to_string_lossy().into_owned();
    config.timeouts.connect_secs = 2;
    config.timeouts.read_secs = 5;
    config.timeouts.shutdown_grace_secs = 2;
    config.retries.base_delay_ms = 10;
    config.retries.max_delay_ms = 20;
    configure(&mut config);

    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = ProxyServer::new(&config);
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestProxy {
        addr,
        cache,
        shutdown,
        handle,
    }
}
