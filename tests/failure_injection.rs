//! Failure injection tests: misbehaving origins and clients.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

mod common;

use common::{
    get, not_modified, ok, send_raw, start_origin, start_origin_with_delay, start_proxy,
};

#[tokio::test]
async fn truncated_origin_body_is_bad_gateway_and_not_cached() {
    let origin = start_origin(|_| {
        b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nonly ten!!".to_vec()
    })
    .await;
    let proxy = start_proxy(|_| {}).await;

    let response = get(proxy.addr, &origin, "/big/file.bin").await;
    assert_eq!(response.status, 502);

    let entry = proxy.entry_path(&origin, "/big/file.bin");
    assert!(!entry.exists());
    let leftovers = std::fs::read_dir(entry.parent().unwrap()).unwrap().count();
    assert_eq!(leftovers, 0, "temporary file left behind");
}

#[tokio::test]
async fn silent_origin_is_gateway_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                tokio::time::sleep(Duration::from_secs(30)).await;
            });
        }
    });

    let proxy = start_proxy(|config| config.timeouts.read_secs = 1).await;
    let response = send_raw(
        proxy.addr,
        &format!("GET /slow.html HTTP/1.1\r\nHost: {}\r\n\r\n", addr),
    )
    .await;
    assert_eq!(response.status, 504);
}

#[tokio::test]
async fn garbage_from_origin_is_bad_gateway() {
    let origin = start_origin(|_| b"this is not http\r\n\r\n".to_vec()).await;
    let proxy = start_proxy(|_| {}).await;

    let response = get(proxy.addr, &origin, "/x.html").await;
    assert_eq!(response.status, 502);
    assert!(!proxy.entry_path(&origin, "/x.html").exists());
}

#[tokio::test]
async fn vanishing_client_does_not_affect_others() {
    let origin = start_origin(|_| ok(b"still here")).await;
    let proxy = start_proxy(|_| {}).await;

    let mut half = tokio::net::TcpStream::connect(proxy.addr).await.unwrap();
    half.write_all(b"GET /x.html HTT").await.unwrap();
    drop(half);

    let response = get(proxy.addr, &origin, "/x.html").await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"still here");
}

#[tokio::test]
async fn connection_limit_queues_instead_of_rejecting() {
    let origin = start_origin_with_delay(Duration::from_millis(200), |_| ok(b"slow")).await;
    let proxy = start_proxy(|config| config.listener.max_connections = 1).await;

    let (a, b) = tokio::join!(
        get(proxy.addr, &origin, "/one.html"),
        get(proxy.addr, &origin, "/two.html"),
    );
    assert_eq!(a.status, 200);
    assert_eq!(b.status, 200);
    assert_eq!(origin.unconditional_gets(), 2);
}

#[tokio::test]
async fn shutdown_waits_for_in_flight_session() {
    let origin = start_origin_with_delay(Duration::from_millis(300), |_| ok(b"done")).await;
    let proxy = start_proxy(|_| {}).await;

    let addr = proxy.addr;
    let host = origin.host();
    let client = tokio::spawn(async move {
        send_raw(addr, &format!("GET /late.html HTTP/1.1\r\nHost: {}\r\n\r\n", host)).await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(proxy.stop().await, 0);
    let response = client.await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"done");
}

const LARGE_BODY: usize = 32 * 1024 * 1024;

fn large_origin_body() -> Vec<u8> {
    (0..=250u8).cycle().take(LARGE_BODY).collect()
}

#[tokio::test]
async fn stalled_reader_does_not_hold_up_same_key() {
    let body = large_origin_body();
    let origin = start_origin(move |req| {
        if req.if_modified_since.is_some() {
            not_modified()
        } else {
            ok(&body)
        }
    })
    .await;
    let proxy = start_proxy(|config| {
        config.cache.buffer_size = 64 * 1024;
        config.timeouts.client_write_secs = 30;
    })
    .await;

    // Asks for the body and never reads it.
    let mut stalled = tokio::net::TcpStream::connect(proxy.addr).await.unwrap();
    stalled
        .write_all(format!("GET /big.bin HTTP/1.1\r\nHost: {}\r\n\r\n", origin.host()).as_bytes())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    let response = tokio::time::timeout(
        Duration::from_secs(8),
        get(proxy.addr, &origin, "/big.bin"),
    )
    .await
    .expect("second client blocked behind the stalled reader");
    assert_eq!(response.status, 200);
    assert_eq!(response.header("Content-Length"), Some(LARGE_BODY.to_string().as_str()));
    assert_eq!(response.body.len(), LARGE_BODY);
    assert_eq!(origin.unconditional_gets(), 1);
    assert_eq!(origin.conditional_gets(), 1);

    drop(stalled);
}

#[tokio::test]
async fn stalled_reader_is_cut_off_after_write_deadline() {
    let body = large_origin_body();
    let origin = start_origin(move |_| ok(&body)).await;
    let proxy = start_proxy(|config| {
        config.cache.buffer_size = 64 * 1024;
        config.timeouts.client_write_secs = 1;
    })
    .await;

    let mut stalled = tokio::net::TcpStream::connect(proxy.addr).await.unwrap();
    stalled
        .write_all(format!("GET /big.bin HTTP/1.1\r\nHost: {}\r\n\r\n", origin.host()).as_bytes())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    let mut received = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), stalled.read_to_end(&mut received))
        .await
        .expect("proxy kept the stalled connection open");
    if read.is_ok() {
        assert!(received.len() < LARGE_BODY, "whole body arrived despite the deadline");
    }
    assert_eq!(proxy.stop().await, 0);
}
