//! Shared utilities for integration testing.

#![allow(dead_code)]

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, Method, StatusCode, Uri},
    routing::any,
    Router,
};
use serde_json::{Map, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use traffic_mirror::{HttpServer, ProxyConfig, Shutdown};

/// A request as seen by a mock server.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Start a mock upstream answering every request with `status` and `body`.
/// Every request it receives is forwarded on the returned channel.
pub async fn start_upstream(
    status: u16,
    response_body: &'static [u8],
) -> (SocketAddr, mpsc::UnboundedReceiver<Recorded>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let status = StatusCode::from_u16(status).unwrap();

    let app = Router::new().fallback(
        move |method: Method, uri: Uri, headers: HeaderMap, body: Bytes| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(Recorded { method, uri, headers, body });
                (status, [("x-upstream", "mock")], Bytes::from_static(response_body))
            }
        },
    );
    (serve(app).await, rx)
}

/// Start a mock upstream that streams `chunks`, pausing `gap` between them.
pub async fn start_streaming_upstream(chunks: Vec<&'static [u8]>, gap: Duration) -> SocketAddr {
    let app = Router::new().fallback(move || {
        let chunks = chunks.clone();
        async move {
            let (tx, rx) = mpsc::channel::<Bytes>(1);
            tokio::spawn(async move {
                for (i, chunk) in chunks.into_iter().enumerate() {
                    if i > 0 {
                        tokio::time::sleep(gap).await;
                    }
                    if tx.send(Bytes::from_static(chunk)).await.is_err() {
                        break;
                    }
                }
            });
            let stream = futures_util::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|chunk| (Ok::<_, Infallible>(chunk), rx))
            });
            Body::from_stream(stream)
        }
    });
    serve(app).await
}

/// Start a mock tracking endpoint. Every POST is forwarded on the channel
/// and answered with `status`.
pub async fn start_collector(status: u16) -> (SocketAddr, mpsc::UnboundedReceiver<Recorded>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let status = StatusCode::from_u16(status).unwrap();

    let app = Router::new().route(
        "/track",
        any(move |method: Method, uri: Uri, headers: HeaderMap, body: Bytes| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(Recorded { method, uri, headers, body });
                status
            }
        }),
    );
    (serve(app).await, rx)
}

/// Start a tracking endpoint that accepts connections and never answers.
pub async fn start_silent_collector() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Start the mirror in front of `upstream`, delivering to `tracking_url`.
pub async fn start_mirror(
    upstream: SocketAddr,
    tracking_url: &str,
    options: Value,
) -> (SocketAddr, Shutdown) {
    let mut config = ProxyConfig::default();
    config.upstream.address = upstream.to_string();
    config.interceptor = match options {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    config
        .interceptor
        .insert("tracking_url".into(), Value::String(tracking_url.to_string()));

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, &shutdown).expect("valid config");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

/// Test client that never goes through a proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Wait for the next recorded request, failing after `within`.
pub async fn next(rx: &mut mpsc::UnboundedReceiver<Recorded>, within: Duration) -> Recorded {
    tokio::time::timeout(within, rx.recv())
        .await
        .expect("timed out waiting for request")
        .expect("channel closed")
}

/// Assert nothing arrives on `rx` for `during`.
pub async fn assert_silent(rx: &mut mpsc::UnboundedReceiver<Recorded>, during: Duration) {
    if let Ok(Some(unexpected)) = tokio::time::timeout(during, rx.recv()).await {
        panic!("unexpected request: {:?}", unexpected);
    }
}

/// Extract the content of segment `name` from a tracking payload.
pub fn segment<'a>(payload: &'a [u8], name: &str) -> &'a [u8] {
    let open = format!("{{${}}}", name);
    let close = format!("{{/{}}}", name);
    let start = find(payload, open.as_bytes()).expect("opening marker") + open.len();
    let end = start + find(&payload[start..], close.as_bytes()).expect("closing marker");
    &payload[start..end]
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}
