//! End-to-end mirroring tests: caller, mirror, upstream and tracking endpoint.

use serde_json::json;
use std::time::Duration;

mod common;

const WAIT: Duration = Duration::from_secs(3);

#[tokio::test]
async fn test_request_is_forwarded_and_mirrored() {
    let (upstream_addr, mut upstream_rx) = common::start_upstream(200, b"hello").await;
    let (collector_addr, mut collector_rx) = common::start_collector(200).await;
    let (mirror_addr, shutdown) = common::start_mirror(
        upstream_addr,
        &format!("http://{}/track", collector_addr),
        json!({ "max_capture_kb": 1 }),
    )
    .await;

    let res = common::client()
        .post(format!("http://{}/foo?x=1", mirror_addr))
        .body("0123456789")
        .send()
        .await
        .expect("Mirror unreachable");

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-upstream"], "mock");
    assert_eq!(&res.bytes().await.unwrap()[..], b"hello");

    let forwarded = common::next(&mut upstream_rx, WAIT).await;
    assert_eq!(forwarded.method, "POST");
    assert_eq!(forwarded.uri.path(), "/foo");
    assert_eq!(forwarded.uri.query(), Some("x=1"));
    assert_eq!(&forwarded.body[..], b"0123456789");

    let tracked = common::next(&mut collector_rx, WAIT).await;
    assert_eq!(tracked.method, "POST");
    assert_eq!(tracked.headers["content-type"], "text/plain");

    let expected_url = format!("http://{}/foo?x=1", upstream_addr);
    let expected = format!(
        "{{$responseBody}}hello{{/responseBody}},\
         {{$requestBody}}0123456789{{/requestBody}},\
         {{$requestQuery}}x=1{{/requestQuery}},\
         {{$requestUrl}}{}{{/requestUrl}}",
        expected_url
    );
    assert_eq!(std::str::from_utf8(&tracked.body).unwrap(), expected);

    shutdown.trigger();
}

#[tokio::test]
async fn test_large_bodies_are_clipped_in_payload_only() {
    static RESPONSE: [u8; 4096] = [b'r'; 4096];
    let (upstream_addr, mut upstream_rx) = common::start_upstream(200, &RESPONSE).await;
    let (collector_addr, mut collector_rx) = common::start_collector(200).await;
    let (mirror_addr, shutdown) = common::start_mirror(
        upstream_addr,
        &format!("http://{}/track", collector_addr),
        json!({ "max_capture_kb": 1 }),
    )
    .await;

    let request_body = vec![b'q'; 3000];
    let res = common::client()
        .put(format!("http://{}/upload", mirror_addr))
        .body(request_body.clone())
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(&res.bytes().await.unwrap()[..], &RESPONSE[..]);

    let forwarded = common::next(&mut upstream_rx, WAIT).await;
    assert_eq!(&forwarded.body[..], &request_body[..]);

    let tracked = common::next(&mut collector_rx, WAIT).await;
    assert_eq!(common::segment(&tracked.body, "responseBody"), &RESPONSE[..1024]);
    assert_eq!(common::segment(&tracked.body, "requestBody"), &request_body[..1024]);
    assert_eq!(common::segment(&tracked.body, "requestQuery"), b"");

    shutdown.trigger();
}

#[tokio::test]
async fn test_disabled_capture_sends_empty_body_segments() {
    let (upstream_addr, mut upstream_rx) = common::start_upstream(201, b"created").await;
    let (collector_addr, mut collector_rx) = common::start_collector(200).await;
    let (mirror_addr, shutdown) = common::start_mirror(
        upstream_addr,
        &format!("http://{}/track", collector_addr),
        json!({ "max_capture_kb": 0 }),
    )
    .await;

    let res = common::client()
        .post(format!("http://{}/items?id=7", mirror_addr))
        .body("full body")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 201);
    assert_eq!(&res.bytes().await.unwrap()[..], b"created");
    assert_eq!(&common::next(&mut upstream_rx, WAIT).await.body[..], b"full body");

    let tracked = common::next(&mut collector_rx, WAIT).await;
    assert_eq!(common::segment(&tracked.body, "responseBody"), b"");
    assert_eq!(common::segment(&tracked.body, "requestBody"), b"");
    assert_eq!(common::segment(&tracked.body, "requestQuery"), b"id=7");

    shutdown.trigger();
}

#[tokio::test]
async fn test_delivery_waits_for_response_stream_to_finish() {
    let chunks: Vec<&'static [u8]> = vec![b"first-", b"second"];
    let upstream_addr =
        common::start_streaming_upstream(chunks, Duration::from_millis(400)).await;
    let (collector_addr, mut collector_rx) = common::start_collector(200).await;
    let (mirror_addr, shutdown) = common::start_mirror(
        upstream_addr,
        &format!("http://{}/track", collector_addr),
        json!({}),
    )
    .await;

    let mut res = common::client()
        .get(format!("http://{}/stream", mirror_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let first = res.chunk().await.unwrap().expect("first chunk");
    assert_eq!(&first[..], b"first-");

    // Mid-stream: the caller has data, the tracking endpoint has nothing yet.
    common::assert_silent(&mut collector_rx, Duration::from_millis(150)).await;

    let mut rest = Vec::new();
    while let Some(chunk) = res.chunk().await.unwrap() {
        rest.extend_from_slice(&chunk);
    }
    assert_eq!(&rest[..], b"second");

    let tracked = common::next(&mut collector_rx, WAIT).await;
    assert_eq!(common::segment(&tracked.body, "responseBody"), b"first-second");

    shutdown.trigger();
}

#[tokio::test]
async fn test_delivery_deadline_starts_after_response_completes() {
    // The response alone takes longer than the delivery timeout.
    let chunks: Vec<&'static [u8]> = vec![b"a", b"b"];
    let upstream_addr =
        common::start_streaming_upstream(chunks, Duration::from_millis(500)).await;
    let (collector_addr, mut collector_rx) = common::start_collector(200).await;
    let (mirror_addr, shutdown) = common::start_mirror(
        upstream_addr,
        &format!("http://{}/track", collector_addr),
        json!({ "timeout_ms": 200 }),
    )
    .await;

    let res = common::client()
        .get(format!("http://{}/slow", mirror_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(&res.bytes().await.unwrap()[..], b"ab");

    let tracked = common::next(&mut collector_rx, WAIT).await;
    assert_eq!(common::segment(&tracked.body, "responseBody"), b"ab");
    assert_eq!(
        common::segment(&tracked.body, "requestUrl"),
        format!("http://{}/slow", upstream_addr).as_bytes()
    );

    shutdown.trigger();
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let (upstream_addr, mut upstream_rx) = common::start_upstream(200, b"ok").await;
    let (collector_addr, _collector_rx) = common::start_collector(200).await;
    let (mirror_addr, shutdown) = common::start_mirror(
        upstream_addr,
        &format!("http://{}/track", collector_addr),
        json!({}),
    )
    .await;

    let client = common::client();

    let res = client
        .get(format!("http://{}/", mirror_addr))
        .header("x-request-id", "req-42")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "req-42");
    let forwarded = common::next(&mut upstream_rx, WAIT).await;
    assert_eq!(forwarded.headers["x-request-id"], "req-42");

    let res = client.get(format!("http://{}/", mirror_addr)).send().await.unwrap();
    let generated = res.headers()["x-request-id"].to_str().unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&generated).is_ok());

    shutdown.trigger();
}

#[tokio::test]
async fn test_concurrent_requests_each_produce_one_delivery() {
    let (upstream_addr, _upstream_rx) = common::start_upstream(200, b"pong").await;
    let (collector_addr, mut collector_rx) = common::start_collector(200).await;
    let (mirror_addr, shutdown) = common::start_mirror(
        upstream_addr,
        &format!("http://{}/track", collector_addr),
        json!({}),
    )
    .await;

    let client = common::client();
    let concurrency = 20;

    let mut tasks = Vec::new();
    for i in 0..concurrency {
        let client = client.clone();
        let url = format!("http://{}/ping?n={}", mirror_addr, i);
        tasks.push(tokio::spawn(async move {
            let res = client.post(&url).body(format!("body-{}", i)).send().await.unwrap();
            assert_eq!(res.status(), 200);
            assert_eq!(&res.bytes().await.unwrap()[..], b"pong");
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let mut seen = Vec::new();
    for _ in 0..concurrency {
        let tracked = common::next(&mut collector_rx, WAIT).await;
        let query = String::from_utf8(common::segment(&tracked.body, "requestQuery").to_vec()).unwrap();
        let n: usize = query.trim_start_matches("n=").parse().unwrap();
        let body = common::segment(&tracked.body, "requestBody");
        assert_eq!(body, format!("body-{}", n).as_bytes());
        seen.push(n);
    }
    seen.sort_unstable();
    assert_eq!(seen, (0..concurrency).collect::<Vec<_>>());

    common::assert_silent(&mut collector_rx, Duration::from_millis(200)).await;
    shutdown.trigger();
}
