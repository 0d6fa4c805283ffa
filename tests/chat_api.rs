//! Endpoint-level tests against the real router with a scripted upstream.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use futures::StreamExt;
use tower::ServiceExt;

use chatrelay::api::chat::GENERATION_ID_HEADER;
use chatrelay::api::{self, AppState};
use chatrelay::llm::mock_client::{MockStep, MockUpstream};
use chatrelay::relay::{CancellationRegistry, StreamRelay};

fn app(mock: &MockUpstream) -> (Router, Arc<CancellationRegistry>) {
    let registry = Arc::new(CancellationRegistry::new());
    let relay = Arc::new(StreamRelay::new(
        Arc::new(mock.clone()),
        registry.clone(),
        "test instruction",
    ));
    (api::router(AppState::new(relay)), registry)
}

fn generate_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat/stream")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn stop_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat/stop")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

const HELLO_WORLD: &str = r#"{"messages":[{"role":"user","content":"write a hello world"}]}"#;

#[tokio::test]
async fn streams_fragment_concatenation_in_order() {
    let mock = MockUpstream::from_script(vec![
        MockStep::fragment("Here"),
        MockStep::fragment(" is"),
        MockStep::fragment(" `print('hi')`"),
    ]);
    let (app, _) = app(&mock);

    let response = app.oneshot(generate_request(HELLO_WORLD)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    assert!(response.headers().contains_key(GENERATION_ID_HEADER));

    assert_eq!(
        body_text(response.into_body()).await,
        "Here is `print('hi')`"
    );
}

#[tokio::test]
async fn empty_message_list_is_rejected_before_upstream() {
    let mock = MockUpstream::new();
    let (app, _) = app(&mock);

    let response = app
        .oneshot(generate_request(r#"{"messages":[]}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn malformed_body_is_a_client_error() {
    let mock = MockUpstream::new();
    let (app, _) = app(&mock);

    let response = app
        .oneshot(generate_request(r#"{"not_messages": true}"#))
        .await
        .unwrap();
    assert!(response.status().is_client_error());
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn upstream_failure_before_output_is_a_server_error() {
    let mock = MockUpstream::from_script(vec![MockStep::error("connection refused")]);
    let (app, _) = app(&mock);

    let response = app.oneshot(generate_request(HELLO_WORLD)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn stop_with_no_active_generation_still_succeeds() {
    let mock = MockUpstream::new();
    let (app, _) = app(&mock);

    let response = app.oneshot(stop_request("")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = body_text(response.into_body()).await;
    assert!(text.contains("\"success\":true"));
}

#[tokio::test]
async fn stop_mid_generation_closes_stream_without_error() {
    let mock = MockUpstream::from_script(vec![
        MockStep::fragment("Here"),
        MockStep::fragment(" is more").with_delay(30_000),
    ]);
    let (app, _) = app(&mock);

    let response = app
        .clone()
        .oneshot(generate_request(HELLO_WORLD))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut chunks = response.into_body().into_data_stream();
    let first = chunks.next().await.unwrap().unwrap();
    assert_eq!(&first[..], b"Here");

    let stop = app.oneshot(stop_request("")).await.unwrap();
    assert_eq!(stop.status(), StatusCode::OK);

    // The stream must close gracefully within a bounded window, without the
    // delayed fragment and without an error.
    let rest = tokio::time::timeout(Duration::from_secs(2), chunks.next())
        .await
        .expect("stream did not close after stop");
    assert!(rest.is_none());
}

#[tokio::test]
async fn stop_after_completion_has_no_observable_effect() {
    let mock = MockUpstream::from_script(vec![MockStep::fragment("done")]);
    let (app, registry) = app(&mock);

    let response = app
        .clone()
        .oneshot(generate_request(HELLO_WORLD))
        .await
        .unwrap();
    assert_eq!(body_text(response.into_body()).await, "done");
    assert_eq!(registry.active(), 0);

    let stop = app.oneshot(stop_request("")).await.unwrap();
    assert_eq!(stop.status(), StatusCode::OK);
    let text = body_text(stop.into_body()).await;
    assert!(text.contains("No active generation"));
}

#[tokio::test]
async fn concurrent_generations_are_independently_cancellable() {
    let mock = MockUpstream::new();
    mock.push_script(vec![
        MockStep::fragment("first"),
        MockStep::fragment(" hangs").with_delay(30_000),
    ]);
    mock.push_script(vec![
        MockStep::fragment("second"),
        MockStep::fragment(" finishes").with_delay(50),
    ]);
    let (app, _) = app(&mock);

    let response_a = app
        .clone()
        .oneshot(generate_request(HELLO_WORLD))
        .await
        .unwrap();
    let id_a = response_a.headers()[GENERATION_ID_HEADER]
        .to_str()
        .unwrap()
        .to_string();

    let response_b = app
        .clone()
        .oneshot(generate_request(HELLO_WORLD))
        .await
        .unwrap();
    let id_b = response_b.headers()[GENERATION_ID_HEADER]
        .to_str()
        .unwrap()
        .to_string();
    assert_ne!(id_a, id_b);

    let mut chunks_a = response_a.into_body().into_data_stream();
    let first_a = chunks_a.next().await.unwrap().unwrap();
    assert_eq!(&first_a[..], b"first");

    // Stop only the first generation, by its own handle.
    let stop = app
        .oneshot(stop_request(&format!(r#"{{"generation_id":"{}"}}"#, id_a)))
        .await
        .unwrap();
    assert_eq!(stop.status(), StatusCode::OK);

    let rest_a = tokio::time::timeout(Duration::from_secs(2), chunks_a.next())
        .await
        .expect("cancelled stream did not close");
    assert!(rest_a.is_none());

    // The second generation is unaffected and runs to completion.
    let text_b = tokio::time::timeout(Duration::from_secs(2), body_text(response_b.into_body()))
        .await
        .expect("surviving stream did not finish");
    assert_eq!(text_b, "second finishes");
}
