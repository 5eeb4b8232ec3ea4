//! End-to-end tests of the HTTP surface

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use rstest::rstest;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use recollect_core::{
    InMemoryQueue, InteractionPublisher, InteractionQueue, Message, QueueError, QueuedInteraction,
    UnorderedQueue,
};
use recollect_flags::{Features, InMemoryFlagSource};
use recollect_server::{create_router, AppState, AuthUser, ServerConfig, StaticTokenAuthenticator};

const TOKEN: &str = "test-token";
const ARTIFACT: &str = "92074329-d7e2-4bc7-a1cb-4a9c62477b4d";

struct Harness {
    app: Router,
    queue: InteractionQueue,
    flags: Arc<InMemoryFlagSource>,
}

fn harness_with(queue: InteractionQueue, config: ServerConfig) -> Harness {
    let flags = Arc::new(InMemoryFlagSource::new());
    let authenticator = StaticTokenAuthenticator::default().with_token(
        TOKEN,
        AuthUser {
            id: Uuid::new_v4(),
            email: None,
        },
    );
    let state = Arc::new(AppState::new(
        InteractionPublisher::new(queue.clone(), Duration::from_secs(1)),
        Features::new(flags.clone()),
        Arc::new(authenticator),
        config,
    ));
    Harness {
        app: create_router(state),
        queue,
        flags,
    }
}

fn harness() -> Harness {
    let queue: InteractionQueue = Arc::new(InMemoryQueue::new("interactions", Duration::from_secs(30)));
    harness_with(queue, ServerConfig::default())
}

fn post(body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/interaction")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> Result<(StatusCode, Vec<u8>), String> {
    let response = app.clone().oneshot(request).await.map_err(|e| e.to_string())?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .map_err(|e| e.to_string())?;
    Ok((status, bytes.to_vec()))
}

async fn send_json(app: &Router, request: Request<Body>) -> Result<(StatusCode, Value), String> {
    let (status, bytes) = send(app, request).await?;
    let body = serde_json::from_slice(&bytes).map_err(|e| e.to_string())?;
    Ok((status, body))
}

#[tokio::test]
async fn recall_mints_an_event_and_queues_it() -> Result<(), String> {
    let h = harness();
    let (status, body) = send_json(
        &h.app,
        post(json!({"kind": "recall", "metadata": {"query": "rust"}, "timestamp": 1700000000.0}), Some(TOKEN)),
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    let event_id = body["event_id"].as_str().ok_or("missing event_id")?;
    assert!(Uuid::parse_str(event_id).is_ok());

    let queued = h.queue.retrieve(Duration::ZERO, 10).await.map_err(|e| e.to_string())?;
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].content.event_id.to_string(), event_id);
    Ok(())
}

#[tokio::test]
async fn edge_interaction_keeps_client_event_id() -> Result<(), String> {
    let h = harness();
    let event_id = Uuid::new_v4().to_string();
    let (status, body) = send_json(
        &h.app,
        post(
            json!({"kind": "peel", "event_id": event_id, "artifact_id": ARTIFACT, "timestamp": 1700000005}),
            Some(TOKEN),
        ),
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["event_id"], event_id.as_str());
    Ok(())
}

#[rstest]
#[case::edge_without_event(json!({"kind": "peel", "artifact_id": ARTIFACT, "timestamp": 1.0}), "missing-field", "event_id")]
#[case::edge_without_artifact(json!({"kind": "peel", "event_id": ARTIFACT, "timestamp": 1.0}), "missing-field", "artifact_id")]
#[case::missing_kind(json!({"timestamp": 1.0}), "missing-field", "kind")]
#[case::unknown_kind(json!({"kind": "bogus", "timestamp": 1.0}), "invalid-kind", "kind")]
#[case::negative_timestamp(json!({"kind": "recall", "timestamp": -5}), "invalid-timestamp", "timestamp")]
#[case::textual_timestamp(json!({"kind": "recall", "timestamp": "yesterday"}), "invalid-timestamp", "timestamp")]
#[case::numeric_kind(json!({"kind": 5, "timestamp": 1.0}), "invalid-kind", "kind")]
#[case::numeric_artifact(json!({"kind": "peel", "event_id": ARTIFACT, "artifact_id": 7, "timestamp": 1.0}), "invalid-identifier", "artifact_id")]
#[case::textual_metadata(json!({"kind": "recall", "metadata": "x", "timestamp": 1.0}), "invalid-metadata", "metadata")]
#[case::bad_artifact(json!({"kind": "peel", "event_id": ARTIFACT, "artifact_id": "nope", "timestamp": 1.0}), "invalid-identifier", "artifact_id")]
#[tokio::test]
async fn invalid_payloads_are_rejected_and_not_queued(
    #[case] payload: Value,
    #[case] code: &str,
    #[case] field: &str,
) -> Result<(), String> {
    let h = harness();
    let (status, body) = send_json(&h.app, post(payload, Some(TOKEN))).await?;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], code);
    assert_eq!(body["field"], field);
    assert_eq!(h.queue.approximate_depth().await.map_err(|e| e.to_string())?, 0);
    Ok(())
}

#[rstest]
#[case::not_json("{kind: recall", StatusCode::BAD_REQUEST)]
#[case::not_an_object("\"recall\"", StatusCode::UNPROCESSABLE_ENTITY)]
#[tokio::test]
async fn unreadable_bodies_get_a_json_error(#[case] raw: &str, #[case] expected: StatusCode) -> Result<(), String> {
    let h = harness();
    let request = Request::builder()
        .method("POST")
        .uri("/interaction")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
        .body(Body::from(raw.to_string()))
        .map_err(|e| e.to_string())?;
    let (status, body) = send_json(&h.app, request).await?;

    assert_eq!(status, expected);
    assert_eq!(body["code"], "malformed-body");
    assert!(body["message"].as_str().is_some());
    Ok(())
}

#[rstest]
#[case::missing(None)]
#[case::unknown(Some("guess"))]
#[tokio::test]
async fn requests_need_a_known_token(#[case] token: Option<&str>) -> Result<(), String> {
    let h = harness();
    let (status, body) = send_json(&h.app, post(json!({"kind": "recall", "timestamp": 1.0}), token)).await?;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");
    assert_ne!(body["message"], "Unauthorized");
    Ok(())
}

#[tokio::test]
async fn prod_hides_auth_details() -> Result<(), String> {
    let queue: InteractionQueue = Arc::new(InMemoryQueue::new("interactions", Duration::from_secs(30)));
    let config = ServerConfig {
        detailed_errors: false,
        ..Default::default()
    };
    let h = harness_with(queue, config);
    let (status, body) = send_json(&h.app, post(json!({"kind": "recall", "timestamp": 1.0}), None)).await?;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthorized");
    Ok(())
}

#[tokio::test]
async fn maintenance_mode_blocks_api_but_not_health() -> Result<(), String> {
    let h = harness();
    h.flags.set("killswitch.maintenance-mode", true);

    // Checked before credentials
    let (status, bytes) = send(&h.app, post(json!({"kind": "recall", "timestamp": 1.0}), None)).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(String::from_utf8_lossy(&bytes), "Service is undergoing maintenance");

    let health = Request::builder().uri("/").body(Body::empty()).map_err(|e| e.to_string())?;
    let (status, bytes) = send(&h.app, health).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"ok");

    let status_request = Request::builder()
        .uri("/status")
        .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
        .body(Body::empty())
        .map_err(|e| e.to_string())?;
    let (status, body) = send_json(&h.app, status_request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["maintenance"], true);

    h.flags.set("killswitch.maintenance-mode", false);
    let (status, _) = send(&h.app, post(json!({"kind": "recall", "timestamp": 1.0}), Some(TOKEN))).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

struct DownQueue;

#[async_trait]
impl UnorderedQueue<QueuedInteraction> for DownQueue {
    fn name(&self) -> &str {
        "down"
    }

    async fn enqueue_multiple_with_delay(
        &self,
        _items: Vec<(QueuedInteraction, Duration)>,
    ) -> Result<(), QueueError> {
        Err(QueueError::Unavailable("broker offline".into()))
    }

    async fn retrieve(
        &self,
        _timeout: Duration,
        _limit: usize,
    ) -> Result<Vec<Message<QueuedInteraction>>, QueueError> {
        Ok(Vec::new())
    }

    async fn acknowledge(
        &self,
        _successful: Vec<Message<QueuedInteraction>>,
        _retry_now: Vec<Message<QueuedInteraction>>,
        _retry_later: Vec<(Message<QueuedInteraction>, Duration)>,
    ) -> Result<(), QueueError> {
        Ok(())
    }

    async fn approximate_depth(&self) -> Result<usize, QueueError> {
        Err(QueueError::Unavailable("broker offline".into()))
    }
}

#[tokio::test]
async fn queue_failure_asks_client_to_retry() -> Result<(), String> {
    let h = harness_with(Arc::new(DownQueue), ServerConfig::default());
    let (status, body) = send_json(&h.app, post(json!({"kind": "recall", "timestamp": 1.0}), Some(TOKEN))).await?;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "retry");
    assert!(body["message"].as_str().is_some());
    assert!(body["event_id"].as_str().is_some());
    Ok(())
}

#[tokio::test]
async fn status_reports_queue_depth() -> Result<(), String> {
    let h = harness();
    send(&h.app, post(json!({"kind": "recall", "timestamp": 1.0}), Some(TOKEN))).await?;

    let request = Request::builder()
        .uri("/status")
        .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
        .body(Body::empty())
        .map_err(|e| e.to_string())?;
    let (status, body) = send_json(&h.app, request).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["maintenance"], false);
    assert_eq!(body["queue"]["name"], "interactions");
    assert_eq!(body["queue"]["approximate_depth"], 1);

    let down = harness_with(Arc::new(DownQueue), ServerConfig::default());
    let request = Request::builder()
        .uri("/status")
        .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
        .body(Body::empty())
        .map_err(|e| e.to_string())?;
    let (_, body) = send_json(&down.app, request).await?;
    assert!(body["queue"]["approximate_depth"].is_null());
    Ok(())
}
