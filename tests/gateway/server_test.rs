//! Tests for the webhook router and the ingress loop.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::json;
use tokio::sync::mpsc;
use tower::ServiceExt;

use botgate::dispatcher::WebhookDispatcher;
use botgate::gateway::server::{ACK_BODY, HEALTH_BODY};
use botgate::gateway::signature::sign_payload;
use botgate::gateway::{
    self, AppState, InboundWebhook, EVENT_HEADER, EXPECTED_USER_AGENT, SIGNATURE_HEADER,
    WEBHOOK_PATH,
};
use botgate::types::{Context, PersonData};

use crate::support::{ApiCall, RecordingApi, TestPolicy, BOT_ID};

const SECRET: &str = "gateway-test-secret";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn app() -> (Router, mpsc::Receiver<InboundWebhook>) {
    let (tx, rx) = mpsc::channel(16);
    let context = Context::new(BOT_ID, PersonData::default());
    (gateway::router(AppState::new(SECRET, context, tx)), rx)
}

fn webhook(event: &str, body: &[u8], signature: &str) -> Request<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(WEBHOOK_PATH)
        .header("user-agent", EXPECTED_USER_AGENT)
        .header(EVENT_HEADER, event)
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body.to_vec()));
    match request {
        Ok(request) => request,
        Err(e) => panic!("request should build: {e}"),
    }
}

fn signed(event: &str, body: &[u8]) -> Request<Body> {
    webhook(event, body, &sign_payload(SECRET, body))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
    let response = match app.oneshot(request).await {
        Ok(response) => response,
        Err(e) => match e {},
    };
    let status = response.status();
    let bytes = match axum::body::to_bytes(response.into_body(), usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => panic!("body should be readable: {e}"),
    };
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_answers() {
    let (app, _rx) = app();
    let request = Request::builder().uri("/").body(Body::empty());
    let Ok(request) = request else {
        panic!("request should build");
    };

    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, HEALTH_BODY);
}

#[tokio::test]
async fn valid_webhook_is_acknowledged_and_queued() {
    let (app, mut rx) = app();
    let body = br#"{ "dialogToken": "dlg-1" }"#;

    let (status, text) = send(app, signed("bot.dialog.closed", body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, ACK_BODY);
    let Ok(queued) = rx.try_recv() else {
        panic!("accepted webhook should be queued");
    };
    assert_eq!(queued.event, "bot.dialog.closed");
    assert_eq!(queued.payload, json!({"dialogToken": "dlg-1"}));
    assert_eq!(queued.context.dialog_bot_id, BOT_ID);
}

#[tokio::test]
async fn wrong_user_agent_is_rejected() {
    let (app, mut rx) = app();
    let body = b"{}";
    let request = Request::builder()
        .method("POST")
        .uri(WEBHOOK_PATH)
        .header("user-agent", "Mozilla/5.0")
        .header(EVENT_HEADER, "bot.dialog.closed")
        .header(SIGNATURE_HEADER, sign_payload(SECRET, body))
        .body(Body::from(body.to_vec()));
    let Ok(request) = request else {
        panic!("request should build");
    };

    let (status, text) = send(app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(text, "Non unblu webhook useragent");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn missing_event_header_is_rejected() {
    let (app, mut rx) = app();
    let body = b"{}";
    let request = Request::builder()
        .method("POST")
        .uri(WEBHOOK_PATH)
        .header("user-agent", EXPECTED_USER_AGENT)
        .header(SIGNATURE_HEADER, sign_payload(SECRET, body))
        .body(Body::from(body.to_vec()));
    let Ok(request) = request else {
        panic!("request should build");
    };

    let (status, text) = send(app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(text, "Webhook missing event header");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn bad_signature_is_rejected() {
    let (app, mut rx) = app();
    let body = br#"{"dialogToken":"dlg-1"}"#;
    let tampered = br#"{"dialogToken":"dlg-2"}"#;

    let (status, text) = send(
        app,
        webhook("bot.dialog.closed", tampered, &sign_payload(SECRET, body)),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(text, "Webhook has missing or invalid signature");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn signed_garbage_is_rejected_as_invalid_json() {
    let (app, mut rx) = app();

    let (status, text) = send(app, signed("bot.dialog.closed", b"not json")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(text, "Webhook body is not valid JSON");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn unknown_event_is_still_acknowledged() {
    let (app, mut rx) = app();

    let (status, _) = send(app, signed("conversation.created", b"{}")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(rx.try_recv().is_ok());
}

#[tokio::test]
async fn closed_ingress_answers_unavailable() {
    let (app, rx) = app();
    drop(rx);

    let (status, _) = send(app, signed("bot.dialog.closed", b"{}")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

// ---------------------------------------------------------------------------
// Ingress
// ---------------------------------------------------------------------------

async fn wait_for_calls(api: &RecordingApi, count: usize) -> Vec<ApiCall> {
    for _ in 0..100 {
        let calls = api.calls();
        if calls.len() >= count {
            return calls;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {count} platform calls, saw {:?}", api.calls());
}

#[tokio::test]
async fn signed_offer_reaches_the_platform() {
    let api = RecordingApi::new();
    let (policy, _events) = TestPolicy::new(true);
    let dispatcher = Arc::new(WebhookDispatcher::new(policy, api.clone()));
    let (ingress, task) = gateway::spawn_ingress(dispatcher);
    let context = Context::new(BOT_ID, PersonData::default());
    let app = gateway::router(AppState::new(SECRET, context, ingress));

    let body = serde_json::to_vec(&json!({
        "onboardingToken": "off-1",
        "onboardingPerson": {"id": "v-1", "personType": "VISITOR"},
        "conversation": {"id": "c-1"}
    }));
    let Ok(body) = body else {
        panic!("payload should serialize");
    };
    let (status, _) = send(app, signed("bot.onboarding_offer", &body)).await;
    assert_eq!(status, StatusCode::OK);

    let calls = wait_for_calls(&api, 1).await;
    assert_eq!(
        calls,
        vec![ApiCall::Accept {
            offer_token: "off-1".to_owned(),
            bot_id: BOT_ID.to_owned(),
        }]
    );

    // The router (and its sender) is gone; the loop drains and ends.
    let finished = tokio::time::timeout(Duration::from_secs(1), task).await;
    assert!(matches!(finished, Ok(Ok(()))));
}

#[tokio::test]
async fn ingress_keeps_dialog_events_in_order() {
    let api = RecordingApi::new();
    let (policy, mut events) = TestPolicy::new(true);
    let dispatcher = Arc::new(WebhookDispatcher::new(policy, api));
    let (tx, rx) = mpsc::channel(16);
    let context = Context::new(BOT_ID, PersonData::default());

    let inbound = |event: &str, payload: serde_json::Value| InboundWebhook {
        event: event.to_owned(),
        payload,
        context: context.clone(),
    };
    let queue = [
        inbound(
            "bot.dialog.opened",
            json!({"dialogToken": "dlg-1", "dialogType": "ONBOARDING",
                   "counterpartPerson": {"id": "v-1"}, "conversation": {"id": "c-1"}}),
        ),
        inbound(
            "bot.dialog.message",
            json!({"dialogToken": "dlg-1", "conversationMessage": {"text": "slow"}}),
        ),
        inbound(
            "bot.dialog.message",
            json!({"dialogToken": "dlg-1", "conversationMessage": {"text": "fast"}}),
        ),
        inbound("bot.dialog.closed", json!({"dialogToken": "dlg-1"})),
    ];
    for item in queue {
        assert!(tx.send(item).await.is_ok());
    }
    drop(tx);

    gateway::run_ingress(Arc::clone(&dispatcher), rx).await;
    assert_eq!(dispatcher.active_dialogs().await, 0);

    let mut seen = Vec::new();
    for _ in 0..4 {
        seen.push(crate::support::next_observed(&mut events).await);
    }
    let labels: Vec<String> = seen
        .into_iter()
        .map(|o| match o {
            crate::support::Observed::Opened { .. } => "open".to_owned(),
            crate::support::Observed::Message { text, .. } => text,
            crate::support::Observed::Closed { .. } => "close".to_owned(),
        })
        .collect();
    assert_eq!(labels, vec!["open", "slow", "fast", "close"]);
}
