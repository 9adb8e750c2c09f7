//! Axum router for the health check and the webhook endpoint, plus the
//! ingress loop between the HTTP handlers and the dispatcher.
//!
//! The handler answers as soon as the event is queued; dispatch happens
//! afterwards. The ingress loop keeps arrival order for dialog events and
//! moves offers (which wait on the bot policy and a remote call) onto their
//! own tasks.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use super::signature::{self, GateError};
use super::WEBHOOK_PATH;
use crate::dispatcher::{EventKind, WebhookDispatcher};
use crate::types::Context;

/// Body of the health check response.
pub const HEALTH_BODY: &str = "Dialog bot gateway";

/// Body of the acknowledgement for accepted webhooks.
pub const ACK_BODY: &str = "OK";

/// Ingress queue capacity; handlers wait when it is full.
const INGRESS_CAPACITY: usize = 1024;

/// An authenticated webhook waiting for dispatch.
#[derive(Debug, Clone)]
pub struct InboundWebhook {
    /// Event name from the event header.
    pub event: String,
    /// Parsed body.
    pub payload: Value,
    /// Request context.
    pub context: Context,
}

/// Shared state of the webhook handlers.
#[derive(Clone)]
pub struct AppState {
    secret: Arc<str>,
    context: Arc<Context>,
    ingress: mpsc::Sender<InboundWebhook>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create handler state.
    ///
    /// `secret` is the dialog bot's webhook secret, `context` is copied into
    /// every accepted event, `ingress` is the queue the dispatcher reads.
    pub fn new(
        secret: impl Into<Arc<str>>,
        context: Context,
        ingress: mpsc::Sender<InboundWebhook>,
    ) -> Self {
        Self {
            secret: secret.into(),
            context: Arc::new(context),
            ingress,
        }
    }
}

/// Build the gateway router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route(WEBHOOK_PATH, post(webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    HEALTH_BODY
}

async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let event = match signature::authenticate(&state.secret, &headers, &body) {
        Ok(event) => event,
        Err(e) => return e.into_response(),
    };

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(event = %event, error = %e, "dropping webhook with malformed body");
            return GateError::InvalidBody.into_response();
        }
    };

    info!(event = %event, "received webhook event");
    let inbound = InboundWebhook {
        event,
        payload,
        context: Context::clone(&state.context),
    };
    if state.ingress.send(inbound).await.is_err() {
        warn!("ingress queue closed, rejecting webhook");
        return (StatusCode::SERVICE_UNAVAILABLE, "Gateway shutting down").into_response();
    }

    (StatusCode::OK, ACK_BODY).into_response()
}

/// Create the ingress queue and spawn its consumer.
pub fn spawn_ingress(
    dispatcher: Arc<WebhookDispatcher>,
) -> (mpsc::Sender<InboundWebhook>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(INGRESS_CAPACITY);
    let handle = tokio::spawn(run_ingress(dispatcher, rx));
    (tx, handle)
}

/// Feed queued webhooks to the dispatcher until every sender is dropped.
///
/// Returns once the queue is drained and all in-flight offers have settled.
pub async fn run_ingress(
    dispatcher: Arc<WebhookDispatcher>,
    mut inbound: mpsc::Receiver<InboundWebhook>,
) {
    let mut offers = JoinSet::new();

    while let Some(webhook) = inbound.recv().await {
        while offers.try_join_next().is_some() {}

        let is_offer = EventKind::from_name(&webhook.event).is_some_and(EventKind::is_offer);
        if is_offer {
            let dispatcher = Arc::clone(&dispatcher);
            offers.spawn(async move {
                dispatcher
                    .dispatch(&webhook.event, &webhook.payload, &webhook.context)
                    .await;
            });
        } else {
            dispatcher
                .dispatch(&webhook.event, &webhook.payload, &webhook.context)
                .await;
        }
    }

    debug!(pending = offers.len(), "ingress queue closed, waiting for offers");
    while offers.join_next().await.is_some() {}
}
