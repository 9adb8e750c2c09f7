//! Webhook dispatcher: routes authenticated events and owns the live dialogs.
//!
//! Offer events are answered through the [`BotPolicy`] and the [`BotApi`].
//! Dialog lifecycle events mutate the registry of live dialogs and are then
//! delivered into the matching session's inbox. Each registry operation and
//! the delivery that follows it happen under the registry lock, so per-token
//! ordering matches dispatch order. Delivery is a non-blocking send into an
//! unbounded inbox; bot callbacks run on the session's own task, so a hung
//! handler never holds the lock or stalls other tokens.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

pub mod events;

pub use events::{EventKind, WebhookEvent};

use self::events::{DialogClosedEvent, DialogMessageEvent, DialogOpenedEvent, OfferEvent};
use crate::bots::{self, BotPolicy};
use crate::dialog::{self, DialogEvent, DialogSender, DialogSession};
use crate::platform::{BotApi, PlatformError};
use crate::types::{Context, DialogType};

/// How long [`WebhookDispatcher::shutdown`] waits for sessions to finish.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Why handling a single event failed. Never leaves [`WebhookDispatcher::dispatch`].
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The payload does not have the shape of its event.
    #[error("malformed {kind} payload: {source}")]
    Decode {
        /// Event the payload was decoded as.
        kind: EventKind,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },

    /// An offer event without its phase's token field.
    #[error("offer payload is missing {0}")]
    MissingOfferToken(&'static str),

    /// The bot policy failed to decide on an offer.
    #[error("bot policy failed: {0:#}")]
    Policy(anyhow::Error),

    /// The accept/decline call failed.
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// A registered dialog: the session's inbox and its task.
struct LiveDialog {
    inbox: DialogSender,
    task: JoinHandle<()>,
}

/// Routes webhook events to the bot and its dialog sessions.
pub struct WebhookDispatcher {
    policy: Arc<dyn BotPolicy>,
    bot_api: Arc<dyn BotApi>,
    /// Live dialogs keyed by dialog token.
    dialogs: Mutex<HashMap<String, LiveDialog>>,
}

impl std::fmt::Debug for WebhookDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookDispatcher").finish_non_exhaustive()
    }
}

impl WebhookDispatcher {
    /// Create a dispatcher with an empty registry.
    pub fn new(policy: Arc<dyn BotPolicy>, bot_api: Arc<dyn BotApi>) -> Self {
        Self {
            policy,
            bot_api,
            dialogs: Mutex::new(HashMap::new()),
        }
    }

    /// Handle one webhook event.
    ///
    /// Never fails: unknown event names are logged and dropped, and any error
    /// while handling a known event is logged with the event name and payload.
    pub async fn dispatch(&self, event_name: &str, payload: &Value, context: &Context) {
        let Some(kind) = EventKind::from_name(event_name) else {
            info!(event = event_name, %payload, "received unknown webhook event");
            return;
        };
        if let Err(e) = self.handle(kind, payload, context).await {
            error!(event = event_name, error = %e, %payload, "error dispatching webhook event");
        }
    }

    async fn handle(
        &self,
        kind: EventKind,
        payload: &Value,
        context: &Context,
    ) -> Result<(), DispatchError> {
        match WebhookEvent::decode(kind, payload)? {
            WebhookEvent::Offer(offer) => self.handle_offer(offer, context).await?,
            WebhookEvent::DialogOpened(event) => self.handle_dialog_opened(event).await,
            WebhookEvent::DialogClosed(event) => self.handle_dialog_closed(event).await,
            WebhookEvent::DialogMessage(event) => self.handle_dialog_message(event).await,
        }
        Ok(())
    }

    async fn handle_offer(
        &self,
        offer: OfferEvent,
        context: &Context,
    ) -> Result<(), DispatchError> {
        let accept = bots::should_handle(
            self.policy.as_ref(),
            offer.phase,
            &offer.person,
            &offer.conversation,
        )
        .await
        .map_err(DispatchError::Policy)?;

        if accept {
            info!(
                phase = %offer.phase,
                person = offer.person.name(),
                conversation = %offer.conversation.id,
                "accepting offer"
            );
            let dialog_token = self
                .bot_api
                .accept_dialog_offer(&offer.offer_token, &context.dialog_bot_id)
                .await?;
            info!(phase = %offer.phase, %dialog_token, "offer accepted");
        } else {
            self.bot_api
                .decline_dialog_offer(&offer.offer_token, &context.dialog_bot_id)
                .await?;
            debug!(phase = %offer.phase, conversation = %offer.conversation.id, "offer declined");
        }
        Ok(())
    }

    async fn handle_dialog_opened(&self, event: DialogOpenedEvent) {
        let token = event.dialog_token;
        let Some(phase) = DialogType::parse(&event.dialog_type) else {
            warn!(
                dialog_token = %token,
                dialog_type = %event.dialog_type,
                "received dialog open event for unknown dialog type"
            );
            return;
        };

        let mut dialogs = self.dialogs.lock().await;
        if dialogs.contains_key(&token) {
            warn!(dialog_token = %token, "duplicate dialog open event, keeping the live session");
            return;
        }
        let Some(handler) = bots::create_dialog(self.policy.as_ref(), phase, &token) else {
            warn!(dialog_token = %token, %phase, "bot does not handle this dialog type");
            return;
        };

        let session = DialogSession::new(token.clone(), handler, Arc::clone(&self.bot_api));
        let (inbox, task) = dialog::spawn(session);
        let opened = DialogEvent::Opened {
            counterpart: event.counterpart_person,
            conversation: event.conversation,
        };
        if inbox.send(opened).is_err() {
            warn!(dialog_token = %token, "dialog session ended before it was opened");
            return;
        }
        dialogs.insert(token.clone(), LiveDialog { inbox, task });
        debug!(dialog_token = %token, %phase, live = dialogs.len(), "dialog opened");
    }

    async fn handle_dialog_closed(&self, event: DialogClosedEvent) {
        let token = event.dialog_token;
        // Remove before delivering so nothing else can reach a closing session.
        let removed = self.dialogs.lock().await.remove(&token);
        let Some(dialog) = removed else {
            warn!(dialog_token = %token, "received dialog closed event for unknown dialog");
            return;
        };
        if dialog.inbox.send(DialogEvent::Closed).is_err() {
            warn!(dialog_token = %token, "dialog session ended before it was closed");
        }
        debug!(dialog_token = %token, "dialog closed");
    }

    async fn handle_dialog_message(&self, event: DialogMessageEvent) {
        let token = event.dialog_token;
        let mut dialogs = self.dialogs.lock().await;
        let Some(dialog) = dialogs.get(&token) else {
            warn!(dialog_token = %token, "received dialog message event for unknown dialog");
            return;
        };
        let message = DialogEvent::Message(event.conversation_message);
        if dialog.inbox.send(message).is_err() {
            warn!(dialog_token = %token, "dialog session has stopped, dropping it");
            dialogs.remove(&token);
        }
    }

    /// Number of live dialogs.
    pub async fn active_dialogs(&self) -> usize {
        self.dialogs.lock().await.len()
    }

    /// Whether a dialog with `token` is live.
    pub async fn is_active(&self, token: &str) -> bool {
        self.dialogs.lock().await.contains_key(token)
    }

    /// Close every live dialog and wait up to [`SHUTDOWN_GRACE`] for their
    /// handlers to finish.
    pub async fn shutdown(&self) {
        self.shutdown_with_grace(SHUTDOWN_GRACE).await;
    }

    /// Close every live dialog and wait up to `grace` for their handlers.
    ///
    /// Sessions still running when the grace period ends are aborted.
    pub async fn shutdown_with_grace(&self, grace: Duration) {
        let drained: Vec<(String, LiveDialog)> = self.dialogs.lock().await.drain().collect();
        let count = drained.len();

        let mut tasks = Vec::with_capacity(count);
        for (token, dialog) in drained {
            if dialog.inbox.send(DialogEvent::Closed).is_err() {
                warn!(dialog_token = %token, "dialog session already stopped");
            }
            tasks.push((token, dialog.task));
        }

        let deadline = Instant::now().checked_add(grace).unwrap_or_else(Instant::now);
        let mut aborted = 0usize;
        for (token, mut task) in tasks {
            match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(dialog_token = %token, error = %e, "dialog task failed"),
                Err(_) => {
                    warn!(dialog_token = %token, "dialog handler still busy, aborting it");
                    task.abort();
                    aborted = aborted.saturating_add(1);
                }
            }
        }
        info!(count, aborted, "all dialogs closed");
    }
}
