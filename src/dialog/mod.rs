//! Dialog sessions: one per dialog token.
//!
//! A [`DialogSession`] wraps the bot's [`DialogHandler`] and a [`DialogApi`]
//! bound to the token, and moves through
//! `PendingOpen -> Open -> Closed`. Handler errors are logged and never
//! abort a transition.
//!
//! Live sessions run on their own Tokio task ([`spawn`]) fed by an unbounded
//! channel, so events for one token are handled strictly in the order the
//! dispatcher delivered them while other tokens proceed independently.
//! Delivery never waits on the session: a hung handler only backs up its
//! own inbox.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, Instrument};

pub mod api;

pub use api::DialogApi;

use crate::platform::BotApi;
use crate::types::{ConversationData, ConversationMessageData, PersonData};

/// Bot logic for one dialog.
///
/// Implementations keep whatever per-dialog state they need in `self`;
/// one handler instance serves exactly one dialog token.
#[async_trait]
pub trait DialogHandler: Send {
    /// The dialog is open; the first messages may be sent.
    async fn on_open(
        &mut self,
        counterpart: &PersonData,
        conversation: &ConversationData,
        api: &DialogApi,
    ) -> anyhow::Result<()>;

    /// A message was posted in the dialog, by the bot itself or the counterpart.
    async fn on_message(
        &mut self,
        message: &ConversationMessageData,
        api: &DialogApi,
    ) -> anyhow::Result<()>;

    /// The dialog is closed; nothing can be sent any more.
    async fn on_closed(&mut self, _api: &DialogApi) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Lifecycle state of a dialog session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, open event not yet delivered.
    PendingOpen,
    /// Open event delivered; messages flow.
    Open,
    /// Terminal.
    Closed,
}

/// One active dialog.
pub struct DialogSession {
    token: String,
    state: SessionState,
    counterpart: Option<PersonData>,
    handler: Box<dyn DialogHandler>,
    api: DialogApi,
}

impl std::fmt::Debug for DialogSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogSession")
            .field("token", &self.token)
            .field("state", &self.state)
            .field("counterpart", &self.counterpart)
            .finish_non_exhaustive()
    }
}

impl DialogSession {
    /// Create a session in [`SessionState::PendingOpen`].
    pub fn new(
        token: impl Into<String>,
        handler: Box<dyn DialogHandler>,
        bot_api: Arc<dyn BotApi>,
    ) -> Self {
        let token = token.into();
        let api = DialogApi::new(token.as_str(), bot_api);
        Self {
            token,
            state: SessionState::PendingOpen,
            counterpart: None,
            handler,
            api,
        }
    }

    /// The dialog token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The counterpart person, once the dialog is open.
    pub fn counterpart(&self) -> Option<&PersonData> {
        self.counterpart.as_ref()
    }

    /// Deliver the open event. The state becomes `Open` even if the handler fails.
    pub async fn open(&mut self, counterpart: PersonData, conversation: ConversationData) {
        if self.state == SessionState::Closed {
            debug!(token = %self.token, "ignoring open event for closed dialog");
            return;
        }
        if let Err(e) = self
            .handler
            .on_open(&counterpart, &conversation, &self.api)
            .await
        {
            error!(
                token = %self.token,
                error = %e,
                person = ?counterpart,
                conversation = ?conversation,
                "error handling dialog open event"
            );
        }
        if self.counterpart.is_none() {
            self.counterpart = Some(counterpart);
        }
        self.state = SessionState::Open;
    }

    /// Deliver an inbound message.
    ///
    /// Only valid while `Open`; the dispatcher guarantees the ordering. A
    /// closed session drops the message.
    pub async fn message(&mut self, message: ConversationMessageData) {
        if self.state == SessionState::Closed {
            debug!(token = %self.token, "ignoring message for closed dialog");
            return;
        }
        if let Err(e) = self.handler.on_message(&message, &self.api).await {
            error!(
                token = %self.token,
                error = %e,
                message = ?message,
                "error handling dialog message event"
            );
        }
    }

    /// Deliver the closed event. Once `Closed`, further calls are ignored.
    pub async fn closed(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if let Err(e) = self.handler.on_closed(&self.api).await {
            error!(token = %self.token, error = %e, "error handling dialog closed event");
        }
        self.state = SessionState::Closed;
        debug!(token = %self.token, "dialog session closed");
    }
}

/// Event delivered into a running session's inbox.
#[derive(Debug)]
pub(crate) enum DialogEvent {
    Opened {
        counterpart: PersonData,
        conversation: ConversationData,
    },
    Message(ConversationMessageData),
    Closed,
}

/// Sending half of a running session's inbox.
pub(crate) type DialogSender = mpsc::UnboundedSender<DialogEvent>;

/// Run `session` on its own task and return its inbox.
pub(crate) fn spawn(session: DialogSession) -> (DialogSender, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let span = tracing::info_span!("dialog", token = %session.token());
    let handle = tokio::spawn(run_session(session, rx).instrument(span));
    (tx, handle)
}

/// Drive a session from its inbox until it is closed or the inbox is dropped.
async fn run_session(
    mut session: DialogSession,
    mut events: mpsc::UnboundedReceiver<DialogEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            DialogEvent::Opened {
                counterpart,
                conversation,
            } => session.open(counterpart, conversation).await,
            DialogEvent::Message(message) => session.message(message).await,
            DialogEvent::Closed => {
                session.closed().await;
                return;
            }
        }
    }
    debug!(token = %session.token(), "dialog inbox dropped before close");
}
