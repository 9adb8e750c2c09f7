//! Outbound actions a dialog handler can take, bound to one dialog token.

use std::sync::Arc;

use crate::platform::{BotApi, PlatformError};
use crate::types::{DialogMessage, FinishReason, MultichoiceOption};

/// Outbound-action facade for a single dialog.
///
/// The send methods return the action id the server assigns; it reappears on
/// the inbound message webhook. After [`hand_off`](Self::hand_off),
/// [`solved`](Self::solved) or [`abort`](Self::abort) the dialog is over and
/// no further sends should be scheduled. The facade does not enforce this.
#[derive(Clone)]
pub struct DialogApi {
    token: Arc<str>,
    bot_api: Arc<dyn BotApi>,
}

impl std::fmt::Debug for DialogApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogApi")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

impl DialogApi {
    /// Bind a facade to `token`.
    pub fn new(token: impl Into<Arc<str>>, bot_api: Arc<dyn BotApi>) -> Self {
        Self {
            token: token.into(),
            bot_api,
        }
    }

    /// The dialog token this facade acts on.
    pub fn token(&self) -> &str {
        &self.token
    }

    async fn send(&self, message: DialogMessage) -> Result<String, PlatformError> {
        self.bot_api.send_dialog_message(&self.token, message).await
    }

    /// Send a plain text message.
    ///
    /// # Errors
    ///
    /// Returns the platform error if the call fails.
    pub async fn send_text_message(
        &self,
        text: impl Into<String>,
    ) -> Result<String, PlatformError> {
        self.send(DialogMessage::Text { text: text.into() }).await
    }

    /// Ask a free-text question.
    ///
    /// # Errors
    ///
    /// Returns the platform error if the call fails.
    pub async fn send_text_question(
        &self,
        text: impl Into<String>,
    ) -> Result<String, PlatformError> {
        let message = DialogMessage::TextQuestion { text: text.into() };
        self.send(message).await
    }

    /// Ask a question with fixed answers, shown in the given order.
    ///
    /// # Errors
    ///
    /// Returns the platform error if the call fails.
    pub async fn send_multichoice_question(
        &self,
        text: impl Into<String>,
        options: Vec<MultichoiceOption>,
    ) -> Result<String, PlatformError> {
        self.send(DialogMessage::MultichoiceQuestion {
            text: text.into(),
            options,
        })
        .await
    }

    /// Ask for a rating.
    ///
    /// # Errors
    ///
    /// Returns the platform error if the call fails.
    pub async fn send_rating_question(
        &self,
        text: impl Into<String>,
    ) -> Result<String, PlatformError> {
        let message = DialogMessage::RatingQuestion { text: text.into() };
        self.send(message).await
    }

    /// Finish: another bot (or an agent) continues.
    ///
    /// # Errors
    ///
    /// Returns the platform error if the call fails.
    pub async fn hand_off(&self) -> Result<(), PlatformError> {
        self.finish(FinishReason::HandOff).await
    }

    /// Finish: the issue was solved, stop the boarding chain.
    ///
    /// # Errors
    ///
    /// Returns the platform error if the call fails.
    pub async fn solved(&self) -> Result<(), PlatformError> {
        self.finish(FinishReason::Solved).await
    }

    /// Finish: the issue could not be solved, abort the boarding.
    ///
    /// # Errors
    ///
    /// Returns the platform error if the call fails.
    pub async fn abort(&self) -> Result<(), PlatformError> {
        self.finish(FinishReason::Aborted).await
    }

    async fn finish(&self, reason: FinishReason) -> Result<(), PlatformError> {
        self.bot_api.finish_dialog(&self.token, reason).await
    }
}
