//! Outbound calls to the collaboration server.
//!
//! [`BotApi`] is the remote procedure boundary the dispatcher and dialog
//! sessions talk to. [`client::PlatformClient`] implements it over the
//! server's REST API and also carries the registration calls used at startup.

use async_trait::async_trait;

use crate::types::{DialogMessage, FinishReason};

pub mod client;

pub use client::PlatformClient;

/// Errors from calls to the collaboration server.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// The HTTP request failed or the server answered with an error status.
    #[error("error calling {service}: {source}")]
    Http {
        /// Service that was called, e.g. `acceptDialogOffer`.
        service: &'static str,
        /// Underlying transport or status error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a body we could not interpret.
    #[error("unexpected response from {service}: {detail}")]
    InvalidResponse {
        /// Service that was called.
        service: &'static str,
        /// What was wrong with the body.
        detail: String,
    },

    /// The configured server URL cannot be used as a base URL.
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Bot operations on the collaboration server.
///
/// All calls are asynchronous and may fail; no retry is attempted.
#[async_trait]
pub trait BotApi: Send + Sync {
    /// Accept a dialog offer. Returns the token of the dialog that will open.
    async fn accept_dialog_offer(
        &self,
        offer_token: &str,
        dialog_bot_id: &str,
    ) -> Result<String, PlatformError>;

    /// Decline a dialog offer.
    async fn decline_dialog_offer(
        &self,
        offer_token: &str,
        dialog_bot_id: &str,
    ) -> Result<(), PlatformError>;

    /// Post a message into a dialog. Returns the action id, which reappears
    /// on the inbound message webhook for this message.
    async fn send_dialog_message(
        &self,
        dialog_token: &str,
        message: DialogMessage,
    ) -> Result<String, PlatformError>;

    /// End the bot's participation in a dialog.
    async fn finish_dialog(
        &self,
        dialog_token: &str,
        reason: FinishReason,
    ) -> Result<(), PlatformError>;
}
