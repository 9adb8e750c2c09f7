//! Bot policies: the pluggable decision logic behind the gateway.
//!
//! A [`BotPolicy`] decides which boarding offers to accept and builds the
//! [`DialogHandler`] for every dialog that opens. The dispatcher owns the
//! resulting sessions; the policy never sees them again.

use async_trait::async_trait;

pub mod simple;

pub use simple::SimpleBot;

use crate::dialog::DialogHandler;
use crate::types::{ConversationData, DialogType, PersonData};

/// Decision logic for one bot.
///
/// The `should_handle_*` predicates must resolve quickly: the server holds an
/// offer open only for a limited time and treats a timeout as a decline.
/// Phases a bot does not support keep the default "decline / no dialog".
#[async_trait]
pub trait BotPolicy: Send + Sync {
    /// Whether to take part in onboarding `person` into `conversation`.
    async fn should_handle_onboarding(
        &self,
        person: &PersonData,
        conversation: &ConversationData,
    ) -> anyhow::Result<bool>;

    /// Whether to take part in reboarding `person` in `conversation`.
    async fn should_handle_reboarding(
        &self,
        _person: &PersonData,
        _conversation: &ConversationData,
    ) -> anyhow::Result<bool> {
        Ok(false)
    }

    /// Whether to take part in offboarding `person` out of `conversation`.
    async fn should_handle_offboarding(
        &self,
        _person: &PersonData,
        _conversation: &ConversationData,
    ) -> anyhow::Result<bool> {
        Ok(false)
    }

    /// Build the handler for a new onboarding dialog.
    fn create_onboarding_dialog(&self, dialog_token: &str) -> Option<Box<dyn DialogHandler>>;

    /// Build the handler for a new reboarding dialog.
    fn create_reboarding_dialog(&self, _dialog_token: &str) -> Option<Box<dyn DialogHandler>> {
        None
    }

    /// Build the handler for a new offboarding dialog.
    fn create_offboarding_dialog(&self, _dialog_token: &str) -> Option<Box<dyn DialogHandler>> {
        None
    }
}

/// Ask `policy` whether to accept an offer of the given phase.
///
/// # Errors
///
/// Propagates the policy's error.
pub async fn should_handle(
    policy: &dyn BotPolicy,
    phase: DialogType,
    person: &PersonData,
    conversation: &ConversationData,
) -> anyhow::Result<bool> {
    match phase {
        DialogType::Onboarding => policy.should_handle_onboarding(person, conversation).await,
        DialogType::Reboarding => policy.should_handle_reboarding(person, conversation).await,
        DialogType::Offboarding => policy.should_handle_offboarding(person, conversation).await,
    }
}

/// Ask `policy` for the handler of a dialog of the given phase.
pub fn create_dialog(
    policy: &dyn BotPolicy,
    phase: DialogType,
    dialog_token: &str,
) -> Option<Box<dyn DialogHandler>> {
    match phase {
        DialogType::Onboarding => policy.create_onboarding_dialog(dialog_token),
        DialogType::Reboarding => policy.create_reboarding_dialog(dialog_token),
        DialogType::Offboarding => policy.create_offboarding_dialog(dialog_token),
    }
}
