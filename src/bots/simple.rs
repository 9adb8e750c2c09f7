//! A very small sample bot.
//!
//! Takes part in the onboarding of every visitor, greets them, asks whether
//! they want to chat with the bot or an agent, and hands off either way.
//! Reboarding and offboarding are not supported.

use async_trait::async_trait;

use super::BotPolicy;
use crate::dialog::{DialogApi, DialogHandler};
use crate::types::{ConversationData, ConversationMessageData, MultichoiceOption, PersonData};

/// Person type the bot onboards.
const VISITOR: &str = "VISITOR";

/// Answer value for "talk to the bot".
const TALK: &str = "talk";

const TOO_SIMPLE: &str =
    "The only problem is, that I'm actually too simple to really understand what you're saying.";

/// The sample policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleBot;

impl SimpleBot {
    /// Create the policy.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BotPolicy for SimpleBot {
    async fn should_handle_onboarding(
        &self,
        person: &PersonData,
        _conversation: &ConversationData,
    ) -> anyhow::Result<bool> {
        Ok(person.person_type.as_deref() == Some(VISITOR))
    }

    fn create_onboarding_dialog(&self, _dialog_token: &str) -> Option<Box<dyn DialogHandler>> {
        Some(Box::new(OnboardingDialog::default()))
    }
}

/// The onboarding conversation of [`SimpleBot`].
#[derive(Debug, Default)]
pub struct OnboardingDialog {
    counterpart_id: Option<String>,
}

#[async_trait]
impl DialogHandler for OnboardingDialog {
    async fn on_open(
        &mut self,
        counterpart: &PersonData,
        _conversation: &ConversationData,
        api: &DialogApi,
    ) -> anyhow::Result<()> {
        self.counterpart_id = Some(counterpart.id.clone());
        api.send_text_message(format!(
            "Hey {}. I am a Simple Bot.",
            counterpart.name()
        ))
        .await?;
        api.send_multichoice_question(
            "Do you want to talk to me or be connected to a real agent?",
            vec![
                MultichoiceOption::new("Talk to bot", TALK, true),
                MultichoiceOption::new("Real agent", "no", false),
            ],
        )
        .await?;
        Ok(())
    }

    async fn on_message(
        &mut self,
        message: &ConversationMessageData,
        api: &DialogApi,
    ) -> anyhow::Result<()> {
        // Our own messages come back through the webhook too.
        let Some(counterpart_id) = self.counterpart_id.as_deref() else {
            return Ok(());
        };
        if !message.is_from(counterpart_id) {
            return Ok(());
        }

        if message.value.as_deref() == Some(TALK) {
            api.send_text_message("Ohh great, someone wants to talk to me! :-)")
                .await?;
            api.send_text_message(TOO_SIMPLE).await?;
            api.send_text_message("So I guess I'll just connect you with a real person :-)")
                .await?;
            api.send_text_message("See you").await?;
        } else {
            api.send_text_message("Okay then... I'll connect you with the next free agent.")
                .await?;
            api.send_text_message("Bye bye").await?;
        }
        api.hand_off().await?;
        Ok(())
    }
}
