//! Platform data exchanged with the collaboration server.
//!
//! Inbound shapes mirror the JSON the server pushes in webhook payloads
//! (camelCase keys); outbound shapes are what the bot API expects.
//! Unknown fields are ignored on deserialization so newer server versions
//! keep working.

use serde::{Deserialize, Serialize};

/// A person known to the collaboration server (visitor, agent or bot).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonData {
    /// Server-assigned person identifier.
    pub id: String,
    /// Name shown in the conversation UI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Person type, e.g. `VISITOR`, `AGENT` or `BOT`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_type: Option<String>,
    /// First name, if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Last name, if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// External source identifier (used for bot persons).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

impl PersonData {
    /// Display name, falling back to the person id.
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

/// The conversation a person is boarding into or out of.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationData {
    /// Server-assigned conversation identifier.
    pub id: String,
    /// Conversation topic, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

/// A message posted in a dialog, either by the bot or the counterpart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessageData {
    /// Message identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Message type, e.g. `TEXT` or `MULTICHOICE_ANSWER`.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    /// Text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Selected value for answers to questions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Plain-text fallback for rich messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_text: Option<String>,
    /// Who sent the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_person: Option<PersonData>,
}

impl ConversationMessageData {
    /// Whether the message was sent by the person with the given id.
    pub fn is_from(&self, person_id: &str) -> bool {
        self.sender_person
            .as_ref()
            .is_some_and(|sender| sender.id == person_id)
    }
}

/// One option of a multichoice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultichoiceOption {
    /// Label shown on the button.
    pub label: String,
    /// Value reported back in the answer message.
    pub value: String,
    /// Whether this option is highlighted as the primary choice.
    pub primary: bool,
}

impl MultichoiceOption {
    /// Build an option.
    pub fn new(label: impl Into<String>, value: impl Into<String>, primary: bool) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            primary,
        }
    }
}

/// Outbound dialog message, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DialogMessage {
    /// Plain text.
    Text {
        /// Message text.
        text: String,
    },
    /// Free-text question.
    TextQuestion {
        /// Question text.
        text: String,
    },
    /// Question with a fixed, ordered set of answers.
    MultichoiceQuestion {
        /// Question text.
        text: String,
        /// Answers in display order.
        options: Vec<MultichoiceOption>,
    },
    /// Rating question.
    RatingQuestion {
        /// Question text.
        text: String,
    },
}

/// How a bot ends its participation in a dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinishReason {
    /// The bot is done; the next bot may continue the boarding.
    HandOff,
    /// The issue was solved; no further bots are invoked.
    Solved,
    /// The dialog failed; the boarding is aborted.
    Aborted,
}

impl FinishReason {
    /// Wire name of the reason.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HandOff => "HAND_OFF",
            Self::Solved => "SOLVED",
            Self::Aborted => "ABORTED",
        }
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boarding phase a dialog or offer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DialogType {
    /// A person is entering a conversation.
    Onboarding,
    /// A person is re-entering a conversation.
    Reboarding,
    /// A person is leaving a conversation.
    Offboarding,
}

impl DialogType {
    /// Parse the wire name (`ONBOARDING`, `REBOARDING`, `OFFBOARDING`).
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "ONBOARDING" => Some(Self::Onboarding),
            "REBOARDING" => Some(Self::Reboarding),
            "OFFBOARDING" => Some(Self::Offboarding),
            _ => None,
        }
    }

    /// Wire name of the phase.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Onboarding => "ONBOARDING",
            Self::Reboarding => "REBOARDING",
            Self::Offboarding => "OFFBOARDING",
        }
    }
}

impl std::fmt::Display for DialogType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request context handed from the gate to the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    /// Id of the dialog bot registration on the server.
    pub dialog_bot_id: String,
    /// The person the bot speaks as.
    pub bot_person: PersonData,
}

impl Context {
    /// Build a context for one webhook request.
    pub fn new(dialog_bot_id: impl Into<String>, bot_person: PersonData) -> Self {
        Self {
            dialog_bot_id: dialog_bot_id.into(),
            bot_person,
        }
    }
}
