//! Webhook event names and payloads.
//!
//! The event name header selects an [`EventKind`]; the JSON body is then
//! decoded into the matching [`WebhookEvent`] variant. Unknown names never
//! reach decoding.

use serde::Deserialize;
use serde_json::Value;

use super::DispatchError;
use crate::types::{ConversationData, ConversationMessageData, DialogType, PersonData};

/// The six bot events the gateway understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `bot.onboarding_offer`
    OnboardingOffer,
    /// `bot.reboarding_offer`
    ReboardingOffer,
    /// `bot.offboarding_offer`
    OffboardingOffer,
    /// `bot.dialog.opened`
    DialogOpened,
    /// `bot.dialog.closed`
    DialogClosed,
    /// `bot.dialog.message`
    DialogMessage,
}

impl EventKind {
    /// Every kind, in registration order.
    pub const ALL: [Self; 6] = [
        Self::OnboardingOffer,
        Self::ReboardingOffer,
        Self::OffboardingOffer,
        Self::DialogOpened,
        Self::DialogClosed,
        Self::DialogMessage,
    ];

    /// Resolve an event name header; `None` for names we do not handle.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Protocol name of the event.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OnboardingOffer => "bot.onboarding_offer",
            Self::ReboardingOffer => "bot.reboarding_offer",
            Self::OffboardingOffer => "bot.offboarding_offer",
            Self::DialogOpened => "bot.dialog.opened",
            Self::DialogClosed => "bot.dialog.closed",
            Self::DialogMessage => "bot.dialog.message",
        }
    }

    /// The boarding phase, for offer events.
    pub fn offer_phase(self) -> Option<DialogType> {
        match self {
            Self::OnboardingOffer => Some(DialogType::Onboarding),
            Self::ReboardingOffer => Some(DialogType::Reboarding),
            Self::OffboardingOffer => Some(DialogType::Offboarding),
            Self::DialogOpened | Self::DialogClosed | Self::DialogMessage => None,
        }
    }

    /// Whether this is one of the three offer events.
    pub fn is_offer(self) -> bool {
        self.offer_phase().is_some()
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An offer to take part in a boarding phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferEvent {
    /// Phase the offer is for.
    pub phase: DialogType,
    /// Token to accept or decline the offer with.
    pub offer_token: String,
    /// The person being boarded.
    pub person: PersonData,
    /// The conversation concerned.
    pub conversation: ConversationData,
}

/// Wire shape shared by the three offer events; only the token key differs.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOffer {
    onboarding_token: Option<String>,
    reboarding_token: Option<String>,
    offboarding_token: Option<String>,
    #[serde(default, alias = "reboardingPerson", alias = "offboardingPerson")]
    onboarding_person: PersonData,
    #[serde(default)]
    conversation: ConversationData,
}

/// `bot.dialog.opened` payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogOpenedEvent {
    /// Token of the new dialog.
    pub dialog_token: String,
    /// Phase name (`ONBOARDING`, `REBOARDING`, `OFFBOARDING`).
    pub dialog_type: String,
    /// The person the bot talks to.
    #[serde(default)]
    pub counterpart_person: PersonData,
    /// The conversation hosting the dialog.
    #[serde(default)]
    pub conversation: ConversationData,
}

/// `bot.dialog.closed` payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogClosedEvent {
    /// Token of the closed dialog.
    pub dialog_token: String,
}

/// `bot.dialog.message` payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogMessageEvent {
    /// Token of the dialog the message belongs to.
    pub dialog_token: String,
    /// The message.
    pub conversation_message: ConversationMessageData,
}

/// A decoded webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    /// Onboarding, reboarding or offboarding offer.
    Offer(OfferEvent),
    /// A dialog opened.
    DialogOpened(DialogOpenedEvent),
    /// A dialog closed.
    DialogClosed(DialogClosedEvent),
    /// A message was posted in a dialog.
    DialogMessage(DialogMessageEvent),
}

impl WebhookEvent {
    /// Decode `payload` as an event of the given kind.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Decode`] if the payload does not have the
    /// event's shape, or [`DispatchError::MissingOfferToken`] if an offer
    /// lacks its phase's token.
    pub fn decode(kind: EventKind, payload: &Value) -> Result<Self, DispatchError> {
        let decode_err = |source| DispatchError::Decode { kind, source };
        match kind {
            EventKind::OnboardingOffer
            | EventKind::ReboardingOffer
            | EventKind::OffboardingOffer => {
                let raw = RawOffer::deserialize(payload).map_err(decode_err)?;
                let (phase, token, field) = match kind {
                    EventKind::ReboardingOffer => {
                        (DialogType::Reboarding, raw.reboarding_token, "reboardingToken")
                    }
                    EventKind::OffboardingOffer => {
                        (DialogType::Offboarding, raw.offboarding_token, "offboardingToken")
                    }
                    _ => (DialogType::Onboarding, raw.onboarding_token, "onboardingToken"),
                };
                let offer_token = token.ok_or(DispatchError::MissingOfferToken(field))?;
                Ok(Self::Offer(OfferEvent {
                    phase,
                    offer_token,
                    person: raw.onboarding_person,
                    conversation: raw.conversation,
                }))
            }
            EventKind::DialogOpened => DialogOpenedEvent::deserialize(payload)
                .map(Self::DialogOpened)
                .map_err(decode_err),
            EventKind::DialogClosed => DialogClosedEvent::deserialize(payload)
                .map(Self::DialogClosed)
                .map_err(decode_err),
            EventKind::DialogMessage => DialogMessageEvent::deserialize(payload)
                .map(Self::DialogMessage)
                .map_err(decode_err),
        }
    }
}
