//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use botgate::bots::BotPolicy;
use botgate::dialog::{DialogApi, DialogHandler};
use botgate::platform::{BotApi, PlatformError};
use botgate::types::{
    ConversationData, ConversationMessageData, DialogMessage, DialogType, FinishReason, PersonData,
};

/// Bot id used in test contexts.
pub const BOT_ID: &str = "bot-1";

/// A call made against [`RecordingApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    Accept { offer_token: String, bot_id: String },
    Decline { offer_token: String, bot_id: String },
    Send { dialog_token: String, message: DialogMessage },
    Finish { dialog_token: String, reason: FinishReason },
}

/// In-memory [`BotApi`] that records every call.
#[derive(Debug, Default)]
pub struct RecordingApi {
    calls: Mutex<Vec<ApiCall>>,
    issued: AtomicUsize,
    fail: bool,
}

impl RecordingApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// An API whose every call fails.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: ApiCall) -> Result<(), PlatformError> {
        self.calls.lock().expect("calls lock").push(call);
        if self.fail {
            return Err(PlatformError::InvalidResponse {
                service: "test",
                detail: "forced failure".to_owned(),
            });
        }
        Ok(())
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.issued.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        format!("{prefix}-{n}")
    }
}

#[async_trait]
impl BotApi for RecordingApi {
    async fn accept_dialog_offer(
        &self,
        offer_token: &str,
        dialog_bot_id: &str,
    ) -> Result<String, PlatformError> {
        self.record(ApiCall::Accept {
            offer_token: offer_token.to_owned(),
            bot_id: dialog_bot_id.to_owned(),
        })?;
        Ok(self.next_id("dlg"))
    }

    async fn decline_dialog_offer(
        &self,
        offer_token: &str,
        dialog_bot_id: &str,
    ) -> Result<(), PlatformError> {
        self.record(ApiCall::Decline {
            offer_token: offer_token.to_owned(),
            bot_id: dialog_bot_id.to_owned(),
        })
    }

    async fn send_dialog_message(
        &self,
        dialog_token: &str,
        message: DialogMessage,
    ) -> Result<String, PlatformError> {
        self.record(ApiCall::Send {
            dialog_token: dialog_token.to_owned(),
            message,
        })?;
        Ok(self.next_id("action"))
    }

    async fn finish_dialog(
        &self,
        dialog_token: &str,
        reason: FinishReason,
    ) -> Result<(), PlatformError> {
        self.record(ApiCall::Finish {
            dialog_token: dialog_token.to_owned(),
            reason,
        })
    }
}

/// What a [`RecordingHandler`] saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    Opened { token: String, person_id: String },
    Message { token: String, text: String },
    Closed { token: String },
}

/// Handler that reports every callback on a channel.
///
/// Opening with person id `explode` fails; a message with text `slow`
/// takes a while to handle and one with text `hang` never completes.
pub struct RecordingHandler {
    token: String,
    events: mpsc::UnboundedSender<Observed>,
}

impl RecordingHandler {
    pub fn new(token: &str, events: mpsc::UnboundedSender<Observed>) -> Self {
        Self {
            token: token.to_owned(),
            events,
        }
    }
}

#[async_trait]
impl DialogHandler for RecordingHandler {
    async fn on_open(
        &mut self,
        counterpart: &PersonData,
        _conversation: &ConversationData,
        _api: &DialogApi,
    ) -> anyhow::Result<()> {
        let _ = self.events.send(Observed::Opened {
            token: self.token.clone(),
            person_id: counterpart.id.clone(),
        });
        if counterpart.id == "explode" {
            anyhow::bail!("open handler failed");
        }
        Ok(())
    }

    async fn on_message(
        &mut self,
        message: &ConversationMessageData,
        _api: &DialogApi,
    ) -> anyhow::Result<()> {
        let text = message.text.clone().unwrap_or_default();
        if text == "slow" {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        if text == "hang" {
            std::future::pending::<()>().await;
        }
        if text == "fail" {
            anyhow::bail!("message handler failed");
        }
        let _ = self.events.send(Observed::Message {
            token: self.token.clone(),
            text,
        });
        Ok(())
    }

    async fn on_closed(&mut self, _api: &DialogApi) -> anyhow::Result<()> {
        let _ = self.events.send(Observed::Closed {
            token: self.token.clone(),
        });
        Ok(())
    }
}

/// Policy that answers every offer with a fixed decision and builds
/// [`RecordingHandler`]s for onboarding and reboarding (not offboarding).
pub struct TestPolicy {
    accept: bool,
    fail: bool,
    asked: Mutex<Vec<(DialogType, String, String)>>,
    events: mpsc::UnboundedSender<Observed>,
}

impl TestPolicy {
    pub fn new(accept: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<Observed>) {
        Self::build(accept, false)
    }

    /// A policy whose predicates fail.
    pub fn failing() -> (Arc<Self>, mpsc::UnboundedReceiver<Observed>) {
        Self::build(false, true)
    }

    fn build(accept: bool, fail: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<Observed>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let policy = Arc::new(Self {
            accept,
            fail,
            asked: Mutex::new(Vec::new()),
            events: tx,
        });
        (policy, rx)
    }

    /// Phases asked about, with person and conversation ids.
    pub fn asked(&self) -> Vec<(DialogType, String, String)> {
        self.asked.lock().expect("asked lock").clone()
    }

    fn decide(
        &self,
        phase: DialogType,
        person: &PersonData,
        conversation: &ConversationData,
    ) -> anyhow::Result<bool> {
        self.asked.lock().expect("asked lock").push((
            phase,
            person.id.clone(),
            conversation.id.clone(),
        ));
        if self.fail {
            anyhow::bail!("policy failed");
        }
        Ok(self.accept)
    }
}

#[async_trait]
impl BotPolicy for TestPolicy {
    async fn should_handle_onboarding(
        &self,
        person: &PersonData,
        conversation: &ConversationData,
    ) -> anyhow::Result<bool> {
        self.decide(DialogType::Onboarding, person, conversation)
    }

    async fn should_handle_reboarding(
        &self,
        person: &PersonData,
        conversation: &ConversationData,
    ) -> anyhow::Result<bool> {
        self.decide(DialogType::Reboarding, person, conversation)
    }

    async fn should_handle_offboarding(
        &self,
        person: &PersonData,
        conversation: &ConversationData,
    ) -> anyhow::Result<bool> {
        self.decide(DialogType::Offboarding, person, conversation)
    }

    fn create_onboarding_dialog(&self, dialog_token: &str) -> Option<Box<dyn DialogHandler>> {
        Some(Box::new(RecordingHandler::new(
            dialog_token,
            self.events.clone(),
        )))
    }

    fn create_reboarding_dialog(&self, dialog_token: &str) -> Option<Box<dyn DialogHandler>> {
        Some(Box::new(RecordingHandler::new(
            dialog_token,
            self.events.clone(),
        )))
    }
}

/// Wait for the next observed callback, failing the test after a second.
pub async fn next_observed(rx: &mut mpsc::UnboundedReceiver<Observed>) -> Observed {
    match tokio::time::timeout(Duration::from_secs(1), rx.recv()).await {
        Ok(Some(observed)) => observed,
        Ok(None) => panic!("observation channel closed"),
        Err(_) => panic!("timed out waiting for a dialog callback"),
    }
}

/// Assert that no callback arrives within a short grace period.
pub async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<Observed>) {
    tokio::time::sleep(Duration::from_millis(100)).await;
    if let Ok(observed) = rx.try_recv() {
        panic!("unexpected dialog callback: {observed:?}");
    }
}
