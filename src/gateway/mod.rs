//! HTTP ingress: signature gate and webhook server.
//!
//! Requests pass [`signature::authenticate`] before their body is parsed;
//! accepted events go onto the ingress queue consumed by
//! [`server::run_ingress`], which feeds the dispatcher.

pub mod server;
pub mod signature;

pub use server::{router, run_ingress, spawn_ingress, AppState, InboundWebhook};
pub use signature::GateError;

/// Path the server delivers webhooks to.
pub const WEBHOOK_PATH: &str = "/webhook";

/// User agent of the platform's webhook sender.
pub const EXPECTED_USER_AGENT: &str = "Unblu-Hookshot";

/// Header carrying the event name.
pub const EVENT_HEADER: &str = "x-unblu-event";

/// Header carrying the hex HMAC of the body.
pub const SIGNATURE_HEADER: &str = "x-unblu-signature";
