//! Botgate: webhook gateway for dialog bots.
//!
//! Authenticates webhooks pushed by the collaboration server, answers
//! boarding offers through a pluggable [`bots::BotPolicy`], and runs one
//! [`dialog::DialogSession`] per open dialog token.
//!
//! See `DESIGN.md` for the architecture.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;
pub mod types;

pub mod bots;
pub mod dialog;
pub mod dispatcher;
pub mod gateway;
pub mod platform;
