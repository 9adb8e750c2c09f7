//! HMAC-SHA1 webhook authentication.
//!
//! The server signs the raw request body with the dialog bot's secret and
//! sends the lowercase hex digest in `x-unblu-signature`. Verification must
//! run over the exact bytes received: re-serialising parsed JSON can change
//! the bytes and break the signature.

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use tracing::warn;

use super::{EVENT_HEADER, EXPECTED_USER_AGENT, SIGNATURE_HEADER};

type HmacSha1 = Hmac<Sha1>;

/// Why a webhook request was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// The user agent is not the platform's webhook sender.
    #[error("Non unblu webhook useragent")]
    WrongUserAgent(Option<String>),

    /// The event name header is missing.
    #[error("Webhook missing event header")]
    MissingEvent,

    /// The signature header is missing or does not match the body.
    #[error("Webhook has missing or invalid signature")]
    InvalidSignature,

    /// The signed body is not JSON.
    #[error("Webhook body is not valid JSON")]
    InvalidBody,
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

/// Sign a payload with HMAC-SHA1 and return the lowercase hex signature.
pub fn sign_payload(secret: &str, payload: &[u8]) -> String {
    // HMAC accepts keys of any length; this branch is unreachable in practice.
    let Ok(mut mac) = HmacSha1::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a hex signature against a payload.
///
/// The comparison is exact (a differently cased hex string is rejected) and
/// runs in constant time for equal-length inputs.
pub fn verify_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    let expected = sign_payload(secret, payload);
    !expected.is_empty()
        && expected.len() == signature.len()
        && expected
            .as_bytes()
            .iter()
            .zip(signature.as_bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Authenticate a webhook request.
///
/// Checks, in order: user agent, event header, signature. Returns the event
/// name on success. Every rejection is logged with the offending values.
///
/// # Errors
///
/// Returns the first failing check as a [`GateError`].
pub fn authenticate(secret: &str, headers: &HeaderMap, body: &[u8]) -> Result<String, GateError> {
    let user_agent = header(headers, "user-agent");
    if user_agent != Some(EXPECTED_USER_AGENT) {
        warn!(user_agent = ?user_agent, "dropping webhook due to wrong user agent");
        return Err(GateError::WrongUserAgent(user_agent.map(str::to_owned)));
    }

    let Some(event) = header(headers, EVENT_HEADER).filter(|e| !e.is_empty()) else {
        warn!("dropping webhook missing the event header");
        return Err(GateError::MissingEvent);
    };

    let signature = header(headers, SIGNATURE_HEADER);
    if !signature.is_some_and(|sig| verify_signature(secret, body, sig)) {
        warn!(event, signature = ?signature, "dropping webhook due to invalid signature");
        return Err(GateError::InvalidSignature);
    }

    Ok(event.to_owned())
}
