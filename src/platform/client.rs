//! HTTP client for the collaboration server's REST API (`/unblu/rest/v3`).
//!
//! Every call authenticates with basic auth. Errors are wrapped in
//! [`PlatformError`] tagged with the service name so log lines say which
//! call failed.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use url::Url;

use super::{BotApi, PlatformError};
use crate::config::{BotPersonConfig, DialogBotConfig, ServerConfig};
use crate::types::{DialogMessage, FinishReason, PersonData};

/// REST API prefix below the server URL.
const API_PREFIX: &str = "unblu/rest/v3/";

/// HTTP connect timeout for the reqwest client.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Description stored on the dialog bot registration.
const DIALOG_BOT_DESCRIPTION: &str = "Dialog bot webhook gateway";

/// A dialog bot registration as returned by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogBotRegistration {
    /// Registration id; this is the `dialogBotId` used for offers.
    pub id: String,
    /// Full registration object, kept so updates round-trip unknown fields.
    pub data: Map<String, Value>,
}

impl DialogBotRegistration {
    fn from_value(service: &'static str, value: Value) -> Result<Self, PlatformError> {
        let Value::Object(data) = value else {
            return Err(PlatformError::InvalidResponse {
                service,
                detail: "expected a dialog bot object".to_owned(),
            });
        };
        let id = data
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| PlatformError::InvalidResponse {
                service,
                detail: "dialog bot without id".to_owned(),
            })?
            .to_owned();
        Ok(Self { id, data })
    }
}

/// Client for the collaboration server.
pub struct PlatformClient {
    client: reqwest::Client,
    base_url: Url,
    username: String,
    password: String,
}

impl std::fmt::Debug for PlatformClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformClient")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl PlatformClient {
    /// Create a client for the server described by `server`.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::InvalidUrl`] if the server URL does not parse.
    pub fn new(server: &ServerConfig) -> Result<Self, PlatformError> {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(
                    error = %e,
                    "failed to build HTTP client with timeouts, using default"
                );
                reqwest::Client::default()
            });
        Ok(Self {
            client,
            base_url: api_base(&server.url)?,
            username: server.username.clone(),
            password: server.password.clone(),
        })
    }

    /// Base URL all service paths are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, PlatformError> {
        Ok(self.base_url.join(path)?)
    }

    async fn get(
        &self,
        service: &'static str,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<String, PlatformError> {
        let url = self.endpoint(path)?;
        debug!(service, %url, "GET");
        let resp = self
            .client
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .query(params)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|source| PlatformError::Http { service, source })?;
        resp.text()
            .await
            .map_err(|source| PlatformError::Http { service, source })
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        service: &'static str,
        path: &str,
        body: &T,
    ) -> Result<String, PlatformError> {
        let url = self.endpoint(path)?;
        debug!(service, %url, "POST");
        let resp = self
            .client
            .post(url)
            .basic_auth(&self.username, Some(&self.password))
            .json(body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|source| PlatformError::Http { service, source })?;
        resp.text()
            .await
            .map_err(|source| PlatformError::Http { service, source })
    }

    /// Create the bot person, or update it if one with the same source id exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the answer is not a person.
    pub async fn create_or_update_bot_person(
        &self,
        person: &BotPersonConfig,
    ) -> Result<PersonData, PlatformError> {
        const SERVICE: &str = "createOrUpdateBot";
        let body = json!({
            "$_type": "PersonData",
            "sourceId": person.source_id,
            "firstName": person.first_name,
            "lastName": person.last_name,
            "personType": "BOT",
            "authorizationRole": "REGISTERED_USER",
        });
        let text = self
            .post(SERVICE, "persons/createOrUpdateBot", &body)
            .await?;
        serde_json::from_str(&text).map_err(|e| PlatformError::InvalidResponse {
            service: SERVICE,
            detail: e.to_string(),
        })
    }

    /// Look up a dialog bot registration by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the answer cannot be parsed.
    pub async fn dialog_bot_by_name(
        &self,
        name: &str,
    ) -> Result<Option<DialogBotRegistration>, PlatformError> {
        const SERVICE: &str = "getByName";
        let text = self.get(SERVICE, "bots/getByName", &[("name", name)]).await?;
        match parse_optional_json(SERVICE, &text)? {
            None => Ok(None),
            Some(value) => DialogBotRegistration::from_value(SERVICE, value).map(Some),
        }
    }

    /// Read a dialog bot registration by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the answer is not a dialog bot.
    pub async fn read_dialog_bot(&self, id: &str) -> Result<DialogBotRegistration, PlatformError> {
        const SERVICE: &str = "read";
        let text = self.get(SERVICE, "bots/read", &[("id", id)]).await?;
        let value = parse_required_json(SERVICE, &text)?;
        DialogBotRegistration::from_value(SERVICE, value)
    }

    async fn create_dialog_bot(
        &self,
        data: &Map<String, Value>,
    ) -> Result<DialogBotRegistration, PlatformError> {
        const SERVICE: &str = "create";
        let text = self.post(SERVICE, "bots/create", data).await?;
        let value = parse_required_json(SERVICE, &text)?;
        DialogBotRegistration::from_value(SERVICE, value)
    }

    async fn update_dialog_bot(
        &self,
        data: &Map<String, Value>,
    ) -> Result<DialogBotRegistration, PlatformError> {
        const SERVICE: &str = "update";
        let text = self.post(SERVICE, "bots/update", data).await?;
        let value = parse_required_json(SERVICE, &text)?;
        DialogBotRegistration::from_value(SERVICE, value)
    }

    /// Register the dialog bot, reusing an existing registration of the same name.
    ///
    /// An existing registration is only updated when one of the configured
    /// fields differs from what the server has.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the underlying calls fail.
    pub async fn setup_dialog_bot(
        &self,
        bot_person_id: &str,
        webhook_endpoint: &str,
        config: &DialogBotConfig,
    ) -> Result<DialogBotRegistration, PlatformError> {
        info!(name = %config.name, "checking for existing dialog bot");
        let desired = desired_dialog_bot(bot_person_id, webhook_endpoint, config);

        match self.dialog_bot_by_name(&config.name).await? {
            Some(mut existing) => {
                info!(id = %existing.id, "found existing dialog bot");
                let changed = apply_changes(&mut existing.data, &desired);
                if changed.is_empty() {
                    return Ok(existing);
                }
                info!(?changed, "existing dialog bot differs, updating it");
                self.update_dialog_bot(&existing.data).await
            }
            None => {
                info!("creating new dialog bot registration");
                self.create_dialog_bot(&desired).await
            }
        }
    }

    /// Stop webhook delivery for the dialog bot.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or updating the registration fails.
    pub async fn deactivate_dialog_bot(&self, id: &str) -> Result<(), PlatformError> {
        let mut bot = self.read_dialog_bot(id).await?;
        bot.data
            .insert("webhookStatus".to_owned(), Value::from("INACTIVE"));
        self.update_dialog_bot(&bot.data).await?;
        info!(id, "dialog bot deactivated");
        Ok(())
    }
}

#[async_trait]
impl BotApi for PlatformClient {
    async fn accept_dialog_offer(
        &self,
        offer_token: &str,
        dialog_bot_id: &str,
    ) -> Result<String, PlatformError> {
        const SERVICE: &str = "acceptDialogOffer";
        let text = self
            .get(
                SERVICE,
                "bots/acceptDialogOffer",
                &[
                    ("dialogOfferToken", offer_token),
                    ("dialogBotId", dialog_bot_id),
                ],
            )
            .await?;
        parse_token(SERVICE, &text)
    }

    async fn decline_dialog_offer(
        &self,
        offer_token: &str,
        dialog_bot_id: &str,
    ) -> Result<(), PlatformError> {
        self.get(
            "declineDialogOffer",
            "bots/declineDialogOffer",
            &[
                ("dialogOfferToken", offer_token),
                ("dialogBotId", dialog_bot_id),
            ],
        )
        .await?;
        Ok(())
    }

    async fn send_dialog_message(
        &self,
        dialog_token: &str,
        message: DialogMessage,
    ) -> Result<String, PlatformError> {
        const SERVICE: &str = "sendDialogMessage";
        let body = json!({
            "dialogToken": dialog_token,
            "messageData": message,
        });
        let text = self
            .post(SERVICE, "bots/sendDialogMessage", &body)
            .await?;
        parse_token(SERVICE, &text)
    }

    async fn finish_dialog(
        &self,
        dialog_token: &str,
        reason: FinishReason,
    ) -> Result<(), PlatformError> {
        self.get(
            "finishDialog",
            "bots/finishDialog",
            &[("dialogToken", dialog_token), ("reason", reason.as_str())],
        )
        .await?;
        Ok(())
    }
}

/// Resolve the REST API base below the configured server URL.
fn api_base(server_url: &str) -> Result<Url, PlatformError> {
    let mut root = Url::parse(server_url)?;
    if !root.path().ends_with('/') {
        let path = format!("{}/", root.path());
        root.set_path(&path);
    }
    Ok(root.join(API_PREFIX)?)
}

/// Build the registration the server should hold for this gateway.
pub fn desired_dialog_bot(
    bot_person_id: &str,
    webhook_endpoint: &str,
    config: &DialogBotConfig,
) -> Map<String, Value> {
    let reboarding_filter = if config.reboarding_enabled {
        config.onboarding_filter.as_str()
    } else {
        "NONE"
    };
    let value = json!({
        "$_type": "DialogBotData",
        "name": config.name,
        "description": DIALOG_BOT_DESCRIPTION,
        "botPersonId": bot_person_id,
        "webhookStatus": "ACTIVE",
        "webhookEndpoint": webhook_endpoint,
        "webhookSecret": config.secret,
        "onboardingOrder": config.onboarding_order,
        "reboardingOrder": config.reboarding_order,
        "offboardingOrder": config.offboarding_order,
        "onboardingFilter": config.onboarding_filter,
        "reboardingFilter": reboarding_filter,
        "offboardingFilter": config.offboarding_filter,
        "needsCounterpartPresence": true,
    });
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Copy every desired field that differs into `existing`.
///
/// Returns the names of the changed fields; empty means no update is needed.
pub fn apply_changes(
    existing: &mut Map<String, Value>,
    desired: &Map<String, Value>,
) -> Vec<String> {
    let mut changed = Vec::new();
    for (key, value) in desired {
        if existing.get(key) != Some(value) {
            existing.insert(key.clone(), value.clone());
            changed.push(key.clone());
        }
    }
    changed
}

/// Interpret a token-like response body (dialog token or action id).
///
/// The server answers with a JSON string; a bare body is accepted as-is.
fn parse_token(service: &'static str, body: &str) -> Result<String, PlatformError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(PlatformError::InvalidResponse {
            service,
            detail: "empty body".to_owned(),
        });
    }
    if trimmed.starts_with('"') {
        return serde_json::from_str(trimmed).map_err(|e| PlatformError::InvalidResponse {
            service,
            detail: e.to_string(),
        });
    }
    Ok(trimmed.to_owned())
}

fn parse_optional_json(service: &'static str, body: &str) -> Result<Option<Value>, PlatformError> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    match serde_json::from_str(body) {
        Ok(Value::Null) => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(e) => Err(PlatformError::InvalidResponse {
            service,
            detail: e.to_string(),
        }),
    }
}

fn parse_required_json(service: &'static str, body: &str) -> Result<Value, PlatformError> {
    parse_optional_json(service, body)?.ok_or_else(|| PlatformError::InvalidResponse {
        service,
        detail: "empty body".to_owned(),
    })
}
