//! Configuration loading.
//!
//! Precedence: env vars > config file > defaults. The file is
//! `$GATEWAY_CONFIG_PATH` or `./config.toml`; a missing file means defaults.
//! Env var names match the ones the platform's sample bots use
//! (`UNBLU_SERVER`, `SECRET`, `PORT`, ...).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Env var naming the config file.
pub const CONFIG_PATH_ENV: &str = "GATEWAY_CONFIG_PATH";

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Collaboration server connection.
    pub server: ServerConfig,
    /// Local HTTP listener and logging.
    pub local: LocalConfig,
    /// Identity of the bot person.
    pub bot_person: BotPersonConfig,
    /// Dialog bot registration settings.
    pub dialog_bot: DialogBotConfig,
}

/// Collaboration server connection settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the collaboration server.
    pub url: String,
    /// API user.
    pub username: String,
    /// API password.
    pub password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:7777".to_owned(),
            username: "admin".to_owned(),
            password: "admin".to_owned(),
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Local listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Port the webhook server binds to.
    pub port: u16,
    /// Public URL the server reaches this gateway on (without `/webhook`).
    pub inbound_url: String,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Directory for JSON log files; console only when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            port: 7050,
            inbound_url: "http://localhost:7050".to_owned(),
            log_level: "info".to_owned(),
            log_dir: None,
        }
    }
}

/// Bot person identity.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotPersonConfig {
    /// Stable external id of the bot person.
    pub source_id: String,
    /// First name shown in conversations.
    pub first_name: String,
    /// Last name shown in conversations.
    pub last_name: String,
}

impl Default for BotPersonConfig {
    fn default() -> Self {
        Self {
            source_id: "simple-bot".to_owned(),
            first_name: "Simple".to_owned(),
            last_name: "Bot".to_owned(),
        }
    }
}

/// Dialog bot registration settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DialogBotConfig {
    /// Registration name; used to find an existing registration.
    pub name: String,
    /// Shared secret for webhook signatures.
    pub secret: String,
    /// Which persons trigger onboarding offers (`VISITORS`, `AGENTS`, `BOTH`, `NONE`).
    pub onboarding_filter: String,
    /// Position among bots offered onboarding.
    pub onboarding_order: u32,
    /// Whether reboarding offers are requested.
    pub reboarding_enabled: bool,
    /// Position among bots offered reboarding.
    pub reboarding_order: u32,
    /// Which persons trigger offboarding offers.
    pub offboarding_filter: String,
    /// Position among bots offered offboarding.
    pub offboarding_order: u32,
}

impl Default for DialogBotConfig {
    fn default() -> Self {
        Self {
            name: "Simple Dialog Bot".to_owned(),
            secret: "simple-bot-secret".to_owned(),
            onboarding_filter: "VISITORS".to_owned(),
            onboarding_order: 5,
            reboarding_enabled: false,
            reboarding_order: 5,
            offboarding_filter: "NONE".to_owned(),
            offboarding_order: 5,
        }
    }
}

impl std::fmt::Debug for DialogBotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogBotConfig")
            .field("name", &self.name)
            .field("secret", &"[REDACTED]")
            .field("onboarding_filter", &self.onboarding_filter)
            .field("onboarding_order", &self.onboarding_order)
            .field("reboarding_enabled", &self.reboarding_enabled)
            .field("reboarding_order", &self.reboarding_order)
            .field("offboarding_filter", &self.offboarding_filter)
            .field("offboarding_order", &self.offboarding_order)
            .finish()
    }
}

impl GatewayConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load using a custom env resolver (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load_with(env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let path = env(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config.toml"));
        let mut config = Self::load_from_file(&path)?;
        config.apply_overrides(env);
        Ok(config)
    }

    /// Load from a TOML file only; a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                toml::from_str(&contents)
                    .with_context(|| format!("failed to parse config at {}", path.display()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "failed to read config at {}: {e}",
                path.display()
            )),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Takes a resolver function for testability (avoids `set_var` in tests).
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        // Server.
        if let Some(v) = env("UNBLU_SERVER") {
            self.server.url = v;
        }
        if let Some(v) = env("UNBLU_USERNAME") {
            self.server.username = v;
        }
        if let Some(v) = env("UNBLU_PASSWORD") {
            self.server.password = v;
        }

        // Local.
        override_parsed(&env, "PORT", &mut self.local.port);
        if let Some(v) = env("CALLBACK") {
            self.local.inbound_url = v;
        }
        if let Some(v) = env("LOG_LEVEL") {
            self.local.log_level = v;
        }
        if let Some(v) = env("LOG_DIR") {
            self.local.log_dir = Some(PathBuf::from(v));
        }

        // Bot person.
        if let Some(v) = env("BOT_SOURCE_ID") {
            self.bot_person.source_id = v;
        }
        if let Some(v) = env("BOT_FIRST_NAME") {
            self.bot_person.first_name = v;
        }
        if let Some(v) = env("BOT_LAST_NAME") {
            self.bot_person.last_name = v;
        }

        // Dialog bot.
        if let Some(v) = env("DIALOG_BOT_NAME") {
            self.dialog_bot.name = v;
        }
        if let Some(v) = env("SECRET") {
            self.dialog_bot.secret = v;
        }
        if let Some(v) = env("ONBOARDING_FILTER") {
            self.dialog_bot.onboarding_filter = v;
        }
        override_parsed(&env, "ONBOARDING_ORDER", &mut self.dialog_bot.onboarding_order);
        override_parsed(
            &env,
            "REBOARDING_ENABLED",
            &mut self.dialog_bot.reboarding_enabled,
        );
        override_parsed(&env, "REBOARDING_ORDER", &mut self.dialog_bot.reboarding_order);
        if let Some(v) = env("OFFBOARDING_FILTER") {
            self.dialog_bot.offboarding_filter = v;
        }
        override_parsed(
            &env,
            "OFFBOARDING_ORDER",
            &mut self.dialog_bot.offboarding_order,
        );
    }

    /// Full URL the server should deliver webhooks to.
    pub fn webhook_endpoint(&self) -> String {
        format!(
            "{}{}",
            self.local.inbound_url.trim_end_matches('/'),
            crate::gateway::WEBHOOK_PATH
        )
    }
}

/// Parse an env override into `target`, keeping the old value on bad input.
fn override_parsed<T: std::str::FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    target: &mut T,
) {
    if let Some(v) = env(var) {
        match v.trim().parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!(var, value = %v, "ignoring invalid env override"),
        }
    }
}
