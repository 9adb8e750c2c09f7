#![allow(missing_docs)]

//! Botgate binary: registers the dialog bot and serves its webhooks.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use botgate::bots::SimpleBot;
use botgate::config::GatewayConfig;
use botgate::dispatcher::WebhookDispatcher;
use botgate::gateway::{self, AppState};
use botgate::platform::{BotApi, PlatformClient};
use botgate::types::Context;

#[derive(Parser)]
#[command(name = "botgate", version, about = "Webhook gateway for dialog bots")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register the bot with the collaboration server and serve webhooks.
    Start,
    /// Print the effective configuration (secrets redacted).
    CheckConfig,
    /// Print the signature the gateway expects for a request body.
    Sign {
        /// File holding the raw request body.
        #[arg(long)]
        body: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = GatewayConfig::load().context("failed to load configuration")?;

    match cli.command {
        Command::Start => start(config).await,
        Command::CheckConfig => {
            println!("{config:#?}");
            Ok(())
        }
        Command::Sign { body } => {
            let bytes = std::fs::read(&body)
                .with_context(|| format!("failed to read {}", body.display()))?;
            println!(
                "{}",
                gateway::signature::sign_payload(&config.dialog_bot.secret, &bytes)
            );
            Ok(())
        }
    }
}

async fn start(config: GatewayConfig) -> Result<()> {
    let _logging =
        botgate::logging::init(&config.local.log_level, config.local.log_dir.as_deref())?;

    let client = Arc::new(
        PlatformClient::new(&config.server).context("failed to create platform client")?,
    );
    info!(server = %client.base_url(), "starting dialog bot gateway");

    info!("creating or retrieving bot person");
    let bot_person = client
        .create_or_update_bot_person(&config.bot_person)
        .await
        .context("failed to register bot person")?;
    info!(id = %bot_person.id, name = bot_person.name(), "got bot person");

    info!("initializing dialog bot");
    let registration = client
        .setup_dialog_bot(&bot_person.id, &config.webhook_endpoint(), &config.dialog_bot)
        .await
        .context("failed to register dialog bot")?;
    info!(id = %registration.id, "dialog bot ready");

    let bot_api: Arc<dyn BotApi> = Arc::clone(&client) as Arc<dyn BotApi>;
    let dispatcher = Arc::new(WebhookDispatcher::new(Arc::new(SimpleBot::new()), bot_api));
    let (ingress, ingress_task) = gateway::spawn_ingress(Arc::clone(&dispatcher));

    let state = AppState::new(
        config.dialog_bot.secret.as_str(),
        Context::new(registration.id.as_str(), bot_person),
        ingress,
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.local.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "dialog bot gateway listening");

    axum::serve(listener, gateway::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("webhook server failed")?;
    info!("http server closed");

    // The router is gone, so the ingress queue drains and its task ends.
    if let Err(e) = ingress_task.await {
        warn!(error = %e, "ingress task failed");
    }
    dispatcher.shutdown().await;

    info!("deactivating dialog bot");
    if let Err(e) = client.deactivate_dialog_bot(&registration.id).await {
        error!(error = %e, "failed to deactivate dialog bot");
        return Err(e).context("graceful shutdown failed");
    }
    info!("shutdown finished");
    Ok(())
}

/// Resolve on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("SIGINT received, shutting down gracefully"),
        () = terminate => info!("SIGTERM received, shutting down gracefully"),
    }
}
