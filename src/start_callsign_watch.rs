//! Startup helpers for the callsign watch bot.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use crate::bot::{BotRunner, Dispatcher};
use crate::transport::{TelegramTransport, Transport};
use crate::watch::{
    BotConfig, Broadcaster, ConversationStateMachine, FilterValidator, SqliteSubscriptionStore,
    SubscriptionStore, WatchResult,
};

/// Run the bot until interrupted.
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    // Loaded before tracing so `.env` can set RUST_LOG.
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    match dotenv {
        Err(e) if !is_missing_dotenv(&e) => {
            tracing::warn!("Ignoring unreadable .env file: {e}");
        }
        _ => {}
    }

    tracing::info!("Starting callsign watch v{}", env!("CARGO_PKG_VERSION"));

    let config = match BotConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            return ExitCode::from(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(serve(config)) {
        tracing::error!("Bot error: {e}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

/// Whether `.env` simply does not exist, which is not worth reporting.
fn is_missing_dotenv(err: &dotenvy::Error) -> bool {
    matches!(err, dotenvy::Error::Io(io) if io.kind() == std::io::ErrorKind::NotFound)
}

/// Wire the components together and poll until Ctrl+C.
///
/// # Errors
/// Returns an error if the store cannot be opened or the transport cannot be built.
pub async fn serve(config: BotConfig) -> WatchResult<()> {
    let store: Arc<dyn SubscriptionStore> =
        Arc::new(SqliteSubscriptionStore::new(&config.storage).await?);
    tracing::info!(
        path = %config.storage.sqlite_path.display(),
        table = %config.storage.subscription_table,
        "Subscription store ready"
    );

    let telegram = Arc::new(TelegramTransport::new(&config.telegram)?);
    let transport: Arc<dyn Transport> = telegram.clone();

    let mut machine = ConversationStateMachine::new(
        Arc::clone(&store),
        FilterValidator::new()?,
        &config.conversation,
    );
    match telegram.get_me().await {
        Ok(me) => {
            if let Some(username) = me.username {
                tracing::info!(username = %username, "Bot identity resolved");
                machine = machine.with_bot_username(username);
            }
        }
        Err(e) => tracing::warn!(
            error_kind = e.kind(),
            "Bot identity unknown, accepting commands addressed to any bot: {e}"
        ),
    }
    let machine = Arc::new(machine);

    if config.broadcast.on_startup {
        let broadcaster = Broadcaster::new(
            Arc::clone(&store),
            Arc::clone(&transport),
            &config.broadcast,
        );
        drop(broadcaster.spawn(config.broadcast.message.clone()));
    }

    let dispatcher = Dispatcher::new(
        machine,
        transport,
        Duration::from_secs(config.conversation.worker_idle_seconds),
    );
    let runner = BotRunner::new(
        telegram,
        dispatcher,
        Duration::from_secs(config.telegram.retry_delay_seconds),
    );

    let shutdown = runner.shutdown_notifier();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown requested");
                shutdown.notify_one();
            }
            Err(e) => tracing::warn!("Failed to listen for Ctrl+C: {e}"),
        }
    });

    runner.run().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dotenv_is_silent() {
        let missing = dotenvy::from_path("/nonexistent/callsign_watch/.env").unwrap_err();
        assert!(is_missing_dotenv(&missing));
    }

    #[test]
    fn test_unreadable_dotenv_is_reported() {
        let malformed = dotenvy::Error::LineParse("BOT_API_KEY 123".to_string(), 12);
        assert!(!is_missing_dotenv(&malformed));

        let denied = dotenvy::Error::Io(std::io::ErrorKind::PermissionDenied.into());
        assert!(!is_missing_dotenv(&denied));
    }
}
