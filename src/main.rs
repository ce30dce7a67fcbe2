use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;
use tokio::time::interval;

use bookclub::cli::{Cli, Commands};
use bookclub::conversation::{ConversationRouter, StateRegistry};
use bookclub::core::clock::SystemClock;
use bookclub::core::config::{self, Environment};
use bookclub::core::validation::{is_valid_nickname, normalize_handle};
use bookclub::core::{init_logger, log_startup_configuration, web_server};
use bookclub::storage::{create_pool, RecordStore, SqliteStore};
use bookclub::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps};

/// Main entry point for the book club bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, environment, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Set up global panic handler so a panicking update is logged, not silent
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    // Environment files must be loaded before any config static is read.
    // Values already present win, so staging settings go in first.
    let staging_env = match cli.command {
        Some(Commands::RunStaging) => Some(dotenvy::from_filename(".env.staging")),
        _ => None,
    };
    let _ = dotenv();

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;

    if let Some(Err(e)) = staging_env {
        log::warn!("Failed to load .env.staging: {}", e);
    }

    // Dispatch to appropriate command
    match cli.command {
        Some(Commands::Run) => {
            log::info!("Running bot in normal mode");
            run_bot().await
        }
        Some(Commands::RunStaging) => {
            log::info!("Running bot in staging mode");
            run_bot().await
        }
        Some(Commands::AddAdmin { handle, name }) => add_admin(&handle, name.as_deref().unwrap_or_default()).await,
        Some(Commands::ResetStatus { handle }) => reset_status(&handle).await,
        None => {
            // No command specified - default to running the bot
            log::info!("No command specified, running bot in default mode");
            run_bot().await
        }
    }
}

/// Resolves the environment and opens its database (running migrations)
fn open_store() -> Result<(Environment, String, SqliteStore)> {
    let environment = config::environment()?;
    let database_path = config::database_path(environment);
    let pool = create_pool(&database_path)?;
    Ok((environment, database_path, SqliteStore::new(Arc::new(pool))))
}

/// Run the Telegram bot
async fn run_bot() -> Result<()> {
    log::info!("Starting bot...");

    let (environment, database_path, store) = open_store()?;
    let port = *config::PORT;
    log_startup_configuration(environment, &database_path, port);

    // Liveness endpoint for the hosting platform
    let web_pool = store.pool();
    tokio::spawn(async move {
        if let Err(e) = web_server::start_web_server(port, web_pool).await {
            log::error!("HTTP server failed: {}", e);
        }
    });

    let store: Arc<dyn RecordStore> = Arc::new(store);
    let registry = Arc::new(StateRegistry::with_default_flows()?);
    let router = Arc::new(ConversationRouter::new(store, registry, Arc::new(SystemClock)));

    // Start abandoned-conversation sweeper
    let sweep_router = Arc::clone(&router);
    tokio::spawn(async move {
        let mut interval = interval(config::conversation::sweep_interval());
        loop {
            interval.tick().await;
            if let Err(e) = sweep_router
                .sweep_abandoned(config::conversation::stale_after())
                .await
            {
                log::error!("Failed to reset abandoned conversations: {}", e);
            }
            let pruned = sweep_router.locks().prune();
            if pruned > 0 {
                log::debug!("Pruned {} idle member lock(s)", pruned);
            }
        }
    });

    // Create bot instance
    let bot = create_bot()?;
    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let handler = schema(HandlerDeps::new(router));

    log::info!("Starting bot in long polling mode");
    log::info!("📡 Ready to receive updates!");

    Dispatcher::builder(bot, handler)
        .default_handler(|update| async move {
            log::debug!("Unhandled update: {:?}", update.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("An error has occurred in the dispatcher"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}

/// Bootstraps an admin so someone can run /addUser
async fn add_admin(handle: &str, name: &str) -> Result<()> {
    let handle = normalize_handle(handle);
    if !is_valid_nickname(handle) {
        anyhow::bail!("'{}' is not a valid Telegram username", handle);
    }

    let (_, database_path, store) = open_store()?;
    store.set_admin(handle, name.trim()).await?;
    log::info!("✅ {} is now an admin in {}", handle, database_path);
    Ok(())
}

/// Operator recovery for a member stuck mid-flow
async fn reset_status(handle: &str) -> Result<()> {
    let handle = normalize_handle(handle);
    let (_, _, store) = open_store()?;

    let Some(user) = store.get_user(handle).await? else {
        anyhow::bail!("{} is not a club member", handle);
    };
    store.set_pending_handle(&user.handle, None).await?;
    store.set_user_status(&user.handle, "").await?;
    log::info!("✅ {} reset from {:?} to idle", user.handle, user.status);
    Ok(())
}
