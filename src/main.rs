use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use teloxide::update_listeners::Polling;
use tokio::time::sleep;

use randtalk::cli::{Cli, Commands};
use randtalk::core::logging::log_startup_configuration;
use randtalk::core::{config, init_logger, AppError, AppResult};
use randtalk::storage::create_pool;
use randtalk::telegram::{
    create_bot, create_webapp_router, run_webapp_server, schema, setup_bot_commands, HandlerDeps, WebAppState,
};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Log panics instead of losing them in a detached task
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // Configuration is read lazily, so .env must be loaded first
    let _ = dotenvy::dotenv();

    init_logger(&config::LOG_FILE_PATH, &config::LOG_LEVEL)?;
    log_startup_configuration();

    match cli.command {
        Some(Commands::Run { webhook }) => {
            log::info!("Running bot (webhook: {})", webhook);
            run_bot(webhook).await?;
        }
        Some(Commands::Migrate) => {
            create_pool(&config::DATABASE_PATH)?;
            log::info!("Migrations applied to {}", *config::DATABASE_PATH);
        }
        None => {
            log::info!("No command given, running bot in long polling mode");
            run_bot(false).await?;
        }
    }

    Ok(())
}

async fn run_bot(use_webhook: bool) -> AppResult<()> {
    log::info!("Starting bot...");

    let db_pool = Arc::new(create_pool(&config::DATABASE_PATH)?);
    let bot = create_bot()?;

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to register bot commands: {}", e);
    }

    let handler_deps = HandlerDeps::new(Arc::clone(&db_pool));
    let api = create_webapp_router(WebAppState::from_config(db_pool));

    if use_webhook {
        run_webhook(bot, handler_deps, api).await
    } else {
        run_polling(bot, handler_deps, api).await
    }
}

/// Telegram posts updates to the same HTTP server that hosts the web API.
async fn run_webhook(bot: Bot, handler_deps: HandlerDeps, api: axum::Router) -> AppResult<()> {
    let raw_url = config::WEBHOOK_URL
        .clone()
        .ok_or_else(|| AppError::Validation("WEBHOOK_URL must be set in webhook mode".to_string()))?;
    let url = url::Url::parse(&raw_url)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], *config::PORT));

    log::info!("Starting bot in webhook mode at {} (listening on {})", url, addr);

    let (listener, stop_flag, webhook_router) =
        webhooks::axum_to_router(bot.clone(), webhooks::Options::new(addr, url)).await?;
    let app = webhook_router.merge(api);

    let tcp = tokio::net::TcpListener::bind(addr).await?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(tcp, app).with_graceful_shutdown(stop_flag).await {
            log::error!("HTTP server failed: {}", e);
        }
    });

    Dispatcher::builder(bot, schema(handler_deps))
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the webhook listener"),
        )
        .await;

    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}

/// Long polling, with the web API on its own task.
async fn run_polling(bot: Bot, handler_deps: HandlerDeps, api: axum::Router) -> AppResult<()> {
    tokio::spawn(async move {
        if let Err(e) = run_webapp_server(*config::PORT, api).await {
            log::error!("Web API server failed: {}", e);
        }
    });

    // Removes a webhook left over from an earlier webhook-mode run
    if let Err(e) = bot.delete_webhook().await {
        log::warn!("Failed to delete webhook: {}", e);
    }

    log::info!("Starting bot in long polling mode");

    let handler = schema(handler_deps);
    let max_retries = config::retry::MAX_DISPATCHER_RETRIES;
    let mut retry_count = 0;

    loop {
        let bot_clone = bot.clone();
        let handler_clone = handler.clone();

        // A panicking dispatcher surfaces through the JoinHandle
        let handle = tokio::spawn(async move {
            let listener = Polling::builder(bot_clone.clone()).drop_pending_updates().build();

            Dispatcher::builder(bot_clone, handler_clone)
                .enable_ctrlc_handler()
                .build()
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await
        });

        match handle.await {
            Ok(()) => {
                log::info!("Dispatcher shutdown gracefully");
                break;
            }
            Err(join_err) if join_err.is_panic() => {
                log::error!("Dispatcher panicked: {}", join_err);
                if retry_count >= max_retries {
                    log::error!("Max retries reached after panic. Exiting...");
                    break;
                }
                retry_count += 1;
                log::info!(
                    "Restarting dispatcher (attempt {}/{})...",
                    retry_count,
                    max_retries
                );
                sleep(config::retry::dispatcher_delay()).await;
            }
            Err(join_err) => {
                log::warn!("Dispatcher task was cancelled: {}", join_err);
                break;
            }
        }
    }

    Ok(())
}
