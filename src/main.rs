/// Telegram Subscriber Broadcast Bot - Main entry point.
///
/// This bot onboards users via /start, keeps subscriber chat IDs in a flat
/// text file, and fans out broadcast or forwarded content to every
/// subscriber with a fixed delay between sends. A daily job backs the
/// subscriber file up to the admins.
///
/// Updates arrive over a webhook; the process refuses to start without a
/// bot token and a public webhook URL.
mod backup;
mod bot;
mod config;
mod error;
mod fanout;
mod store;

use bot::{
    handle_broadcast, handle_channel_forward, handle_export_subscribers, handle_help,
    handle_start, handle_subcount, BotState,
};
use config::Config;
use error::Result;
use std::net::SocketAddr;
use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use teloxide::types::Update;
use teloxide::update_listeners::webhooks;
use teloxide::utils::command::BotCommands;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Telegram bot commands.
#[derive(BotCommands, Clone)]
#[command(
    rename_rule = "snake_case",
    description = "Subscriber broadcast bot commands:"
)]
enum Command {
    #[command(description = "Subscribe and see the welcome message")]
    Start,
    #[command(description = "Show the admin command reference")]
    Help,
    #[command(description = "Show subscriber count")]
    Subcount,
    #[command(description = "Export the subscriber file")]
    ExportSubscribers,
    #[command(description = "Broadcast text or a replied-to message to all subscribers")]
    Broadcast(String),
}

/// Main bot message handler.
async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: BotState,
) -> ResponseResult<()> {
    match cmd {
        Command::Start => handle_start(bot, msg, state).await,
        Command::Help => handle_help(bot, msg, state).await,
        Command::Subcount => handle_subcount(bot, msg, state).await,
        Command::ExportSubscribers => handle_export_subscribers(bot, msg, state).await,
        Command::Broadcast(args) => handle_broadcast(bot, msg, state, args).await,
    }
}

/// Set up the public command menu that appears in Telegram.
/// Admin-only commands are left out of the menu on purpose.
async fn set_bot_commands(bot: &Bot) -> Result<()> {
    use teloxide::types::BotCommand;

    let commands = vec![
        BotCommand {
            command: "start".to_string(),
            description: "Subscribe and see the welcome message".to_string(),
        },
        BotCommand {
            command: "help".to_string(),
            description: "Show the admin command reference".to_string(),
        },
    ];

    bot.set_my_commands(commands).await?;
    info!("Bot commands menu set successfully");
    Ok(())
}

/// Initialize tracing with a stderr layer plus a file log under LOG_DIR.
///
/// Runs before Config::from_env so configuration failures get logged too.
/// The returned guard must stay alive for the file writer to keep flushing.
fn init_logging() -> tracing_appender::non_blocking::WorkerGuard {
    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::never(log_dir, "bot.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "telegram_broadcast_bot=info,teloxide=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for development); result logged once tracing is up
    let dotenv_result = dotenvy::dotenv();

    let _log_guard = init_logging();

    info!("Starting Telegram Subscriber Broadcast Bot...");
    if let Err(e) = dotenv_result {
        info!("No .env file found or error loading it: {}", e);
    }

    // Load configuration from environment variables
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    info!("Configuration loaded successfully");
    info!("Admins configured: {}", config.admin_ids.len());
    info!("Fanout delay between sends: {:?}", config.delay);
    info!("Backup time zone: {}", config.timezone);

    // Create bot instance
    let bot = Bot::new(&config.bot_token);

    // Set up the public command menu in Telegram
    set_bot_commands(&bot).await?;

    let port = config.port;
    let webhook_url = config.webhook_url.clone();

    // Create shared state
    let state = BotState::new(config);

    // Daily subscriber file backup to the admins
    backup::spawn_daily_backup(bot.clone(), state.clone());

    // Set up handlers: commands first, then forwarded channel posts
    let message_handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(
            dptree::filter(|msg: Message| msg.forward_from_chat().is_some())
                .endpoint(handle_channel_forward),
        );

    let handler = dptree::entry().branch(message_handler);

    // Receive updates over a webhook instead of long polling
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = webhooks::axum(bot.clone(), webhooks::Options::new(addr, webhook_url)).await?;

    info!("Bot initialized, webhook listening on port {}", port);

    // Start the dispatcher
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|update| async move {
            debug!("Unhandled update: {:?}", update.id);
        })
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    info!("Bot stopped");

    Ok(())
}
