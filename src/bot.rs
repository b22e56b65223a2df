/// Telegram bot command handlers and message processing.
use crate::config::Config;
use crate::fanout::{fan_out, FanoutOutcome};
use crate::store::SubscriberStore;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{
    ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId, ParseMode,
};
use tracing::{info, warn};

/// Shared bot state: immutable configuration plus the subscriber store.
#[derive(Clone)]
pub struct BotState {
    pub config: Arc<Config>,
    pub store: SubscriberStore,
}

impl BotState {
    pub fn new(config: Config) -> Self {
        let store = SubscriberStore::new(config.subscriber_file.clone());
        Self {
            config: Arc::new(config),
            store,
        }
    }
}

/// Whether the message sender is one of the configured admins.
fn sender_is_admin(msg: &Message, config: &Config) -> bool {
    msg.from()
        .map(|user| config.is_admin(user.id.0 as i64))
        .unwrap_or(false)
}

/// Two-row inline keyboard with the channel and group links.
fn welcome_keyboard(config: &Config) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::url(
            config.channel_button_text.clone(),
            config.channel_url.clone(),
        )],
        vec![InlineKeyboardButton::url(
            config.group_button_text.clone(),
            config.group_url.clone(),
        )],
    ])
}

/// Handler for the /start command.
///
/// Registers the chat as a subscriber and sends the welcome message with the
/// join buttons, attaching the banner image if it exists on disk. A failed
/// photo send degrades to the plain text message.
pub async fn handle_start(bot: Bot, msg: Message, state: BotState) -> ResponseResult<()> {
    let chat_id = msg.chat.id;
    let added = state.store.add(chat_id.0);

    let first_name = msg
        .from()
        .map(|user| user.first_name.clone())
        .unwrap_or_else(|| "there".to_string());
    let welcome_text = format!(
        "👋 Hi {}!\n\n\
         🪜 Step 1:\n\
         Join the official channel to claim your welcome gift 🎁\n\n\
         🪜 Step 2:\n\
         Join the community group so you never miss a drop 💸",
        first_name
    );
    let keyboard = welcome_keyboard(&state.config);

    if state.config.welcome_image.exists() {
        let photo = InputFile::file(state.config.welcome_image.clone());
        let sent = bot
            .send_photo(chat_id, photo)
            .caption(welcome_text.clone())
            .reply_markup(keyboard.clone())
            .await;
        if let Err(e) = sent {
            warn!("Failed to send welcome image: {}", e);
            bot.send_message(chat_id, welcome_text)
                .reply_markup(keyboard)
                .await?;
        }
    } else {
        bot.send_message(chat_id, welcome_text)
            .reply_markup(keyboard)
            .await?;
    }

    if added {
        info!("New subscriber added: {}", chat_id);
    }

    Ok(())
}

/// Handler for the /help command (admins only, silent for everyone else).
pub async fn handle_help(bot: Bot, msg: Message, state: BotState) -> ResponseResult<()> {
    if !sender_is_admin(&msg, &state.config) {
        return Ok(());
    }

    let help_text = "<b>Admin Commands</b>\n\
        /subcount - Show subscriber count\n\
        /export_subscribers - Send the subscriber file\n\
        /broadcast &lt;text&gt; - Or reply to a message with /broadcast\n\n\
        <b>Forwarding</b>\n\
        Forward any channel post to this bot to fan it out to all subscribers.";

    bot.send_message(msg.chat.id, help_text)
        .parse_mode(ParseMode::Html)
        .await?;

    Ok(())
}

/// Handler for the /subcount command.
pub async fn handle_subcount(bot: Bot, msg: Message, state: BotState) -> ResponseResult<()> {
    if !sender_is_admin(&msg, &state.config) {
        return Ok(());
    }

    let count = state.store.load_all().len();
    bot.send_message(msg.chat.id, format!("📈 Subscribers: {}", count))
        .await?;

    Ok(())
}

/// Handler for the /export_subscribers command. Sends the raw subscriber
/// file as a document.
pub async fn handle_export_subscribers(
    bot: Bot,
    msg: Message,
    state: BotState,
) -> ResponseResult<()> {
    if !sender_is_admin(&msg, &state.config) {
        return Ok(());
    }

    let subs = state.store.load_all();
    if subs.is_empty() {
        bot.send_message(msg.chat.id, "No subscribers yet.").await?;
        return Ok(());
    }

    bot.send_document(msg.chat.id, InputFile::file(state.store.path().to_path_buf()))
        .caption(format!("Subscribers ({})", subs.len()))
        .await?;

    Ok(())
}

/// What a broadcast delivers to each subscriber.
#[derive(Debug, Clone, PartialEq)]
enum Payload {
    /// Copy of an existing message, preserving its formatting and media.
    Copy { from: ChatId, message_id: MessageId },
    /// Literal command arguments, sent as HTML-formatted text.
    Text(String),
}

/// Pick the broadcast payload: a replied-to message wins over argument text;
/// neither means nothing is sent.
fn broadcast_payload(reply: Option<(ChatId, MessageId)>, args: &str) -> Option<Payload> {
    if let Some((from, message_id)) = reply {
        return Some(Payload::Copy { from, message_id });
    }
    let text = args.trim();
    if text.is_empty() {
        None
    } else {
        Some(Payload::Text(text.to_string()))
    }
}

/// Handler for the /broadcast command (admins only, silent for everyone
/// else). Delivers the payload to every subscriber in store order, paced by
/// the configured delay, and reports sent/failed totals back to the admin.
pub async fn handle_broadcast(
    bot: Bot,
    msg: Message,
    state: BotState,
    args: String,
) -> ResponseResult<()> {
    if !sender_is_admin(&msg, &state.config) {
        return Ok(());
    }

    let subs = state.store.load_all();
    if subs.is_empty() {
        bot.send_message(msg.chat.id, "No subscribers to broadcast to.")
            .await?;
        return Ok(());
    }

    let reply = msg.reply_to_message().map(|r| (r.chat.id, r.id));
    let payload = broadcast_payload(reply, &args);

    let mut outcome = FanoutOutcome::default();
    if let Some(payload) = payload {
        info!("Broadcasting to {} subscribers", subs.len());
        outcome = fan_out(&subs, state.config.delay, |chat_id| {
            let bot = bot.clone();
            let payload = payload.clone();
            async move {
                match payload {
                    Payload::Copy { from, message_id } => bot
                        .copy_message(ChatId(chat_id), from, message_id)
                        .await
                        .map(|_| ()),
                    Payload::Text(text) => bot
                        .send_message(ChatId(chat_id), text)
                        .parse_mode(ParseMode::Html)
                        .await
                        .map(|_| ()),
                }
            }
        })
        .await;
    }

    bot.send_message(
        msg.chat.id,
        format!("✅ Broadcast sent: {}, ❌ failed: {}", outcome.sent, outcome.fail),
    )
    .await?;

    Ok(())
}

/// Handler for messages forwarded from a channel. Copies the original
/// channel post to every subscriber, fire-and-forget: per-recipient errors
/// are logged and no summary reply is sent.
pub async fn handle_channel_forward(
    bot: Bot,
    msg: Message,
    state: BotState,
) -> ResponseResult<()> {
    let (origin_chat, origin_msg_id) =
        match (msg.forward_from_chat(), msg.forward_from_message_id()) {
            (Some(chat), Some(id)) => (chat.id, MessageId(id)),
            _ => return Ok(()),
        };

    let subs = state.store.load_all();
    if subs.is_empty() {
        return Ok(());
    }

    info!(
        "Copying channel post {} from {} to {} subscribers",
        origin_msg_id.0,
        origin_chat,
        subs.len()
    );
    let outcome = fan_out(&subs, state.config.delay, |chat_id| {
        let bot = bot.clone();
        async move {
            bot.copy_message(ChatId(chat_id), origin_chat, origin_msg_id)
                .await
                .map(|_| ())
        }
    })
    .await;
    info!(
        "Channel post copied to {} subscribers ({} failed)",
        outcome.sent, outcome.fail
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use teloxide::types::InlineKeyboardButtonKind;

    fn test_config() -> Config {
        Config {
            bot_token: "test_token".to_string(),
            webhook_url: "https://bot.example.com/webhook".parse().unwrap(),
            port: 10000,
            admin_ids: vec![111],
            channel_button_text: "Channel".to_string(),
            channel_url: "https://t.me/example_channel".parse().unwrap(),
            group_button_text: "Group".to_string(),
            group_url: "https://t.me/example_group".parse().unwrap(),
            welcome_image: PathBuf::from("banner-01.png"),
            subscriber_file: PathBuf::from("subscribers.txt"),
            delay: Duration::ZERO,
            timezone: chrono_tz::UTC,
        }
    }

    #[test]
    fn test_welcome_keyboard_has_two_link_rows() {
        let keyboard = welcome_keyboard(&test_config());
        assert_eq!(keyboard.inline_keyboard.len(), 2);

        let channel = &keyboard.inline_keyboard[0][0];
        assert_eq!(channel.text, "Channel");
        assert!(matches!(channel.kind, InlineKeyboardButtonKind::Url(_)));

        let group = &keyboard.inline_keyboard[1][0];
        assert_eq!(group.text, "Group");
        assert!(matches!(group.kind, InlineKeyboardButtonKind::Url(_)));
    }

    #[test]
    fn test_broadcast_payload_reply_wins_over_text() {
        let reply = Some((ChatId(42), MessageId(7)));
        assert_eq!(
            broadcast_payload(reply, "Hello"),
            Some(Payload::Copy {
                from: ChatId(42),
                message_id: MessageId(7),
            })
        );
    }

    #[test]
    fn test_broadcast_payload_text() {
        assert_eq!(
            broadcast_payload(None, "  Hello  "),
            Some(Payload::Text("Hello".to_string()))
        );
    }

    #[test]
    fn test_broadcast_payload_neither() {
        assert_eq!(broadcast_payload(None, "   "), None);
        assert_eq!(broadcast_payload(None, ""), None);
    }
}
