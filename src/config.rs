/// Configuration management for the subscriber broadcast bot.
use crate::error::{BotError, Result};
use chrono_tz::Tz;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Admin IDs that are always present, regardless of the ADMIN_IDS variable.
const DEFAULT_ADMIN_IDS: &[i64] = &[1840751528, 1280460690, 1873662628];

/// Main application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot token (from BOT_TOKEN).
    pub bot_token: String,
    /// Public URL Telegram delivers updates to.
    pub webhook_url: Url,
    /// Local port the webhook listener binds to.
    pub port: u16,
    /// Chat IDs allowed to use the management commands.
    pub admin_ids: Vec<i64>,
    /// Label of the channel button on the welcome keyboard.
    pub channel_button_text: String,
    /// Link behind the channel button.
    pub channel_url: Url,
    /// Label of the group button on the welcome keyboard.
    pub group_button_text: String,
    /// Link behind the group button.
    pub group_url: Url,
    /// Banner image attached to the welcome message, if it exists on disk.
    pub welcome_image: PathBuf,
    /// Path of the newline-delimited subscriber file.
    pub subscriber_file: PathBuf,
    /// Pause between consecutive fanout sends.
    pub delay: Duration,
    /// Time zone the daily backup schedule is computed in.
    pub timezone: Tz,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `BOT_TOKEN`: The bot token from BotFather.
    /// - `WEBHOOK_URL`: Public https URL Telegram posts updates to.
    ///
    /// Optional environment variables:
    /// - `PORT`: Webhook listen port (default: 10000).
    /// - `ADMIN_IDS`: Comma-separated chat IDs merged with the built-in admins.
    /// - `CHANNEL_BUTTON_TEXT` / `CHANNEL_URL`: First welcome button.
    /// - `GROUP_BUTTON_TEXT` / `GROUP_URL`: Second welcome button.
    /// - `WELCOME_IMAGE`: Banner image path (default: banner-01.png).
    /// - `SUBSCRIBER_FILE`: Subscriber file path (default: subscribers.txt).
    /// - `DELAY`: Seconds between fanout sends (default: 0.5).
    /// - `TZ`: IANA time zone for the daily backup (default: Asia/Kuala_Lumpur).
    pub fn from_env() -> Result<Self> {
        // Required: bot token
        let bot_token = env::var("BOT_TOKEN").map_err(|_| {
            BotError::Config(
                "BOT_TOKEN environment variable is required. \
                 Get your token from @BotFather on Telegram."
                    .to_string(),
            )
        })?;

        if bot_token.is_empty() {
            return Err(BotError::Config("BOT_TOKEN cannot be empty".to_string()));
        }

        // Required: webhook URL
        let webhook_url = env::var("WEBHOOK_URL").map_err(|_| {
            BotError::Config(
                "WEBHOOK_URL environment variable is required, \
                 e.g. https://your-domain.example.com/webhook"
                    .to_string(),
            )
        })?;

        let webhook_url = webhook_url
            .parse::<Url>()
            .map_err(|e| BotError::Config(format!("WEBHOOK_URL is not a valid URL: {}", e)))?;

        // Optional: listen port
        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(10000);

        // Optional: extra admin IDs merged with the built-in defaults
        let admin_ids = merge_admin_ids(&env::var("ADMIN_IDS").unwrap_or_default());

        // Optional: welcome keyboard labels and links
        let channel_button_text =
            env::var("CHANNEL_BUTTON_TEXT").unwrap_or_else(|_| "OFFICIAL CHANNEL".to_string());
        let channel_url = parse_url_var("CHANNEL_URL", "https://t.me/example_channel")?;
        let group_button_text =
            env::var("GROUP_BUTTON_TEXT").unwrap_or_else(|_| "COMMUNITY GROUP".to_string());
        let group_url = parse_url_var("GROUP_URL", "https://t.me/example_group")?;

        // Optional: file paths
        let welcome_image =
            PathBuf::from(env::var("WELCOME_IMAGE").unwrap_or_else(|_| "banner-01.png".to_string()));
        let subscriber_file = PathBuf::from(
            env::var("SUBSCRIBER_FILE").unwrap_or_else(|_| "subscribers.txt".to_string()),
        );

        // Optional: inter-send delay in seconds
        let delay_secs = env::var("DELAY")
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.5);

        if !delay_secs.is_finite() || delay_secs < 0.0 {
            return Err(BotError::Config(format!(
                "DELAY ({}) must be a non-negative number of seconds",
                delay_secs
            )));
        }

        // Optional: backup schedule time zone
        let timezone = env::var("TZ")
            .unwrap_or_else(|_| "Asia/Kuala_Lumpur".to_string())
            .parse::<Tz>()
            .map_err(|e| BotError::Config(format!("TZ is not a valid IANA time zone: {}", e)))?;

        Ok(Config {
            bot_token,
            webhook_url,
            port,
            admin_ids,
            channel_button_text,
            channel_url,
            group_button_text,
            group_url,
            welcome_image,
            subscriber_file,
            delay: Duration::from_secs_f64(delay_secs),
            timezone,
        })
    }

    /// Whether the given user/chat ID may invoke management commands.
    pub fn is_admin(&self, id: i64) -> bool {
        self.admin_ids.contains(&id)
    }
}

/// Merge the built-in admin IDs with a comma-separated list from the
/// environment. Entries that do not parse are skipped; duplicates are
/// dropped; the built-in IDs keep their order.
fn merge_admin_ids(raw: &str) -> Vec<i64> {
    let mut ids: Vec<i64> = DEFAULT_ADMIN_IDS.to_vec();
    for part in raw.split(',') {
        if let Ok(id) = part.trim().parse::<i64>() {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

fn parse_url_var(name: &str, default: &str) -> Result<Url> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse::<Url>()
        .map_err(|e| BotError::Config(format!("{} is not a valid URL: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            bot_token: "test_token".to_string(),
            webhook_url: "https://bot.example.com/webhook".parse().unwrap(),
            port: 10000,
            admin_ids: vec![111, 222],
            channel_button_text: "channel".to_string(),
            channel_url: "https://t.me/example_channel".parse().unwrap(),
            group_button_text: "group".to_string(),
            group_url: "https://t.me/example_group".parse().unwrap(),
            welcome_image: PathBuf::from("banner-01.png"),
            subscriber_file: PathBuf::from("subscribers.txt"),
            delay: Duration::from_millis(500),
            timezone: chrono_tz::UTC,
        }
    }

    #[test]
    fn test_is_admin() {
        let config = test_config();
        assert!(config.is_admin(111));
        assert!(config.is_admin(222));
        assert!(!config.is_admin(333));
    }

    #[test]
    fn test_merge_admin_ids_defaults_only() {
        assert_eq!(merge_admin_ids(""), DEFAULT_ADMIN_IDS.to_vec());
    }

    #[test]
    fn test_merge_admin_ids_appends_extras() {
        let ids = merge_admin_ids("42, 7");
        assert_eq!(&ids[..DEFAULT_ADMIN_IDS.len()], DEFAULT_ADMIN_IDS);
        assert_eq!(&ids[DEFAULT_ADMIN_IDS.len()..], &[42, 7]);
    }

    #[test]
    fn test_merge_admin_ids_skips_garbage_and_duplicates() {
        let extra = DEFAULT_ADMIN_IDS[0];
        let ids = merge_admin_ids(&format!("abc, {}, 42, 42,", extra));
        assert_eq!(ids.len(), DEFAULT_ADMIN_IDS.len() + 1);
        assert_eq!(*ids.last().unwrap(), 42);
    }
}
