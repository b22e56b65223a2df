/// Daily backup of the subscriber file to the admins.
use crate::bot::BotState;
use crate::fanout::fan_out;
use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use tokio::task::JoinHandle;
use tracing::info;

/// Spawn the backup loop. Fires at local midnight in the configured time
/// zone, every day, for the lifetime of the process.
pub fn spawn_daily_backup(bot: Bot, state: BotState) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now().with_timezone(&state.config.timezone);
            let wait = duration_until_next_midnight(now);
            info!("Next subscriber backup in {:?}", wait);
            tokio::time::sleep(wait).await;
            run_backup(&bot, &state).await;
        }
    })
}

/// Send the subscriber file to every admin with a count caption.
///
/// Per-admin failures are logged by the fanout and skipped; nothing here can
/// take the backup loop down.
pub async fn run_backup(bot: &Bot, state: &BotState) {
    let subs = state.store.load_all();
    if !state.store.exists() {
        info!("No subscriber file yet, skipping backup");
        return;
    }

    let caption = format!("🗂️ Daily backup: subscribers ({})", subs.len());
    let outcome = fan_out(&state.config.admin_ids, state.config.delay, |admin_id| {
        let bot = bot.clone();
        let document = InputFile::file(state.store.path().to_path_buf());
        let caption = caption.clone();
        async move {
            bot.send_document(ChatId(admin_id), document)
                .caption(caption)
                .await
                .map(|_| ())
        }
    })
    .await;

    info!(
        "Daily backup delivered to {} admins ({} failed)",
        outcome.sent, outcome.fail
    );
}

/// Time left until the next local midnight.
///
/// A midnight skipped by a DST transition falls back to reading the naive
/// time as UTC; a negative difference clamps to one minute.
fn duration_until_next_midnight(now: DateTime<Tz>) -> Duration {
    let tz = now.timezone();
    let next_day = now.date_naive() + Days::new(1);
    let naive = next_day.and_time(NaiveTime::MIN);
    let next = match tz.from_local_datetime(&naive).earliest() {
        Some(dt) => dt,
        None => tz.from_utc_datetime(&naive),
    };
    (next - now).to_std().unwrap_or(Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_until_next_midnight_exact() {
        let now = chrono_tz::UTC.with_ymd_and_hms(2024, 5, 1, 23, 0, 0).unwrap();
        assert_eq!(duration_until_next_midnight(now), Duration::from_secs(3600));
    }

    #[test]
    fn test_duration_until_next_midnight_just_after_midnight() {
        let now = chrono_tz::Asia::Kuala_Lumpur
            .with_ymd_and_hms(2024, 5, 1, 0, 0, 1)
            .unwrap();
        let wait = duration_until_next_midnight(now);
        assert!(wait > Duration::ZERO);
        assert!(wait <= Duration::from_secs(24 * 60 * 60));
    }
}
