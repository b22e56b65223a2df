/// Delay-paced sequential fanout over a subscriber list.
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Totals reported after a fanout run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanoutOutcome {
    pub sent: usize,
    pub fail: usize,
}

/// Attempt one send per chat ID, in order.
///
/// Failures are logged and counted, never retried, and never abort the loop.
/// After every attempt, successful or not, the fixed delay is awaited before
/// the next recipient; this is the sole rate-limit control. The loop runs to
/// completion once started.
pub async fn fan_out<E, F, Fut>(chat_ids: &[i64], delay: Duration, mut send: F) -> FanoutOutcome
where
    E: Display,
    F: FnMut(i64) -> Fut,
    Fut: Future<Output = std::result::Result<(), E>>,
{
    let mut outcome = FanoutOutcome::default();
    for &chat_id in chat_ids {
        match send(chat_id).await {
            Ok(()) => outcome.sent += 1,
            Err(e) => {
                warn!("Delivery to {} failed: {}", chat_id, e);
                outcome.fail += 1;
            }
        }
        sleep(delay).await;
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[tokio::test]
    async fn test_fan_out_counts_mixed_results() {
        let calls = RefCell::new(Vec::new());
        let outcome = fan_out(&[111, 222], Duration::ZERO, |chat_id| {
            calls.borrow_mut().push(chat_id);
            async move {
                if chat_id == 222 {
                    Err("boom".to_string())
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert_eq!(outcome, FanoutOutcome { sent: 1, fail: 1 });
        assert_eq!(*calls.borrow(), vec![111, 222]);
    }

    #[tokio::test]
    async fn test_fan_out_all_failures_still_completes() {
        let outcome = fan_out(&[1, 2, 3], Duration::ZERO, |_| async {
            Err::<(), _>("unreachable chat")
        })
        .await;

        assert_eq!(outcome, FanoutOutcome { sent: 0, fail: 3 });
    }

    #[tokio::test]
    async fn test_fan_out_empty_list_sends_nothing() {
        let calls = RefCell::new(0);
        let outcome = fan_out(&[], Duration::ZERO, |_| {
            *calls.borrow_mut() += 1;
            async { Ok::<_, String>(()) }
        })
        .await;

        assert_eq!(outcome, FanoutOutcome::default());
        assert_eq!(*calls.borrow(), 0);
    }

    #[tokio::test]
    async fn test_fan_out_visits_store_order() {
        let calls = RefCell::new(Vec::new());
        fan_out(&[333, 111, 222], Duration::ZERO, |chat_id| {
            calls.borrow_mut().push(chat_id);
            async { Ok::<_, String>(()) }
        })
        .await;

        assert_eq!(*calls.borrow(), vec![333, 111, 222]);
    }
}
