//! Retry loop with exponential backoff and a deadline per attempt.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use warden_core::config::AlertingConfig;
use warden_core::errors::DeliveryError;
use warden_core::models::AlertRecord;
use warden_core::traits::Notifier;

/// Retry settings for one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub attempt_timeout: Duration,
}

impl DeliveryPolicy {
    pub fn from_config(config: &AlertingConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: config.initial_backoff(),
            max_backoff: config.max_backoff(),
            attempt_timeout: config.delivery_timeout(),
        }
    }
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self::from_config(&AlertingConfig::default())
    }
}

/// Outcome of [`deliver`].
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReport {
    pub attempts: u32,
    pub result: Result<(), DeliveryError>,
}

/// Try `notifier` up to `1 + max_retries` times. A rejection is final;
/// timeouts and unreachable notifiers are retried.
pub fn deliver(
    notifier: &Arc<dyn Notifier>,
    alert: &AlertRecord,
    policy: &DeliveryPolicy,
) -> DeliveryReport {
    let mut backoff = policy.initial_backoff;
    let mut last_error = String::new();
    let mut attempts = 0;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            tracing::debug!(
                alert_id = %alert.id,
                "alerting: retry attempt {}/{} after {:?}",
                attempt,
                policy.max_retries,
                backoff
            );
            std::thread::sleep(backoff);
            backoff = (backoff * 2).min(policy.max_backoff);
        }
        attempts += 1;

        match notify_with_deadline(notifier, alert, policy.attempt_timeout) {
            Ok(()) => {
                return DeliveryReport {
                    attempts,
                    result: Ok(()),
                }
            }
            Err(e @ DeliveryError::Rejected { .. }) => {
                return DeliveryReport {
                    attempts,
                    result: Err(e),
                }
            }
            Err(e) => last_error = e.to_string(),
        }
    }

    DeliveryReport {
        attempts,
        result: Err(DeliveryError::Exhausted {
            attempts,
            last_error,
        }),
    }
}

/// Run one `notify` on a helper thread and stop waiting at `timeout`. A
/// notifier that overruns keeps running detached; its late result is
/// discarded.
fn notify_with_deadline(
    notifier: &Arc<dyn Notifier>,
    alert: &AlertRecord,
    timeout: Duration,
) -> Result<(), DeliveryError> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let notifier = Arc::clone(notifier);
    let alert = alert.clone();
    std::thread::Builder::new()
        .name("warden-notify".into())
        .spawn(move || {
            let _ = tx.send(notifier.notify(&alert));
        })
        .map_err(|e| DeliveryError::Unreachable {
            reason: format!("failed to start notify attempt: {e}"),
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(DeliveryError::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
        Err(RecvTimeoutError::Disconnected) => Err(DeliveryError::Unreachable {
            reason: "notifier panicked".into(),
        }),
    }
}
