//! Background sweeper that marks decayed payment codes expired.
//!
//! Expiry is also enforced at process time, so the sweeper only keeps the
//! observable code status honest for readers of the lookup endpoints.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::store::PaymentStore;

/// Default interval between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Spawns a task that periodically expires decayed pending codes until the
/// returned handle is aborted.
pub fn start<S: PaymentStore + 'static>(store: Arc<S>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match store.sweep_expired(Utc::now()).await {
                Ok(0) => {}
                Ok(swept) => {
                    tracing::info!(swept, "expired payment codes swept");
                    metrics::counter!("payment_codes_expired_total").increment(swept as u64);
                }
                Err(err) => {
                    tracing::error!(error = %err, "payment code sweep failed");
                }
            }
        }
    })
}
