//! Periodic purge of expired orders.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::AppState;

const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Spawns a task that purges orders older than `retention_days` every
/// `interval`. The first purge runs immediately.
pub fn spawn(state: Arc<AppState>, retention_days: u32, interval: Duration) -> JoinHandle<()> {
    // tokio rejects a zero period
    let interval = interval.max(MIN_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            run_once(&state, retention_days).await;
        }
    })
}

/// Runs one purge pass, logging instead of failing.
pub async fn run_once(state: &AppState, retention_days: u32) {
    let cutoff = Utc::now() - chrono::Duration::days(i64::from(retention_days));
    if let Err(e) = state.controller.purge_older_than(cutoff).await {
        tracing::error!(error = %e, "retention purge failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::NewOrder;

    #[tokio::test]
    async fn test_run_once_keeps_fresh_orders() {
        let state = crate::create_default_state();
        let created = state
            .controller
            .create_order(NewOrder::new("Buy now", 42))
            .await
            .unwrap();

        run_once(&state, 30).await;

        assert!(state.controller.get_order(&created.order.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_run_once_with_zero_days_purges_everything() {
        let state = crate::create_default_state();
        let created = state
            .controller
            .create_order(NewOrder::new("Buy now", 42))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        run_once(&state, 0).await;

        assert!(state.controller.get_order(&created.order.id).await.is_err());
    }
}
