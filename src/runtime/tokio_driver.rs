//! Periodic update loop on a tokio runtime.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::runtime::SchedulingDriver;
use crate::util::clock::now_ms;

/// Spawn a task on `handle` that calls [`SchedulingDriver::update`] every
/// `period`. The first update runs immediately. Abort the returned handle
/// to stop the loop.
///
/// Each update runs on the blocking pool since it takes queue locks.
pub fn spawn_update_loop(
    handle: &Handle,
    driver: Arc<SchedulingDriver>,
    period: Duration,
) -> JoinHandle<()> {
    handle.spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let driver = Arc::clone(&driver);
            if let Err(e) = tokio::task::spawn_blocking(move || driver.update(now_ms())).await {
                tracing::warn!(error = %e, "update pass did not complete");
            }
        }
    })
}
