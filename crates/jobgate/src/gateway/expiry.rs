//! Background clock that expires pending approvals.
//!
//! Runs independently of any UI, so a request expires on time even when
//! nothing is showing it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::controller::GatewayController;

pub struct ExpiryClock {
    controller: Arc<GatewayController>,
    interval: Duration,
    shutdown: AtomicBool,
    wake: Notify,
}

impl ExpiryClock {
    pub fn new(controller: Arc<GatewayController>, interval: Duration) -> Self {
        Self {
            controller,
            interval,
            shutdown: AtomicBool::new(false),
            wake: Notify::new(),
        }
    }

    /// Starts ticking on the current tokio runtime.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let clock = Arc::clone(self);

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(clock.interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = timer.tick() => {},
                    _ = clock.wake.notified() => {},
                }

                if clock.shutdown.load(Ordering::Acquire) {
                    break;
                }

                // Must not await the backend.
                let expired = clock.controller.expire_due_detached(Utc::now());
                if !expired.is_empty() {
                    log::debug!("Expired {} approval request(s)", expired.len());
                }
            }

            log::info!("Approval expiry clock stopped");
        })
    }

    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.wake.notify_one();
    }
}
