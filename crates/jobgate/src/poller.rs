//! Periodic job polling.
//!
//! Fetches a full snapshot on a fixed interval and whenever a wake signal
//! arrives (for example the host page becoming visible), then feeds it to
//! the [`JobStore`]. At most one fetch is in flight; a refresh requested
//! during a fetch is dropped and relies on that fetch's result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::backend::JobBackend;
use crate::jobs::{JobStore, ReconcileReport};

/// Result of one poll attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Reconciled(ReconcileReport),
    /// Another fetch was already in flight.
    Coalesced,
    /// The fetch failed; the store still holds the last good snapshot.
    Failed(String),
}

pub struct Poller {
    backend: Arc<dyn JobBackend>,
    store: Arc<JobStore>,
    interval: Duration,
    fetch_lock: Mutex<()>,
    shutdown: AtomicBool,
    wake: Notify,
}

impl Poller {
    pub fn new(backend: Arc<dyn JobBackend>, store: Arc<JobStore>, interval: Duration) -> Self {
        Self {
            backend,
            store,
            interval,
            fetch_lock: Mutex::new(()),
            shutdown: AtomicBool::new(false),
            wake: Notify::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Fetches and reconciles once, unless a fetch is already running.
    pub async fn refresh(&self) -> PollOutcome {
        let _guard = match self.fetch_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                log::debug!("Job refresh coalesced into in-flight fetch");
                return PollOutcome::Coalesced;
            }
        };

        match self.backend.list_jobs().await {
            Ok(snapshot) => {
                let result = self.store.reconcile(snapshot);
                log::debug!(
                    "Reconciled jobs: {} active, {} completed",
                    result.active.len(),
                    result.completed.len()
                );
                PollOutcome::Reconciled(result.report)
            }
            Err(e) => {
                log::warn!("Job poll failed, keeping last snapshot: {}", e);
                PollOutcome::Failed(e.to_string())
            }
        }
    }

    /// Starts the poll loop on the current tokio runtime.
    ///
    /// The first fetch happens immediately. Each message on `trigger_rx`
    /// requests an extra fetch; triggers that pile up while a fetch runs
    /// are collapsed into it.
    pub fn start(self: &Arc<Self>, trigger_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let poller = Arc::clone(self);

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(poller.interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut triggers = Some(trigger_rx);

            loop {
                if poller.shutdown.load(Ordering::Acquire) {
                    break;
                }

                tokio::select! {
                    _ = timer.tick() => {},
                    triggered = next_trigger(&mut triggers) => {
                        if !triggered {
                            continue;
                        }
                        log::debug!("On-demand job refresh requested");
                    },
                    _ = poller.wake.notified() => {},
                }

                if poller.shutdown.load(Ordering::Acquire) {
                    break;
                }

                poller.refresh().await;
                drain_triggers(&mut triggers);
            }

            log::info!("Job poller stopped");
        })
    }

    /// Signals the poll loop to exit.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

/// Waits for the next wake signal. Returns false once the channel closes,
/// after which only the timer drives polling.
async fn next_trigger(triggers: &mut Option<broadcast::Receiver<()>>) -> bool {
    let Some(rx) = triggers.as_mut() else {
        return std::future::pending().await;
    };
    match rx.recv().await {
        Ok(()) | Err(RecvError::Lagged(_)) => true,
        Err(RecvError::Closed) => {
            *triggers = None;
            false
        }
    }
}

fn drain_triggers(triggers: &mut Option<broadcast::Receiver<()>>) {
    if let Some(rx) = triggers.as_mut() {
        loop {
            match rx.try_recv() {
                Ok(()) | Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }
}
