//! Gateway wiring: controller, poller and expiry clock built from config.

pub mod controller;
pub mod events;
pub mod expiry;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub use controller::{ApproveOutcome, GatewayController};
pub use events::{GatewayBroadcaster, GatewayEvent, Notice};
pub use expiry::ExpiryClock;

use crate::approval::ApprovalQueue;
use crate::backend::{HttpJobBackend, JobBackend};
use crate::config::GatewayConfig;
use crate::error::Result;
use crate::jobs::{Job, JobStore};
use crate::poller::Poller;

/// Handles of the background tasks started by [`GatewayService::start`].
pub struct ServiceTasks {
    pub poller: JoinHandle<()>,
    pub expiry: JoinHandle<()>,
}

/// A fully wired gateway.
pub struct GatewayService {
    controller: Arc<GatewayController>,
    poller: Arc<Poller>,
    expiry: Arc<ExpiryClock>,
    page_size: usize,
}

impl GatewayService {
    /// Builds a gateway talking HTTP to the configured backend.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        crate::config::validate_config(config)?;
        let backend = HttpJobBackend::new(&config.backend)?;
        Ok(Self::with_backend(config, Arc::new(backend)))
    }

    pub fn with_backend(config: &GatewayConfig, backend: Arc<dyn JobBackend>) -> Self {
        let store = Arc::new(JobStore::new(config.event_capacity));
        let approvals = Arc::new(ApprovalQueue::new(
            config.approvals.expiration,
            config.event_capacity,
        ));
        let controller = Arc::new(GatewayController::new(
            Arc::clone(&store),
            approvals,
            Arc::clone(&backend),
            GatewayBroadcaster::new(config.event_capacity),
        ));
        let poller = Arc::new(Poller::new(
            backend,
            store,
            Duration::from_secs(config.poll.interval_secs),
        ));
        let expiry = Arc::new(ExpiryClock::new(
            Arc::clone(&controller),
            Duration::from_millis(config.approvals.tick_interval_ms),
        ));

        Self {
            controller,
            poller,
            expiry,
            page_size: config.page_size,
        }
    }

    pub fn controller(&self) -> &Arc<GatewayController> {
        &self.controller
    }

    pub fn poller(&self) -> &Arc<Poller> {
        &self.poller
    }

    /// Starts polling and the expiry clock. Send `()` on the trigger
    /// channel to request an immediate refresh.
    pub fn start(&self, trigger_rx: broadcast::Receiver<()>) -> ServiceTasks {
        log::info!(
            "Starting job gateway (poll every {:?})",
            self.poller.interval()
        );
        ServiceTasks {
            poller: self.poller.start(trigger_rx),
            expiry: self.expiry.start(),
        }
    }

    pub fn stop(&self) {
        self.poller.stop();
        self.expiry.stop();
    }

    /// One page of active jobs, zero-based.
    pub fn active_page(&self, page: usize) -> Vec<Job> {
        self.controller
            .store()
            .page(page.saturating_mul(self.page_size), self.page_size)
    }
}
