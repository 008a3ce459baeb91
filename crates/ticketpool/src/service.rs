//! SimulationService: transport-agnostic wiring of the simulation.
//!
//! This service owns:
//! - The orchestrator (pool + workers of the current run)
//! - The activity log and the broadcast notification channel
//! - The durable configuration store
//! - Shutdown coordination for the transport
//!
//! Transports (HTTP, WebSocket) delegate to this service.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};

use crate::activity_log::{ActivityLog, DEFAULT_LOG_CAPACITY};
use crate::config::ConfigStore;
use crate::notify::{BroadcastNotifier, Notification};
use crate::orchestrator::Orchestrator;
use crate::worker::WorkerPopulation;

/// Tuning knobs for a service instance.
#[derive(Debug, Clone, Copy)]
pub struct ServiceOptions {
    pub population: WorkerPopulation,
    pub shutdown_grace: Duration,
    pub log_capacity: usize,
    pub notification_capacity: usize,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            population: WorkerPopulation::default(),
            shutdown_grace: Orchestrator::DEFAULT_SHUTDOWN_GRACE,
            log_capacity: DEFAULT_LOG_CAPACITY,
            notification_capacity: BroadcastNotifier::DEFAULT_CAPACITY,
        }
    }
}

pub struct SimulationService {
    orchestrator: Orchestrator,
    config_store: Arc<dyn ConfigStore>,
    notifier: BroadcastNotifier,

    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl SimulationService {
    pub fn new(config_store: Arc<dyn ConfigStore>) -> Self {
        Self::with_options(config_store, ServiceOptions::default())
    }

    pub fn with_options(config_store: Arc<dyn ConfigStore>, options: ServiceOptions) -> Self {
        let notifier = BroadcastNotifier::new(options.notification_capacity);
        let shared: Arc<BroadcastNotifier> = Arc::new(notifier.clone());
        let log = Arc::new(ActivityLog::new(options.log_capacity, shared.clone()));
        let orchestrator = Orchestrator::new(log, shared)
            .with_population(options.population)
            .with_shutdown_grace(options.shutdown_grace);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            orchestrator,
            config_store,
            notifier,
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn config_store(&self) -> &Arc<dyn ConfigStore> {
        &self.config_store
    }

    /// Receive every notification published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifier.subscribe()
    }

    /// Stop the current run, if any, releasing all workers.
    pub async fn shutdown(&self) {
        self.orchestrator.stop().await;
    }

    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }
}
