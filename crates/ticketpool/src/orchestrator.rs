//! Orchestrator - owns the pool and worker population of the current run.
//!
//! Flow:
//! 1. `configure` validates and stores the pending configuration
//! 2. `start` builds a fresh pool from it, starts it, spawns the workers
//! 3. `stop` stops the pool, cancels the workers, waits a bounded grace
//!    period, aborts stragglers
//!
//! Lifecycle transitions are serialized by one async mutex held across the
//! whole transition. Status reads go through a separate lock that is only
//! held for pointer swaps, so they never wait behind a slow stop.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};

use crate::activity_log::ActivityLog;
use crate::config::{ConfigError, SimulationConfig};
use crate::notify::Notifier;
use crate::pool::{AddOutcome, TicketPool, TicketStats};
use crate::status::SystemStatus;
use crate::worker::{WorkerGroup, WorkerPopulation};

/// Lifecycle violations. The `Display` text is what clients see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidState {
    #[error("Configuration not set")]
    NotConfigured,
    #[error("System is already running")]
    AlreadyRunning,
    #[error("System is not running. Cannot add tickets.")]
    NotRunning,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrchestratorError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error(transparent)]
    InvalidState(#[from] InvalidState),
}

pub struct Orchestrator {
    log: Arc<ActivityLog>,
    notifier: Arc<dyn Notifier>,
    population: WorkerPopulation,
    shutdown_grace: Duration,

    pending: StdMutex<Option<SimulationConfig>>,
    /// Held for the duration of start/stop.
    workers: Mutex<Option<WorkerGroup>>,
    /// Active pool, or the last one after a stop (for final stats).
    pool: RwLock<Option<Arc<TicketPool>>>,
}

impl Orchestrator {
    pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

    pub fn new(log: Arc<ActivityLog>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            log,
            notifier,
            population: WorkerPopulation::default(),
            shutdown_grace: Self::DEFAULT_SHUTDOWN_GRACE,
            pending: StdMutex::new(None),
            workers: Mutex::new(None),
            pool: RwLock::new(None),
        }
    }

    pub fn with_population(mut self, population: WorkerPopulation) -> Self {
        self.population = population;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn population(&self) -> WorkerPopulation {
        self.population
    }

    pub fn activity_log(&self) -> &Arc<ActivityLog> {
        &self.log
    }

    /// Validate and store `config` for the next `start`. A running pool is
    /// not affected.
    pub fn configure(&self, config: SimulationConfig) -> Result<(), OrchestratorError> {
        config.validate()?;
        *self.lock_pending() = Some(config);
        self.log.append(format!("Configuration updated: {config}"));
        Ok(())
    }

    pub fn pending_config(&self) -> Option<SimulationConfig> {
        *self.lock_pending()
    }

    /// Start a run from the stored configuration.
    pub async fn start(&self) -> Result<(), OrchestratorError> {
        let config = self.pending_config().ok_or(InvalidState::NotConfigured)?;
        self.launch(config).await
    }

    /// Validate `config`, store it, and start a run with it.
    pub async fn start_with(&self, config: SimulationConfig) -> Result<(), OrchestratorError> {
        config.validate()?;
        self.launch(config).await?;
        *self.lock_pending() = Some(config);
        Ok(())
    }

    async fn launch(&self, config: SimulationConfig) -> Result<(), OrchestratorError> {
        let mut workers = self.workers.lock().await;

        let previous = self.pool.read().await.clone();
        if previous.as_ref().is_some_and(|p| p.is_running()) {
            return Err(InvalidState::AlreadyRunning.into());
        }

        // Build before tearing anything down so a bad config changes nothing.
        let pool = Arc::new(TicketPool::from_config(
            &config,
            Arc::clone(&self.log),
            Arc::clone(&self.notifier),
        )?);

        if let Some(previous) = previous {
            previous.stop();
        }
        if let Some(group) = workers.take() {
            group.shutdown(self.shutdown_grace).await;
        }

        pool.start();
        *self.pool.write().await = Some(Arc::clone(&pool));
        *workers = Some(WorkerGroup::spawn(&pool, self.population));

        self.log
            .append(format!("System started with configuration: {config}"));
        Ok(())
    }

    /// Stop the current run. Safe to call at any time; only an actual
    /// running-to-stopped transition is logged.
    pub async fn stop(&self) {
        let mut workers = self.workers.lock().await;

        let pool = self.pool.read().await.clone();
        let was_running = pool.as_ref().is_some_and(|p| p.is_running());
        if let Some(pool) = pool {
            pool.stop();
        }

        if let Some(group) = workers.take() {
            let report = group.shutdown(self.shutdown_grace).await;
            tracing::info!(
                exited = report.exited,
                aborted = report.aborted,
                "Workers released"
            );
        }

        if was_running {
            self.log.append("System stopped.");
        }
    }

    /// Release `count` tickets on behalf of `vendor_id` into the running pool.
    ///
    /// `Ok(false)` means the pool was already full.
    pub async fn add_tickets(&self, count: u64, vendor_id: u32) -> Result<bool, OrchestratorError> {
        let Some(pool) = self.pool.read().await.clone() else {
            return Err(InvalidState::NotRunning.into());
        };
        match pool.add_many(count, vendor_id) {
            AddOutcome::Added(_) => Ok(true),
            AddOutcome::Full => Ok(false),
            AddOutcome::Stopped => Err(InvalidState::NotRunning.into()),
        }
    }

    pub async fn status(&self) -> SystemStatus {
        self.pool
            .read()
            .await
            .as_ref()
            .is_some_and(|p| p.is_running())
            .into()
    }

    pub async fn stats(&self) -> TicketStats {
        self.pool
            .read()
            .await
            .as_ref()
            .map(|p| p.stats())
            .unwrap_or_default()
    }

    /// Number of workers of the current run still alive.
    pub async fn live_workers(&self) -> usize {
        self.workers.lock().await.as_ref().map_or(0, WorkerGroup::len)
    }

    pub fn logs(&self) -> Vec<String> {
        self.log.recent()
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Option<SimulationConfig>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::RecordingNotifier;
    use crate::notify::{NullNotifier, Topic};

    fn valid_config() -> SimulationConfig {
        SimulationConfig::new(100, 1500, 3000, 50)
    }

    fn orchestrator() -> Orchestrator {
        let log = Arc::new(ActivityLog::new(1000, Arc::new(NullNotifier)));
        Orchestrator::new(log, Arc::new(NullNotifier))
            .with_population(WorkerPopulation::new(4, 4))
            .with_shutdown_grace(Duration::from_millis(500))
    }

    fn messages(orch: &Orchestrator) -> Vec<String> {
        orch.logs()
            .iter()
            .map(|l| l.split_once(" - ").unwrap().1.to_string())
            .collect()
    }

    #[test]
    fn configure_rejects_invalid() {
        let orch = orchestrator();

        assert!(matches!(
            orch.configure(SimulationConfig::new(0, 1500, 3000, 0)),
            Err(OrchestratorError::InvalidConfig(ConfigError::TotalTickets(0)))
        ));
        assert!(matches!(
            orch.configure(SimulationConfig::new(100, 500, 3000, 200)),
            Err(OrchestratorError::InvalidConfig(_))
        ));
        assert_eq!(orch.pending_config(), None);
        assert!(orch.logs().is_empty());
    }

    #[test]
    fn configure_stores_and_logs() {
        let orch = orchestrator();
        orch.configure(valid_config()).unwrap();

        assert_eq!(orch.pending_config(), Some(valid_config()));
        assert_eq!(messages(&orch), vec![format!(
            "Configuration updated: {}",
            valid_config()
        )]);
    }

    #[tokio::test]
    async fn start_without_config_is_invalid_state() {
        let orch = orchestrator();
        assert_eq!(
            orch.start().await,
            Err(OrchestratorError::InvalidState(InvalidState::NotConfigured))
        );
        assert_eq!(orch.status().await, SystemStatus::Stopped);
    }

    #[tokio::test]
    async fn second_start_is_invalid_state() {
        let orch = orchestrator();
        orch.configure(valid_config()).unwrap();

        orch.start().await.unwrap();
        assert_eq!(orch.status().await, SystemStatus::Running);
        assert_eq!(
            orch.start().await,
            Err(OrchestratorError::InvalidState(InvalidState::AlreadyRunning))
        );

        orch.stop().await;
    }

    #[tokio::test]
    async fn start_spawns_fixed_population_regardless_of_tickets() {
        // Population is a load setting, not derived from ticket counts.
        let orch = orchestrator().with_population(WorkerPopulation::new(7, 3));
        orch.configure(SimulationConfig::new(2, 1500, 3000, 1)).unwrap();

        orch.start().await.unwrap();
        assert_eq!(orch.live_workers().await, 10);
        assert_eq!(orch.stats().await.total_tickets, 2);

        orch.stop().await;
        assert_eq!(orch.live_workers().await, 0);
    }

    #[tokio::test]
    async fn start_with_zero_capacity_fails_without_state_change() {
        let orch = orchestrator();
        // Passes configure rules; rejected by the pool.
        orch.configure(SimulationConfig::new(100, 1500, 3000, 0)).unwrap();

        assert_eq!(
            orch.start().await,
            Err(OrchestratorError::InvalidConfig(ConfigError::MaxCapacity(0)))
        );
        assert_eq!(orch.status().await, SystemStatus::Stopped);
        assert_eq!(orch.stats().await, TicketStats::default());
        assert_eq!(orch.live_workers().await, 0);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let orch = orchestrator();
        orch.stop().await;
        assert!(orch.logs().is_empty());

        orch.configure(valid_config()).unwrap();
        orch.start().await.unwrap();
        orch.stop().await;
        let after_first = (orch.status().await, orch.stats().await, orch.logs().len());

        orch.stop().await;
        let after_second = (orch.status().await, orch.stats().await, orch.logs().len());

        assert_eq!(after_first, after_second);
        assert_eq!(after_first.0, SystemStatus::Stopped);
        assert_eq!(messages(&orch).last().unwrap(), "System stopped.");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn stop_releases_sleeping_workers_within_grace() {
        let orch = orchestrator()
            .with_population(WorkerPopulation::new(50, 50))
            .with_shutdown_grace(Duration::from_millis(200));
        // Hour-long sleeps, far beyond the grace window.
        orch.configure(SimulationConfig::new(100, 3_600_000, 3_600_000, 50))
            .unwrap();
        orch.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        tokio::time::timeout(Duration::from_secs(2), orch.stop())
            .await
            .expect("stop must not wait out worker intervals");
        assert_eq!(orch.live_workers().await, 0);
        assert_eq!(orch.status().await, SystemStatus::Stopped);
    }

    #[tokio::test]
    async fn restart_replaces_pool() {
        let orch = orchestrator();
        orch.configure(valid_config()).unwrap();
        orch.start().await.unwrap();
        orch.stop().await;

        orch.configure(SimulationConfig::new(10, 1500, 3000, 10))
            .unwrap();
        orch.start().await.unwrap();
        assert_eq!(orch.stats().await.total_tickets, 10);
        orch.stop().await;
    }

    #[tokio::test]
    async fn stats_survive_stop() {
        let orch = orchestrator();
        assert_eq!(orch.stats().await, TicketStats::default());

        orch.configure(valid_config()).unwrap();
        orch.start().await.unwrap();
        orch.stop().await;

        assert_eq!(orch.status().await, SystemStatus::Stopped);
        assert_eq!(orch.stats().await.total_tickets, 100);
    }

    #[tokio::test]
    async fn add_tickets_requires_running_pool() {
        // One customer, no vendors: the pool starts full and the customer
        // buys exactly one ticket before sleeping for an hour.
        let orch = orchestrator().with_population(WorkerPopulation::new(0, 1));
        assert_eq!(
            orch.add_tickets(5, 1).await,
            Err(OrchestratorError::InvalidState(InvalidState::NotRunning))
        );

        orch.configure(SimulationConfig::new(100, 1500, 3_600_000, 60))
            .unwrap();
        orch.start().await.unwrap();
        tokio::time::timeout(Duration::from_millis(500), async {
            while orch.stats().await.available_tickets == 60 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("customer should buy one ticket");

        assert_eq!(orch.add_tickets(30, 42).await, Ok(true));
        assert_eq!(orch.stats().await.available_tickets, 60);
        assert_eq!(orch.add_tickets(1, 42).await, Ok(false));
        assert!(
            messages(&orch).contains(&"Vendor 42 added 1 tickets. Available tickets: 60".to_string())
        );

        orch.stop().await;
        assert_eq!(
            orch.add_tickets(1, 42).await,
            Err(OrchestratorError::InvalidState(InvalidState::NotRunning))
        );
    }

    #[tokio::test]
    async fn start_with_uses_explicit_config() {
        let orch = orchestrator();
        assert!(matches!(
            orch.start_with(SimulationConfig::new(100, 10, 3000, 50)).await,
            Err(OrchestratorError::InvalidConfig(ConfigError::ReleaseRate(10)))
        ));

        orch.start_with(valid_config()).await.unwrap();
        assert_eq!(orch.pending_config(), Some(valid_config()));
        assert_eq!(orch.status().await, SystemStatus::Running);
        assert_eq!(
            orch.start_with(SimulationConfig::new(10, 1500, 3000, 10)).await,
            Err(OrchestratorError::InvalidState(InvalidState::AlreadyRunning))
        );
        assert_eq!(orch.pending_config(), Some(valid_config()));
        orch.stop().await;
    }

    #[tokio::test]
    async fn lifecycle_events_reach_logs_topic() {
        let notifier = Arc::new(RecordingNotifier::new());
        let log = Arc::new(ActivityLog::new(1000, notifier.clone()));
        let orch = Orchestrator::new(log, notifier.clone())
            .with_population(WorkerPopulation::new(0, 0));

        orch.configure(valid_config()).unwrap();
        orch.start().await.unwrap();
        orch.stop().await;

        let logs = notifier.on(Topic::Logs);
        assert_eq!(logs.len(), 3);
        assert!(logs[1].ends_with(&format!(
            "System started with configuration: {}",
            valid_config()
        )));
        assert!(logs[2].ends_with("System stopped."));
    }
}
