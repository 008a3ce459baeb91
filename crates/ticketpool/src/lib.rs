//! ticketpool: concurrent ticket pool simulation.
//!
//! Vendor workers release tickets into a bounded shared pool while customer
//! workers buy them. A run is configured, started and stopped through the
//! [`Orchestrator`]; every state change is recorded in the [`ActivityLog`]
//! and pushed to subscribers through a [`Notifier`].

pub mod activity_log;
pub mod config;
pub mod notify;
pub mod orchestrator;
pub mod pool;
pub mod service;
mod status;
pub mod transport;
pub mod worker;

pub use activity_log::{ActivityLog, DEFAULT_LOG_CAPACITY};
pub use config::{
    ConfigError, ConfigStore, ConfigStoreError, FileConfigStore, MemoryConfigStore,
    SimulationConfig,
};
pub use notify::{BroadcastNotifier, Notification, Notifier, NullNotifier, Topic};
pub use orchestrator::{InvalidState, Orchestrator, OrchestratorError};
pub use pool::{AddOutcome, TicketPool, TicketStats};
pub use service::{ServiceOptions, SimulationService};
pub use status::SystemStatus;
pub use worker::{Role, ShutdownReport, Worker, WorkerGroup, WorkerPopulation};
