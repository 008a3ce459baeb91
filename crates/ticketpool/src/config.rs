//! Run parameters and the durable store that remembers the last saved set.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Rates at or below this many milliseconds are rejected by `validate`.
pub const MIN_RATE_MILLIS: i64 = 1000;

/// Parameters of one simulation run, as exchanged with clients.
///
/// Fields are signed so that out-of-range values reach validation instead of
/// failing deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationConfig {
    pub total_tickets: i64,
    /// Milliseconds between a vendor's release attempts.
    pub ticket_release_rate: i64,
    /// Milliseconds between a customer's purchase attempts.
    pub customer_retrieval_rate: i64,
    pub max_ticket_capacity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("total tickets must be positive (got {0})")]
    TotalTickets(i64),
    #[error("max ticket capacity must be positive (got {0})")]
    MaxCapacity(i64),
    #[error("max ticket capacity {capacity} exceeds total tickets {total}")]
    CapacityExceedsTotal { capacity: i64, total: i64 },
    #[error("ticket release rate must exceed 1000ms (got {0}ms)")]
    ReleaseRate(i64),
    #[error("customer retrieval rate must exceed 1000ms (got {0}ms)")]
    RetrievalRate(i64),
}

impl SimulationConfig {
    /// Values written by `ConfigStore::reset_to_default`.
    pub const DEFAULT: Self = Self {
        total_tickets: 100,
        ticket_release_rate: 500,
        customer_retrieval_rate: 3000,
        max_ticket_capacity: 50,
    };

    pub fn new(
        total_tickets: i64,
        ticket_release_rate: i64,
        customer_retrieval_rate: i64,
        max_ticket_capacity: i64,
    ) -> Self {
        Self {
            total_tickets,
            ticket_release_rate,
            customer_retrieval_rate,
            max_ticket_capacity,
        }
    }

    /// Check the rules a run configuration must satisfy before it is accepted.
    ///
    /// A non-positive capacity passes here and is rejected when the pool is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_tickets <= 0 {
            return Err(ConfigError::TotalTickets(self.total_tickets));
        }
        if self.ticket_release_rate <= MIN_RATE_MILLIS {
            return Err(ConfigError::ReleaseRate(self.ticket_release_rate));
        }
        if self.customer_retrieval_rate <= MIN_RATE_MILLIS {
            return Err(ConfigError::RetrievalRate(self.customer_retrieval_rate));
        }
        if self.max_ticket_capacity > self.total_tickets {
            return Err(ConfigError::CapacityExceedsTotal {
                capacity: self.max_ticket_capacity,
                total: self.total_tickets,
            });
        }
        Ok(())
    }

    pub fn release_interval(&self) -> Duration {
        millis(self.ticket_release_rate)
    }

    pub fn retrieval_interval(&self) -> Duration {
        millis(self.customer_retrieval_rate)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for SimulationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Total Tickets={}, Ticket Release Rate={}ms, Customer Retrieval Rate={}ms, Max Ticket Capacity={}",
            self.total_tickets,
            self.ticket_release_rate,
            self.customer_retrieval_rate,
            self.max_ticket_capacity
        )
    }
}

fn millis(value: i64) -> Duration {
    Duration::from_millis(value.max(0) as u64)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigStoreError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Durable record of the last saved run parameters.
///
/// Stores do not validate: whatever is saved is loaded back verbatim.
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<Option<SimulationConfig>, ConfigStoreError>;

    fn save(&self, config: SimulationConfig) -> Result<SimulationConfig, ConfigStoreError>;

    fn reset_to_default(&self) -> Result<SimulationConfig, ConfigStoreError> {
        self.save(SimulationConfig::DEFAULT)
    }
}

/// Process-lifetime store, used when no config path is set.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    saved: Mutex<Option<SimulationConfig>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<Option<SimulationConfig>, ConfigStoreError> {
        Ok(*self
            .saved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    fn save(&self, config: SimulationConfig) -> Result<SimulationConfig, ConfigStoreError> {
        *self
            .saved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(config);
        Ok(config)
    }
}

/// Single JSON document on disk.
///
/// Writes go to a sibling temp file that is then renamed over the target,
/// so a crash mid-save leaves the previous record intact.
#[derive(Debug)]
pub struct FileConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> ConfigStoreError {
        ConfigStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Result<Option<SimulationConfig>, ConfigStoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_err(e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| ConfigStoreError::Json {
                path: self.path.clone(),
                source,
            })
    }

    fn save(&self, config: SimulationConfig) -> Result<SimulationConfig, ConfigStoreError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }

        let json = serde_json::to_vec_pretty(&config).map_err(|source| ConfigStoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| self.io_err(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;

        tracing::debug!(path = %self.path.display(), "Saved configuration");
        Ok(config)
    }
}
