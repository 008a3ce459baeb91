//! Vendor and customer workers.
//!
//! A worker decides *when* to try a pool operation; the pool decides whether
//! it succeeds. Each worker is one tokio task looping
//! `attempt -> sleep(interval)` until the pool stops or the run's
//! cancellation token fires. Cancellation is raced against the sleep, so a
//! stop never waits out a long interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::pool::TicketPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Vendor: releases tickets into the pool.
    Producer,
    /// Customer: buys tickets from the pool.
    Consumer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Producer => "vendor",
            Self::Consumer => "customer",
        }
    }
}

/// Number of workers spawned per run.
///
/// Independent of the ticket counts: a run with 10 tickets still gets the
/// full population.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPopulation {
    pub producers: u32,
    pub consumers: u32,
}

impl WorkerPopulation {
    pub const fn new(producers: u32, consumers: u32) -> Self {
        Self {
            producers,
            consumers,
        }
    }

    pub fn total(&self) -> usize {
        self.producers as usize + self.consumers as usize
    }
}

impl Default for WorkerPopulation {
    fn default() -> Self {
        Self::new(500, 500)
    }
}

pub struct Worker {
    role: Role,
    id: u32,
    interval: Duration,
    pool: Arc<TicketPool>,
    cancel: CancellationToken,
}

impl Worker {
    pub fn producer(id: u32, pool: Arc<TicketPool>, cancel: CancellationToken) -> Self {
        Self {
            role: Role::Producer,
            id,
            interval: pool.release_interval(),
            pool,
            cancel,
        }
    }

    pub fn consumer(id: u32, pool: Arc<TicketPool>, cancel: CancellationToken) -> Self {
        Self {
            role: Role::Consumer,
            id,
            interval: pool.retrieval_interval(),
            pool,
            cancel,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Run until the pool stops or the token is cancelled.
    pub async fn run(self) {
        while self.pool.is_running() && !self.cancel.is_cancelled() {
            match self.role {
                Role::Producer => self.pool.add_one(self.id),
                Role::Consumer => self.pool.take_one(self.id),
            };

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        tracing::trace!(role = self.role.as_str(), id = self.id, "Worker stopped");
    }
}

/// Outcome of stopping a worker group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Workers that exited on their own within the grace period.
    pub exited: usize,
    /// Workers still running after the grace period, aborted.
    pub aborted: usize,
}

/// The live worker population of one run.
///
/// Dropping the group aborts any worker still running.
pub struct WorkerGroup {
    cancel: CancellationToken,
    tasks: JoinSet<()>,
}

impl WorkerGroup {
    /// Spawn `population` workers bound to `pool` on the current runtime.
    pub fn spawn(pool: &Arc<TicketPool>, population: WorkerPopulation) -> Self {
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();

        for id in 1..=population.producers {
            let worker = Worker::producer(id, Arc::clone(pool), cancel.child_token());
            tasks.spawn(worker.run());
        }
        for id in 1..=population.consumers {
            let worker = Worker::consumer(id, Arc::clone(pool), cancel.child_token());
            tasks.spawn(worker.run());
        }

        tracing::info!(
            producers = population.producers,
            consumers = population.consumers,
            "Spawned workers"
        );
        Self { cancel, tasks }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Cancel every worker and wait up to `grace` for them to exit, then
    /// abort whatever is left.
    pub async fn shutdown(mut self, grace: Duration) -> ShutdownReport {
        self.cancel.cancel();

        let mut report = ShutdownReport::default();
        let drained = tokio::time::timeout(grace, async {
            while let Some(res) = self.tasks.join_next().await {
                if let Err(e) = res
                    && e.is_panic()
                {
                    tracing::error!(error = %e, "Worker panicked");
                }
                report.exited += 1;
            }
        })
        .await;

        if drained.is_err() {
            report.aborted = self.tasks.len();
            tracing::warn!(
                remaining = report.aborted,
                ?grace,
                "Workers did not exit within grace period, aborting"
            );
            self.tasks.abort_all();
            while self.tasks.join_next().await.is_some() {}
        }

        report
    }
}

impl std::fmt::Debug for WorkerGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerGroup")
            .field("live", &self.tasks.len())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity_log::ActivityLog;
    use crate::notify::NullNotifier;

    fn pool(total: i64, cap: i64, release: Duration, retrieval: Duration) -> Arc<TicketPool> {
        let log = Arc::new(ActivityLog::new(100, Arc::new(NullNotifier)));
        Arc::new(
            TicketPool::new(total, cap, release, retrieval, log, Arc::new(NullNotifier)).unwrap(),
        )
    }

    #[test]
    fn default_population_is_500_each() {
        let population = WorkerPopulation::default();
        assert_eq!(population, WorkerPopulation::new(500, 500));
        assert_eq!(population.total(), 1000);
    }

    #[tokio::test]
    async fn worker_does_nothing_when_pool_not_running() {
        let pool = pool(10, 5, Duration::from_millis(10), Duration::from_millis(10));
        let worker = Worker::consumer(1, Arc::clone(&pool), CancellationToken::new());

        tokio::time::timeout(Duration::from_secs(1), worker.run())
            .await
            .expect("worker should exit immediately");
        assert_eq!(pool.available_count(), 5);
    }

    #[tokio::test]
    async fn consumer_drains_pool_until_stopped() {
        let pool = pool(10, 5, Duration::from_millis(5), Duration::from_millis(5));
        pool.start();
        let handle = tokio::spawn(
            Worker::consumer(1, Arc::clone(&pool), CancellationToken::new()).run(),
        );

        tokio::time::timeout(Duration::from_secs(2), async {
            while pool.available_count() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("consumer should empty the pool");

        pool.stop();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker should exit on next wake after stop")
            .unwrap();
    }

    #[tokio::test]
    async fn producer_refills_up_to_capacity() {
        let pool = pool(10, 5, Duration::from_millis(5), Duration::from_millis(5));
        assert!(pool.take_one(1));
        assert!(pool.take_one(1));
        pool.start();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Worker::producer(3, Arc::clone(&pool), cancel.clone()).run());

        tokio::time::timeout(Duration::from_secs(2), async {
            while pool.available_count() < 5 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("producer should refill the pool");

        // Keeps running at capacity without overshooting.
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(pool.available_count(), 5);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn cancel_interrupts_long_sleep() {
        let hour = Duration::from_secs(3600);
        let pool = pool(10, 5, hour, hour);
        pool.start();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Worker::consumer(1, Arc::clone(&pool), cancel.clone()).run());

        // Let it make its one attempt and go to sleep.
        tokio::time::timeout(Duration::from_secs(1), async {
            while pool.available_count() == 5 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        cancel.cancel();
        tokio::time::timeout(Duration::from_millis(500), handle)
            .await
            .expect("cancel should wake a sleeping worker")
            .unwrap();
        assert_eq!(pool.available_count(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn group_shutdown_releases_sleeping_workers() {
        let minute = Duration::from_secs(60);
        let pool = pool(100, 50, minute, minute);
        pool.start();

        let group = WorkerGroup::spawn(&pool, WorkerPopulation::new(20, 20));
        assert_eq!(group.len(), 40);
        tokio::time::sleep(Duration::from_millis(50)).await;

        pool.stop();
        let report = tokio::time::timeout(
            Duration::from_secs(2),
            group.shutdown(Duration::from_secs(1)),
        )
        .await
        .expect("shutdown must not wait out the interval");

        assert_eq!(report, ShutdownReport {
            exited: 40,
            aborted: 0
        });
    }
}
