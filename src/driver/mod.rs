use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::{Config, TargetConfig};
use crate::stats::SharedCounter;
use crate::worker::{Worker, WorkerExit};

/// How a ramp phase decides that its cohort is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEnd {
    /// Cancel the cohort once the phase has run this long.
    Deadline(Duration),
    /// Wait until every worker of the cohort has exited by itself.
    CohortExit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RampSchedule {
    pub num_clients: u32,
    pub current_rate: u32,
    pub generation: u64,
    max_rate: u32,
}

impl RampSchedule {
    pub fn new(num_clients: u32, initial_rate: u32, max_rate: Option<u32>) -> Self {
        Self {
            num_clients,
            current_rate: initial_rate,
            generation: 0,
            max_rate: max_rate.unwrap_or(u32::MAX),
        }
    }

    pub fn advance(&mut self) {
        self.current_rate = self.current_rate.saturating_mul(2).min(self.max_rate);
        self.generation += 1;
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CohortReport {
    pub cancelled: u32,
    pub failed: u32,
    pub panicked: u32,
}

impl CohortReport {
    fn record(&mut self, joined: Result<WorkerExit, JoinError>) {
        match joined {
            Ok(WorkerExit::Cancelled) => self.cancelled += 1,
            Ok(WorkerExit::Failed) => self.failed += 1,
            Err(e) => {
                error!("Worker task failed: {}", e);
                self.panicked += 1;
            }
        }
    }
}

pub struct Driver {
    ramp: RampSchedule,
    phase_end: PhaseEnd,
    pause: Duration,
    target: Arc<TargetConfig>,
    counter: SharedCounter,
}

impl Driver {
    pub fn new(config: &Config, counter: SharedCounter) -> Self {
        Self {
            ramp: RampSchedule::new(
                config.ramp.num_clients,
                config.ramp.initial_rate,
                config.ramp.max_rate,
            ),
            phase_end: config.ramp.phase_end(),
            pause: config.ramp.pause(),
            target: Arc::new(config.target.clone()),
            counter,
        }
    }

    /// Runs ramp phases until `shutdown` fires and returns where the ramp got to.
    pub async fn run(mut self, shutdown: CancellationToken) -> RampSchedule {
        loop {
            let report = self.run_phase(&shutdown).await;
            info!(
                "Phase {} at {} req/s ended: {} cancelled, {} failed, {} panicked",
                self.ramp.generation,
                self.ramp.current_rate,
                report.cancelled,
                report.failed,
                report.panicked
            );

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return self.ramp,
                _ = time::sleep(self.pause) => {}
            }

            self.ramp.advance();
            info!("Ramping up to {} req/s per client", self.ramp.current_rate);
        }
    }

    async fn run_phase(&self, shutdown: &CancellationToken) -> CohortReport {
        let cohort_token = shutdown.child_token();
        let mut cohort = JoinSet::new();

        info!(
            "Phase {}: starting {} clients at {} req/s each",
            self.ramp.generation, self.ramp.num_clients, self.ramp.current_rate
        );
        for id in 0..self.ramp.num_clients {
            let worker = Worker::new(
                id,
                self.ramp.current_rate,
                self.target.clone(),
                self.counter.clone(),
            );
            debug!("Spawning worker {}", worker.id());
            cohort.spawn(worker.run(cohort_token.clone()));
        }

        let deadline = match self.phase_end {
            PhaseEnd::Deadline(phase) => Some(Instant::now() + phase),
            PhaseEnd::CohortExit => None,
        };
        let expired = async move {
            match deadline {
                Some(at) => time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(expired);

        let mut report = CohortReport::default();
        loop {
            tokio::select! {
                joined = cohort.join_next() => match joined {
                    Some(joined) => report.record(joined),
                    None => break,
                },
                _ = &mut expired => {
                    debug!("Phase {} deadline reached", self.ramp.generation);
                    break;
                }
            }
        }

        cohort_token.cancel();
        while let Some(joined) = cohort.join_next().await {
            report.record(joined);
        }
        report
    }
}
