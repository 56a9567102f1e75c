use std::fmt;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::stats::SharedCounter;

pub mod cpu;

pub use cpu::{CpuSampler, SysinfoSampler};

/// One reporting interval, printed as the console status line.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusLine {
    pub active_clients: i64,
    pub requests_per_sec: f64,
    pub total_requests: u64,
    pub local_cpu: f32,
    pub remote_cpu: f32,
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Active Clients: {}, Requests/sec: {:.2}, Total Requests: {}, Local CPU: {:.1}%, Remote CPU: {:.1}%",
            self.active_clients,
            self.requests_per_sec,
            self.total_requests,
            self.local_cpu,
            self.remote_cpu
        )
    }
}

pub struct Reporter<S> {
    counter: SharedCounter,
    sampler: S,
    remote_process: Option<String>,
    interval: Duration,
    last_tick: Instant,
}

impl<S: CpuSampler> Reporter<S> {
    pub fn new(
        counter: SharedCounter,
        sampler: S,
        remote_process: Option<String>,
        interval: Duration,
    ) -> Self {
        Self {
            counter,
            sampler,
            remote_process,
            interval,
            last_tick: Instant::now(),
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut ticker = time::interval_at(self.last_tick + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Reporter stopped");
                    return;
                }
                now = ticker.tick() => {
                    println!("{}", self.tick(now));
                }
            }
        }
    }

    /// Closes the interval ending at `now` and resets the interval counter.
    pub fn tick(&mut self, now: Instant) -> StatusLine {
        let elapsed = now.saturating_duration_since(self.last_tick).as_secs_f64();
        let requests = self.counter.get_and_reset_requests();
        let requests_per_sec = if elapsed > 0.0 {
            requests as f64 / elapsed
        } else {
            0.0
        };

        let local_cpu = self.sampler.local();
        let remote_cpu = match self.remote_process.as_deref() {
            Some(name) => self.sampler.process(name).unwrap_or(0.0),
            None => 0.0,
        };

        self.last_tick = now;

        StatusLine {
            active_clients: self.counter.active_connections(),
            requests_per_sec,
            total_requests: self.counter.total_requests(),
            local_cpu,
            remote_cpu,
        }
    }
}
