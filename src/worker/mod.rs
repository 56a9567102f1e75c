use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::TargetConfig;
use crate::stats::SharedCounter;

mod socket;

const CYCLE: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("send failed: {0}")]
    Send(#[source] io::Error),
    #[error("flush failed: {0}")]
    Flush(#[source] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    Cancelled,
    Failed,
}

/// One outbound connection sending `rate` messages per one-second cycle.
pub struct Worker {
    id: u32,
    rate: u32,
    message: Vec<u8>,
    target: Arc<TargetConfig>,
    counter: SharedCounter,
}

impl Worker {
    pub fn new(id: u32, rate: u32, target: Arc<TargetConfig>, counter: SharedCounter) -> Self {
        let message = format!("Client {}: {}\n", id, target.message).into_bytes();
        Self {
            id,
            rate,
            message,
            target,
            counter,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Connects to the target and sends until the connection fails or `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) -> WorkerExit {
        self.supervise(&shutdown, self.session()).await
    }

    /// Same as [`Worker::run`] over an already open connection.
    pub async fn run_with<W>(self, conn: W, shutdown: CancellationToken) -> WorkerExit
    where
        W: AsyncWrite + Unpin,
    {
        self.supervise(&shutdown, self.serve(conn)).await
    }

    async fn supervise(
        &self,
        shutdown: &CancellationToken,
        session: impl Future<Output = WorkerError>,
    ) -> WorkerExit {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Worker {} cancelled", self.id);
                WorkerExit::Cancelled
            }
            e = session => {
                warn!("Worker {} error: {}", self.id, e);
                WorkerExit::Failed
            }
        }
    }

    async fn session(&self) -> WorkerError {
        match socket::connect(&self.target).await {
            Ok(stream) => {
                debug!("Worker {} connected to {}", self.id, self.target.addr);
                self.serve(stream).await
            }
            Err(e) => e,
        }
    }

    async fn serve<W>(&self, conn: W) -> WorkerError
    where
        W: AsyncWrite + Unpin,
    {
        let _connection = self.counter.connection_opened();
        let mut writer = BufWriter::new(conn);

        loop {
            if let Err(e) = self.cycle(&mut writer).await {
                return e;
            }
        }
    }

    async fn cycle<W>(&self, writer: &mut BufWriter<W>) -> Result<(), WorkerError>
    where
        W: AsyncWrite + Unpin,
    {
        let cycle_start = Instant::now();

        for _ in 0..self.rate {
            writer
                .write_all(&self.message)
                .await
                .map_err(WorkerError::Send)?;
        }
        writer.flush().await.map_err(WorkerError::Flush)?;

        self.counter.increment_requests(self.rate);

        if let Some(rest) = remaining_in_cycle(cycle_start.elapsed()) {
            time::sleep(rest).await;
        }
        Ok(())
    }
}

/// Time left to sleep in a cycle; a cycle that overran is not compensated.
pub fn remaining_in_cycle(elapsed: Duration) -> Option<Duration> {
    CYCLE.checked_sub(elapsed).filter(|rest| !rest.is_zero())
}
