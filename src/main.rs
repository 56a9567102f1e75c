use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod driver;
mod reporter;
mod stats;
mod worker;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "rampload=debug,info".into()),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading config from {}", path);
            config::Config::from_file(&path)?
        }
        None => {
            info!("No config file given, using defaults");
            config::Config::default()
        }
    };
    info!(
        "Targeting {} with {} clients, starting at {} req/s each",
        config.target.addr, config.ramp.num_clients, config.ramp.initial_rate
    );

    let counter = Arc::new(stats::Counter::new());
    let shutdown = CancellationToken::new();

    let reporter = reporter::Reporter::new(
        counter.clone(),
        reporter::SysinfoSampler::new(),
        config.report.remote_process.clone(),
        config.report.interval(),
    );
    let reporter_task = tokio::spawn(reporter.run(shutdown.clone()));

    let interrupt = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                println!("\nShutting down...");
                interrupt.cancel();
            }
            Err(e) => error!("Unable to listen for interrupt: {}", e),
        }
    });

    let driver = driver::Driver::new(&config, counter.clone());
    let ramp = driver.run(shutdown).await;
    reporter_task.await?;

    println!(
        "Total Requests: {}, last rate {} req/s per client after {} ramp steps",
        counter.total_requests(),
        ramp.current_rate,
        ramp.generation
    );
    Ok(())
}
