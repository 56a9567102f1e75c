use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::driver::PhaseEnd;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub target: TargetConfig,
    pub ramp: RampConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TargetConfig {
    pub addr: String,
    pub message: String,
    pub nodelay: bool,
    pub keepalive_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RampConfig {
    pub num_clients: u32,
    pub initial_rate: u32,
    pub pause_secs: u64,
    /// 0 keeps a cohort alive until every worker in it has exited.
    pub phase_secs: u64,
    pub max_rate: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReportConfig {
    pub interval_ms: u64,
    pub remote_process: Option<String>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("target address must not be empty")]
    EmptyTarget,
    #[error("num_clients must be at least 1")]
    NoClients,
    #[error("initial_rate must be at least 1")]
    ZeroRate,
    #[error("max_rate {max} is below initial_rate {initial}")]
    MaxBelowInitial { max: u32, initial: u32 },
    #[error("report interval must be non-zero")]
    ZeroReportInterval,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            addr: "localhost:1234".to_string(),
            message: "ping".to_string(),
            nodelay: true,
            keepalive_secs: 30,
        }
    }
}

impl Default for RampConfig {
    fn default() -> Self {
        Self {
            num_clients: 50,
            initial_rate: 1000,
            pause_secs: 5,
            phase_secs: 10,
            max_rate: None,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            remote_process: None,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.addr.trim().is_empty() {
            return Err(ConfigError::EmptyTarget);
        }
        if self.ramp.num_clients == 0 {
            return Err(ConfigError::NoClients);
        }
        if self.ramp.initial_rate == 0 {
            return Err(ConfigError::ZeroRate);
        }
        if let Some(max) = self.ramp.max_rate {
            if max < self.ramp.initial_rate {
                return Err(ConfigError::MaxBelowInitial {
                    max,
                    initial: self.ramp.initial_rate,
                });
            }
        }
        if self.report.interval_ms == 0 {
            return Err(ConfigError::ZeroReportInterval);
        }
        Ok(())
    }
}

impl RampConfig {
    pub fn phase_end(&self) -> PhaseEnd {
        match self.phase_secs {
            0 => PhaseEnd::CohortExit,
            secs => PhaseEnd::Deadline(Duration::from_secs(secs)),
        }
    }

    pub fn pause(&self) -> Duration {
        Duration::from_secs(self.pause_secs)
    }
}

impl ReportConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}
