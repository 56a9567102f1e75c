use sysinfo::{Pid, ProcessRefreshKind, System};
use tracing::warn;

/// Source of CPU utilisation figures, in percent of one core.
pub trait CpuSampler {
    /// CPU usage of this process.
    fn local(&mut self) -> f32;

    /// CPU usage of the first process called `name`, if one is running.
    fn process(&mut self, name: &str) -> Option<f32>;
}

pub struct SysinfoSampler {
    system: System,
    pid: Option<Pid>,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                warn!("Cannot resolve own pid, local CPU will read 0: {}", e);
                None
            }
        };
        Self {
            system: System::new(),
            pid,
        }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuSampler for SysinfoSampler {
    fn local(&mut self) -> f32 {
        let Some(pid) = self.pid else {
            return 0.0;
        };
        // false only when the process vanished
        if !self
            .system
            .refresh_process_specifics(pid, ProcessRefreshKind::new().with_cpu())
        {
            return 0.0;
        }
        self.system
            .process(pid)
            .map(|p| p.cpu_usage())
            .unwrap_or(0.0)
    }

    fn process(&mut self, name: &str) -> Option<f32> {
        self.system
            .refresh_processes_specifics(ProcessRefreshKind::new().with_cpu());
        self.system
            .processes_by_exact_name(name)
            .next()
            .map(|p| p.cpu_usage())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_process_is_not_found() {
        let mut sampler = SysinfoSampler::new();
        assert!(sampler.process("no-such-process-rampload-test").is_none());
    }

    #[test]
    fn local_sample_is_a_percentage() {
        let mut sampler = SysinfoSampler::new();
        let usage = sampler.local();
        assert!(usage >= 0.0);
    }
}
