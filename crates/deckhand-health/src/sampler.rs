//! CPU/RSS sampling of supervised children

use deckhand_core::ResourceSample;
use parking_lot::Mutex;
use std::collections::HashMap;
use sysinfo::{Pid, System};
use tracing::trace;

/// Samples resource usage of live children by pid. The sampler only
/// observes; a pid that has died simply drops out of the snapshot.
pub struct ResourceSampler {
    system: Mutex<System>,
}

impl ResourceSampler {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    /// Take one snapshot for the given `name -> pid` set.
    pub fn sample(&self, pids: &HashMap<String, u32>) -> HashMap<String, ResourceSample> {
        let mut system = self.system.lock();
        system.refresh_all();

        let mut samples = HashMap::with_capacity(pids.len());
        for (name, pid) in pids {
            if let Some(process) = system.process(Pid::from_u32(*pid)) {
                let sample = ResourceSample {
                    cpu_percent: process.cpu_usage(),
                    memory_mb: process.memory() / (1024 * 1024),
                };
                trace!(name, pid, cpu = sample.cpu_percent, mem = sample.memory_mb, "sampled");
                samples.insert(name.clone(), sample);
            }
        }
        samples
    }
}

impl Default for ResourceSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_own_process() {
        let sampler = ResourceSampler::new();
        let mut pids = HashMap::new();
        pids.insert("self".to_string(), std::process::id());

        let samples = sampler.sample(&pids);
        assert!(samples.contains_key("self"));
    }

    #[test]
    fn test_dead_pid_skipped() {
        let sampler = ResourceSampler::new();
        let mut pids = HashMap::new();
        // pid 0 is never a visible user process
        pids.insert("ghost".to_string(), 0);

        let samples = sampler.sample(&pids);
        assert!(!samples.contains_key("ghost"));
    }

    #[test]
    fn test_empty_set() {
        let sampler = ResourceSampler::new();
        let samples = sampler.sample(&HashMap::new());
        assert!(samples.is_empty());
    }
}
