use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct SystemCapabilities {
    pub cpu_cores: usize,
    pub logical_cores: usize,
    pub available_memory_gb: f64,
    pub optimal_parallel_downloads: usize,
    pub optimal_parallel_resolutions: usize,
    pub optimal_link_threads: usize,
}

/// Concurrency bounds handed to one install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencyLimits {
    /// In-flight index metadata requests during resolution.
    pub resolution: usize,
    /// Concurrent store acquisitions (tarball fetch + extraction).
    pub fetch: usize,
    /// Threads materializing layout entries.
    pub link: usize,
}

impl Default for ConcurrencyLimits {
    fn default() -> Self {
        SystemCapabilities::get().limits()
    }
}

impl ConcurrencyLimits {
    /// Clamps every bound to at least one.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            resolution: self.resolution.max(1),
            fetch: self.fetch.max(1),
            link: self.link.max(1),
        }
    }
}

static SYSTEM_CAPS: OnceLock<SystemCapabilities> = OnceLock::new();

impl SystemCapabilities {
    pub fn get() -> &'static Self {
        SYSTEM_CAPS.get_or_init(|| {
            let cpu_cores = num_cpus::get_physical();
            let logical_cores = num_cpus::get();
            let available_memory_gb = Self::get_available_memory();

            Self {
                cpu_cores,
                logical_cores,
                available_memory_gb,
                optimal_parallel_downloads: (logical_cores * 4).clamp(8, 32),
                optimal_parallel_resolutions: (logical_cores * 6).clamp(12, 48),
                optimal_link_threads: logical_cores.clamp(2, 16),
            }
        })
    }

    fn get_available_memory() -> f64 {
        if let Ok(meminfo) = std::fs::read_to_string("/proc/meminfo") {
            for line in meminfo.lines() {
                if let Some(rest) = line.strip_prefix("MemAvailable:") {
                    if let Some(Ok(kb)) = rest.split_whitespace().next().map(str::parse::<u64>) {
                        #[allow(clippy::cast_precision_loss)]
                        let gb = (kb as f64) / (1024.0 * 1024.0);
                        return (gb * 0.5).clamp(2.0, 32.0);
                    }
                }
            }
        }
        4.0
    }

    #[must_use]
    pub fn get_parallel_resolution_limit(&self) -> usize {
        let limit = if self.available_memory_gb > 16.0 {
            self.optimal_parallel_resolutions
        } else if self.available_memory_gb > 8.0 {
            self.optimal_parallel_resolutions / 2
        } else {
            self.optimal_parallel_resolutions / 4
        };
        limit.max(4)
    }

    #[must_use]
    pub fn limits(&self) -> ConcurrencyLimits {
        ConcurrencyLimits {
            resolution: self.get_parallel_resolution_limit(),
            fetch: self.optimal_parallel_downloads,
            link: self.optimal_link_threads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_are_never_zero() {
        let limits = ConcurrencyLimits::default();
        assert!(limits.resolution >= 1 && limits.fetch >= 1 && limits.link >= 1);

        let zeroed = ConcurrencyLimits {
            resolution: 0,
            fetch: 0,
            link: 0,
        }
        .normalized();
        assert_eq!(zeroed.resolution, 1);
        assert_eq!(zeroed.link, 1);
    }
}
