//! Version information for the worker.

/// Worker version from Cargo.toml
pub const WORKER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Identity of the running worker process, reported by `dumpWorker`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct VersionInfo {
    pub version: &'static str,
    pub pid: u32,
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self {
            version: WORKER_VERSION,
            pid: std::process::id(),
        }
    }
}

impl VersionInfo {
    pub fn new() -> Self {
        Self::default()
    }
}
