use std::path::{Path, PathBuf};
use std::time::Duration;

use hsmp_raw::current_arch::mailbox::DEFAULT_TIMEOUT_POLLS;

use crate::error::{HsmpError, Result};

const DEFAULT_PCI_ROOT: &str = "/proc/bus/pci";
const DEFAULT_CPUINFO: &str = "/proc/cpuinfo";
const DEFAULT_LOCK_FILE: &str = "/var/lock/hsmp";

#[derive(Debug, Clone)]
pub struct HsmpConfig {
    /// Directory holding per-device config-space files
    pub pci_root: PathBuf,
    pub cpuinfo_path: PathBuf,
    /// Advisory lock serializing mailbox transactions across processes
    pub lock_path: PathBuf,
    /// Status polls before the SMU is considered hung
    pub mailbox_polls: u32,
    pub poll_interval: Duration,
}

impl Default for HsmpConfig {
    fn default() -> Self {
        Self {
            pci_root: PathBuf::from(DEFAULT_PCI_ROOT),
            cpuinfo_path: PathBuf::from(DEFAULT_CPUINFO),
            lock_path: PathBuf::from(DEFAULT_LOCK_FILE),
            mailbox_polls: DEFAULT_TIMEOUT_POLLS,
            poll_interval: Duration::from_millis(1),
        }
    }
}

impl HsmpConfig {
    /// Build a configuration from the environment
    ///
    /// `HSMP_ROOT_PREFIX` relocates the OS paths (e.g. `/host` when running
    /// in a container with the host's `/proc` bind-mounted),
    /// `HSMP_LOCK_FILE` moves the lock file and `HSMP_MAILBOX_POLLS`
    /// changes the timeout budget.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(prefix) = std::env::var("HSMP_ROOT_PREFIX") {
            config.pci_root = with_prefix(&prefix, DEFAULT_PCI_ROOT);
            config.cpuinfo_path = with_prefix(&prefix, DEFAULT_CPUINFO);
            tracing::info!("Using OS paths under {}", prefix);
        }

        if let Ok(path) = std::env::var("HSMP_LOCK_FILE") {
            config.lock_path = PathBuf::from(path);
        }

        if let Ok(polls) = std::env::var("HSMP_MAILBOX_POLLS") {
            config.mailbox_polls = Self::parse_polls(&polls)?;
        }

        Ok(config)
    }

    fn parse_polls(s: &str) -> Result<u32> {
        match s.trim().parse::<u32>() {
            Ok(0) | Err(_) => Err(HsmpError::ConfigError(format!(
                "HSMP_MAILBOX_POLLS must be a positive integer, got {s:?}"
            ))),
            Ok(polls) => Ok(polls),
        }
    }

    /// Worst-case time a single transaction spends polling
    pub fn mailbox_timeout(&self) -> Duration {
        self.poll_interval * self.mailbox_polls
    }
}

fn with_prefix(prefix: &str, path: &str) -> PathBuf {
    Path::new(prefix).join(path.trim_start_matches('/'))
}
