//! `[qemu]` configuration section. Defaults are provided for every key so a
//! fresh node can boot and persist a config file the operator fills in
//! incrementally (default-and-persist-on-first-run).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HypervisorError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QemuConfig {
    /// Absolute path to the QEMU binary; used both to exec and to identify
    /// live processes.
    pub qemu_bin: PathBuf,
    /// Spool directory for persisted VM records.
    pub info_dir: PathBuf,
    /// Seconds between reaper iterations.
    pub poll_delay: f64,
    /// Default seconds for monitor reads.
    pub monitor_timeout: f64,
    /// Seconds for a single `migrate` attempt.
    pub migrate_timeout: f64,
    /// Integer attempt cap per migration.
    pub migration_retries: u32,
    /// Semaphore capacity for outbound migrations.
    pub max_parallel_migrations: usize,
}

impl Default for QemuConfig {
    fn default() -> Self {
        Self {
            qemu_bin: PathBuf::from("/usr/bin/qemu-system-x86_64"),
            info_dir: PathBuf::from("/var/lib/vmm/info"),
            poll_delay: 2.0,
            monitor_timeout: 10.0,
            migrate_timeout: 30.0,
            migration_retries: 3,
            max_parallel_migrations: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    qemu: QemuConfigOptional,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct QemuConfigOptional {
    qemu_bin: Option<PathBuf>,
    info_dir: Option<PathBuf>,
    poll_delay: Option<f64>,
    monitor_timeout: Option<f64>,
    migrate_timeout: Option<f64>,
    migration_retries: Option<u32>,
    max_parallel_migrations: Option<usize>,
}

impl QemuConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }

        let contents = fs::read_to_string(path)?;
        let file: ConfigFile = toml::from_str(&contents)
            .map_err(|e| HypervisorError::StartupFailed(format!("invalid config: {e}")))?;
        let defaults = Self::default();
        let opts = file.qemu;

        Ok(Self {
            qemu_bin: opts.qemu_bin.unwrap_or(defaults.qemu_bin),
            info_dir: opts.info_dir.unwrap_or(defaults.info_dir),
            poll_delay: opts.poll_delay.unwrap_or(defaults.poll_delay),
            monitor_timeout: opts.monitor_timeout.unwrap_or(defaults.monitor_timeout),
            migrate_timeout: opts.migrate_timeout.unwrap_or(defaults.migrate_timeout),
            migration_retries: opts.migration_retries.unwrap_or(defaults.migration_retries),
            max_parallel_migrations: opts
                .max_parallel_migrations
                .unwrap_or(defaults.max_parallel_migrations),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = ConfigFile {
            qemu: QemuConfigOptional {
                qemu_bin: Some(self.qemu_bin.clone()),
                info_dir: Some(self.info_dir.clone()),
                poll_delay: Some(self.poll_delay),
                monitor_timeout: Some(self.monitor_timeout),
                migrate_timeout: Some(self.migrate_timeout),
                migration_retries: Some(self.migration_retries),
                max_parallel_migrations: Some(self.max_parallel_migrations),
            },
        };
        let contents = toml::to_string_pretty(&file)
            .map_err(|e| HypervisorError::StartupFailed(format!("failed to serialize config: {e}")))?;
        fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
