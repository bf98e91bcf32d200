//! Info Store: durable per-VM record in a spool directory, one file per
//! vmId, written via temp-file + rename so a crash mid-write never leaves a
//! half-written record behind.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::Result;
use crate::types::PersistedVmRecord;

pub struct InfoStore {
    dir: PathBuf,
}

impl InfoStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, vm_id: i32) -> PathBuf {
        self.dir.join(vm_id.to_string())
    }

    /// Persist `record` under `{infoDir}/{vmId}` atomically.
    pub fn save(&self, vm_id: i32, record: &PersistedVmRecord) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(record)?;
        let tmp = tempfile::Builder::new()
            .prefix(&format!(".{vm_id}-"))
            .tempfile_in(&self.dir)?;
        fs::write(tmp.path(), &bytes)?;
        tmp.persist(self.path_for(vm_id))
            .map_err(|e| e.error)?;
        Ok(())
    }

    /// Unlink a vmId's record. Missing files are not an error: the reaper
    /// and a lifecycle destroy can both race to remove the same record.
    pub fn remove(&self, vm_id: i32) -> Result<()> {
        match fs::remove_file(self.path_for(vm_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Walk the spool directory once, parsing every filename as a vmId.
    /// Entries that don't parse as an integer, or whose contents don't
    /// deserialize, are logged and skipped rather than aborting startup.
    pub fn scan(&self) -> Result<Vec<(i32, PersistedVmRecord)>> {
        let mut records = Vec::new();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(records),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            if name.starts_with('.') {
                continue;
            }
            let vm_id: i32 = match name.parse() {
                Ok(id) => id,
                Err(_) => {
                    warn!(file = %name, "info store: skipping non-vmId entry");
                    continue;
                }
            };
            match self.load(&entry.path(), vm_id) {
                Ok(record) => records.push((vm_id, record)),
                Err(e) => warn!(vm_id, error = %e, "info store: skipping unloadable record"),
            }
        }
        Ok(records)
    }

    fn load(&self, path: &Path, vm_id: i32) -> Result<PersistedVmRecord> {
        let bytes = fs::read(path)?;
        let record: PersistedVmRecord =
            serde_json::from_slice(&bytes).map_err(|e| crate::error::HypervisorError::InfoLoadFailed {
                vm_id,
                reason: e.to_string(),
            })?;
        if record.pid != vm_id {
            return Err(crate::error::HypervisorError::InfoLoadFailed {
                vm_id,
                reason: "pid mismatch".to_string(),
            });
        }
        Ok(record)
    }
}

#[cfg(test)]
#[path = "info_store_tests.rs"]
mod info_store_tests;
