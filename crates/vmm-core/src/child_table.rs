//! Child Table: `vmId -> VmRecord`. Insertion happens from
//! lifecycle operations and spool-dir recovery; removal happens only from the
//! Reaper, so lifecycle code never races it to delete a record out from
//! under a caller still holding a reference to it.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{HypervisorError, Result};
use crate::types::VmRecord;

#[derive(Default)]
pub struct ChildTable {
    inner: RwLock<HashMap<i32, VmRecord>>,
}

impl ChildTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: VmRecord) {
        self.inner.write().unwrap().insert(record.pid, record);
    }

    pub fn get(&self, vm_id: i32) -> Option<VmRecord> {
        self.inner.read().unwrap().get(&vm_id).cloned()
    }

    /// The table's take on the source's `getChildFromPid`: the only way the
    /// rest of the engine ever fails to find a vmId.
    pub fn get_or_uncontrolled(&self, vm_id: i32) -> Result<VmRecord> {
        self.get(vm_id).ok_or(HypervisorError::UncontrolledVm(vm_id))
    }

    pub fn remove(&self, vm_id: i32) -> Option<VmRecord> {
        self.inner.write().unwrap().remove(&vm_id)
    }

    pub fn snapshot_ids(&self) -> Vec<i32> {
        self.inner.read().unwrap().keys().copied().collect()
    }

    pub fn snapshot(&self) -> Vec<VmRecord> {
        self.inner.read().unwrap().values().cloned().collect()
    }

    /// Applies `f` to the record under a write lock and writes the result
    /// back; used by lifecycle calls that flip a flag (`errorBit`,
    /// `migratingOut`) on an otherwise-live record.
    pub fn mutate<T>(&self, vm_id: i32, f: impl FnOnce(&mut VmRecord) -> T) -> Result<T> {
        let mut table = self.inner.write().unwrap();
        let record = table
            .get_mut(&vm_id)
            .ok_or(HypervisorError::UncontrolledVm(vm_id))?;
        Ok(f(record))
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "child_table_tests.rs"]
mod child_table_tests;
