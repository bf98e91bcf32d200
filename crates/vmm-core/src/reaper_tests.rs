use super::*;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::callback::NodeManagerCallback;
use crate::child_table::ChildTable;
use crate::config::QemuConfig;
use crate::dfs::LocalDfs;
use crate::info_store::InfoStore;
use crate::types::{Instance, VmRecord};

/// Records every `vm_state_change` call instead of logging it, so tests can
/// assert on exactly what the Reaper reported (and, just as importantly,
/// what it suppressed).
#[derive(Default, Clone)]
struct RecordingCallback {
    calls: Arc<Mutex<Vec<(i32, Option<VmState>, VmState)>>>,
}

impl NodeManagerCallback for RecordingCallback {
    fn vm_state_change(&self, vm_id: i32, from: Option<VmState>, to: VmState) {
        self.calls.lock().unwrap().push((vm_id, from, to));
    }
}

fn test_instance() -> Instance {
    Instance {
        memory_mb: 256,
        cores: 1,
        disks: vec![],
        nics: vec![],
        hints: HashMap::new(),
    }
}

/// `/bin/sleep` stands in for QEMU here: unlike a shebang script, its
/// `/proc/pid/exe` resolves to a real ELF binary, which is what `reap_once`
/// actually compares against `qemuBin`. A shebang-script stand-in would
/// resolve to its interpreter instead and silently defeat that match.
fn make_engine() -> (Arc<Engine>, RecordingCallback, tempfile::TempDir, tempfile::TempDir) {
    let info_dir = tempfile::tempdir().unwrap();
    let dfs_root = tempfile::tempdir().unwrap();
    let config = QemuConfig {
        qemu_bin: PathBuf::from("/bin/sleep"),
        info_dir: info_dir.path().to_path_buf(),
        poll_delay: 0.05,
        monitor_timeout: 5.0,
        migrate_timeout: 5.0,
        migration_retries: 3,
        max_parallel_migrations: 2,
    };
    let info_store = Arc::new(InfoStore::new(config.info_dir.clone()).unwrap());
    let dfs = Arc::new(LocalDfs::new(dfs_root.path().to_path_buf()));
    let callback = RecordingCallback::default();
    let engine = Arc::new(Engine::new(
        config,
        Arc::new(ChildTable::new()),
        info_store,
        dfs,
        Arc::new(callback.clone()),
    ));
    (engine, callback, info_dir, dfs_root)
}

fn spawn_and_kill_sleep() -> i32 {
    let mut child = Command::new("/bin/sleep").arg("300").spawn().unwrap();
    let pid = child.id() as i32;
    child.kill().unwrap();
    child.wait().unwrap();
    pid
}

#[test]
fn reaps_a_disappeared_controlled_child_and_fires_exited() {
    let (engine, callback, _info_dir, _dfs_root) = make_engine();
    let pid = spawn_and_kill_sleep();

    let mut record = VmRecord::new(test_instance(), pid, true);
    record.vnc_port = Some(7);
    engine.children().insert(record.clone());
    engine.vnc_ports().mark_leased(7);
    engine.info_store().save(pid, &record.to_persisted()).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        super::reap_once(&engine);
        if engine.children().get(pid).is_none() {
            break;
        }
        assert!(Instant::now() < deadline, "reaper never observed the dead pid");
        std::thread::sleep(Duration::from_millis(20));
    }

    assert!(!engine.vnc_ports().is_leased(7));
    assert!(engine.info_store().scan().unwrap().is_empty());

    let calls = callback.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], (pid, None, VmState::Exited));
}

#[test]
fn suppresses_exited_upcall_for_a_vm_reaped_mid_migration() {
    let (engine, callback, _info_dir, _dfs_root) = make_engine();
    let pid = spawn_and_kill_sleep();

    let mut record = VmRecord::new(test_instance(), pid, true);
    record.migrating_out = true;
    engine.children().insert(record.clone());
    engine.info_store().save(pid, &record.to_persisted()).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        super::reap_once(&engine);
        if engine.children().get(pid).is_none() {
            break;
        }
        assert!(Instant::now() < deadline, "reaper never observed the dead pid");
        std::thread::sleep(Duration::from_millis(20));
    }

    assert!(callback.calls.lock().unwrap().is_empty());
}
