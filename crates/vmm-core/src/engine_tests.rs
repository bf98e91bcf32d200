use super::*;
use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::callback::LoggingCallback;
use crate::child_table::ChildTable;
use crate::dfs::LocalDfs;
use crate::info_store::InfoStore;
use crate::types::Instance;

/// A tiny stand-in "QEMU" for engine-level tests: allocates its own pty the
/// way `-monitor pty` does, reports the slave device on stderr with the
/// exact marker line `getPtyInfo` scans for, then speaks just enough of the
/// text-monitor protocol (command echo, `(qemu) ` prompt, scripted `migrate`
/// responses, `quit` to exit) to drive the engine's dialogue logic.
fn write_fake_qemu(dir: &std::path::Path, migrate_failures: usize) -> PathBuf {
    let script = format!(
        r#"#!/usr/bin/env python3
import os, sys, select

master, slave = os.openpty()
sys.stderr.write("char device redirected to " + os.ttyname(slave) + "\n")
sys.stderr.flush()
os.close(slave)

migrate_failures = {migrate_failures}
buf = b""
while True:
    r, _, _ = select.select([master], [], [], 5)
    if not r:
        break
    try:
        chunk = os.read(master, 1)
    except OSError:
        break
    if not chunk:
        break
    buf += chunk
    if not buf.endswith(b"\n"):
        continue
    cmd = buf.decode(errors="replace").strip()
    buf = b""
    os.write(master, (cmd + "\r\n").encode())
    if cmd == "quit":
        break
    elif cmd.startswith("migrate "):
        if migrate_failures > 0:
            migrate_failures -= 1
            os.write(master, b"migration failed\r\n(qemu) ")
        else:
            os.write(master, b"migration completed\r\n(qemu) ")
    else:
        os.write(master, b"(qemu) ")
os._exit(0)
"#,
        migrate_failures = migrate_failures
    );
    let path = dir.join("fake-qemu.py");
    fs::write(&path, script).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
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

fn make_engine(qemu_bin: PathBuf) -> (Engine, tempfile::TempDir, tempfile::TempDir) {
    let info_dir = tempfile::tempdir().unwrap();
    let dfs_root = tempfile::tempdir().unwrap();
    let config = QemuConfig {
        qemu_bin,
        info_dir: info_dir.path().to_path_buf(),
        poll_delay: 0.05,
        monitor_timeout: 5.0,
        migrate_timeout: 5.0,
        migration_retries: 3,
        max_parallel_migrations: 2,
    };
    let info_store = Arc::new(InfoStore::new(config.info_dir.clone()).unwrap());
    let dfs = Arc::new(LocalDfs::new(dfs_root.path().to_path_buf()));
    let engine = Engine::new(
        config,
        Arc::new(ChildTable::new()),
        info_store,
        dfs,
        Arc::new(LoggingCallback),
    );
    (engine, info_dir, dfs_root)
}

fn process_is_alive(pid: i32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
}

#[test]
fn instantiate_vm_spawns_process_reads_pty_and_persists_info() {
    let script_dir = tempfile::tempdir().unwrap();
    let qemu_bin = write_fake_qemu(script_dir.path(), 0);
    let (engine, _info_dir, _dfs_root) = make_engine(qemu_bin);

    let vm_id = engine.instantiate_vm(test_instance()).unwrap();
    assert!(vm_id > 0);
    assert_eq!(engine.children().len(), 1);

    let record = engine.children().get(vm_id).unwrap();
    assert!(record.pty_file.is_some());
    assert!(record.os_child);

    let persisted = engine.info_store().scan().unwrap();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].0, vm_id);

    engine.destroy_vm(vm_id).unwrap();
}

#[test]
fn pause_then_unpause_round_trips_without_error() {
    let script_dir = tempfile::tempdir().unwrap();
    let qemu_bin = write_fake_qemu(script_dir.path(), 0);
    let (engine, _info_dir, _dfs_root) = make_engine(qemu_bin);

    let vm_id = engine.instantiate_vm(test_instance()).unwrap();
    engine.pause_vm(vm_id).unwrap();
    engine.unpause_vm(vm_id).unwrap();

    engine.destroy_vm(vm_id).unwrap();
}

#[test]
fn destroy_vm_kills_the_process_and_clears_migrating_out() {
    let script_dir = tempfile::tempdir().unwrap();
    let qemu_bin = write_fake_qemu(script_dir.path(), 0);
    let (engine, _info_dir, _dfs_root) = make_engine(qemu_bin);

    let vm_id = engine.instantiate_vm(test_instance()).unwrap();
    engine
        .children()
        .mutate(vm_id, |r| r.migrating_out = true)
        .unwrap();

    engine.destroy_vm(vm_id).unwrap();
    assert!(!engine.children().get(vm_id).unwrap().migrating_out);

    let deadline = Instant::now() + Duration::from_secs(5);
    while process_is_alive(vm_id) {
        if Instant::now() > deadline {
            panic!("destroyed VM process did not exit in time");
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn stop_vm_retries_migration_until_it_succeeds() {
    let script_dir = tempfile::tempdir().unwrap();
    let qemu_bin = write_fake_qemu(script_dir.path(), 2);
    let (engine, _info_dir, _dfs_root) = make_engine(qemu_bin);

    let vm_id = engine.instantiate_vm(test_instance()).unwrap();
    let result = engine.stop_vm(vm_id, Some("tcp:127.0.0.1:19999"), false);
    assert!(result.is_ok());
    assert!(!engine.children().get(vm_id).unwrap().error_bit);
}

#[test]
fn stop_vm_raises_migration_failed_after_exhausting_retries() {
    let script_dir = tempfile::tempdir().unwrap();
    // Always responds "migration failed" — more times than the retry budget.
    let qemu_bin = write_fake_qemu(script_dir.path(), 100);
    let (engine, _info_dir, _dfs_root) = make_engine(qemu_bin);

    let vm_id = engine.instantiate_vm(test_instance()).unwrap();
    let result = engine.stop_vm(vm_id, Some("tcp:127.0.0.1:19999"), false);
    assert!(matches!(
        result,
        Err(HypervisorError::MigrationFailed { .. })
    ));
    assert!(engine.children().get(vm_id).unwrap().error_bit);

    engine.destroy_vm(vm_id).unwrap();
}

#[test]
fn vmm_specific_call_rejects_unknown_operator_strings() {
    let script_dir = tempfile::tempdir().unwrap();
    let qemu_bin = write_fake_qemu(script_dir.path(), 0);
    let (engine, _info_dir, _dfs_root) = make_engine(qemu_bin);

    let err = engine.vmm_specific_call(999, "reboot-harder").unwrap_err();
    assert!(matches!(err, HypervisorError::UnknownOperatorCall(_)));
}
