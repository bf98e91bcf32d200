//! Reaper / Reconciler: periodic comparison of the in-memory child table
//! against the OS process table. This is the **only** path that
//! removes a `VmRecord` — lifecycle operations never race it to deletion,
//! they only ever observe it via `ChildTable::get_or_uncontrolled`.

use std::collections::HashSet;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use nix::sys::wait::{waitpid, WaitPidFlag};
use nix::unistd::Pid;
use sysinfo::{ProcessesToUpdate, System};
use tracing::{error, info, warn};

use crate::engine::Engine;
use crate::types::{VmRecord, VmState};

pub struct Reaper {
    engine: Arc<Engine>,
    stop: Arc<AtomicBool>,
}

impl Reaper {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawn the dedicated reaper thread, looping at `pollDelay`.
    pub fn spawn(&self) -> JoinHandle<()> {
        let engine = self.engine.clone();
        let stop = self.stop.clone();
        thread::spawn(move || {
            let poll_delay = Duration::from_secs_f64(engine.config().poll_delay.max(0.01));
            while !stop.load(Ordering::Relaxed) {
                reap_once(&engine);
                thread::sleep(poll_delay);
            }
        })
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// One reconciliation pass. Never propagates an error upward: per-record
/// failures are logged and skipped, the pass as a whole always completes.
fn reap_once(engine: &Arc<Engine>) {
    let controlled = engine.children().snapshot_ids();

    // Opportunistic non-blocking reap of OSchild zombies so we don't
    // accumulate zombie processes between sysinfo scans. This never decides
    // presence/absence by itself; the sysinfo scan below remains the
    // authoritative source, including for recovered (OSchild=false) records.
    for vm_id in &controlled {
        if let Some(record) = engine.children().get(*vm_id) {
            if record.os_child {
                let _ = waitpid(Pid::from_raw(*vm_id), Some(WaitPidFlag::WNOHANG));
            }
        }
    }

    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, false);
    let qemu_bin = engine.config().qemu_bin.to_string_lossy().into_owned();

    let live: HashSet<i32> = system
        .processes()
        .values()
        .filter(|process| {
            process
                .exe()
                .map(|exe| exe.to_string_lossy() == qemu_bin)
                .unwrap_or(false)
        })
        .map(|process| process.pid().as_u32() as i32)
        .collect();

    for vm_id in controlled {
        if !live.contains(&vm_id) {
            reap_one(engine, vm_id);
        }
    }
}

fn reap_one(engine: &Arc<Engine>, vm_id: i32) {
    engine.info_store().remove(vm_id).ok();
    let record = match engine.children().remove(vm_id) {
        Some(record) => record,
        // A concurrent pass (or a lifecycle call observing the same death)
        // already removed it; nothing left to do.
        None => return,
    };
    engine.take_monitor(vm_id);

    if let Some(vnc) = record.vnc_port {
        engine.vnc_ports().release(vnc);
    }

    if record.os_child {
        match waitpid(Pid::from_raw(vm_id), Some(WaitPidFlag::WNOHANG)) {
            Ok(_) => {}
            Err(nix::Error::ECHILD) => {}
            Err(e) => warn!(vm_id, error = %e, "waitpid failed during reap"),
        }
    }

    if record.error_bit {
        dump_diagnostics(engine, vm_id, &record);
    }

    if record.migrating_out {
        info!(vm_id, "reaped VM mid-migration, suppressing Exited upcall");
    } else {
        engine
            .callback()
            .vm_state_change(vm_id, None, VmState::Exited);
        info!(vm_id, "reaped VM");
    }
}

/// On reap of an `errorBit` VM, dump stderr and monitor history to
/// `/tmp/{pid}.err` / `/tmp/{pid}.pty` for post-mortem.
fn dump_diagnostics(engine: &Arc<Engine>, vm_id: i32, record: &VmRecord) {
    if let Some(mut stderr) = engine.take_stderr(vm_id) {
        use std::io::Read;
        let mut buf = Vec::new();
        if stderr.read_to_end(&mut buf).is_ok() {
            if let Err(e) = fs::write(format!("/tmp/{vm_id}.err"), &buf) {
                warn!(vm_id, error = %e, "failed to dump stderr diagnostic");
            }
        }
    }
    let history: Vec<u8> = record.monitor_history.iter().copied().collect();
    if let Err(e) = fs::write(format!("/tmp/{vm_id}.pty"), &history) {
        error!(vm_id, error = %e, "failed to dump monitor history diagnostic");
    }
}

#[cfg(test)]
#[path = "reaper_tests.rs"]
mod reaper_tests;
