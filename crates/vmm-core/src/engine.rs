//! VM Lifecycle Engine: instantiate, suspend, resume,
//! prep-receive, migrate, receive, pause, unpause, destroy, and the operator
//! escape hatch `vmmSpecificCall`. Everything here runs on the calling
//! thread; the only asynchrony is the Reaper observing process exit on its
//! own loop.

use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::net::TcpStream;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::{info, warn};

use crate::callback::NodeManagerCallback;
use crate::child_table::ChildTable;
use crate::config::QemuConfig;
use crate::dfs::{Dfs, OpenMode};
use crate::error::{HypervisorError, Result};
use crate::info_store::InfoStore;
use crate::monitor::MonitorDialogue;
use crate::port::{DebugConsolePool, MigrationPortPool, VncPortPool};
use crate::qemu;
use crate::semaphore::Semaphore;
use crate::types::{Instance, TransportCookie, VmRecord};

const PORT_PROBE_ATTEMPTS: usize = 30;
const PORT_PROBE_INTERVAL: Duration = Duration::from_millis(200);

pub struct Engine {
    config: QemuConfig,
    children: Arc<ChildTable>,
    info_store: Arc<InfoStore>,
    migration_ports: Arc<MigrationPortPool>,
    vnc_ports: Arc<VncPortPool>,
    debug_console_ports: Arc<DebugConsolePool>,
    migration_semaphore: Arc<Semaphore>,
    monitors: Mutex<HashMap<i32, Arc<MonitorDialogue>>>,
    /// VMs started by `prepReceiveVm` whose PTY has not been read yet —
    /// that's deferred to `receiveVm`, so the still-open `Child` (and its
    /// piped stderr) has to survive the gap between the two calls.
    pending_receives: Mutex<HashMap<i32, Child>>,
    /// Retained read end of each VM's stderr pipe, past the point where
    /// `getPtyInfo` stopped reading it — the Reaper drains whatever's left
    /// into a diagnostic dump on an `errorBit` reap.
    stderr_handles: Mutex<HashMap<i32, std::process::ChildStderr>>,
    dfs: Arc<dyn Dfs>,
    callback: Arc<dyn NodeManagerCallback>,
    hostname: String,
}

impl Engine {
    pub fn new(
        config: QemuConfig,
        children: Arc<ChildTable>,
        info_store: Arc<InfoStore>,
        dfs: Arc<dyn Dfs>,
        callback: Arc<dyn NodeManagerCallback>,
    ) -> Self {
        let max_parallel = config.max_parallel_migrations;
        Self {
            config,
            children,
            info_store,
            migration_ports: Arc::new(MigrationPortPool::new()),
            vnc_ports: Arc::new(VncPortPool::new()),
            debug_console_ports: Arc::new(DebugConsolePool::new()),
            migration_semaphore: Arc::new(Semaphore::new(max_parallel)),
            monitors: Mutex::new(HashMap::new()),
            pending_receives: Mutex::new(HashMap::new()),
            stderr_handles: Mutex::new(HashMap::new()),
            dfs,
            callback,
            hostname: hostname(),
        }
    }

    pub fn children(&self) -> &Arc<ChildTable> {
        &self.children
    }

    pub fn debug_console_ports(&self) -> &Arc<DebugConsolePool> {
        &self.debug_console_ports
    }

    pub fn vnc_ports(&self) -> &Arc<VncPortPool> {
        &self.vnc_ports
    }

    pub fn info_store(&self) -> &Arc<InfoStore> {
        &self.info_store
    }

    pub fn config(&self) -> &QemuConfig {
        &self.config
    }

    pub fn callback(&self) -> &Arc<dyn NodeManagerCallback> {
        &self.callback
    }

    /// Removes and returns a VM's monitor handle, used by the Reaper once a
    /// pid has been confirmed dead so the PTY fd isn't held open forever.
    pub fn take_monitor(&self, vm_id: i32) -> Option<Arc<MonitorDialogue>> {
        self.monitors.lock().unwrap().remove(&vm_id)
    }

    /// Removes and returns a VM's retained stderr handle, used by the Reaper
    /// to dump diagnostics on an `errorBit` reap.
    pub fn take_stderr(&self, vm_id: i32) -> Option<std::process::ChildStderr> {
        self.stderr_handles.lock().unwrap().remove(&vm_id)
    }

    fn monitor_for(&self, vm_id: i32) -> Result<Arc<MonitorDialogue>> {
        self.monitors
            .lock()
            .unwrap()
            .get(&vm_id)
            .cloned()
            .ok_or(HypervisorError::UncontrolledVm(vm_id))
    }

    /// Recovery path run once at startup: reload every persisted record,
    /// reopen its PTY, and seed the child table with `os_child=false` since
    /// this process did not fork them.
    pub fn recover(&self) -> Result<()> {
        for (vm_id, persisted) in self.info_store.scan()? {
            let mut record = VmRecord::from_persisted(persisted, false);
            if let Some(vnc) = record.vnc_port {
                self.vnc_ports.mark_leased(vnc);
            }
            if let Some(pty) = record.pty_file.clone() {
                match MonitorDialogue::open(&pty) {
                    Ok(dialogue) => {
                        self.monitors.lock().unwrap().insert(vm_id, Arc::new(dialogue));
                    }
                    Err(e) => {
                        warn!(vm_id, error = %e, "recover: failed to reopen monitor pty");
                        record.error_bit = true;
                    }
                }
            }
            info!(vm_id, "recover: restored persisted VM record");
            self.children.insert(record);
        }
        Ok(())
    }

    // -- startVm / getPtyInfo -------------------------------------------

    fn start_vm(&self, instance: &Instance, source: Option<&str>) -> Result<(i32, Child)> {
        let args = qemu::build_args(instance, self.dfs.as_ref(), source)?;
        info!(qemu_bin = %self.config.qemu_bin.display(), ?args, "starting qemu");

        let mut cmd = Command::new(&self.config.qemu_bin);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        unsafe {
            cmd.pre_exec(|| {
                nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0))
                    .map_err(|e| std::io::Error::from_raw_os_error(e as i32))?;
                for fd in 3..libc::sysconf(libc::_SC_OPEN_MAX) {
                    libc::close(fd as i32);
                }
                Ok(())
            });
        }

        let child = cmd.spawn()?;
        let pid = child.id() as i32;
        Ok((pid, child))
    }

    fn get_pty_info(
        &self,
        vm_id: i32,
        mut child: Child,
        issue_continue: bool,
    ) -> Result<PathBuf> {
        let stderr = child
            .stderr
            .take()
            .expect("stderr was piped at spawn time");
        let mut reader = BufReader::new(stderr);

        const MARKER: &str = "char device redirected to ";
        let pty_path = loop {
            let mut line = String::new();
            let n = reader.read_line(&mut line)?;
            if n == 0 {
                let _ = child.wait();
                return Err(HypervisorError::StartupFailed(
                    "ptyFile not found before QEMU stderr closed".to_string(),
                ));
            }
            if let Some(idx) = line.find(MARKER) {
                break PathBuf::from(line[idx + MARKER.len()..].trim());
            }
        };

        let dialogue = MonitorDialogue::open(&pty_path)?;
        let dialogue = Arc::new(dialogue);
        self.monitors.lock().unwrap().insert(vm_id, dialogue.clone());
        self.stderr_handles
            .lock()
            .unwrap()
            .insert(vm_id, reader.into_inner());

        // The Reaper reaps this pid by vm_id, not via the `Child` handle;
        // dropping `child` here just releases the Rust-side wrapper, it does
        // not touch the process.
        drop(child);

        self.children.mutate(vm_id, |r| r.pty_file = Some(pty_path.clone()))?;
        self.persist(vm_id)?;

        if issue_continue {
            let mut record = self.children.get_or_uncontrolled(vm_id)?;
            dialogue.enter_command(&mut record, "c", true, Duration::from_secs_f64(self.config.monitor_timeout))?;
            self.children.mutate(vm_id, |r| *r = record)?;
        }

        Ok(pty_path)
    }

    fn persist(&self, vm_id: i32) -> Result<()> {
        let record = self.children.get_or_uncontrolled(vm_id)?;
        self.info_store.save(vm_id, &record.to_persisted())
    }

    // -- Operations -------------------------------------------------------

    pub fn instantiate_vm(&self, instance: Instance) -> Result<i32> {
        let (pid, child) = self.start_vm(&instance, None)?;
        self.children.insert(VmRecord::new(instance, pid, true));
        self.get_pty_info(pid, child, false)?;
        info!(vm_id = pid, "instantiated VM");
        Ok(pid)
    }

    pub fn suspend_vm(&self, vm_id: i32, target: &str, suspend_cookie: Vec<u8>) -> Result<i32> {
        let record = self.children.get_or_uncontrolled(vm_id)?;
        let mut info_writer = self.dfs.open(&format!("{target}.info"), OpenMode::Write)?;
        let payload = serde_json::to_vec(&(record.instance.clone(), suspend_cookie))?;
        std::io::Write::write_all(&mut info_writer, &payload)?;
        drop(info_writer);

        let local_blob = tempfile::Builder::new()
            .prefix(&format!("suspend-{vm_id}-"))
            .suffix(".dat")
            .tempfile()?;
        let local_blob_path = local_blob.path().to_path_buf();
        let qemu_target = format!("exec:gzip -c > {}", local_blob_path.display());
        let vm_id = self.stop_vm(vm_id, Some(&qemu_target), true)?;

        self.dfs.copy_to(&local_blob_path, &format!("{target}.dat"))?;
        Ok(vm_id)
    }

    pub fn resume_vm(&self, source: &str) -> Result<(i32, Vec<u8>)> {
        let local_blob = tempfile::Builder::new()
            .prefix(&format!("resume-{source}-"))
            .suffix(".dat")
            .tempfile()?;
        let local_blob_path = local_blob.path().to_path_buf();
        self.dfs.copy_from(&format!("{source}.dat"), &local_blob_path)?;

        let mut info_reader = self.dfs.open(&format!("{source}.info"), OpenMode::Read)?;
        let mut bytes = Vec::new();
        std::io::Read::read_to_end(&mut info_reader, &mut bytes)?;
        let (instance, suspend_cookie): (Instance, Vec<u8>) = serde_json::from_slice(&bytes)?;

        let fifo_dir = tempfile::Builder::new().prefix(&format!("resume-fifo-{source}-")).tempdir()?;
        let fifo_path = fifo_dir.path().join("stream");
        nix::unistd::mkfifo(&fifo_path, nix::sys::stat::Mode::from_bits_truncate(0o600))?;

        let mut zcat = Command::new("/bin/bash")
            .arg("-c")
            .arg(format!(
                "zcat {} > {}",
                local_blob_path.display(),
                fifo_path.display()
            ))
            .spawn()?;

        let source_uri = format!("file://{}", fifo_path.display());
        let (pid, child) = self.start_vm(&instance, Some(&source_uri))?;
        zcat.wait()?;

        self.children.insert(VmRecord::new(instance, pid, true));
        self.get_pty_info(pid, child, true)?;
        self.children.mutate(pid, |r| r.suspend_cookie = Some(suspend_cookie.clone()))?;
        self.persist(pid)?;

        info!(vm_id = pid, source, "resumed VM");
        Ok((pid, suspend_cookie))
    }

    pub fn prep_receive_vm(&self, instance: Instance) -> Result<TransportCookie> {
        let port = self.migration_ports.allocate()?;
        let source = format!("tcp:0.0.0.0:{port}");
        let (pid, child) = self.start_vm(&instance, Some(&source))?;

        self.children.insert(VmRecord::new(instance, pid, true));
        let cookie = TransportCookie {
            port,
            vm_id: pid,
            hostname: self.hostname.clone(),
        };
        self.children.mutate(pid, |r| r.transport_cookie = Some(cookie.clone()))?;
        self.persist(pid)?;
        // Per spec, the PTY is read only once `receiveVm` is called, not
        // here — the still-open child (and its piped stderr) has to wait.
        self.pending_receives.lock().unwrap().insert(pid, child);

        self.wait_for_port_listening(port)?;
        Ok(cookie)
    }

    fn wait_for_port_listening(&self, port: u16) -> Result<()> {
        for _ in 0..PORT_PROBE_ATTEMPTS {
            if TcpStream::connect(("127.0.0.1", port)).is_ok() {
                return Ok(());
            }
            std::thread::sleep(PORT_PROBE_INTERVAL);
        }
        Err(HypervisorError::StartupFailed(format!(
            "migration port {port} never started listening"
        )))
    }

    pub fn migrate_vm(&self, vm_id: i32, target_host: &str, cookie: &TransportCookie) -> Result<i32> {
        let _permit = self.migration_semaphore.acquire();
        self.children.mutate(vm_id, |r| r.migrating_out = true)?;
        let qemu_target = format!("tcp:{target_host}:{}", cookie.port);
        let result = self.stop_vm(vm_id, Some(&qemu_target), false);
        if result.is_err() {
            self.children.mutate(vm_id, |r| r.migrating_out = false).ok();
            return result;
        }
        self.wait_for_exit(vm_id);
        result
    }

    pub fn receive_vm(&self, cookie: &TransportCookie) -> Result<i32> {
        let child = self
            .pending_receives
            .lock()
            .unwrap()
            .remove(&cookie.vm_id)
            .ok_or(HypervisorError::UncontrolledVm(cookie.vm_id))?;

        if let Err(e) = self.get_pty_info(cookie.vm_id, child, true) {
            self.children.mutate(cookie.vm_id, |r| r.error_bit = true).ok();
            return Err(e);
        }
        self.migration_ports.release(cookie.port);
        Ok(cookie.vm_id)
    }

    pub fn pause_vm(&self, vm_id: i32) -> Result<()> {
        self.enter_monitor_command(vm_id, "stop", true)?;
        Ok(())
    }

    pub fn unpause_vm(&self, vm_id: i32) -> Result<()> {
        self.enter_monitor_command(vm_id, "c", true)?;
        Ok(())
    }

    /// `destroyVm` clears `migratingOut` *before* killing; whether that is
    /// intended for a destroy issued mid-migration is unresolved and not
    /// silently "fixed" here. See DESIGN.md.
    pub fn destroy_vm(&self, vm_id: i32) -> Result<()> {
        self.children.mutate(vm_id, |r| r.migrating_out = false)?;
        kill(Pid::from_raw(vm_id), Signal::SIGKILL).map_err(HypervisorError::from)?;
        Ok(())
    }

    pub fn vmm_specific_call(&self, vm_id: i32, arg: &str) -> Result<String> {
        let arg_lower = arg.to_lowercase();
        match arg_lower.as_str() {
            "startvnc" => {
                let record = self.children.get_or_uncontrolled(vm_id)?;
                let port = if let Some(existing) = record.vnc_port {
                    existing
                } else {
                    let port = self.vnc_ports.allocate();
                    self.enter_monitor_command(vm_id, &format!("change vnc :{port}"), true)?;
                    self.children.mutate(vm_id, |r| r.vnc_port = Some(port))?;
                    self.persist(vm_id)?;
                    port
                };
                Ok(format!("VNC started on {}:{}", self.hostname, port + 5900))
            }
            "stopvnc" => {
                self.enter_monitor_command(vm_id, "change vnc none", true)?;
                let had_port = self.children.get_or_uncontrolled(vm_id)?.vnc_port;
                if let Some(port) = had_port {
                    self.vnc_ports.release(port);
                    self.children.mutate(vm_id, |r| r.vnc_port = None)?;
                    self.persist(vm_id)?;
                }
                Ok("VNC halted".to_string())
            }
            other if other.starts_with("changecdrom:") => {
                let iso = crate::types::scrub_uri(&arg["changecdrom:".len()..]);
                let local = self.dfs.get_local_handle(&format!("images/{iso}"))?;
                self.enter_monitor_command(vm_id, &format!("change ide1-cd0 {}", local.display()), true)?;
                Ok(format!("Changed ide1-cd0 to {iso}"))
            }
            "startconsole" => {
                let port = self.start_debug_console(vm_id)?;
                Ok(format!("Control console listening on {}:{}", self.hostname, port))
            }
            _ => Err(HypervisorError::UnknownOperatorCall(arg.to_string())),
        }
    }

    /// Binds a fresh debug console port and bridges it to `vm_id`'s monitor,
    /// returning the bound port so callers (the `vmmSpecificCall` operator
    /// path and the daemon's dedicated console endpoint) don't have to
    /// scrape it back out of a human-readable message.
    pub fn start_debug_console(&self, vm_id: i32) -> Result<u16> {
        let dialogue = self.monitor_for(vm_id)?;
        let port = self.debug_console_ports.allocate();
        crate::console::spawn(port, dialogue);
        Ok(port)
    }

    fn enter_monitor_command(&self, vm_id: i32, cmd: &str, expect_prompt: bool) -> Result<String> {
        self.enter_monitor_command_with_timeout(
            vm_id,
            cmd,
            expect_prompt,
            Duration::from_secs_f64(self.config.monitor_timeout),
        )
    }

    fn enter_monitor_command_with_timeout(
        &self,
        vm_id: i32,
        cmd: &str,
        expect_prompt: bool,
        timeout: Duration,
    ) -> Result<String> {
        let dialogue = self.monitor_for(vm_id)?;
        let mut record = self.children.get_or_uncontrolled(vm_id)?;
        let result = dialogue.enter_command(&mut record, cmd, expect_prompt, timeout);
        // Write the (possibly error_bit-flipped) history back regardless of
        // outcome, then propagate.
        self.children.mutate(vm_id, |r| *r = record).ok();
        result
    }

    /// `stopVm`: optional `stop`, optional migrate-with-retries, then an
    /// unconditional `quit` that does not wait for a prompt.
    fn stop_vm(&self, vm_id: i32, target: Option<&str>, stop_first: bool) -> Result<i32> {
        if stop_first {
            self.enter_monitor_command(vm_id, "stop", true)?;
        }

        if let Some(target) = target {
            let mut retry = self.config.migration_retries;
            let mut last_response = String::new();
            let migrate_timeout = Duration::from_secs_f64(self.config.migrate_timeout);
            while retry > 0 {
                last_response = self.enter_monitor_command_with_timeout(
                    vm_id,
                    &format!("migrate {target}"),
                    true,
                    migrate_timeout,
                )?;
                retry -= 1;
                if !last_response.contains("migration failed") {
                    retry = u32::MAX; // sentinel: succeeded, not exhausted
                    break;
                }
                warn!(vm_id, "migration (transiently) failed: {last_response}");
            }
            if retry == 0 {
                self.children.mutate(vm_id, |r| r.error_bit = true).ok();
                return Err(HypervisorError::MigrationFailed {
                    vm_id,
                    retries: self.config.migration_retries,
                    message: last_response,
                });
            }
        }

        self.enter_monitor_command(vm_id, "quit", false)?;
        Ok(vm_id)
    }

    /// Polls the child table at `pollDelay` until the Reaper has observed
    /// this vmId's death.
    fn wait_for_exit(&self, vm_id: i32) {
        let interval = Duration::from_secs_f64(self.config.poll_delay);
        let deadline = Instant::now() + Duration::from_secs(600);
        while self.children.get(vm_id).is_some() && Instant::now() < deadline {
            std::thread::sleep(interval);
        }
    }
}

fn hostname() -> String {
    nix::unistd::gethostname()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "localhost".to_string())
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod engine_tests;
