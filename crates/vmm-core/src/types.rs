//! Data model: the `Instance` descriptor and `VmRecord`.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A disk attached to an instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Disk {
    pub uri: String,
    pub persistent: bool,
}

/// A network interface attached to an instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nic {
    pub mac: String,
    pub network: u32,
}

/// Caller-supplied instance descriptor. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub memory_mb: u64,
    pub cores: u32,
    pub disks: Vec<Disk>,
    pub nics: Vec<Nic>,
    /// Recognized keys: `clock`, `diskInterface`, `nicModel`.
    #[serde(default)]
    pub hints: HashMap<String, String>,
}

impl Instance {
    pub fn hint(&self, key: &str, default: &str) -> String {
        self.hints
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }
}

/// Whitelist disk/ISO URIs to filename-safe characters before handing them to
/// the DFS adapter or QEMU's `-drive`/`change` arguments.
pub fn scrub_uri(uri: &str) -> String {
    uri.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '/') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Running/paused/etc observed or reported state of a VM, used only for the
/// Node-Manager callback payload (`vmStateChange(vmId, from, to)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VmState {
    Running,
    Paused,
    Exited,
}

impl std::fmt::Display for VmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VmState::Running => write!(f, "Running"),
            VmState::Paused => write!(f, "Paused"),
            VmState::Exited => write!(f, "Exited"),
        }
    }
}

/// Opaque blob carrying `(migration_port, vmId, source_hostname)`, produced by
/// `prepReceive` and passed back into `migrate`. Decodable only by this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportCookie {
    pub port: u16,
    pub vm_id: i32,
    pub hostname: String,
}

impl TransportCookie {
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// The version of a VM record actually persisted to the info dir: the minimal
/// triple `(instance, pid, ptyFile)`, plus a schema tag so future fields can
/// default cleanly on reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedVmRecord {
    #[serde(default = "current_schema_version")]
    pub schema_version: u32,
    pub instance: Instance,
    pub pid: i32,
    pub pty_file: Option<PathBuf>,
}

fn current_schema_version() -> u32 {
    1
}

/// One per controlled VM, key = `vmId` = the QEMU process pid on this host.
#[derive(Debug, Clone)]
pub struct VmRecord {
    pub instance: Instance,
    pub pid: i32,
    pub pty_file: Option<PathBuf>,

    /// True iff this supervisor forked QEMU (false when recovered from the
    /// info dir after a supervisor restart).
    pub os_child: bool,
    /// Sticky fault flag; on reap the monitor history and stderr are dumped.
    pub error_bit: bool,
    /// True between `migrate` initiation and the VM's actual disappearance;
    /// suppresses the `Exited` upcall.
    pub migrating_out: bool,
    /// Assigned VNC display number, if any.
    pub vnc_port: Option<u16>,
    /// Opaque blob returned by `prepReceive` (only set on the receive side).
    pub transport_cookie: Option<TransportCookie>,
    /// Opaque blob round-tripped by the cluster manager across suspend/resume.
    pub suspend_cookie: Option<Vec<u8>>,

    /// Append-only byte log of everything seen/sent on the monitor, bounded
    /// to the last `MONITOR_HISTORY_CAP` bytes.
    pub monitor_history: VecDeque<u8>,
}

pub const MONITOR_HISTORY_CAP: usize = 64 * 1024;

impl VmRecord {
    pub fn new(instance: Instance, pid: i32, os_child: bool) -> Self {
        Self {
            instance,
            pid,
            pty_file: None,
            os_child,
            error_bit: false,
            migrating_out: false,
            vnc_port: None,
            transport_cookie: None,
            suspend_cookie: None,
            monitor_history: VecDeque::new(),
        }
    }

    pub fn from_persisted(p: PersistedVmRecord, os_child: bool) -> Self {
        Self {
            instance: p.instance,
            pid: p.pid,
            pty_file: p.pty_file,
            os_child,
            error_bit: false,
            migrating_out: false,
            vnc_port: None,
            transport_cookie: None,
            suspend_cookie: None,
            monitor_history: VecDeque::new(),
        }
    }

    pub fn to_persisted(&self) -> PersistedVmRecord {
        PersistedVmRecord {
            schema_version: current_schema_version(),
            instance: self.instance.clone(),
            pid: self.pid,
            pty_file: self.pty_file.clone(),
        }
    }

    pub fn push_history(&mut self, bytes: &[u8]) {
        self.monitor_history.extend(bytes.iter().copied());
        while self.monitor_history.len() > MONITOR_HISTORY_CAP {
            self.monitor_history.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrub_uri_strips_unsafe_characters() {
        assert_eq!(scrub_uri("images/foo.img"), "images/foo.img");
        assert_eq!(scrub_uri("../etc/passwd; rm -rf"), ".._etc_passwd__rm_-rf");
        assert_eq!(scrub_uri("foo bar$(x)"), "foo_bar__x_");
    }

    #[test]
    fn transport_cookie_round_trips() {
        let cookie = TransportCookie {
            port: 19042,
            vm_id: 4242,
            hostname: "node-7".to_string(),
        };
        let bytes = cookie.encode().unwrap();
        let decoded = TransportCookie::decode(&bytes).unwrap();
        assert_eq!(decoded.port, cookie.port);
        assert_eq!(decoded.vm_id, cookie.vm_id);
        assert_eq!(decoded.hostname, cookie.hostname);
    }

    #[test]
    fn monitor_history_is_bounded() {
        let mut rec = VmRecord::new(
            Instance {
                memory_mb: 512,
                cores: 1,
                disks: vec![],
                nics: vec![],
                hints: HashMap::new(),
            },
            1,
            true,
        );
        rec.push_history(&vec![b'x'; MONITOR_HISTORY_CAP + 100]);
        assert_eq!(rec.monitor_history.len(), MONITOR_HISTORY_CAP);
    }
}
