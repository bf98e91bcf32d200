//! Port Allocators: three independent pools with distinct allocation
//! semantics, each serialized under a mutex.

use std::collections::HashSet;
use std::sync::Mutex;

use port_scanner::local_port_available;
use rand::Rng;

use crate::error::{HypervisorError, Result};

const MIGRATION_PORT_BASE: u16 = 19000;
const MIGRATION_PORT_RANGE: u16 = 1000;
const MIGRATION_PORT_MAX_ATTEMPTS: usize = 1000;

/// Migration port pool: a random integer in `[19000, 20000)` until one is
/// unused. Released when `receive` completes on the destination, not on the
/// source.
pub struct MigrationPortPool {
    leased: Mutex<HashSet<u16>>,
}

impl Default for MigrationPortPool {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationPortPool {
    pub fn new() -> Self {
        Self {
            leased: Mutex::new(HashSet::new()),
        }
    }

    pub fn allocate(&self) -> Result<u16> {
        let mut leased = self.leased.lock().unwrap();
        let mut rng = rand::thread_rng();
        for _ in 0..MIGRATION_PORT_MAX_ATTEMPTS {
            let candidate = MIGRATION_PORT_BASE + rng.gen_range(0..MIGRATION_PORT_RANGE);
            if !leased.contains(&candidate) && local_port_available(candidate) {
                leased.insert(candidate);
                return Ok(candidate);
            }
        }
        Err(HypervisorError::NoPortsAvailable)
    }

    pub fn release(&self, port: u16) {
        self.leased.lock().unwrap().remove(&port);
    }
}

/// VNC port pool: the smallest non-negative integer (QEMU VNC display
/// number) not currently leased. The externally advertised TCP port is
/// `display + 5900`.
pub struct VncPortPool {
    leased: Mutex<HashSet<u16>>,
}

impl Default for VncPortPool {
    fn default() -> Self {
        Self::new()
    }
}

impl VncPortPool {
    pub fn new() -> Self {
        Self {
            leased: Mutex::new(HashSet::new()),
        }
    }

    pub fn allocate(&self) -> u16 {
        let mut leased = self.leased.lock().unwrap();
        let mut display = 0u16;
        while leased.contains(&display) {
            display += 1;
        }
        leased.insert(display);
        display
    }

    pub fn release(&self, display: u16) {
        self.leased.lock().unwrap().remove(&display);
    }

    pub fn is_leased(&self, display: u16) -> bool {
        self.leased.lock().unwrap().contains(&display)
    }

    /// Mark a display as leased without allocating it, used when recovering
    /// a persisted record that already names a VNC port.
    pub fn mark_leased(&self, display: u16) {
        self.leased.lock().unwrap().insert(display);
    }
}

/// Debug console pool: a monotonic counter starting at 10000, handed out on
/// demand; never recycled.
pub struct DebugConsolePool {
    next: Mutex<u16>,
}

impl Default for DebugConsolePool {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugConsolePool {
    pub fn new() -> Self {
        Self {
            next: Mutex::new(10000),
        }
    }

    pub fn allocate(&self) -> u16 {
        let mut next = self.next.lock().unwrap();
        let port = *next;
        *next += 1;
        port
    }
}
