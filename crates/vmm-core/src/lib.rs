//! The Node-Manager VM Control Core: per-host supervisor for QEMU/KVM
//! virtual machines. See the component table in the workspace root
//! `SPEC_FULL.md` for how the modules below map onto components A-I.

pub mod backend;
pub mod callback;
pub mod child_table;
pub mod config;
pub mod console;
pub mod dfs;
pub mod engine;
pub mod error;
pub mod info_store;
pub mod monitor;
pub mod port;
pub mod qemu;
pub mod reaper;
pub mod semaphore;
pub mod types;

pub use backend::VmControlBackend;
pub use config::QemuConfig;
pub use engine::Engine;
pub use error::{HypervisorError, Result};
pub use reaper::Reaper;
pub use types::{Disk, Instance, Nic, PersistedVmRecord, TransportCookie, VmRecord, VmState};
