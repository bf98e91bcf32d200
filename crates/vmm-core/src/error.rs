use thiserror::Error;

/// Error taxonomy for the Node-Manager VM Control Core.
#[derive(Debug, Error)]
pub enum HypervisorError {
    #[error("uncontrolled vmId {0}")]
    UncontrolledVm(i32),

    #[error("monitor read timed out for vmId {0}")]
    MonitorTimeout(i32),

    #[error("monitor fd hit EOF mid-dialogue for vmId {0}")]
    MonitorEarlyEof(i32),

    #[error("migration failed for vmId {0} after {retries} attempts: {message}")]
    MigrationFailed {
        vm_id: i32,
        retries: u32,
        message: String,
    },

    #[error("VM startup failed: {0}")]
    StartupFailed(String),

    #[error("failed to load persisted VM info for vmId {vm_id}: {reason}")]
    InfoLoadFailed { vm_id: i32, reason: String },

    #[error("DFS operation failed: {0}")]
    DfsError(String),

    #[error("no ports available in pool")]
    NoPortsAvailable,

    #[error("port {0} is not available")]
    PortUnavailable(u16),

    #[error("unknown vmmSpecificCall argument: {0}")]
    UnknownOperatorCall(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("nix error: {0}")]
    Nix(#[from] nix::Error),
}

pub type Result<T> = std::result::Result<T, HypervisorError>;
