//! Wire types shared between `vmm-daemon` and `vmm-cli`.
//!
//! Plain serde structs only — no logic. Mirrors the instance descriptor and
//! VM record shapes of the Node-Manager VM Control Core (see `vmm-core`),
//! translated into a JSON-friendly request/response surface.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ============================================================================
// Instance descriptor (request body for instantiate / prep-receive)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskSpec {
    pub uri: String,
    pub persistent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NicSpec {
    pub mac: String,
    pub network: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceSpec {
    pub memory_mb: u64,
    pub cores: u32,
    pub disks: Vec<DiskSpec>,
    pub nics: Vec<NicSpec>,
    #[serde(default)]
    pub hints: HashMap<String, String>,
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInstanceRequest {
    #[serde(flatten)]
    pub instance: InstanceSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspendRequest {
    pub target: String,
    /// Opaque cookie round-tripped across a suspend/resume pair, base64-encoded.
    pub suspend_cookie: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeRequest {
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepReceiveRequest {
    #[serde(flatten)]
    pub instance: InstanceSpec,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrateRequest {
    pub target_host: String,
    /// Opaque transport cookie produced by a prior prep-receive, base64-encoded.
    pub transport_cookie: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiveRequest {
    pub transport_cookie: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmmCallRequest {
    pub arg: String,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmIdResponse {
    pub vm_id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportCookieResponse {
    pub transport_cookie: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeResponse {
    pub vm_id: i32,
    pub suspend_cookie: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmRecordResponse {
    pub vm_id: i32,
    pub pid: i32,
    pub pty_file: Option<String>,
    pub os_child: bool,
    pub error_bit: bool,
    pub migrating_out: bool,
    pub vnc_port: Option<u16>,
    pub instance: InstanceSpec,
    /// Lossy UTF-8 of the bounded monitor history ring buffer, for `vmmctl
    /// logs`; kept around for diagnostics, not just reap-time dumps.
    pub monitor_history: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListInstancesResponse {
    pub instances: Vec<VmRecordResponse>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmmCallResponse {
    pub result: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleResponse {
    pub port: u16,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

// ============================================================================
// Node-Manager callback payload (posted by the daemon to the cluster manager)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmStateChangeNotification {
    pub vm_id: i32,
    pub from: Option<String>,
    pub to: String,
}
