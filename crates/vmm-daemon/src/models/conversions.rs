use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use vmm_core::{Disk, Instance, Nic, TransportCookie, VmRecord};
use vmm_models::{DiskSpec, InstanceSpec, NicSpec, VmRecordResponse};

use crate::error::ApiError;

pub fn instance_from_wire(spec: InstanceSpec) -> Instance {
    Instance {
        memory_mb: spec.memory_mb,
        cores: spec.cores,
        disks: spec.disks.into_iter().map(disk_from_wire).collect(),
        nics: spec.nics.into_iter().map(nic_from_wire).collect(),
        hints: spec.hints,
    }
}

pub fn instance_to_wire(instance: &Instance) -> InstanceSpec {
    InstanceSpec {
        memory_mb: instance.memory_mb,
        cores: instance.cores,
        disks: instance.disks.iter().map(disk_to_wire).collect(),
        nics: instance.nics.iter().map(nic_to_wire).collect(),
        hints: instance.hints.clone(),
    }
}

fn disk_from_wire(spec: DiskSpec) -> Disk {
    Disk {
        uri: spec.uri,
        persistent: spec.persistent,
    }
}

fn disk_to_wire(disk: &Disk) -> DiskSpec {
    DiskSpec {
        uri: disk.uri.clone(),
        persistent: disk.persistent,
    }
}

fn nic_from_wire(spec: NicSpec) -> Nic {
    Nic {
        mac: spec.mac,
        network: spec.network,
    }
}

fn nic_to_wire(nic: &Nic) -> NicSpec {
    NicSpec {
        mac: nic.mac.clone(),
        network: nic.network,
    }
}

pub fn record_to_wire(record: &VmRecord) -> VmRecordResponse {
    VmRecordResponse {
        vm_id: record.pid,
        pid: record.pid,
        pty_file: record
            .pty_file
            .as_ref()
            .map(|p| p.display().to_string()),
        os_child: record.os_child,
        error_bit: record.error_bit,
        migrating_out: record.migrating_out,
        vnc_port: record.vnc_port,
        instance: instance_to_wire(&record.instance),
        monitor_history: String::from_utf8_lossy(
            &record.monitor_history.iter().copied().collect::<Vec<u8>>(),
        )
        .into_owned(),
    }
}

/// Opaque blobs (suspend cookies, transport cookies) cross the wire as
/// base64 so they fit in a JSON string field without escaping concerns.
pub fn encode_blob(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

pub fn decode_blob(encoded: &str) -> Result<Vec<u8>, ApiError> {
    BASE64
        .decode(encoded)
        .map_err(|e| ApiError::BadRequest(format!("invalid base64 cookie: {e}")))
}

pub fn encode_transport_cookie(cookie: &TransportCookie) -> Result<String, ApiError> {
    let bytes = cookie
        .encode()
        .map_err(|e| ApiError::Internal(format!("failed to encode transport cookie: {e}")))?;
    Ok(encode_blob(&bytes))
}

pub fn decode_transport_cookie(encoded: &str) -> Result<TransportCookie, ApiError> {
    let bytes = decode_blob(encoded)?;
    TransportCookie::decode(&bytes)
        .map_err(|e| ApiError::BadRequest(format!("invalid transport cookie: {e}")))
}
