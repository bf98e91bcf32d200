use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use vmm_core::VmControlBackend;
use vmm_models::{
    ConsoleResponse, CreateInstanceRequest, ListInstancesResponse, MigrateRequest,
    PrepReceiveRequest, ReceiveRequest, ResumeRequest, ResumeResponse, SuspendRequest, VmIdResponse,
    VmmCallRequest, VmmCallResponse,
};

use crate::error::{ApiError, ApiResult};
use crate::models::{
    decode_blob, decode_transport_cookie, encode_blob, encode_transport_cookie, instance_from_wire,
    record_to_wire,
};
use crate::state::AppState;

/// The core is blocking by design; every handler hands the call to a
/// blocking thread and lets `?` propagate a `JoinError` as a 500.
async fn blocking<F, T>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("backend task panicked: {e}")))?
}

pub async fn create_instance(
    State(state): State<AppState>,
    Json(req): Json<CreateInstanceRequest>,
) -> ApiResult<Json<VmIdResponse>> {
    let backend = state.backend.clone();
    let instance = instance_from_wire(req.instance);
    let vm_id = blocking(move || Ok(backend.instantiate_vm(instance)?)).await?;
    Ok(Json(VmIdResponse { vm_id }))
}

pub async fn suspend_instance(
    State(state): State<AppState>,
    Path(pid): Path<i32>,
    Json(req): Json<SuspendRequest>,
) -> ApiResult<Json<VmIdResponse>> {
    let backend = state.backend.clone();
    let cookie = decode_blob(&req.suspend_cookie)?;
    let vm_id = blocking(move || Ok(backend.suspend_vm(pid, &req.target, cookie)?)).await?;
    Ok(Json(VmIdResponse { vm_id }))
}

pub async fn resume_instance(
    State(state): State<AppState>,
    Json(req): Json<ResumeRequest>,
) -> ApiResult<Json<ResumeResponse>> {
    let backend = state.backend.clone();
    let (vm_id, cookie) = blocking(move || Ok(backend.resume_vm(&req.source)?)).await?;
    Ok(Json(ResumeResponse {
        vm_id,
        suspend_cookie: encode_blob(&cookie),
    }))
}

/// `source` is accepted only for wire-compatibility with the original
/// `prepReceiveVm(instance, source)` signature; the backend never consults
/// it (the transport cookie it returns carries this node's own hostname).
pub async fn prep_receive(
    State(state): State<AppState>,
    Json(req): Json<PrepReceiveRequest>,
) -> ApiResult<Json<vmm_models::TransportCookieResponse>> {
    let backend = state.backend.clone();
    let instance = instance_from_wire(req.instance);
    let cookie = blocking(move || Ok(backend.prep_receive_vm(instance)?)).await?;
    Ok(Json(vmm_models::TransportCookieResponse {
        transport_cookie: encode_transport_cookie(&cookie)?,
    }))
}

pub async fn migrate_instance(
    State(state): State<AppState>,
    Path(pid): Path<i32>,
    Json(req): Json<MigrateRequest>,
) -> ApiResult<Json<VmIdResponse>> {
    let backend = state.backend.clone();
    let cookie = decode_transport_cookie(&req.transport_cookie)?;
    let vm_id =
        blocking(move || Ok(backend.migrate_vm(pid, &req.target_host, &cookie)?)).await?;
    Ok(Json(VmIdResponse { vm_id }))
}

pub async fn receive_instance(
    State(state): State<AppState>,
    Json(req): Json<ReceiveRequest>,
) -> ApiResult<Json<VmIdResponse>> {
    let backend = state.backend.clone();
    let cookie = decode_transport_cookie(&req.transport_cookie)?;
    let vm_id = blocking(move || Ok(backend.receive_vm(&cookie)?)).await?;
    Ok(Json(VmIdResponse { vm_id }))
}

pub async fn pause_instance(
    State(state): State<AppState>,
    Path(pid): Path<i32>,
) -> ApiResult<StatusCode> {
    let backend = state.backend.clone();
    blocking(move || Ok(backend.pause_vm(pid)?)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unpause_instance(
    State(state): State<AppState>,
    Path(pid): Path<i32>,
) -> ApiResult<StatusCode> {
    let backend = state.backend.clone();
    blocking(move || Ok(backend.unpause_vm(pid)?)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn destroy_instance(
    State(state): State<AppState>,
    Path(pid): Path<i32>,
) -> ApiResult<StatusCode> {
    let backend = state.backend.clone();
    blocking(move || Ok(backend.destroy_vm(pid)?)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn vmm_call(
    State(state): State<AppState>,
    Path(pid): Path<i32>,
    Json(req): Json<VmmCallRequest>,
) -> ApiResult<Json<VmmCallResponse>> {
    let backend = state.backend.clone();
    let result = blocking(move || Ok(backend.vmm_specific_call(pid, &req.arg)?)).await?;
    Ok(Json(VmmCallResponse { result }))
}

pub async fn list_instances(
    State(state): State<AppState>,
) -> ApiResult<Json<ListInstancesResponse>> {
    let backend = state.backend.clone();
    let records = blocking(move || Ok(backend.list_vms())).await?;
    let instances: Vec<_> = records.iter().map(record_to_wire).collect();
    let total = instances.len();
    Ok(Json(ListInstancesResponse { instances, total }))
}

pub async fn get_instance(
    State(state): State<AppState>,
    Path(pid): Path<i32>,
) -> ApiResult<Json<vmm_models::VmRecordResponse>> {
    let backend = state.backend.clone();
    let record = blocking(move || Ok(backend.get_vm(pid)?)).await?;
    Ok(Json(record_to_wire(&record)))
}

pub async fn start_console(
    State(state): State<AppState>,
    Path(pid): Path<i32>,
) -> ApiResult<Json<ConsoleResponse>> {
    let backend: Arc<_> = state.backend.clone();
    let port = blocking(move || Ok(backend.start_debug_console(pid)?)).await?;
    Ok(Json(ConsoleResponse { port }))
}
