mod instances;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;

/// The REST surface this workspace uses to drive the core over HTTP.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/instances", post(instances::create_instance))
        .route("/instances", get(instances::list_instances))
        .route("/instances/:pid", get(instances::get_instance))
        .route("/instances/:pid", delete(instances::destroy_instance))
        .route("/instances/:pid/suspend", post(instances::suspend_instance))
        .route("/resume", post(instances::resume_instance))
        .route("/prep-receive", post(instances::prep_receive))
        .route("/instances/:pid/migrate", post(instances::migrate_instance))
        .route("/receive", post(instances::receive_instance))
        .route("/instances/:pid/pause", post(instances::pause_instance))
        .route("/instances/:pid/unpause", post(instances::unpause_instance))
        .route("/instances/:pid/call", post(instances::vmm_call))
        .route("/instances/:pid/console", post(instances::start_console))
        .with_state(state)
}
