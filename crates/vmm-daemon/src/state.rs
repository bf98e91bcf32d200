use std::sync::Arc;

use vmm_core::VmControlBackend;

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn VmControlBackend>,
}
