//! Node-Manager Callback: fire-and-forget notification on every observed
//! state transition. Errors from the upcall are logged and swallowed — a
//! cluster manager that is briefly unreachable must never block or fail a
//! reap/lifecycle operation.

use tracing::{error, info};

use crate::types::VmState;

pub trait NodeManagerCallback: Send + Sync {
    fn vm_state_change(&self, vm_id: i32, from: Option<VmState>, to: VmState);
}

/// Logs the transition and does nothing else; useful standalone and in tests.
#[derive(Debug, Default)]
pub struct LoggingCallback;

impl NodeManagerCallback for LoggingCallback {
    fn vm_state_change(&self, vm_id: i32, from: Option<VmState>, to: VmState) {
        info!(vm_id, ?from, %to, "vm state change");
    }
}

/// POSTs the transition to a configured node-manager URL. Built on
/// `reqwest`'s blocking client since this is invoked from the Reaper's
/// synchronous thread, not from async daemon code.
pub struct HttpCallback {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpCallback {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl NodeManagerCallback for HttpCallback {
    fn vm_state_change(&self, vm_id: i32, from: Option<VmState>, to: VmState) {
        let body = vmm_models::VmStateChangeNotification {
            vm_id,
            from: from.map(|s| s.to_string()),
            to: to.to_string(),
        };
        let url = format!("{}/vm-state-change", self.base_url);
        if let Err(e) = self.client.post(&url).json(&body).send() {
            error!(vm_id, error = %e, "node-manager callback failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingCallback {
        calls: Arc<AtomicUsize>,
    }

    impl NodeManagerCallback for CountingCallback {
        fn vm_state_change(&self, _vm_id: i32, _from: Option<VmState>, _to: VmState) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn logging_callback_does_not_panic() {
        let cb = LoggingCallback;
        cb.vm_state_change(1, None, VmState::Exited);
    }

    #[test]
    fn trait_object_dispatch_works() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cb: Box<dyn NodeManagerCallback> = Box::new(CountingCallback {
            calls: calls.clone(),
        });
        cb.vm_state_change(1, Some(VmState::Running), VmState::Exited);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
