//! `VmControlBackend`: the full VM lifecycle surface as a trait object.
//! `vmm-daemon` depends on this trait rather than the concrete `Engine`, the
//! same seam a second backend (e.g. a container or libvirt control path)
//! would slot into without touching the HTTP layer.

use crate::error::Result;
use crate::types::{Instance, TransportCookie, VmRecord};

pub trait VmControlBackend: Send + Sync {
    fn instantiate_vm(&self, instance: Instance) -> Result<i32>;
    fn suspend_vm(&self, vm_id: i32, target: &str, suspend_cookie: Vec<u8>) -> Result<i32>;
    fn resume_vm(&self, source: &str) -> Result<(i32, Vec<u8>)>;
    fn prep_receive_vm(&self, instance: Instance) -> Result<TransportCookie>;
    fn migrate_vm(&self, vm_id: i32, target_host: &str, cookie: &TransportCookie) -> Result<i32>;
    fn receive_vm(&self, cookie: &TransportCookie) -> Result<i32>;
    fn pause_vm(&self, vm_id: i32) -> Result<()>;
    fn unpause_vm(&self, vm_id: i32) -> Result<()>;
    fn destroy_vm(&self, vm_id: i32) -> Result<()>;
    fn vmm_specific_call(&self, vm_id: i32, arg: &str) -> Result<String>;
    fn get_vm(&self, vm_id: i32) -> Result<VmRecord>;
    fn list_vms(&self) -> Vec<VmRecord>;
    fn start_debug_console(&self, vm_id: i32) -> Result<u16>;
}

impl VmControlBackend for crate::engine::Engine {
    fn instantiate_vm(&self, instance: Instance) -> Result<i32> {
        crate::engine::Engine::instantiate_vm(self, instance)
    }

    fn suspend_vm(&self, vm_id: i32, target: &str, suspend_cookie: Vec<u8>) -> Result<i32> {
        crate::engine::Engine::suspend_vm(self, vm_id, target, suspend_cookie)
    }

    fn resume_vm(&self, source: &str) -> Result<(i32, Vec<u8>)> {
        crate::engine::Engine::resume_vm(self, source)
    }

    fn prep_receive_vm(&self, instance: Instance) -> Result<TransportCookie> {
        crate::engine::Engine::prep_receive_vm(self, instance)
    }

    fn migrate_vm(&self, vm_id: i32, target_host: &str, cookie: &TransportCookie) -> Result<i32> {
        crate::engine::Engine::migrate_vm(self, vm_id, target_host, cookie)
    }

    fn receive_vm(&self, cookie: &TransportCookie) -> Result<i32> {
        crate::engine::Engine::receive_vm(self, cookie)
    }

    fn pause_vm(&self, vm_id: i32) -> Result<()> {
        crate::engine::Engine::pause_vm(self, vm_id)
    }

    fn unpause_vm(&self, vm_id: i32) -> Result<()> {
        crate::engine::Engine::unpause_vm(self, vm_id)
    }

    fn destroy_vm(&self, vm_id: i32) -> Result<()> {
        crate::engine::Engine::destroy_vm(self, vm_id)
    }

    fn vmm_specific_call(&self, vm_id: i32, arg: &str) -> Result<String> {
        crate::engine::Engine::vmm_specific_call(self, vm_id, arg)
    }

    fn get_vm(&self, vm_id: i32) -> Result<VmRecord> {
        self.children().get_or_uncontrolled(vm_id)
    }

    fn list_vms(&self) -> Vec<VmRecord> {
        self.children().snapshot()
    }

    fn start_debug_console(&self, vm_id: i32) -> Result<u16> {
        crate::engine::Engine::start_debug_console(self, vm_id)
    }
}
