//! QEMU command-line construction. Kept separate from `engine.rs` so the
//! argv shape can be unit-tested without forking anything.

use crate::dfs::Dfs;
use crate::error::Result;
use crate::types::Instance;

/// Builds the argv QEMU is exec'd with for a given instance, optionally with
/// an `-incoming` source (migration target / resume source).
pub fn build_args(instance: &Instance, dfs: &dyn Dfs, incoming: Option<&str>) -> Result<Vec<String>> {
    let mut args = Vec::new();

    let clock = instance.hint("clock", "dynticks");
    let disk_iface = instance.hint("diskInterface", "ide");
    let nic_model = instance.hint("nicModel", "e1000");

    for (index, disk) in instance.disks.iter().enumerate() {
        let scrubbed = crate::types::scrub_uri(&disk.uri);
        let local = dfs.get_local_handle(&format!("images/{scrubbed}"))?;
        let snapshot = if disk.persistent { "off" } else { "on" };
        args.push("-drive".to_string());
        args.push(format!(
            "file={},if={},index={},snapshot={},media=disk",
            local.display(),
            disk_iface,
            index,
            snapshot,
        ));
    }

    for nic in &instance.nics {
        args.push("-net".to_string());
        args.push(format!(
            "nic,macaddr={},model={},vlan={}",
            nic.mac, nic_model, nic.network
        ));
        args.push("-net".to_string());
        args.push(format!(
            "tap,vlan={},script=/etc/qemu-ifup.{}",
            nic.network, nic.network
        ));
    }

    args.push("-m".to_string());
    args.push(instance.memory_mb.to_string());
    args.push("-smp".to_string());
    args.push(instance.cores.to_string());
    args.push("-clock".to_string());
    args.push(clock);
    args.push("-serial".to_string());
    args.push("none".to_string());
    args.push("-vnc".to_string());
    args.push("none".to_string());
    args.push("-monitor".to_string());
    args.push("pty".to_string());

    if let Some(source) = incoming {
        args.push("-incoming".to_string());
        args.push(source.to_string());
    }

    Ok(args)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
