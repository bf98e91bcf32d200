use super::*;
use crate::dfs::LocalDfs;
use crate::types::{Disk, Nic};
use std::collections::HashMap;
use tempfile::tempdir;

fn instance_with_hints(hints: HashMap<String, String>) -> Instance {
    Instance {
        memory_mb: 1024,
        cores: 2,
        disks: vec![Disk {
            uri: "images/foo.img".to_string(),
            persistent: true,
        }],
        nics: vec![Nic {
            mac: "52:54:00:12:34:56".to_string(),
            network: 7,
        }],
        hints,
    }
}

#[test]
fn default_hints_produce_ide_e1000_dynticks() {
    let root = tempdir().unwrap();
    let dfs = LocalDfs::new(root.path());
    let instance = instance_with_hints(HashMap::new());

    let args = build_args(&instance, &dfs, None).unwrap().join(" ");

    assert!(args.contains("if=ide,index=0,snapshot=off,media=disk"));
    assert!(args.contains("nic,macaddr=52:54:00:12:34:56,model=e1000,vlan=7"));
    assert!(args.contains("tap,vlan=7,script=/etc/qemu-ifup.7"));
    assert!(args.contains("-m 1024"));
    assert!(args.contains("-smp 2"));
    assert!(args.contains("-clock dynticks"));
    assert!(args.contains("-monitor pty"));
}

#[test]
fn hint_overrides_change_clock_disk_and_nic_model() {
    let root = tempdir().unwrap();
    let dfs = LocalDfs::new(root.path());
    let mut hints = HashMap::new();
    hints.insert("clock".to_string(), "kvm-pit".to_string());
    hints.insert("diskInterface".to_string(), "virtio".to_string());
    hints.insert("nicModel".to_string(), "virtio".to_string());
    let instance = instance_with_hints(hints);

    let args = build_args(&instance, &dfs, None).unwrap().join(" ");

    assert!(args.contains("-clock kvm-pit"));
    assert!(args.contains("if=virtio"));
    assert!(args.contains("model=virtio"));
}

#[test]
fn non_persistent_disk_enables_snapshot_mode() {
    let root = tempdir().unwrap();
    let dfs = LocalDfs::new(root.path());
    let mut instance = instance_with_hints(HashMap::new());
    instance.disks[0].persistent = false;

    let args = build_args(&instance, &dfs, None).unwrap().join(" ");
    assert!(args.contains("snapshot=on"));
}

#[test]
fn incoming_source_appends_flag() {
    let root = tempdir().unwrap();
    let dfs = LocalDfs::new(root.path());
    let instance = instance_with_hints(HashMap::new());

    let args = build_args(&instance, &dfs, Some("tcp:0.0.0.0:19500"))
        .unwrap()
        .join(" ");
    assert!(args.contains("-incoming tcp:0.0.0.0:19500"));
}
