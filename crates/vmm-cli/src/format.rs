use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use serde::Serialize;

use vmm_models::VmRecordResponse;

pub fn print_json<T: Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap());
}

pub fn print_instance_list(instances: &[VmRecordResponse]) {
    if instances.is_empty() {
        println!("No instances found.");
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec!["VM ID", "STATE", "MEMORY", "CORES", "VNC", "OS_CHILD"]);

    for instance in instances {
        table.add_row(vec![
            instance.vm_id.to_string(),
            state_label(instance),
            format!("{} MB", instance.instance.memory_mb),
            instance.instance.cores.to_string(),
            instance
                .vnc_port
                .map(|p| (p + 5900).to_string())
                .unwrap_or_else(|| "-".to_string()),
            instance.os_child.to_string(),
        ]);
    }

    println!("{table}");
}

pub fn print_instance_details(instance: &VmRecordResponse) {
    println!("VM {}", instance.vm_id);
    println!("  PID:           {}", instance.pid);
    println!("  State:         {}", state_label(instance));
    println!("  Memory:        {} MB", instance.instance.memory_mb);
    println!("  Cores:         {}", instance.instance.cores);
    println!(
        "  PTY:           {}",
        instance.pty_file.as_deref().unwrap_or("-")
    );
    println!(
        "  VNC:           {}",
        instance
            .vnc_port
            .map(|p| format!("display :{p} (tcp {})", p + 5900))
            .unwrap_or_else(|| "-".to_string())
    );
    println!("  OS child:      {}", instance.os_child);
    println!("  Error bit:     {}", instance.error_bit);
    println!("  Migrating out: {}", instance.migrating_out);

    if !instance.instance.disks.is_empty() {
        println!("\nDisks:");
        for disk in &instance.instance.disks {
            println!(
                "  {} (persistent={})",
                disk.uri, disk.persistent
            );
        }
    }

    if !instance.instance.nics.is_empty() {
        println!("\nNics:");
        for nic in &instance.instance.nics {
            println!("  {} on vlan {}", nic.mac, nic.network);
        }
    }
}

fn state_label(instance: &VmRecordResponse) -> String {
    if instance.error_bit {
        "error".to_string()
    } else if instance.migrating_out {
        "migrating".to_string()
    } else {
        "running".to_string()
    }
}
