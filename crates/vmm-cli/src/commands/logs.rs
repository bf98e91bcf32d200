use anyhow::Result;

use crate::client::Client;
use vmm_models::VmRecordResponse;

/// Dumps the VM's `monitorHistory` ring buffer, not a QEMU guest console
/// log — this is operator debugging of the text-monitor dialogue, not
/// guest output.
pub async fn execute(client: &Client, vm_id: i32, tail: Option<usize>) -> Result<()> {
    let response: VmRecordResponse = client.get(&format!("/instances/{vm_id}")).await?;

    if response.monitor_history.is_empty() {
        println!("No monitor history recorded for VM {vm_id}");
        return Ok(());
    }

    let lines: Vec<&str> = response.monitor_history.lines().collect();
    let shown = match tail {
        Some(n) if n < lines.len() => &lines[lines.len() - n..],
        _ => &lines[..],
    };

    for line in shown {
        println!("{line}");
    }

    if shown.len() < lines.len() {
        println!();
        println!("Showing last {} of {} lines", shown.len(), lines.len());
    }

    Ok(())
}
