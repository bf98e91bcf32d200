use anyhow::Result;

use crate::client::Client;
use vmm_models::ConsoleResponse;

/// Binds a debug console proxy on the node for `vm_id` and prints the port
/// an operator should point `nc`/`telnet` at.
pub async fn execute(client: &Client, vm_id: i32) -> Result<()> {
    let response: ConsoleResponse = client
        .post_empty(&format!("/instances/{vm_id}/console"))
        .await?;

    println!(
        "Debug console for VM {vm_id} listening on port {} — connect with `nc <node-host> {}`",
        response.port, response.port
    );

    Ok(())
}
