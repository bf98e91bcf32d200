use anyhow::Result;

use crate::client::Client;

pub async fn execute(client: &Client, vm_id: i32) -> Result<()> {
    client.delete(&format!("/instances/{vm_id}")).await?;
    println!("VM {vm_id} destroyed");
    Ok(())
}
