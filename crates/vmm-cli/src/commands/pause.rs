use anyhow::Result;

use crate::client::Client;

pub async fn execute(client: &Client, vm_id: i32) -> Result<()> {
    client
        .post_no_content(&format!("/instances/{vm_id}/pause"))
        .await?;
    println!("VM {vm_id} paused");
    Ok(())
}
