use anyhow::Result;

use crate::client::Client;
use vmm_models::{MigrateRequest, VmIdResponse};

pub async fn execute(
    client: &Client,
    vm_id: i32,
    target_host: String,
    transport_cookie: String,
) -> Result<()> {
    let request = MigrateRequest {
        target_host,
        transport_cookie,
    };
    let response: VmIdResponse = client
        .post(&format!("/instances/{vm_id}/migrate"), &request)
        .await?;
    println!("Migration of VM {} initiated", response.vm_id);
    Ok(())
}
