use anyhow::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::client::Client;
use vmm_models::{SuspendRequest, VmIdResponse};

pub async fn execute(client: &Client, vm_id: i32, target: String, cookie: String) -> Result<()> {
    let suspend_cookie = BASE64.encode(cookie.as_bytes());
    let request = SuspendRequest {
        target,
        suspend_cookie,
    };
    let response: VmIdResponse = client
        .post(&format!("/instances/{vm_id}/suspend"), &request)
        .await?;
    println!("Suspended VM {}", response.vm_id);
    Ok(())
}
