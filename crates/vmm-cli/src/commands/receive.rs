use anyhow::Result;

use crate::client::Client;
use vmm_models::{ReceiveRequest, VmIdResponse};

pub async fn execute(client: &Client, transport_cookie: String) -> Result<()> {
    let response: VmIdResponse = client
        .post("/receive", &ReceiveRequest { transport_cookie })
        .await?;
    println!("Received VM {}", response.vm_id);
    Ok(())
}
