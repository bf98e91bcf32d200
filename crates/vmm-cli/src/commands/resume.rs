use anyhow::Result;

use crate::client::Client;
use vmm_models::{ResumeRequest, ResumeResponse};

pub async fn execute(client: &Client, source: String) -> Result<()> {
    let response: ResumeResponse = client.post("/resume", &ResumeRequest { source }).await?;
    println!(
        "Resumed VM {} (suspend cookie: {})",
        response.vm_id, response.suspend_cookie
    );
    Ok(())
}
