use anyhow::Result;

use crate::client::Client;
use crate::commands::instance_spec;
use vmm_models::{PrepReceiveRequest, TransportCookieResponse};

/// `source` is the wire-compat field `prepReceiveVm(instance, source)`
/// carries but the backend never consults: the returned cookie names this
/// node's own hostname.
pub async fn execute(
    client: &Client,
    memory_mb: u64,
    cores: u32,
    disks: Vec<String>,
    nics: Vec<String>,
    hints: Vec<String>,
    source: String,
) -> Result<()> {
    let instance = instance_spec::build(memory_mb, cores, &disks, &nics, &hints)?;
    let response: TransportCookieResponse = client
        .post("/prep-receive", &PrepReceiveRequest { instance, source })
        .await?;
    println!("Transport cookie: {}", response.transport_cookie);
    Ok(())
}
