use anyhow::Result;

use crate::client::Client;
use crate::commands::instance_spec;
use vmm_models::{CreateInstanceRequest, VmIdResponse};

pub async fn execute(
    client: &Client,
    memory_mb: u64,
    cores: u32,
    disks: Vec<String>,
    nics: Vec<String>,
    hints: Vec<String>,
) -> Result<()> {
    let instance = instance_spec::build(memory_mb, cores, &disks, &nics, &hints)?;
    let response: VmIdResponse = client
        .post("/instances", &CreateInstanceRequest { instance })
        .await?;
    println!("Instantiated VM {}", response.vm_id);
    Ok(())
}
