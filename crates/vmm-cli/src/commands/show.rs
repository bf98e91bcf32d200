use anyhow::Result;

use crate::{client::Client, config::OutputFormat, format};
use vmm_models::VmRecordResponse;

pub async fn execute(client: &Client, vm_id: i32, output_format: &OutputFormat) -> Result<()> {
    let response: VmRecordResponse = client.get(&format!("/instances/{vm_id}")).await?;

    match output_format {
        OutputFormat::Json => format::print_json(&response),
        OutputFormat::Table => format::print_instance_details(&response),
    }

    Ok(())
}
