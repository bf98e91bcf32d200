use anyhow::Result;

use crate::{client::Client, config::OutputFormat, format};
use vmm_models::ListInstancesResponse;

pub async fn execute(client: &Client, output_format: &OutputFormat) -> Result<()> {
    let response: ListInstancesResponse = client.get("/instances").await?;

    match output_format {
        OutputFormat::Json => format::print_json(&response),
        OutputFormat::Table => format::print_instance_list(&response.instances),
    }

    Ok(())
}
