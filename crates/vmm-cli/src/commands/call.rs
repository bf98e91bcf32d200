use anyhow::Result;

use crate::client::Client;
use vmm_models::{VmmCallRequest, VmmCallResponse};

/// Passes `arg` straight through to `vmmSpecificCall`: the operator strings
/// `startvnc`, `stopvnc`, `changecdrom:{iso}`, `startconsole`.
pub async fn execute(client: &Client, vm_id: i32, arg: String) -> Result<()> {
    let response: VmmCallResponse = client
        .post(&format!("/instances/{vm_id}/call"), &VmmCallRequest { arg })
        .await?;
    println!("{}", response.result);
    Ok(())
}
