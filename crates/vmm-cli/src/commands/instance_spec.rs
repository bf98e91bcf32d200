use std::collections::HashMap;

use anyhow::{bail, Result};

use vmm_models::{DiskSpec, InstanceSpec, NicSpec};

/// Shared by `instantiate` and `prep-receive`: both post an `InstanceSpec`
/// built from the same `--disk`/`--nic`/`--hint` flag grammar.
pub fn build(
    memory_mb: u64,
    cores: u32,
    disks: &[String],
    nics: &[String],
    hints: &[String],
) -> Result<InstanceSpec> {
    Ok(InstanceSpec {
        memory_mb,
        cores,
        disks: disks.iter().map(|s| parse_disk(s)).collect::<Result<_>>()?,
        nics: nics.iter().map(|s| parse_nic(s)).collect::<Result<_>>()?,
        hints: hints
            .iter()
            .map(|s| parse_hint(s))
            .collect::<Result<HashMap<_, _>>>()?,
    })
}

/// `uri:persistent`, e.g. `images/foo.img:true`.
fn parse_disk(spec: &str) -> Result<DiskSpec> {
    let (uri, persistent) = match spec.rsplit_once(':') {
        Some((uri, flag)) => (uri, flag),
        None => bail!("disk spec '{spec}' must be 'uri:persistent'"),
    };
    Ok(DiskSpec {
        uri: uri.to_string(),
        persistent: persistent.parse().map_err(|_| {
            anyhow::anyhow!("disk spec '{spec}': persistent flag must be true/false")
        })?,
    })
}

/// `mac:vlan`, e.g. `52:54:00:12:34:56:7`.
fn parse_nic(spec: &str) -> Result<NicSpec> {
    let (mac, network) = match spec.rsplit_once(':') {
        Some((mac, network)) => (mac, network),
        None => bail!("nic spec '{spec}' must be 'mac:vlan'"),
    };
    Ok(NicSpec {
        mac: mac.to_string(),
        network: network
            .parse()
            .map_err(|_| anyhow::anyhow!("nic spec '{spec}': vlan must be an integer"))?,
    })
}

/// `key=value`.
fn parse_hint(spec: &str) -> Result<(String, String)> {
    match spec.split_once('=') {
        Some((key, value)) => Ok((key.to_string(), value.to_string())),
        None => bail!("hint '{spec}' must be 'key=value'"),
    }
}
