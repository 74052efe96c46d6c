//! Best-effort discovery of the network granted access to new shares.
//!
//! The node's instance id is read from the cloud-init data directory, its
//! first attached interface gives a subnet, and the subnet names the VPC.
//! Every failure is logged and yields an empty id; the provisioner still
//! starts and the control plane decides what an empty target means.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::config::Config;

#[derive(Debug, Deserialize)]
struct InterfaceList {
    #[serde(rename = "interfaceAttachments", default)]
    interface_attachments: Vec<InterfaceAttachment>,
}

#[derive(Debug, Deserialize)]
struct InterfaceAttachment {
    #[serde(default)]
    net_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubnetEnvelope {
    subnet: Subnet,
}

#[derive(Debug, Deserialize)]
struct Subnet {
    #[serde(default)]
    vpc_id: Option<String>,
}

/// Resolve the fallback network id. Never fails.
pub async fn resolve_vpc_id(config: &Config, http_client: &reqwest::Client) -> String {
    if !config.network.vpc_id.is_empty() {
        info!(vpc_id = %config.network.vpc_id, "Using configured vpc id");
        return config.network.vpc_id.clone();
    }

    match discover_vpc_id(config, http_client).await {
        Ok(vpc_id) => {
            info!(vpc_id = %vpc_id, "Discovered vpc id");
            vpc_id
        }
        Err(e) => {
            info!(error = %e, "Failed to discover vpc id");
            String::new()
        }
    }
}

async fn discover_vpc_id(config: &Config, http_client: &reqwest::Client) -> Result<String> {
    let instance_id = read_instance_id(Path::new(&config.network.instance_id_file))?;
    info!(instance_id = %instance_id, "Got instance id");

    if config.cloud.compute_endpoint.is_empty() || config.cloud.network_endpoint.is_empty() {
        return Err(anyhow!("compute and network endpoints are required for vpc discovery"));
    }
    let token = config.cloud.auth_token()?;

    let url = format!(
        "{}/servers/{}/os-interface",
        config.cloud.compute_endpoint.trim_end_matches('/'),
        instance_id
    );
    let interfaces: InterfaceList = get_json(http_client, &url, &token).await?;
    let subnet_id = first_net_id(&interfaces).ok_or_else(|| anyhow!("no attached interface has a network id"))?;
    info!(subnet_id = %subnet_id, "Got subnet id");

    let url = format!(
        "{}/subnets/{}",
        config.cloud.network_endpoint.trim_end_matches('/'),
        subnet_id
    );
    let envelope: SubnetEnvelope = get_json(http_client, &url, &token).await?;

    envelope
        .subnet
        .vpc_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| anyhow!("subnet {} has no vpc id", subnet_id))
}

/// Read and trim the instance id file.
pub fn read_instance_id(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to get instance id from file: {}", path.display()))?;

    let instance_id = raw.trim().to_string();
    if instance_id.is_empty() {
        return Err(anyhow!("instance id file {} is empty", path.display()));
    }
    Ok(instance_id)
}

fn first_net_id(interfaces: &InterfaceList) -> Option<String> {
    interfaces
        .interface_attachments
        .iter()
        .filter_map(|intf| intf.net_id.as_deref())
        .find(|id| !id.is_empty())
        .map(str::to_string)
}

async fn get_json<T: serde::de::DeserializeOwned>(
    http_client: &reqwest::Client,
    url: &str,
    token: &str,
) -> Result<T> {
    let response = http_client
        .get(url)
        .header("X-Auth-Token", token)
        .header("Accept", "application/json")
        .send()
        .await
        .with_context(|| format!("request to {} failed", url))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(anyhow!("{} returned {}: {}", url, status, body));
    }

    response
        .json::<T>()
        .await
        .with_context(|| format!("unexpected response from {}", url))
}
