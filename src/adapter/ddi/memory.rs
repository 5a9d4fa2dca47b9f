use super::client::{
    DdiClient, RawIpAddress, RawNetwork, RawNetworkContainer, RawVlan, RawVlanView,
};
use crate::adapter::AdapterError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tokio::sync::Mutex;

/// Exported appliance contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DdiDump {
    #[serde(default)]
    pub networks: Vec<RawNetwork>,
    #[serde(default)]
    pub network_containers: Vec<RawNetworkContainer>,
    #[serde(default)]
    pub ip_addresses: Vec<RawIpAddress>,
    #[serde(default)]
    pub vlan_views: Vec<RawVlanView>,
    #[serde(default)]
    pub vlans: Vec<RawVlan>,
}

/// [`DdiClient`] serving a [`DdiDump`] held in memory
#[derive(Debug, Default)]
pub struct MemoryDdiClient {
    dump: Mutex<DdiDump>,
}

impl MemoryDdiClient {
    pub fn new(dump: DdiDump) -> Self {
        Self {
            dump: Mutex::new(dump),
        }
    }

    pub async fn from_file(path: &Path) -> Result<Self, AdapterError> {
        let content = fs::read_to_string(path).await?;
        let dump: DdiDump = serde_json::from_str(&content)?;
        Ok(Self::new(dump))
    }

    /// Write the dump atomically (temp file + rename).
    pub async fn save(&self, path: &Path) -> Result<(), AdapterError> {
        let dump = self.dump.lock().await;
        let temp_path = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(&*dump)?;
        fs::write(&temp_path, &content).await?;
        fs::rename(&temp_path, path).await?;
        Ok(())
    }

    pub async fn dump(&self) -> DdiDump {
        self.dump.lock().await.clone()
    }
}

fn missing(what: &str, network: &str) -> AdapterError {
    AdapterError::NotFound(format!("{} {}", what, network))
}

#[async_trait]
impl DdiClient for MemoryDdiClient {
    async fn get_networks(&self) -> Result<Vec<RawNetwork>, AdapterError> {
        Ok(self.dump.lock().await.networks.clone())
    }

    async fn get_network_containers(&self) -> Result<Vec<RawNetworkContainer>, AdapterError> {
        Ok(self.dump.lock().await.network_containers.clone())
    }

    async fn get_ipv4_addresses(&self, network: &str) -> Result<Vec<RawIpAddress>, AdapterError> {
        let dump = self.dump.lock().await;
        Ok(dump
            .ip_addresses
            .iter()
            .filter(|ip| ip.network == network)
            .cloned()
            .collect())
    }

    async fn get_vlan_views(&self) -> Result<Vec<RawVlanView>, AdapterError> {
        Ok(self.dump.lock().await.vlan_views.clone())
    }

    async fn get_vlans(&self) -> Result<Vec<RawVlan>, AdapterError> {
        Ok(self.dump.lock().await.vlans.clone())
    }

    async fn create_network(&self, mut network: RawNetwork) -> Result<RawNetwork, AdapterError> {
        let mut dump = self.dump.lock().await;
        if dump.networks.iter().any(|n| n.network == network.network) {
            return Err(AdapterError::Client(format!(
                "network {} already exists",
                network.network
            )));
        }
        if network.reference.is_empty() {
            network.reference = format!("network/ssot:{}/default", network.network);
        }
        dump.networks.push(network.clone());
        Ok(network)
    }

    async fn update_network(&self, network: RawNetwork) -> Result<RawNetwork, AdapterError> {
        let mut dump = self.dump.lock().await;
        let existing = dump
            .networks
            .iter_mut()
            .find(|n| n.network == network.network)
            .ok_or_else(|| missing("network", &network.network))?;
        *existing = network.clone();
        Ok(network)
    }

    async fn delete_network(&self, network: &str) -> Result<(), AdapterError> {
        let mut dump = self.dump.lock().await;
        let idx = dump
            .networks
            .iter()
            .position(|n| n.network == network)
            .ok_or_else(|| missing("network", network))?;
        dump.networks.remove(idx);
        Ok(())
    }

    async fn create_network_container(
        &self,
        mut container: RawNetworkContainer,
    ) -> Result<RawNetworkContainer, AdapterError> {
        let mut dump = self.dump.lock().await;
        if dump
            .network_containers
            .iter()
            .any(|c| c.network == container.network)
        {
            return Err(AdapterError::Client(format!(
                "network container {} already exists",
                container.network
            )));
        }
        if container.reference.is_empty() {
            container.reference = format!("networkcontainer/ssot:{}/default", container.network);
        }
        dump.network_containers.push(container.clone());
        Ok(container)
    }

    async fn update_network_container(
        &self,
        container: RawNetworkContainer,
    ) -> Result<RawNetworkContainer, AdapterError> {
        let mut dump = self.dump.lock().await;
        let existing = dump
            .network_containers
            .iter_mut()
            .find(|c| c.network == container.network)
            .ok_or_else(|| missing("network container", &container.network))?;
        *existing = container.clone();
        Ok(container)
    }

    async fn delete_network_container(&self, network: &str) -> Result<(), AdapterError> {
        let mut dump = self.dump.lock().await;
        let idx = dump
            .network_containers
            .iter()
            .position(|c| c.network == network)
            .ok_or_else(|| missing("network container", network))?;
        dump.network_containers.remove(idx);
        Ok(())
    }
}
