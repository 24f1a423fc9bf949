//! Node inventory file.
//!
//! Stands in for the host's node registry when the driver is driven from
//! the command line: nodes and their last known power state are kept in a
//! YAML file that is rewritten after each power operation.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::providers::{Node, PowerError, PowerState};

/// Errors reading or writing the inventory file.
#[derive(Error, Debug)]
pub enum InventoryError {
    /// Filesystem error.
    #[error("Failed to access inventory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not valid inventory YAML.
    #[error("Failed to parse inventory: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// No node with the given name.
    #[error("Node not found in inventory: {0}")]
    NotFound(String),
}

/// Contents of the inventory file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    /// Registered nodes.
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Last updated timestamp.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Inventory {
    /// Load an inventory, treating a missing file as empty.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self, InventoryError> {
        if !path.exists() {
            debug!(path = %path.display(), "Inventory not found, starting empty");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .await
            .map_err(|source| InventoryError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(serde_yaml::from_str(&contents)?)
    }

    /// Write the inventory, stamping `updated_at`.
    ///
    /// # Errors
    /// Returns error if the file or its parent directory cannot be written.
    pub async fn save(&mut self, path: &Path) -> Result<(), InventoryError> {
        let io_err = |source| InventoryError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        self.updated_at = Some(Utc::now());
        let contents = serde_yaml::to_string(self)?;
        fs::write(path, contents).await.map_err(io_err)?;

        debug!(path = %path.display(), nodes = self.nodes.len(), "Inventory saved");
        Ok(())
    }

    /// Look up a node by name.
    ///
    /// # Errors
    /// Returns [`InventoryError::NotFound`] if no node has that name.
    pub fn node(&self, name: &str) -> Result<&Node, InventoryError> {
        self.nodes
            .iter()
            .find(|n| n.name == name)
            .ok_or_else(|| InventoryError::NotFound(name.to_string()))
    }

    /// Record a node's new power state.
    ///
    /// # Errors
    /// Returns [`InventoryError::NotFound`] if no node has that name.
    pub fn record_power_state(
        &mut self,
        name: &str,
        state: PowerState,
    ) -> Result<(), InventoryError> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.name == name)
            .ok_or_else(|| InventoryError::NotFound(name.to_string()))?;
        node.power_state = state;
        Ok(())
    }

    /// Record the outcome of a power operation that aimed for `target`.
    ///
    /// Success records `target`. A [`PowerError::PowerStateFailure`] leaves
    /// the node in an unknown physical state and records
    /// [`PowerState::Error`]. Failures before any power action was taken
    /// leave the record untouched.
    ///
    /// Returns whether the record changed.
    ///
    /// # Errors
    /// Returns [`InventoryError::NotFound`] if no node has that name.
    pub fn record_outcome(
        &mut self,
        name: &str,
        target: PowerState,
        outcome: &Result<(), PowerError>,
    ) -> Result<bool, InventoryError> {
        match outcome {
            Ok(()) => self.record_power_state(name, target).map(|()| true),
            Err(PowerError::PowerStateFailure(_)) => {
                self.record_power_state(name, PowerState::Error).map(|()| true)
            }
            Err(_) => self.node(name).map(|_| false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
nodes:
  - name: node-01
    power_state: power off
    driver_info:
      haas_endpoint: http://haas.local:5000
      haas_nodename: cisco-27
      haas_projectname: ironic
  - name: node-02
    driver_info: {}
"#;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("haas-inventory-{}", uuid::Uuid::new_v4()))
            .join("inventory.yaml")
    }

    #[test]
    fn test_parse_inventory() {
        let inventory: Inventory = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(inventory.nodes.len(), 2);

        let node = inventory.node("node-01").unwrap();
        assert_eq!(node.power_state, PowerState::Off);
        assert_eq!(node.driver_info["haas_nodename"], "cisco-27");

        let node = inventory.node("node-02").unwrap();
        assert_eq!(node.power_state, PowerState::Unknown);
        assert!(node.driver_info.is_empty());
    }

    #[test]
    fn test_node_not_found() {
        let inventory = Inventory::default();
        assert!(matches!(
            inventory.node("missing"),
            Err(InventoryError::NotFound(ref n)) if n == "missing"
        ));
    }

    #[test]
    fn test_record_power_state() {
        let mut inventory: Inventory = serde_yaml::from_str(SAMPLE).unwrap();
        inventory
            .record_power_state("node-01", PowerState::On)
            .unwrap();
        assert_eq!(inventory.node("node-01").unwrap().power_state, PowerState::On);

        assert!(inventory
            .record_power_state("missing", PowerState::On)
            .is_err());
    }

    #[test]
    fn test_record_outcome() {
        let mut inventory: Inventory = serde_yaml::from_str(SAMPLE).unwrap();

        let changed = inventory
            .record_outcome("node-01", PowerState::On, &Ok(()))
            .unwrap();
        assert!(changed);
        assert_eq!(inventory.node("node-01").unwrap().power_state, PowerState::On);

        let failed = Err(PowerError::PowerStateFailure(PowerState::On));
        let changed = inventory
            .record_outcome("node-01", PowerState::On, &failed)
            .unwrap();
        assert!(changed);
        assert_eq!(inventory.node("node-01").unwrap().power_state, PowerState::Error);

        let rejected = Err(PowerError::MissingConfiguration(vec!["haas_endpoint".into()]));
        let changed = inventory
            .record_outcome("node-02", PowerState::Off, &rejected)
            .unwrap();
        assert!(!changed);
        assert_eq!(inventory.node("node-02").unwrap().power_state, PowerState::Unknown);

        assert!(inventory
            .record_outcome("missing", PowerState::On, &Ok(()))
            .is_err());
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let inventory = Inventory::load(&temp_path()).await.unwrap();
        assert!(inventory.nodes.is_empty());
        assert!(inventory.updated_at.is_none());
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let path = temp_path();
        let mut inventory: Inventory = serde_yaml::from_str(SAMPLE).unwrap();
        inventory
            .record_power_state("node-01", PowerState::On)
            .unwrap();
        inventory.save(&path).await.unwrap();

        let reloaded = Inventory::load(&path).await.unwrap();
        assert!(reloaded.updated_at.is_some());
        assert_eq!(reloaded.node("node-01").unwrap().power_state, PowerState::On);
        assert_eq!(
            reloaded.node("node-01").unwrap().driver_info["haas_endpoint"],
            "http://haas.local:5000"
        );

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}
