//! HaaS driver-info keys and per-node connection parameters.

use serde::Serialize;
use serde_json::Value;

use crate::providers::traits::{DriverInfo, PowerError, Property};

// ============================================================================
// Driver-info keys
// ============================================================================

/// HaaS API base URL.
pub const HAAS_ENDPOINT: &str = "haas_endpoint";
/// Node name as registered with HaaS.
pub const HAAS_NODENAME: &str = "haas_nodename";
/// HaaS user.
pub const HAAS_USERNAME: &str = "haas_username";
/// HaaS password.
pub const HAAS_PASSWORD: &str = "haas_password";
/// HaaS project owning the node.
pub const HAAS_PROJECTNAME: &str = "haas_projectname";

/// Every key the driver reads, required keys first in declaration order.
pub const COMMON_PROPERTIES: &[Property] = &[
    Property {
        name: HAAS_ENDPOINT,
        description: "Endpoint for HaaS. Required.",
        required: true,
    },
    Property {
        name: HAAS_NODENAME,
        description: "Should be same as registered with HaaS. Required.",
        required: true,
    },
    Property {
        name: HAAS_USERNAME,
        description: "HaaS username to access HaaS.",
        required: false,
    },
    Property {
        name: HAAS_PASSWORD,
        description: "HaaS password required to access HaaS.",
        required: false,
    },
    Property {
        name: HAAS_PROJECTNAME,
        description: "Project in HaaS to which nodes belong.",
        required: false,
    },
];

/// Keys that must be present and non-empty.
pub fn required_properties() -> impl Iterator<Item = &'static Property> {
    COMMON_PROPERTIES.iter().filter(|p| p.required)
}

/// Keys that may be omitted.
pub fn optional_properties() -> impl Iterator<Item = &'static Property> {
    COMMON_PROPERTIES.iter().filter(|p| !p.required)
}

// ============================================================================
// Credentials
// ============================================================================

/// Connection parameters for one node.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct NodeCredentials {
    /// HaaS API base URL.
    pub endpoint: String,
    /// Node name as registered with HaaS.
    pub node_name: String,
    /// HaaS user.
    pub username: Option<String>,
    /// HaaS password.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// HaaS project.
    pub project_name: Option<String>,
}

impl std::fmt::Debug for NodeCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeCredentials")
            .field("endpoint", &self.endpoint)
            .field("node_name", &self.node_name)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("project_name", &self.project_name)
            .finish()
    }
}

/// Whether a driver-info value counts as unset.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// String form of a set driver-info value.
fn lookup(info: &DriverInfo, key: &str) -> Option<String> {
    match info.get(key) {
        Some(v) if is_falsy(v) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(v) => Some(v.to_string()),
        None => None,
    }
}

/// Resolve a node's driver-info into connection parameters.
///
/// # Errors
/// Returns [`PowerError::MissingConfiguration`] listing every required key
/// that is absent or empty, in declaration order.
pub fn resolve(info: &DriverInfo) -> Result<NodeCredentials, PowerError> {
    let missing: Vec<String> = required_properties()
        .filter(|p| lookup(info, p.name).is_none())
        .map(|p| p.name.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(PowerError::MissingConfiguration(missing));
    }

    Ok(NodeCredentials {
        endpoint: lookup(info, HAAS_ENDPOINT).unwrap_or_default(),
        node_name: lookup(info, HAAS_NODENAME).unwrap_or_default(),
        username: lookup(info, HAAS_USERNAME),
        password: lookup(info, HAAS_PASSWORD),
        project_name: lookup(info, HAAS_PROJECTNAME),
    })
}
