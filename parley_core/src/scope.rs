//! Conversation scopes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies either a whole network (no name) or one channel within a network.
///
/// Scopes key the per-conversation event logs and state records, and are the
/// unit of subscription filtering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Scope {
    /// The network-wide scope for `network`
    pub fn network(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            name: None,
        }
    }

    /// A named scope within `network`. An empty name denotes the network itself.
    pub fn channel(network: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            network: network.into(),
            name: if name.is_empty() { None } else { Some(name) },
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_network(&self) -> bool {
        self.name.is_none()
    }

    /// The scope of the network this scope belongs to
    pub fn network_scope(&self) -> Scope {
        Scope::network(self.network.clone())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}/{}", self.network, name),
            None => f.write_str(&self.network),
        }
    }
}
