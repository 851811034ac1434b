//! Provider node properties attached to agreements.

use serde::{Deserialize, Serialize};

/// Properties a provider node advertises on the market.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_tag: Option<String>,
}

impl NodeInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            subnet_tag: None,
        }
    }

    pub fn with_subnet_tag(mut self, subnet_tag: impl Into<String>) -> Self {
        self.subnet_tag = Some(subnet_tag.into());
        self
    }

    /// Name to show in logs; unnamed nodes render as `"<unnamed>"`.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}
