use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Configuration for a [`crate::Bakery`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BakeryConfig {
    /// Service name to origin URL, used to pick the storage key for a request
    pub services: BTreeMap<String, String>,

    /// Whether challenges are answered; when `false` they are surfaced as
    /// [`crate::BakeryError::DischargeDisabled`]
    pub discharge: bool,
}

impl Default for BakeryConfig {
    fn default() -> Self {
        Self {
            services: BTreeMap::new(),
            discharge: true,
        }
    }
}

impl BakeryConfig {
    /// Register the origin of a named service.
    pub fn with_service(mut self, name: impl Into<String>, origin: impl Into<String>) -> Self {
        self.services.insert(name.into(), origin.into());
        self
    }

    /// Enable or disable answering challenges.
    pub fn with_discharge(mut self, discharge: bool) -> Self {
        self.discharge = discharge;
        self
    }
}
