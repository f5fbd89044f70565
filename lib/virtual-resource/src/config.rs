//! Session options shared by every session opened from one registry.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::credentials::PASSWORD_ATTRIBUTE;
use crate::ResourceResult;

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
#[serde(rename_all = "kebab-case", default)]
pub struct FederationConfig {
    /// Attribute names that sessions never expose.
    pub forbidden_attributes: Vec<String>,
    /// Log in to every `required` provider when a session is opened.
    pub authenticate_required_on_open: bool,
    /// Recreate resources one by one when a copy or move cannot be handed to
    /// a single provider.
    pub copy_fallback: bool,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            forbidden_attributes: vec![PASSWORD_ATTRIBUTE.to_string()],
            authenticate_required_on_open: true,
            copy_fallback: true,
        }
    }
}

impl FederationConfig {
    pub fn from_toml_str(data: &str) -> ResourceResult<Self> {
        let config = toml::from_str(data)?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> ResourceResult<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_toml_str(&data)
    }

    pub fn is_forbidden_attribute(&self, name: &str) -> bool {
        self.forbidden_attributes.iter().any(|forbidden| forbidden == name)
    }
}
