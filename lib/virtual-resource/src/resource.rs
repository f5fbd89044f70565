//! Resources as seen by clients of the federation layer.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::path;

/// Key-value property view of a resource.
pub type ValueMap = BTreeMap<String, Value>;

/// Resolution parameters (the `;key=value` part of a request path).
pub type Parameters = BTreeMap<String, String>;

/// Resource type given to every placeholder inserted by the federation layer.
pub const RESOURCE_TYPE_SYNTHETIC: &str = "virtual-resource:synthetic";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    /// Backed by provider data.
    Regular,
    /// Placeholder that only keeps the combined tree walkable.
    Synthetic,
}

/// Resolution metadata attached to a resource.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceMetadata {
    pub resolution_path: Option<String>,
    pub parameters: Parameters,
    /// Name of the provider that produced the resource.
    pub provider: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Resource {
    path: String,
    resource_type: String,
    kind: ResourceKind,
    properties: ValueMap,
    metadata: ResourceMetadata,
}

impl Resource {
    pub fn new(path: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            resource_type: resource_type.into(),
            kind: ResourceKind::Regular,
            properties: ValueMap::new(),
            metadata: ResourceMetadata::default(),
        }
    }

    pub fn synthetic(path: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::Synthetic,
            ..Self::new(path, RESOURCE_TYPE_SYNTHETIC)
        }
    }

    pub fn with_properties(mut self, properties: ValueMap) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        path::name(&self.path)
    }

    pub fn parent_path(&self) -> Option<&str> {
        path::parent(&self.path)
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn is_synthetic(&self) -> bool {
        self.kind == ResourceKind::Synthetic
    }

    pub fn properties(&self) -> &ValueMap {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut ValueMap {
        &mut self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn metadata(&self) -> &ResourceMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut ResourceMetadata {
        &mut self.metadata
    }
}
