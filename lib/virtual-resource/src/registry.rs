//! Mount registration.
//!
//! Every change to the set of mounts produces a fresh immutable
//! [`MountTree`]. Sessions keep the snapshot they were opened with, so
//! mounting or unmounting never changes what a live session sees.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::combined::CombinedProvider;
use crate::config::FederationConfig;
use crate::credentials::Credentials;
use crate::handle::{HandleId, ProviderHandle, ProviderInfo};
use crate::provider::ResourceProvider;
use crate::security::AccessSecurity;
use crate::tree::MountTree;
use crate::ResourceResult;

#[derive(Default)]
struct Mounts {
    /// Registration order; the tree lets later entries win on equal paths.
    handles: Vec<Arc<ProviderHandle>>,
    tree: Arc<MountTree>,
}

#[derive(Default)]
pub struct ProviderRegistry {
    mounts: RwLock<Mounts>,
    security: RwLock<AccessSecurity>,
    config: RwLock<Arc<FederationConfig>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FederationConfig) -> Self {
        let registry = Self::new();
        registry.set_config(config);
        registry
    }

    pub fn set_config(&self, config: FederationConfig) {
        *self.config.write() = Arc::new(config);
    }

    pub fn config(&self) -> Arc<FederationConfig> {
        self.config.read().clone()
    }

    pub fn set_security(&self, security: AccessSecurity) {
        *self.security.write() = security;
    }

    /// Mount `provider` as described by `info`.
    pub fn register(
        &self,
        info: ProviderInfo,
        provider: Arc<dyn ResourceProvider>,
    ) -> ResourceResult<Arc<ProviderHandle>> {
        let handle = ProviderHandle::new(info, provider)?;
        self.register_handle(handle.clone());
        Ok(handle)
    }

    pub fn register_handle(&self, handle: Arc<ProviderHandle>) {
        tracing::debug!(
            path = %handle.path(),
            provider = %handle.name(),
            "Registering provider",
        );
        let mut mounts = self.mounts.write();
        mounts.handles.push(handle);
        mounts.tree = Arc::new(MountTree::new(mounts.handles.iter().cloned()));
    }

    pub fn unregister(&self, id: HandleId) -> Option<Arc<ProviderHandle>> {
        let mut mounts = self.mounts.write();
        let index = mounts.handles.iter().position(|handle| handle.id() == id)?;
        let removed = mounts.handles.remove(index);
        mounts.tree = Arc::new(MountTree::new(mounts.handles.iter().cloned()));
        tracing::debug!(
            path = %removed.path(),
            provider = %removed.name(),
            "Unregistered provider",
        );
        Some(removed)
    }

    /// Registered handles in registration order.
    pub fn handles(&self) -> Vec<Arc<ProviderHandle>> {
        self.mounts.read().handles.clone()
    }

    /// The current mount tree.
    pub fn tree(&self) -> Arc<MountTree> {
        self.mounts.read().tree.clone()
    }

    /// Open a session against the current mounts.
    pub fn open(&self, credentials: Credentials) -> ResourceResult<CombinedProvider> {
        let security = self.security.read().clone();
        CombinedProvider::open(self.tree(), credentials, security, self.config())
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mounts = self.mounts.read();
        f.debug_struct("ProviderRegistry")
            .field("handles", &mounts.handles)
            .field("config", &self.config.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::MemResourceProvider;

    #[test]
    fn sessions_keep_their_snapshot() {
        let registry = ProviderRegistry::new();
        registry
            .register(
                ProviderInfo::new("/"),
                Arc::new(MemResourceProvider::new("root").with_resource("/a", "t")),
            )
            .expect("register should succeed");

        let session = registry.open(Credentials::anonymous()).expect("open should succeed");
        let late = registry
            .register(
                ProviderInfo::new("/late"),
                Arc::new(MemResourceProvider::new("late").with_resource("/late", "t")),
            )
            .expect("register should succeed");

        assert_eq!(session.tree().handles().len(), 1);
        assert_eq!(registry.tree().handles().len(), 2);

        registry.unregister(late.id()).expect("handle should be registered");
        assert_eq!(registry.tree().handles().len(), 1);
        assert!(registry.unregister(late.id()).is_none());
    }

    #[test]
    fn later_registration_wins_on_same_path() {
        let registry = ProviderRegistry::new();
        registry
            .register(ProviderInfo::new("/a"), Arc::new(MemResourceProvider::new("old")))
            .expect("register should succeed");
        let newer = registry
            .register(ProviderInfo::new("/a"), Arc::new(MemResourceProvider::new("new")))
            .expect("register should succeed");

        let tree = registry.tree();
        assert_eq!(tree.best_matching_handle("/a").map(|h| h.id()), Some(newer.id()));

        registry.unregister(newer.id());
        let tree = registry.tree();
        assert_eq!(
            tree.best_matching_handle("/a").map(|h| h.provider().name().to_string()),
            Some("old".to_string())
        );
    }

    #[test]
    fn config_is_handed_to_sessions() {
        let registry = ProviderRegistry::with_config(FederationConfig {
            copy_fallback: false,
            ..FederationConfig::default()
        });
        let session = registry.open(Credentials::anonymous()).expect("open should succeed");
        assert!(!session.config().copy_fallback);
    }
}
