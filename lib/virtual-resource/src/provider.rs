//! The contract every mounted storage provider implements.
//!
//! Providers are shared by all sessions. Anything that is specific to one
//! session (a login token, a transaction) lives in the [`ProviderState`]
//! returned by [`ResourceProvider::authenticate`] and is passed back on every
//! call through the [`ResolveContext`].

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use serde_json::Value;

use crate::credentials::Credentials;
use crate::resource::{Parameters, Resource, ValueMap};
use crate::{ResourceError, ResourceResult, path};

/// Lazily evaluated sequence of resources produced by a provider.
pub type ResourceIter = Box<dyn Iterator<Item = Resource>>;

/// Lazily evaluated sequence of query rows produced by a provider.
pub type ValueMapIter = Box<dyn Iterator<Item = ValueMap>>;

bitflags! {
    /// Static capabilities declared for a mount.
    pub struct ProviderFlags: u32 {
        const MODIFIABLE = 1 << 0;
        const REFRESHABLE = 1 << 1;
        const ATTRIBUTABLE = 1 << 2;
        const ADAPTABLE = 1 << 3;
        const QUERYABLE = 1 << 4;
        /// Results must pass through the access-security decorator.
        const ACCESS_SECURITY = 1 << 5;
    }
}

impl Default for ProviderFlags {
    fn default() -> Self {
        ProviderFlags::empty()
    }
}

/// How a mount wants sessions to authenticate against it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AuthType {
    /// The provider is used without logging in.
    #[default]
    None,
    /// Log in on first use within a session.
    Lazy,
    /// Log in when the session is opened; the session fails if this fails.
    Required,
}

/// Opaque per-session provider state.
#[derive(Clone, Default)]
pub struct ProviderState(Option<Arc<dyn Any + Send + Sync>>);

impl ProviderState {
    pub fn empty() -> Self {
        Self(None)
    }

    pub fn new<T>(state: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self(Some(Arc::new(state)))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_deref().and_then(|state| state.downcast_ref::<T>())
    }
}

impl fmt::Debug for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(_) => f.write_str("ProviderState(..)"),
            None => f.write_str("ProviderState(empty)"),
        }
    }
}

/// Everything a provider gets to know about the calling session.
#[derive(Clone, Copy, Debug)]
pub struct ResolveContext<'a> {
    pub state: &'a ProviderState,
    pub credentials: &'a Credentials,
    pub parameters: Option<&'a Parameters>,
}

impl<'a> ResolveContext<'a> {
    pub fn new(state: &'a ProviderState, credentials: &'a Credentials) -> Self {
        Self {
            state,
            credentials,
            parameters: None,
        }
    }

    pub fn with_parameters(mut self, parameters: Option<&'a Parameters>) -> Self {
        self.parameters = parameters;
        self
    }
}

/// A storage backend mounted into the combined tree.
///
/// Only [`get_resource`](Self::get_resource) and
/// [`list_children`](Self::list_children) are mandatory; every other method
/// has a conservative default so read-only providers stay small.
pub trait ResourceProvider: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn authenticate(&self, _credentials: &Credentials) -> ResourceResult<ProviderState> {
        Ok(ProviderState::empty())
    }

    fn logout(&self, _state: &ProviderState) {}

    fn refresh(&self, _ctx: &ResolveContext<'_>) {}

    fn is_live(&self, _ctx: &ResolveContext<'_>) -> bool {
        true
    }

    fn get_resource(
        &self,
        ctx: &ResolveContext<'_>,
        path: &str,
        parent: Option<&Resource>,
    ) -> ResourceResult<Option<Resource>>;

    fn get_parent(
        &self,
        ctx: &ResolveContext<'_>,
        child: &Resource,
    ) -> ResourceResult<Option<Resource>> {
        match path::parent(child.path()) {
            Some(parent_path) => self.get_resource(ctx, parent_path, None),
            None => Ok(None),
        }
    }

    /// Children of `parent`, or `None` if the provider has no opinion about it.
    fn list_children(
        &self,
        ctx: &ResolveContext<'_>,
        parent: &Resource,
    ) -> ResourceResult<Option<ResourceIter>>;

    fn attribute_names(&self, _ctx: &ResolveContext<'_>) -> Vec<String> {
        Vec::new()
    }

    fn attribute(&self, _ctx: &ResolveContext<'_>, _name: &str) -> Option<Value> {
        None
    }

    fn create(
        &self,
        _ctx: &ResolveContext<'_>,
        path: &str,
        _properties: &ValueMap,
    ) -> ResourceResult<Resource> {
        Err(ResourceError::unsupported("provider.create", path))
    }

    fn delete(&self, _ctx: &ResolveContext<'_>, resource: &Resource) -> ResourceResult<()> {
        Err(ResourceError::unsupported("provider.delete", resource.path()))
    }

    fn revert(&self, _ctx: &ResolveContext<'_>) {}

    fn commit(&self, _ctx: &ResolveContext<'_>) -> ResourceResult<()> {
        Ok(())
    }

    fn has_changes(&self, _ctx: &ResolveContext<'_>) -> bool {
        false
    }

    fn supported_languages(&self, _ctx: &ResolveContext<'_>) -> Vec<String> {
        Vec::new()
    }

    fn find_resources(
        &self,
        _ctx: &ResolveContext<'_>,
        _query: &str,
        _language: &str,
    ) -> ResourceResult<ResourceIter> {
        Ok(Box::new(std::iter::empty()))
    }

    fn query_resources(
        &self,
        _ctx: &ResolveContext<'_>,
        _query: &str,
        _language: &str,
    ) -> ResourceResult<ValueMapIter> {
        Ok(Box::new(std::iter::empty()))
    }

    /// Adapt the provider to the capability identified by `target`.
    ///
    /// The returned value must downcast to the type behind `target`.
    fn adapt_to(
        &self,
        _ctx: &ResolveContext<'_>,
        _target: TypeId,
    ) -> Option<Arc<dyn Any + Send + Sync>> {
        None
    }

    /// Copy `src` beneath `dst` in one step. `Ok(false)` means the provider
    /// does not support it and the caller has to fall back.
    fn copy(&self, _ctx: &ResolveContext<'_>, _src: &str, _dst: &str) -> ResourceResult<bool> {
        Ok(false)
    }

    /// Move `src` beneath `dst` in one step, see [`copy`](Self::copy).
    fn move_resource(
        &self,
        _ctx: &ResolveContext<'_>,
        _src: &str,
        _dst: &str,
    ) -> ResourceResult<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Token(u32);

    #[test]
    fn provider_state_downcasts_to_its_own_type() {
        let state = ProviderState::new(Token(7));
        assert_eq!(state.downcast_ref::<Token>(), Some(&Token(7)));
        assert!(state.downcast_ref::<String>().is_none());
        assert!(ProviderState::empty().is_empty());
    }

    struct ReadOnly;

    impl ResourceProvider for ReadOnly {
        fn name(&self) -> &str {
            "read-only"
        }

        fn get_resource(
            &self,
            _ctx: &ResolveContext<'_>,
            path: &str,
            _parent: Option<&Resource>,
        ) -> ResourceResult<Option<Resource>> {
            Ok(Some(Resource::new(path, "folder")))
        }

        fn list_children(
            &self,
            _ctx: &ResolveContext<'_>,
            _parent: &Resource,
        ) -> ResourceResult<Option<ResourceIter>> {
            Ok(None)
        }
    }

    #[test]
    fn writes_are_unsupported_by_default() {
        let state = ProviderState::empty();
        let creds = Credentials::anonymous();
        let ctx = ResolveContext::new(&state, &creds);

        let err = ReadOnly
            .create(&ctx, "/a", &ValueMap::new())
            .expect_err("default create should refuse");
        assert_eq!(err.kind(), crate::ResourceErrorKind::Unsupported);
        let err = ReadOnly
            .delete(&ctx, &Resource::new("/a", "folder"))
            .expect_err("default delete should refuse");
        assert_eq!(err.kind(), crate::ResourceErrorKind::Unsupported);
        assert!(!ReadOnly.copy(&ctx, "/a", "/b").expect("copy should answer"));
    }

    #[test]
    fn flags_combine() {
        let flags = ProviderFlags::MODIFIABLE | ProviderFlags::QUERYABLE;
        assert!(flags.contains(ProviderFlags::MODIFIABLE));
        assert!(!flags.contains(ProviderFlags::REFRESHABLE));
        assert_eq!(ProviderFlags::default(), ProviderFlags::empty());
    }
}
