//! Providers bound to one session's login state.

use std::any::{Any, TypeId};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;

use crate::credentials::Credentials;
use crate::handle::ProviderHandle;
use crate::provider::{ProviderState, ResolveContext, ResourceIter, ValueMapIter};
use crate::resource::{Parameters, Resource, ValueMap};
use crate::ResourceResult;

/// Uniform resource operations over one provider within one session.
///
/// Implementations already know the session state, so unlike
/// [`ResourceProvider`](crate::ResourceProvider) none of these methods take a
/// [`ResolveContext`].
pub trait StatefulProvider: Send + Sync {
    fn handle(&self) -> &Arc<ProviderHandle>;

    fn logout(&self);

    fn refresh(&self);

    fn is_live(&self) -> bool;

    fn get_resource(
        &self,
        path: &str,
        parent: Option<&Resource>,
        parameters: Option<&Parameters>,
    ) -> ResourceResult<Option<Resource>>;

    fn get_parent(&self, child: &Resource) -> ResourceResult<Option<Resource>>;

    fn list_children(&self, parent: &Resource) -> ResourceResult<Option<ResourceIter>>;

    fn attribute_names(&self) -> Vec<String>;

    fn attribute(&self, name: &str) -> Option<Value>;

    /// `Ok(None)` means that nothing was created because the session is not
    /// allowed to.
    fn create(&self, path: &str, properties: &ValueMap) -> ResourceResult<Option<Resource>>;

    fn delete(&self, resource: &Resource) -> ResourceResult<()>;

    fn revert(&self);

    fn commit(&self) -> ResourceResult<()>;

    fn has_changes(&self) -> bool;

    fn supported_languages(&self) -> Vec<String>;

    fn find_resources(&self, query: &str, language: &str) -> ResourceResult<ResourceIter>;

    fn query_resources(&self, query: &str, language: &str) -> ResourceResult<ValueMapIter>;

    fn adapt_to(&self, target: TypeId) -> Option<Arc<dyn Any + Send + Sync>>;

    fn copy(&self, src: &str, dst: &str) -> ResourceResult<bool>;

    fn move_resource(&self, src: &str, dst: &str) -> ResourceResult<bool>;
}

/// The plain [`StatefulProvider`]: forwards to the provider with the state
/// obtained at login and tags every produced resource with the provider name.
pub struct AuthenticatedProvider {
    handle: Arc<ProviderHandle>,
    state: ProviderState,
    credentials: Arc<Credentials>,
    /// Whether `state` came out of a login that needs a matching logout.
    logged_in: bool,
    logged_out: AtomicBool,
}

impl AuthenticatedProvider {
    /// Wrap a provider that was used without logging in.
    pub fn anonymous(handle: Arc<ProviderHandle>, credentials: Arc<Credentials>) -> Self {
        Self {
            handle,
            state: ProviderState::empty(),
            credentials,
            logged_in: false,
            logged_out: AtomicBool::new(false),
        }
    }

    /// Wrap a provider together with the state its `authenticate` returned.
    pub fn logged_in(
        handle: Arc<ProviderHandle>,
        state: ProviderState,
        credentials: Arc<Credentials>,
    ) -> Self {
        Self {
            handle,
            state,
            credentials,
            logged_in: true,
            logged_out: AtomicBool::new(false),
        }
    }

    fn ctx(&self) -> ResolveContext<'_> {
        ResolveContext::new(&self.state, &self.credentials)
    }

    fn tag(&self, mut resource: Resource) -> Resource {
        if resource.metadata().provider.is_none() {
            resource.metadata_mut().provider = Some(self.handle.provider().name().to_string());
        }
        resource
    }

    fn tag_all(&self, resources: ResourceIter) -> ResourceIter {
        let name = self.handle.provider().name().to_string();
        Box::new(resources.map(move |mut resource| {
            if resource.metadata().provider.is_none() {
                resource.metadata_mut().provider = Some(name.clone());
            }
            resource
        }))
    }
}

impl StatefulProvider for AuthenticatedProvider {
    fn handle(&self) -> &Arc<ProviderHandle> {
        &self.handle
    }

    fn logout(&self) {
        if self.logged_in && !self.logged_out.swap(true, Ordering::AcqRel) {
            tracing::debug!(provider = %self.handle.name(), "Logging out");
            self.handle.provider().logout(&self.state);
        }
    }

    fn refresh(&self) {
        self.handle.provider().refresh(&self.ctx());
    }

    fn is_live(&self) -> bool {
        self.handle.provider().is_live(&self.ctx())
    }

    fn get_resource(
        &self,
        path: &str,
        parent: Option<&Resource>,
        parameters: Option<&Parameters>,
    ) -> ResourceResult<Option<Resource>> {
        let ctx = self.ctx().with_parameters(parameters);
        let resource = self.handle.provider().get_resource(&ctx, path, parent)?;
        Ok(resource.map(|mut resource| {
            if let Some(parameters) = parameters {
                resource.metadata_mut().parameters = parameters.clone();
            }
            self.tag(resource)
        }))
    }

    fn get_parent(&self, child: &Resource) -> ResourceResult<Option<Resource>> {
        let parent = self.handle.provider().get_parent(&self.ctx(), child)?;
        Ok(parent.map(|resource| self.tag(resource)))
    }

    fn list_children(&self, parent: &Resource) -> ResourceResult<Option<ResourceIter>> {
        let children = self.handle.provider().list_children(&self.ctx(), parent)?;
        Ok(children.map(|children| self.tag_all(children)))
    }

    fn attribute_names(&self) -> Vec<String> {
        self.handle.provider().attribute_names(&self.ctx())
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        self.handle.provider().attribute(&self.ctx(), name)
    }

    fn create(&self, path: &str, properties: &ValueMap) -> ResourceResult<Option<Resource>> {
        let created = self.handle.provider().create(&self.ctx(), path, properties)?;
        Ok(Some(self.tag(created)))
    }

    fn delete(&self, resource: &Resource) -> ResourceResult<()> {
        self.handle.provider().delete(&self.ctx(), resource)
    }

    fn revert(&self) {
        self.handle.provider().revert(&self.ctx());
    }

    fn commit(&self) -> ResourceResult<()> {
        self.handle.provider().commit(&self.ctx())
    }

    fn has_changes(&self) -> bool {
        self.handle.provider().has_changes(&self.ctx())
    }

    fn supported_languages(&self) -> Vec<String> {
        self.handle.provider().supported_languages(&self.ctx())
    }

    fn find_resources(&self, query: &str, language: &str) -> ResourceResult<ResourceIter> {
        let found = self
            .handle
            .provider()
            .find_resources(&self.ctx(), query, language)?;
        Ok(self.tag_all(found))
    }

    fn query_resources(&self, query: &str, language: &str) -> ResourceResult<ValueMapIter> {
        self.handle
            .provider()
            .query_resources(&self.ctx(), query, language)
    }

    fn adapt_to(&self, target: TypeId) -> Option<Arc<dyn Any + Send + Sync>> {
        self.handle.provider().adapt_to(&self.ctx(), target)
    }

    fn copy(&self, src: &str, dst: &str) -> ResourceResult<bool> {
        self.handle.provider().copy(&self.ctx(), src, dst)
    }

    fn move_resource(&self, src: &str, dst: &str) -> ResourceResult<bool> {
        self.handle.provider().move_resource(&self.ctx(), src, dst)
    }
}

impl std::fmt::Debug for AuthenticatedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedProvider")
            .field("handle", &self.handle)
            .field("logged_in", &self.logged_in)
            .field("logged_out", &self.logged_out.load(Ordering::Relaxed))
            .finish()
    }
}
