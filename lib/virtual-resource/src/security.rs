//! Access-security checks and the decorator that applies them.
//!
//! Two [`ResourceAccessSecurity`] instances may be active for a mount: one
//! scoped to the provider and one scoped to the whole application. Reads go
//! through the provider-scoped check first and then the application-scoped
//! one; either may withhold or replace the resource.

use std::any::{Any, TypeId};
use std::sync::Arc;

use serde_json::Value;

use crate::credentials::Credentials;
use crate::handle::ProviderHandle;
use crate::provider::{ResourceIter, ValueMapIter};
use crate::resource::{Parameters, Resource, ValueMap};
use crate::stateful::StatefulProvider;
use crate::{ResourceError, ResourceErrorKind, ResourceResult};

/// Access-control policy consulted by the security decorator.
///
/// Every method defaults to "allowed" so policies only implement the checks
/// they care about.
pub trait ResourceAccessSecurity: Send + Sync {
    /// The resource as the session may see it, or `None` if it must stay
    /// hidden.
    fn readable_resource(&self, resource: Resource) -> Option<Resource> {
        Some(resource)
    }

    fn can_create(&self, _path: &str, _credentials: &Credentials) -> bool {
        true
    }

    fn can_delete(&self, _resource: &Resource) -> bool {
        true
    }

    fn transform_query(
        &self,
        query: &str,
        _language: &str,
        _credentials: &Credentials,
    ) -> ResourceResult<String> {
        Ok(query.to_string())
    }
}

/// Pair of optional security scopes.
#[derive(Clone, Default)]
pub struct AccessSecurity {
    provider: Option<Arc<dyn ResourceAccessSecurity>>,
    application: Option<Arc<dyn ResourceAccessSecurity>>,
}

impl AccessSecurity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider_scope(mut self, security: Arc<dyn ResourceAccessSecurity>) -> Self {
        self.provider = Some(security);
        self
    }

    pub fn with_application_scope(mut self, security: Arc<dyn ResourceAccessSecurity>) -> Self {
        self.application = Some(security);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.provider.is_none() && self.application.is_none()
    }

    fn scopes(&self) -> impl Iterator<Item = &Arc<dyn ResourceAccessSecurity>> {
        self.provider.iter().chain(self.application.iter())
    }

    pub fn readable(&self, resource: Resource) -> Option<Resource> {
        self.scopes()
            .try_fold(resource, |resource, scope| scope.readable_resource(resource))
    }

    pub fn can_create(&self, path: &str, credentials: &Credentials) -> bool {
        self.scopes().all(|scope| scope.can_create(path, credentials))
    }

    pub fn can_delete(&self, resource: &Resource) -> bool {
        self.scopes().all(|scope| scope.can_delete(resource))
    }

    pub fn transform_query(
        &self,
        query: &str,
        language: &str,
        credentials: &Credentials,
    ) -> ResourceResult<String> {
        self.scopes().try_fold(query.to_string(), |query, scope| {
            scope.transform_query(&query, language, credentials)
        })
    }

    fn filter(&self, resources: ResourceIter) -> ResourceIter {
        let security = self.clone();
        Box::new(resources.filter_map(move |resource| security.readable(resource)))
    }
}

impl std::fmt::Debug for AccessSecurity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessSecurity")
            .field("provider", &self.provider.is_some())
            .field("application", &self.application.is_some())
            .finish()
    }
}

/// Decorator running every read and write of the wrapped provider through
/// [`AccessSecurity`].
pub struct SecureProvider {
    inner: Arc<dyn StatefulProvider>,
    security: AccessSecurity,
    credentials: Arc<Credentials>,
}

impl SecureProvider {
    pub fn new(
        inner: Arc<dyn StatefulProvider>,
        security: AccessSecurity,
        credentials: Arc<Credentials>,
    ) -> Self {
        Self {
            inner,
            security,
            credentials,
        }
    }
}

impl StatefulProvider for SecureProvider {
    fn handle(&self) -> &Arc<ProviderHandle> {
        self.inner.handle()
    }

    fn logout(&self) {
        self.inner.logout();
    }

    fn refresh(&self) {
        self.inner.refresh();
    }

    fn is_live(&self) -> bool {
        self.inner.is_live()
    }

    fn get_resource(
        &self,
        path: &str,
        parent: Option<&Resource>,
        parameters: Option<&Parameters>,
    ) -> ResourceResult<Option<Resource>> {
        let resource = self.inner.get_resource(path, parent, parameters)?;
        Ok(resource.and_then(|resource| self.security.readable(resource)))
    }

    fn get_parent(&self, child: &Resource) -> ResourceResult<Option<Resource>> {
        let parent = self.inner.get_parent(child)?;
        Ok(parent.and_then(|resource| self.security.readable(resource)))
    }

    fn list_children(&self, parent: &Resource) -> ResourceResult<Option<ResourceIter>> {
        let children = self.inner.list_children(parent)?;
        Ok(children.map(|children| self.security.filter(children)))
    }

    fn attribute_names(&self) -> Vec<String> {
        self.inner.attribute_names()
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        self.inner.attribute(name)
    }

    fn create(&self, path: &str, properties: &ValueMap) -> ResourceResult<Option<Resource>> {
        if !self.security.can_create(path, &self.credentials) {
            tracing::debug!(path = %path, "Create denied by access security");
            return Ok(None);
        }
        self.inner.create(path, properties)
    }

    fn delete(&self, resource: &Resource) -> ResourceResult<()> {
        if !self.security.can_delete(resource) {
            return Err(ResourceError::new(ResourceErrorKind::AccessDenied, "secure.delete")
                .with_path(resource.path())
                .with_message("delete denied by access security"));
        }
        self.inner.delete(resource)
    }

    fn revert(&self) {
        self.inner.revert();
    }

    fn commit(&self) -> ResourceResult<()> {
        self.inner.commit()
    }

    fn has_changes(&self) -> bool {
        self.inner.has_changes()
    }

    fn supported_languages(&self) -> Vec<String> {
        self.inner.supported_languages()
    }

    fn find_resources(&self, query: &str, language: &str) -> ResourceResult<ResourceIter> {
        let query = self
            .security
            .transform_query(query, language, &self.credentials)?;
        let found = self.inner.find_resources(&query, language)?;
        Ok(self.security.filter(found))
    }

    fn query_resources(&self, query: &str, language: &str) -> ResourceResult<ValueMapIter> {
        let query = self
            .security
            .transform_query(query, language, &self.credentials)?;
        self.inner.query_resources(&query, language)
    }

    fn adapt_to(&self, target: TypeId) -> Option<Arc<dyn Any + Send + Sync>> {
        self.inner.adapt_to(target)
    }

    fn copy(&self, src: &str, dst: &str) -> ResourceResult<bool> {
        self.inner.copy(src, dst)
    }

    fn move_resource(&self, src: &str, dst: &str) -> ResourceResult<bool> {
        self.inner.move_resource(src, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::ProviderInfo;
    use crate::mem::MemResourceProvider;
    use crate::stateful::AuthenticatedProvider;

    struct HideNamed(&'static str);

    impl ResourceAccessSecurity for HideNamed {
        fn readable_resource(&self, resource: Resource) -> Option<Resource> {
            (resource.name() != self.0).then_some(resource)
        }
    }

    struct ReadOnly;

    impl ResourceAccessSecurity for ReadOnly {
        fn can_create(&self, _path: &str, _credentials: &Credentials) -> bool {
            false
        }

        fn can_delete(&self, _resource: &Resource) -> bool {
            false
        }
    }

    struct Suffix(&'static str);

    impl ResourceAccessSecurity for Suffix {
        fn transform_query(
            &self,
            query: &str,
            _language: &str,
            _credentials: &Credentials,
        ) -> ResourceResult<String> {
            Ok(format!("{query}{}", self.0))
        }
    }

    fn secure(mem: MemResourceProvider, security: AccessSecurity) -> SecureProvider {
        let credentials = Arc::new(Credentials::anonymous());
        let handle = ProviderHandle::new(ProviderInfo::new("/"), Arc::new(mem))
            .expect("handle should be created");
        let inner = Arc::new(AuthenticatedProvider::anonymous(handle, credentials.clone()));
        SecureProvider::new(inner, security, credentials)
    }

    #[test]
    fn denied_children_are_skipped_in_order() {
        let mem = MemResourceProvider::new("mem")
            .with_resource("/p", "folder")
            .with_resource("/p/a", "item")
            .with_resource("/p/secret", "item")
            .with_resource("/p/z", "item");
        let provider = secure(
            mem,
            AccessSecurity::new().with_provider_scope(Arc::new(HideNamed("secret"))),
        );

        let parent = Resource::new("/p", "folder");
        let names: Vec<String> = provider
            .list_children(&parent)
            .expect("listing should succeed")
            .expect("provider lists /p")
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "z"]);

        assert!(provider
            .get_resource("/p/secret", None, None)
            .expect("lookup should succeed")
            .is_none());
    }

    #[test]
    fn both_scopes_must_allow_a_read() {
        let security = AccessSecurity::new()
            .with_provider_scope(Arc::new(HideNamed("a")))
            .with_application_scope(Arc::new(HideNamed("b")));
        assert!(security.readable(Resource::new("/a", "t")).is_none());
        assert!(security.readable(Resource::new("/b", "t")).is_none());
        assert!(security.readable(Resource::new("/c", "t")).is_some());
    }

    #[test]
    fn denied_create_creates_nothing_and_denied_delete_fails() {
        let mem = MemResourceProvider::new("mem").with_resource("/p", "folder");
        let provider = secure(mem, AccessSecurity::new().with_application_scope(Arc::new(ReadOnly)));

        let created = provider
            .create("/p/new", &ValueMap::new())
            .expect("denied create is not an error");
        assert!(created.is_none());

        let err = provider
            .delete(&Resource::new("/p", "folder"))
            .expect_err("denied delete must fail");
        assert_eq!(err.kind(), ResourceErrorKind::AccessDenied);
    }

    #[test]
    fn queries_pass_through_both_scopes_in_order() {
        let security = AccessSecurity::new()
            .with_provider_scope(Arc::new(Suffix("/p")))
            .with_application_scope(Arc::new(Suffix("/a")));
        let query = security
            .transform_query("/content", "prefix", &Credentials::anonymous())
            .expect("transform should succeed");
        assert_eq!(query, "/content/p/a");
    }
}
