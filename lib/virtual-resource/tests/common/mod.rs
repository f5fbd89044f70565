#![allow(dead_code)]

use std::any::{Any, TypeId};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value;
use virtual_resource::{
    AuthType, Credentials, FederationConfig, MemResourceProvider, ProviderFlags, ProviderInfo,
    ProviderRegistry, ProviderState, ResolveContext, Resource, ResourceError, ResourceIter,
    ResourceProvider, ResourceResult, ValueMap, ValueMapIter,
};

/// In-memory provider with call counters and injectable failures.
pub struct Probe {
    pub mem: MemResourceProvider,
    pub native: bool,
    pub fail_create: Option<String>,
    pub fail_delete: Option<String>,
    pub fail_commit: bool,
    pub reads: AtomicUsize,
    pub lists: AtomicUsize,
    pub copies: AtomicUsize,
    pub moves: AtomicUsize,
    pub commits: AtomicUsize,
    pub refreshes: AtomicUsize,
}

impl Probe {
    pub fn new(mem: MemResourceProvider) -> Self {
        Self {
            mem,
            native: true,
            fail_create: None,
            fail_delete: None,
            fail_commit: false,
            reads: AtomicUsize::new(0),
            lists: AtomicUsize::new(0),
            copies: AtomicUsize::new(0),
            moves: AtomicUsize::new(0),
            commits: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
        }
    }

    pub fn without_native_copy(mut self) -> Self {
        self.native = false;
        self
    }

    pub fn failing_create(mut self, path: &str) -> Self {
        self.fail_create = Some(path.to_string());
        self
    }

    pub fn failing_delete(mut self, path: &str) -> Self {
        self.fail_delete = Some(path.to_string());
        self
    }

    pub fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

impl ResourceProvider for Probe {
    fn name(&self) -> &str {
        self.mem.name()
    }

    fn authenticate(&self, credentials: &Credentials) -> ResourceResult<ProviderState> {
        self.mem.authenticate(credentials)
    }

    fn logout(&self, state: &ProviderState) {
        self.mem.logout(state);
    }

    fn refresh(&self, ctx: &ResolveContext<'_>) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        self.mem.refresh(ctx);
    }

    fn is_live(&self, ctx: &ResolveContext<'_>) -> bool {
        self.mem.is_live(ctx)
    }

    fn get_resource(
        &self,
        ctx: &ResolveContext<'_>,
        path: &str,
        parent: Option<&Resource>,
    ) -> ResourceResult<Option<Resource>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.mem.get_resource(ctx, path, parent)
    }

    fn list_children(
        &self,
        ctx: &ResolveContext<'_>,
        parent: &Resource,
    ) -> ResourceResult<Option<ResourceIter>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.mem.list_children(ctx, parent)
    }

    fn attribute_names(&self, ctx: &ResolveContext<'_>) -> Vec<String> {
        self.mem.attribute_names(ctx)
    }

    fn attribute(&self, ctx: &ResolveContext<'_>, name: &str) -> Option<Value> {
        self.mem.attribute(ctx, name)
    }

    fn create(
        &self,
        ctx: &ResolveContext<'_>,
        path: &str,
        properties: &ValueMap,
    ) -> ResourceResult<Resource> {
        if self.fail_create.as_deref() == Some(path) {
            return Err(ResourceError::persistence("probe.create", path, "injected failure"));
        }
        self.mem.create(ctx, path, properties)
    }

    fn delete(&self, ctx: &ResolveContext<'_>, resource: &Resource) -> ResourceResult<()> {
        if self.fail_delete.as_deref() == Some(resource.path()) {
            return Err(ResourceError::persistence(
                "probe.delete",
                resource.path(),
                "injected failure",
            ));
        }
        self.mem.delete(ctx, resource)
    }

    fn revert(&self, ctx: &ResolveContext<'_>) {
        self.mem.revert(ctx);
    }

    fn commit(&self, ctx: &ResolveContext<'_>) -> ResourceResult<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        if self.fail_commit {
            return Err(ResourceError::persistence("probe.commit", "/", "injected failure"));
        }
        self.mem.commit(ctx)
    }

    fn has_changes(&self, ctx: &ResolveContext<'_>) -> bool {
        self.mem.has_changes(ctx)
    }

    fn supported_languages(&self, ctx: &ResolveContext<'_>) -> Vec<String> {
        self.mem.supported_languages(ctx)
    }

    fn find_resources(
        &self,
        ctx: &ResolveContext<'_>,
        query: &str,
        language: &str,
    ) -> ResourceResult<ResourceIter> {
        self.mem.find_resources(ctx, query, language)
    }

    fn query_resources(
        &self,
        ctx: &ResolveContext<'_>,
        query: &str,
        language: &str,
    ) -> ResourceResult<ValueMapIter> {
        self.mem.query_resources(ctx, query, language)
    }

    fn adapt_to(
        &self,
        ctx: &ResolveContext<'_>,
        target: TypeId,
    ) -> Option<Arc<dyn Any + Send + Sync>> {
        self.mem.adapt_to(ctx, target)
    }

    fn copy(&self, ctx: &ResolveContext<'_>, src: &str, dst: &str) -> ResourceResult<bool> {
        if !self.native {
            return Ok(false);
        }
        self.copies.fetch_add(1, Ordering::SeqCst);
        self.mem.copy(ctx, src, dst)
    }

    fn move_resource(&self, ctx: &ResolveContext<'_>, src: &str, dst: &str) -> ResourceResult<bool> {
        if !self.native {
            return Ok(false);
        }
        self.moves.fetch_add(1, Ordering::SeqCst);
        self.mem.move_resource(ctx, src, dst)
    }
}

pub fn info(path: &str, flags: ProviderFlags) -> ProviderInfo {
    ProviderInfo::new(path).with_flags(flags)
}

pub fn lazy(path: &str, flags: ProviderFlags) -> ProviderInfo {
    ProviderInfo::new(path).with_flags(flags).with_auth(AuthType::Lazy)
}

pub fn registry() -> ProviderRegistry {
    ProviderRegistry::with_config(FederationConfig::default())
}

pub fn mount<P>(registry: &ProviderRegistry, info: ProviderInfo, provider: &Arc<P>)
where
    P: ResourceProvider,
{
    registry
        .register(info, provider.clone())
        .expect("mount should succeed");
}

pub fn names<I>(resources: I) -> Vec<String>
where
    I: IntoIterator<Item = Resource>,
{
    resources
        .into_iter()
        .map(|resource| resource.name().to_string())
        .collect()
}

pub fn paths<I>(resources: I) -> Vec<String>
where
    I: IntoIterator<Item = Resource>,
{
    resources
        .into_iter()
        .map(|resource| resource.path().to_string())
        .collect()
}
