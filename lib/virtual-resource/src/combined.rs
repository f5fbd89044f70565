//! The federation façade: one session's view of every mounted provider.

use std::any::{Any, TypeId};
use std::cell::Cell;
use std::sync::Arc;

use indexmap::IndexSet;
use serde_json::Value;

use crate::authenticator::Authenticator;
use crate::children::Children;
use crate::config::FederationConfig;
use crate::credentials::Credentials;
use crate::handle::ProviderHandle;
use crate::provider::{AuthType, ProviderFlags, ResourceIter, ValueMapIter};
use crate::resource::{Parameters, Resource, ValueMap};
use crate::security::AccessSecurity;
use crate::stateful::StatefulProvider;
use crate::tree::MountTree;
use crate::{ResourceError, ResourceErrorKind, ResourceResult, path};

/// A session over a mount tree.
///
/// The tree is shared with other sessions; everything else (logins, pending
/// failures, the closed flag) belongs to this session only, so the type is
/// not `Sync`.
pub struct CombinedProvider {
    tree: Arc<MountTree>,
    authenticator: Authenticator,
    config: Arc<FederationConfig>,
    closed: Cell<bool>,
}

fn not_found_as_none(result: ResourceResult<Option<Resource>>) -> ResourceResult<Option<Resource>> {
    match result {
        Err(err) if err.kind() == ResourceErrorKind::NotFound => Ok(None),
        other => other,
    }
}

fn synthetic_at(path: &str) -> Resource {
    tracing::trace!(path = %path, "Synthesizing resource at mount boundary");
    let mut resource = Resource::synthetic(path);
    resource.metadata_mut().resolution_path = Some(path.to_string());
    resource
}

impl CombinedProvider {
    /// Open a session.
    ///
    /// With [`FederationConfig::authenticate_required_on_open`] set, every
    /// provider mounted with [`AuthType::Required`] is logged in right away
    /// and a single failure aborts the whole session.
    pub fn open(
        tree: Arc<MountTree>,
        credentials: Credentials,
        security: AccessSecurity,
        config: Arc<FederationConfig>,
    ) -> ResourceResult<Self> {
        let authenticator = Authenticator::new(Arc::new(credentials), security);
        if config.authenticate_required_on_open {
            let required: Vec<Arc<ProviderHandle>> = tree
                .handles()
                .iter()
                .filter(|handle| handle.info().auth == AuthType::Required)
                .cloned()
                .collect();
            authenticator.authenticate_all(&required)?;
        }

        Ok(Self {
            tree,
            authenticator,
            config,
            closed: Cell::new(false),
        })
    }

    pub fn tree(&self) -> &Arc<MountTree> {
        &self.tree
    }

    pub fn credentials(&self) -> &Credentials {
        self.authenticator.credentials()
    }

    pub fn config(&self) -> &FederationConfig {
        &self.config
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Log out of every provider and refuse any further operation.
    pub fn close(&self) {
        if !self.closed.replace(true) {
            tracing::debug!("Closing session");
            self.authenticator.logout();
        }
    }

    /// Log out of every provider; the next operation logs in again.
    pub fn logout(&self) {
        self.authenticator.logout();
    }

    fn ensure_open(&self, op: &'static str) -> ResourceResult<()> {
        if self.closed.get() {
            Err(ResourceError::new(ResourceErrorKind::Closed, op))
        } else {
            Ok(())
        }
    }

    fn provider_for(&self, handle: &Arc<ProviderHandle>) -> ResourceResult<Arc<dyn StatefulProvider>> {
        self.authenticator.get_or_create(handle)
    }

    /// The provider owning `path`, which must be mounted as modifiable.
    fn modifiable_provider(
        &self,
        op: &'static str,
        path: &str,
    ) -> ResourceResult<Arc<dyn StatefulProvider>> {
        match self.tree.best_matching_handle(path) {
            Some(handle) if handle.is_modifiable() => self.provider_for(handle),
            _ => Err(ResourceError::unsupported(op, path)
                .with_message("no modifiable provider is mounted at this path")),
        }
    }

    /// Look up `path`.
    ///
    /// Relative paths are never found. A mount boundary without a resource
    /// of its own reads as a synthetic resource, unless `is_resolve` is set.
    pub fn get_resource(
        &self,
        path: &str,
        parent: Option<&Resource>,
        parameters: Option<&Parameters>,
        is_resolve: bool,
    ) -> ResourceResult<Option<Resource>> {
        self.ensure_open("combined.get_resource")?;
        let Some(path) = path::normalize(path) else {
            return Ok(None);
        };

        if let Some(handle) = self.tree.best_matching_handle(&path) {
            let provider = self.provider_for(handle)?;
            if let Some(resource) = not_found_as_none(provider.get_resource(&path, parent, parameters))? {
                return Ok(Some(resource));
            }
        }

        if !is_resolve && self.tree.node(&path).is_some() {
            return Ok(Some(synthetic_at(&path)));
        }
        Ok(None)
    }

    pub fn get_parent(&self, child: &Resource) -> ResourceResult<Option<Resource>> {
        self.ensure_open("combined.get_parent")?;
        let Some(parent_path) = child.parent_path() else {
            return Ok(None);
        };

        let child_handle = self.tree.best_matching_handle(child.path());
        let parent_handle = self.tree.best_matching_handle(parent_path);
        let found = match (child_handle, parent_handle) {
            (Some(child_handle), Some(parent_handle)) if child_handle.id() == parent_handle.id() => {
                let provider = self.provider_for(child_handle)?;
                not_found_as_none(provider.get_parent(child))?
            }
            (_, Some(parent_handle)) => {
                let provider = self.provider_for(parent_handle)?;
                not_found_as_none(provider.get_resource(parent_path, None, None))?
            }
            (_, None) => None,
        };

        match found {
            Some(parent) => Ok(Some(parent)),
            None if self.tree.node(parent_path).is_some() => Ok(Some(synthetic_at(parent_path))),
            None => Ok(None),
        }
    }

    /// Lazily list the children of `parent` across every provider.
    ///
    /// No provider is asked anything before the first call to `next`.
    pub fn list_children(&self, parent: &Resource) -> ResourceResult<Children<'_>> {
        self.ensure_open("combined.list_children")?;
        Ok(Children::new(&self.tree, &self.authenticator, parent.clone()))
    }

    pub fn attribute_names(&self) -> ResourceResult<Vec<String>> {
        self.ensure_open("combined.attribute_names")?;
        let handles = self.tree.handles_with(ProviderFlags::ATTRIBUTABLE);
        let mut names: IndexSet<String> = IndexSet::new();
        for provider in self.authenticator.best_effort(&handles) {
            names.extend(provider.attribute_names());
        }
        names.extend(self.credentials().attribute_names().map(str::to_string));
        names.retain(|name| !self.config.is_forbidden_attribute(name));
        Ok(names.into_iter().collect())
    }

    pub fn attribute(&self, name: &str) -> ResourceResult<Option<Value>> {
        self.ensure_open("combined.attribute")?;
        if self.config.is_forbidden_attribute(name) {
            return Ok(None);
        }
        let handles = self.tree.handles_with(ProviderFlags::ATTRIBUTABLE);
        let from_provider = self
            .authenticator
            .best_effort(&handles)
            .find_map(|provider| provider.attribute(name));
        Ok(from_provider.or_else(|| self.credentials().attribute(name).cloned()))
    }

    /// Create a resource at `path` in the provider owning it.
    pub fn create(&self, path: &str, properties: &ValueMap) -> ResourceResult<Resource> {
        self.ensure_open("combined.create")?;
        let path = path::normalize(path).ok_or_else(|| {
            ResourceError::new(ResourceErrorKind::InvalidInput, "combined.create")
                .with_path(path)
                .with_message("path must be absolute")
        })?;
        let provider = self.modifiable_provider("combined.create", &path)?;
        match provider.create(&path, properties)? {
            Some(resource) => Ok(resource),
            None => Err(ResourceError::unsupported("combined.create", path.as_str()).with_message(
                format!(
                    "create '{}' at {}",
                    path::name(&path),
                    path::parent(&path).unwrap_or(path::ROOT)
                ),
            )),
        }
    }

    pub fn delete(&self, resource: &Resource) -> ResourceResult<()> {
        self.ensure_open("combined.delete")?;
        let provider = self.modifiable_provider("combined.delete", resource.path())?;
        provider.delete(resource)
    }

    pub fn revert(&self) -> ResourceResult<()> {
        self.ensure_open("combined.revert")?;
        for provider in self.authenticator.all_modifiable() {
            provider.revert();
        }
        Ok(())
    }

    /// Commit every modifiable provider with pending changes.
    ///
    /// Stops at the first failure. Providers committed before it stay
    /// committed.
    pub fn commit(&self) -> ResourceResult<()> {
        self.ensure_open("combined.commit")?;
        for provider in self.authenticator.all_modifiable() {
            if provider.has_changes() {
                provider.commit()?;
            }
        }
        Ok(())
    }

    pub fn has_changes(&self) -> ResourceResult<bool> {
        self.ensure_open("combined.has_changes")?;
        Ok(self
            .authenticator
            .all_modifiable()
            .iter()
            .any(|provider| provider.has_changes()))
    }

    pub fn refresh(&self) -> ResourceResult<()> {
        self.ensure_open("combined.refresh")?;
        for provider in self.authenticator.all_refreshable() {
            provider.refresh();
        }
        Ok(())
    }

    /// A closed session is never live.
    pub fn is_live(&self) -> bool {
        !self.closed.get()
            && self
                .authenticator
                .all_authenticated()
                .iter()
                .all(|provider| provider.is_live())
    }

    pub fn supported_languages(&self) -> ResourceResult<Vec<String>> {
        self.ensure_open("combined.supported_languages")?;
        let handles = self.tree.handles_with(ProviderFlags::QUERYABLE);
        let mut languages: IndexSet<String> = IndexSet::new();
        for provider in self.authenticator.best_effort(&handles) {
            languages.extend(provider.supported_languages());
        }
        Ok(languages.into_iter().collect())
    }

    fn queryable_providers(&self, language: &str) -> Vec<Arc<dyn StatefulProvider>> {
        let handles = self.tree.handles_with(ProviderFlags::QUERYABLE);
        self.authenticator
            .best_effort(&handles)
            .filter(|provider| {
                provider
                    .supported_languages()
                    .iter()
                    .any(|supported| supported == language)
            })
            .collect()
    }

    /// Run `query` on every queryable provider that speaks `language`.
    ///
    /// Providers are asked one after another as the result is consumed. A
    /// provider that fails is skipped.
    pub fn find_resources(&self, query: &str, language: &str) -> ResourceResult<ResourceIter> {
        self.ensure_open("combined.find_resources")?;
        let providers = self.queryable_providers(language);
        let query = query.to_string();
        let language = language.to_string();
        Ok(Box::new(providers.into_iter().flat_map(move |provider| {
            match provider.find_resources(&query, &language) {
                Ok(found) => Some(found),
                Err(err) => {
                    tracing::warn!(
                        provider = %provider.handle().name(),
                        error = %err,
                        "Skipping provider that failed to find resources",
                    );
                    None
                }
            }
            .into_iter()
            .flatten()
        })))
    }

    pub fn query_resources(&self, query: &str, language: &str) -> ResourceResult<ValueMapIter> {
        self.ensure_open("combined.query_resources")?;
        let providers = self.queryable_providers(language);
        let query = query.to_string();
        let language = language.to_string();
        Ok(Box::new(providers.into_iter().flat_map(move |provider| {
            match provider.query_resources(&query, &language) {
                Ok(rows) => Some(rows),
                Err(err) => {
                    tracing::warn!(
                        provider = %provider.handle().name(),
                        error = %err,
                        "Skipping provider that failed to query resources",
                    );
                    None
                }
            }
            .into_iter()
            .flatten()
        })))
    }

    /// First adaptable provider that can be adapted to `T`.
    pub fn adapt_to<T>(&self) -> ResourceResult<Option<Arc<T>>>
    where
        T: Any + Send + Sync,
    {
        self.ensure_open("combined.adapt_to")?;
        let handles = self.tree.handles_with(ProviderFlags::ADAPTABLE);
        let adapted = self
            .authenticator
            .best_effort(&handles)
            .filter_map(|provider| provider.adapt_to(TypeId::of::<T>()))
            .find_map(|adapted| adapted.downcast::<T>().ok());
        Ok(adapted)
    }

    /// Existence check shared by copy and move.
    ///
    /// Returns the provider able to do the whole operation on its own, if
    /// there is one.
    fn check_source_and_dest(
        &self,
        op: &'static str,
        src: &str,
        dst: &str,
    ) -> ResourceResult<Option<Arc<dyn StatefulProvider>>> {
        let src_handle = self.existing_owner(op, src, "source does not exist")?;
        let dst_handle = self.existing_owner(op, dst, "destination does not exist")?;

        let nested = |path: &str| self.tree.node(path).is_some_and(|node| node.has_nested_mounts());
        if src_handle.id() == dst_handle.id() && !nested(src) && !nested(dst) {
            return self.provider_for(&src_handle).map(Some);
        }
        Ok(None)
    }

    fn existing_owner(
        &self,
        op: &'static str,
        path: &str,
        reason: &'static str,
    ) -> ResourceResult<Arc<ProviderHandle>> {
        let missing = || ResourceError::persistence(op, path, reason);
        let handle = self.tree.best_matching_handle(path).ok_or_else(missing)?;
        let provider = self.provider_for(handle).map_err(|_| missing())?;
        match not_found_as_none(provider.get_resource(path, None, None))? {
            Some(_) => Ok(handle.clone()),
            None => Err(missing()),
        }
    }

    fn normalize_pair(
        &self,
        op: &'static str,
        src: &str,
        dst: &str,
    ) -> ResourceResult<(String, String)> {
        let normalize = |path: &str| {
            path::normalize(path).ok_or_else(|| {
                ResourceError::new(ResourceErrorKind::InvalidInput, op)
                    .with_path(path)
                    .with_message("path must be absolute")
            })
        };
        let (src, dst) = (normalize(src)?, normalize(dst)?);
        if src == dst || path::is_descendant(&src, &dst) {
            return Err(ResourceError::new(ResourceErrorKind::InvalidInput, op)
                .with_path(dst)
                .with_message("destination lies inside the source"));
        }
        Ok((src, dst))
    }

    fn read_back(&self, op: &'static str, path: &str) -> ResourceResult<Resource> {
        self.get_resource(path, None, None, false)?
            .ok_or_else(|| ResourceError::persistence(op, path, "resource missing after operation"))
    }

    /// Copy `src` and its subtree beneath the existing resource `dst`.
    ///
    /// Returns the copy, located at `dst/<name of src>`.
    pub fn copy(&self, src: &str, dst: &str) -> ResourceResult<Resource> {
        const OP: &str = "combined.copy";
        self.ensure_open(OP)?;
        let (src, dst) = self.normalize_pair(OP, src, dst)?;
        let target = path::join(&dst, path::name(&src));

        if let Some(provider) = self.check_source_and_dest(OP, &src, &dst)? {
            if provider.copy(&src, &dst)? {
                return self.read_back(OP, &target);
            }
        }

        self.copy_fallback(OP, &src, &dst)
    }

    /// Move `src` and its subtree beneath the existing resource `dst`.
    ///
    /// When no single provider can do it, the subtree is copied and the
    /// source deleted afterwards. If that delete fails the copy is kept.
    pub fn move_resource(&self, src: &str, dst: &str) -> ResourceResult<Resource> {
        const OP: &str = "combined.move";
        self.ensure_open(OP)?;
        let (src, dst) = self.normalize_pair(OP, src, dst)?;
        let target = path::join(&dst, path::name(&src));

        if let Some(provider) = self.check_source_and_dest(OP, &src, &dst)? {
            if provider.move_resource(&src, &dst)? {
                return self.read_back(OP, &target);
            }
        }

        let created = self.copy_fallback(OP, &src, &dst)?;
        let source = self.read_back(OP, &src)?;
        if let Err(err) = self.delete(&source) {
            tracing::warn!(
                src = %src,
                dst = %created.path(),
                error = %err,
                "Moved resources copied but the source could not be deleted",
            );
            return Err(err);
        }
        Ok(created)
    }

    fn copy_fallback(&self, op: &'static str, src: &str, dst: &str) -> ResourceResult<Resource> {
        if !self.config.copy_fallback {
            return Err(ResourceError::unsupported(op, src)
                .with_message("no single provider can handle both paths"));
        }
        tracing::debug!(src = %src, dst = %dst, "Falling back to resource-by-resource copy");

        let source = self.read_back(op, src)?;
        let mut created = Vec::new();
        match self.copy_tree(&source, dst, &mut created) {
            Ok(()) => created.into_iter().next().ok_or_else(|| {
                ResourceError::new(ResourceErrorKind::Internal, op).with_path(src)
            }),
            Err(err) => {
                tracing::warn!(src = %src, dst = %dst, error = %err, "Copy failed, rolling back");
                for resource in created.iter().rev() {
                    if let Err(rollback) = self.delete(resource) {
                        tracing::warn!(
                            path = %resource.path(),
                            error = %rollback,
                            "Unable to roll back copied resource",
                        );
                    }
                }
                Err(err)
            }
        }
    }

    fn copy_tree(
        &self,
        source: &Resource,
        dst: &str,
        created: &mut Vec<Resource>,
    ) -> ResourceResult<()> {
        let target = path::join(dst, source.name());
        // Synthetic segments are materialized empty so that deeper mounted
        // resources have a parent at the destination.
        let properties = if source.is_synthetic() {
            ValueMap::new()
        } else {
            source.properties().clone()
        };
        let copy = self.create(&target, &properties)?;
        let target = copy.path().to_string();
        created.push(copy);

        let children: Vec<Resource> = self.list_children(source)?.collect();
        for child in &children {
            self.copy_tree(child, &target, created)?;
        }
        Ok(())
    }
}

impl Drop for CombinedProvider {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for CombinedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombinedProvider")
            .field("mounts", &self.tree.handles().len())
            .field("authenticator", &self.authenticator)
            .field("closed", &self.closed.get())
            .finish()
    }
}
