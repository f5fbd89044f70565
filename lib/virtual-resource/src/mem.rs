//! In-memory resource provider.
//!
//! Resources live in one committed store shared by every session. A session
//! that logged in gets its own staging area: writes stay there until
//! `commit` and disappear on `revert`. Without a login, writes go straight
//! to the committed store.
//!
//! Resource paths are stored as given, so a provider mounted at `/content`
//! is expected to hold paths under `/content`.

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::credentials::Credentials;
use crate::provider::{ProviderState, ResolveContext, ResourceIter, ResourceProvider, ValueMapIter};
use crate::resource::{Resource, ValueMap};
use crate::{ResourceError, ResourceErrorKind, ResourceResult, path};

/// Property holding the resource type of a stored resource.
pub const RESOURCE_TYPE_PROPERTY: &str = "resource-type";

pub const DEFAULT_RESOURCE_TYPE: &str = "mem:resource";

/// Matches every resource at or below the given path.
pub const LANGUAGE_PREFIX: &str = "prefix";

/// Matches `key=value` against string properties.
pub const LANGUAGE_PROPERTY: &str = "property";

type Store = BTreeMap<String, ValueMap>;

#[derive(Default)]
struct MemSession {
    /// `None` marks a staged delete.
    staged: Mutex<BTreeMap<String, Option<ValueMap>>>,
}

/// Summary returned when adapting the provider to [`MemInfo`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemInfo {
    pub name: String,
    pub committed: usize,
}

pub struct MemResourceProvider {
    name: String,
    store: RwLock<Store>,
    login: Option<(String, String)>,
    attributes: ValueMap,
    live: AtomicBool,
    logins: AtomicUsize,
    logouts: AtomicUsize,
}

fn session<'a>(ctx: &'a ResolveContext<'_>) -> Option<&'a MemSession> {
    ctx.state.downcast_ref::<MemSession>()
}

fn to_resource(path: &str, properties: &ValueMap) -> Resource {
    let resource_type = properties
        .get(RESOURCE_TYPE_PROPERTY)
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_RESOURCE_TYPE)
        .to_string();
    Resource::new(path, resource_type).with_properties(properties.clone())
}

fn in_subtree(root: &str, path: &str) -> bool {
    root == path || path::is_descendant(root, path)
}

impl MemResourceProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store: RwLock::new(Store::new()),
            login: None,
            attributes: ValueMap::new(),
            live: AtomicBool::new(true),
            logins: AtomicUsize::new(0),
            logouts: AtomicUsize::new(0),
        }
    }

    /// Add a committed resource.
    pub fn with_resource(self, path: impl Into<String>, resource_type: impl Into<String>) -> Self {
        let mut properties = ValueMap::new();
        properties.insert(
            RESOURCE_TYPE_PROPERTY.to_string(),
            Value::from(resource_type.into()),
        );
        self.with_properties(path, properties)
    }

    pub fn with_properties(self, path: impl Into<String>, properties: ValueMap) -> Self {
        self.store.write().insert(path.into(), properties);
        self
    }

    /// Only accept sessions logging in as `user` with `password`.
    pub fn with_login(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.login = Some((user.into(), password.into()));
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn set_live(&self, live: bool) {
        self.live.store(live, Ordering::Release);
    }

    pub fn login_count(&self) -> usize {
        self.logins.load(Ordering::Acquire)
    }

    pub fn logout_count(&self) -> usize {
        self.logouts.load(Ordering::Acquire)
    }

    /// Committed paths, sorted.
    pub fn committed_paths(&self) -> Vec<String> {
        self.store.read().keys().cloned().collect()
    }

    fn lookup(&self, ctx: &ResolveContext<'_>, path: &str) -> Option<ValueMap> {
        if let Some(session) = session(ctx) {
            if let Some(staged) = session.staged.lock().get(path) {
                return staged.clone();
            }
        }
        self.store.read().get(path).cloned()
    }

    /// Committed store with this session's staged changes applied.
    fn view(&self, ctx: &ResolveContext<'_>) -> Store {
        let mut view = self.store.read().clone();
        if let Some(session) = session(ctx) {
            for (path, staged) in session.staged.lock().iter() {
                match staged {
                    Some(properties) => {
                        view.insert(path.clone(), properties.clone());
                    }
                    None => {
                        view.remove(path);
                    }
                }
            }
        }
        view
    }

    fn write(&self, ctx: &ResolveContext<'_>, changes: Vec<(String, Option<ValueMap>)>) {
        match session(ctx) {
            Some(session) => session.staged.lock().extend(changes),
            None => {
                let mut store = self.store.write();
                for (path, change) in changes {
                    match change {
                        Some(properties) => {
                            store.insert(path, properties);
                        }
                        None => {
                            store.remove(&path);
                        }
                    }
                }
            }
        }
    }

    /// Changes that copy the subtree at `src` to `dst/<name of src>`.
    fn copy_changes(
        &self,
        op: &'static str,
        view: &Store,
        src: &str,
        dst: &str,
    ) -> ResourceResult<Vec<(String, Option<ValueMap>)>> {
        if !view.contains_key(src) {
            return Err(ResourceError::persistence(op, src, "source does not exist"));
        }
        if !view.contains_key(dst) {
            return Err(ResourceError::persistence(op, dst, "destination does not exist"));
        }
        let target = path::join(dst, path::name(src));
        if view.contains_key(&target) {
            return Err(ResourceError::persistence(op, target, "already exists"));
        }

        Ok(view
            .iter()
            .filter(|(path, _)| in_subtree(src, path))
            .map(|(path, properties)| {
                let relocated = format!("{target}{}", &path[src.len()..]);
                (relocated, Some(properties.clone()))
            })
            .collect())
    }

    fn find(&self, ctx: &ResolveContext<'_>, query: &str, language: &str) -> ResourceResult<Vec<Resource>> {
        let view = self.view(ctx);
        match language {
            LANGUAGE_PREFIX => Ok(view
                .iter()
                .filter(|(path, _)| in_subtree(query, path))
                .map(|(path, properties)| to_resource(path, properties))
                .collect()),
            LANGUAGE_PROPERTY => {
                let Some((key, value)) = query.split_once('=') else {
                    return Err(ResourceError::new(ResourceErrorKind::InvalidInput, "mem.query")
                        .with_message(format!("expected key=value, got '{query}'")));
                };
                let (key, value) = (key.trim(), value.trim());
                Ok(view
                    .iter()
                    .filter(|(_, properties)| {
                        properties.get(key).and_then(Value::as_str) == Some(value)
                    })
                    .map(|(path, properties)| to_resource(path, properties))
                    .collect())
            }
            other => Err(ResourceError::new(ResourceErrorKind::Unsupported, "mem.query")
                .with_message(format!("unknown query language '{other}'"))),
        }
    }
}

impl ResourceProvider for MemResourceProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn authenticate(&self, credentials: &Credentials) -> ResourceResult<ProviderState> {
        self.logins.fetch_add(1, Ordering::AcqRel);
        if let Some((user, password)) = &self.login {
            let accepted = credentials.user_id() == Some(user.as_str())
                && credentials.password() == Some(password.as_str());
            if !accepted {
                return Err(ResourceError::authentication(
                    "mem.authenticate",
                    format!("invalid credentials for '{}'", self.name),
                ));
            }
        }
        Ok(ProviderState::new(MemSession::default()))
    }

    fn logout(&self, _state: &ProviderState) {
        self.logouts.fetch_add(1, Ordering::AcqRel);
    }

    fn is_live(&self, _ctx: &ResolveContext<'_>) -> bool {
        self.live.load(Ordering::Acquire)
    }

    fn get_resource(
        &self,
        ctx: &ResolveContext<'_>,
        path: &str,
        _parent: Option<&Resource>,
    ) -> ResourceResult<Option<Resource>> {
        Ok(self
            .lookup(ctx, path)
            .map(|properties| to_resource(path, &properties)))
    }

    fn list_children(
        &self,
        ctx: &ResolveContext<'_>,
        parent: &Resource,
    ) -> ResourceResult<Option<ResourceIter>> {
        let children: Vec<Resource> = self
            .view(ctx)
            .iter()
            .filter(|(path, _)| path::parent(path) == Some(parent.path()))
            .map(|(path, properties)| to_resource(path, properties))
            .collect();
        Ok(Some(Box::new(children.into_iter())))
    }

    fn attribute_names(&self, _ctx: &ResolveContext<'_>) -> Vec<String> {
        self.attributes.keys().cloned().collect()
    }

    fn attribute(&self, _ctx: &ResolveContext<'_>, name: &str) -> Option<Value> {
        self.attributes.get(name).cloned()
    }

    fn create(
        &self,
        ctx: &ResolveContext<'_>,
        path: &str,
        properties: &ValueMap,
    ) -> ResourceResult<Resource> {
        if self.lookup(ctx, path).is_some() {
            return Err(ResourceError::persistence("mem.create", path, "already exists"));
        }
        if let Some(parent) = path::parent(path) {
            if parent != path::ROOT && self.lookup(ctx, parent).is_none() {
                return Err(ResourceError::persistence("mem.create", path, "parent does not exist"));
            }
        }
        self.write(ctx, vec![(path.to_string(), Some(properties.clone()))]);
        Ok(to_resource(path, properties))
    }

    fn delete(&self, ctx: &ResolveContext<'_>, resource: &Resource) -> ResourceResult<()> {
        let view = self.view(ctx);
        if !view.contains_key(resource.path()) {
            return Err(ResourceError::new(ResourceErrorKind::NotFound, "mem.delete")
                .with_path(resource.path()));
        }
        let removed = view
            .keys()
            .filter(|path| in_subtree(resource.path(), path))
            .map(|path| (path.clone(), None))
            .collect();
        self.write(ctx, removed);
        Ok(())
    }

    fn revert(&self, ctx: &ResolveContext<'_>) {
        if let Some(session) = session(ctx) {
            session.staged.lock().clear();
        }
    }

    fn commit(&self, ctx: &ResolveContext<'_>) -> ResourceResult<()> {
        let Some(session) = session(ctx) else {
            return Ok(());
        };
        let staged = std::mem::take(&mut *session.staged.lock());
        let mut store = self.store.write();
        for (path, change) in staged {
            match change {
                Some(properties) => {
                    store.insert(path, properties);
                }
                None => {
                    store.remove(&path);
                }
            }
        }
        Ok(())
    }

    fn has_changes(&self, ctx: &ResolveContext<'_>) -> bool {
        session(ctx).is_some_and(|session| !session.staged.lock().is_empty())
    }

    fn supported_languages(&self, _ctx: &ResolveContext<'_>) -> Vec<String> {
        vec![LANGUAGE_PREFIX.to_string(), LANGUAGE_PROPERTY.to_string()]
    }

    fn find_resources(
        &self,
        ctx: &ResolveContext<'_>,
        query: &str,
        language: &str,
    ) -> ResourceResult<ResourceIter> {
        Ok(Box::new(self.find(ctx, query, language)?.into_iter()))
    }

    fn query_resources(
        &self,
        ctx: &ResolveContext<'_>,
        query: &str,
        language: &str,
    ) -> ResourceResult<ValueMapIter> {
        let rows = self.find(ctx, query, language)?.into_iter().map(|resource| {
            let mut row = resource.properties().clone();
            row.insert("path".to_string(), Value::from(resource.path()));
            row
        });
        Ok(Box::new(rows.collect::<Vec<_>>().into_iter()))
    }

    fn adapt_to(
        &self,
        _ctx: &ResolveContext<'_>,
        target: TypeId,
    ) -> Option<Arc<dyn Any + Send + Sync>> {
        (target == TypeId::of::<MemInfo>()).then(|| {
            Arc::new(MemInfo {
                name: self.name.clone(),
                committed: self.store.read().len(),
            }) as Arc<dyn Any + Send + Sync>
        })
    }

    fn copy(&self, ctx: &ResolveContext<'_>, src: &str, dst: &str) -> ResourceResult<bool> {
        let view = self.view(ctx);
        let changes = self.copy_changes("mem.copy", &view, src, dst)?;
        self.write(ctx, changes);
        Ok(true)
    }

    fn move_resource(&self, ctx: &ResolveContext<'_>, src: &str, dst: &str) -> ResourceResult<bool> {
        let view = self.view(ctx);
        let mut changes = self.copy_changes("mem.move", &view, src, dst)?;
        changes.extend(
            view.keys()
                .filter(|path| in_subtree(src, path))
                .map(|path| (path.clone(), None)),
        );
        self.write(ctx, changes);
        Ok(true)
    }
}

impl std::fmt::Debug for MemResourceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemResourceProvider")
            .field("name", &self.name)
            .field("resources", &self.store.read().len())
            .field("login", &self.login.as_ref().map(|(user, _)| user))
            .finish()
    }
}
