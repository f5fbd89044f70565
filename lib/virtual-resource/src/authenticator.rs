//! Per-session login bookkeeping.
//!
//! An [`Authenticator`] belongs to exactly one session. It is not `Sync`:
//! the session serializes access to it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use crate::credentials::Credentials;
use crate::handle::{HandleId, ProviderHandle};
use crate::provider::{AuthType, ProviderFlags};
use crate::security::{AccessSecurity, SecureProvider};
use crate::stateful::{AuthenticatedProvider, StatefulProvider};
use crate::{ResourceError, ResourceErrorKind, ResourceResult};

enum AuthEntry {
    Live(Arc<dyn StatefulProvider>),
    /// A login that failed; re-raised without trying again.
    Failed(ResourceError),
}

#[derive(Default)]
struct AuthState {
    cache: HashMap<HandleId, AuthEntry>,
    authenticated: Vec<Arc<dyn StatefulProvider>>,
    modifiable: Vec<Arc<dyn StatefulProvider>>,
    refreshable: Vec<Arc<dyn StatefulProvider>>,
}

pub struct Authenticator {
    credentials: Arc<Credentials>,
    security: AccessSecurity,
    state: RefCell<AuthState>,
}

impl Authenticator {
    pub fn new(credentials: Arc<Credentials>, security: AccessSecurity) -> Self {
        Self {
            credentials,
            security,
            state: RefCell::new(AuthState::default()),
        }
    }

    pub fn credentials(&self) -> &Arc<Credentials> {
        &self.credentials
    }

    /// The session's instance for `handle`, logging in on first use.
    pub fn get_or_create(
        &self,
        handle: &Arc<ProviderHandle>,
    ) -> ResourceResult<Arc<dyn StatefulProvider>> {
        match self.state.borrow().cache.get(&handle.id()) {
            Some(AuthEntry::Live(provider)) => return Ok(provider.clone()),
            Some(AuthEntry::Failed(err)) => return Err(err.clone()),
            None => {}
        }

        match self.authenticate(handle) {
            Ok(provider) => {
                let mut state = self.state.borrow_mut();
                state
                    .cache
                    .insert(handle.id(), AuthEntry::Live(provider.clone()));
                state.authenticated.push(provider.clone());
                if handle.has(ProviderFlags::MODIFIABLE) {
                    state.modifiable.push(provider.clone());
                }
                if handle.has(ProviderFlags::REFRESHABLE) {
                    state.refreshable.push(provider.clone());
                }
                Ok(provider)
            }
            Err(err) => {
                tracing::warn!(
                    provider = %handle.name(),
                    path = %handle.path(),
                    error = %err,
                    "Unable to authenticate provider",
                );
                self.state
                    .borrow_mut()
                    .cache
                    .insert(handle.id(), AuthEntry::Failed(err.clone()));
                Err(err)
            }
        }
    }

    fn authenticate(&self, handle: &Arc<ProviderHandle>) -> ResourceResult<Arc<dyn StatefulProvider>> {
        let provider: Arc<dyn StatefulProvider> = match handle.info().auth {
            AuthType::None => Arc::new(AuthenticatedProvider::anonymous(
                handle.clone(),
                self.credentials.clone(),
            )),
            AuthType::Lazy | AuthType::Required => {
                let state = handle
                    .provider()
                    .authenticate(&self.credentials)
                    .map_err(|err| match err.kind() {
                        ResourceErrorKind::Authentication => err,
                        _ => ResourceError::authentication("authenticator.login", err.to_string())
                            .with_path(handle.path()),
                    })?;
                tracing::debug!(provider = %handle.name(), "Authenticated provider");
                Arc::new(AuthenticatedProvider::logged_in(
                    handle.clone(),
                    state,
                    self.credentials.clone(),
                ))
            }
        };

        if handle.has(ProviderFlags::ACCESS_SECURITY) {
            Ok(Arc::new(SecureProvider::new(
                provider,
                self.security.clone(),
                self.credentials.clone(),
            )))
        } else {
            Ok(provider)
        }
    }

    /// Authenticate every handle or none of them.
    ///
    /// On the first failure every instance of the session is logged out, all
    /// caches are dropped and the failure is returned.
    pub fn authenticate_all(&self, handles: &[Arc<ProviderHandle>]) -> ResourceResult<()> {
        for handle in handles {
            if let Err(err) = self.get_or_create(handle) {
                self.logout();
                return Err(err);
            }
        }
        Ok(())
    }

    /// Instances for `handles`, skipping every handle that cannot log in.
    pub fn best_effort<'a, I>(&'a self, handles: I) -> impl Iterator<Item = Arc<dyn StatefulProvider>> + 'a
    where
        I: IntoIterator<Item = &'a Arc<ProviderHandle>>,
        I::IntoIter: 'a,
    {
        handles.into_iter().filter_map(move |handle| {
            self.get_or_create(handle)
                .inspect_err(|_| {
                    tracing::trace!(provider = %handle.name(), "Skipping unauthenticated provider");
                })
                .ok()
        })
    }

    pub fn all_authenticated(&self) -> Vec<Arc<dyn StatefulProvider>> {
        self.state.borrow().authenticated.clone()
    }

    pub fn all_modifiable(&self) -> Vec<Arc<dyn StatefulProvider>> {
        self.state.borrow().modifiable.clone()
    }

    pub fn all_refreshable(&self) -> Vec<Arc<dyn StatefulProvider>> {
        self.state.borrow().refreshable.clone()
    }

    pub fn is_cached(&self, handle: &ProviderHandle) -> bool {
        self.state.borrow().cache.contains_key(&handle.id())
    }

    /// Log out every instance of the session and forget all of them,
    /// including remembered failures.
    pub fn logout(&self) {
        let state = std::mem::take(&mut *self.state.borrow_mut());
        for provider in &state.authenticated {
            provider.logout();
        }
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Authenticator")
            .field("credentials", &self.credentials)
            .field("cached", &state.cache.len())
            .field("authenticated", &state.authenticated.len())
            .finish()
    }
}
