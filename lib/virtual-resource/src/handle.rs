//! Provider handles: one provider instance plus its static mount metadata.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::provider::{AuthType, ProviderFlags, ResourceProvider};
use crate::{ResourceError, ResourceErrorKind, ResourceResult, path};

/// Identity of a [`ProviderHandle`].
///
/// Handles are compared by identity, never by mount path: two handles mounted
/// at the same path are still distinct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct HandleId(NonZeroU64);

impl HandleId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        let raw = NEXT.fetch_add(1, Ordering::Relaxed);
        // The counter starts at 1 and would need 2^64 handles to wrap.
        Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

/// Static mount metadata of a provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderInfo {
    pub path: String,
    pub name: String,
    pub auth: AuthType,
    pub flags: ProviderFlags,
}

impl ProviderInfo {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: path.clone(),
            path,
            auth: AuthType::None,
            flags: ProviderFlags::empty(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_auth(mut self, auth: AuthType) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_flags(mut self, flags: ProviderFlags) -> Self {
        self.flags = flags;
        self
    }
}

pub struct ProviderHandle {
    id: HandleId,
    info: ProviderInfo,
    provider: Arc<dyn ResourceProvider>,
}

impl ProviderHandle {
    /// Create a handle, normalizing the mount path.
    pub fn new(mut info: ProviderInfo, provider: Arc<dyn ResourceProvider>) -> ResourceResult<Arc<Self>> {
        let Some(normalized) = path::normalize(&info.path) else {
            return Err(ResourceError::new(
                ResourceErrorKind::InvalidInput,
                "handle.new",
            )
            .with_path(info.path)
            .with_message("mount path must be absolute"));
        };
        if info.name == info.path {
            info.name = normalized.clone();
        }
        info.path = normalized;

        Ok(Arc::new(Self {
            id: HandleId::next(),
            info,
            provider,
        }))
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn info(&self) -> &ProviderInfo {
        &self.info
    }

    pub fn path(&self) -> &str {
        &self.info.path
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn provider(&self) -> &Arc<dyn ResourceProvider> {
        &self.provider
    }

    pub fn has(&self, flags: ProviderFlags) -> bool {
        self.info.flags.contains(flags)
    }

    pub fn is_modifiable(&self) -> bool {
        self.has(ProviderFlags::MODIFIABLE)
    }
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("id", &self.id)
            .field("info", &self.info)
            .field("provider", &self.provider.name())
            .finish()
    }
}
