//! A single path-addressable resource tree over any number of independently
//! mounted providers.
//!
//! Providers are mounted at path prefixes through a [`ProviderRegistry`].
//! Opening a session yields a [`CombinedProvider`] which picks the provider
//! owning each path (longest mount prefix wins), logs in to providers on
//! first use, merges child listings and query results across providers and
//! fills the gaps between mounts with synthetic resources.
//!
//! ```
//! use std::sync::Arc;
//! use virtual_resource::{
//!     Credentials, MemResourceProvider, ProviderFlags, ProviderInfo, ProviderRegistry,
//! };
//!
//! let registry = ProviderRegistry::new();
//! registry
//!     .register(
//!         ProviderInfo::new("/apps/site").with_flags(ProviderFlags::MODIFIABLE),
//!         Arc::new(MemResourceProvider::new("site").with_resource("/apps/site", "folder")),
//!     )
//!     .unwrap();
//!
//! let session = registry.open(Credentials::anonymous()).unwrap();
//! // `/apps` is owned by nobody but leads to a mount, so it reads as synthetic.
//! let apps = session.get_resource("/apps", None, None, false).unwrap().unwrap();
//! assert!(apps.is_synthetic());
//! ```

mod authenticator;
mod children;
mod combined;
mod config;
mod credentials;
mod error;
mod handle;
#[cfg(feature = "logging")]
mod logging;
mod mem;
pub mod path;
mod provider;
mod registry;
mod resource;
mod security;
mod stateful;
mod tree;

pub use crate::authenticator::Authenticator;
pub use crate::children::Children;
pub use crate::combined::CombinedProvider;
pub use crate::config::FederationConfig;
pub use crate::credentials::{Credentials, PASSWORD_ATTRIBUTE, USER_ATTRIBUTE};
pub use crate::error::{ResourceError, ResourceErrorKind, ResourceResult};
pub use crate::handle::{HandleId, ProviderHandle, ProviderInfo};
#[cfg(feature = "logging")]
pub use crate::logging::set_up_logging;
pub use crate::mem::{
    DEFAULT_RESOURCE_TYPE, LANGUAGE_PREFIX, LANGUAGE_PROPERTY, MemInfo, MemResourceProvider,
    RESOURCE_TYPE_PROPERTY,
};
pub use crate::provider::{
    AuthType, ProviderFlags, ProviderState, ResolveContext, ResourceIter, ResourceProvider,
    ValueMapIter,
};
pub use crate::registry::ProviderRegistry;
pub use crate::resource::{
    Parameters, RESOURCE_TYPE_SYNTHETIC, Resource, ResourceKind, ResourceMetadata, ValueMap,
};
pub use crate::security::{AccessSecurity, ResourceAccessSecurity, SecureProvider};
pub use crate::stateful::{AuthenticatedProvider, StatefulProvider};
pub use crate::tree::{MountNode, MountTree};
