//! Path-segment indexed tree of provider mounts.
//!
//! The tree is built once from a set of handles and is immutable afterwards,
//! so a single `Arc<MountTree>` can be read by any number of sessions
//! concurrently.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::handle::ProviderHandle;
use crate::path;
use crate::provider::ProviderFlags;

/// One path segment of the mount tree.
///
/// A node without a handle is an intermediate node: it only exists because
/// some mount lives further down.
#[derive(Debug, Default)]
pub struct MountNode {
    handle: Option<Arc<ProviderHandle>>,
    children: BTreeMap<String, MountNode>,
}

impl MountNode {
    pub fn handle(&self) -> Option<&Arc<ProviderHandle>> {
        self.handle.as_ref()
    }

    pub fn children(&self) -> &BTreeMap<String, MountNode> {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&MountNode> {
        self.children.get(name)
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Whether any node strictly below this one carries a handle.
    pub fn has_nested_mounts(&self) -> bool {
        self.children
            .values()
            .any(|child| child.handle.is_some() || child.has_nested_mounts())
    }

    fn collect_handles<'a>(&'a self, out: &mut Vec<&'a Arc<ProviderHandle>>) {
        if let Some(handle) = &self.handle {
            out.push(handle);
        }
        for child in self.children.values() {
            child.collect_handles(out);
        }
    }
}

#[derive(Debug, Default)]
pub struct MountTree {
    root: MountNode,
    /// Handles in tree order (depth-first, children sorted by name).
    ordered: Vec<Arc<ProviderHandle>>,
}

impl MountTree {
    /// Build a tree from `handles`.
    ///
    /// When two handles share a mount path the one that comes later wins.
    pub fn new<I>(handles: I) -> Self
    where
        I: IntoIterator<Item = Arc<ProviderHandle>>,
    {
        let mut root = MountNode::default();
        for handle in handles {
            let mut node = &mut root;
            for segment in path::segments(handle.path()) {
                node = node.children.entry(segment.to_string()).or_default();
            }
            if let Some(previous) = node.handle.replace(handle) {
                tracing::debug!(
                    path = %previous.path(),
                    provider = %previous.name(),
                    "Mount shadowed by a later registration",
                );
            }
        }

        let mut ordered = Vec::new();
        root.collect_handles(&mut ordered);
        let ordered = ordered.into_iter().cloned().collect();
        Self { root, ordered }
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Node of the longest mount path that is a prefix of `path`.
    pub fn best_matching_node(&self, path: &str) -> Option<&MountNode> {
        if !path::is_absolute(path) {
            return None;
        }
        let mut node = &self.root;
        let mut best = node.handle.as_ref().map(|_| node);
        for segment in path::segments(path) {
            match node.children.get(segment) {
                Some(child) => {
                    node = child;
                    if node.handle.is_some() {
                        best = Some(node);
                    }
                }
                None => break,
            }
        }
        best
    }

    pub fn best_matching_handle(&self, path: &str) -> Option<&Arc<ProviderHandle>> {
        self.best_matching_node(path).and_then(MountNode::handle)
    }

    /// Node located exactly at `path`, with or without a handle.
    pub fn node(&self, path: &str) -> Option<&MountNode> {
        if !path::is_absolute(path) || self.is_empty() {
            return None;
        }
        let mut node = &self.root;
        for segment in path::segments(path) {
            node = node.children.get(segment)?;
        }
        Some(node)
    }

    /// Whether `path` is a mount boundary or an intermediate mount segment.
    pub fn is_intermediate_path(&self, path: &str) -> bool {
        self.node(path).is_some()
    }

    /// All handles in tree order.
    pub fn handles(&self) -> &[Arc<ProviderHandle>] {
        &self.ordered
    }

    /// Handles declaring all of `flags`, in tree order.
    pub fn handles_with(&self, flags: ProviderFlags) -> Vec<Arc<ProviderHandle>> {
        self.ordered
            .iter()
            .filter(|handle| handle.has(flags))
            .cloned()
            .collect()
    }
}
