//! Federated, lazily evaluated child listing.
//!
//! Children of a parent come from three sources, in this order:
//!
//! 1. the provider owning the parent path,
//! 2. providers mounted directly beneath the parent,
//! 3. placeholders for mount-tree segments that lead to deeper mounts.
//!
//! A name is emitted at most once. Placeholders are held back until the end
//! so a real resource with the same name always wins.

use std::collections::{HashSet, btree_map};

use indexmap::IndexMap;

use crate::authenticator::Authenticator;
use crate::path;
use crate::provider::ResourceIter;
use crate::resource::Resource;
use crate::tree::{MountNode, MountTree};

enum Stage<'a> {
    /// Owning provider not asked yet.
    Pending,
    Owned(ResourceIter),
    Mounts(btree_map::Iter<'a, String, MountNode>),
    Synthetic(indexmap::map::IntoIter<String, Resource>),
    Done,
}

pub struct Children<'a> {
    tree: &'a MountTree,
    authenticator: &'a Authenticator,
    parent: Resource,
    stage: Stage<'a>,
    visited: HashSet<String>,
    synthetic: IndexMap<String, Resource>,
}

impl<'a> Children<'a> {
    pub(crate) fn new(tree: &'a MountTree, authenticator: &'a Authenticator, parent: Resource) -> Self {
        let stage = if path::is_absolute(parent.path()) {
            Stage::Pending
        } else {
            Stage::Done
        };
        Self {
            tree,
            authenticator,
            parent,
            stage,
            visited: HashSet::new(),
            synthetic: IndexMap::new(),
        }
    }

    fn owned_children(&self) -> Option<ResourceIter> {
        let handle = self.tree.best_matching_handle(self.parent.path())?;
        let listed = self
            .authenticator
            .get_or_create(handle)
            .and_then(|provider| provider.list_children(&self.parent));
        match listed {
            Ok(children) => children,
            Err(err) => {
                tracing::warn!(
                    path = %self.parent.path(),
                    provider = %handle.name(),
                    error = %err,
                    "Unable to list children",
                );
                None
            }
        }
    }

    fn mount_stage(&self) -> Stage<'a> {
        // Placeholders are only collected while walking mounts, so there is
        // nothing left to emit when the parent is not in the mount tree.
        match self.tree.node(self.parent.path()) {
            Some(node) => Stage::Mounts(node.children().iter()),
            None => Stage::Done,
        }
    }

    /// Resolve one mount-tree child; `Some` only for a live provider resource.
    fn mount_child(&mut self, name: &str, node: &MountNode) -> Option<Resource> {
        let child_path = path::join(self.parent.path(), name);
        let Some(handle) = node.handle() else {
            self.synthetic
                .entry(name.to_string())
                .or_insert_with(|| Resource::synthetic(child_path));
            return None;
        };

        let resource = self
            .authenticator
            .get_or_create(handle)
            .and_then(|provider| provider.get_resource(&child_path, Some(&self.parent), None));
        match resource {
            Ok(Some(resource)) => return Some(resource),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(
                    path = %child_path,
                    provider = %handle.name(),
                    error = %err,
                    "Unable to read mounted child",
                );
            }
        }

        if node.has_nested_mounts() {
            self.synthetic
                .entry(name.to_string())
                .or_insert_with(|| Resource::synthetic(child_path));
        } else {
            self.visited.insert(name.to_string());
        }
        None
    }

    fn emit(&mut self, mut resource: Resource) -> Option<Resource> {
        if !self.visited.insert(resource.name().to_string()) {
            return None;
        }
        let own_path = resource.path().to_string();
        resource.metadata_mut().resolution_path = Some(own_path);
        Some(resource)
    }
}

impl Iterator for Children<'_> {
    type Item = Resource;

    fn next(&mut self) -> Option<Resource> {
        loop {
            match &mut self.stage {
                Stage::Pending => {
                    self.stage = match self.owned_children() {
                        Some(children) => Stage::Owned(children),
                        None => self.mount_stage(),
                    };
                }
                Stage::Owned(children) => match children.next() {
                    Some(resource) => {
                        if let Some(resource) = self.emit(resource) {
                            return Some(resource);
                        }
                    }
                    None => self.stage = self.mount_stage(),
                },
                Stage::Mounts(mounts) => match mounts.next() {
                    Some((name, node)) => {
                        if self.visited.contains(name.as_str()) {
                            continue;
                        }
                        if let Some(resource) = self.mount_child(name, node) {
                            if let Some(resource) = self.emit(resource) {
                                return Some(resource);
                            }
                        }
                    }
                    None => {
                        let synthetic = std::mem::take(&mut self.synthetic);
                        self.stage = Stage::Synthetic(synthetic.into_iter());
                    }
                },
                Stage::Synthetic(placeholders) => match placeholders.next() {
                    Some((_, resource)) => {
                        if let Some(resource) = self.emit(resource) {
                            tracing::trace!(path = %resource.path(), "Synthetic child");
                            return Some(resource);
                        }
                    }
                    None => self.stage = Stage::Done,
                },
                Stage::Done => return None,
            }
        }
    }
}
