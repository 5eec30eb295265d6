//! Arena-based document tree.
//!
//! Structure elements live in one map keyed by [`NodeId`]. Parent/child edges are
//! stored on the nodes, cross links between branches (e.g. logical element to page)
//! live in a separate [`ReferenceIndex`] with forward and reverse lookup.

pub mod xml;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PAGE_TYPE: &str = "page";
pub const BOUND_BOOK_TYPE: &str = "BoundBook";
pub const PHYS_PAGE_NUMBER: &str = "physPageNumber";
pub const LOGICAL_PAGE_NUMBER: &str = "logicalPageNumber";
pub const PATH_IMAGE_FILES: &str = "pathimagefiles";
pub const REPRESENTATIVE: &str = "_representative";
pub const TITLE: &str = "TitleDocMain";
pub const LOGICAL_PHYSICAL: &str = "logical_physical";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("unknown structure element {0}")]
    UnknownNode(NodeId),
    #[error("structure element {0} exists twice")]
    DuplicateNode(NodeId),
    #[error("structure element {0} is already attached")]
    AlreadyAttached(NodeId),
    #[error("the root element cannot be moved or deleted")]
    RootImmutable,
    #[error("cannot move {0} below itself")]
    Cycle(NodeId),
    #[error("metadata file is malformed: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub type_name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityRef {
    pub authority: String,
    pub authority_uri: String,
    pub value_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    pub authority: Option<AuthorityRef>,
}

impl Person {
    pub fn is_empty(&self) -> bool {
        self.first_name.trim().is_empty() && self.last_name.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFile {
    /// File name relative to the master image folder.
    pub location: String,
    pub mime_type: String,
}

impl ContentFile {
    pub fn for_image(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let mime_type = match ext.as_str() {
            "tif" | "tiff" => "image/tiff",
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "jp2" => "image/jp2",
            "pdf" => "application/pdf",
            _ => "application/octet-stream",
        };
        Self { location: name.to_string(), mime_type: mime_type.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocStruct {
    pub id: NodeId,
    pub type_name: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub metadata: Vec<Metadata>,
    pub persons: Vec<Person>,
    pub content_file: Option<ContentFile>,
}

impl DocStruct {
    fn new(id: NodeId, type_name: &str) -> Self {
        Self {
            id,
            type_name: type_name.to_string(),
            parent: None,
            children: Vec::new(),
            metadata: Vec::new(),
            persons: Vec::new(),
            content_file: None,
        }
    }

    pub fn first_value(&self, type_name: &str) -> Option<&str> {
        self.metadata.iter().find(|m| m.type_name == type_name).map(|m| m.value.as_str())
    }

    pub fn image_name(&self) -> Option<&str> {
        self.content_file.as_ref().map(|f| f.location.as_str())
    }

    pub fn is_page(&self) -> bool {
        self.type_name == PAGE_TYPE
    }
}

/// Directed, typed links between structure elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceIndex {
    forward: BTreeMap<NodeId, Vec<(NodeId, String)>>,
    reverse: BTreeMap<NodeId, BTreeSet<(NodeId, String)>>,
}

impl ReferenceIndex {
    /// Adds `source -> target`. Returns `false` if the link already existed.
    pub fn add(&mut self, source: NodeId, target: NodeId, link: &str) -> bool {
        let targets = self.forward.entry(source).or_default();
        if targets.iter().any(|(t, l)| *t == target && l == link) {
            return false;
        }
        targets.push((target, link.to_string()));
        self.reverse.entry(target).or_default().insert((source, link.to_string()));
        true
    }

    pub fn remove(&mut self, source: NodeId, target: NodeId, link: &str) -> bool {
        let mut removed = false;
        if let Some(targets) = self.forward.get_mut(&source) {
            let before = targets.len();
            targets.retain(|(t, l)| !(*t == target && l == link));
            removed = targets.len() != before;
            if targets.is_empty() {
                self.forward.remove(&source);
            }
        }
        if let Some(sources) = self.reverse.get_mut(&target) {
            sources.remove(&(source, link.to_string()));
            if sources.is_empty() {
                self.reverse.remove(&target);
            }
        }
        removed
    }

    /// Targets of `source` with the given link type, in insertion order.
    pub fn targets(&self, source: NodeId, link: &str) -> Vec<NodeId> {
        self.forward
            .get(&source)
            .map(|targets| targets.iter().filter(|(_, l)| l == link).map(|(t, _)| *t).collect())
            .unwrap_or_default()
    }

    pub fn all_targets(&self, source: NodeId) -> &[(NodeId, String)] {
        self.forward.get(&source).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn sources(&self, target: NodeId, link: &str) -> Vec<NodeId> {
        self.reverse
            .get(&target)
            .map(|sources| sources.iter().filter(|(_, l)| l == link).map(|(s, _)| *s).collect())
            .unwrap_or_default()
    }

    /// Removes every link pointing at `target`. Returns the affected sources.
    pub fn remove_all_to(&mut self, target: NodeId) -> Vec<NodeId> {
        let Some(sources) = self.reverse.remove(&target) else {
            return Vec::new();
        };
        let mut affected = Vec::new();
        for (source, _) in sources {
            if let Some(targets) = self.forward.get_mut(&source) {
                targets.retain(|(t, _)| *t != target);
                if targets.is_empty() {
                    self.forward.remove(&source);
                }
            }
            if !affected.contains(&source) {
                affected.push(source);
            }
        }
        affected
    }

    pub fn remove_all_from(&mut self, source: NodeId) {
        let Some(targets) = self.forward.remove(&source) else {
            return;
        };
        for (target, link) in targets {
            if let Some(sources) = self.reverse.get_mut(&target) {
                sources.remove(&(source, link));
                if sources.is_empty() {
                    self.reverse.remove(&target);
                }
            }
        }
    }

    /// Replaces all `link` targets of `source` with `targets` (in the given order).
    pub fn replace_targets(&mut self, source: NodeId, link: &str, targets: &[NodeId]) {
        for old in self.targets(source, link) {
            self.remove(source, old, link);
        }
        for &target in targets {
            self.add(source, target, link);
        }
    }

    /// Reorders the `link` targets of `source` with `key`.
    pub fn sort_targets_by_key<K: Ord>(&mut self, source: NodeId, mut key: impl FnMut(NodeId) -> K) {
        if let Some(targets) = self.forward.get_mut(&source) {
            targets.sort_by_key(|(t, _)| key(*t));
        }
    }

    pub fn len(&self) -> usize {
        self.forward.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

/// The in-memory document: a logical tree, a physical tree and the links between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitalDocument {
    nodes: BTreeMap<NodeId, DocStruct>,
    next_id: u64,
    logical_root: Option<NodeId>,
    physical_root: Option<NodeId>,
    references: ReferenceIndex,
}

impl Default for DigitalDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl DigitalDocument {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            next_id: 1,
            logical_root: None,
            physical_root: None,
            references: ReferenceIndex::default(),
        }
    }

    /// Creates a document with a single logical root of `type_name`.
    pub fn with_logical_root(type_name: &str) -> Self {
        let mut doc = Self::new();
        let root = doc.create(type_name);
        doc.logical_root = Some(root);
        doc
    }

    /// Creates a detached structure element.
    pub fn create(&mut self, type_name: &str) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, DocStruct::new(id, type_name));
        id
    }

    pub(crate) fn insert_with_id(&mut self, id: NodeId, type_name: &str) -> Result<(), DocumentError> {
        if self.nodes.contains_key(&id) {
            return Err(DocumentError::DuplicateNode(id));
        }
        self.nodes.insert(id, DocStruct::new(id, type_name));
        self.next_id = self.next_id.max(id.0 + 1);
        Ok(())
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub(crate) fn reserve_ids(&mut self, next: u64) {
        self.next_id = self.next_id.max(next);
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&DocStruct> {
        self.nodes.get(&id)
    }

    pub fn get(&self, id: NodeId) -> Result<&DocStruct, DocumentError> {
        self.nodes.get(&id).ok_or(DocumentError::UnknownNode(id))
    }

    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut DocStruct, DocumentError> {
        self.nodes.get_mut(&id).ok_or(DocumentError::UnknownNode(id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn logical_root(&self) -> Option<NodeId> {
        self.logical_root
    }

    pub fn physical_root(&self) -> Option<NodeId> {
        self.physical_root
    }

    pub fn set_logical_root(&mut self, id: NodeId) -> Result<(), DocumentError> {
        self.get(id)?;
        self.logical_root = Some(id);
        Ok(())
    }

    pub fn set_physical_root(&mut self, id: NodeId) -> Result<(), DocumentError> {
        self.get(id)?;
        self.physical_root = Some(id);
        Ok(())
    }

    pub fn references(&self) -> &ReferenceIndex {
        &self.references
    }

    pub fn references_mut(&mut self) -> &mut ReferenceIndex {
        &mut self.references
    }

    fn is_root(&self, id: NodeId) -> bool {
        self.logical_root == Some(id) || self.physical_root == Some(id)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(&id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Attaches a detached element below `parent`, at `index` or at the end.
    pub fn attach(&mut self, parent: NodeId, child: NodeId, index: Option<usize>) -> Result<(), DocumentError> {
        if self.get(child)?.parent.is_some() || self.is_root(child) {
            return Err(DocumentError::AlreadyAttached(child));
        }
        if child == parent || self.is_ancestor(child, parent) {
            return Err(DocumentError::Cycle(child));
        }
        let siblings = &mut self.get_mut(parent)?.children;
        let at = index.unwrap_or(siblings.len()).min(siblings.len());
        siblings.insert(at, child);
        self.get_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Detaches `child` from its parent. Returns the old parent and position.
    pub fn detach(&mut self, child: NodeId) -> Result<Option<(NodeId, usize)>, DocumentError> {
        if self.is_root(child) {
            return Err(DocumentError::RootImmutable);
        }
        let Some(parent) = self.get(child)?.parent else {
            return Ok(None);
        };
        let siblings = &mut self.get_mut(parent)?.children;
        let position = siblings.iter().position(|&c| c == child);
        if let Some(pos) = position {
            siblings.remove(pos);
        }
        self.get_mut(child)?.parent = None;
        Ok(position.map(|pos| (parent, pos)))
    }

    /// Moves `child` below `new_parent` at `index` (or at the end).
    pub fn reparent(&mut self, child: NodeId, new_parent: NodeId, index: Option<usize>) -> Result<(), DocumentError> {
        if self.is_root(child) {
            return Err(DocumentError::RootImmutable);
        }
        if child == new_parent || self.is_ancestor(child, new_parent) {
            return Err(DocumentError::Cycle(child));
        }
        self.get(new_parent)?;
        self.detach(child)?;
        self.attach(new_parent, child, index)
    }

    /// Removes `id` and everything below it, including every reference from or to
    /// the removed elements. Returns the removed ids.
    pub fn remove_subtree(&mut self, id: NodeId) -> Result<Vec<NodeId>, DocumentError> {
        self.detach(id)?;
        let removed = self.descendants(id);
        for &node in &removed {
            self.references.remove_all_from(node);
            self.references.remove_all_to(node);
            self.nodes.remove(&node);
        }
        Ok(removed)
    }

    /// `true` if `ancestor` lies on the parent chain of `node`.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.parent(p);
        }
        false
    }

    /// `id` and all elements below it, in pre-order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.get(&next) {
                out.push(next);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    pub fn logical_nodes(&self) -> Vec<NodeId> {
        self.logical_root.map(|root| self.descendants(root)).unwrap_or_default()
    }

    /// The physical sequence: `page` children of the physical root in tree order.
    pub fn pages(&self) -> Vec<NodeId> {
        let Some(root) = self.physical_root else {
            return Vec::new();
        };
        self.children(root)
            .iter()
            .copied()
            .filter(|id| self.nodes.get(id).map(|n| n.is_page()).unwrap_or(false))
            .collect()
    }

    /// Restores dense `physPageNumber` values 1..N in tree order.
    pub fn renumber_pages(&mut self) {
        for (index, page) in self.pages().into_iter().enumerate() {
            if let Ok(node) = self.get_mut(page) {
                set_value_on(node, PHYS_PAGE_NUMBER, &(index + 1).to_string());
            }
        }
    }

    pub fn first_value(&self, id: NodeId, type_name: &str) -> Option<&str> {
        self.nodes.get(&id).and_then(|n| n.first_value(type_name))
    }

    /// Sets the first metadata value of `type_name`, adding the field if absent.
    pub fn set_value(&mut self, id: NodeId, type_name: &str, value: &str) -> Result<(), DocumentError> {
        set_value_on(self.get_mut(id)?, type_name, value);
        Ok(())
    }

    /// Removes every metadata value of `type_name`. Returns how many were removed.
    pub fn remove_values(&mut self, id: NodeId, type_name: &str) -> Result<usize, DocumentError> {
        let node = self.get_mut(id)?;
        let before = node.metadata.len();
        node.metadata.retain(|m| m.type_name != type_name);
        Ok(before - node.metadata.len())
    }

    pub fn swap_content_files(&mut self, a: NodeId, b: NodeId) -> Result<(), DocumentError> {
        let first = self.get_mut(a)?.content_file.take();
        let second = match self.get_mut(b) {
            Ok(node) => node.content_file.take(),
            Err(e) => {
                self.get_mut(a)?.content_file = first;
                return Err(e);
            }
        };
        self.get_mut(a)?.content_file = second;
        self.get_mut(b)?.content_file = first;
        Ok(())
    }

    /// Drops empty metadata and persons bottom-up and removes elements no longer
    /// reachable from either root.
    pub fn compact(&mut self) {
        let mut reachable: BTreeSet<NodeId> = BTreeSet::new();
        for root in [self.logical_root, self.physical_root].into_iter().flatten() {
            reachable.extend(self.descendants(root));
        }
        let unreachable: Vec<NodeId> = self.nodes.keys().filter(|id| !reachable.contains(id)).copied().collect();
        for id in unreachable {
            self.references.remove_all_from(id);
            self.references.remove_all_to(id);
            self.nodes.remove(&id);
        }

        let mut order: Vec<NodeId> = Vec::new();
        for root in [self.logical_root, self.physical_root].into_iter().flatten() {
            order.extend(self.descendants(root));
        }
        for id in order.into_iter().rev() {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.metadata.retain(|m| !m.value.trim().is_empty());
                node.persons.retain(|p| !p.is_empty());
            }
        }
    }
}

fn set_value_on(node: &mut DocStruct, type_name: &str, value: &str) {
    match node.metadata.iter_mut().find(|m| m.type_name == type_name) {
        Some(existing) => existing.value = value.to_string(),
        None => node.metadata.push(Metadata { type_name: type_name.to_string(), value: value.to_string() }),
    }
}
