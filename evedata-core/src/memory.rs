//! In-memory container source.
//!
//! Mirrors the on-disk hierarchy without a file. Used to assemble containers
//! programmatically and as fixture backend in tests. Leaf reads are counted,
//! so deferred loading can be observed.

use crate::container::{AttrValue, Attributes, ContainerSource, LeafData, Node, NodeKind};
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
struct MemoryGroup {
    attributes: Attributes,
    children: Vec<(String, MemoryItem)>,
}

#[derive(Debug, Clone)]
enum MemoryItem {
    Group(MemoryGroup),
    Leaf {
        attributes: Attributes,
        data: LeafData,
    },
}

impl MemoryGroup {
    fn child_group(&mut self, name: &str) -> Result<&mut MemoryGroup> {
        let pos = match self.children.iter().position(|(n, _)| n == name) {
            Some(pos) => pos,
            None => {
                self.children
                    .push((name.to_string(), MemoryItem::Group(MemoryGroup::default())));
                self.children.len() - 1
            }
        };
        match &mut self.children[pos].1 {
            MemoryItem::Group(g) => Ok(g),
            MemoryItem::Leaf { .. } => Err(Error::Container(format!("{name} is a leaf"))),
        }
    }

    fn get(&self, name: &str) -> Option<&MemoryItem> {
        self.children.iter().find(|(n, _)| n == name).map(|(_, i)| i)
    }

    fn to_node(&self, name: &str) -> Node {
        let children = self
            .children
            .iter()
            .map(|(child, item)| match item {
                MemoryItem::Group(g) => g.to_node(child),
                MemoryItem::Leaf { attributes, data } => Node {
                    name: child.clone(),
                    attributes: attributes.clone(),
                    kind: NodeKind::Leaf {
                        fields: data.fields().map(|(n, c)| (n.to_string(), c.field_type())).collect(),
                        rows: data.rows(),
                    },
                },
            })
            .collect();
        Node {
            name: name.to_string(),
            attributes: self.attributes.clone(),
            kind: NodeKind::Group(children),
        }
    }
}

/// Container held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryContainer {
    identity: String,
    root: MemoryGroup,
    reads: Arc<AtomicUsize>,
}

impl MemoryContainer {
    /// Creates an empty container with the given identity.
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            ..Self::default()
        }
    }

    /// Sets an attribute on the group or leaf at `path` ("/" for the root).
    ///
    /// Missing groups along the path are created.
    ///
    /// # Errors
    /// Returns an error if a path component is a leaf.
    pub fn set_attr(&mut self, path: &str, name: &str, value: impl Into<AttrValue>) -> Result<()> {
        let (parent, last) = split_parent(path);
        let Some(last) = last else {
            self.root.attributes.insert(name, value);
            return Ok(());
        };
        let group = self.group_mut(parent)?;
        if let Some((_, MemoryItem::Leaf { attributes, .. })) =
            group.children.iter_mut().find(|(n, _)| n == last)
        {
            attributes.insert(name, value);
            return Ok(());
        }
        group.child_group(last)?.attributes.insert(name, value);
        Ok(())
    }

    /// Creates the group at `path` including missing parents.
    ///
    /// # Errors
    /// Returns an error if a path component is a leaf.
    pub fn add_group(&mut self, path: &str) -> Result<()> {
        self.group_mut(path).map(|_| ())
    }

    /// Adds a leaf at `path`, replacing any leaf of the same name.
    ///
    /// # Errors
    /// Returns an error if a parent path component is a leaf.
    pub fn add_leaf(&mut self, path: &str, attributes: Attributes, data: LeafData) -> Result<()> {
        let (parent, last) = split_parent(path);
        let last = last.ok_or_else(|| Error::Container("leaf path must not be the root".into()))?;
        let group = self.group_mut(parent)?;
        let item = MemoryItem::Leaf { attributes, data };
        if let Some(entry) = group.children.iter_mut().find(|(n, _)| n == last) {
            entry.1 = item;
        } else {
            group.children.push((last.to_string(), item));
        }
        Ok(())
    }

    /// Counter of leaf payload reads, shared with clones of the container.
    #[must_use]
    pub fn read_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.reads)
    }

    fn group_mut(&mut self, path: &str) -> Result<&mut MemoryGroup> {
        let mut group = &mut self.root;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            group = group.child_group(part)?;
        }
        Ok(group)
    }
}

fn split_parent(path: &str) -> (&str, Option<&str>) {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return ("/", None);
    }
    match trimmed.rsplit_once('/') {
        Some((parent, last)) => (parent, Some(last)),
        None => ("/", Some(trimmed)),
    }
}

impl ContainerSource for MemoryContainer {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn scan(&self) -> Result<Node> {
        Ok(self.root.to_node(""))
    }

    fn read(&self, path: &str) -> Result<LeafData> {
        let mut group = &self.root;
        let mut parts = path.split('/').filter(|p| !p.is_empty()).peekable();
        while let Some(part) = parts.next() {
            match group.get(part) {
                Some(MemoryItem::Group(g)) if parts.peek().is_some() => group = g,
                Some(MemoryItem::Leaf { data, .. }) if parts.peek().is_none() => {
                    self.reads.fetch_add(1, Ordering::Relaxed);
                    return Ok(data.clone());
                }
                _ => break,
            }
        }
        Err(Error::MissingItem(path.to_string()))
    }
}
