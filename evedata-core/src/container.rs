//! Container resource and item model.
//!
//! A [`ContainerSource`] is a read-only accessor over one hierarchical file.
//! Every call opens the underlying file, reads what is needed and closes it
//! again; nothing is held open between calls. [`Resource`] wraps a source and
//! builds the immutable [`Item`] tree, attaching a [`DeferredRead`] token to
//! each leaf so payloads are only read when asked for.

use crate::error::{Error, Result};
use crate::value::{Ragged, Value};
use std::fmt;
use std::sync::Arc;

/// Attribute value attached to a container item.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl AttrValue {
    /// Text view of the value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view; text is parsed.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Integer view; text is parsed.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            Self::Float(_) => None,
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

/// Attributes of an item, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    entries: Vec<(String, AttrValue)>,
}

impl Attributes {
    /// Creates an empty attribute map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an attribute.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Attribute rendered as text, whatever its stored type.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<String> {
        self.get(name).map(ToString::to_string)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<AttrValue>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attrs = Self::new();
        for (k, v) in iter {
            attrs.insert(k, v);
        }
        attrs
    }
}

/// One column of leaf payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Text(Vec<String>),
    /// One 1-D array per row.
    Array(Vec<Vec<f64>>),
}

/// Storage type of one compound field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Int,
    Float,
    Text,
    Array,
}

impl FieldType {
    /// Returns true for integer and float fields.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }
}

impl Column {
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Int(_) => FieldType::Int,
            Self::Float(_) => FieldType::Float,
            Self::Text(_) => FieldType::Text,
            Self::Array(_) => FieldType::Array,
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Int(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Text(v) => v.len(),
            Self::Array(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Integer view of the column, if every value is integral.
    #[must_use]
    pub fn to_i64(&self) -> Option<Vec<i64>> {
        match self {
            Self::Int(v) => Some(v.clone()),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(v) => v
                .iter()
                .map(|x| (x.fract() == 0.0).then_some(*x as i64))
                .collect(),
            Self::Text(v) => v.iter().map(|s| s.trim().parse().ok()).collect(),
            Self::Array(_) => None,
        }
    }

    /// Returns true for text columns.
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    /// Converts the column into ragged rows; array rows keep all elements.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn into_ragged(self) -> Ragged<Value> {
        match self {
            Self::Int(v) => Ragged::from_scalars(v.into_iter().map(|x| Value::Number(x as f64)).collect()),
            Self::Float(v) => Ragged::from_scalars(v.into_iter().map(Value::Number).collect()),
            Self::Text(v) => Ragged::from_scalars(v.into_iter().map(Value::Text).collect()),
            Self::Array(v) => Ragged::from_rows(
                v.into_iter()
                    .map(|row| row.into_iter().map(Value::Number).collect::<Vec<_>>()),
            ),
        }
    }
}

/// Owned payload of one leaf: ordered, named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeafData {
    columns: Vec<(String, Column)>,
}

impl LeafData {
    /// Creates empty leaf data.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column (builder style).
    #[must_use]
    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Self {
        self.columns.push((name.into(), column));
        self
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    /// Removes and returns a column.
    pub fn take_column(&mut self, name: &str) -> Option<Column> {
        let pos = self.columns.iter().position(|(n, _)| n == name)?;
        Some(self.columns.remove(pos).1)
    }

    /// Column names in file order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    /// Columns with their names, in file order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(n, c)| (n.as_str(), c))
    }

    /// Consumes the data into its columns, in file order.
    pub fn into_columns(self) -> impl Iterator<Item = (String, Column)> {
        self.columns.into_iter()
    }

    /// Number of rows of the first column.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.columns.first().map_or(0, |(_, c)| c.len())
    }
}

/// Raw node produced by a [`ContainerSource`] scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub attributes: Attributes,
    pub kind: NodeKind,
}

/// Group or leaf body of a [`Node`].
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Group(Vec<Node>),
    Leaf {
        fields: Vec<(String, FieldType)>,
        rows: usize,
    },
}

/// Read-only access to one on-disk container.
///
/// Implementations must not keep the underlying file open between calls.
pub trait ContainerSource: Send + Sync + fmt::Debug {
    /// Stable identity of the resource, e.g. its file name.
    fn identity(&self) -> &str;

    /// Reads structure and attributes, no payload.
    ///
    /// # Errors
    /// Returns an error if the container cannot be opened or walked.
    fn scan(&self) -> Result<Node>;

    /// Reads the payload of the leaf at `path`.
    ///
    /// # Errors
    /// Returns [`Error::MissingItem`] for unknown paths, or a backend error.
    fn read(&self, path: &str) -> Result<LeafData>;
}

/// Shared handle on a container source.
#[derive(Clone)]
pub struct Resource {
    source: Arc<dyn ContainerSource>,
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Resource").field(&self.identity()).finish()
    }
}

impl Resource {
    pub fn new<S: ContainerSource + 'static>(source: S) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    #[must_use]
    pub fn identity(&self) -> &str {
        self.source.identity()
    }

    /// Scans the container and builds the item tree.
    ///
    /// # Errors
    /// Returns an error if the scan fails or the root is not a group.
    pub fn root(&self) -> Result<GroupItem> {
        let node = self.source.scan()?;
        match self.build("/".to_string(), node) {
            Item::Group(group) => Ok(group),
            Item::Leaf(leaf) => Err(Error::schema(leaf.path, "container root is not a group")),
        }
    }

    /// Reads one leaf.
    ///
    /// # Errors
    /// Propagates backend errors.
    pub fn read(&self, path: &str) -> Result<LeafData> {
        self.source.read(path)
    }

    fn build(&self, path: String, node: Node) -> Item {
        match node.kind {
            NodeKind::Group(children) => {
                let children = children
                    .into_iter()
                    .map(|child| {
                        let child_path = join_path(&path, &child.name);
                        self.build(child_path, child)
                    })
                    .collect();
                Item::Group(GroupItem {
                    path,
                    attributes: node.attributes,
                    children,
                })
            }
            NodeKind::Leaf { fields, rows } => Item::Leaf(LeafItem {
                types: fields.iter().map(|(_, t)| *t).collect(),
                fields: fields.into_iter().map(|(n, _)| n).collect(),
                reader: DeferredRead {
                    resource: self.clone(),
                    path: path.clone(),
                },
                path,
                attributes: node.attributes,
                rows,
            }),
        }
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Token for a deferred leaf read: resource identity plus item path.
#[derive(Clone, Debug)]
pub struct DeferredRead {
    resource: Resource,
    path: String,
}

impl DeferredRead {
    pub fn new(resource: Resource, path: impl Into<String>) -> Self {
        Self {
            resource,
            path: path.into(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn identity(&self) -> &str {
        self.resource.identity()
    }

    /// Opens the resource, reads the leaf and closes the resource again.
    ///
    /// # Errors
    /// Propagates backend errors.
    pub fn load(&self) -> Result<LeafData> {
        self.resource.read(&self.path)
    }
}

/// Item of the container hierarchy.
#[derive(Debug, Clone)]
pub enum Item {
    Group(GroupItem),
    Leaf(LeafItem),
}

impl Item {
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Group(g) => &g.path,
            Self::Leaf(l) => &l.path,
        }
    }

    /// Last path component.
    #[must_use]
    pub fn name(&self) -> &str {
        basename(self.path())
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        match self {
            Self::Group(g) => &g.attributes,
            Self::Leaf(l) => &l.attributes,
        }
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Group item with ordered children.
#[derive(Debug, Clone)]
pub struct GroupItem {
    path: String,
    attributes: Attributes,
    children: Vec<Item>,
}

impl GroupItem {
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn name(&self) -> &str {
        basename(&self.path)
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    #[must_use]
    pub fn children(&self) -> &[Item] {
        &self.children
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Item> {
        self.children.iter().find(|item| item.name() == name)
    }

    #[must_use]
    pub fn group(&self, name: &str) -> Option<&GroupItem> {
        match self.get(name)? {
            Item::Group(g) => Some(g),
            Item::Leaf(_) => None,
        }
    }

    #[must_use]
    pub fn leaf(&self, name: &str) -> Option<&LeafItem> {
        match self.get(name)? {
            Item::Leaf(l) => Some(l),
            Item::Group(_) => None,
        }
    }

    /// Resolves a relative path such as `c1/main`.
    #[must_use]
    pub fn find(&self, path: &str) -> Option<&Item> {
        let mut parts = path.split('/').filter(|p| !p.is_empty());
        let first = parts.next()?;
        let mut item = self.get(first)?;
        for part in parts {
            match item {
                Item::Group(g) => item = g.get(part)?,
                Item::Leaf(_) => return None,
            }
        }
        Some(item)
    }

    /// Like [`GroupItem::find`], restricted to groups.
    #[must_use]
    pub fn find_group(&self, path: &str) -> Option<&GroupItem> {
        match self.find(path)? {
            Item::Group(g) => Some(g),
            Item::Leaf(_) => None,
        }
    }

    /// Child groups.
    pub fn groups(&self) -> impl Iterator<Item = &GroupItem> {
        self.children.iter().filter_map(|item| match item {
            Item::Group(g) => Some(g),
            Item::Leaf(_) => None,
        })
    }

    /// Child leaves.
    pub fn leaves(&self) -> impl Iterator<Item = &LeafItem> {
        self.children.iter().filter_map(|item| match item {
            Item::Leaf(l) => Some(l),
            Item::Group(_) => None,
        })
    }
}

/// Leaf item: attributes, field layout and a deferred reader.
#[derive(Debug, Clone)]
pub struct LeafItem {
    path: String,
    attributes: Attributes,
    fields: Vec<String>,
    types: Vec<FieldType>,
    rows: usize,
    reader: DeferredRead,
}

impl LeafItem {
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn name(&self) -> &str {
        basename(&self.path)
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Compound field names, in file order.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Storage type of a field.
    #[must_use]
    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        let pos = self.fields.iter().position(|f| f == name)?;
        self.types.get(pos).copied()
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn reader(&self) -> &DeferredRead {
        &self.reader
    }

    /// Reads the payload.
    ///
    /// # Errors
    /// Propagates backend errors.
    pub fn load(&self) -> Result<LeafData> {
        self.reader.load()
    }
}
