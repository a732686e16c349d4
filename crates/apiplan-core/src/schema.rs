//! Schema model: an arena of JSON-Schema-like type nodes
//!
//! Nodes are addressed by [`SchemaId`]. References between nodes are ids, so a
//! self-referential definition is simply a node whose property points back at
//! its own id. Nothing here recurses; walkers track visited ids themselves.

use std::collections::BTreeSet;

use indexmap::IndexMap;

/// Stable index of a node inside a [`SchemaArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaId(usize);

impl SchemaId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for SchemaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SchemaKind {
    Object,
    Array,
    String,
    Number,
    Integer,
    Boolean,
    Null,
    /// `oneOf` / `anyOf` / multi-type: see [`SchemaNode::variants`]
    Union,
    #[default]
    Unknown,
}

impl SchemaKind {
    /// Parse a JSON Schema `type` keyword value.
    #[must_use]
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            "null" => Some(Self::Null),
            _ => None,
        }
    }

    /// Kind of a concrete JSON value (used to infer the kind of enum-only schemas).
    #[must_use]
    pub fn of_value(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(_) => Self::Boolean,
            serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => Self::Integer,
            serde_json::Value::Number(_) => Self::Number,
            serde_json::Value::String(_) => Self::String,
            serde_json::Value::Array(_) => Self::Array,
            serde_json::Value::Object(_) => Self::Object,
        }
    }

    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Number | Self::Integer)
    }
}

/// One normalized type descriptor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaNode {
    pub kind: SchemaKind,
    /// Definition name when the node was reached through a named reference
    pub name: Option<String>,
    pub properties: IndexMap<String, SchemaId>,
    pub required: BTreeSet<String>,
    /// Element type; present iff `kind == Array`
    pub items: Option<SchemaId>,
    /// Alternatives; non-empty iff `kind == Union`
    pub variants: Vec<SchemaId>,
    pub format: Option<String>,
    pub enum_values: Option<Vec<serde_json::Value>>,
    pub nullable: bool,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: bool,
    pub exclusive_maximum: bool,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<String>,
    pub example: Option<serde_json::Value>,
    pub description: Option<String>,
}

impl SchemaNode {
    #[must_use]
    pub fn of_kind(kind: SchemaKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_uuid(&self) -> bool {
        self.format.as_deref() == Some("uuid")
    }

    #[must_use]
    pub fn has_enum(&self) -> bool {
        self.enum_values.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// A plain string: string kind without an enum.
    #[must_use]
    pub fn is_free_string(&self) -> bool {
        self.kind == SchemaKind::String && !self.has_enum()
    }
}

/// Owner of every [`SchemaNode`] in a document.
#[derive(Debug, Clone, Default)]
pub struct SchemaArena {
    nodes: Vec<SchemaNode>,
}

impl SchemaArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, node: SchemaNode) -> SchemaId {
        self.nodes.push(node);
        SchemaId(self.nodes.len() - 1)
    }

    /// Reserve an id whose node is filled in later with [`SchemaArena::set`].
    pub fn reserve(&mut self) -> SchemaId {
        self.alloc(SchemaNode::default())
    }

    pub fn set(&mut self, id: SchemaId, node: SchemaNode) {
        self.nodes[id.0] = node;
    }

    /// # Panics
    ///
    /// Panics if `id` was not allocated by this arena.
    #[must_use]
    pub fn get(&self, id: SchemaId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drop every node allocated at or after `len`. Used to roll back a
    /// failed operation build; earlier nodes never point past `len`.
    pub fn truncate(&mut self, len: usize) {
        self.nodes.truncate(len);
    }

    pub fn iter(&self) -> impl Iterator<Item = (SchemaId, &SchemaNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (SchemaId(i), n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_returns_sequential_ids() {
        let mut arena = SchemaArena::new();
        let a = arena.alloc(SchemaNode::of_kind(SchemaKind::String));
        let b = arena.alloc(SchemaNode::of_kind(SchemaKind::Integer));
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(arena.get(b).kind, SchemaKind::Integer);
    }

    #[test]
    fn reserved_node_can_point_at_itself() {
        let mut arena = SchemaArena::new();
        let id = arena.reserve();
        let mut node = SchemaNode::of_kind(SchemaKind::Object);
        node.properties.insert("parent".into(), id);
        arena.set(id, node);
        assert_eq!(arena.get(id).properties["parent"], id);
    }

    #[test]
    fn truncate_drops_tail() {
        let mut arena = SchemaArena::new();
        arena.alloc(SchemaNode::default());
        arena.alloc(SchemaNode::default());
        arena.truncate(1);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn kind_of_enum_value() {
        assert_eq!(SchemaKind::of_value(&serde_json::json!("a")), SchemaKind::String);
        assert_eq!(SchemaKind::of_value(&serde_json::json!(3)), SchemaKind::Integer);
        assert_eq!(SchemaKind::of_value(&serde_json::json!(3.5)), SchemaKind::Number);
    }

    #[test]
    fn free_string_excludes_enums() {
        let mut node = SchemaNode::of_kind(SchemaKind::String);
        assert!(node.is_free_string());
        node.enum_values = Some(vec![serde_json::json!("a")]);
        assert!(!node.is_free_string());
    }
}
