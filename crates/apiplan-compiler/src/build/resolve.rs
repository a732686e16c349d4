//! `$ref` resolution into the schema arena
//!
//! References are memoized by pointer: every `$ref` to the same definition
//! yields the same [`SchemaId`]. The id is reserved before the target is
//! walked, so a definition that refers back to itself resolves to its own
//! (still under construction) id instead of recursing forever.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use apiplan_core::{BuildError, SchemaArena, SchemaId, SchemaKind, SchemaNode};

/// Snapshot for rolling back a failed operation build.
#[derive(Debug, Clone, Copy)]
pub(super) struct Mark {
    arena_len: usize,
    journal_len: usize,
}

pub(super) struct SchemaResolver<'d> {
    root: &'d Value,
    arena: SchemaArena,
    memo: HashMap<String, SchemaId>,
    /// Pointers memoized so far, in insertion order
    journal: Vec<String>,
    /// Reserved ids whose node is still being built
    in_progress: HashSet<SchemaId>,
    /// Pointers currently being followed through pure `$ref` aliases
    alias_stack: Vec<String>,
}

impl<'d> SchemaResolver<'d> {
    pub(super) fn new(root: &'d Value) -> Self {
        Self {
            root,
            arena: SchemaArena::new(),
            memo: HashMap::new(),
            journal: Vec::new(),
            in_progress: HashSet::new(),
            alias_stack: Vec::new(),
        }
    }

    pub(super) fn mark(&self) -> Mark {
        Mark {
            arena_len: self.arena.len(),
            journal_len: self.journal.len(),
        }
    }

    /// Forget everything resolved since `mark`. Nodes allocated earlier are
    /// complete and never reference the discarded tail.
    pub(super) fn rollback(&mut self, mark: Mark) {
        for pointer in self.journal.drain(mark.journal_len..) {
            self.memo.remove(&pointer);
        }
        self.arena.truncate(mark.arena_len);
        self.in_progress.clear();
        self.alias_stack.clear();
    }

    pub(super) fn into_arena(self) -> SchemaArena {
        self.arena
    }

    pub(super) fn arena(&self) -> &SchemaArena {
        &self.arena
    }

    /// Look up an internal JSON pointer (`#/components/schemas/Pet`).
    pub(super) fn lookup(&self, pointer: &str) -> Result<&'d Value, BuildError> {
        let Some(fragment) = pointer.strip_prefix('#') else {
            return Err(BuildError::unsupported(pointer, "external reference"));
        };
        self.root
            .pointer(fragment)
            .ok_or_else(|| BuildError::dangling(pointer))
    }

    /// Follow `$ref` chains on a non-schema object (parameter, response,
    /// request body) until a concrete object is reached.
    pub(super) fn deref(&self, value: &'d Value) -> Result<&'d Value, BuildError> {
        let mut current = value;
        let mut seen: Vec<&str> = Vec::new();
        while let Some(pointer) = current.get("$ref").and_then(Value::as_str) {
            if seen.contains(&pointer) {
                return Err(BuildError::unsupported(pointer, "circular $ref alias"));
            }
            seen.push(pointer);
            current = self.lookup(pointer)?;
        }
        Ok(current)
    }

    /// Resolve a schema value (inline or `$ref`) to an arena id.
    pub(super) fn schema(&mut self, value: &'d Value, location: &str) -> Result<SchemaId, BuildError> {
        if let Some(pointer) = value.get("$ref").and_then(Value::as_str) {
            return self.resolve_ref(pointer);
        }
        let node = self.build_node(value, location)?;
        Ok(self.arena.alloc(node))
    }

    /// Allocate a node directly (synthesized parameters, implicit items).
    pub(super) fn alloc(&mut self, node: SchemaNode) -> SchemaId {
        self.arena.alloc(node)
    }

    fn remember(&mut self, pointer: &str, id: SchemaId) {
        self.memo.insert(pointer.to_string(), id);
        self.journal.push(pointer.to_string());
    }

    fn resolve_ref(&mut self, pointer: &str) -> Result<SchemaId, BuildError> {
        if let Some(&id) = self.memo.get(pointer) {
            return Ok(id);
        }

        let target = self.lookup(pointer)?;

        // Pure alias: share the id of whatever it points at
        if let Some(next) = target.get("$ref").and_then(Value::as_str) {
            if self.alias_stack.iter().any(|p| p == pointer) {
                return Err(BuildError::unsupported(pointer, "circular $ref alias"));
            }
            self.alias_stack.push(pointer.to_string());
            let resolved = self.resolve_ref(next);
            self.alias_stack.pop();
            let id = resolved?;
            self.remember(pointer, id);
            return Ok(id);
        }

        let id = self.arena.reserve();
        self.remember(pointer, id);
        self.in_progress.insert(id);

        let mut node = self.build_node(target, pointer)?;
        if node.name.is_none() {
            node.name = pointer.rsplit('/').next().map(str::to_string);
        }

        self.in_progress.remove(&id);
        self.arena.set(id, node);
        Ok(id)
    }

    /// Build a node from a schema object. Children are resolved (and
    /// allocated) first; the caller allocates or fills in the result.
    pub(super) fn build_node(&mut self, value: &'d Value, location: &str) -> Result<SchemaNode, BuildError> {
        let Some(obj) = value.as_object() else {
            // `true` / `{}`-like schemas accept anything
            return Ok(SchemaNode::default());
        };

        if obj.contains_key("not") {
            return Err(BuildError::unsupported(location, "not"));
        }

        let mut node = SchemaNode::default();
        let mut multi_types: Vec<SchemaKind> = Vec::new();

        match obj.get("type") {
            Some(Value::String(t)) => {
                node.kind = SchemaKind::from_type_name(t).ok_or_else(|| {
                    BuildError::unsupported(location, format!("type '{t}'"))
                })?;
            }
            Some(Value::Array(types)) => {
                for t in types.iter().filter_map(Value::as_str) {
                    match SchemaKind::from_type_name(t) {
                        Some(SchemaKind::Null) => node.nullable = true,
                        Some(kind) => multi_types.push(kind),
                        None => {
                            return Err(BuildError::unsupported(location, format!("type '{t}'")));
                        }
                    }
                }
                node.kind = match multi_types.as_slice() {
                    [] if node.nullable => SchemaKind::Null,
                    [] => SchemaKind::Unknown,
                    [single] => *single,
                    _ => SchemaKind::Union,
                };
            }
            _ => {}
        }

        node.format = str_field(obj, "format");
        node.pattern = str_field(obj, "pattern");
        node.description = str_field(obj, "description");
        node.enum_values = obj
            .get("enum")
            .and_then(Value::as_array)
            .filter(|e| !e.is_empty())
            .cloned();
        if obj.get("nullable").and_then(Value::as_bool) == Some(true) {
            node.nullable = true;
        }
        node.example = obj.get("example").cloned().or_else(|| {
            obj.get("examples")
                .and_then(Value::as_array)
                .and_then(|e| e.first())
                .cloned()
        });

        node.minimum = obj.get("minimum").and_then(Value::as_f64);
        node.maximum = obj.get("maximum").and_then(Value::as_f64);
        // OAS 3.0: boolean flag; OAS 3.1 / JSON Schema 2019+: the bound itself
        match obj.get("exclusiveMinimum") {
            Some(Value::Bool(b)) => node.exclusive_minimum = *b,
            Some(v) if v.is_number() => {
                node.minimum = v.as_f64();
                node.exclusive_minimum = true;
            }
            _ => {}
        }
        match obj.get("exclusiveMaximum") {
            Some(Value::Bool(b)) => node.exclusive_maximum = *b,
            Some(v) if v.is_number() => {
                node.maximum = v.as_f64();
                node.exclusive_maximum = true;
            }
            _ => {}
        }
        node.min_length = obj.get("minLength").and_then(Value::as_u64);
        node.max_length = obj.get("maxLength").and_then(Value::as_u64);

        // Kind inference when `type` is absent
        if node.kind == SchemaKind::Unknown && obj.get("type").is_none() {
            if obj.contains_key("properties") {
                node.kind = SchemaKind::Object;
            } else if obj.contains_key("items") {
                node.kind = SchemaKind::Array;
            } else if let Some(first) = node.enum_values.as_ref().and_then(|e| e.first()) {
                node.kind = SchemaKind::of_value(first);
            }
        }

        if multi_types.len() > 1 {
            for kind in multi_types {
                let variant = self.arena.alloc(SchemaNode::of_kind(kind));
                node.variants.push(variant);
            }
        }

        if let Some(props) = obj.get("properties").and_then(Value::as_object) {
            for (name, prop) in props {
                let child = self.schema(prop, &format!("{location}/properties/{name}"))?;
                node.properties.insert(name.clone(), child);
            }
        }
        if let Some(required) = obj.get("required").and_then(Value::as_array) {
            node.required = required
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }

        if node.kind == SchemaKind::Array {
            let items = match obj.get("items") {
                Some(items) => self.schema(items, &format!("{location}/items"))?,
                None => self.arena.alloc(SchemaNode::default()),
            };
            node.items = Some(items);
        }

        if let Some(parts) = obj.get("allOf").and_then(Value::as_array) {
            self.merge_all_of(&mut node, parts, location)?;
        }

        for key in ["oneOf", "anyOf"] {
            if let Some(parts) = obj.get(key).and_then(Value::as_array) {
                if parts.is_empty() {
                    return Err(BuildError::unsupported(location, format!("empty {key}")));
                }
                for (i, part) in parts.iter().enumerate() {
                    let variant = self.schema(part, &format!("{location}/{key}/{i}"))?;
                    if self.arena.get(variant).kind == SchemaKind::Null {
                        node.nullable = true;
                    }
                    node.variants.push(variant);
                }
                node.kind = SchemaKind::Union;
                node.properties.clear();
                node.items = None;
            }
        }

        Ok(node)
    }

    /// Fold `allOf` parts into `node`. Object parts merge their properties
    /// and required sets; a single non-object part may supply a primitive
    /// kind. Anything else cannot be modeled as one node.
    fn merge_all_of(
        &mut self,
        node: &mut SchemaNode,
        parts: &'d [Value],
        location: &str,
    ) -> Result<(), BuildError> {
        for (i, part) in parts.iter().enumerate() {
            let part_location = format!("{location}/allOf/{i}");
            let id = self.schema(part, &part_location)?;
            if self.in_progress.contains(&id) {
                return Err(BuildError::unsupported(
                    part_location,
                    "allOf through a self-referential definition",
                ));
            }
            let part_node = self.arena.get(id).clone();

            match part_node.kind {
                SchemaKind::Object | SchemaKind::Unknown => {
                    if part_node.kind == SchemaKind::Object || !part_node.properties.is_empty() {
                        if !matches!(node.kind, SchemaKind::Object | SchemaKind::Unknown) {
                            return Err(BuildError::unsupported(
                                part_location,
                                "allOf mixing object and non-object parts",
                            ));
                        }
                        node.kind = SchemaKind::Object;
                    }
                    for (name, child) in part_node.properties {
                        node.properties.insert(name, child);
                    }
                    node.required.extend(part_node.required);
                    node.nullable |= part_node.nullable;
                }
                kind => {
                    let compatible = node.kind == kind
                        || (node.kind == SchemaKind::Unknown && node.properties.is_empty());
                    if !compatible {
                        return Err(BuildError::unsupported(
                            part_location,
                            "allOf mixing incompatible types",
                        ));
                    }
                    node.kind = kind;
                    node.items = node.items.or(part_node.items);
                    node.variants.extend(part_node.variants);
                    node.format = node.format.take().or(part_node.format);
                    node.pattern = node.pattern.take().or(part_node.pattern);
                    node.enum_values = node.enum_values.take().or(part_node.enum_values);
                    node.minimum = node.minimum.or(part_node.minimum);
                    node.maximum = node.maximum.or(part_node.maximum);
                    node.exclusive_minimum |= part_node.exclusive_minimum;
                    node.exclusive_maximum |= part_node.exclusive_maximum;
                    node.min_length = node.min_length.or(part_node.min_length);
                    node.max_length = node.max_length.or(part_node.max_length);
                    node.nullable |= part_node.nullable;
                }
            }
            if node.name.is_none() {
                node.name = part_node.name;
            }
        }
        if node.kind != SchemaKind::Object {
            return Ok(());
        }
        node.items = None;
        Ok(())
    }
}

fn str_field(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "components": {"schemas": {
                "Node": {
                    "type": "object",
                    "required": ["id"],
                    "properties": {
                        "id": {"type": "string", "format": "uuid"},
                        "parent": {"$ref": "#/components/schemas/Node"},
                        "children": {"type": "array", "items": {"$ref": "#/components/schemas/Node"}}
                    }
                },
                "Alias": {"$ref": "#/components/schemas/Node"},
                "LoopA": {"$ref": "#/components/schemas/LoopB"},
                "LoopB": {"$ref": "#/components/schemas/LoopA"},
                "Broken": {"type": "object", "properties": {"x": {"$ref": "#/components/schemas/Gone"}}},
                "Named": {"type": "object", "properties": {"n": {"type": "string"}}},
                "Extended": {
                    "allOf": [
                        {"$ref": "#/components/schemas/Named"},
                        {"type": "object", "required": ["m"], "properties": {"m": {"type": "integer"}}}
                    ]
                },
                "Clash": {"allOf": [{"type": "string"}, {"type": "object", "properties": {"a": {}}}]},
                "Negated": {"not": {"type": "string"}},
                "Maybe": {"type": ["string", "null"], "maxLength": 5},
                "Choice": {"oneOf": [{"type": "string"}, {"type": "integer"}]},
                "Exclusive": {"type": "number", "exclusiveMinimum": 0, "maximum": 10}
            }}
        })
    }

    #[test]
    fn self_reference_shares_identity() {
        let d = doc();
        let mut r = SchemaResolver::new(&d);
        let id = r.resolve_ref("#/components/schemas/Node").unwrap();
        let node = r.arena().get(id);
        assert_eq!(node.kind, SchemaKind::Object);
        assert_eq!(node.properties["parent"], id);
        let children = r.arena().get(node.properties["children"]);
        assert_eq!(children.items, Some(id));
        assert_eq!(node.name.as_deref(), Some("Node"));
    }

    #[test]
    fn repeated_refs_are_memoized() {
        let d = doc();
        let mut r = SchemaResolver::new(&d);
        let a = r.resolve_ref("#/components/schemas/Node").unwrap();
        let len = r.arena().len();
        let b = r.resolve_ref("#/components/schemas/Node").unwrap();
        assert_eq!(a, b);
        assert_eq!(r.arena().len(), len);
    }

    #[test]
    fn alias_shares_target_id() {
        let d = doc();
        let mut r = SchemaResolver::new(&d);
        let alias = r.resolve_ref("#/components/schemas/Alias").unwrap();
        let node = r.resolve_ref("#/components/schemas/Node").unwrap();
        assert_eq!(alias, node);
    }

    #[test]
    fn alias_loop_is_unsupported() {
        let d = doc();
        let mut r = SchemaResolver::new(&d);
        let err = r.resolve_ref("#/components/schemas/LoopA").unwrap_err();
        assert!(matches!(err, BuildError::UnsupportedSchemaConstruct { .. }));
    }

    #[test]
    fn dangling_reference_names_pointer() {
        let d = doc();
        let mut r = SchemaResolver::new(&d);
        let err = r.resolve_ref("#/components/schemas/Broken").unwrap_err();
        assert_eq!(err, BuildError::dangling("#/components/schemas/Gone"));
    }

    #[test]
    fn rollback_forgets_partial_work() {
        let d = doc();
        let mut r = SchemaResolver::new(&d);
        let mark = r.mark();
        assert!(r.resolve_ref("#/components/schemas/Broken").is_err());
        r.rollback(mark);
        assert_eq!(r.arena().len(), 0);
        // Broken is attempted afresh, not served from a stale placeholder
        assert!(r.resolve_ref("#/components/schemas/Broken").is_err());
    }

    #[test]
    fn external_reference_is_unsupported() {
        let d = doc();
        let r = SchemaResolver::new(&d);
        let err = r.lookup("other.yaml#/Pet").unwrap_err();
        assert!(matches!(err, BuildError::UnsupportedSchemaConstruct { .. }));
    }

    #[test]
    fn all_of_merges_objects() {
        let d = doc();
        let mut r = SchemaResolver::new(&d);
        let id = r.resolve_ref("#/components/schemas/Extended").unwrap();
        let node = r.arena().get(id);
        assert_eq!(node.kind, SchemaKind::Object);
        assert!(node.properties.contains_key("n"));
        assert!(node.properties.contains_key("m"));
        assert!(node.required.contains("m"));
    }

    #[test]
    fn all_of_clash_is_unsupported() {
        let d = doc();
        let mut r = SchemaResolver::new(&d);
        let err = r.resolve_ref("#/components/schemas/Clash").unwrap_err();
        assert!(matches!(err, BuildError::UnsupportedSchemaConstruct { .. }));
    }

    #[test]
    fn not_is_unsupported() {
        let d = doc();
        let mut r = SchemaResolver::new(&d);
        let err = r.resolve_ref("#/components/schemas/Negated").unwrap_err();
        assert!(err.to_string().contains("not"));
    }

    #[test]
    fn type_array_with_null_is_nullable() {
        let d = doc();
        let mut r = SchemaResolver::new(&d);
        let id = r.resolve_ref("#/components/schemas/Maybe").unwrap();
        let node = r.arena().get(id);
        assert_eq!(node.kind, SchemaKind::String);
        assert!(node.nullable);
        assert_eq!(node.max_length, Some(5));
    }

    #[test]
    fn one_of_becomes_union() {
        let d = doc();
        let mut r = SchemaResolver::new(&d);
        let id = r.resolve_ref("#/components/schemas/Choice").unwrap();
        let node = r.arena().get(id);
        assert_eq!(node.kind, SchemaKind::Union);
        assert_eq!(node.variants.len(), 2);
    }

    #[test]
    fn numeric_exclusive_minimum_as_bound() {
        let d = doc();
        let mut r = SchemaResolver::new(&d);
        let id = r.resolve_ref("#/components/schemas/Exclusive").unwrap();
        let node = r.arena().get(id);
        assert_eq!(node.minimum, Some(0.0));
        assert!(node.exclusive_minimum);
        assert_eq!(node.maximum, Some(10.0));
    }

    #[test]
    fn kind_inferred_without_type() {
        let d = json!({});
        let props = json!({"properties": {"a": {"type": "string"}}});
        let items = json!({"items": {"type": "string"}});
        let enum_only = json!({"enum": [1, 2]});
        let mut r = SchemaResolver::new(&d);
        let a = r.schema(&props, "#").unwrap();
        let b = r.schema(&items, "#").unwrap();
        let c = r.schema(&enum_only, "#").unwrap();
        assert_eq!(r.arena().get(a).kind, SchemaKind::Object);
        assert_eq!(r.arena().get(b).kind, SchemaKind::Array);
        assert!(r.arena().get(b).items.is_some());
        assert_eq!(r.arena().get(c).kind, SchemaKind::Integer);
    }

    #[test]
    fn array_without_items_gets_unknown_items() {
        let d = json!({});
        let v = json!({"type": "array"});
        let mut r = SchemaResolver::new(&d);
        let id = r.schema(&v, "#").unwrap();
        let items = r.arena().get(id).items.unwrap();
        assert_eq!(r.arena().get(items).kind, SchemaKind::Unknown);
    }
}
