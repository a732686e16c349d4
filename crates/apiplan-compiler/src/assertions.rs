//! Response schema → ordered structural assertions
//!
//! Breadth-first from the body root. Required children are checked at the
//! next level; optional properties, array items and nullable values are
//! wrapped in guards so nothing is asserted about data that may be absent.
//! Each node is expanded once per call; later visits (cycles or shared
//! definitions) get a shallow type check only. Guarded subtrees are expanded
//! after every unguarded location, so a definition used both ways keeps its
//! full checks where it is required.

use std::collections::{HashSet, VecDeque};

use apiplan_core::{
    Assertion, Check, JsonType, Locator, SchemaArena, SchemaId, SchemaKind, SchemaNode,
    UUID_PATTERN,
};

/// Derive body-shape assertions for the schema at `root`.
#[must_use]
pub fn derive_assertions(arena: &SchemaArena, root: SchemaId) -> Vec<Assertion> {
    let mut deriver = Deriver {
        arena,
        visited: HashSet::new(),
        deferred: VecDeque::new(),
    };
    let mut out = Vec::new();
    deriver.expand(root, Locator::root(), &[], &mut out);

    while let Some(guard) = deriver.deferred.pop_front() {
        let mut then = Vec::new();
        deriver.expand(guard.id, guard.at, &guard.slot, &mut then);
        if let Some(target) = nested_at(&mut out, &guard.slot) {
            *target = then;
        }
    }

    prune_empty_guards(&mut out);
    out
}

type Queue = VecDeque<(SchemaId, Locator)>;

/// A guard emitted with an empty body, filled once unguarded work is done.
struct Deferred {
    /// Index path from the top-level list to the guard assertion
    slot: Vec<usize>,
    id: SchemaId,
    at: Locator,
}

struct Deriver<'a> {
    arena: &'a SchemaArena,
    visited: HashSet<SchemaId>,
    deferred: VecDeque<Deferred>,
}

impl Deriver<'_> {
    fn expand(&mut self, start: SchemaId, at: Locator, slot: &[usize], out: &mut Vec<Assertion>) {
        let mut queue = Queue::from([(start, at)]);
        self.drain(&mut queue, slot, out);
    }

    fn drain(&mut self, queue: &mut Queue, slot: &[usize], out: &mut Vec<Assertion>) {
        while let Some((id, at)) = queue.pop_front() {
            self.node(id, at, false, slot, out, queue);
        }
    }

    /// Push `guard` with an empty body and schedule its expansion.
    fn defer(
        &mut self,
        slot: &[usize],
        out: &mut Vec<Assertion>,
        guard: Assertion,
        id: SchemaId,
        at: Locator,
    ) {
        let mut path = slot.to_vec();
        path.push(out.len());
        out.push(guard);
        self.deferred.push_back(Deferred { slot: path, id, at });
    }

    /// `typed`: the caller already asserted this value's type (nullable
    /// wrapper or single-variant union), so skip the leading `is-type`.
    fn node(
        &mut self,
        id: SchemaId,
        at: Locator,
        typed: bool,
        slot: &[usize],
        out: &mut Vec<Assertion>,
        queue: &mut Queue,
    ) {
        let arena = self.arena;
        let node = arena.get(id);

        if self.visited.contains(&id) {
            if !typed {
                if let Some(types) = types_of(arena, node) {
                    out.push(Assertion::new(at, Check::IsType { types }));
                }
            }
            return;
        }

        if !typed && is_nullable(arena, node) {
            if let Some(types) = types_of(arena, node) {
                out.push(Assertion::new(at.clone(), Check::IsType { types }));
            }
            let index = out.len();
            let mut path = slot.to_vec();
            path.push(index);
            let mut then = Vec::new();
            let mut inner = Queue::new();
            self.node(id, at.clone(), true, &path, &mut then, &mut inner);
            self.drain(&mut inner, &path, &mut then);
            out.push(Assertion::new(at, Check::IfNotNull { then }));
            return;
        }

        self.visited.insert(id);

        if let Some(allowed) = &node.enum_values {
            out.push(Assertion::new(
                at,
                Check::EnumMembership {
                    allowed: allowed.clone(),
                },
            ));
            return;
        }

        match node.kind {
            SchemaKind::Object => {
                if !typed {
                    out.push(is_type(at.clone(), JsonType::Object));
                }
                if !node.required.is_empty() {
                    out.push(Assertion::new(
                        at.clone(),
                        Check::HasRequiredKeys {
                            keys: node.required.iter().cloned().collect(),
                        },
                    ));
                }
                for (key, child) in &node.properties {
                    if node.required.contains(key) {
                        queue.push_back((*child, at.key(key)));
                    } else {
                        let guard = Assertion::new(
                            at.clone(),
                            Check::IfPresent {
                                key: key.clone(),
                                then: Vec::new(),
                            },
                        );
                        self.defer(slot, out, guard, *child, at.key(key));
                    }
                }
            }
            SchemaKind::Array => {
                if !typed {
                    out.push(is_type(at.clone(), JsonType::Array));
                }
                if let Some(items) = node.items {
                    let item_at = at.index(0);
                    let guard = Assertion::new(at, Check::IfNonEmptyArray { then: Vec::new() });
                    self.defer(slot, out, guard, items, item_at);
                }
            }
            SchemaKind::String if node.is_uuid() => {
                out.push(Assertion::new(
                    at,
                    Check::MatchesPattern {
                        pattern: UUID_PATTERN.to_string(),
                    },
                ));
            }
            SchemaKind::String => {
                if !typed {
                    out.push(is_type(at.clone(), JsonType::String));
                }
                if let Some(pattern) = &node.pattern {
                    out.push(Assertion::new(
                        at.clone(),
                        Check::MatchesPattern {
                            pattern: pattern.clone(),
                        },
                    ));
                }
                if node.min_length.is_some() || node.max_length.is_some() {
                    out.push(Assertion::new(
                        at,
                        Check::LengthBound {
                            min_length: node.min_length,
                            max_length: node.max_length,
                        },
                    ));
                }
            }
            SchemaKind::Integer | SchemaKind::Number => {
                if !typed {
                    let ty = if node.kind == SchemaKind::Integer {
                        JsonType::Integer
                    } else {
                        JsonType::Number
                    };
                    out.push(is_type(at.clone(), ty));
                }
                if node.minimum.is_some() || node.maximum.is_some() {
                    out.push(Assertion::new(
                        at,
                        Check::NumericRange {
                            minimum: node.minimum,
                            maximum: node.maximum,
                            exclusive_minimum: node.exclusive_minimum,
                            exclusive_maximum: node.exclusive_maximum,
                        },
                    ));
                }
            }
            SchemaKind::Boolean => {
                if !typed {
                    out.push(is_type(at, JsonType::Boolean));
                }
            }
            SchemaKind::Null => {
                if !typed {
                    out.push(is_type(at, JsonType::Null));
                }
            }
            SchemaKind::Union => {
                let concrete: Vec<SchemaId> = node
                    .variants
                    .iter()
                    .copied()
                    .filter(|v| arena.get(*v).kind != SchemaKind::Null)
                    .collect();
                match concrete.as_slice() {
                    [single] => self.node(*single, at, typed, slot, out, queue),
                    _ if typed => {}
                    _ => {
                        if let Some(types) = types_of(arena, node) {
                            out.push(Assertion::new(at, Check::IsType { types }));
                        }
                    }
                }
            }
            SchemaKind::Unknown => {}
        }
    }
}

fn nested_mut(assertion: &mut Assertion) -> Option<&mut Vec<Assertion>> {
    match &mut assertion.check {
        Check::IfPresent { then, .. }
        | Check::IfNonEmptyArray { then }
        | Check::IfNotNull { then } => Some(then),
        _ => None,
    }
}

/// Body of the guard at `slot`, or the top-level list for an empty path.
fn nested_at<'v>(
    mut list: &'v mut Vec<Assertion>,
    slot: &[usize],
) -> Option<&'v mut Vec<Assertion>> {
    for &index in slot {
        list = nested_mut(list.get_mut(index)?)?;
    }
    Some(list)
}

/// Guards whose body ended up empty assert nothing.
fn prune_empty_guards(list: &mut Vec<Assertion>) {
    list.retain_mut(|assertion| match nested_mut(assertion) {
        Some(then) => {
            prune_empty_guards(then);
            !then.is_empty()
        }
        None => true,
    });
}

fn is_type(at: Locator, ty: JsonType) -> Assertion {
    Assertion::new(at, Check::IsType { types: vec![ty] })
}

fn is_nullable(arena: &SchemaArena, node: &SchemaNode) -> bool {
    if node.kind == SchemaKind::Null {
        return false;
    }
    node.nullable
        || (node.kind == SchemaKind::Union
            && node
                .variants
                .iter()
                .any(|v| arena.get(*v).kind == SchemaKind::Null))
}

fn base_type(kind: SchemaKind) -> Option<JsonType> {
    match kind {
        SchemaKind::Object => Some(JsonType::Object),
        SchemaKind::Array => Some(JsonType::Array),
        SchemaKind::String => Some(JsonType::String),
        SchemaKind::Number => Some(JsonType::Number),
        SchemaKind::Integer => Some(JsonType::Integer),
        SchemaKind::Boolean => Some(JsonType::Boolean),
        SchemaKind::Null => Some(JsonType::Null),
        SchemaKind::Union | SchemaKind::Unknown => None,
    }
}

/// Accepted JSON types, `null` included when nullable. `None` when any
/// alternative is unconstrained (nothing sound to assert).
fn types_of(arena: &SchemaArena, node: &SchemaNode) -> Option<Vec<JsonType>> {
    let mut types = Vec::new();
    if node.kind == SchemaKind::Union {
        for variant in &node.variants {
            // Nested unions are not expanded
            let ty = base_type(arena.get(*variant).kind)?;
            if !types.contains(&ty) {
                types.push(ty);
            }
        }
    } else {
        types.push(base_type(node.kind)?);
    }
    if node.nullable && !types.contains(&JsonType::Null) {
        types.push(JsonType::Null);
    }
    Some(types)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn describe(assertions: &[Assertion]) -> String {
        assertions
            .iter()
            .map(Assertion::describe)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn string() -> SchemaNode {
        SchemaNode::of_kind(SchemaKind::String)
    }

    #[test]
    fn uuid_object_yields_exactly_three_checks() {
        let mut arena = SchemaArena::new();
        let mut id = string();
        id.format = Some("uuid".into());
        let id = arena.alloc(id);
        let mut obj = SchemaNode::of_kind(SchemaKind::Object);
        obj.properties.insert("id".into(), id);
        obj.required.insert("id".into());
        let root = arena.alloc(obj);

        let assertions = derive_assertions(&arena, root);
        insta::assert_snapshot!(describe(&assertions), @r"
        $ is-type object
        $ has-required-keys id
        $.id matches-pattern ^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$
        ");
    }

    #[test]
    fn optional_property_is_guarded() {
        let mut arena = SchemaArena::new();
        let mut age = SchemaNode::of_kind(SchemaKind::Integer);
        age.minimum = Some(0.0);
        let age = arena.alloc(age);
        let mut obj = SchemaNode::of_kind(SchemaKind::Object);
        obj.properties.insert("age".into(), age);
        let root = arena.alloc(obj);

        let assertions = derive_assertions(&arena, root);
        assert_eq!(assertions.len(), 2);
        let Check::IfPresent { key, then } = &assertions[1].check else {
            panic!("expected if-present guard");
        };
        assert_eq!(key, "age");
        assert_eq!(describe(then), "$.age is-type integer\n$.age numeric-range >=0");
    }

    #[test]
    fn array_items_behind_length_guard() {
        let mut arena = SchemaArena::new();
        let mut name = string();
        name.max_length = Some(40);
        let name = arena.alloc(name);
        let mut item = SchemaNode::of_kind(SchemaKind::Object);
        item.properties.insert("name".into(), name);
        item.required.insert("name".into());
        let item = arena.alloc(item);
        let mut list = SchemaNode::of_kind(SchemaKind::Array);
        list.items = Some(item);
        let list = arena.alloc(list);
        let mut envelope = SchemaNode::of_kind(SchemaKind::Object);
        envelope.properties.insert("data".into(), list);
        envelope.required.insert("data".into());
        let root = arena.alloc(envelope);

        let assertions = derive_assertions(&arena, root);
        assert_eq!(
            describe(&assertions),
            "$ is-type object\n$ has-required-keys data\n$.data is-type array\n\
             $.data is-nonempty-array-then-check-first-item (4 nested)"
        );
        let Check::IfNonEmptyArray { then } = &assertions[3].check else {
            panic!("expected array guard");
        };
        assert_eq!(then[3].target.to_string(), "$.data[0].name");
        assert_eq!(then[3].describe(), "$.data[0].name length-bound len<=40");
    }

    #[test]
    fn enum_checks_membership_only() {
        let mut arena = SchemaArena::new();
        let mut status = string();
        status.enum_values = Some(vec![serde_json::json!("on"), serde_json::json!("off")]);
        let root = arena.alloc(status);

        let assertions = derive_assertions(&arena, root);
        assert_eq!(describe(&assertions), "$ enum-membership \"on\", \"off\"");
    }

    #[test]
    fn self_reference_terminates_with_shallow_check() {
        let mut arena = SchemaArena::new();
        let root = arena.reserve();
        let mut node = SchemaNode::of_kind(SchemaKind::Object);
        node.properties.insert("parent".into(), root);
        node.properties.insert("children".into(), root);
        node.required.insert("children".into());
        arena.set(root, node);

        let assertions = derive_assertions(&arena, root);
        assert_eq!(
            describe(&assertions),
            "$ is-type object\n$ has-required-keys children\n\
             $ if-present parent (1 nested)\n$.children is-type object"
        );
    }

    #[test]
    fn required_use_of_shared_definition_keeps_full_checks() {
        let mut arena = SchemaArena::new();
        let mut id = string();
        id.format = Some("uuid".into());
        let id = arena.alloc(id);
        let mut user = SchemaNode::of_kind(SchemaKind::Object);
        user.properties.insert("id".into(), id);
        user.required.insert("id".into());
        let user = arena.alloc(user);
        let mut team = SchemaNode::of_kind(SchemaKind::Object);
        team.properties.insert("backup".into(), user);
        team.properties.insert("owner".into(), user);
        team.required.insert("owner".into());
        let root = arena.alloc(team);

        let assertions = derive_assertions(&arena, root);
        insta::assert_snapshot!(describe(&assertions), @r"
        $ is-type object
        $ has-required-keys owner
        $ if-present backup (1 nested)
        $.owner is-type object
        $.owner has-required-keys id
        $.owner.id matches-pattern ^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$
        ");
        let Check::IfPresent { then, .. } = &assertions[2].check else {
            panic!("expected if-present guard");
        };
        assert_eq!(describe(then), "$.backup is-type object");
    }

    #[test]
    fn nested_optional_guards_are_filled() {
        let mut arena = SchemaArena::new();
        let mut score = SchemaNode::of_kind(SchemaKind::Number);
        score.maximum = Some(10.0);
        let score = arena.alloc(score);
        let mut stats = SchemaNode::of_kind(SchemaKind::Object);
        stats.properties.insert("score".into(), score);
        let stats = arena.alloc(stats);
        let mut obj = SchemaNode::of_kind(SchemaKind::Object);
        obj.properties.insert("stats".into(), stats);
        obj.properties.insert("empty".into(), arena.alloc(SchemaNode::default()));
        let root = arena.alloc(obj);

        let assertions = derive_assertions(&arena, root);
        assert_eq!(describe(&assertions), "$ is-type object\n$ if-present stats (4 nested)");
        let Check::IfPresent { then, .. } = &assertions[1].check else {
            panic!("expected if-present guard");
        };
        let Check::IfPresent { key, then: inner } = &then[1].check else {
            panic!("expected nested guard");
        };
        assert_eq!(key, "score");
        assert_eq!(
            describe(inner),
            "$.stats.score is-type number\n$.stats.score numeric-range <=10"
        );
    }

    #[test]
    fn nullable_value_is_guarded() {
        let mut arena = SchemaArena::new();
        let mut note = string();
        note.nullable = true;
        note.max_length = Some(10);
        let root = arena.alloc(note);

        let assertions = derive_assertions(&arena, root);
        assert_eq!(
            describe(&assertions),
            "$ is-type string | null\n$ if-not-null (1 nested)"
        );
        let Check::IfNotNull { then } = &assertions[1].check else {
            panic!("expected null guard");
        };
        assert_eq!(then[0].describe(), "$ length-bound len<=10");
    }

    #[test]
    fn union_asserts_type_alternatives() {
        let mut arena = SchemaArena::new();
        let s = arena.alloc(string());
        let n = arena.alloc(SchemaNode::of_kind(SchemaKind::Integer));
        let mut union = SchemaNode::of_kind(SchemaKind::Union);
        union.variants = vec![s, n];
        let root = arena.alloc(union);

        let assertions = derive_assertions(&arena, root);
        assert_eq!(describe(&assertions), "$ is-type string | integer");
    }

    #[test]
    fn unknown_schema_asserts_nothing() {
        let mut arena = SchemaArena::new();
        let root = arena.alloc(SchemaNode::default());
        assert!(derive_assertions(&arena, root).is_empty());
    }
}
