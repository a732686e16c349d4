//! Schema node → deterministic placeholder `serde_json::Value`
//!
//! Every value is derived from a `SmallRng` seeded with the parameter name,
//! so an unchanged document always yields the same plan.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Number, Value};

use apiplan_core::{Diagnostic, SchemaArena, SchemaId, SchemaKind, SchemaNode, encode};

/// Maximum synthesized string length (guards absurd `maxLength` values).
const MAX_STRING_LEN: u64 = 10_000;

/// Preferred placeholder length when bounds allow it.
const DEFAULT_STRING_LEN: u64 = 12;

const INTEGER_SENTINEL: i128 = 1;
const NUMBER_SENTINEL: f64 = 1.5;

const CONSONANTS: &[u8] = b"bdfgklmnprstvz";
const VOWELS: &[u8] = b"aeiou";

/// Where a synthesized value will be used.
#[derive(Debug, Clone, Copy)]
pub struct ValueContext<'a> {
    /// Parameter (or property path) name; also the rng seed
    pub parameter_name: &'a str,
    /// Percent-encode the result for substitution into a path template
    pub is_path_segment: bool,
}

impl<'a> ValueContext<'a> {
    #[must_use]
    pub const fn new(parameter_name: &'a str) -> Self {
        Self {
            parameter_name,
            is_path_segment: false,
        }
    }

    #[must_use]
    pub const fn path_segment(parameter_name: &'a str) -> Self {
        Self {
            parameter_name,
            is_path_segment: true,
        }
    }
}

pub struct ValueSynthesizer<'a> {
    arena: &'a SchemaArena,
    operation: Option<String>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> ValueSynthesizer<'a> {
    #[must_use]
    pub fn new(arena: &'a SchemaArena) -> Self {
        Self {
            arena,
            operation: None,
            diagnostics: Vec::new(),
        }
    }

    /// Attribute subsequent diagnostics to `label`.
    pub fn set_operation(&mut self, label: &str) {
        self.operation = Some(label.to_string());
    }

    /// Produce a value conforming to the node at `id`.
    pub fn synthesize(&mut self, id: SchemaId, ctx: &ValueContext<'_>) -> Value {
        let mut rng = SmallRng::seed_from_u64(seed(ctx.parameter_name));
        let mut stack = Vec::new();
        let value = self.value_of(id, ctx.parameter_name, &mut rng, &mut stack);

        if ctx.is_path_segment {
            Value::String(encode::path_segment(&encode::value_to_string(&value)))
        } else {
            value
        }
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    fn warn(&mut self, message: String) {
        self.diagnostics
            .push(Diagnostic::warning(self.operation.as_deref(), message));
    }

    fn value_of(
        &mut self,
        id: SchemaId,
        name: &str,
        rng: &mut SmallRng,
        stack: &mut Vec<SchemaId>,
    ) -> Value {
        let arena = self.arena;
        let node = arena.get(id);

        // Back on a node we are inside of: stop with an empty container
        if stack.contains(&id) {
            return match node.kind {
                SchemaKind::Array => Value::Array(Vec::new()),
                _ => Value::Object(Map::new()),
            };
        }

        if let Some(first) = node.enum_values.as_ref().and_then(|e| e.first()) {
            return first.clone();
        }
        if let Some(example) = &node.example {
            return example.clone();
        }

        stack.push(id);
        let value = match node.kind {
            SchemaKind::String => self.string_value(node, name, rng),
            SchemaKind::Integer => self.integer_value(node, name),
            SchemaKind::Number => self.number_value(node, name),
            SchemaKind::Boolean => Value::Bool(true),
            SchemaKind::Null => Value::Null,
            SchemaKind::Array => match node.items {
                Some(items) => {
                    let item = self.value_of(items, &format!("{name}[0]"), rng, stack);
                    Value::Array(vec![item])
                }
                None => Value::Array(Vec::new()),
            },
            SchemaKind::Object => {
                let mut obj = Map::new();
                for (key, child) in &node.properties {
                    if node.required.contains(key) {
                        let value = self.value_of(*child, &format!("{name}.{key}"), rng, stack);
                        obj.insert(key.clone(), value);
                    }
                }
                Value::Object(obj)
            }
            SchemaKind::Union => {
                let variant = node
                    .variants
                    .iter()
                    .copied()
                    .find(|v| arena.get(*v).kind != SchemaKind::Null);
                match variant {
                    Some(v) => self.value_of(v, name, rng, stack),
                    None => Value::Null,
                }
            }
            SchemaKind::Unknown => Value::String(phrase(rng, DEFAULT_STRING_LEN as usize)),
        };
        stack.pop();
        value
    }

    #[allow(clippy::cast_possible_truncation)]
    fn string_value(&mut self, node: &SchemaNode, name: &str, rng: &mut SmallRng) -> Value {
        if let Some(fixed) = format_value(node.format.as_deref(), rng) {
            return Value::String(fixed);
        }

        if node.pattern.is_some() {
            self.diagnostics.push(Diagnostic::info(
                self.operation.as_deref(),
                format!("'{name}': pattern is not used for value synthesis"),
            ));
        }

        let min = node.min_length.unwrap_or(0).min(MAX_STRING_LEN);
        let mut max = node.max_length.unwrap_or(MAX_STRING_LEN).min(MAX_STRING_LEN);
        if min > max {
            self.warn(format!(
                "'{name}': minLength {min} exceeds maxLength {max}, using minLength"
            ));
            max = min;
        }
        let len = DEFAULT_STRING_LEN.clamp(min, max);
        Value::String(phrase(rng, len as usize))
    }

    fn integer_value(&mut self, node: &SchemaNode, name: &str) -> Value {
        // Bounds clamp to i64 first so the midpoint arithmetic cannot overflow
        let lo = node.minimum.map(|m| {
            if node.exclusive_minimum {
                integer_bound(m.floor()) + 1
            } else {
                integer_bound(m.ceil())
            }
        });
        let hi = node.maximum.map(|m| {
            if node.exclusive_maximum {
                integer_bound(m.ceil()) - 1
            } else {
                integer_bound(m.floor())
            }
        });

        let value = match (lo, hi) {
            (Some(lo), Some(hi)) if lo > hi => {
                self.warn(format!(
                    "'{name}': integer range [{lo}, {hi}] is empty, using {lo}"
                ));
                lo
            }
            (Some(lo), Some(hi)) => lo + (hi - lo) / 2,
            (Some(lo), None) => INTEGER_SENTINEL.max(lo),
            (None, Some(hi)) => INTEGER_SENTINEL.min(hi),
            (None, None) => INTEGER_SENTINEL,
        };

        let clamped = i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX });
        Value::Number(clamped.into())
    }

    fn number_value(&mut self, node: &SchemaNode, name: &str) -> Value {
        let value = match (node.minimum, node.maximum) {
            (Some(lo), Some(hi))
                if lo > hi || (lo == hi && (node.exclusive_minimum || node.exclusive_maximum)) =>
            {
                self.warn(format!(
                    "'{name}': number range [{lo}, {hi}] is empty, using {lo}"
                ));
                lo
            }
            (Some(lo), Some(hi)) => lo / 2.0 + hi / 2.0,
            (Some(lo), None) if NUMBER_SENTINEL > lo => NUMBER_SENTINEL,
            (Some(lo), None) => lo + 1.0,
            (None, Some(hi)) if NUMBER_SENTINEL < hi => NUMBER_SENTINEL,
            (None, Some(hi)) => hi - 1.0,
            (None, None) => NUMBER_SENTINEL,
        };
        Number::from_f64(value).map_or(Value::from(0), Value::Number)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integer_bound(value: f64) -> i128 {
    value.clamp(i64::MIN as f64, i64::MAX as f64) as i128
}

/// Fixed, well-formed values for common string formats.
fn format_value(format: Option<&str>, rng: &mut SmallRng) -> Option<String> {
    let value = match format? {
        "uuid" => format!(
            "{:08x}-{:04x}-4{:03x}-{:04x}-{:012x}",
            rng.r#gen::<u32>(),
            rng.r#gen::<u16>(),
            rng.r#gen::<u16>() & 0x0FFF,
            (rng.r#gen::<u16>() & 0x3FFF) | 0x8000,
            rng.r#gen::<u64>() & 0xFFFF_FFFF_FFFF,
        ),
        "date-time" => "2024-01-15T12:00:00Z".into(),
        "date" => "2024-01-15".into(),
        "time" => "12:00:00".into(),
        "email" => "user@example.com".into(),
        "uri" | "url" => "https://example.com".into(),
        "hostname" => "example.com".into(),
        "ipv4" => "192.0.2.1".into(),
        "ipv6" => "2001:db8::1".into(),
        "byte" => "YXBpcGxhbg==".into(),
        _ => return None,
    };
    Some(value)
}

/// Pronounceable words ("kalo mirete") truncated to exactly `len` chars.
fn phrase(rng: &mut SmallRng, len: usize) -> String {
    let mut out = String::with_capacity(len + 8);
    while out.len() < len {
        if !out.is_empty() {
            out.push(' ');
        }
        for _ in 0..rng.gen_range(2..=3) {
            out.push(CONSONANTS[rng.gen_range(0..CONSONANTS.len())] as char);
            out.push(VOWELS[rng.gen_range(0..VOWELS.len())] as char);
        }
    }
    out.truncate(len);
    if out.ends_with(' ') {
        out.pop();
        out.push('a');
    }
    out
}

/// FNV-1a; stable across runs and platforms.
fn seed(name: &str) -> u64 {
    name.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}
