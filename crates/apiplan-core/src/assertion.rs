//! Response-body assertions: pure value data owned by a scenario

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Canonical 8-4-4-4-12 hexadecimal UUID grouping.
pub const UUID_PATTERN: &str =
    "^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$";

/// One step from a value into a child: object key or array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum LocatorSegment {
    Key(String),
    Index(usize),
}

/// Path into the response body; empty means the root.
///
/// Serialized as a segment list (`["data", 0, "id"]`), displayed as `$.data[0].id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Locator(Vec<LocatorSegment>);

impl Locator {
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn key(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(LocatorSegment::Key(key.to_string()));
        Self(segments)
    }

    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(LocatorSegment::Index(index));
        Self(segments)
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn segments(&self) -> &[LocatorSegment] {
        &self.0
    }

    /// Follow the locator through a JSON value.
    #[must_use]
    pub fn resolve<'v>(&self, root: &'v serde_json::Value) -> Option<&'v serde_json::Value> {
        self.0.iter().try_fold(root, |v, seg| match seg {
            LocatorSegment::Key(k) => v.get(k),
            LocatorSegment::Index(i) => v.get(i),
        })
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("$")?;
        for seg in &self.0 {
            match seg {
                LocatorSegment::Key(k) => write!(f, ".{k}")?,
                LocatorSegment::Index(i) => write!(f, "[{i}]")?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    Object,
    Array,
    String,
    Number,
    Integer,
    Boolean,
    Null,
}

impl JsonType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Null => "null",
        }
    }
}

impl std::fmt::Display for JsonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to check at an assertion's target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum Check {
    /// Value is one of the listed types (`object` alone means non-null object)
    IsType { types: Vec<JsonType> },
    HasRequiredKeys { keys: Vec<String> },
    EnumMembership { allowed: Vec<serde_json::Value> },
    MatchesPattern { pattern: String },
    NumericRange {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        exclusive_minimum: bool,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        exclusive_maximum: bool,
    },
    LengthBound {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_length: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<u64>,
    },
    /// Target is an object; run `then` only if it carries the optional `key`
    IfPresent { key: String, then: Vec<Assertion> },
    /// Target is an array; run `then` (addressed at index 0) only if it is non-empty
    #[serde(rename = "is_nonempty_array_then_check_first_item")]
    IfNonEmptyArray { then: Vec<Assertion> },
    /// Target is nullable; run `then` only if it is not null
    IfNotNull { then: Vec<Assertion> },
}

impl Check {
    /// Short name used in comments and summaries.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::IsType { .. } => "is-type",
            Self::HasRequiredKeys { .. } => "has-required-keys",
            Self::EnumMembership { .. } => "enum-membership",
            Self::MatchesPattern { .. } => "matches-pattern",
            Self::NumericRange { .. } => "numeric-range",
            Self::LengthBound { .. } => "length-bound",
            Self::IfPresent { .. } => "if-present",
            Self::IfNonEmptyArray { .. } => "is-nonempty-array-then-check-first-item",
            Self::IfNotNull { .. } => "if-not-null",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Assertion {
    pub target: Locator,
    #[serde(flatten)]
    pub check: Check,
}

impl Assertion {
    #[must_use]
    pub fn new(target: Locator, check: Check) -> Self {
        Self { target, check }
    }

    /// Total number of assertions including those nested in guards.
    #[must_use]
    pub fn count(assertions: &[Self]) -> usize {
        assertions
            .iter()
            .map(|a| {
                1 + match &a.check {
                    Check::IfPresent { then, .. }
                    | Check::IfNonEmptyArray { then }
                    | Check::IfNotNull { then } => Self::count(then),
                    _ => 0,
                }
            })
            .sum()
    }

    /// One-line human description, e.g. `$.id matches-pattern ^[0-9a-f...`
    #[must_use]
    pub fn describe(&self) -> String {
        let detail = match &self.check {
            Check::IsType { types } => types
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(" | "),
            Check::HasRequiredKeys { keys } => keys.join(", "),
            Check::EnumMembership { allowed } => allowed
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            Check::MatchesPattern { pattern } => pattern.clone(),
            Check::NumericRange {
                minimum,
                maximum,
                exclusive_minimum,
                exclusive_maximum,
            } => {
                let lo = minimum.map(|m| format!("{}{m}", if *exclusive_minimum { ">" } else { ">=" }));
                let hi = maximum.map(|m| format!("{}{m}", if *exclusive_maximum { "<" } else { "<=" }));
                [lo, hi].into_iter().flatten().collect::<Vec<_>>().join(" ")
            }
            Check::LengthBound {
                min_length,
                max_length,
            } => {
                let lo = min_length.map(|m| format!("len>={m}"));
                let hi = max_length.map(|m| format!("len<={m}"));
                [lo, hi].into_iter().flatten().collect::<Vec<_>>().join(" ")
            }
            Check::IfPresent { key, then } => format!("{key} ({} nested)", Self::count(then)),
            Check::IfNonEmptyArray { then } | Check::IfNotNull { then } => {
                format!("({} nested)", Self::count(then))
            }
        };
        format!("{} {} {detail}", self.target, self.check.name())
    }
}
