//! Test plan: the compiler's output, handed to an external emitter
//!
//! Every field is populated or explicitly absent; nothing here refers back
//! into the spec model.

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::assertion::Assertion;
use crate::diagnostic::{self, Diagnostic, Severity};
use crate::encode;
use crate::spec::ParamLocation;

/// Which contract a scenario exercises. Carries only the fields relevant to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioKind {
    Happy,
    MissingRequiredParameter {
        parameter: String,
        location: ParamLocation,
    },
    Unauthenticated,
    InvalidCredential,
    InsufficientPermission,
    NotFound {
        parameter: String,
    },
}

impl ScenarioKind {
    #[must_use]
    pub const fn slug(&self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::MissingRequiredParameter { .. } => "missing-required-parameter",
            Self::Unauthenticated => "unauthenticated",
            Self::InvalidCredential => "invalid-credential",
            Self::InsufficientPermission => "insufficient-permission",
            Self::NotFound { .. } => "not-found",
        }
    }

    /// Sentence fragment used in scenario names.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Happy => "succeeds with valid input".to_string(),
            Self::MissingRequiredParameter {
                parameter,
                location,
            } => format!("rejects missing required {location} parameter '{parameter}'"),
            Self::Unauthenticated => "rejects requests without credentials".to_string(),
            Self::InvalidCredential => "rejects an unrecognized credential".to_string(),
            Self::InsufficientPermission => "rejects an under-scoped credential".to_string(),
            Self::NotFound { parameter } => {
                format!("returns not found for an absent '{parameter}'")
            }
        }
    }
}

/// A fully resolved HTTP request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RequestPlan {
    pub method: String,
    /// Resolved path, placeholders substituted and percent-encoded
    pub path: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub query: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl RequestPlan {
    /// Path plus encoded query string.
    #[must_use]
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(k, v)| {
                format!(
                    "{}={}",
                    encode::query_component(k),
                    encode::query_component(v)
                )
            })
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{query}", self.path)
    }
}

/// One fully resolved test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScenarioPlan {
    /// Operation label, e.g. "GET /widgets/{id}"
    pub operation: String,
    /// Test title: operation label + kind description
    pub name: String,
    #[serde(flatten)]
    pub kind: ScenarioKind,
    pub request: RequestPlan,
    pub expected_status: u16,
    /// Body-shape checks; empty for negative scenarios
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<Assertion>,
}

/// Scenarios for one operation, in emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OperationPlan {
    pub operation: String,
    pub method: String,
    /// Path template
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    /// Comment material only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub scenarios: Vec<ScenarioPlan>,
}

/// An operation left out of the plan and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SkippedEntry {
    pub operation: String,
    pub reason: String,
}

/// Complete test plan for a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TestPlan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub operations: Vec<OperationPlan>,
    #[serde(default)]
    pub skipped: Vec<SkippedEntry>,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl TestPlan {
    #[must_use]
    pub fn scenario_count(&self) -> usize {
        self.operations.iter().map(|op| op.scenarios.len()).sum()
    }

    pub fn scenarios(&self) -> impl Iterator<Item = &ScenarioPlan> {
        self.operations.iter().flat_map(|op| op.scenarios.iter())
    }

    /// Returns true if any diagnostic has Error severity.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Returns true if any diagnostic has Warning severity.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Warning)
    }

    #[must_use]
    pub fn exit_code(&self, strict: bool) -> i32 {
        diagnostic::exit_code(&self.diagnostics, strict)
    }

    /// Format as human-readable terminal output.
    #[must_use]
    pub fn to_terminal(&self) -> String {
        let mut lines = Vec::new();

        let title = match (&self.title, &self.version) {
            (Some(t), Some(v)) => format!("{t} {v}"),
            (Some(t), None) => t.clone(),
            _ => "API".to_string(),
        };
        lines.push(format!(
            "Test plan for {title}: {} operations, {} scenarios\n",
            self.operations.len(),
            self.scenario_count(),
        ));

        for op in &self.operations {
            lines.push(format!("{} ({} scenarios):", op.operation, op.scenarios.len()));
            if let Some(summary) = &op.summary {
                lines.push(format!("  # {summary}"));
            }
            for s in &op.scenarios {
                let assertions = Assertion::count(&s.assertions);
                let suffix = if assertions > 0 {
                    format!(", {assertions} assertions")
                } else {
                    String::new()
                };
                lines.push(format!(
                    "  [{}] {} -> {}{suffix}",
                    s.kind.slug(),
                    s.request.path_and_query(),
                    s.expected_status,
                ));
            }
            lines.push(String::new());
        }

        if !self.skipped.is_empty() {
            lines.push(format!("Skipped ({}):", self.skipped.len()));
            for s in &self.skipped {
                lines.push(format!("  {}: {}", s.operation, s.reason));
            }
            lines.push(String::new());
        }

        if !self.diagnostics.is_empty() {
            lines.push("Diagnostics:".into());
            for d in &self.diagnostics {
                lines.push(format!("  {d}"));
            }
        }

        lines.join("\n")
    }
}

/// Generate JSON Schema for the test plan interchange format.
#[must_use]
pub fn generate_schema() -> String {
    let schema = schemars::schema_for!(TestPlan);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::{Check, JsonType, Locator};

    fn sample_plan() -> TestPlan {
        let happy = ScenarioPlan {
            operation: "GET /widgets/{id}".into(),
            name: "GET /widgets/{id} succeeds with valid input".into(),
            kind: ScenarioKind::Happy,
            request: RequestPlan {
                method: "GET".into(),
                path: "/widgets/kalo%20mi".into(),
                query: IndexMap::from([("q".to_string(), "a b".to_string())]),
                headers: IndexMap::new(),
                body: None,
            },
            expected_status: 200,
            assertions: vec![Assertion::new(
                Locator::root(),
                Check::IsType {
                    types: vec![JsonType::Object],
                },
            )],
        };
        let missing = ScenarioPlan {
            kind: ScenarioKind::MissingRequiredParameter {
                parameter: "id".into(),
                location: ParamLocation::Path,
            },
            expected_status: 400,
            assertions: vec![],
            ..happy.clone()
        };
        TestPlan {
            title: Some("Widgets".into()),
            version: Some("1.0".into()),
            operations: vec![OperationPlan {
                operation: "GET /widgets/{id}".into(),
                method: "GET".into(),
                path: "/widgets/{id}".into(),
                operation_id: Some("getWidget".into()),
                summary: Some("Fetch a widget".into()),
                tags: vec!["widgets".into()],
                scenarios: vec![happy, missing],
            }],
            skipped: vec![SkippedEntry {
                operation: "GET /broken".into(),
                reason: "dangling reference: #/x".into(),
            }],
            diagnostics: vec![Diagnostic::error(Some("GET /broken"), "skipped")],
        }
    }

    #[test]
    fn path_and_query_encodes_query() {
        let plan = sample_plan();
        let req = &plan.operations[0].scenarios[0].request;
        assert_eq!(req.path_and_query(), "/widgets/kalo%20mi?q=a%20b");
    }

    #[test]
    fn scenario_kind_serializes_flat() {
        let plan = sample_plan();
        let v = serde_json::to_value(&plan.operations[0].scenarios[1]).unwrap();
        assert_eq!(v["kind"], "missing_required_parameter");
        assert_eq!(v["parameter"], "id");
        assert_eq!(v["location"], "path");
        assert!(v.get("assertions").is_none());
    }

    #[test]
    fn plan_round_trips_through_json() {
        let plan = sample_plan();
        let json = serde_json::to_string(&plan).unwrap();
        let back: TestPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);
    }

    #[test]
    fn plan_terminal_output() {
        let text = sample_plan().to_terminal();
        assert!(text.contains("Test plan for Widgets 1.0: 1 operations, 2 scenarios"));
        assert!(text.contains("GET /widgets/{id} (2 scenarios):"));
        assert!(text.contains("# Fetch a widget"));
        assert!(text.contains("[happy] /widgets/kalo%20mi?q=a%20b -> 200, 1 assertions"));
        assert!(text.contains("[missing-required-parameter]"));
        assert!(text.contains("Skipped (1):"));
        assert!(text.contains("[error] GET /broken: skipped"));
    }

    #[test]
    fn plan_has_errors() {
        let plan = sample_plan();
        assert!(plan.has_errors());
        assert!(!plan.has_warnings());
        assert_eq!(plan.exit_code(false), 1);
    }

    #[test]
    fn kind_descriptions() {
        assert_eq!(ScenarioKind::Happy.describe(), "succeeds with valid input");
        let k = ScenarioKind::NotFound {
            parameter: "id".into(),
        };
        assert_eq!(k.slug(), "not-found");
        assert!(k.describe().contains("'id'"));
    }

    #[test]
    fn schema_generation_produces_valid_json() {
        let schema = generate_schema();
        let parsed: serde_json::Value = serde_json::from_str(&schema).unwrap();
        assert_eq!(
            parsed.get("title").and_then(|v| v.as_str()),
            Some("TestPlan")
        );
    }
}
