//! Normalized spec model: operations, parameters, responses, security
//!
//! Produced by the builder in `apiplan-compiler`; every schema reference is a
//! [`SchemaId`] into [`SpecDocument::schemas`].

use std::collections::{BTreeMap, BTreeSet};

use indexmap::{IndexMap, IndexSet};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::diagnostic::Diagnostic;
use crate::error::BuildError;
use crate::schema::{SchemaArena, SchemaId};

/// Where a parameter travels in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    Query,
    Header,
}

impl ParamLocation {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "path" => Some(Self::Path),
            "query" => Some(Self::Query),
            "header" => Some(Self::Header),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
        }
    }
}

impl std::fmt::Display for ParamLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDef {
    pub name: String,
    pub location: ParamLocation,
    pub required: bool,
    pub schema: SchemaId,
    /// Documented example value; used verbatim and makes an optional parameter present
    pub example: Option<serde_json::Value>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathPart {
    Literal(String),
    Param(String),
}

/// A path such as `/widgets/{id}` split into literals and parameter tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct PathTemplate {
    raw: String,
    parts: Vec<PathPart>,
}

impl PathTemplate {
    /// Split a path template into literal and `{token}` parts.
    ///
    /// # Errors
    ///
    /// Returns `PathParameterMismatch` for unbalanced or empty braces.
    pub fn parse(raw: &str) -> Result<Self, BuildError> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.chars();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    let mut token = String::new();
                    let mut closed = false;
                    for t in chars.by_ref() {
                        match t {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(BuildError::path_mismatch(raw, "nested '{'")),
                            _ => token.push(t),
                        }
                    }
                    if !closed {
                        return Err(BuildError::path_mismatch(raw, "unclosed '{'"));
                    }
                    if token.is_empty() {
                        return Err(BuildError::path_mismatch(raw, "empty parameter token"));
                    }
                    if !literal.is_empty() {
                        parts.push(PathPart::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(PathPart::Param(token));
                }
                '}' => return Err(BuildError::path_mismatch(raw, "unmatched '}'")),
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            parts.push(PathPart::Literal(literal));
        }

        Ok(Self {
            raw: raw.to_string(),
            parts,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn parts(&self) -> &[PathPart] {
        &self.parts
    }

    /// Parameter tokens in template order (duplicates preserved).
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match p {
            PathPart::Param(name) => Some(name.as_str()),
            PathPart::Literal(_) => None,
        })
    }

    /// Check that declared path parameters and template tokens match one-to-one.
    ///
    /// # Errors
    ///
    /// Returns `PathParameterMismatch` naming the first offending parameter.
    pub fn check_parameters<'a>(
        &self,
        declared: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), BuildError> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for token in self.tokens() {
            *counts.entry(token).or_default() += 1;
        }
        let declared: BTreeSet<&str> = declared.into_iter().collect();

        for name in &declared {
            match counts.get(name) {
                None => {
                    return Err(BuildError::path_mismatch(
                        &self.raw,
                        format!("parameter '{name}' has no {{{name}}} token"),
                    ));
                }
                Some(n) if *n > 1 => {
                    return Err(BuildError::path_mismatch(
                        &self.raw,
                        format!("token {{{name}}} appears {n} times"),
                    ));
                }
                Some(_) => {}
            }
        }
        for token in counts.keys() {
            if !declared.contains(token) {
                return Err(BuildError::path_mismatch(
                    &self.raw,
                    format!("token {{{token}}} has no declared path parameter"),
                ));
            }
        }
        Ok(())
    }

    /// Substitute tokens. `value_of` returns the already-encoded segment;
    /// `None` leaves the token empty.
    pub fn render(&self, mut value_of: impl FnMut(&str) -> Option<String>) -> String {
        let mut out = String::with_capacity(self.raw.len());
        for part in &self.parts {
            match part {
                PathPart::Literal(s) => out.push_str(s),
                PathPart::Param(name) => {
                    if let Some(v) = value_of(name) {
                        out.push_str(&v);
                    }
                }
            }
        }
        out
    }
}

impl std::fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseDef {
    pub description: Option<String>,
    /// `None` means no documented body
    pub schema: Option<SchemaId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Upper-case HTTP method
    pub method: String,
    pub path: PathTemplate,
    pub operation_id: Option<String>,
    pub parameters: Vec<ParameterDef>,
    pub request_body: Option<SchemaId>,
    pub responses: BTreeMap<u16, ResponseDef>,
    /// Scheme names in requirement order; empty means publicly accessible
    pub security: IndexSet<String>,
    pub tags: Vec<String>,
    pub summary: Option<String>,
}

impl Operation {
    /// Operation label, e.g. "GET /widgets/{id}"
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// Lowest documented 2xx status, 200 when none is documented.
    #[must_use]
    pub fn success_status(&self) -> u16 {
        self.responses
            .keys()
            .copied()
            .find(|s| (200..300).contains(s))
            .unwrap_or(200)
    }

    #[must_use]
    pub fn documents(&self, status: u16) -> bool {
        self.responses.contains_key(&status)
    }

    #[must_use]
    pub fn response_schema(&self, status: u16) -> Option<SchemaId> {
        self.responses.get(&status).and_then(|r| r.schema)
    }

    pub fn path_parameters(&self) -> impl Iterator<Item = &ParameterDef> {
        self.parameters
            .iter()
            .filter(|p| p.location == ParamLocation::Path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeyLocation {
    Header,
    Query,
    Cookie,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityScheme {
    HttpBearer,
    HttpBasic,
    ApiKey {
        location: ApiKeyLocation,
        name: String,
    },
    OAuth2,
    OpenIdConnect,
    /// Declared with a type this model does not distinguish
    Other(String),
}

/// An operation the builder could not model, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedOperation {
    pub operation: String,
    pub error: BuildError,
}

/// Normalized API document.
#[derive(Debug, Clone, Default)]
pub struct SpecDocument {
    pub title: Option<String>,
    pub version: Option<String>,
    /// Document order
    pub operations: Vec<Operation>,
    pub security_schemes: IndexMap<String, SecurityScheme>,
    pub schemas: SchemaArena,
    pub skipped: Vec<SkippedOperation>,
    pub diagnostics: Vec<Diagnostic>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_literal_and_tokens() {
        let t = PathTemplate::parse("/users/{userId}/files/{name}.{ext}").unwrap();
        assert_eq!(t.tokens().collect::<Vec<_>>(), vec!["userId", "name", "ext"]);
        assert_eq!(t.parts()[0], PathPart::Literal("/users/".into()));
        assert_eq!(t.parts()[4], PathPart::Literal(".".into()));
    }

    #[test]
    fn parse_rejects_unbalanced_braces() {
        assert!(PathTemplate::parse("/a/{id").is_err());
        assert!(PathTemplate::parse("/a/id}").is_err());
        assert!(PathTemplate::parse("/a/{}").is_err());
        assert!(PathTemplate::parse("/a/{{id}}").is_err());
    }

    #[test]
    fn check_parameters_accepts_exact_match() {
        let t = PathTemplate::parse("/a/{x}/b/{y}").unwrap();
        assert!(t.check_parameters(["y", "x"]).is_ok());
    }

    #[test]
    fn check_parameters_rejects_undeclared_token() {
        let t = PathTemplate::parse("/a/{x}/b/{y}").unwrap();
        let err = t.check_parameters(["x"]).unwrap_err();
        assert!(matches!(err, BuildError::PathParameterMismatch { .. }));
        assert!(err.to_string().contains("{y}"));
    }

    #[test]
    fn check_parameters_rejects_missing_token() {
        let t = PathTemplate::parse("/a").unwrap();
        let err = t.check_parameters(["id"]).unwrap_err();
        assert!(err.to_string().contains("'id'"));
    }

    #[test]
    fn check_parameters_rejects_duplicate_token() {
        let t = PathTemplate::parse("/a/{id}/b/{id}").unwrap();
        let err = t.check_parameters(["id"]).unwrap_err();
        assert!(err.to_string().contains("2 times"));
    }

    #[test]
    fn render_substitutes_and_leaves_missing_empty() {
        let t = PathTemplate::parse("/widgets/{id}/parts").unwrap();
        assert_eq!(t.render(|_| Some("42".into())), "/widgets/42/parts");
        assert_eq!(t.render(|_| None), "/widgets//parts");
    }

    fn op_with(statuses: &[u16]) -> Operation {
        Operation {
            method: "GET".into(),
            path: PathTemplate::parse("/x").unwrap(),
            operation_id: None,
            parameters: vec![],
            request_body: None,
            responses: statuses
                .iter()
                .map(|s| {
                    (
                        *s,
                        ResponseDef {
                            description: None,
                            schema: None,
                        },
                    )
                })
                .collect(),
            security: IndexSet::new(),
            tags: vec![],
            summary: None,
        }
    }

    #[test]
    fn success_status_is_lowest_2xx() {
        assert_eq!(op_with(&[404, 204, 201]).success_status(), 201);
        assert_eq!(op_with(&[400]).success_status(), 200);
        assert_eq!(op_with(&[]).success_status(), 200);
    }

    #[test]
    fn label_joins_method_and_path() {
        assert_eq!(op_with(&[]).label(), "GET /x");
    }
}
