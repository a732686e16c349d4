//! Diagnostics collected while building and compiling a document
//!
//! Nothing in the compiler aborts the whole run: problems are recorded here
//! and the best achievable plan is still produced.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Diagnostic severity - maps directly to exit codes
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational, e.g. an ignored parameter location (exit 0)
    Info,
    /// Best-effort value or partially honored construct (exit 0, or 1 if --strict)
    Warning,
    /// Operation skipped (exit 1)
    Error,
}

impl Severity {
    /// Convert severity to exit code
    ///
    /// - strict=true: Warning becomes exit 1
    /// - strict=false: Warning is exit 0
    #[must_use]
    pub const fn exit_code(self, strict: bool) -> i32 {
        match self {
            Self::Info => 0,
            Self::Warning => {
                if strict {
                    1
                } else {
                    0
                }
            }
            Self::Error => 1,
        }
    }

    /// Human-readable label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single localized problem report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Operation label ("GET /widgets/{id}"), absent for document-level findings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn info(operation: Option<&str>, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, operation, message)
    }

    pub fn warning(operation: Option<&str>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, operation, message)
    }

    pub fn error(operation: Option<&str>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, operation, message)
    }

    fn new(severity: Severity, operation: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            severity,
            operation: operation.map(str::to_string),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.operation {
            Some(op) => write!(f, "[{}] {op}: {}", self.severity, self.message),
            None => write!(f, "[{}] {}", self.severity, self.message),
        }
    }
}

/// Highest exit code implied by a set of diagnostics.
#[must_use]
pub fn exit_code(diagnostics: &[Diagnostic], strict: bool) -> i32 {
    diagnostics
        .iter()
        .map(|d| d.severity.exit_code(strict))
        .max()
        .unwrap_or(0)
}
