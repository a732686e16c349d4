//! Compose builder and synthesizers into a [`TestPlan`]

use serde_json::Value;
use tracing::debug;

use apiplan_core::{BuildError, Config, OperationPlan, SkippedEntry, SpecDocument, TestPlan};

use crate::assertions::derive_assertions;
use crate::build::build;
use crate::scenarios::ScenarioSynthesizer;

/// Compile a built document into a test plan.
///
/// Scenarios expecting a 2xx status get body assertions derived from that
/// status's response schema; negative scenarios assert the status only.
#[must_use]
pub fn compile(document: &SpecDocument, config: &Config) -> TestPlan {
    let mut synth = ScenarioSynthesizer::new(document, config);
    let mut operations = Vec::with_capacity(document.operations.len());

    for op in &document.operations {
        let label = op.label();
        let mut scenarios = synth.plan(op);

        for scenario in &mut scenarios {
            if !(200..300).contains(&scenario.expected_status) {
                continue;
            }
            if let Some(schema) = op.response_schema(scenario.expected_status) {
                scenario.assertions = derive_assertions(&document.schemas, schema);
            }
        }

        debug!(operation = %label, scenarios = scenarios.len(), "planned operation");
        operations.push(OperationPlan {
            operation: label,
            method: op.method.clone(),
            path: op.path.as_str().to_string(),
            operation_id: op.operation_id.clone(),
            summary: op.summary.clone(),
            tags: op.tags.clone(),
            scenarios,
        });
    }

    let skipped = document
        .skipped
        .iter()
        .map(|s| SkippedEntry {
            operation: s.operation.clone(),
            reason: s.error.to_string(),
        })
        .collect();

    let mut diagnostics = document.diagnostics.clone();
    diagnostics.extend(synth.into_diagnostics());

    TestPlan {
        title: document.title.clone(),
        version: document.version.clone(),
        operations,
        skipped,
        diagnostics,
    }
}

/// Build and compile a parsed document in one step.
///
/// # Errors
///
/// Returns `InvalidDocument` if the root is not a mapping.
pub fn compile_document(raw: &Value, config: &Config) -> Result<TestPlan, BuildError> {
    let document = build(raw)?;
    Ok(compile(&document, config))
}
