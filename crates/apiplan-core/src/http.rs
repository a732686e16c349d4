//! HTTP file generator - renders a test plan in `.http` format

use crate::plan::{ScenarioPlan, TestPlan};

/// Generate .http file content for every scenario in the plan
pub fn to_http_file(plan: &TestPlan, base_url_var: &str) -> String {
    let mut lines = Vec::new();

    lines.push(format!(
        "# Auto-generated test plan ({} operations, {} scenarios)",
        plan.operations.len(),
        plan.scenario_count()
    ));
    lines.push(format!("# Base URL variable: {{{{{base_url_var}}}}}"));
    lines.push(String::new());

    for op in &plan.operations {
        if let Some(summary) = &op.summary {
            lines.push(format!("# {}: {summary}", op.operation));
            lines.push(String::new());
        }
        for scenario in &op.scenarios {
            lines.push(scenario_to_http(scenario, base_url_var));
            lines.push(String::new());
            lines.push("###".to_string());
            lines.push(String::new());
        }
    }

    lines.join("\n")
}

/// Generate a single scenario as .http format
pub fn scenario_to_http(scenario: &ScenarioPlan, base_url_var: &str) -> String {
    let mut lines = Vec::new();

    lines.push(format!("### {}", scenario.name));
    lines.push(format!("# expect {}", scenario.expected_status));
    for assertion in &scenario.assertions {
        lines.push(format!("# assert {}", assertion.describe()));
    }

    let request = &scenario.request;
    lines.push(format!(
        "{} {{{{{base_url_var}}}}}{}",
        request.method,
        request.path_and_query()
    ));

    for (key, value) in &request.headers {
        lines.push(format!("{key}: {value}"));
    }

    if let Some(body) = &request.body {
        if !request
            .headers
            .keys()
            .any(|k| k.eq_ignore_ascii_case("content-type"))
        {
            lines.push("Content-Type: application/json".to_string());
        }
        lines.push(String::new());
        lines.push(serde_json::to_string_pretty(body).unwrap_or_default());
    }

    lines.join("\n")
}
