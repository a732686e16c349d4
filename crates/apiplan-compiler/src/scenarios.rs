//! Operation → ordered scenario list
//!
//! Emission order is fixed: happy, missing-parameter (declaration order),
//! unauthenticated, invalid-credential, insufficient-permission, not-found.

use indexmap::IndexMap;
use serde_json::Value;

use apiplan_core::{
    ApiKeyLocation, Config, Diagnostic, Operation, ParamLocation, ParameterDef, RequestPlan,
    ScenarioKind, ScenarioPlan, SecurityScheme, SpecDocument, encode,
};

use crate::values::{ValueContext, ValueSynthesizer};

/// Not-found sentinel for uuid-formatted identifiers; never produced by the
/// value synthesizer (it emits version-4 ids).
pub const NIL_UUID: &str = "00000000-0000-0000-0000-000000000000";

/// Not-found sentinel for other free-string identifiers.
pub const NOT_FOUND_SENTINEL: &str = "apiplan-nonexistent-0";

/// Where an operation's credential goes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CredentialSlot {
    Header { name: String, prefix: &'static str },
    Query { name: String },
    Cookie { name: String },
}

impl CredentialSlot {
    /// Whether a documented parameter occupies this slot.
    fn occupied_by(&self, param: &ParameterDef) -> bool {
        match (self, param.location) {
            (Self::Header { name, .. }, ParamLocation::Header) => {
                name.eq_ignore_ascii_case(&param.name)
            }
            (Self::Query { name }, ParamLocation::Query) => *name == param.name,
            _ => false,
        }
    }

    /// Drop anything already filling the slot.
    fn clear(&self, query: &mut IndexMap<String, String>, headers: &mut IndexMap<String, String>) {
        let header = match self {
            Self::Header { name, .. } => name.as_str(),
            Self::Query { name } => {
                query.shift_remove(name);
                return;
            }
            Self::Cookie { .. } => "Cookie",
        };
        headers.retain(|k, _| !k.eq_ignore_ascii_case(header));
    }

    fn fill(
        &self,
        token: &str,
        query: &mut IndexMap<String, String>,
        headers: &mut IndexMap<String, String>,
    ) {
        match self {
            Self::Header { name, prefix } => {
                headers.insert(name.clone(), format!("{prefix}{token}"));
            }
            Self::Query { name } => {
                query.insert(name.clone(), token.to_string());
            }
            Self::Cookie { name } => {
                headers.insert("Cookie".into(), format!("{name}={token}"));
            }
        }
    }

    fn for_scheme(scheme: Option<&SecurityScheme>) -> Self {
        match scheme {
            Some(SecurityScheme::HttpBasic) => Self::Header {
                name: "Authorization".into(),
                prefix: "Basic ",
            },
            Some(SecurityScheme::ApiKey { location, name }) => match location {
                ApiKeyLocation::Header => Self::Header {
                    name: name.clone(),
                    prefix: "",
                },
                ApiKeyLocation::Query => Self::Query { name: name.clone() },
                ApiKeyLocation::Cookie => Self::Cookie { name: name.clone() },
            },
            _ => Self::Header {
                name: "Authorization".into(),
                prefix: "Bearer ",
            },
        }
    }
}

/// A parameter with its happy-path value, ready for substitution.
struct Bound<'o> {
    param: &'o ParameterDef,
    value: String,
}

pub struct ScenarioSynthesizer<'a> {
    document: &'a SpecDocument,
    config: &'a Config,
    values: ValueSynthesizer<'a>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> ScenarioSynthesizer<'a> {
    #[must_use]
    pub fn new(document: &'a SpecDocument, config: &'a Config) -> Self {
        Self {
            document,
            config,
            values: ValueSynthesizer::new(&document.schemas),
            diagnostics: Vec::new(),
        }
    }

    /// Decide and build every applicable scenario for `op`.
    pub fn plan(&mut self, op: &Operation) -> Vec<ScenarioPlan> {
        let label = op.label();
        self.values.set_operation(&label);

        let bound: Vec<Bound<'_>> = op
            .parameters
            .iter()
            .filter(|p| p.required || p.example.is_some())
            .map(|p| Bound {
                param: p,
                value: self.parameter_value(p),
            })
            .collect();

        let body = op
            .request_body
            .map(|id| self.values.synthesize(id, &ValueContext::new("body")));

        let slot = (!op.security.is_empty()).then(|| {
            // First scheme in requirement order
            let scheme = op
                .security
                .iter()
                .find_map(|name| self.document.security_schemes.get(name));
            CredentialSlot::for_scheme(scheme)
        });
        let config = self.config;
        let credentials = &config.credentials;
        let slot = slot.as_ref();
        let token = Some(credentials.token.as_str());

        let build = |kind: ScenarioKind, request: RequestPlan, expected_status: u16| ScenarioPlan {
            operation: label.clone(),
            name: format!("{label} {}", kind.describe()),
            kind,
            request,
            expected_status,
            assertions: Vec::new(),
        };

        let mut scenarios = Vec::new();

        scenarios.push(build(
            ScenarioKind::Happy,
            self.request(op, &bound, None, slot, token, body.as_ref()),
            op.success_status(),
        ));

        let required: Vec<&ParameterDef> = op.parameters.iter().filter(|p| p.required).collect();
        if op.documents(400) {
            for &param in &required {
                scenarios.push(build(
                    ScenarioKind::MissingRequiredParameter {
                        parameter: param.name.clone(),
                        location: param.location,
                    },
                    self.request(op, &bound, Some((param, None)), slot, token, body.as_ref()),
                    400,
                ));
            }
        } else if !required.is_empty() {
            self.diagnostics.push(Diagnostic::info(
                Some(label.as_str()),
                "no 400 response documented, missing-parameter scenarios skipped",
            ));
        }

        if slot.is_some() {
            let auth = [
                (ScenarioKind::Unauthenticated, None, 401),
                (
                    ScenarioKind::InvalidCredential,
                    Some(credentials.invalid_token.as_str()),
                    401,
                ),
                (
                    ScenarioKind::InsufficientPermission,
                    Some(credentials.limited_token.as_str()),
                    403,
                ),
            ];
            for (kind, credential, status) in auth {
                scenarios.push(build(
                    kind,
                    self.request(op, &bound, None, slot, credential, body.as_ref()),
                    status,
                ));
            }
        }

        if op.documents(404) {
            if let Some((param, sentinel)) = self.not_found_target(op) {
                let value = encode::path_segment(&sentinel);
                scenarios.push(build(
                    ScenarioKind::NotFound {
                        parameter: param.name.clone(),
                    },
                    self.request(
                        op,
                        &bound,
                        Some((param, Some(value))),
                        slot,
                        token,
                        body.as_ref(),
                    ),
                    404,
                ));
            }
        }

        scenarios
    }

    /// Diagnostics gathered across every planned operation.
    #[must_use]
    pub fn into_diagnostics(mut self) -> Vec<Diagnostic> {
        let mut diagnostics = self.diagnostics;
        diagnostics.extend(self.values.take_diagnostics());
        diagnostics
    }

    /// Happy-path value: configured path value, then documented example,
    /// then a synthesized one. Path values come back percent-encoded.
    fn parameter_value(&mut self, param: &ParameterDef) -> String {
        let is_path = param.location == ParamLocation::Path;
        if is_path {
            if let Some(fixed) = self.config.path_params.get(&param.name) {
                return encode::path_segment(fixed);
            }
        }
        if let Some(example) = &param.example {
            let raw = encode::value_to_string(example);
            return if is_path {
                encode::path_segment(&raw)
            } else {
                raw
            };
        }
        let ctx = ValueContext {
            parameter_name: &param.name,
            is_path_segment: is_path,
        };
        match self.values.synthesize(param.schema, &ctx) {
            Value::String(s) => s,
            other => encode::value_to_string(&other),
        }
    }

    /// Last free-string path parameter in template order, with its sentinel.
    fn not_found_target<'o>(&self, op: &'o Operation) -> Option<(&'o ParameterDef, String)> {
        let param = op.path.tokens().collect::<Vec<_>>().into_iter().rev().find_map(|token| {
            op.path_parameters().find(|p| {
                p.name == token && self.document.schemas.get(p.schema).is_free_string()
            })
        })?;

        let sentinel = match &self.config.not_found_value {
            Some(v) => v.clone(),
            None if self.document.schemas.get(param.schema).is_uuid() => NIL_UUID.to_string(),
            None => NOT_FOUND_SENTINEL.to_string(),
        };
        Some((param, sentinel))
    }

    /// Assemble a request from bound values.
    ///
    /// `change`: a parameter to drop (`None`) or to replace (`Some(value)`).
    /// The credential slot only ever carries `credential`; a documented
    /// parameter or configured header of the same name is left out.
    fn request(
        &self,
        op: &Operation,
        bound: &[Bound<'_>],
        change: Option<(&ParameterDef, Option<String>)>,
        slot: Option<&CredentialSlot>,
        credential: Option<&str>,
        body: Option<&Value>,
    ) -> RequestPlan {
        let value_of = |param: &ParameterDef, value: &str| -> Option<String> {
            match &change {
                Some((target, replacement))
                    if target.name == param.name && target.location == param.location =>
                {
                    replacement.clone()
                }
                _ => Some(value.to_string()),
            }
        };

        let path = op.path.render(|token| {
            bound
                .iter()
                .find(|b| b.param.location == ParamLocation::Path && b.param.name == token)
                .and_then(|b| value_of(b.param, &b.value))
        });

        let mut query = IndexMap::new();
        let mut headers: IndexMap<String, String> = self.config.headers.clone();
        if let Some(slot) = slot {
            slot.clear(&mut query, &mut headers);
        }
        for b in bound {
            if slot.is_some_and(|s| s.occupied_by(b.param)) {
                continue;
            }
            let Some(value) = value_of(b.param, &b.value) else {
                continue;
            };
            match b.param.location {
                ParamLocation::Query => {
                    query.insert(b.param.name.clone(), value);
                }
                ParamLocation::Header => {
                    headers.insert(b.param.name.clone(), value);
                }
                ParamLocation::Path => {}
            }
        }

        // Omitting a parameter that is the credential omits the credential
        let slot_dropped = matches!(
            (&change, slot),
            (Some((target, None)), Some(s)) if s.occupied_by(target)
        );
        if let (Some(slot), Some(token), false) = (slot, credential, slot_dropped) {
            slot.fill(token, &mut query, &mut headers);
        }

        RequestPlan {
            method: op.method.clone(),
            path,
            query,
            headers,
            body: body.cloned(),
        }
    }
}
