//! Spec model builder: generic document tree → [`SpecDocument`]
//!
//! Accepts OpenAPI 3.x and Swagger 2.0 shapes. Failures scoped to one
//! operation are recorded in [`SpecDocument::skipped`]; only a document that
//! is not a mapping at all fails the whole build.

mod resolve;

use std::collections::BTreeMap;

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use tracing::{debug, warn};

use apiplan_core::{
    ApiKeyLocation, BuildError, Diagnostic, Operation, ParamLocation, ParameterDef, PathTemplate,
    ResponseDef, SchemaId, SchemaKind, SchemaNode, SecurityScheme, SkippedOperation, SpecDocument,
};

use resolve::SchemaResolver;

const METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Build the normalized spec model from a parsed document.
///
/// # Errors
///
/// Returns `InvalidDocument` if the root is not a mapping. Every other
/// problem is reported per operation inside the returned document.
pub fn build(document: &Value) -> Result<SpecDocument, BuildError> {
    let Some(root) = document.as_object() else {
        return Err(BuildError::InvalidDocument(
            "document root is not a mapping".into(),
        ));
    };

    let mut resolver = SchemaResolver::new(document);
    let mut diagnostics = Vec::new();

    let info = root.get("info");
    let title = info.and_then(|i| i.get("title")).and_then(Value::as_str).map(str::to_string);
    let version = info
        .and_then(|i| i.get("version"))
        .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string));

    let security_schemes = extract_security_schemes(document);
    let global_security = root.get("security").map(parse_security);

    let mut operations = Vec::new();
    let mut skipped = Vec::new();

    match root.get("paths").and_then(Value::as_object) {
        Some(paths) => {
            for (path, path_item) in paths {
                let path_item = match resolver.deref(path_item) {
                    Ok(item) => item,
                    Err(e) => {
                        warn!(path = %path, error = %e, "skipping path item");
                        diagnostics.push(Diagnostic::error(Some(path.as_str()), e.to_string()));
                        skipped.push(SkippedOperation {
                            operation: format!("* {path}"),
                            error: e,
                        });
                        continue;
                    }
                };
                let Some(item) = path_item.as_object() else {
                    continue;
                };

                for (method, operation) in item {
                    if !METHODS.contains(&method.as_str()) {
                        continue;
                    }
                    let label = format!("{} {path}", method.to_uppercase());
                    let mark = resolver.mark();
                    let mut op_diagnostics = Vec::new();
                    let input = OperationInput {
                        method,
                        path,
                        path_item,
                        operation,
                        label: &label,
                    };

                    match build_operation(
                        &mut resolver,
                        &input,
                        global_security.as_ref(),
                        &security_schemes,
                        &mut op_diagnostics,
                    ) {
                        Ok(op) => {
                            debug!(operation = %label, parameters = op.parameters.len(), "built operation");
                            diagnostics.extend(op_diagnostics);
                            operations.push(op);
                        }
                        Err(e) => {
                            resolver.rollback(mark);
                            warn!(operation = %label, error = %e, "skipping operation");
                            diagnostics.push(Diagnostic::error(Some(label.as_str()), e.to_string()));
                            skipped.push(SkippedOperation {
                                operation: label,
                                error: e,
                            });
                        }
                    }
                }
            }
        }
        None => diagnostics.push(Diagnostic::info(None, "document declares no paths")),
    }

    Ok(SpecDocument {
        title,
        version,
        operations,
        security_schemes,
        schemas: resolver.into_arena(),
        skipped,
        diagnostics,
    })
}

struct OperationInput<'a, 'l> {
    method: &'a str,
    path: &'a str,
    path_item: &'a Value,
    operation: &'a Value,
    label: &'l str,
}

fn build_operation<'d>(
    resolver: &mut SchemaResolver<'d>,
    input: &OperationInput<'d, '_>,
    global_security: Option<&IndexSet<String>>,
    schemes: &IndexMap<String, SecurityScheme>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Operation, BuildError> {
    let template = PathTemplate::parse(input.path)?;
    let label = input.label;

    // Path-level first, operation-level overrides by (name, location)
    let mut parameters: IndexMap<(String, ParamLocation), ParameterDef> = IndexMap::new();
    let mut request_body: Option<SchemaId> = None;

    for source in [input.path_item.get("parameters"), input.operation.get("parameters")]
        .into_iter()
        .flatten()
    {
        let Some(params) = source.as_array() else {
            continue;
        };
        for raw in params {
            let param = resolver.deref(raw)?;
            let Some(name) = param.get("name").and_then(Value::as_str) else {
                diagnostics.push(Diagnostic::warning(Some(label), "parameter without a name ignored"));
                continue;
            };
            let location = param.get("in").and_then(Value::as_str).unwrap_or("");

            if location == "body" {
                if let Some(schema) = param.get("schema") {
                    let location = format!("{label} body parameter '{name}'");
                    request_body = Some(resolver.schema(schema, &location)?);
                }
                continue;
            }
            let Some(loc) = ParamLocation::parse(location) else {
                diagnostics.push(Diagnostic::info(
                    Some(label),
                    format!("{location} parameter '{name}' ignored"),
                ));
                continue;
            };

            // Re-inserting keeps the path-level position
            let def = parse_parameter(resolver, param, name, loc, label)?;
            parameters.insert((name.to_string(), loc), def);
        }
    }

    template.check_parameters(
        parameters
            .values()
            .filter(|p| p.location == ParamLocation::Path)
            .map(|p| p.name.as_str()),
    )?;

    if let Some(body) = input.operation.get("requestBody") {
        let body = resolver.deref(body)?;
        if let Some(schema) = body.get("content").and_then(pick_media_schema) {
            request_body = Some(resolver.schema(schema, &format!("{label} requestBody"))?);
        }
    }

    let mut responses = BTreeMap::new();
    if let Some(raw) = input.operation.get("responses").and_then(Value::as_object) {
        for (code, response) in raw {
            let Ok(status) = code.parse::<u16>() else {
                if code != "default" {
                    diagnostics.push(Diagnostic::info(
                        Some(label),
                        format!("response key '{code}' is not a status code, ignored"),
                    ));
                }
                continue;
            };
            let response = resolver.deref(response)?;
            // OAS3: content.<media>.schema; Swagger 2: schema
            let schema_value = response
                .get("content")
                .and_then(pick_media_schema)
                .or_else(|| response.get("schema"));
            let schema = match schema_value {
                Some(s) => Some(resolver.schema(s, &format!("{label} response {status}"))?),
                None => None,
            };
            responses.insert(
                status,
                ResponseDef {
                    description: response
                        .get("description")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    schema,
                },
            );
        }
    }

    let security = match input.operation.get("security") {
        Some(s) => parse_security(s),
        None => global_security.cloned().unwrap_or_default(),
    };
    for name in &security {
        if !schemes.contains_key(name) {
            diagnostics.push(Diagnostic::warning(
                Some(label),
                format!("security scheme '{name}' is not declared"),
            ));
        }
    }

    let mut tags: Vec<String> = Vec::new();
    for tag in input
        .operation
        .get("tags")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
    {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }

    Ok(Operation {
        method: input.method.to_uppercase(),
        path: template,
        operation_id: input
            .operation
            .get("operationId")
            .and_then(Value::as_str)
            .map(str::to_string),
        parameters: parameters.into_values().collect(),
        request_body,
        responses,
        security,
        tags,
        summary: input
            .operation
            .get("summary")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

fn parse_parameter<'d>(
    resolver: &mut SchemaResolver<'d>,
    param: &'d Value,
    name: &str,
    location: ParamLocation,
    label: &str,
) -> Result<ParameterDef, BuildError> {
    let schema_location = format!("{label} parameter '{name}'");
    let schema = match param.get("schema") {
        Some(schema) => resolver.schema(schema, &schema_location)?,
        // Swagger 2 puts type/format/enum on the parameter itself
        None if param.get("type").is_some() => {
            let node = resolver.build_node(param, &schema_location)?;
            resolver.alloc(node)
        }
        None => resolver.alloc(SchemaNode::of_kind(SchemaKind::String)),
    };

    // Path parameters are always required
    let required = location == ParamLocation::Path
        || param.get("required").and_then(Value::as_bool).unwrap_or(false);

    let example = param
        .get("example")
        .cloned()
        .or_else(|| {
            param
                .get("examples")
                .and_then(Value::as_object)
                .and_then(|e| e.values().next())
                .and_then(|e| e.get("value"))
                .cloned()
        })
        .or_else(|| resolver.arena().get(schema).example.clone());

    Ok(ParameterDef {
        name: name.to_string(),
        location,
        required,
        schema,
        example,
        description: param
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// Prefer `application/json`, then any `+json` media type, then the first declared.
fn pick_media_schema(content: &Value) -> Option<&Value> {
    let content = content.as_object()?;
    let media = content
        .get("application/json")
        .or_else(|| {
            content
                .iter()
                .find(|(k, _)| k.ends_with("+json"))
                .map(|(_, v)| v)
        })
        .or_else(|| content.values().next())?;
    media.get("schema")
}

/// Union of scheme names across requirement alternatives. An empty
/// alternative (`{}`) makes authentication optional: treated as public.
fn parse_security(value: &Value) -> IndexSet<String> {
    let Some(requirements) = value.as_array() else {
        return IndexSet::new();
    };
    if requirements
        .iter()
        .any(|r| r.as_object().is_some_and(serde_json::Map::is_empty))
    {
        return IndexSet::new();
    }
    requirements
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|r| r.keys().cloned())
        .collect()
}

fn extract_security_schemes(document: &Value) -> IndexMap<String, SecurityScheme> {
    let declared = document
        .get("components")
        .and_then(|c| c.get("securitySchemes"))
        .or_else(|| document.get("securityDefinitions"))
        .and_then(Value::as_object);

    let mut schemes = IndexMap::new();
    for (name, raw) in declared.into_iter().flatten() {
        schemes.insert(name.clone(), parse_security_scheme(raw));
    }
    schemes
}

fn parse_security_scheme(raw: &Value) -> SecurityScheme {
    let kind = raw.get("type").and_then(Value::as_str).unwrap_or("");
    match kind {
        "http" => match raw
            .get("scheme")
            .and_then(Value::as_str)
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("basic") => SecurityScheme::HttpBasic,
            Some("bearer") => SecurityScheme::HttpBearer,
            Some(other) => SecurityScheme::Other(format!("http {other}")),
            None => SecurityScheme::Other("http".into()),
        },
        // Swagger 2
        "basic" => SecurityScheme::HttpBasic,
        "apiKey" => {
            let location = match raw.get("in").and_then(Value::as_str) {
                Some("query") => ApiKeyLocation::Query,
                Some("cookie") => ApiKeyLocation::Cookie,
                _ => ApiKeyLocation::Header,
            };
            SecurityScheme::ApiKey {
                location,
                name: raw
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("X-API-Key")
                    .to_string(),
            }
        }
        "oauth2" => SecurityScheme::OAuth2,
        "openIdConnect" => SecurityScheme::OpenIdConnect,
        other => SecurityScheme::Other(other.to_string()),
    }
}
