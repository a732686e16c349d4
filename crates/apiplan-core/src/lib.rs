//! apiplan-core: Schema model, spec model and test plan types
//!
//! This crate provides the value types shared by every stage of the
//! OpenAPI-to-test-plan compiler: the schema arena, the normalized spec
//! document, scenarios with their assertions, diagnostics and configuration.

pub mod assertion;
pub mod config;
pub mod diagnostic;
pub mod encode;
pub mod error;
pub mod http;
pub mod plan;
pub mod schema;
pub mod spec;

pub use assertion::{Assertion, Check, JsonType, Locator, LocatorSegment, UUID_PATTERN};
pub use config::{Config, ConfigError, Credentials};
pub use diagnostic::{Diagnostic, Severity};
pub use error::BuildError;
pub use http::to_http_file;
pub use plan::{
    OperationPlan, RequestPlan, ScenarioKind, ScenarioPlan, SkippedEntry, TestPlan,
    generate_schema,
};
pub use schema::{SchemaArena, SchemaId, SchemaKind, SchemaNode};
pub use spec::{
    ApiKeyLocation, Operation, ParamLocation, ParameterDef, PathPart, PathTemplate, ResponseDef,
    SecurityScheme, SkippedOperation, SpecDocument,
};
