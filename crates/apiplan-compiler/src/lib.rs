//! apiplan-compiler: API document → fully resolved HTTP test plan
//!
//! Pipeline: [`build`] the spec model, then [`compile`] it with the scenario,
//! value and assertion synthesizers.

pub mod assertions;
pub mod build;
pub mod compile;
pub mod loader;
pub mod scenarios;
pub mod values;

pub use assertions::derive_assertions;
pub use build::build;
pub use compile::{compile, compile_document};
pub use loader::{LoadError, load_document, parse_document};
pub use scenarios::ScenarioSynthesizer;
pub use values::{ValueContext, ValueSynthesizer};
