//! Document loader: read a file and parse JSON or YAML into a generic tree

use std::path::{Path, PathBuf};

use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Read and parse an API document.
///
/// # Errors
///
/// Returns error if the file cannot be read or is neither valid JSON nor YAML
pub fn load_document(path: &Path) -> Result<Value, LoadError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| LoadError::Io(path.to_path_buf(), e.to_string()))?;
    parse_document(path, &content)
}

/// Parse document text.
///
/// Detection strategy: extension first (`.json`, `.yaml`/`.yml`), then
/// content sniffing (leading `{` → JSON, otherwise YAML).
///
/// # Errors
///
/// Returns `LoadError::Parse` naming the format that failed
pub fn parse_document(path: &Path, content: &str) -> Result<Value, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "yaml" | "yml" => parse_yaml(content),
        "json" => parse_json(content),
        _ if content.trim_start().starts_with('{') => parse_json(content),
        _ => parse_yaml(content),
    }
}

fn parse_json(content: &str) -> Result<Value, LoadError> {
    serde_json::from_str(content).map_err(|e| LoadError::Parse(format!("Invalid JSON: {e}")))
}

fn parse_yaml(content: &str) -> Result<Value, LoadError> {
    serde_yml::from_str(content).map_err(|e| LoadError::Parse(format!("Invalid YAML: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_json_by_extension() {
        let v = parse_document(Path::new("api.json"), r#"{"openapi": "3.0.0"}"#).unwrap();
        assert_eq!(v["openapi"], "3.0.0");
    }

    #[test]
    fn parse_yaml_by_extension() {
        let v = parse_document(Path::new("api.YML"), "openapi: 3.0.0\npaths: {}\n").unwrap();
        assert_eq!(v["openapi"], "3.0.0");
        assert!(v["paths"].is_object());
    }

    #[test]
    fn sniff_without_extension() {
        let json = parse_document(Path::new("spec"), "  {\"a\": 1}").unwrap();
        assert_eq!(json["a"], 1);
        let yaml = parse_document(Path::new("spec"), "a: 1\n").unwrap();
        assert_eq!(yaml["a"], 1);
    }

    #[test]
    fn errors_name_the_format() {
        let err = parse_document(Path::new("x.json"), "{nope").unwrap_err();
        assert!(err.to_string().contains("Invalid JSON"));
        let err = parse_document(Path::new("x.yaml"), "a: [").unwrap_err();
        assert!(err.to_string().contains("Invalid YAML"));
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openapi.yaml");
        std::fs::write(&path, "info:\n  title: Pets\n").unwrap();
        let v = load_document(&path).unwrap();
        assert_eq!(v["info"]["title"], "Pets");

        let missing = load_document(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(missing, LoadError::Io(_, _)));
    }
}
