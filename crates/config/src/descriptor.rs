use crate::ConfigError;
use serde_json::Value;
use std::path::Path;

/// Read a JSON ABI file.
///
/// Accepts a raw ABI array or a build artifact carrying it under `abi`.
pub fn load_descriptor(path: impl AsRef<Path>) -> Result<Value, ConfigError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let value = serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(extract_abi(value))
}

/// Unwrap the `abi` field of an artifact object, anything else is returned as is.
pub fn extract_abi(value: Value) -> Value {
    match value {
        Value::Object(mut artifact) if artifact.get("abi").is_some_and(Value::is_array) => {
            artifact.remove("abi").unwrap_or_default()
        }
        other => other,
    }
}
