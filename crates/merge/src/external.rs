//! Expansion of env entries flagged as externally sourced.
//!
//! An entry like
//!
//! ```yaml
//! - name: SESSION_SECRET
//!   external: true
//!   encoding: base64
//! ```
//!
//! has its `value` pulled from the process environment variable of the same
//! name and re-encoded before it participates in any merge.

use base64::Engine;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error("env {0} was not available as an external ENV")]
    MissingExternalEnv(String),
    #[error("unsupported encoding type: {0}")]
    UnsupportedEncoding(String),
}

/// Re-encode `value` in the requested encoding, defaulting to `utf8`.
///
/// The supported set mirrors Node's `Buffer.toString`: `utf8` is the
/// identity, `binary` maps each utf-8 byte to its latin-1 code point and
/// `ascii` masks each byte to 7 bits.
pub fn encode(value: &str, encoding: Option<&str>) -> Result<String, EnvError> {
    match encoding.unwrap_or("utf8") {
        "utf8" => Ok(value.to_string()),
        "base64" => Ok(base64::engine::general_purpose::STANDARD.encode(value.as_bytes())),
        "hex" => Ok(hex::encode(value.as_bytes())),
        "binary" => Ok(value.bytes().map(char::from).collect()),
        "ascii" => Ok(value.bytes().map(|b| char::from(b & 0x7f)).collect()),
        other => Err(EnvError::UnsupportedEncoding(other.to_string())),
    }
}

/// Resolve every entry flagged `external: true` against the process
/// environment. Accepts a single entry object or an array of entries; always
/// returns a fresh array, leaving the input untouched. Entries without the
/// flag pass through unchanged.
pub fn load_external_env(envs: &Value) -> Result<Vec<Value>, EnvError> {
    let entries: Vec<Value> = match envs {
        Value::Array(list) => list.clone(),
        other => vec![other.clone()],
    };
    entries.into_iter().map(resolve_entry).collect()
}

fn resolve_entry(mut entry: Value) -> Result<Value, EnvError> {
    let external = entry
        .get("external")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !external {
        return Ok(entry);
    }
    let name = entry
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let value = std::env::var(&name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| EnvError::MissingExternalEnv(name.clone()))?;
    let encoding = entry
        .get("encoding")
        .and_then(Value::as_str)
        .map(str::to_owned);
    let encoded = encode(&value, encoding.as_deref())?;
    if let Some(obj) = entry.as_object_mut() {
        obj.insert("value".into(), Value::String(encoded));
    }
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encode_supports_the_buffer_encoding_set() {
        assert_eq!(encode("secret", None).unwrap(), "secret");
        assert_eq!(encode("secret", Some("utf8")).unwrap(), "secret");
        assert_eq!(encode("secret", Some("base64")).unwrap(), "c2VjcmV0");
        assert_eq!(encode("secret", Some("hex")).unwrap(), "736563726574");
        assert_eq!(encode("secret", Some("binary")).unwrap(), "secret");
        assert_eq!(encode("secret", Some("ascii")).unwrap(), "secret");
        assert!(matches!(
            encode("secret", Some("rot13")),
            Err(EnvError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn non_external_entries_pass_through() {
        let envs = json!([{ "name": "PLAIN", "value": "kept" }]);
        let out = load_external_env(&envs).unwrap();
        assert_eq!(out, vec![json!({ "name": "PLAIN", "value": "kept" })]);
    }

    #[test]
    fn external_entries_pull_from_the_process_environment() {
        std::env::set_var("DZ_TEST_EXTERNAL_PLAIN", "from-env");
        let envs = json!([{ "name": "DZ_TEST_EXTERNAL_PLAIN", "external": true }]);
        let out = load_external_env(&envs).unwrap();
        assert_eq!(out[0].get("value"), Some(&json!("from-env")));
        std::env::remove_var("DZ_TEST_EXTERNAL_PLAIN");
    }

    #[test]
    fn external_entries_honor_the_requested_encoding() {
        std::env::set_var("DZ_TEST_EXTERNAL_B64", "secret");
        let envs = json!([{ "name": "DZ_TEST_EXTERNAL_B64", "external": true, "encoding": "base64" }]);
        let out = load_external_env(&envs).unwrap();
        assert_eq!(out[0].get("value"), Some(&json!("c2VjcmV0")));
        std::env::remove_var("DZ_TEST_EXTERNAL_B64");
    }

    #[test]
    fn missing_external_variable_is_an_error() {
        let envs = json!([{ "name": "DZ_TEST_EXTERNAL_UNSET", "external": true }]);
        assert!(matches!(
            load_external_env(&envs),
            Err(EnvError::MissingExternalEnv(name)) if name == "DZ_TEST_EXTERNAL_UNSET"
        ));
    }

    #[test]
    fn single_entry_input_becomes_an_array() {
        let entry = json!({ "name": "PLAIN", "value": "one" });
        let out = load_external_env(&entry).unwrap();
        assert_eq!(out.len(), 1);
    }
}
