//! Deep-merge engine for deployment configuration documents.
//!
//! Configuration is layered from several sources (type defaults, base
//! definitions, per-cluster definitions, externally fetched overrides) and the
//! precedence rules live here: source wins field-by-field, `null` never erases
//! a value, and arrays under designated field names (the `env` convention) are
//! reconciled by their `name` key instead of positionally.

#![forbid(unsafe_code)]

mod external;

pub use external::{encode, load_external_env, EnvError};

use serde_json::Value;
use std::collections::BTreeSet;

/// Field names whose array values merge by `name` key instead of by index.
///
/// Defaults to `{"env"}`, the environment-variable-list convention.
#[derive(Debug, Clone)]
pub struct NamedArrayFields(BTreeSet<String>);

impl Default for NamedArrayFields {
    fn default() -> Self {
        Self(std::iter::once("env".to_string()).collect())
    }
}

impl NamedArrayFields {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(fields.into_iter().map(Into::into).collect())
    }

    fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }
}

/// Merge `source` over `base`, producing a new value. Neither input is
/// mutated.
///
/// Objects merge recursively with source fields winning; a `null` in `source`
/// keeps the base value for that field (but a key absent from `base` is still
/// introduced, even as `null`); arrays under a key named in `named` use
/// [`merge_envs`]; all other arrays merge element-wise by index with the base
/// tail retained.
pub fn merge(base: &Value, source: &Value, named: &NamedArrayFields) -> Value {
    match (base, source) {
        (Value::Object(base_map), Value::Object(source_map)) => {
            let mut out = base_map.clone();
            for (key, source_value) in source_map {
                let merged = match out.get(key) {
                    Some(base_value) => merge_field(base_value, source_value, key, named),
                    None => source_value.clone(),
                };
                out.insert(key.clone(), merged);
            }
            Value::Object(out)
        }
        _ => source.clone(),
    }
}

fn merge_field(base: &Value, source: &Value, key: &str, named: &NamedArrayFields) -> Value {
    if source.is_null() {
        return base.clone();
    }
    match (base, source) {
        (Value::Array(base_arr), Value::Array(source_arr)) if named.contains(key) => {
            Value::Array(merge_envs(base_arr, source_arr))
        }
        (Value::Array(base_arr), Value::Array(source_arr)) => {
            merge_arrays(base_arr, source_arr, named)
        }
        (Value::Object(_), Value::Object(_)) => merge(base, source, named),
        _ => source.clone(),
    }
}

/// Positional array merge: elements at the same index are deep-merged, the
/// longer input's tail is carried through unchanged.
fn merge_arrays(base: &[Value], source: &[Value], named: &NamedArrayFields) -> Value {
    let mut out = Vec::with_capacity(base.len().max(source.len()));
    for i in 0..base.len().max(source.len()) {
        match (base.get(i), source.get(i)) {
            (Some(b), Some(s)) => out.push(merge_element(b, s, named)),
            (Some(b), None) => out.push(b.clone()),
            (None, Some(s)) => out.push(s.clone()),
            (None, None) => unreachable!(),
        }
    }
    Value::Array(out)
}

fn merge_element(base: &Value, source: &Value, named: &NamedArrayFields) -> Value {
    if source.is_null() {
        return base.clone();
    }
    match (base, source) {
        (Value::Object(_), Value::Object(_)) => merge(base, source, named),
        (Value::Array(b), Value::Array(s)) => merge_arrays(b, s, named),
        _ => source.clone(),
    }
}

/// Merge two env-style arrays, reconciling entries by their `name` key.
///
/// Base order is authoritative: each base entry keeps its position, and the
/// first source entry with a matching name is consumed from a working copy and
/// shallow-merged over it (source fields win). Unmatched source entries are
/// appended afterwards in their original relative order. Entries without a
/// non-empty string `name` never match anything. Duplicate names within one
/// input are not deduplicated; each base occurrence consumes at most one
/// source occurrence.
pub fn merge_envs(base: &[Value], source: &[Value]) -> Vec<Value> {
    let mut remaining: Vec<Value> = source.to_vec();
    let mut out = Vec::with_capacity(base.len() + source.len());
    for entry in base {
        let mut entry = entry.clone();
        if let Some(name) = entry_name(&entry) {
            let name = name.to_string();
            if let Some(idx) = remaining.iter().position(|s| entry_name(s) == Some(&name)) {
                let matched = remaining.remove(idx);
                if let (Some(dst), Some(src)) = (entry.as_object_mut(), matched.as_object()) {
                    for (k, v) in src {
                        dst.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        out.push(entry);
    }
    out.extend(remaining);
    out
}

/// Deep merge for document inclusion: `source` wins everywhere (a `null`
/// replaces the base value, unlike [`merge`]), and a pair of arrays whose
/// source side opens with a named entry reconciles by `name` key regardless of
/// which field the array sits under. Matched entries merge deeply; unmatched
/// source entries are appended. Other arrays merge element-wise with the
/// longer tail retained.
pub fn merge_named(base: &Value, source: &Value) -> Value {
    match (base, source) {
        (Value::Object(base_map), Value::Object(source_map)) => {
            let mut out = base_map.clone();
            for (key, source_value) in source_map {
                let merged = match out.get(key) {
                    Some(base_value) => merge_named(base_value, source_value),
                    None => source_value.clone(),
                };
                out.insert(key.clone(), merged);
            }
            Value::Object(out)
        }
        (Value::Array(base_arr), Value::Array(source_arr)) => {
            if source_arr.first().and_then(entry_name).is_some() {
                Value::Array(merge_named_entries(base_arr, source_arr))
            } else {
                let mut out = Vec::with_capacity(base_arr.len().max(source_arr.len()));
                for i in 0..base_arr.len().max(source_arr.len()) {
                    match (base_arr.get(i), source_arr.get(i)) {
                        (Some(b), Some(s)) => out.push(merge_named(b, s)),
                        (Some(b), None) => out.push(b.clone()),
                        (None, Some(s)) => out.push(s.clone()),
                        (None, None) => unreachable!(),
                    }
                }
                Value::Array(out)
            }
        }
        _ => source.clone(),
    }
}

fn merge_named_entries(base: &[Value], source: &[Value]) -> Vec<Value> {
    let mut out = base.to_vec();
    for entry in source {
        let idx = entry_name(entry)
            .and_then(|name| out.iter().position(|e| entry_name(e) == Some(name)));
        match idx {
            Some(i) => out[i] = merge_named(&out[i], entry),
            None => out.push(entry.clone()),
        }
    }
    out
}

fn entry_name(entry: &Value) -> Option<&str> {
    entry
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn named() -> NamedArrayFields {
        NamedArrayFields::default()
    }

    #[test]
    fn merge_with_empty_source_is_identity() {
        let base = json!({
            "metadata": { "name": "auth", "labels": { "tier": "backend" } },
            "replicas": 3,
            "ports": [80, 443]
        });
        assert_eq!(merge(&base, &json!({}), &named()), base);
    }

    #[test]
    fn source_wins_and_objects_recurse() {
        let base = json!({ "a": 1, "nested": { "x": 1, "y": 2 } });
        let source = json!({ "a": 2, "nested": { "y": 3, "z": 4 }, "b": true });
        assert_eq!(
            merge(&base, &source, &named()),
            json!({ "a": 2, "nested": { "x": 1, "y": 3, "z": 4 }, "b": true })
        );
    }

    #[test]
    fn null_never_erases_a_base_value() {
        let base = json!({ "a": 1 });
        assert_eq!(merge(&base, &json!({ "a": null }), &named()), json!({ "a": 1 }));
        // but a key the base never had is still introduced
        assert_eq!(
            merge(&base, &json!({ "b": null }), &named()),
            json!({ "a": 1, "b": null })
        );
    }

    #[test]
    fn plain_arrays_merge_element_wise() {
        let base = json!({ "ports": [{ "port": 80 }, { "port": 443, "tls": true }] });
        let source = json!({ "ports": [{ "port": 8080 }] });
        assert_eq!(
            merge(&base, &source, &named()),
            json!({ "ports": [{ "port": 8080 }, { "port": 443, "tls": true }] })
        );
    }

    #[test]
    fn env_arrays_merge_by_name() {
        let base = json!({ "env": [{ "name": "a", "v": 1 }, { "name": "b", "v": 2 }] });
        let source = json!({ "env": [{ "name": "b", "v": 3 }, { "name": "c", "v": 4 }] });
        assert_eq!(
            merge(&base, &source, &named()),
            json!({ "env": [{ "name": "a", "v": 1 }, { "name": "b", "v": 3 }, { "name": "c", "v": 4 }] })
        );
    }

    #[test]
    fn env_arrays_nested_under_containers_still_merge_by_name() {
        let base = json!({ "web": { "env": [{ "name": "X", "value": "base" }] } });
        let source = json!({ "web": { "env": [{ "name": "X", "value": "override" }] } });
        let merged = merge(&base, &source, &named());
        assert_eq!(
            merged,
            json!({ "web": { "env": [{ "name": "X", "value": "override" }] } })
        );
    }

    #[test]
    fn custom_named_array_fields_replace_the_default() {
        let fields = NamedArrayFields::new(["volumes"]);
        let base = json!({ "env": [{ "name": "a", "v": 1 }], "volumes": [{ "name": "data", "size": "1Gi" }] });
        let source = json!({ "env": [{ "name": "b", "v": 2 }], "volumes": [{ "name": "data", "size": "2Gi" }] });
        let merged = merge(&base, &source, &fields);
        // env falls back to positional merge, volumes reconcile by name
        assert_eq!(merged.get("env"), Some(&json!([{ "name": "b", "v": 2 }])));
        assert_eq!(
            merged.get("volumes"),
            Some(&json!([{ "name": "data", "size": "2Gi" }]))
        );
    }

    #[test]
    fn merge_envs_preserves_base_order_and_appends_unmatched() {
        let base = vec![json!({ "name": "a", "v": 1 }), json!({ "name": "b", "v": 2 })];
        let source = vec![json!({ "name": "b", "v": 3 }), json!({ "name": "c", "v": 4 })];
        assert_eq!(
            merge_envs(&base, &source),
            vec![
                json!({ "name": "a", "v": 1 }),
                json!({ "name": "b", "v": 3 }),
                json!({ "name": "c", "v": 4 }),
            ]
        );
    }

    #[test]
    fn merge_envs_consumes_only_the_first_structural_match() {
        let base = vec![json!({ "name": "a", "v": "base" })];
        let source = vec![
            json!({ "name": "a", "v": "first" }),
            json!({ "name": "a", "v": "second" }),
        ];
        assert_eq!(
            merge_envs(&base, &source),
            vec![
                json!({ "name": "a", "v": "first" }),
                json!({ "name": "a", "v": "second" }),
            ]
        );
    }

    #[test]
    fn merge_envs_ignores_entries_without_a_name() {
        let base = vec![json!({ "value": "anonymous" }), json!({ "name": "a", "v": 1 })];
        let source = vec![json!({ "value": "also-anonymous" })];
        assert_eq!(
            merge_envs(&base, &source),
            vec![
                json!({ "value": "anonymous" }),
                json!({ "name": "a", "v": 1 }),
                json!({ "value": "also-anonymous" }),
            ]
        );
    }

    #[test]
    fn merge_named_reconciles_named_arrays_under_any_field() {
        let base = json!({
            "people": [
                { "name": "ada", "spec": { "age": 30, "weight": 59 } },
                { "name": "joe", "spec": { "age": 40 } }
            ]
        });
        let source = json!({
            "people": [{ "name": "ada", "spec": { "age": 28 } }]
        });
        assert_eq!(
            merge_named(&base, &source),
            json!({
                "people": [
                    { "name": "ada", "spec": { "age": 28, "weight": 59 } },
                    { "name": "joe", "spec": { "age": 40 } }
                ]
            })
        );
    }

    #[test]
    fn merge_named_appends_unmatched_entries() {
        let base = json!({ "env": [{ "name": "A", "value": "1" }] });
        let source = json!({ "env": [{ "name": "B", "value": "2" }] });
        assert_eq!(
            merge_named(&base, &source),
            json!({ "env": [{ "name": "A", "value": "1" }, { "name": "B", "value": "2" }] })
        );
    }

    #[test]
    fn merge_named_falls_back_to_element_wise_for_nameless_arrays() {
        let base = json!({ "siblings": ["alex", "emma"] });
        let source = json!({ "siblings": ["alex", "emma", "steve"] });
        assert_eq!(
            merge_named(&base, &source),
            json!({ "siblings": ["alex", "emma", "steve"] })
        );
    }

    #[test]
    fn merge_named_lets_null_replace_the_base_value() {
        // the inclusion layering has no null-retention rule
        let base = json!({ "a": 1 });
        assert_eq!(
            merge_named(&base, &json!({ "a": null })),
            json!({ "a": null })
        );
    }

    #[test]
    fn merge_never_mutates_inputs() {
        let base = json!({ "env": [{ "name": "a", "v": 1 }] });
        let source = json!({ "env": [{ "name": "a", "v": 2 }] });
        let base_before = base.clone();
        let source_before = source.clone();
        let _ = merge(&base, &source, &named());
        assert_eq!(base, base_before);
        assert_eq!(source, source_before);
    }
}
