//! `$var` substitution for chain step arguments.
//!
//! A string leaf that starts with `$` names an entry of the chain's
//! `variables` map and is replaced by that entry's value (of any JSON type).
//! The reference is the whole rest of the string; there is no path syntax.
//! Names that are not defined are left as the literal string.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::warn;

/// Name referenced by a string leaf, if it is a variable reference.
fn reference(s: &str) -> Option<&str> {
    s.strip_prefix('$').filter(|name| !name.is_empty())
}

/// Resolve every `$name` string leaf in `args` against `variables`.
///
/// Walks objects and arrays recursively; other primitives pass through.
pub fn resolve_arguments(args: &Value, variables: &BTreeMap<String, Value>) -> Value {
    substitute_value(args, variables, "")
}

fn substitute_value(value: &Value, variables: &BTreeMap<String, Value>, path: &str) -> Value {
    match value {
        Value::String(s) => match reference(s) {
            Some(name) => match variables.get(name) {
                Some(resolved) => resolved.clone(),
                None => {
                    warn!(
                        variable = name,
                        argument = path,
                        "Unresolved chain variable, keeping literal"
                    );
                    value.clone()
                }
            },
            None => value.clone(),
        },
        Value::Array(items) => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| substitute_value(v, variables, &format!("{path}[{i}]")))
                .collect(),
        ),
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                let child = if path.is_empty() {
                    k.clone()
                } else {
                    format!("{path}.{k}")
                };
                out.insert(k.clone(), substitute_value(v, variables, &child));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// All variable names referenced anywhere in `args`, sorted and deduplicated.
pub fn referenced_variables(args: &Value) -> Vec<String> {
    let mut names = Vec::new();
    collect(args, &mut names);
    names.sort();
    names.dedup();
    names
}

fn collect(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            if let Some(name) = reference(s) {
                out.push(name.to_string());
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect(v, out)),
        _ => {}
    }
}
