//! Argument validation against a tool's parameter schema.
//!
//! Covers the JSON-schema subset tool schemas use in practice: `type`
//! (single or list), `enum`, `const`, `required`, `properties`,
//! `additionalProperties`, `items`, `anyOf`/`oneOf`, numeric bounds and
//! string length bounds. Unknown keywords are ignored.

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::util::json_type_name;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaViolation {
    /// Dotted path of the offending value; the top-level field comes first.
    pub path: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<Value>,
}

impl SchemaViolation {
    /// Top-level argument the violation belongs to, if any.
    pub fn field(&self) -> Option<&str> {
        let head = self.path.split(['.', '[']).next().unwrap_or_default();
        (!head.is_empty()).then_some(head)
    }
}

/// Validate a complete argument set. Parameters in `skip` are injected and
/// therefore exempt from `required`, `properties` and `additionalProperties`.
pub fn validate_args(schema: &Value, args: &Map<String, Value>, skip: &[String]) -> Vec<SchemaViolation> {
    let mut out = Vec::new();
    let Some(schema) = schema.as_object() else {
        return out;
    };
    let skipped = |name: &str| skip.iter().any(|s| s == name);

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if !skipped(name) && !args.contains_key(name) {
                out.push(SchemaViolation {
                    path: name.to_string(),
                    message: format!("missing required argument '{name}'"),
                    received: None,
                });
            }
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);
    for (name, value) in args {
        if skipped(name) {
            continue;
        }
        match properties.and_then(|props| props.get(name)) {
            Some(prop_schema) => check(prop_schema, value, name, &mut out),
            None => check_additional(schema.get("additionalProperties"), name, value, &mut out),
        }
    }
    out
}

/// One-line, model-readable summary of a set of violations.
pub fn diagnose(tool: &str, violations: &[SchemaViolation]) -> String {
    let parts: Vec<String> = violations
        .iter()
        .map(|v| format!("{}: {}", v.path, v.message))
        .collect();
    format!(
        "Invalid arguments for tool '{tool}': {}. Fix the arguments to match the attached schema and retry.",
        parts.join("; ")
    )
}

fn check_additional(additional: Option<&Value>, path: &str, value: &Value, out: &mut Vec<SchemaViolation>) {
    match additional {
        Some(Value::Bool(false)) => out.push(SchemaViolation {
            path: path.to_string(),
            message: "unexpected argument".to_string(),
            received: Some(value.clone()),
        }),
        Some(schema @ Value::Object(_)) => check(schema, value, path, out),
        _ => {}
    }
}

fn check(schema: &Value, value: &Value, path: &str, out: &mut Vec<SchemaViolation>) {
    let Some(schema) = schema.as_object() else {
        if schema == &Value::Bool(false) {
            out.push(violation(path, "no value is allowed here", value));
        }
        return;
    };

    for key in ["anyOf", "oneOf"] {
        if let Some(options) = schema.get(key).and_then(Value::as_array) {
            let matches = options
                .iter()
                .filter(|option| {
                    let mut scratch = Vec::new();
                    check(option, value, path, &mut scratch);
                    scratch.is_empty()
                })
                .count();
            let ok = if key == "anyOf" { matches > 0 } else { matches == 1 };
            if !ok {
                out.push(violation(
                    path,
                    &format!("does not match {} the allowed alternatives", if key == "anyOf" { "any of" } else { "exactly one of" }),
                    value,
                ));
                return;
            }
        }
    }

    if let Some(expected) = schema.get("type") {
        let allowed: Vec<&str> = match expected {
            Value::String(t) => vec![t.as_str()],
            Value::Array(ts) => ts.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        if !allowed.is_empty() && !allowed.iter().any(|t| type_matches(t, value)) {
            out.push(violation(
                path,
                &format!("expected {}, got {}", allowed.join(" or "), json_type_name(value)),
                value,
            ));
            return;
        }
    }

    if let Some(options) = schema.get("enum").and_then(Value::as_array) {
        if !options.contains(value) {
            out.push(violation(
                path,
                &format!("must be one of {}", Value::Array(options.clone())),
                value,
            ));
        }
    }
    if let Some(expected) = schema.get("const") {
        if expected != value {
            out.push(violation(path, &format!("must equal {expected}"), value));
        }
    }

    match value {
        Value::Number(n) => {
            let n = n.as_f64().unwrap_or_default();
            if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
                if n < min {
                    out.push(violation(path, &format!("must be >= {min}"), value));
                }
            }
            if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
                if n > max {
                    out.push(violation(path, &format!("must be <= {max}"), value));
                }
            }
        }
        Value::String(s) => {
            let len = s.chars().count() as u64;
            if let Some(min) = schema.get("minLength").and_then(Value::as_u64) {
                if len < min {
                    out.push(violation(path, &format!("must be at least {min} characters"), value));
                }
            }
            if let Some(max) = schema.get("maxLength").and_then(Value::as_u64) {
                if len > max {
                    out.push(violation(path, &format!("must be at most {max} characters"), value));
                }
            }
        }
        Value::Array(items) => {
            if let Some(item_schema) = schema.get("items") {
                for (i, item) in items.iter().enumerate() {
                    check(item_schema, item, &format!("{path}[{i}]"), out);
                }
            }
        }
        Value::Object(map) => {
            if let Some(required) = schema.get("required").and_then(Value::as_array) {
                for name in required.iter().filter_map(Value::as_str) {
                    if !map.contains_key(name) {
                        out.push(SchemaViolation {
                            path: format!("{path}.{name}"),
                            message: format!("missing required field '{name}'"),
                            received: None,
                        });
                    }
                }
            }
            let properties = schema.get("properties").and_then(Value::as_object);
            for (name, inner) in map {
                let inner_path = format!("{path}.{name}");
                match properties.and_then(|props| props.get(name)) {
                    Some(prop_schema) => check(prop_schema, inner, &inner_path, out),
                    None => check_additional(schema.get("additionalProperties"), &inner_path, inner, out),
                }
            }
        }
        _ => {}
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "null" => value.is_null(),
        "boolean" => value.is_boolean(),
        "string" => value.is_string(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "number" => value.is_number(),
        "integer" => match value {
            Value::Number(n) => {
                n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            _ => false,
        },
        _ => true,
    }
}

fn violation(path: &str, message: &str, value: &Value) -> SchemaViolation {
    SchemaViolation {
        path: path.to_string(),
        message: message.to_string(),
        received: Some(value.clone()),
    }
}

/// Violations as a JSON list for failure details.
pub fn violations_to_value(violations: &[SchemaViolation]) -> Value {
    json!(violations)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn integer_given_string_is_reported() {
        let schema = json!({
            "type": "object",
            "properties": {"x": {"type": "integer"}},
            "required": ["x"]
        });
        let violations = validate_args(&schema, &args(json!({"x": "abc"})), &[]);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field(), Some("x"));
        assert_eq!(violations[0].message, "expected integer, got string");
        assert_eq!(violations[0].received, Some(json!("abc")));
    }

    #[test]
    fn injected_parameters_are_exempt() {
        let schema = json!({
            "type": "object",
            "properties": {"msg": {"type": "string"}},
            "required": ["msg", "state"],
            "additionalProperties": false
        });
        let skip = vec!["state".to_string()];
        let ok = validate_args(&schema, &args(json!({"msg": "hi", "state": {"a": 1}})), &skip);
        assert!(ok.is_empty(), "{ok:?}");

        let missing = validate_args(&schema, &args(json!({"msg": "hi"})), &[]);
        assert_eq!(missing[0].path, "state");
    }

    #[test]
    fn additional_properties_false_rejects_unknown_arguments() {
        let schema = json!({"type": "object", "properties": {}, "additionalProperties": false});
        let violations = validate_args(&schema, &args(json!({"surprise": 1})), &[]);
        assert_eq!(violations[0].message, "unexpected argument");
    }

    #[test]
    fn nested_items_enum_and_bounds() {
        let schema = json!({
            "type": "object",
            "properties": {
                "numbers": {"type": "array", "items": {"type": "number", "minimum": 0}},
                "mode": {"enum": ["fast", "slow"]},
                "name": {"type": "string", "minLength": 2},
                "opt": {"anyOf": [{"type": "string"}, {"type": "null"}]}
            }
        });
        let violations = validate_args(
            &schema,
            &args(json!({"numbers": [1, -2], "mode": "medium", "name": "a", "opt": null})),
            &[],
        );
        let paths: Vec<&str> = violations.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["mode", "name", "numbers[1]"]);
        assert_eq!(violations[2].field(), Some("numbers"));
    }

    #[test]
    fn type_lists_and_whole_floats() {
        let schema = json!({
            "type": "object",
            "properties": {"n": {"type": ["integer", "null"]}}
        });
        assert!(validate_args(&schema, &args(json!({"n": 3.0})), &[]).is_empty());
        assert!(validate_args(&schema, &args(json!({"n": null})), &[]).is_empty());
        assert_eq!(validate_args(&schema, &args(json!({"n": 3.5})), &[]).len(), 1);
    }

    #[test]
    fn diagnosis_names_tool_and_fields() {
        let schema = json!({"properties": {"x": {"type": "integer"}}});
        let violations = validate_args(&schema, &args(json!({"x": "abc"})), &[]);
        let message = diagnose("add", &violations);
        assert!(message.contains("tool 'add'"));
        assert!(message.contains("x: expected integer, got string"));
    }
}
