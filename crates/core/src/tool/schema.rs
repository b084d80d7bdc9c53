//! Light argument checking against a tool's JSON Schema.
//!
//! Only the top level of an object schema is enforced: required keys, the
//! primitive type of each declared property, and `additionalProperties:
//! false`. Anything deeper is left to the server.

use std::collections::BTreeMap;

use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum JsonType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Null,
}

impl JsonType {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "string" => Self::String,
            "number" => Self::Number,
            "integer" => Self::Integer,
            "boolean" => Self::Boolean,
            "object" => Self::Object,
            "array" => Self::Array,
            "null" => Self::Null,
            _ => return None,
        })
    }

    fn matches(self, value: &Value) -> bool {
        match (self, value) {
            (Self::String, Value::String(_)) => true,
            (Self::Number, Value::Number(_)) => true,
            (Self::Integer, Value::Number(n)) => {
                n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            (Self::Boolean, Value::Bool(_)) => true,
            (Self::Object, Value::Object(_)) => true,
            (Self::Array, Value::Array(_)) => true,
            (Self::Null, Value::Null) => true,
            _ => false,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Null => "null",
        }
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Parses `type`, which may be a single name or a list of names. Unknown
/// names widen the set to "anything".
fn parse_types(schema: &Value) -> Vec<JsonType> {
    match schema.get("type") {
        Some(Value::String(name)) => JsonType::parse(name).into_iter().collect(),
        Some(Value::Array(names)) => {
            let parsed: Option<Vec<_>> = names
                .iter()
                .map(|name| name.as_str().and_then(JsonType::parse))
                .collect();
            parsed.unwrap_or_default()
        }
        _ => Vec::new(),
    }
}

/// The checkable part of a tool's input schema.
#[derive(Clone, Debug, Default)]
pub(crate) struct ArgumentShape {
    required: Vec<String>,
    /// Declared properties with their allowed types. An empty list accepts
    /// any value.
    properties: BTreeMap<String, Vec<JsonType>>,
    closed: bool,
}

impl ArgumentShape {
    pub fn compile(schema: &Value) -> Self {
        let required = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        let properties = schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .map(|(name, prop)| (name.clone(), parse_types(prop)))
                    .collect()
            })
            .unwrap_or_default();
        let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));
        Self {
            required,
            properties,
            closed,
        }
    }

    pub fn validate(&self, arguments: &Value) -> Result<(), String> {
        let Value::Object(arguments) = arguments else {
            return Err(format!(
                "arguments must be an object, got {}",
                describe(arguments)
            ));
        };

        for name in &self.required {
            if !arguments.contains_key(name) {
                return Err(format!("missing required argument `{name}`"));
            }
        }

        for (name, value) in arguments {
            match self.properties.get(name) {
                Some(types) if types.is_empty() => {}
                Some(types) => {
                    if !types.iter().any(|ty| ty.matches(value)) {
                        let expected: Vec<_> = types.iter().map(|ty| ty.name()).collect();
                        return Err(format!(
                            "argument `{name}` must be {}, got {}",
                            expected.join(" or "),
                            describe(value)
                        ));
                    }
                }
                None if self.closed => {
                    return Err(format!("unexpected argument `{name}`"));
                }
                None => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn commits_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "repo": { "type": "string" },
                "limit": { "type": ["integer", "null"] },
                "filter": {},
            },
            "required": ["repo"],
            "additionalProperties": false,
        })
    }

    #[test]
    fn test_accepts_valid_arguments() {
        let shape = ArgumentShape::compile(&commits_schema());
        assert_eq!(shape.validate(&json!({ "repo": "odpi/egeria" })), Ok(()));
        assert_eq!(
            shape.validate(&json!({ "repo": "odpi/egeria", "limit": 5.0, "filter": [1] })),
            Ok(())
        );
        assert_eq!(
            shape.validate(&json!({ "repo": "odpi/egeria", "limit": null })),
            Ok(())
        );
    }

    #[test]
    fn test_rejects_invalid_arguments() {
        let shape = ArgumentShape::compile(&commits_schema());
        assert_eq!(
            shape.validate(&json!({})),
            Err("missing required argument `repo`".to_owned())
        );
        assert_eq!(
            shape.validate(&json!({ "repo": 42 })),
            Err("argument `repo` must be string, got number".to_owned())
        );
        assert_eq!(
            shape.validate(&json!({ "repo": "a/b", "limit": 1.5 })),
            Err("argument `limit` must be integer or null, got number".to_owned())
        );
        assert_eq!(
            shape.validate(&json!({ "repo": "a/b", "branch": "main" })),
            Err("unexpected argument `branch`".to_owned())
        );
        assert_eq!(
            shape.validate(&json!("odpi/egeria")),
            Err("arguments must be an object, got string".to_owned())
        );
    }

    #[test]
    fn test_open_schema() {
        let shape = ArgumentShape::compile(&json!({ "type": "object" }));
        assert_eq!(shape.validate(&json!({ "anything": true })), Ok(()));

        let shape = ArgumentShape::compile(&Value::Null);
        assert_eq!(shape.validate(&json!({})), Ok(()));
    }
}
