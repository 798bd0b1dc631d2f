//! Declarative JSON shapes with exhaustive validation.
//!
//! A [`Shape`] describes exactly what a stage may emit. Validation walks the
//! whole candidate and reports every violation it finds instead of stopping
//! at the first one.

use serde_json::{Map, Value};

use super::errors::{codes, FieldError};

/// A closed description of a JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// An object with a fixed set of fields; unknown keys are rejected.
    Object(Vec<Field>),
    /// A homogeneous array.
    Array {
        /// Shape of every element.
        items: Box<Shape>,
        /// Minimum number of elements.
        min_items: usize,
    },
    /// A string.
    Text {
        /// Reject empty or whitespace-only strings.
        non_empty: bool,
    },
    /// An integer with optional inclusive bounds.
    Integer {
        /// Lower bound.
        min: Option<i64>,
        /// Upper bound.
        max: Option<i64>,
    },
    /// Any JSON number.
    Number,
    /// A boolean.
    Boolean,
    /// One label of a closed set.
    Enum(&'static [&'static str]),
    /// One level of an abstract ordinal scale. Raw numbers and free text are
    /// semantic violations, not structural ones.
    Scale(&'static [&'static str]),
    /// Exactly this value.
    Literal(Value),
    /// Anything.
    Any,
}

/// A named field of an object shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Key in the JSON object.
    pub name: String,
    /// Shape of the value.
    pub shape: Shape,
    /// Whether the key must be present (and non-null).
    pub required: bool,
}

impl Field {
    /// A field that must be present.
    #[must_use]
    pub fn required(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            required: true,
        }
    }

    /// A field that may be absent or null.
    #[must_use]
    pub fn optional(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            required: false,
        }
    }
}

impl Shape {
    /// Object with the given fields.
    #[must_use]
    pub fn object(fields: impl IntoIterator<Item = Field>) -> Self {
        Self::Object(fields.into_iter().collect())
    }

    /// Array of `items` with no minimum length.
    #[must_use]
    pub fn array(items: Self) -> Self {
        Self::Array {
            items: Box::new(items),
            min_items: 0,
        }
    }

    /// Array of `items` with at least one element.
    #[must_use]
    pub fn non_empty_array(items: Self) -> Self {
        Self::Array {
            items: Box::new(items),
            min_items: 1,
        }
    }

    /// Any string.
    #[must_use]
    pub fn text() -> Self {
        Self::Text { non_empty: false }
    }

    /// A string with visible content.
    #[must_use]
    pub fn non_empty_text() -> Self {
        Self::Text { non_empty: true }
    }

    /// Any integer.
    #[must_use]
    pub fn integer() -> Self {
        Self::Integer { min: None, max: None }
    }

    /// An integer `>= min`.
    #[must_use]
    pub fn integer_min(min: i64) -> Self {
        Self::Integer {
            min: Some(min),
            max: None,
        }
    }

    /// An integer within `[min, max]`.
    #[must_use]
    pub fn integer_range(min: i64, max: i64) -> Self {
        Self::Integer {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Exactly `value`.
    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Validates `value` against this shape and returns every violation.
    #[must_use]
    pub fn validate(&self, value: &Value) -> Vec<FieldError> {
        let mut errors = Vec::new();
        self.check(value, "", &mut errors);
        errors
    }

    fn check(&self, value: &Value, path: &str, errors: &mut Vec<FieldError>) {
        match self {
            Self::Object(fields) => match value {
                Value::Object(map) => check_object(fields, map, path, errors),
                other => errors.push(type_error(path, "object", other)),
            },
            Self::Array { items, min_items } => match value {
                Value::Array(elements) => {
                    if elements.len() < *min_items {
                        errors.push(FieldError::structural(
                            path,
                            codes::TOO_FEW_ITEMS,
                            format!(
                                "expected at least {} item(s), found {}",
                                min_items,
                                elements.len()
                            ),
                        ));
                    }
                    for (i, element) in elements.iter().enumerate() {
                        items.check(element, &format!("{path}[{i}]"), errors);
                    }
                }
                other => errors.push(type_error(path, "array", other)),
            },
            Self::Text { non_empty } => match value {
                Value::String(s) => {
                    if *non_empty && s.trim().is_empty() {
                        errors.push(FieldError::structural(
                            path,
                            codes::EMPTY_TEXT,
                            "must not be empty",
                        ));
                    }
                }
                other => errors.push(type_error(path, "string", other)),
            },
            Self::Integer { min, max } => match value.as_i64() {
                Some(n) => {
                    let below = min.is_some_and(|m| n < m);
                    let above = max.is_some_and(|m| n > m);
                    if below || above {
                        errors.push(FieldError::structural(
                            path,
                            codes::OUT_OF_RANGE,
                            format!("{} is outside {}", n, describe_range(*min, *max)),
                        ));
                    }
                }
                None => errors.push(type_error(path, "integer", value)),
            },
            Self::Number => {
                if !value.is_number() {
                    errors.push(type_error(path, "number", value));
                }
            }
            Self::Boolean => {
                if !value.is_boolean() {
                    errors.push(type_error(path, "boolean", value));
                }
            }
            Self::Enum(labels) => match value {
                Value::String(s) if labels.contains(&s.as_str()) => {}
                Value::String(s) => errors.push(FieldError::structural(
                    path,
                    codes::ENUM_VALUE,
                    format!("'{}' is not one of [{}]", s, labels.join(", ")),
                )),
                other => errors.push(type_error(path, "string", other)),
            },
            Self::Scale(levels) => match value {
                Value::String(s) if levels.contains(&s.as_str()) => {}
                Value::String(s) => errors.push(FieldError::semantic(
                    path,
                    codes::ABSTRACT_SCALE,
                    format!(
                        "'{}' is not an abstract level, expected one of [{}]",
                        s,
                        levels.join(", ")
                    ),
                )),
                Value::Number(n) => errors.push(FieldError::semantic(
                    path,
                    codes::ABSTRACT_SCALE,
                    format!(
                        "raw number {} is not allowed, expected one of [{}]",
                        n,
                        levels.join(", ")
                    ),
                )),
                other => errors.push(type_error(path, "abstract level", other)),
            },
            Self::Literal(expected) => {
                if value != expected {
                    errors.push(FieldError::structural(
                        path,
                        codes::FIXED_LITERAL,
                        format!("must be exactly {expected}, found {value}"),
                    ));
                }
            }
            Self::Any => {}
        }
    }

    /// Renders the shape as a strict JSON Schema document.
    ///
    /// Every property is listed in `required`; optional ones accept `null`
    /// instead, which is the form schema-constrained generation expects.
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        match self {
            Self::Object(fields) => {
                let mut properties = Map::new();
                for field in fields {
                    let schema = field.shape.to_json_schema();
                    let schema = if field.required {
                        schema
                    } else {
                        serde_json::json!({ "anyOf": [schema, { "type": "null" }] })
                    };
                    properties.insert(field.name.clone(), schema);
                }
                let required: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
                serde_json::json!({
                    "type": "object",
                    "properties": properties,
                    "required": required,
                    "additionalProperties": false,
                })
            }
            Self::Array { items, min_items } => {
                let mut schema = serde_json::json!({
                    "type": "array",
                    "items": items.to_json_schema(),
                });
                if *min_items > 0 {
                    schema["minItems"] = serde_json::json!(min_items);
                }
                schema
            }
            Self::Text { non_empty } => {
                if *non_empty {
                    serde_json::json!({ "type": "string", "minLength": 1 })
                } else {
                    serde_json::json!({ "type": "string" })
                }
            }
            Self::Integer { min, max } => {
                let mut schema = serde_json::json!({ "type": "integer" });
                if let Some(min) = min {
                    schema["minimum"] = serde_json::json!(min);
                }
                if let Some(max) = max {
                    schema["maximum"] = serde_json::json!(max);
                }
                schema
            }
            Self::Number => serde_json::json!({ "type": "number" }),
            Self::Boolean => serde_json::json!({ "type": "boolean" }),
            Self::Enum(labels) | Self::Scale(labels) => {
                serde_json::json!({ "type": "string", "enum": labels })
            }
            Self::Literal(value) => serde_json::json!({ "const": value }),
            Self::Any => serde_json::json!({}),
        }
    }
}

fn check_object(
    fields: &[Field],
    map: &Map<String, Value>,
    path: &str,
    errors: &mut Vec<FieldError>,
) {
    for field in fields {
        let field_path = join(path, &field.name);
        match map.get(&field.name) {
            None | Some(Value::Null) if field.required => {
                errors.push(FieldError::structural(
                    field_path,
                    codes::MISSING_FIELD,
                    "required field is missing",
                ));
            }
            None | Some(Value::Null) => {}
            Some(value) => field.shape.check(value, &field_path, errors),
        }
    }

    for key in map.keys() {
        if !fields.iter().any(|f| &f.name == key) {
            errors.push(FieldError::structural(
                join(path, key),
                codes::UNEXPECTED_FIELD,
                "field is not part of the contract",
            ));
        }
    }
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

fn type_error(path: &str, expected: &str, found: &Value) -> FieldError {
    FieldError::structural(
        path,
        codes::TYPE_MISMATCH,
        format!("expected {}, found {}", expected, json_type(found)),
    )
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn describe_range(min: Option<i64>, max: Option<i64>) -> String {
    match (min, max) {
        (Some(lo), Some(hi)) => format!("[{lo}, {hi}]"),
        (Some(lo), None) => format!(">= {lo}"),
        (None, Some(hi)) => format!("<= {hi}"),
        (None, None) => "any".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use serde_json::json;

    const LEVELS: &[&str] = &["bajo", "medio", "alto"];

    fn block_shape() -> Shape {
        Shape::object([
            Field::required("id", Shape::literal("B")),
            Field::required("name", Shape::non_empty_text()),
            Field::required("order", Shape::integer_min(1)),
            Field::required("level", Shape::Scale(LEVELS)),
            Field::required("kind", Shape::Enum(&["a", "b"])),
            Field::optional("notes", Shape::text()),
            Field::required("tags", Shape::non_empty_array(Shape::text())),
        ])
    }

    #[test]
    fn test_conforming_value_has_no_errors() {
        let value = json!({
            "id": "B",
            "name": "Bloque",
            "order": 1,
            "level": "medio",
            "kind": "a",
            "tags": ["x"]
        });
        assert!(block_shape().validate(&value).is_empty());
    }

    #[test]
    fn test_collects_every_violation() {
        let value = json!({
            "id": "A",
            "name": "",
            "order": 0,
            "level": "medio",
            "kind": "z",
            "tags": [],
            "extra": true
        });
        let errors = block_shape().validate(&value);
        let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();

        assert_eq!(errors.len(), 6);
        assert!(paths.contains(&"id"));
        assert!(paths.contains(&"name"));
        assert!(paths.contains(&"order"));
        assert!(paths.contains(&"kind"));
        assert!(paths.contains(&"tags"));
        assert!(paths.contains(&"extra"));
        assert!(errors.iter().all(FieldError::is_structural));
    }

    #[test]
    fn test_missing_and_null_required() {
        let errors = block_shape().validate(&json!({
            "id": "B",
            "name": null,
            "order": 2,
            "level": "alto",
            "kind": "b",
            "tags": ["t"],
            "notes": null
        }));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "name");
        assert_eq!(errors[0].code, codes::MISSING_FIELD);
    }

    #[test]
    fn test_scale_violations_are_semantic() {
        let shape = Shape::object([Field::required("level", Shape::Scale(LEVELS))]);

        let numeric = shape.validate(&json!({ "level": 3 }));
        assert_eq!(numeric.len(), 1);
        assert_eq!(numeric[0].kind, ErrorKind::SemanticValidation);
        assert!(numeric[0].message.contains("raw number 3"));

        let free_text = shape.validate(&json!({ "level": "8-10 series" }));
        assert_eq!(free_text[0].kind, ErrorKind::SemanticValidation);

        let wrong_type = shape.validate(&json!({ "level": ["bajo"] }));
        assert_eq!(wrong_type[0].kind, ErrorKind::StructuralValidation);
    }

    #[test]
    fn test_nested_paths() {
        let shape = Shape::object([Field::required(
            "sessions",
            Shape::array(Shape::object([Field::required("weeks", Shape::literal(4))])),
        )]);
        let errors = shape.validate(&json!({ "sessions": [{ "weeks": 4 }, { "weeks": 6 }] }));

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "sessions[1].weeks");
        assert_eq!(errors[0].message, "must be exactly 4, found 6");
    }

    #[test]
    fn test_integer_rejects_fraction() {
        let errors = Shape::integer_range(1, 7).validate(&json!(2.5));
        assert_eq!(errors[0].code, codes::TYPE_MISMATCH);
        assert_eq!(errors[0].message, "expected integer, found number");

        let errors = Shape::integer_range(1, 7).validate(&json!(9));
        assert_eq!(errors[0].message, "9 is outside [1, 7]");
    }

    #[test]
    fn test_json_schema_is_strict() {
        let schema = block_shape().to_json_schema();

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(schema["required"].as_array().unwrap().len(), 7);
        assert_eq!(schema["properties"]["id"]["const"], "B");
        assert_eq!(schema["properties"]["level"]["enum"], json!(["bajo", "medio", "alto"]));
        assert!(schema["properties"]["notes"]["anyOf"].is_array());
        assert_eq!(schema["properties"]["tags"]["minItems"], 1);
    }
}
