//! Declarative payload schemas and the generic validator that walks them.
//!
//! A [`Shape`] tree describes one stage's output contract. [`check`] walks a
//! decoded JSON value against it and collects every [`Violation`] it finds,
//! each qualified by a [`FieldPath`]. Objects are always strict: fields not
//! declared in the shape are reported, so drift in the backend's output is
//! caught at the boundary instead of deep inside the application.
//!
//! The same tree renders to a JSON-Schema-style document
//! ([`Shape::to_json_schema`]) that is embedded in prompts as the output
//! contract reference.

pub mod registry;
pub mod violation;

pub use registry::SchemaRegistry;
pub use violation::{FieldPath, ROOT_PATH, Violation, format_violations};

use serde_json::{Map, Value, json};

/// Expected shape of a JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// An object with exactly the declared fields (optional ones may be absent).
    Object(Vec<Field>),
    /// An array whose every element matches the inner shape.
    Array(Box<Shape>),
    /// A string whose trimmed length is at least `min_len` characters.
    String { min_len: usize },
    /// A whole number no smaller than `min`.
    Integer { min: i64 },
    /// Any number, optionally strictly greater than `gt`.
    Number { gt: Option<f64> },
    /// One of a fixed set of strings.
    Enum(&'static [&'static str]),
}

impl Shape {
    pub fn object(fields: impl IntoIterator<Item = Field>) -> Self {
        Self::Object(fields.into_iter().collect())
    }

    pub fn array(items: Shape) -> Self {
        Self::Array(Box::new(items))
    }

    /// A string that must contain at least one non-whitespace character.
    pub fn text() -> Self {
        Self::String { min_len: 1 }
    }

    pub fn positive_number() -> Self {
        Self::Number { gt: Some(0.0) }
    }

    /// Short type name used in violation messages.
    fn type_name(&self) -> &'static str {
        match self {
            Self::Object(_) => "object",
            Self::Array(_) => "array",
            Self::String { .. } | Self::Enum(_) => "string",
            Self::Integer { .. } => "integer",
            Self::Number { .. } => "number",
        }
    }

    /// Render as a JSON-Schema-style document.
    pub fn to_json_schema(&self) -> Value {
        match self {
            Self::Object(fields) => {
                let mut properties = Map::new();
                let mut required = Vec::new();
                for field in fields {
                    let mut schema = field.shape.to_json_schema();
                    if let (Some(desc), Some(obj)) = (field.description, schema.as_object_mut()) {
                        obj.insert("description".to_string(), Value::from(desc));
                    }
                    properties.insert(field.name.to_string(), schema);
                    if field.required {
                        required.push(Value::from(field.name));
                    }
                }
                json!({
                    "type": "object",
                    "properties": properties,
                    "required": required,
                    "additionalProperties": false,
                })
            }
            Self::Array(items) => json!({ "type": "array", "items": items.to_json_schema() }),
            Self::String { min_len } => json!({ "type": "string", "minLength": min_len }),
            Self::Integer { min } => json!({ "type": "integer", "minimum": min }),
            Self::Number { gt: Some(gt) } => json!({ "type": "number", "exclusiveMinimum": gt }),
            Self::Number { gt: None } => json!({ "type": "number" }),
            Self::Enum(values) => json!({ "type": "string", "enum": values }),
        }
    }
}

/// A named member of an object shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub shape: Shape,
    pub required: bool,
    pub description: Option<&'static str>,
}

impl Field {
    pub fn required(name: &'static str, shape: Shape) -> Self {
        Self {
            name,
            shape,
            required: true,
            description: None,
        }
    }

    /// A field that may be absent or `null`.
    pub fn optional(name: &'static str, shape: Shape) -> Self {
        Self {
            name,
            shape,
            required: false,
            description: None,
        }
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }
}

/// Validate `value` against `shape`, returning every violation found.
///
/// An empty result means the value conforms.
pub fn check(shape: &Shape, value: &Value) -> Vec<Violation> {
    let mut violations = Vec::new();
    let mut path = FieldPath::root();
    walk(shape, value, &mut path, &mut violations);
    violations
}

fn walk(shape: &Shape, value: &Value, path: &mut FieldPath, out: &mut Vec<Violation>) {
    match shape {
        Shape::Object(fields) => {
            let Some(obj) = value.as_object() else {
                out.push(type_mismatch(path, shape, value));
                return;
            };
            for field in fields {
                path.push_key(field.name);
                match obj.get(field.name) {
                    None | Some(Value::Null) if !field.required => {}
                    None => out.push(Violation::new(path, "required field is missing")),
                    Some(v) => walk(&field.shape, v, path, out),
                }
                path.pop();
            }
            for key in obj.keys() {
                if !fields.iter().any(|f| f.name == key) {
                    path.push_key(key.as_str());
                    out.push(Violation::new(path, "unknown field"));
                    path.pop();
                }
            }
        }
        Shape::Array(items) => {
            let Some(arr) = value.as_array() else {
                out.push(type_mismatch(path, shape, value));
                return;
            };
            for (i, item) in arr.iter().enumerate() {
                path.push_index(i);
                walk(items, item, path, out);
                path.pop();
            }
        }
        Shape::String { min_len } => {
            let Some(s) = value.as_str() else {
                out.push(type_mismatch(path, shape, value));
                return;
            };
            if s.trim().chars().count() < *min_len {
                let message = if *min_len == 1 {
                    "must not be empty".to_string()
                } else {
                    format!("must be at least {min_len} characters")
                };
                out.push(Violation::new(path, message));
            }
        }
        Shape::Integer { min } => {
            let Some(n) = as_whole_number(value) else {
                out.push(type_mismatch(path, shape, value));
                return;
            };
            if n < *min as f64 {
                out.push(Violation::new(path, format!("must be >= {min}, found {value}")));
            }
        }
        Shape::Number { gt } => {
            let Some(n) = value.as_f64() else {
                out.push(type_mismatch(path, shape, value));
                return;
            };
            if let Some(gt) = gt {
                if n <= *gt {
                    out.push(Violation::new(path, format!("must be > {gt}, found {value}")));
                }
            }
        }
        Shape::Enum(allowed) => {
            let Some(s) = value.as_str() else {
                out.push(type_mismatch(path, shape, value));
                return;
            };
            if !allowed.contains(&s) {
                out.push(Violation::new(
                    path,
                    format!("expected one of {}, found {s:?}", allowed.join(", ")),
                ));
            }
        }
    }
}

/// Integral JSON numbers, including floats with no fractional part (`3.0`).
pub(crate) fn as_whole_number(value: &Value) -> Option<f64> {
    if let Some(n) = value.as_i64() {
        return Some(n as f64);
    }
    if let Some(n) = value.as_u64() {
        return Some(n as f64);
    }
    value.as_f64().filter(|n| n.is_finite() && n.fract() == 0.0)
}

fn json_type_name(value: &Value) -> &'static str {
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

fn type_mismatch(path: &FieldPath, shape: &Shape, value: &Value) -> Violation {
    Violation::new(
        path,
        format!("expected {}, found {}", shape.type_name(), json_type_name(value)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> Shape {
        Shape::object([
            Field::required("name", Shape::text()),
            Field::optional("age", Shape::Integer { min: 0 }),
            Field::optional("tags", Shape::array(Shape::text())),
        ])
    }

    fn paths(violations: &[Violation]) -> Vec<&str> {
        violations.iter().map(|v| v.path.as_str()).collect()
    }

    #[test]
    fn conforming_value_has_no_violations() {
        let v = json!({ "name": "Ada", "age": 36, "tags": ["math"] });
        assert!(check(&person(), &v).is_empty());
    }

    #[test]
    fn optional_fields_may_be_absent_or_null() {
        assert!(check(&person(), &json!({ "name": "Ada" })).is_empty());
        assert!(check(&person(), &json!({ "name": "Ada", "age": null })).is_empty());
    }

    #[test]
    fn missing_required_field_is_reported() {
        let violations = check(&person(), &json!({ "age": 3 }));
        assert_eq!(paths(&violations), vec!["name"]);
        assert_eq!(violations[0].message, "required field is missing");
    }

    #[test]
    fn null_required_field_is_a_type_mismatch() {
        let violations = check(&person(), &json!({ "name": null }));
        assert_eq!(violations[0].message, "expected string, found null");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let violations = check(&person(), &json!({ "name": "Ada", "email": "a@b" }));
        assert_eq!(paths(&violations), vec!["email"]);
        assert_eq!(violations[0].message, "unknown field");
    }

    #[test]
    fn blank_strings_fail_min_length() {
        let violations = check(&person(), &json!({ "name": "   " }));
        assert_eq!(violations[0].message, "must not be empty");
    }

    #[test]
    fn collects_every_violation_with_indexed_paths() {
        let shape = Shape::object([Field::required("people", Shape::array(person()))]);
        let v = json!({ "people": [ { "name": "Ada" }, { "age": -1 }, "bob" ] });
        let violations = check(&shape, &v);
        assert_eq!(
            paths(&violations),
            vec!["people[1].name", "people[1].age", "people[2]"]
        );
    }

    #[test]
    fn root_type_mismatch_uses_root_path() {
        let violations = check(&person(), &json!([1, 2]));
        assert_eq!(paths(&violations), vec!["<root>"]);
        assert_eq!(violations[0].message, "expected object, found array");
    }

    #[test]
    fn integers_accept_whole_floats_only() {
        let shape = Shape::Integer { min: 1 };
        assert!(check(&shape, &json!(2)).is_empty());
        assert!(check(&shape, &json!(2.0)).is_empty());
        assert_eq!(check(&shape, &json!(2.5))[0].message, "expected integer, found number");
        assert_eq!(check(&shape, &json!(0))[0].message, "must be >= 1, found 0");
    }

    #[test]
    fn numbers_respect_exclusive_minimum() {
        let shape = Shape::positive_number();
        assert!(check(&shape, &json!(0.5)).is_empty());
        assert_eq!(check(&shape, &json!(0))[0].message, "must be > 0, found 0");
        assert_eq!(check(&shape, &json!("30"))[0].message, "expected number, found string");
    }

    #[test]
    fn enums_list_allowed_values() {
        let shape = Shape::Enum(&["a", "b"]);
        assert!(check(&shape, &json!("a")).is_empty());
        assert_eq!(check(&shape, &json!("c"))[0].message, "expected one of a, b, found \"c\"");
    }

    #[test]
    fn json_schema_rendering() {
        let schema = Shape::object([
            Field::required("name", Shape::text()).describe("Display name"),
            Field::optional("age", Shape::Integer { min: 0 }),
        ])
        .to_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(schema["required"], json!(["name"]));
        assert_eq!(schema["properties"]["name"]["description"], "Display name");
        assert_eq!(schema["properties"]["age"]["minimum"], 0);
    }
}
