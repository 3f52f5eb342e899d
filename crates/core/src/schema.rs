// Parameter schemas for tool arguments and the validator that enforces them
//
// Every tool declares a `ParameterSchema`. Raw model-issued arguments are only
// ever turned into `ValidatedArguments` by `ParameterSchema::validate`, so a
// handler never sees input that broke its contract.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Type and constraints of a single tool parameter
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    String,
    Integer { min: Option<i64>, max: Option<i64> },
    Number { min: Option<f64>, max: Option<f64> },
    Boolean,
    Enum { values: &'static [&'static str] },
}

impl ParamKind {
    fn type_name(&self) -> &'static str {
        match self {
            Self::String | Self::Enum { .. } => "string",
            Self::Integer { .. } => "integer",
            Self::Number { .. } => "number",
            Self::Boolean => "boolean",
        }
    }
}

/// One named parameter of a tool
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

impl ParamSpec {
    fn new(name: &'static str, description: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            description,
            kind,
            required: true,
        }
    }

    pub fn string(name: &'static str, description: &'static str) -> Self {
        Self::new(name, description, ParamKind::String)
    }

    pub fn integer(name: &'static str, description: &'static str) -> Self {
        Self::new(name, description, ParamKind::Integer { min: None, max: None })
    }

    pub fn number(name: &'static str, description: &'static str) -> Self {
        Self::new(name, description, ParamKind::Number { min: None, max: None })
    }

    pub fn boolean(name: &'static str, description: &'static str) -> Self {
        Self::new(name, description, ParamKind::Boolean)
    }

    pub fn one_of(
        name: &'static str,
        description: &'static str,
        values: &'static [&'static str],
    ) -> Self {
        Self::new(name, description, ParamKind::Enum { values })
    }

    /// Enum parameter whose allowed values come from a `ChoiceParam` type.
    pub fn choice<T: ChoiceParam>(name: &'static str, description: &'static str) -> Self {
        Self::one_of(name, description, T::VALUES)
    }

    /// Inclusive bounds. Applies to integer and number parameters only.
    pub fn between(mut self, min: i64, max: i64) -> Self {
        self.kind = match self.kind {
            ParamKind::Integer { .. } => ParamKind::Integer {
                min: Some(min),
                max: Some(max),
            },
            ParamKind::Number { .. } => ParamKind::Number {
                min: Some(min as f64),
                max: Some(max as f64),
            },
            other => other,
        };
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    fn to_json(&self) -> Value {
        let mut property = Map::new();
        property.insert("type".into(), Value::from(self.kind.type_name()));
        property.insert("description".into(), Value::from(self.description));
        match &self.kind {
            ParamKind::Integer { min, max } => {
                if let Some(min) = min {
                    property.insert("minimum".into(), Value::from(*min));
                }
                if let Some(max) = max {
                    property.insert("maximum".into(), Value::from(*max));
                }
            }
            ParamKind::Number { min, max } => {
                if let Some(min) = min {
                    property.insert("minimum".into(), Value::from(*min));
                }
                if let Some(max) = max {
                    property.insert("maximum".into(), Value::from(*max));
                }
            }
            ParamKind::Enum { values } => {
                property.insert("enum".into(), Value::from(values.to_vec()));
            }
            ParamKind::String | ParamKind::Boolean => {}
        }
        Value::Object(property)
    }

    fn check(&self, value: &Value) -> Result<ArgValue, Constraint> {
        match &self.kind {
            ParamKind::String => value
                .as_str()
                .map(|s| ArgValue::Text(s.to_string()))
                .ok_or_else(|| Constraint::wrong_type("string", value)),
            ParamKind::Boolean => value
                .as_bool()
                .map(ArgValue::Boolean)
                .ok_or_else(|| Constraint::wrong_type("boolean", value)),
            ParamKind::Integer { min, max } => {
                let number = value
                    .as_f64()
                    .ok_or_else(|| Constraint::wrong_type("integer", value))?;
                let integer = match value.as_i64() {
                    Some(i) => i,
                    None if number.fract() != 0.0 => return Err(Constraint::NotAnInteger),
                    // Whole-valued floats such as 255.0 are accepted as integers.
                    None if number.abs() < MAX_SAFE_INTEGER => number as i64,
                    None => {
                        return Err(Constraint::OutOfRange {
                            value: number,
                            min: min.map(|m| m as f64),
                            max: max.map(|m| m as f64),
                        })
                    }
                };
                if min.is_some_and(|m| integer < m) || max.is_some_and(|m| integer > m) {
                    return Err(Constraint::OutOfRange {
                        value: number,
                        min: min.map(|m| m as f64),
                        max: max.map(|m| m as f64),
                    });
                }
                Ok(ArgValue::Integer(integer))
            }
            ParamKind::Number { min, max } => {
                let number = value
                    .as_f64()
                    .ok_or_else(|| Constraint::wrong_type("number", value))?;
                if min.is_some_and(|m| number < m) || max.is_some_and(|m| number > m) {
                    return Err(Constraint::OutOfRange {
                        value: number,
                        min: *min,
                        max: *max,
                    });
                }
                Ok(ArgValue::Number(number))
            }
            ParamKind::Enum { values } => {
                let choice = value
                    .as_str()
                    .ok_or_else(|| Constraint::wrong_type("string", value))?;
                if values.contains(&choice) {
                    Ok(ArgValue::Choice(choice.to_string()))
                } else {
                    Err(Constraint::NotAllowed {
                        value: choice.to_string(),
                        allowed: values.iter().map(|v| v.to_string()).collect(),
                    })
                }
            }
        }
    }
}

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Typed parameter contract of one tool
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSchema {
    params: Vec<ParamSpec>,
}

impl ParameterSchema {
    pub fn new(params: Vec<ParamSpec>) -> Self {
        Self { params }
    }

    /// Schema for tools that take no arguments.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// JSON-Schema-like descriptor advertised to the language model.
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.to_string(), p.to_json()))
            .collect();
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false
        })
    }

    /// Check raw arguments against this schema.
    ///
    /// Unknown fields are reported before per-field checks, then fields are
    /// checked in declaration order; the first violation is returned. `null`
    /// counts as absent, both for the whole argument object and for optional
    /// fields.
    pub fn validate(&self, raw: &Value) -> Result<ValidatedArguments, SchemaValidationError> {
        let empty = Map::new();
        let object = match raw {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(SchemaValidationError::new(
                    ARGUMENTS_FIELD,
                    Constraint::wrong_type("object", other),
                ))
            }
        };

        if let Some(unknown) = object.keys().find(|key| self.param(key).is_none()) {
            return Err(SchemaValidationError::new(unknown, Constraint::UnknownField));
        }

        let mut values = BTreeMap::new();
        for param in &self.params {
            match object.get(param.name) {
                None | Some(Value::Null) => {
                    if param.required {
                        return Err(SchemaValidationError::new(param.name, Constraint::Missing));
                    }
                }
                Some(value) => {
                    let checked = param
                        .check(value)
                        .map_err(|constraint| SchemaValidationError::new(param.name, constraint))?;
                    values.insert(param.name, checked);
                }
            }
        }

        Ok(ValidatedArguments { values })
    }
}

/// Pseudo field name used when the argument payload itself is malformed.
pub const ARGUMENTS_FIELD: &str = "$arguments";

/// A single validated argument value
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Text(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    Choice(String),
}

impl ArgValue {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(s) | Self::Choice(s) => Value::from(s.as_str()),
            Self::Integer(i) => Value::from(*i),
            Self::Number(n) => Value::from(*n),
            Self::Boolean(b) => Value::from(*b),
        }
    }
}

/// Arguments that passed schema validation.
///
/// Only `ParameterSchema::validate` constructs this type.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedArguments {
    values: BTreeMap<&'static str, ArgValue>,
}

impl ValidatedArguments {
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_json()))
                .collect(),
        )
    }

    fn require(&self, name: &str) -> Result<&ArgValue, SchemaValidationError> {
        self.values
            .get(name)
            .ok_or_else(|| SchemaValidationError::new(name, Constraint::Missing))
    }

    fn mismatch(name: &str, expected: &'static str, found: &ArgValue) -> SchemaValidationError {
        SchemaValidationError::new(
            name,
            Constraint::WrongType {
                expected,
                found: found.kind_name(),
            },
        )
    }

    pub fn text(&self, name: &str) -> Result<&str, SchemaValidationError> {
        match self.require(name)? {
            ArgValue::Text(s) => Ok(s),
            other => Err(Self::mismatch(name, "string", other)),
        }
    }

    pub fn integer(&self, name: &str) -> Result<i64, SchemaValidationError> {
        match self.require(name)? {
            ArgValue::Integer(i) => Ok(*i),
            other => Err(Self::mismatch(name, "integer", other)),
        }
    }

    pub fn number(&self, name: &str) -> Result<f64, SchemaValidationError> {
        match self.require(name)? {
            ArgValue::Number(n) => Ok(*n),
            ArgValue::Integer(i) => Ok(*i as f64),
            other => Err(Self::mismatch(name, "number", other)),
        }
    }

    pub fn boolean(&self, name: &str) -> Result<bool, SchemaValidationError> {
        match self.require(name)? {
            ArgValue::Boolean(b) => Ok(*b),
            other => Err(Self::mismatch(name, "boolean", other)),
        }
    }

    pub fn choice<T: ChoiceParam>(&self, name: &str) -> Result<T, SchemaValidationError> {
        match self.require(name)? {
            ArgValue::Choice(s) => T::from_choice(s).ok_or_else(|| {
                SchemaValidationError::new(
                    name,
                    Constraint::NotAllowed {
                        value: s.clone(),
                        allowed: T::VALUES.iter().map(|v| v.to_string()).collect(),
                    },
                )
            }),
            other => Err(Self::mismatch(name, "string", other)),
        }
    }
}

impl ArgValue {
    fn kind_name(&self) -> &'static str {
        match self {
            Self::Text(_) | Self::Choice(_) => "string",
            Self::Integer(_) => "integer",
            Self::Number(_) => "number",
            Self::Boolean(_) => "boolean",
        }
    }
}

/// A closed set of string values accepted by an enum parameter
pub trait ChoiceParam: Sized {
    const VALUES: &'static [&'static str];

    fn from_choice(value: &str) -> Option<Self>;

    fn as_choice(&self) -> &'static str;
}

/// The rule a rejected argument broke
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    UnknownField,
    Missing,
    WrongType {
        expected: &'static str,
        found: &'static str,
    },
    NotAnInteger,
    OutOfRange {
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
    },
    NotAllowed {
        value: String,
        allowed: Vec<String>,
    },
}

impl Constraint {
    fn wrong_type(expected: &'static str, value: &Value) -> Self {
        Self::WrongType {
            expected,
            found: json_type_name(value),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownField => write!(f, "is not a recognised parameter"),
            Self::Missing => write!(f, "is required but was not provided"),
            Self::WrongType { expected, found } => {
                write!(f, "must be {} {}, got {}", article(expected), expected, found)
            }
            Self::NotAnInteger => write!(f, "must be a whole number"),
            Self::OutOfRange { value, min, max } => match (min, max) {
                (Some(min), Some(max)) => {
                    write!(f, "must be between {} and {}, got {}", min, max, value)
                }
                (Some(min), None) => write!(f, "must be at least {}, got {}", min, value),
                (None, Some(max)) => write!(f, "must be at most {}, got {}", max, value),
                (None, None) => write!(f, "is out of range, got {}", value),
            },
            Self::NotAllowed { value, allowed } => write!(
                f,
                "must be one of {}, got \"{}\"",
                allowed
                    .iter()
                    .map(|a| format!("\"{}\"", a))
                    .collect::<Vec<_>>()
                    .join(", "),
                value
            ),
        }
    }
}

fn article(word: &str) -> &'static str {
    if word.starts_with(|c: char| "aeiou".contains(c)) {
        "an"
    } else {
        "a"
    }
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

/// Arguments were rejected before any handler ran
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("argument `{field}` {constraint}")]
pub struct SchemaValidationError {
    pub field: String,
    pub constraint: Constraint,
}

impl SchemaValidationError {
    pub fn new(field: impl Into<String>, constraint: Constraint) -> Self {
        Self {
            field: field.into(),
            constraint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn led_schema() -> ParameterSchema {
        ParameterSchema::new(vec![
            ParamSpec::integer("colorR", "red").between(0, 255),
            ParamSpec::integer("colorG", "green").between(0, 255),
            ParamSpec::integer("colorB", "blue").between(0, 255),
        ])
    }

    fn light_schema() -> ParameterSchema {
        ParameterSchema::new(vec![
            ParamSpec::one_of(
                "room",
                "room",
                &["bedroom", "living room", "kitchen", "bathroom", "office"],
            ),
            ParamSpec::one_of("switchTo", "state", &["on", "off"]),
        ])
    }

    #[test]
    fn test_valid_arguments_keep_their_values() {
        let raw = json!({"colorR": 255, "colorG": 128, "colorB": 0});
        let args = led_schema().validate(&raw).unwrap();

        assert_eq!(args.len(), 3);
        assert_eq!(args.integer("colorR").unwrap(), 255);
        assert_eq!(args.integer("colorG").unwrap(), 128);
        assert_eq!(args.integer("colorB").unwrap(), 0);
        assert_eq!(args.to_json(), raw);
    }

    #[test]
    fn test_enum_arguments_keep_their_values() {
        let raw = json!({"room": "living room", "switchTo": "off"});
        let args = light_schema().validate(&raw).unwrap();
        assert_eq!(args.to_json(), raw);
        assert_eq!(args.get("room"), Some(&ArgValue::Choice("living room".into())));
    }

    #[test]
    fn test_out_of_range_channel_is_rejected() {
        let err = led_schema()
            .validate(&json!({"colorR": 300, "colorG": 0, "colorB": 0}))
            .unwrap_err();

        assert_eq!(err.field, "colorR");
        assert!(matches!(err.constraint, Constraint::OutOfRange { .. }));
        assert_eq!(
            err.to_string(),
            "argument `colorR` must be between 0 and 255, got 300"
        );
    }

    #[test]
    fn test_negative_channel_is_rejected() {
        let err = led_schema()
            .validate(&json!({"colorR": 0, "colorG": -1, "colorB": 0}))
            .unwrap_err();
        assert_eq!(err.field, "colorG");
    }

    #[test]
    fn test_missing_required_field_names_the_field() {
        let err = led_schema()
            .validate(&json!({"colorR": 1, "colorB": 2}))
            .unwrap_err();

        assert_eq!(err.field, "colorG");
        assert_eq!(err.constraint, Constraint::Missing);
        assert!(err.to_string().contains("colorG"));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let err = led_schema()
            .validate(&json!({"colorR": 1, "colorG": 2, "colorB": 3, "brightness": 9}))
            .unwrap_err();

        assert_eq!(err.field, "brightness");
        assert_eq!(err.constraint, Constraint::UnknownField);
    }

    #[test]
    fn test_fractional_integer_is_rejected() {
        let err = led_schema()
            .validate(&json!({"colorR": 1.5, "colorG": 2, "colorB": 3}))
            .unwrap_err();
        assert_eq!(err.constraint, Constraint::NotAnInteger);
    }

    #[test]
    fn test_whole_float_is_accepted_as_integer() {
        let args = led_schema()
            .validate(&json!({"colorR": 255.0, "colorG": 0, "colorB": 0}))
            .unwrap();
        assert_eq!(args.integer("colorR").unwrap(), 255);
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let err = led_schema()
            .validate(&json!({"colorR": "255", "colorG": 0, "colorB": 0}))
            .unwrap_err();

        assert_eq!(
            err.constraint,
            Constraint::WrongType {
                expected: "integer",
                found: "string"
            }
        );
        assert_eq!(err.to_string(), "argument `colorR` must be an integer, got string");
    }

    #[test]
    fn test_enum_membership_is_enforced() {
        let err = light_schema()
            .validate(&json!({"room": "garage", "switchTo": "on"}))
            .unwrap_err();

        assert_eq!(err.field, "room");
        match err.constraint {
            Constraint::NotAllowed { value, allowed } => {
                assert_eq!(value, "garage");
                assert_eq!(allowed.len(), 5);
            }
            other => panic!("unexpected constraint: {:?}", other),
        }
    }

    #[test]
    fn test_non_object_arguments_are_rejected() {
        let err = light_schema().validate(&json!(["kitchen", "on"])).unwrap_err();
        assert_eq!(err.field, ARGUMENTS_FIELD);
    }

    #[test]
    fn test_null_arguments_match_empty_schema() {
        let args = ParameterSchema::empty().validate(&Value::Null).unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn test_optional_field_may_be_absent_or_null() {
        let schema = ParameterSchema::new(vec![
            ParamSpec::string("location", "where"),
            ParamSpec::number("radius", "km").between(0, 100).optional(),
        ]);

        let args = schema.validate(&json!({"location": "Paris"})).unwrap();
        assert!(args.get("radius").is_none());

        let args = schema
            .validate(&json!({"location": "Paris", "radius": null}))
            .unwrap();
        assert!(args.get("radius").is_none());

        let args = schema
            .validate(&json!({"location": "Paris", "radius": 2.5}))
            .unwrap();
        assert_eq!(args.number("radius").unwrap(), 2.5);
    }

    #[test]
    fn test_boolean_parameter() {
        let schema = ParameterSchema::new(vec![ParamSpec::boolean("state", "on or off")]);
        let args = schema.validate(&json!({"state": true})).unwrap();
        assert!(args.boolean("state").unwrap());

        let err = schema.validate(&json!({"state": "on"})).unwrap_err();
        assert!(matches!(err.constraint, Constraint::WrongType { .. }));
    }

    #[test]
    fn test_accessor_type_mismatch_is_reported() {
        let args = light_schema()
            .validate(&json!({"room": "kitchen", "switchTo": "on"}))
            .unwrap();
        let err = args.integer("room").unwrap_err();
        assert_eq!(err.field, "room");
    }

    #[test]
    fn test_json_schema_descriptor() {
        let schema = led_schema().to_json_schema();

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(schema["properties"]["colorR"]["type"], "integer");
        assert_eq!(schema["properties"]["colorR"]["minimum"], 0);
        assert_eq!(schema["properties"]["colorR"]["maximum"], 255);
        assert_eq!(schema["required"], json!(["colorR", "colorG", "colorB"]));

        let lights = light_schema().to_json_schema();
        assert_eq!(lights["properties"]["switchTo"]["enum"], json!(["on", "off"]));
        assert_eq!(lights["properties"]["switchTo"]["type"], "string");
    }
}
