//! Structured output schemas
//!
//! A `StructuredSchema` declares the fields a structured-output call
//! must return. The declared set doubles as the JSON schema sent to
//! the provider and as the validator applied to the response.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Field type in a structured output schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// A JSON string
    String,
    /// An array of JSON strings
    StringArray,
    /// A JSON number
    Number,
    /// A JSON boolean
    Boolean,
}

impl FieldKind {
    fn json_type(self) -> serde_json::Value {
        match self {
            Self::String => serde_json::json!({"type": "string"}),
            Self::StringArray => {
                serde_json::json!({"type": "array", "items": {"type": "string"}})
            }
            Self::Number => serde_json::json!({"type": "number"}),
            Self::Boolean => serde_json::json!({"type": "boolean"}),
        }
    }

    fn matches(self, value: &serde_json::Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::StringArray => value
                .as_array()
                .is_some_and(|arr| arr.iter().all(serde_json::Value::is_string)),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
        }
    }
}

/// One declared field in a structured output schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaField {
    /// Field name
    pub name: String,
    /// Expected JSON type
    pub kind: FieldKind,
    /// Whether the field must be present
    pub required: bool,
    /// Description shown to the model
    pub description: String,
    /// Allowed values, if the field is an enumeration
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<String>,
}

impl SchemaField {
    /// Create a required field
    #[must_use]
    pub fn required(name: impl Into<String>, kind: FieldKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            description: description.into(),
            allowed_values: Vec::new(),
        }
    }

    /// Create an optional field
    #[must_use]
    pub fn optional(name: impl Into<String>, kind: FieldKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            description: description.into(),
            allowed_values: Vec::new(),
        }
    }

    /// Restrict a string field to a fixed value set
    #[must_use]
    pub fn with_allowed_values(mut self, values: &[&str]) -> Self {
        self.allowed_values = values.iter().map(|s| (*s).to_string()).collect();
        self
    }
}

/// A statically declared structured output schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredSchema {
    /// Schema name (used as the function name on the wire)
    pub name: String,
    /// Description shown to the model
    pub description: String,
    /// Declared fields
    pub fields: Vec<SchemaField>,
}

impl StructuredSchema {
    /// Create a new schema
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field
    #[must_use]
    pub fn with_field(mut self, field: SchemaField) -> Self {
        self.fields.push(field);
        self
    }

    /// Render as a JSON schema object for the provider wire format
    #[must_use]
    pub fn to_json_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for field in &self.fields {
            let mut prop = field.kind.json_type();
            if let Some(obj) = prop.as_object_mut() {
                obj.insert(
                    "description".to_string(),
                    serde_json::Value::String(field.description.clone()),
                );
                if !field.allowed_values.is_empty() {
                    obj.insert(
                        "enum".to_string(),
                        serde_json::json!(field.allowed_values),
                    );
                }
            }
            properties.insert(field.name.clone(), prop);
            if field.required {
                required.push(serde_json::Value::String(field.name.clone()));
            }
        }

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Validate a response object against the declared field set.
    pub fn validate(&self, value: &serde_json::Value) -> Result<()> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::SchemaValidation("response is not a JSON object".to_string()))?;

        for field in &self.fields {
            match obj.get(&field.name) {
                Some(v) => {
                    if !field.kind.matches(v) {
                        return Err(Error::SchemaValidation(format!(
                            "field '{}' has wrong type",
                            field.name
                        )));
                    }
                    if !field.allowed_values.is_empty() {
                        let s = v.as_str().unwrap_or_default();
                        if !field.allowed_values.iter().any(|a| a == s) {
                            return Err(Error::SchemaValidation(format!(
                                "field '{}' value '{}' not in allowed set",
                                field.name, s
                            )));
                        }
                    }
                }
                None if field.required => {
                    return Err(Error::SchemaValidation(format!(
                        "missing required field '{}'",
                        field.name
                    )));
                }
                None => {}
            }
        }
        Ok(())
    }
}
