//! Tool descriptor types
//!
//! JSON Schema subset used to declare tool arguments to the model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ai::ToolSpec;

/// JSON Schema representation for tool parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: BTreeMap<String, PropertySchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl JsonSchema {
    pub fn object(properties: Vec<(&str, PropertySchema)>, required: &[&str]) -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: properties
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            required: required.iter().map(|r| r.to_string()).collect(),
        }
    }
}

/// Schema for individual properties in a JSON Schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub prop_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<PropertySchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
}

impl PropertySchema {
    fn typed(prop_type: &str, description: &str) -> Self {
        Self {
            prop_type: prop_type.to_string(),
            description: Some(description.to_string()),
            enum_values: None,
            items: None,
            minimum: None,
            maximum: None,
        }
    }

    pub fn string(description: &str) -> Self {
        Self::typed("string", description)
    }

    pub fn one_of(description: &str, values: &[&str]) -> Self {
        Self {
            enum_values: Some(values.iter().map(|v| v.to_string()).collect()),
            ..Self::typed("string", description)
        }
    }

    pub fn number_between(description: &str, min: f64, max: f64) -> Self {
        Self {
            minimum: Some(min),
            maximum: Some(max),
            ..Self::typed("number", description)
        }
    }

    pub fn string_list(description: &str) -> Self {
        Self {
            items: Some(Box::new(Self {
                description: None,
                ..Self::typed("string", "")
            })),
            ..Self::typed("array", description)
        }
    }
}

/// Tool descriptor for capability discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool name (e.g. "qualify_lead")
    pub name: String,
    /// Description shown to the model
    pub description: String,
    /// JSON Schema for input parameters
    pub input_schema: JsonSchema,
}

impl ToolDescriptor {
    /// Provider-facing declaration
    pub fn to_spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: serde_json::to_value(&self.input_schema)
                .unwrap_or_else(|_| serde_json::json!({"type": "object"})),
        }
    }
}
