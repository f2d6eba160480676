//! Tool descriptors: ordered parameter lists, JSON Schema rendering, and
//! argument binding.
//!
//! ```rust
//! use serde_json::json;
//! use mdtooling::{ParameterKind, ReturnShape, ToolDescriptor, ToolParameter};
//!
//! let descriptor = ToolDescriptor::new("web_search", "Search the web", ReturnShape::Mapping)
//!     .with_parameter(ToolParameter::required("query", ParameterKind::String))
//!     .with_parameter(ToolParameter::optional("max_results", ParameterKind::Integer, json!(2)));
//!
//! let bound = descriptor
//!     .bind_arguments(json!({"query": "rust"}).as_object().cloned().unwrap_or_default())
//!     .expect("arguments should bind");
//! assert_eq!(bound["max_results"], json!(2));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use mdprovider::ToolDefinition;

use crate::ToolError;

/// Key of the schema annotation that carries the ordered parameter list and
/// return shape to clients.
pub const DESCRIPTOR_ANNOTATION: &str = "x-marketdesk";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    String,
    Integer,
    Number,
    Boolean,
}

impl ParameterKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }

    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnShape {
    Text,
    Mapping,
    Sequence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub kind: ParameterKind,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl ToolParameter {
    pub fn required(name: impl Into<String>, kind: ParameterKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            default: None,
            description: String::new(),
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParameterKind, default: Value) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: Some(default),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    fn property_schema(&self) -> Value {
        let mut property = Map::new();
        property.insert("type".to_string(), json!(self.kind.as_str()));
        if !self.description.is_empty() {
            property.insert("description".to_string(), json!(self.description));
        }
        if let Some(default) = &self.default {
            property.insert("default".to_string(), default.clone());
        }
        Value::Object(property)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
    pub returns: ReturnShape,
}

#[derive(Debug, Serialize, Deserialize)]
struct DescriptorAnnotation {
    parameters: Vec<ToolParameter>,
    returns: ReturnShape,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        returns: ReturnShape,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            returns,
        }
    }

    pub fn with_parameter(mut self, parameter: ToolParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&ToolParameter> {
        self.parameters.iter().find(|parameter| parameter.name == name)
    }

    /// Renders the argument object as a JSON Schema document.
    ///
    /// `required` lists parameter names in declaration order.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for parameter in &self.parameters {
            properties.insert(parameter.name.clone(), parameter.property_schema());
        }

        let required = self
            .parameters
            .iter()
            .filter(|parameter| parameter.required)
            .map(|parameter| json!(parameter.name))
            .collect::<Vec<_>>();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Model-facing definition with the schema rendered as a JSON string.
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema().to_string(),
        }
    }

    /// `tools/list` entry shape. The schema carries the descriptor annotation
    /// so [`ToolDescriptor::from_wire`] can rebuild kinds and return shape.
    pub fn to_wire(&self) -> Value {
        let mut schema = self.input_schema();
        let annotation = DescriptorAnnotation {
            parameters: self.parameters.clone(),
            returns: self.returns,
        };
        schema[DESCRIPTOR_ANNOTATION] = json!(annotation);

        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": schema,
        })
    }

    /// Rebuilds a descriptor from a `tools/list` entry.
    ///
    /// Entries without the descriptor annotation fall back to the schema's
    /// `properties` in key order, treating every field as a string and
    /// reading `required` and `default` where present.
    pub fn from_wire(entry: &Value) -> Result<Self, ToolError> {
        let name = entry
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::invalid_arguments("tool entry is missing 'name'"))?;
        let description = entry
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let schema = entry.get("inputSchema").cloned().unwrap_or_else(|| json!({}));

        if let Some(annotation) = schema.get(DESCRIPTOR_ANNOTATION) {
            let annotation = serde_json::from_value::<DescriptorAnnotation>(annotation.clone())
                .map_err(|err| {
                    ToolError::invalid_arguments(format!(
                        "tool '{name}' has a malformed descriptor annotation: {err}"
                    ))
                })?;

            return Ok(Self {
                name: name.to_string(),
                description: description.to_string(),
                parameters: annotation.parameters,
                returns: annotation.returns,
            });
        }

        let required = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect::<Vec<_>>())
            .unwrap_or_default();

        let parameters = schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|properties| {
                properties
                    .iter()
                    .map(|(key, property)| ToolParameter {
                        name: key.clone(),
                        kind: property
                            .get("type")
                            .cloned()
                            .and_then(|kind| serde_json::from_value(kind).ok())
                            .unwrap_or(ParameterKind::String),
                        required: required.contains(&key.as_str()),
                        default: property.get("default").cloned(),
                        description: property
                            .get("description")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
            returns: ReturnShape::Mapping,
        })
    }

    /// Validates an argument mapping and fills declared defaults.
    pub fn bind_arguments(&self, mut args: Map<String, Value>) -> Result<Map<String, Value>, ToolError> {
        if let Some(unknown) = args.keys().find(|key| self.parameter(key).is_none()) {
            return Err(ToolError::invalid_arguments(format!(
                "unknown argument '{unknown}'"
            ))
            .with_tool_name(&self.name));
        }

        for parameter in &self.parameters {
            match args.get(&parameter.name) {
                Some(Value::Null) | None => {
                    if let Some(default) = &parameter.default {
                        args.insert(parameter.name.clone(), default.clone());
                    } else if parameter.required {
                        return Err(ToolError::invalid_arguments(format!(
                            "missing required argument '{}'",
                            parameter.name
                        ))
                        .with_tool_name(&self.name));
                    } else {
                        args.remove(&parameter.name);
                    }
                }
                Some(value) if !parameter.kind.accepts(value) => {
                    return Err(ToolError::invalid_arguments(format!(
                        "argument '{}' must be of type {}",
                        parameter.name,
                        parameter.kind.as_str()
                    ))
                    .with_tool_name(&self.name));
                }
                Some(_) => {}
            }
        }

        Ok(args)
    }
}
