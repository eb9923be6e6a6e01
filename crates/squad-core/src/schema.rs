//! Tool Schema Inference
//!
//! Turns a [`ToolSchema`] into the function-calling descriptor sent to the
//! completion service. Declared parameters are the primary source; a sample
//! input object, when present, takes over and drives type inference.
//!
//! ```text
//! {"type": "function",
//!  "function": {"name": ..., "description": ...,
//!               "parameters": {"type": "object", "properties": {...}, "required": [...]}}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::tool::{ParameterSchema, ToolRegistry, ToolSchema};

/// Description used when a tool declares none
pub const MISSING_DESCRIPTION: &str = "No description provided.";

/// Parameter block of a function descriptor
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParametersSpec {
    #[serde(rename = "type")]
    pub kind: String,

    pub properties: Map<String, Value>,

    /// Required names, in discovery order
    pub required: Vec<String>,
}

impl Default for ParametersSpec {
    fn default() -> Self {
        Self {
            kind: "object".into(),
            properties: Map::new(),
            required: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: ParametersSpec,
}

/// Function-calling descriptor for one tool
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    #[serde(rename = "type")]
    pub kind: String,

    pub function: FunctionSpec,
}

impl FunctionDescriptor {
    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// Describe every tool in a registry, in registration order
pub fn function_descriptors(tools: &ToolRegistry) -> Vec<FunctionDescriptor> {
    tools.iter().map(|t| function_descriptor(&t.schema())).collect()
}

/// Build the descriptor for a single tool. Never fails: a missing description
/// gets a placeholder and a tool without parameters gets an empty object.
pub fn function_descriptor(schema: &ToolSchema) -> FunctionDescriptor {
    let description = if schema.description.trim().is_empty() {
        MISSING_DESCRIPTION.to_string()
    } else {
        schema.description.clone()
    };

    let parameters = schema
        .sample_input
        .as_ref()
        .map_or_else(|| from_declared(&schema.parameters), from_sample);

    FunctionDescriptor {
        kind: "function".into(),
        function: FunctionSpec {
            name: schema.name.clone(),
            description,
            parameters,
        },
    }
}

fn from_sample(sample: &Map<String, Value>) -> ParametersSpec {
    let mut spec = ParametersSpec::default();

    for (name, value) in sample {
        let mut property = describe_value(value);
        if let Value::Object(obj) = &mut property {
            obj.insert(
                "description".into(),
                Value::String(format!("Description for parameter: {name}.")),
            );
        }
        spec.properties.insert(name.clone(), property);

        if !value.is_null() {
            spec.required.push(name.clone());
        }
    }

    spec
}

fn from_declared(params: &[ParameterSchema]) -> ParametersSpec {
    let mut spec = ParametersSpec::default();

    for param in params {
        let description = if param.description.trim().is_empty() {
            format!("Description for parameter: {}.", param.name)
        } else {
            param.description.clone()
        };

        let mut property = Map::new();
        property.insert("type".into(), Value::String(param.param_type.clone()));
        property.insert("description".into(), Value::String(description));

        if param.param_type == "array" {
            let items = param.items.as_deref().unwrap_or("string");
            property.insert("items".into(), json!({ "type": items }));
        }
        if let Some(values) = &param.enum_values {
            property.insert("enum".into(), Value::Array(values.clone()));
        }
        if let Some(default) = &param.default {
            property.insert("default".into(), default.clone());
        }

        spec.properties.insert(param.name.clone(), Value::Object(property));
        if param.required {
            spec.required.push(param.name.clone());
        }
    }

    spec
}

/// JSON type name of a sample value
pub const fn primitive_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Describe a sample value. Arrays describe their elements from the first
/// one (empty arrays default to strings); objects describe their fields.
pub fn describe_value(value: &Value) -> Value {
    match value {
        Value::Array(items) => {
            let item_schema = items
                .first()
                .map_or_else(|| json!({ "type": "string" }), describe_value);
            json!({ "type": "array", "items": item_schema })
        }
        Value::Object(fields) if !fields.is_empty() => {
            let properties: Map<String, Value> = fields
                .iter()
                .map(|(k, v)| (k.clone(), describe_value(v)))
                .collect();
            json!({ "type": "object", "properties": properties })
        }
        other => json!({ "type": primitive_type(other) }),
    }
}
