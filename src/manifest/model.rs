use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Declarative description of a Janus API: every request a server answers,
/// the shape of its arguments and response, and any shared models those
/// shapes reference.
///
/// Grounded on `manifest/model_registry.rs`'s `Manifest`, generalized with a
/// `requests` map now that requests are no longer scoped under a channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    pub version: String,
    #[serde(default)]
    pub requests: HashMap<String, RequestManifest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<HashMap<String, ModelManifest>>,
}

impl Manifest {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            requests: HashMap::new(),
            models: None,
        }
    }

    pub fn add_request(&mut self, name: impl Into<String>, request: RequestManifest) {
        self.requests.insert(name.into(), request);
    }

    pub fn add_model(&mut self, name: impl Into<String>, model: ModelManifest) {
        self.models.get_or_insert_with(HashMap::new).insert(name.into(), model);
    }

    pub fn get_model(&self, name: &str) -> Option<&ModelManifest> {
        self.models.as_ref()?.get(name)
    }

    pub fn has_request(&self, request_name: &str) -> bool {
        self.requests.contains_key(request_name)
    }

    pub fn get_request(&self, request_name: &str) -> Option<&RequestManifest> {
        self.requests.get(request_name)
    }

    /// Follows a `modelRef` through [`Self::models`], erroring on a dangling
    /// reference. Recursion depth is the caller's responsibility (§4.3,
    /// cap of 32 enforced by the validators that walk these chains).
    pub fn resolve_model_ref<'a>(&'a self, model_ref: &str) -> Option<&'a ModelManifest> {
        self.get_model(model_ref)
    }
}

/// One request a server answers: its argument shape, response shape, and
/// any request-specific error codes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestManifest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub description: String,
    #[serde(default)]
    pub args: HashMap<String, ArgumentManifest>,
    pub response: ResponseManifest,
    pub error_codes: Option<HashMap<String, ErrorCodeManifest>>,
}

impl RequestManifest {
    pub fn new(description: impl Into<String>, response: ResponseManifest) -> Self {
        Self {
            name: None,
            description: description.into(),
            args: HashMap::new(),
            response,
            error_codes: None,
        }
    }

    pub fn add_argument(&mut self, name: impl Into<String>, arg: ArgumentManifest) {
        self.args.insert(name.into(), arg);
    }

    pub fn add_error_code(&mut self, name: impl Into<String>, error: ErrorCodeManifest) {
        self.error_codes.get_or_insert_with(HashMap::new).insert(name.into(), error);
    }

    pub fn get_argument(&self, name: &str) -> Option<&ArgumentManifest> {
        self.args.get(name)
    }

    pub fn required_arguments(&self) -> Vec<&String> {
        self.args.iter().filter(|(_, a)| a.is_required()).map(|(name, _)| name).collect()
    }

    pub fn optional_arguments(&self) -> Vec<&String> {
        self.args.iter().filter(|(_, a)| !a.is_required()).map(|(name, _)| name).collect()
    }
}

/// One argument (or, nested via `properties`/`model_ref`, one object field).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArgumentManifest {
    pub r#type: String,
    pub required: Option<bool>,
    pub description: Option<String>,
    pub default_value: Option<serde_json::Value>,
    pub validation: Option<ValidationManifest>,
    #[serde(rename = "modelRef")]
    pub model_ref: Option<String>,
}

impl ArgumentManifest {
    pub fn new(arg_type: impl Into<String>) -> Self {
        Self {
            r#type: arg_type.into(),
            required: None,
            description: None,
            default_value: None,
            validation: None,
            model_ref: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = Some(true);
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = Some(false);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_validation(mut self, validation: ValidationManifest) -> Self {
        self.validation = Some(validation);
        self
    }

    pub fn with_model_ref(mut self, model_ref: impl Into<String>) -> Self {
        self.model_ref = Some(model_ref.into());
        self
    }

    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(false)
    }

    pub fn has_default(&self) -> bool {
        self.default_value.is_some()
    }
}

/// Validation constraints layered on top of an [`ArgumentManifest`]'s bare
/// type (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ValidationManifest {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub r#enum: Option<Vec<serde_json::Value>>,
}

impl ValidationManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_length_range(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }

    pub fn with_numeric_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.minimum = min;
        self.maximum = max;
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_enum(mut self, values: Vec<serde_json::Value>) -> Self {
        self.r#enum = Some(values);
        self
    }
}

/// Shape of a request's successful result (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseManifest {
    pub r#type: String,
    pub properties: Option<HashMap<String, ArgumentManifest>>,
    #[serde(rename = "modelRef")]
    pub model_ref: Option<String>,
}

impl ResponseManifest {
    pub fn new(response_type: impl Into<String>) -> Self {
        Self {
            r#type: response_type.into(),
            properties: None,
            model_ref: None,
        }
    }

    pub fn with_properties(mut self, properties: HashMap<String, ArgumentManifest>) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn add_property(&mut self, name: impl Into<String>, property: ArgumentManifest) {
        self.properties.get_or_insert_with(HashMap::new).insert(name.into(), property);
    }

    pub fn with_model_ref(mut self, model_ref: impl Into<String>) -> Self {
        self.model_ref = Some(model_ref.into());
        self
    }
}

/// Documents one application-specific error code a request may return in
/// `Response.error.data`, distinct from the closed wire-level enum (§7).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorCodeManifest {
    pub code: u16,
    pub message: String,
    pub description: Option<String>,
}

impl ErrorCodeManifest {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A reusable object shape referenced by `modelRef` from any argument or
/// response (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelManifest {
    pub r#type: String,
    pub properties: HashMap<String, ArgumentManifest>,
    pub required: Option<Vec<String>>,
}

impl ModelManifest {
    pub fn new() -> Self {
        Self {
            r#type: "object".to_string(),
            properties: HashMap::new(),
            required: None,
        }
    }

    pub fn add_property(&mut self, name: impl Into<String>, property: ArgumentManifest) {
        self.properties.insert(name.into(), property);
    }

    pub fn with_required(mut self, required: Vec<String>) -> Self {
        self.required = Some(required);
        self
    }

    pub fn add_required(&mut self, property_name: impl Into<String>) {
        self.required.get_or_insert_with(Vec::new).push(property_name.into());
    }

    pub fn is_property_required(&self, property_name: &str) -> bool {
        self.required.as_ref().map(|req| req.iter().any(|r| r == property_name)).unwrap_or(false)
    }

    pub fn required_properties(&self) -> Vec<&String> {
        self.required.as_ref().map(|req| req.iter().collect()).unwrap_or_default()
    }
}

impl Default for ModelManifest {
    fn default() -> Self {
        Self::new()
    }
}
