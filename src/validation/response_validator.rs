use std::time::Instant;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::manifest::{ArgumentManifest, Manifest, ModelManifest, ResponseManifest};

/// One constraint violation found while validating a response (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub expected: String,
    pub actual: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "validation error for field '{}': {} (expected: {}, actual: {})", self.field, self.message, self.expected, self.actual)
    }
}

impl std::error::Error for ValidationError {}

/// Outcome of validating one response against a [`ResponseManifest`]. Unlike
/// [`crate::validation::ArgumentValidator`], this accumulates every
/// violation rather than stopping at the first (§4.5).
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub elapsed_ms: f64,
    pub fields_validated: usize,
}

impl ValidationResult {
    pub fn success(fields_validated: usize, elapsed_ms: f64) -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            elapsed_ms,
            fields_validated,
        }
    }
}

#[derive(Clone)]
enum ManifestType {
    Response(ResponseManifest),
    Argument(ArgumentManifest),
    Model(ModelManifest),
}

impl ManifestType {
    fn type_str(&self) -> &str {
        match self {
            ManifestType::Response(m) => &m.r#type,
            ManifestType::Argument(m) => &m.r#type,
            ManifestType::Model(m) => &m.r#type,
        }
    }

    fn enum_values(&self) -> Option<&[Value]> {
        match self {
            ManifestType::Argument(m) => m.validation.as_ref()?.r#enum.as_deref(),
            _ => None,
        }
    }
}

/// Validates handler responses against the `ResponseManifest` declared in a
/// [`Manifest`], walking `modelRef` chains and accumulating every violation.
///
/// Grounded on `manifest/response_validator.rs`.
pub struct ResponseValidator {
    manifest: Manifest,
}

impl ResponseValidator {
    pub fn new(manifest: Manifest) -> Self {
        Self { manifest }
    }

    pub fn validate_response(&self, response: &Value, response_manifest: &ResponseManifest) -> ValidationResult {
        let start = Instant::now();
        let mut errors = Vec::new();
        let manifest_type = ManifestType::Response(response_manifest.clone());
        self.validate_value(response, &manifest_type, "", &mut errors);
        let fields_validated = self.count_validated_fields(&manifest_type);
        ValidationResult {
            valid: errors.is_empty(),
            errors,
            elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
            fields_validated,
        }
    }

    /// Looks the request up by name and validates its response shape,
    /// failing closed when the request or its response manifest is missing.
    pub fn validate_request_response(&self, response: &Value, request_name: &str) -> ValidationResult {
        let start = Instant::now();
        match self.manifest.get_request(request_name) {
            Some(request) => {
                let mut result = self.validate_response(response, &request.response);
                result.elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
                result
            }
            None => ValidationResult {
                valid: false,
                errors: vec![ValidationError {
                    field: "request".to_string(),
                    message: format!("no manifest entry found for request '{request_name}'"),
                    expected: "a registered request".to_string(),
                    actual: Value::String(request_name.to_string()),
                    context: None,
                }],
                elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
                fields_validated: 0,
            },
        }
    }

    fn validate_value(&self, value: &Value, manifest: &ManifestType, field_path: &str, errors: &mut Vec<ValidationError>) {
        match manifest {
            ManifestType::Response(m) => {
                if let Some(model_ref) = &m.model_ref {
                    return self.validate_model_ref(value, model_ref, field_path, errors);
                }
            }
            ManifestType::Argument(m) => {
                if let Some(model_ref) = &m.model_ref {
                    return self.validate_model_ref(value, model_ref, field_path, errors);
                }
            }
            ManifestType::Model(_) => {}
        }

        let before = errors.len();
        self.validate_type(value, manifest.type_str(), field_path, errors);
        if errors.len() > before {
            return;
        }

        match manifest.type_str() {
            "string" => {
                if let Value::String(s) = value {
                    self.validate_string(s, manifest, field_path, errors);
                }
            }
            "number" | "integer" => {
                if let Value::Number(n) = value {
                    if let Some(v) = n.as_f64() {
                        self.validate_number(v, manifest, field_path, errors);
                    }
                }
            }
            "array" => {
                if let Value::Array(items) = value {
                    for (index, item) in items.iter().enumerate() {
                        self.validate_value(item, manifest, &format!("{field_path}[{index}]"), errors);
                    }
                }
            }
            "object" => {
                if let Value::Object(obj) = value {
                    self.validate_object(obj, manifest, field_path, errors);
                }
            }
            _ => {}
        }

        if let Some(enum_values) = manifest.enum_values() {
            self.validate_enum(value, enum_values, field_path, errors);
        }
    }

    fn validate_model_ref(&self, value: &Value, model_ref: &str, field_path: &str, errors: &mut Vec<ValidationError>) {
        match self.manifest.get_model(model_ref) {
            Some(model) => self.validate_value(value, &ManifestType::Model(model.clone()), field_path, errors),
            None => errors.push(ValidationError {
                field: field_path.to_string(),
                message: format!("model reference '{model_ref}' not found"),
                expected: "a registered model".to_string(),
                actual: Value::String(model_ref.to_string()),
                context: None,
            }),
        }
    }

    fn validate_type(&self, value: &Value, expected_type: &str, field_path: &str, errors: &mut Vec<ValidationError>) {
        let actual_type = actual_type_of(value);
        if expected_type == "integer" {
            if actual_type != "number" || !is_integer(value) {
                errors.push(ValidationError {
                    field: field_path.to_string(),
                    message: "value is not an integer".to_string(),
                    expected: "integer".to_string(),
                    actual: Value::String(actual_type.to_string()),
                    context: None,
                });
            }
        } else if actual_type != expected_type {
            errors.push(ValidationError {
                field: field_path.to_string(),
                message: "type mismatch".to_string(),
                expected: expected_type.to_string(),
                actual: Value::String(actual_type.to_string()),
                context: None,
            });
        }
    }

    fn validate_string(&self, value: &str, manifest: &ManifestType, field_path: &str, errors: &mut Vec<ValidationError>) {
        let ManifestType::Argument(arg) = manifest else { return };
        let Some(validation) = &arg.validation else { return };

        if let Some(min_length) = validation.min_length {
            if value.len() < min_length {
                errors.push(ValidationError {
                    field: field_path.to_string(),
                    message: format!("string too short ({} < {min_length})", value.len()),
                    expected: format!("minimum length {min_length}"),
                    actual: Value::String(value.to_string()),
                    context: None,
                });
            }
        }
        if let Some(max_length) = validation.max_length {
            if value.len() > max_length {
                errors.push(ValidationError {
                    field: field_path.to_string(),
                    message: format!("string too long ({} > {max_length})", value.len()),
                    expected: format!("maximum length {max_length}"),
                    actual: Value::String(value.to_string()),
                    context: None,
                });
            }
        }
        if let Some(pattern) = &validation.pattern {
            match Regex::new(pattern) {
                Ok(re) if !re.is_match(value) => errors.push(ValidationError {
                    field: field_path.to_string(),
                    message: "string does not match required pattern".to_string(),
                    expected: format!("pattern {pattern}"),
                    actual: Value::String(value.to_string()),
                    context: None,
                }),
                Ok(_) => {}
                Err(_) => errors.push(ValidationError {
                    field: field_path.to_string(),
                    message: "invalid regex pattern in manifest".to_string(),
                    expected: "a valid regex pattern".to_string(),
                    actual: Value::String(pattern.clone()),
                    context: None,
                }),
            }
        }
    }

    fn validate_number(&self, value: f64, manifest: &ManifestType, field_path: &str, errors: &mut Vec<ValidationError>) {
        let ManifestType::Argument(arg) = manifest else { return };
        let Some(validation) = &arg.validation else { return };

        if let Some(minimum) = validation.minimum {
            if value < minimum {
                errors.push(ValidationError {
                    field: field_path.to_string(),
                    message: format!("number too small ({value} < {minimum})"),
                    expected: format!("minimum {minimum}"),
                    actual: serde_json::json!(value),
                    context: None,
                });
            }
        }
        if let Some(maximum) = validation.maximum {
            if value > maximum {
                errors.push(ValidationError {
                    field: field_path.to_string(),
                    message: format!("number too large ({value} > {maximum})"),
                    expected: format!("maximum {maximum}"),
                    actual: serde_json::json!(value),
                    context: None,
                });
            }
        }
    }

    fn validate_object(&self, value: &serde_json::Map<String, Value>, manifest: &ManifestType, field_path: &str, errors: &mut Vec<ValidationError>) {
        let properties = match manifest {
            ManifestType::Response(m) => m.properties.as_ref(),
            ManifestType::Model(m) => Some(&m.properties),
            ManifestType::Argument(_) => return,
        };
        let Some(properties) = properties else { return };

        for (prop_name, prop_manifest) in properties {
            let prop_path = if field_path.is_empty() { prop_name.clone() } else { format!("{field_path}.{prop_name}") };
            let prop_value = value.get(prop_name);
            let is_required = prop_manifest.is_required();

            if is_required && (prop_value.is_none() || prop_value == Some(&Value::Null)) {
                errors.push(ValidationError {
                    field: prop_path,
                    message: "required field is missing or null".to_string(),
                    expected: format!("non-null {}", prop_manifest.r#type),
                    actual: prop_value.cloned().unwrap_or(Value::Null),
                    context: None,
                });
                continue;
            }

            if let Some(prop_value) = prop_value {
                self.validate_value(prop_value, &ManifestType::Argument(prop_manifest.clone()), &prop_path, errors);
            }
        }
    }

    fn validate_enum(&self, value: &Value, enum_values: &[Value], field_path: &str, errors: &mut Vec<ValidationError>) {
        if !enum_values.contains(value) {
            errors.push(ValidationError {
                field: field_path.to_string(),
                message: "value is not in the allowed enum list".to_string(),
                expected: enum_values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", "),
                actual: value.clone(),
                context: None,
            });
        }
    }

    fn count_validated_fields(&self, manifest: &ManifestType) -> usize {
        if manifest.type_str() != "object" {
            return 1;
        }
        match manifest {
            ManifestType::Response(m) => m.properties.as_ref().map_or(1, |p| p.len()),
            ManifestType::Model(m) => m.properties.len(),
            ManifestType::Argument(_) => 1,
        }
    }
}

fn actual_type_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_i64().is_some() || n.as_f64().map_or(false, |f| f.fract() == 0.0),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ArgumentManifest, RequestManifest, ValidationManifest};
    use std::collections::HashMap;

    fn manifest_with_user_request() -> Manifest {
        let mut manifest = Manifest::new("1.0.0");
        let mut properties = HashMap::new();
        properties.insert("name".to_string(), ArgumentManifest::new("string").required().with_validation(ValidationManifest::new().with_length_range(Some(1), Some(50))));
        properties.insert("age".to_string(), ArgumentManifest::new("integer").optional().with_validation(ValidationManifest::new().with_numeric_range(Some(0.0), Some(150.0))));
        let response = ResponseManifest::new("object").with_properties(properties);
        manifest.add_request("get_user", RequestManifest::new("fetch a user", response));
        manifest
    }

    #[test]
    fn accepts_well_formed_response() {
        let validator = ResponseValidator::new(manifest_with_user_request());
        let result = validator.validate_request_response(&serde_json::json!({"name": "Ada", "age": 30}), "get_user");
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn accumulates_every_violation_rather_than_stopping_at_first() {
        let validator = ResponseValidator::new(manifest_with_user_request());
        let result = validator.validate_request_response(&serde_json::json!({"name": "", "age": 999}), "get_user");
        assert!(!result.valid);
        assert!(result.errors.len() >= 2, "expected both name and age violations, got {:?}", result.errors);
    }

    #[test]
    fn reports_missing_required_field() {
        let validator = ResponseValidator::new(manifest_with_user_request());
        let result = validator.validate_request_response(&serde_json::json!({"age": 30}), "get_user");
        assert!(!result.valid);
        assert_eq!(result.errors[0].field, "name");
    }

    #[test]
    fn unknown_request_fails_closed() {
        let validator = ResponseValidator::new(Manifest::new("1.0.0"));
        let result = validator.validate_request_response(&serde_json::json!({}), "missing");
        assert!(!result.valid);
    }

    #[test]
    fn resolves_model_ref_before_validating() {
        let mut manifest = Manifest::new("1.0.0");
        let mut user = crate::manifest::ModelManifest::new().with_required(vec!["name".to_string()]);
        user.add_property("name", ArgumentManifest::new("string").required());
        manifest.add_model("User", user);
        let response = ResponseManifest::new("object").with_model_ref("User");
        manifest.add_request("get_user", RequestManifest::new("fetch a user", response));

        let validator = ResponseValidator::new(manifest);
        let ok = validator.validate_request_response(&serde_json::json!({"name": "Ada"}), "get_user");
        assert!(ok.valid);
        let bad = validator.validate_request_response(&serde_json::json!({}), "get_user");
        assert!(!bad.valid);
    }
}
