use regex::Regex;
use serde_json::Value;

use crate::error::{JanusError, JanusErrorCode, JsonRpcErrorData, Result};
use crate::manifest::{ArgumentManifest, Manifest, ModelManifest};

/// Validates inbound request arguments against a [`Manifest`].
///
/// Unlike [`crate::validation::ResponseValidator`], which accumulates every
/// violation for diagnostics, this stops at the first violation: a request
/// with a bad argument is rejected outright, so there is nothing to gain
/// from describing the second problem (§4.5). Reports a field path such as
/// `a.b[3].c` pointing at the exact value that failed.
///
/// Grounded on the traversal shape of `manifest/response_validator.rs`,
/// adapted to first-violation, wire-error-returning semantics.
pub struct ArgumentValidator {
    manifest: Manifest,
}

impl ArgumentValidator {
    pub fn new(manifest: Manifest) -> Self {
        Self { manifest }
    }

    /// Validates every declared argument of `request_name` against `args`,
    /// returning the first violation encountered.
    pub fn validate_arguments(&self, request_name: &str, args: &std::collections::HashMap<String, Value>) -> Result<()> {
        let request = self
            .manifest
            .get_request(request_name)
            .ok_or_else(|| JanusError::new(JanusErrorCode::MethodNotFound, format!("unknown request '{request_name}'")))?;

        for (name, arg_manifest) in &request.args {
            let value = args.get(name);
            let field_path = name.clone();

            if arg_manifest.is_required() && (value.is_none() || value == Some(&Value::Null)) {
                return Err(self.violation(&field_path, "required argument is missing or null", &arg_manifest.r#type, value.cloned().unwrap_or(Value::Null)));
            }

            if let Some(value) = value {
                self.validate_value(value, arg_manifest, &field_path)?;
            }
        }

        Ok(())
    }

    fn validate_value(&self, value: &Value, arg: &ArgumentManifest, field_path: &str) -> Result<()> {
        if let Some(model_ref) = &arg.model_ref {
            let model = self
                .manifest
                .get_model(model_ref)
                .ok_or_else(|| self.violation(field_path, &format!("model reference '{model_ref}' not found"), model_ref, Value::Null))?;
            return self.validate_object_against_model(value, model, field_path);
        }

        self.validate_type(value, &arg.r#type, field_path)?;

        match arg.r#type.as_str() {
            "string" => {
                if let Value::String(s) = value {
                    self.validate_string(s, arg, field_path)?;
                }
            }
            "number" | "integer" => {
                if let Value::Number(n) = value {
                    if let Some(v) = n.as_f64() {
                        self.validate_number(v, arg, field_path)?;
                    }
                }
            }
            "array" => {
                // Item schemas aren't expressible in `ArgumentManifest` yet
                // (§4.3 Open Question); only nested arrays recurse, matching
                // the depth the manifest itself can describe.
                if let Value::Array(items) = value {
                    for (index, item) in items.iter().enumerate() {
                        if let Value::Array(_) = item {
                            self.validate_value(item, arg, &format!("{field_path}[{index}]"))?;
                        }
                    }
                }
            }
            _ => {}
        }

        if let Some(enum_values) = arg.validation.as_ref().and_then(|v| v.r#enum.as_deref()) {
            if !enum_values.contains(value) {
                return Err(self.violation(field_path, "value is not in the allowed enum list", &arg.r#type, value.clone()));
            }
        }

        Ok(())
    }

    fn validate_object_against_model(&self, value: &Value, model: &ModelManifest, field_path: &str) -> Result<()> {
        let Value::Object(obj) = value else {
            return Err(self.violation(field_path, "expected an object", &model.r#type, value.clone()));
        };

        for (prop_name, prop_manifest) in &model.properties {
            let prop_path = format!("{field_path}.{prop_name}");
            let prop_value = obj.get(prop_name);
            let required = model.is_property_required(prop_name) || prop_manifest.is_required();

            if required && (prop_value.is_none() || prop_value == Some(&Value::Null)) {
                return Err(self.violation(&prop_path, "required property is missing or null", &prop_manifest.r#type, prop_value.cloned().unwrap_or(Value::Null)));
            }

            if let Some(prop_value) = prop_value {
                self.validate_value(prop_value, prop_manifest, &prop_path)?;
            }
        }
        Ok(())
    }

    fn validate_type(&self, value: &Value, expected: &str, field_path: &str) -> Result<()> {
        let actual = actual_type_of(value);
        let matches = match expected {
            "integer" => actual == "number" && matches!(value, Value::Number(n) if n.as_i64().is_some() || n.as_f64().map_or(false, |f| f.fract() == 0.0)),
            other => actual == other,
        };
        if !matches {
            return Err(self.violation(field_path, "type mismatch", expected, value.clone()));
        }
        Ok(())
    }

    fn validate_string(&self, value: &str, arg: &ArgumentManifest, field_path: &str) -> Result<()> {
        let Some(validation) = &arg.validation else { return Ok(()) };

        if let Some(min_length) = validation.min_length {
            if value.len() < min_length {
                return Err(self.violation(field_path, &format!("string shorter than minimum length {min_length}"), "string", Value::String(value.to_string())));
            }
        }
        if let Some(max_length) = validation.max_length {
            if value.len() > max_length {
                return Err(self.violation(field_path, &format!("string longer than maximum length {max_length}"), "string", Value::String(value.to_string())));
            }
        }
        if let Some(pattern) = &validation.pattern {
            let re = Regex::new(pattern)?;
            if !re.is_match(value) {
                return Err(self.violation(field_path, &format!("string does not match pattern {pattern}"), "string", Value::String(value.to_string())));
            }
        }
        Ok(())
    }

    fn validate_number(&self, value: f64, arg: &ArgumentManifest, field_path: &str) -> Result<()> {
        let Some(validation) = &arg.validation else { return Ok(()) };

        if let Some(minimum) = validation.minimum {
            if value < minimum {
                return Err(self.violation(field_path, &format!("number below minimum {minimum}"), "number", serde_json::json!(value)));
            }
        }
        if let Some(maximum) = validation.maximum {
            if value > maximum {
                return Err(self.violation(field_path, &format!("number above maximum {maximum}"), "number", serde_json::json!(value)));
            }
        }
        Ok(())
    }

    fn violation(&self, field_path: &str, details: &str, expected: &str, actual: Value) -> JanusError {
        JanusError::Protocol(crate::error::JsonRpcError {
            code: JanusErrorCode::ValidationFailed.code(),
            message: JanusErrorCode::ValidationFailed.message().to_string(),
            data: Some(
                JsonRpcErrorData::with_details(format!("{field_path}: {details}"))
                    .with_field(field_path, actual)
                    .with_constraints(std::collections::HashMap::from([("expected".to_string(), Value::String(expected.to_string()))])),
            ),
        })
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{RequestManifest, ResponseManifest, ValidationManifest};
    use std::collections::HashMap;

    fn manifest_with_create_user() -> Manifest {
        let mut manifest = Manifest::new("1.0.0");
        let response = ResponseManifest::new("object");
        let mut request = RequestManifest::new("creates a user", response);
        request.add_argument("name", ArgumentManifest::new("string").required().with_validation(ValidationManifest::new().with_length_range(Some(1), Some(50))));
        request.add_argument("age", ArgumentManifest::new("integer").optional().with_validation(ValidationManifest::new().with_numeric_range(Some(0.0), Some(150.0))));
        manifest.add_request("create_user", request);
        manifest
    }

    fn args(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn accepts_valid_arguments() {
        let validator = ArgumentValidator::new(manifest_with_create_user());
        assert!(validator.validate_arguments("create_user", &args(&[("name", Value::String("Ada".into())), ("age", serde_json::json!(30))])).is_ok());
    }

    #[test]
    fn unknown_request_is_method_not_found() {
        let validator = ArgumentValidator::new(manifest_with_create_user());
        let err = validator.validate_arguments("unknown", &args(&[])).unwrap_err();
        assert_eq!(err.code(), JanusErrorCode::MethodNotFound);
    }

    #[test]
    fn missing_required_argument_is_rejected() {
        let validator = ArgumentValidator::new(manifest_with_create_user());
        let err = validator.validate_arguments("create_user", &args(&[])).unwrap_err();
        assert_eq!(err.code(), JanusErrorCode::ValidationFailed);
    }

    #[test]
    fn stops_at_first_violation() {
        let validator = ArgumentValidator::new(manifest_with_create_user());
        let err = validator.validate_arguments("create_user", &args(&[("name", Value::String("".into())), ("age", serde_json::json!(999))])).unwrap_err();
        let JanusError::Protocol(wire) = err else { panic!("expected protocol error") };
        assert_eq!(wire.data.unwrap().field.as_deref(), Some("name"));
    }

    #[test]
    fn reports_nested_field_path_through_model_ref() {
        let mut manifest = manifest_with_create_user();
        let mut address = crate::manifest::ModelManifest::new().with_required(vec!["city".to_string()]);
        address.add_property("city", ArgumentManifest::new("string").required());
        manifest.add_model("Address", address);
        manifest.requests.get_mut("create_user").unwrap().add_argument("address", ArgumentManifest::new("object").with_model_ref("Address"));

        let validator = ArgumentValidator::new(manifest);
        let err = validator
            .validate_arguments("create_user", &args(&[("name", Value::String("Ada".into())), ("address", serde_json::json!({}))]))
            .unwrap_err();
        let JanusError::Protocol(wire) = err else { panic!("expected protocol error") };
        assert_eq!(wire.data.unwrap().field.as_deref(), Some("address.city"));
    }

    #[test]
    fn accepts_array_arguments_without_item_schema() {
        let mut manifest = manifest_with_create_user();
        manifest.requests.get_mut("create_user").unwrap().add_argument("tags", ArgumentManifest::new("array"));
        let validator = ArgumentValidator::new(manifest);
        assert!(validator.validate_arguments("create_user", &args(&[("name", Value::String("Ada".into())), ("tags", serde_json::json!(["a", "b"]))])).is_ok());
    }
}
