use std::collections::HashMap;

use log::{debug, error, info, warn};
use regex::Regex;

use crate::error::{JanusError, JanusErrorCode, Result};
use crate::manifest::model::{ArgumentManifest, ErrorCodeManifest, Manifest};

/// Recursion depth allowed while following `modelRef` chains before the
/// parser gives up and reports a cycle (§4.3).
pub const MAX_MODEL_REF_DEPTH: usize = 32;

/// Parses, validates, and serializes [`Manifest`] documents in JSON (and,
/// with the `yaml-support` feature, YAML).
///
/// Grounded on `manifest/manifest_parser.rs`.
pub struct ManifestParser;

impl ManifestParser {
    pub fn from_json(json_str: &str) -> Result<Manifest> {
        Self::from_json_with_context(json_str, None)
    }

    pub fn from_json_with_context(json_str: &str, file_path: Option<&str>) -> Result<Manifest> {
        let context = file_path.map(|p| format!(" (file: {p})")).unwrap_or_default();
        debug!("parsing manifest from JSON{context} ({} bytes)", json_str.len());

        if json_str.trim().is_empty() {
            error!("manifest JSON string is empty{context}");
            return Err(JanusError::new(JanusErrorCode::ManifestValidationError, format!("JSON input is empty{context}")));
        }

        match serde_json::from_str::<Manifest>(json_str) {
            Ok(manifest) => {
                info!("parsed manifest{context}: version {}, {} requests", manifest.version, manifest.requests.len());
                Ok(manifest)
            }
            Err(e) => {
                let detail = match e.classify() {
                    serde_json::error::Category::Syntax => {
                        format!("syntax error at line {}, column {}: {e}", e.line(), e.column())
                    }
                    serde_json::error::Category::Data => format!("invalid data structure: {e}"),
                    serde_json::error::Category::Eof => format!("unexpected end of input: {e}"),
                    serde_json::error::Category::Io => format!("I/O error: {e}"),
                };
                error!("failed to parse manifest{context}: {detail}");
                Err(JanusError::new(JanusErrorCode::ManifestValidationError, format!("JSON parsing error{context} - {detail}")))
            }
        }
    }

    #[cfg(feature = "yaml-support")]
    pub fn from_yaml(yaml_str: &str) -> Result<Manifest> {
        Self::from_yaml_with_context(yaml_str, None)
    }

    #[cfg(feature = "yaml-support")]
    pub fn from_yaml_with_context(yaml_str: &str, file_path: Option<&str>) -> Result<Manifest> {
        let context = file_path.map(|p| format!(" (file: {p})")).unwrap_or_default();
        debug!("parsing manifest from YAML{context} ({} bytes)", yaml_str.len());

        if yaml_str.trim().is_empty() {
            error!("manifest YAML string is empty{context}");
            return Err(JanusError::new(JanusErrorCode::ManifestValidationError, format!("YAML input is empty{context}")));
        }

        match serde_yaml::from_str::<Manifest>(yaml_str) {
            Ok(manifest) => {
                info!("parsed manifest{context}: version {}, {} requests", manifest.version, manifest.requests.len());
                Ok(manifest)
            }
            Err(e) => {
                error!("failed to parse manifest{context}: {e}");
                Err(JanusError::new(JanusErrorCode::ManifestValidationError, format!("YAML parsing error{context}: {e}")))
            }
        }
    }

    pub async fn from_file(path: &str) -> Result<Manifest> {
        info!("loading manifest from file: {path}");
        if path.trim().is_empty() {
            return Err(JanusError::new(JanusErrorCode::ValidationFailed, "manifest file path cannot be empty"));
        }

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| JanusError::new(JanusErrorCode::SocketError, format!("cannot access manifest file '{path}': {e}")))?;
        if metadata.len() == 0 {
            warn!("manifest file is empty: {path}");
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| JanusError::new(JanusErrorCode::SocketError, format!("failed to read manifest file '{path}': {e}")))?;

        if path.ends_with(".yaml") || path.ends_with(".yml") {
            #[cfg(feature = "yaml-support")]
            {
                Self::from_yaml_with_context(&content, Some(path))
            }
            #[cfg(not(feature = "yaml-support"))]
            {
                Err(JanusError::new(
                    JanusErrorCode::ManifestValidationError,
                    format!("YAML support is not enabled (file: {path}); build with the 'yaml-support' feature"),
                ))
            }
        } else {
            Self::from_json_with_context(&content, Some(path))
        }
    }

    /// Serializes a manifest to JSON with sorted keys, for hashing and test
    /// fixtures (§4.3). Routing through `serde_json::Value` first sorts every
    /// nested `HashMap` field (`serde_json::Map` is a `BTreeMap` without the
    /// `preserve_order` feature), which a direct `to_string_pretty(manifest)`
    /// would not do.
    pub fn to_json(manifest: &Manifest) -> Result<String> {
        let value = serde_json::to_value(manifest)?;
        Ok(serde_json::to_string_pretty(&value)?)
    }

    /// Merges manifests into one, failing if two define the same request or
    /// model name (§4.3). The merged manifest keeps the version of the first
    /// entry in `manifests`.
    pub fn merge(manifests: &[Manifest]) -> Result<Manifest> {
        let mut merged = Manifest::new(manifests.first().map(|m| m.version.clone()).unwrap_or_else(|| "0.0.0".to_string()));

        for manifest in manifests {
            for (name, request) in &manifest.requests {
                if merged.requests.contains_key(name) {
                    return Err(JanusError::new(JanusErrorCode::ManifestValidationError, format!("duplicate request name '{name}' across merged manifests")));
                }
                merged.add_request(name.clone(), request.clone());
            }

            if let Some(models) = &manifest.models {
                for (name, model) in models {
                    if merged.get_model(name).is_some() {
                        return Err(JanusError::new(JanusErrorCode::ManifestValidationError, format!("duplicate model name '{name}' across merged manifests")));
                    }
                    merged.add_model(name.clone(), model.clone());
                }
            }
        }

        info!("merged {} manifests into version {}: {} requests, {} models", manifests.len(), merged.version, merged.requests.len(), merged.models.as_ref().map_or(0, |m| m.len()));
        Ok(merged)
    }

    /// Validates manifest structure: version format, that every `modelRef` in
    /// every argument/response/model resolves without a cycle within
    /// [`MAX_MODEL_REF_DEPTH`] hops, that every `validation.pattern` compiles
    /// as a regex, that `min_length`/`max_length` and `minimum`/`maximum`
    /// pairs are not inverted, and that every error code has a non-empty name
    /// and message.
    pub fn validate(manifest: &Manifest) -> Result<()> {
        if manifest.version.is_empty() {
            return Err(JanusError::new(JanusErrorCode::ManifestValidationError, "manifest version is required"));
        }
        if !Self::is_valid_version(&manifest.version) {
            return Err(JanusError::new(
                JanusErrorCode::ManifestValidationError,
                format!("invalid version format: {}", manifest.version),
            ));
        }

        for request_name in manifest.requests.keys() {
            if crate::wire::is_builtin_request(request_name) {
                return Err(JanusError::new(
                    JanusErrorCode::ManifestValidationError,
                    format!("'{request_name}' is a reserved built-in request name and cannot appear in a manifest"),
                ));
            }
        }

        for (request_name, request) in &manifest.requests {
            for (arg_name, arg) in &request.args {
                if let Some(model_ref) = &arg.model_ref {
                    Self::check_model_ref_chain(manifest, model_ref, 0)
                        .map_err(|e| JanusError::new(JanusErrorCode::ManifestValidationError, format!("request '{request_name}': {e}")))?;
                }
                Self::validate_argument(arg).map_err(|e| JanusError::new(JanusErrorCode::ManifestValidationError, format!("request '{request_name}' argument '{arg_name}': {e}")))?;
            }
            if let Some(model_ref) = &request.response.model_ref {
                Self::check_model_ref_chain(manifest, model_ref, 0)
                    .map_err(|e| JanusError::new(JanusErrorCode::ManifestValidationError, format!("request '{request_name}' response: {e}")))?;
            }
            if let Some(properties) = &request.response.properties {
                for (prop_name, prop) in properties {
                    Self::validate_argument(prop).map_err(|e| JanusError::new(JanusErrorCode::ManifestValidationError, format!("request '{request_name}' response property '{prop_name}': {e}")))?;
                }
            }
            if let Some(error_codes) = &request.error_codes {
                Self::validate_error_codes(error_codes).map_err(|e| JanusError::new(JanusErrorCode::ManifestValidationError, format!("request '{request_name}': {e}")))?;
            }
        }

        if let Some(models) = &manifest.models {
            for (model_name, model) in models {
                if model.properties.is_empty() {
                    debug!("model '{model_name}' has no properties");
                }
                for (prop_name, prop) in &model.properties {
                    if let Some(model_ref) = &prop.model_ref {
                        Self::check_model_ref_chain(manifest, model_ref, 1)
                            .map_err(|e| JanusError::new(JanusErrorCode::ManifestValidationError, format!("model '{model_name}': {e}")))?;
                    }
                    Self::validate_argument(prop).map_err(|e| JanusError::new(JanusErrorCode::ManifestValidationError, format!("model '{model_name}' property '{prop_name}': {e}")))?;
                }
            }
        }

        info!("manifest validated: version {}, {} requests, {} models", manifest.version, manifest.requests.len(), manifest.models.as_ref().map_or(0, |m| m.len()));
        Ok(())
    }

    fn check_model_ref_chain(manifest: &Manifest, model_ref: &str, depth: usize) -> std::result::Result<(), String> {
        if depth >= MAX_MODEL_REF_DEPTH {
            return Err(format!("modelRef chain exceeds max depth of {MAX_MODEL_REF_DEPTH} at '{model_ref}'"));
        }
        let model = manifest.resolve_model_ref(model_ref).ok_or_else(|| format!("unresolved modelRef '{model_ref}'"))?;
        for prop in model.properties.values() {
            if let Some(nested_ref) = &prop.model_ref {
                Self::check_model_ref_chain(manifest, nested_ref, depth + 1)?;
            }
        }
        Ok(())
    }

    /// Checks a single argument's `validation` block: `pattern` compiles as a
    /// regex, `min_length <= max_length`, `minimum <= maximum`.
    fn validate_argument(arg: &ArgumentManifest) -> std::result::Result<(), String> {
        let Some(validation) = &arg.validation else {
            return Ok(());
        };
        if let Some(pattern) = &validation.pattern {
            Regex::new(pattern).map_err(|e| format!("invalid regex pattern '{pattern}': {e}"))?;
        }
        if let (Some(min_length), Some(max_length)) = (validation.min_length, validation.max_length) {
            if min_length > max_length {
                return Err(format!("min_length ({min_length}) exceeds max_length ({max_length})"));
            }
        }
        if let (Some(minimum), Some(maximum)) = (validation.minimum, validation.maximum) {
            if minimum > maximum {
                return Err(format!("minimum ({minimum}) exceeds maximum ({maximum})"));
            }
        }
        Ok(())
    }

    /// Checks that every error code in a request's `error_codes` table has a
    /// non-empty name and message.
    fn validate_error_codes(error_codes: &HashMap<String, ErrorCodeManifest>) -> std::result::Result<(), String> {
        for (name, error) in error_codes {
            if name.trim().is_empty() {
                return Err("error code name cannot be empty".to_string());
            }
            if error.message.trim().is_empty() {
                return Err(format!("error code '{name}' has an empty message"));
            }
        }
        Ok(())
    }

    pub async fn load_and_validate(path: &str) -> Result<Manifest> {
        let manifest = Self::from_file(path).await?;
        Self::validate(&manifest)?;
        Ok(manifest)
    }

    fn is_valid_version(version: &str) -> bool {
        let parts: Vec<&str> = version.split('.').collect();
        parts.len() == 3 && parts.iter().all(|part| part.parse::<u32>().is_ok())
    }
}
