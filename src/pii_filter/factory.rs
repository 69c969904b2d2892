// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Factory for PII filters

use serde_json::{json, Value};
use std::sync::Arc;

use super::config::PIIConfig;
use super::detector::PIIDetector;
use super::filter::{PIIFilter, DEFAULT_PRIORITY};
use super::patterns::builtin_names;
use crate::base::lifecycle_keys;
use crate::error::{FilterError, Result};
use crate::filter::{Filter, FilterFactory};
use crate::types::{ConfigMap, FilterType};

pub const DEFAULT_FILTER_NAME: &str = "pii-filter";

/// Built-in detectors switched on by `default_config`
const DEFAULT_ENABLED: &[&str] = &["ssn", "credit_card", "email", "phone", "aws_keys"];

fn filter_name(config: &ConfigMap) -> Result<String> {
    match config.get("name") {
        Some(Value::String(name)) if !name.is_empty() => Ok(name.clone()),
        Some(Value::String(_)) | None => Ok(DEFAULT_FILTER_NAME.to_string()),
        Some(_) => Err(FilterError::invalid_config("name", "must be a string")),
    }
}

/// Builds [`PIIFilter`] instances from admin-API configuration
#[derive(Debug, Default, Clone, Copy)]
pub struct PIIFilterFactory;

impl FilterFactory for PIIFilterFactory {
    /// Reads `name` (default `pii-filter`) from the configuration; `priority`
    /// and `enabled` are applied by the filter itself
    fn create(&self, config: &ConfigMap) -> Result<Arc<dyn Filter>> {
        self.validate_config(config)?;
        Ok(Arc::new(PIIFilter::new(filter_name(config)?, config)?))
    }

    fn filter_type(&self) -> FilterType {
        FilterType::Pii
    }

    fn name(&self) -> &str {
        "PII Filter"
    }

    fn description(&self) -> &str {
        "Detects and masks personally identifiable information (PII) in content"
    }

    /// Accepts exactly the configurations `create` accepts
    fn validate_config(&self, config: &ConfigMap) -> Result<()> {
        filter_name(config)?;
        lifecycle_keys(config)?;
        PIIDetector::from_config_map(config).map(|_| ())
    }

    fn default_config(&self) -> ConfigMap {
        let pii = PIIConfig {
            patterns: builtin_names()
                .map(|name| (name.to_string(), DEFAULT_ENABLED.contains(&name)))
                .collect(),
            ..Default::default()
        };

        let mut config = pii.to_config_map();
        config.insert("name".to_string(), json!(DEFAULT_FILTER_NAME));
        config.insert("priority".to_string(), json!(DEFAULT_PRIORITY));
        config.insert("enabled".to_string(), json!(true));
        config
    }

    fn config_schema(&self) -> Value {
        let builtin: serde_json::Map<String, Value> = builtin_names()
            .map(|name| (name.to_string(), json!({"type": "boolean"})))
            .collect();
        let severities: serde_json::Map<String, Value> = builtin_names()
            .map(|name| (name.to_string(), json!({"type": "string"})))
            .collect();

        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "priority": {"type": "integer"},
                "enabled": {"type": "boolean"},
                "patterns": {
                    "type": "object",
                    "properties": builtin
                },
                "masking_strategy": {
                    "type": "string",
                    "enum": ["redact", "partial", "hash", "tokenize"]
                },
                "action": {
                    "type": "string",
                    "enum": ["block", "warn", "audit", "allow"]
                },
                "log_violations": {"type": "boolean"},
                "redaction_text": {"type": "string"},
                "partial_reveal": {"type": "integer", "minimum": 0},
                "severities": {
                    "type": "object",
                    "properties": severities
                },
                "custom_patterns": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "pattern": {"type": "string"},
                            "enabled": {"type": "boolean"},
                            "severity": {"type": "string"},
                            "description": {"type": "string"}
                        },
                        "required": ["name", "pattern"]
                    }
                },
                "whitelist_patterns": {
                    "type": "array",
                    "items": {"type": "string"}
                },
                "skip_timing_values": {"type": "boolean"}
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(value: Value) -> ConfigMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_create_uses_name_and_priority() {
        let factory = PIIFilterFactory;
        let filter = factory
            .create(&map(json!({
                "name": "outbound-pii",
                "priority": 3,
                "patterns": {"email": true}
            })))
            .unwrap();

        assert_eq!(filter.name(), "outbound-pii");
        assert_eq!(filter.priority(), 3);
        assert_eq!(filter.filter_type(), FilterType::Pii);
    }

    #[test]
    fn test_create_default_name() {
        let filter = PIIFilterFactory.create(&ConfigMap::new()).unwrap();
        assert_eq!(filter.name(), DEFAULT_FILTER_NAME);
        assert_eq!(filter.priority(), DEFAULT_PRIORITY);
    }

    #[test]
    fn test_validate_config_rejects_bad_values() {
        let factory = PIIFilterFactory;
        assert!(factory
            .validate_config(&map(json!({"masking_strategy": "none"})))
            .is_err());
        assert!(factory
            .validate_config(&map(json!({"action": "deny"})))
            .is_err());

        let err = factory
            .validate_config(&map(json!({
                "custom_patterns": [
                    {"name": "ok", "pattern": "a+"},
                    {"name": "broken", "pattern": "[z-a]"}
                ]
            })))
            .unwrap_err();
        assert!(err.to_string().contains("custom_patterns[1].pattern"));
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_default_config_is_valid() {
        let factory = PIIFilterFactory;
        let config = factory.default_config();
        factory.validate_config(&config).unwrap();
        assert_eq!(config["masking_strategy"], json!("redact"));
        assert_eq!(config["action"], json!("warn"));
        assert_eq!(config["partial_reveal"], json!(2));
        assert_eq!(config["patterns"]["ssn"], json!(true));
        assert_eq!(config["patterns"]["ip_address"], json!(false));
        assert_eq!(config["name"], json!(DEFAULT_FILTER_NAME));
    }

    #[test]
    fn test_validate_config_agrees_with_create() {
        let factory = PIIFilterFactory;
        for bad in [
            json!({"priority": "high"}),
            json!({"priority": 1.5}),
            json!({"name": 5}),
            json!({"enabled": "yes"}),
        ] {
            let config = map(bad);
            assert!(factory.validate_config(&config).is_err());
            assert!(factory.create(&config).is_err());
        }

        let good = map(json!({"name": "", "priority": -1, "enabled": false}));
        factory.validate_config(&good).unwrap();
        let filter = factory.create(&good).unwrap();
        assert_eq!(filter.name(), DEFAULT_FILTER_NAME);
        assert!(!filter.is_enabled());
    }

    #[test]
    fn test_schema_lists_every_builtin() {
        let schema = PIIFilterFactory.config_schema();
        for name in builtin_names() {
            assert!(schema["properties"]["patterns"]["properties"]
                .get(name)
                .is_some());
        }
    }
}
