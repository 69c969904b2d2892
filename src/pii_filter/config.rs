// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Configuration types for PII Filter

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{FilterError, Result};
use crate::types::{ConfigMap, FilterAction};

/// Severity given to any pattern without an explicit one
pub const DEFAULT_SEVERITY: &str = "medium";

/// Characters left visible at each end of a match by partial masking
pub const DEFAULT_PARTIAL_REVEAL: usize = 2;

/// Upper bound accepted for `partial_reveal`
pub const MAX_PARTIAL_REVEAL: usize = 64;

pub const DEFAULT_REDACTION_TEXT: &str = "[REDACTED]";

/// Masking strategies for detected PII
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MaskingStrategy {
    #[default]
    Redact, // Replace with [REDACTED]
    Partial,  // Keep first/last chars (e.g., jo****om)
    Hash,     // Replace with hash (e.g., [HASH:abc123])
    Tokenize, // Replace with token (e.g., [TOKEN:xyz789])
}

impl MaskingStrategy {
    pub const ALL: [MaskingStrategy; 4] = [
        MaskingStrategy::Redact,
        MaskingStrategy::Partial,
        MaskingStrategy::Hash,
        MaskingStrategy::Tokenize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MaskingStrategy::Redact => "redact",
            MaskingStrategy::Partial => "partial",
            MaskingStrategy::Hash => "hash",
            MaskingStrategy::Tokenize => "tokenize",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == s)
    }
}

pub const ACTIONS: [FilterAction; 4] = [
    FilterAction::Block,
    FilterAction::Warn,
    FilterAction::Audit,
    FilterAction::Allow,
];

fn parse_action(s: &str) -> Option<FilterAction> {
    ACTIONS.into_iter().find(|a| a.as_str() == s)
}

/// User-defined detection pattern
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomPattern {
    pub name: String,
    pub pattern: String,
    pub enabled: bool,
    pub severity: String,
    pub description: String,
}

/// Typed configuration for PII Filter
///
/// Serializes to the same object shape [`PIIConfig::from_config_map`] reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PIIConfig {
    /// Built-in detector name -> enabled
    pub patterns: HashMap<String, bool>,
    pub custom_patterns: Vec<CustomPattern>,
    pub masking_strategy: MaskingStrategy,
    pub action: FilterAction,
    pub log_violations: bool,
    pub redaction_text: String,
    pub partial_reveal: usize,
    /// Built-in detector name -> severity
    pub severities: HashMap<String, String>,
    pub whitelist_patterns: Vec<String>,
    pub skip_timing_values: bool,
}

impl Default for PIIConfig {
    fn default() -> Self {
        Self {
            // Nothing runs unless asked for
            patterns: HashMap::new(),
            custom_patterns: Vec::new(),

            masking_strategy: MaskingStrategy::Redact,
            action: FilterAction::Warn,
            log_violations: true,
            redaction_text: DEFAULT_REDACTION_TEXT.to_string(),
            partial_reveal: DEFAULT_PARTIAL_REVEAL,

            severities: HashMap::new(),
            whitelist_patterns: Vec::new(),
            skip_timing_values: true,
        }
    }
}

impl PIIConfig {
    /// Extract configuration from an admin-API config object
    ///
    /// Missing keys keep their defaults and unknown keys are ignored. A key
    /// that is present but malformed is an error naming that key.
    pub fn from_config_map(map: &ConfigMap) -> Result<Self> {
        let mut config = Self::default();

        macro_rules! extract_bool {
            ($field:ident) => {
                if let Some(value) = map.get(stringify!($field)) {
                    config.$field = value.as_bool().ok_or_else(|| {
                        FilterError::invalid_config(stringify!($field), "must be a boolean")
                    })?;
                }
            };
        }

        extract_bool!(log_violations);
        extract_bool!(skip_timing_values);

        if let Some(value) = map.get("patterns") {
            config.patterns = bool_map(value, "patterns")?;
        }

        if let Some(value) = map.get("masking_strategy") {
            let s = expect_str(value, "masking_strategy")?;
            config.masking_strategy = MaskingStrategy::parse(s).ok_or_else(|| {
                FilterError::invalid_config(
                    "masking_strategy",
                    format!(
                        "unknown value '{}', expected one of redact, partial, hash, tokenize",
                        s
                    ),
                )
            })?;
        }

        if let Some(value) = map.get("action") {
            let s = expect_str(value, "action")?;
            config.action = parse_action(s).ok_or_else(|| {
                FilterError::invalid_config(
                    "action",
                    format!(
                        "unknown value '{}', expected one of block, warn, audit, allow",
                        s
                    ),
                )
            })?;
        }

        if let Some(value) = map.get("redaction_text") {
            config.redaction_text = expect_str(value, "redaction_text")?.to_string();
        }

        if let Some(value) = map.get("partial_reveal") {
            config.partial_reveal = value
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .filter(|n| *n <= MAX_PARTIAL_REVEAL)
                .ok_or_else(|| {
                    FilterError::invalid_config(
                        "partial_reveal",
                        format!("must be an integer between 0 and {}", MAX_PARTIAL_REVEAL),
                    )
                })?;
        }

        if let Some(value) = map.get("severities") {
            let obj = value
                .as_object()
                .ok_or_else(|| FilterError::invalid_config("severities", "must be an object"))?;
            for (name, severity) in obj {
                let field = format!("severities.{}", name);
                config
                    .severities
                    .insert(name.clone(), expect_str(severity, &field)?.to_string());
            }
        }

        if let Some(value) = map.get("whitelist_patterns") {
            let items = value.as_array().ok_or_else(|| {
                FilterError::invalid_config("whitelist_patterns", "must be a list of strings")
            })?;
            for (i, item) in items.iter().enumerate() {
                let field = format!("whitelist_patterns[{}]", i);
                config
                    .whitelist_patterns
                    .push(expect_str(item, &field)?.to_string());
            }
        }

        if let Some(value) = map.get("custom_patterns") {
            let items = value.as_array().ok_or_else(|| {
                FilterError::invalid_config("custom_patterns", "must be a list of objects")
            })?;
            for (i, item) in items.iter().enumerate() {
                config.custom_patterns.push(custom_pattern(i, item)?);
            }
        }

        Ok(config)
    }

    /// Severity reported for a built-in detector
    pub fn severity_for(&self, name: &str) -> &str {
        self.severities
            .get(name)
            .map(String::as_str)
            .unwrap_or(DEFAULT_SEVERITY)
    }

    /// Admin-API object equivalent to this configuration
    pub fn to_config_map(&self) -> ConfigMap {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => ConfigMap::new(),
        }
    }

    pub fn is_pattern_enabled(&self, name: &str) -> bool {
        self.patterns.get(name).copied().unwrap_or(false)
    }
}

fn expect_str<'v>(value: &'v Value, field: &str) -> Result<&'v str> {
    value
        .as_str()
        .ok_or_else(|| FilterError::invalid_config(field, "must be a string"))
}

fn bool_map(value: &Value, field: &str) -> Result<HashMap<String, bool>> {
    let obj = value
        .as_object()
        .ok_or_else(|| FilterError::invalid_config(field, "must be an object of booleans"))?;
    obj.iter()
        .map(|(name, enabled)| {
            enabled
                .as_bool()
                .map(|b| (name.clone(), b))
                .ok_or_else(|| {
                    FilterError::invalid_config(format!("{}.{}", field, name), "must be a boolean")
                })
        })
        .collect()
}

fn custom_pattern(index: usize, value: &Value) -> Result<CustomPattern> {
    let field = format!("custom_patterns[{}]", index);
    let obj = value
        .as_object()
        .ok_or_else(|| FilterError::invalid_config(&field, "must be an object"))?;

    let required = |key: &str| -> Result<String> {
        match obj.get(key) {
            Some(v) => {
                let s = expect_str(v, &format!("{}.{}", field, key))?;
                if s.is_empty() {
                    Err(FilterError::invalid_config(
                        format!("{}.{}", field, key),
                        "must not be empty",
                    ))
                } else {
                    Ok(s.to_string())
                }
            }
            None => Err(FilterError::invalid_config(
                format!("{}.{}", field, key),
                "is required",
            )),
        }
    };
    let optional = |key: &str, default: &str| -> Result<String> {
        match obj.get(key) {
            Some(v) => Ok(expect_str(v, &format!("{}.{}", field, key))?.to_string()),
            None => Ok(default.to_string()),
        }
    };

    let enabled = match obj.get("enabled") {
        Some(v) => v.as_bool().ok_or_else(|| {
            FilterError::invalid_config(format!("{}.enabled", field), "must be a boolean")
        })?,
        None => true,
    };

    Ok(CustomPattern {
        name: required("name")?,
        pattern: required("pattern")?,
        enabled,
        severity: optional("severity", DEFAULT_SEVERITY)?,
        description: optional("description", "")?,
    })
}
