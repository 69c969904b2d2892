// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Regex pattern compilation for PII detection
// Uses RegexSet to skip patterns that cannot match before running find_iter

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder, RegexSet};
use tracing::warn;

use super::config::PIIConfig;
use crate::error::{FilterError, Result};

/// Compiled-program ceiling for user-supplied patterns
pub const USER_PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// Compiled pattern with metadata
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub name: String,
    pub regex: Regex,
    pub severity: String,
    pub description: String,
    pub builtin: bool,
}

/// All enabled patterns, built-ins first in registry order, then custom
/// patterns in configuration order
pub struct CompiledPatterns {
    pub regex_set: RegexSet,
    pub patterns: Vec<CompiledPattern>,
    pub whitelist: Vec<Regex>,
}

/// Built-in detector definition (name, pattern, description)
pub type PatternDef = (&'static str, &'static str, &'static str);

/// Built-in detectors in evaluation order
pub static BUILTIN_PATTERNS: Lazy<Vec<PatternDef>> = Lazy::new(|| {
    vec![
        (
            "ssn",
            r"\b\d{3}-\d{2}-\d{4}\b|\b\d{9}\b",
            "US Social Security Number",
        ),
        (
            "credit_card",
            r"\b4[0-9]{12}(?:[0-9]{3})?\b|\b5[1-5][0-9]{14}\b|\b3[47][0-9]{13}\b|\b3[0-9]{13}\b|\b6(?:011|5[0-9]{2})[0-9]{12}\b",
            "Credit card number (Visa, Mastercard, Amex, Diners, Discover)",
        ),
        (
            "email",
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            "Email address",
        ),
        (
            "phone",
            r"\b(?:\+?1[-.\s]?)?\(?[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}\b",
            "US phone number",
        ),
        (
            "aws_keys",
            r"AKIA[0-9A-Z]{16}|aws_access_key_id\s*=\s*[A-Z0-9]{20}",
            "AWS access key",
        ),
        (
            "ip_address",
            r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b",
            "IPv4 address",
        ),
        ("api_key", r"\b[A-Za-z0-9]{32,}\b", "Generic API key"),
    ]
});

/// Names of every built-in detector, in evaluation order
pub fn builtin_names() -> impl Iterator<Item = &'static str> {
    BUILTIN_PATTERNS.iter().map(|(name, _, _)| *name)
}

pub fn is_builtin(name: &str) -> bool {
    builtin_names().any(|n| n == name)
}

fn compile_user_pattern(pattern: &str, field: String, name: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .size_limit(USER_PATTERN_SIZE_LIMIT)
        .build()
        .map_err(|source| FilterError::InvalidPattern {
            field,
            name: name.to_string(),
            source,
        })
}

/// Compile patterns based on configuration
pub fn compile_patterns(config: &PIIConfig) -> Result<CompiledPatterns> {
    let mut patterns = Vec::new();

    for (name, enabled) in &config.patterns {
        if *enabled && !is_builtin(name) {
            warn!(pattern = %name, "ignoring unknown built-in PII pattern");
        }
    }

    for (name, pattern, description) in BUILTIN_PATTERNS.iter() {
        if !config.is_pattern_enabled(name) {
            continue;
        }
        let regex = Regex::new(pattern).map_err(|source| FilterError::InvalidPattern {
            field: "patterns".to_string(),
            name: name.to_string(),
            source,
        })?;
        patterns.push(CompiledPattern {
            name: name.to_string(),
            regex,
            severity: config.severity_for(name).to_string(),
            description: description.to_string(),
            builtin: true,
        });
    }

    // Disabled custom patterns must still compile so a bad pattern cannot be
    // saved now and break the filter when someone flips it on later
    for (i, custom) in config.custom_patterns.iter().enumerate() {
        let regex = compile_user_pattern(
            &custom.pattern,
            format!("custom_patterns[{}].pattern", i),
            &custom.name,
        )?;
        if custom.enabled {
            patterns.push(CompiledPattern {
                name: custom.name.clone(),
                regex,
                severity: custom.severity.clone(),
                description: custom.description.clone(),
                builtin: false,
            });
        }
    }

    // Every detector disabled
    let regex_set = if patterns.is_empty() {
        RegexSet::empty()
    } else {
        RegexSet::new(patterns.iter().map(|p| p.regex.as_str())).map_err(|e| {
            FilterError::invalid_config("patterns", format!("failed to compile pattern set: {}", e))
        })?
    };

    let whitelist = config
        .whitelist_patterns
        .iter()
        .enumerate()
        .map(|(i, pattern)| {
            compile_user_pattern(pattern, format!("whitelist_patterns[{}]", i), pattern)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CompiledPatterns {
        regex_set,
        patterns,
        whitelist,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pii_filter::config::CustomPattern;
    use std::collections::HashMap;

    fn config_with(names: &[&str]) -> PIIConfig {
        PIIConfig {
            patterns: names.iter().map(|n| (n.to_string(), true)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_every_builtin_compiles() {
        let all: Vec<&str> = builtin_names().collect();
        let compiled = compile_patterns(&config_with(&all)).unwrap();
        assert_eq!(compiled.patterns.len(), BUILTIN_PATTERNS.len());
        assert_eq!(compiled.regex_set.len(), BUILTIN_PATTERNS.len());
    }

    #[test]
    fn test_nothing_enabled() {
        let compiled = compile_patterns(&PIIConfig::default()).unwrap();
        assert!(compiled.patterns.is_empty());
        assert!(compiled.regex_set.is_empty());
    }

    #[test]
    fn test_ssn_pattern() {
        let compiled = compile_patterns(&config_with(&["ssn"])).unwrap();
        let text = "My SSN is 123-45-6789";
        assert!(compiled.regex_set.is_match(text));
    }

    #[test]
    fn test_email_pattern() {
        let compiled = compile_patterns(&config_with(&["email"])).unwrap();
        let text = "Contact me at john.doe@example.com";
        assert!(compiled.regex_set.is_match(text));
    }

    #[test]
    fn test_builtins_precede_custom() {
        let mut config = config_with(&["email", "ssn"]);
        config.custom_patterns.push(CustomPattern {
            name: "ticket".to_string(),
            pattern: r"TCK-\d+".to_string(),
            enabled: true,
            severity: "low".to_string(),
            description: String::new(),
        });
        let compiled = compile_patterns(&config).unwrap();
        let names: Vec<&str> = compiled.patterns.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["ssn", "email", "ticket"]);
    }

    #[test]
    fn test_invalid_custom_pattern_named() {
        let mut config = PIIConfig::default();
        config.custom_patterns.push(CustomPattern {
            name: "broken".to_string(),
            pattern: "([a-z".to_string(),
            enabled: false,
            severity: "high".to_string(),
            description: String::new(),
        });
        let err = compile_patterns(&config).err().unwrap();
        let msg = err.to_string();
        assert!(msg.contains("broken"));
        assert!(msg.contains("custom_patterns[0].pattern"));
    }

    #[test]
    fn test_invalid_whitelist_pattern() {
        let config = PIIConfig {
            whitelist_patterns: vec!["*oops".to_string()],
            ..Default::default()
        };
        let err = compile_patterns(&config).err().unwrap();
        assert!(err.to_string().contains("whitelist_patterns[0]"));
    }

    #[test]
    fn test_builtin_severity_override() {
        let config = PIIConfig {
            patterns: HashMap::from([("ssn".to_string(), true)]),
            severities: HashMap::from([("ssn".to_string(), "high".to_string())]),
            ..Default::default()
        };
        let compiled = compile_patterns(&config).unwrap();
        assert_eq!(compiled.patterns[0].severity, "high");
    }
}
