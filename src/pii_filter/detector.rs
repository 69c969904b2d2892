// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Core PII detection logic

use serde_json::Value;
use std::borrow::Cow;

use super::config::PIIConfig;
use super::masking;
use super::patterns::{compile_patterns, CompiledPatterns};
use crate::error::Result;
use crate::types::{ConfigMap, FilterViolation};

/// JSON keys whose numeric values are timings, not identifiers
const TIMING_KEYS: &[&str] = &[
    "timeout",
    "timeout_seconds",
    "timeout_ms",
    "timeout_ns",
    "duration",
    "delay",
    "wait_time",
];

/// A single PII detection result
#[derive(Debug, Clone)]
pub struct Detection {
    /// Index into `CompiledPatterns::patterns`
    pub pattern_index: usize,
    pub value: String,
    pub start: usize,
    pub end: usize,
    pub replacement: Option<String>,
}

/// Find every enabled-pattern match in `text`
///
/// Detections come out grouped by pattern (built-ins first), each group in
/// text order. A match overlapping an earlier detection is dropped.
pub fn detect_pii(text: &str, patterns: &CompiledPatterns, config: &PIIConfig) -> Vec<Detection> {
    let mut detections: Vec<Detection> = Vec::new();

    for pattern_idx in patterns.regex_set.matches(text).iter() {
        let pattern = &patterns.patterns[pattern_idx];

        for mat in pattern.regex.find_iter(text) {
            let (start, end) = (mat.start(), mat.end());

            if mat.as_str().is_empty() {
                continue;
            }

            if is_whitelisted(patterns, mat.as_str()) {
                continue;
            }

            if config.skip_timing_values
                && (is_timing_value(text, start) || is_duration_or_timestamp(mat.as_str()))
            {
                continue;
            }

            if has_overlap(&detections, start, end) {
                continue;
            }

            detections.push(Detection {
                pattern_index: pattern_idx,
                value: mat.as_str().to_string(),
                start,
                end,
                replacement: None,
            });
        }
    }

    detections
}

fn is_whitelisted(patterns: &CompiledPatterns, value: &str) -> bool {
    patterns.whitelist.iter().any(|w| w.is_match(value))
}

fn has_overlap(detections: &[Detection], start: usize, end: usize) -> bool {
    detections.iter().any(|d| start < d.end && end > d.start)
}

/// Whether the match at `start` is the value of a JSON timing field,
/// e.g. `"timeout": 1234567890`
fn is_timing_value(text: &str, start: usize) -> bool {
    let before = text[..start].trim_end();
    let Some(before) = before.strip_suffix(':') else {
        return false;
    };
    let Some(before) = before.trim_end().strip_suffix('"') else {
        return false;
    };
    TIMING_KEYS.iter().any(|key| {
        before
            .strip_suffix(key)
            .is_some_and(|rest| rest.ends_with('"'))
    })
}

/// Unix timestamps in seconds (10 digits starting with 1) and nanosecond
/// durations (20+ digits)
fn is_duration_or_timestamp(value: &str) -> bool {
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    (value.len() == 10 && value.starts_with('1')) || value.len() >= 20
}

/// Compiled patterns plus the configuration they came from
///
/// Rebuilt on every successful reconfiguration and shared read-only between
/// concurrent `apply` calls.
pub struct PIIDetector {
    config: PIIConfig,
    patterns: CompiledPatterns,
}

impl PIIDetector {
    pub fn new(config: PIIConfig) -> Result<Self> {
        let patterns = compile_patterns(&config)?;
        Ok(Self { config, patterns })
    }

    pub fn from_config_map(map: &ConfigMap) -> Result<Self> {
        Self::new(PIIConfig::from_config_map(map)?)
    }

    pub fn config(&self) -> &PIIConfig {
        &self.config
    }

    /// Detect and mask PII in one string
    pub fn process_text<'a>(&self, text: &'a str) -> (Vec<FilterViolation>, Cow<'a, str>) {
        let mut detections = detect_pii(text, &self.patterns, &self.config);
        let masked = masking::mask_pii(text, &mut detections, &self.config);
        let violations = detections
            .into_iter()
            .map(|d| self.to_violation(d))
            .collect();
        (violations, masked)
    }

    /// Process nested data structures (objects, arrays, strings)
    ///
    /// Returns the rewritten value when any string leaf was masked. Each
    /// violation carries the JSON path of its leaf under `metadata.path`.
    pub fn process_nested(
        &self,
        data: &Value,
        path: &str,
        violations: &mut Vec<FilterViolation>,
    ) -> Option<Value> {
        match data {
            Value::String(text) => {
                let (found, masked) = self.process_text(text);
                if found.is_empty() {
                    return None;
                }
                violations.extend(found.into_iter().map(|mut v| {
                    v.metadata
                        .insert("path".to_string(), Value::String(path.to_string()));
                    v
                }));
                Some(Value::String(masked.into_owned()))
            }

            Value::Object(map) => {
                let mut modified = false;
                let mut new_map = map.clone();

                for (key, value) in map {
                    let new_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", path, key)
                    };

                    if let Some(new_value) = self.process_nested(value, &new_path, violations) {
                        modified = true;
                        new_map.insert(key.clone(), new_value);
                    }
                }

                modified.then_some(Value::Object(new_map))
            }

            Value::Array(items) => {
                let mut modified = false;
                let mut new_items = items.clone();

                for (idx, item) in items.iter().enumerate() {
                    let new_path = format!("{}[{}]", path, idx);
                    if let Some(new_item) = self.process_nested(item, &new_path, violations) {
                        modified = true;
                        new_items[idx] = new_item;
                    }
                }

                modified.then_some(Value::Array(new_items))
            }

            // Other types: no processing
            _ => None,
        }
    }

    fn to_violation(&self, detection: Detection) -> FilterViolation {
        let pattern = &self.patterns.patterns[detection.pattern_index];
        let mut violation = FilterViolation::new(
            pattern.name.clone(),
            pattern.regex.as_str(),
            detection.value,
            detection.start,
            pattern.severity.clone(),
        );
        violation.replacement = detection.replacement;
        violation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pii_filter::config::CustomPattern;
    use serde_json::json;
    use std::collections::HashMap;

    fn detector(names: &[&str]) -> PIIDetector {
        PIIDetector::new(PIIConfig {
            patterns: names.iter().map(|n| (n.to_string(), true)).collect(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_detect_ssn() {
        let detector = detector(&["ssn"]);
        let (violations, masked) = detector.process_text("My SSN is 123-45-6789");

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].violation_type, "ssn");
        assert_eq!(violations[0].matched, "123-45-6789");
        assert_eq!(violations[0].position, 10);
        assert_eq!(violations[0].severity, "medium");
        assert_eq!(masked, "My SSN is [REDACTED]");
    }

    #[test]
    fn test_detect_email() {
        let detector = detector(&["email"]);
        let (violations, _) = detector.process_text("Contact: john.doe@example.com");

        assert_eq!(violations[0].violation_type, "email");
        assert_eq!(violations[0].matched, "john.doe@example.com");
    }

    #[test]
    fn test_repeated_value_positions() {
        let detector = detector(&["ssn"]);
        let text = "123-45-6789 and again 123-45-6789";
        let (violations, masked) = detector.process_text(text);

        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].position, 0);
        assert_eq!(violations[1].position, 22);
        assert_eq!(masked, "[REDACTED] and again [REDACTED]");
    }

    #[test]
    fn test_no_overlap() {
        let detector = PIIDetector::new(PIIConfig {
            patterns: HashMap::from([("ssn".to_string(), true)]),
            custom_patterns: vec![CustomPattern {
                name: "fragment".to_string(),
                pattern: r"\d{2}-\d{4}".to_string(),
                enabled: true,
                severity: "low".to_string(),
                description: String::new(),
            }],
            ..Default::default()
        })
        .unwrap();

        // The custom match sits inside the SSN, so only the SSN is reported
        let (violations, masked) = detector.process_text("123-45-6789");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].violation_type, "ssn");
        assert_eq!(masked, "[REDACTED]");
    }

    #[test]
    fn test_whitelist() {
        let detector = PIIDetector::new(PIIConfig {
            patterns: HashMap::from([("email".to_string(), true)]),
            whitelist_patterns: vec![r"^noreply@example\.com$".to_string()],
            ..Default::default()
        })
        .unwrap();

        let (violations, _) =
            detector.process_text("from noreply@example.com to jane@example.com");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].matched, "jane@example.com");
    }

    #[test]
    fn test_timing_values_skipped() {
        let detector = detector(&["ssn"]);
        let (violations, _) = detector.process_text(r#"{"timeout": 123456789}"#);
        assert!(violations.is_empty());

        let (violations, _) = detector.process_text(r#"{"account": 123456789}"#);
        assert_eq!(violations.len(), 1);
    }

    #[test]
    fn test_timing_values_kept_when_disabled() {
        let detector = PIIDetector::new(PIIConfig {
            patterns: HashMap::from([("ssn".to_string(), true)]),
            skip_timing_values: false,
            ..Default::default()
        })
        .unwrap();
        let (violations, _) = detector.process_text(r#"{"timeout": 123456789}"#);
        assert_eq!(violations.len(), 1);
    }

    #[test]
    fn test_is_duration_or_timestamp() {
        assert!(is_duration_or_timestamp("1700000000"));
        assert!(is_duration_or_timestamp("12345678901234567890"));
        assert!(!is_duration_or_timestamp("4111111111111111"));
        assert!(!is_duration_or_timestamp("2700000000"));
    }

    #[test]
    fn test_custom_pattern_severity() {
        let detector = PIIDetector::new(PIIConfig {
            custom_patterns: vec![CustomPattern {
                name: "employee_id".to_string(),
                pattern: r"EMP-\d{6}".to_string(),
                enabled: true,
                severity: "high".to_string(),
                description: "Employee id".to_string(),
            }],
            ..Default::default()
        })
        .unwrap();

        let (violations, _) = detector.process_text("badge EMP-004211 issued");
        assert_eq!(violations[0].violation_type, "employee_id");
        assert_eq!(violations[0].severity, "high");
    }

    #[test]
    fn test_process_nested() {
        let detector = detector(&["email"]);
        let data = json!({
            "user": {"emails": ["a@example.com", "plain"], "age": 40},
            "note": "nothing"
        });

        let mut violations = Vec::new();
        let masked = detector.process_nested(&data, "", &mut violations).unwrap();

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].metadata["path"], json!("user.emails[0]"));
        assert_eq!(masked["user"]["emails"][0], json!("[REDACTED]"));
        assert_eq!(masked["user"]["emails"][1], json!("plain"));
        assert_eq!(masked["note"], json!("nothing"));
    }

    #[test]
    fn test_process_nested_clean() {
        let detector = detector(&["email"]);
        let mut violations = Vec::new();
        assert!(detector
            .process_nested(&json!({"a": ["b", 1, null]}), "", &mut violations)
            .is_none());
        assert!(violations.is_empty());
    }
}
