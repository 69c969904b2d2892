// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// PII content filter: detection, masking and action policy

use parking_lot::RwLock;
use serde_json::Value;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::info;

use super::config::PIIConfig;
use super::detector::PIIDetector;
use crate::base::BaseFilter;
use crate::error::Result;
use crate::filter::{Filter, FilterOutput};
use crate::types::{
    ConfigMap, FilterAction, FilterCapabilities, FilterContent, FilterContext, FilterResult,
    FilterType,
};

pub const DEFAULT_PRIORITY: i32 = 10;

/// Detects PII in raw or parsed payloads and masks every match
///
/// Example:
/// ```
/// use content_filters::{Filter, FilterContent, FilterContext, FilterDirection, PIIFilter};
/// use serde_json::json;
///
/// let config = json!({
///     "patterns": {"ssn": true},
///     "masking_strategy": "redact",
///     "action": "block"
/// });
/// let filter = PIIFilter::new("pii", config.as_object().unwrap()).unwrap();
///
/// let ctx = FilterContext::new("req-1", "org-1", FilterDirection::Inbound);
/// let content = FilterContent::from_raw("My SSN is 123-45-6789");
/// let (result, masked) = filter.apply(&ctx, &content).unwrap();
///
/// assert!(result.blocked);
/// assert_eq!(masked.raw, "My SSN is [REDACTED]");
/// ```
pub struct PIIFilter {
    base: BaseFilter,
    // Swapped by the base config hook whenever a configuration goes live
    detector: Arc<RwLock<Arc<PIIDetector>>>,
}

impl PIIFilter {
    pub fn new(name: impl Into<String>, config: &ConfigMap) -> Result<Self> {
        let detector = Arc::new(RwLock::new(Arc::new(PIIDetector::new(
            PIIConfig::default(),
        )?)));

        let slot = Arc::clone(&detector);
        let base = BaseFilter::new(FilterType::Pii, name, DEFAULT_PRIORITY).with_config_hook(
            move |candidate| {
                let compiled = PIIDetector::from_config_map(candidate)?;
                *slot.write() = Arc::new(compiled);
                Ok(())
            },
        );
        base.set_capabilities(Self::default_capabilities());
        base.configure(config)?;

        Ok(Self { base, detector })
    }

    pub fn default_capabilities() -> FilterCapabilities {
        FilterCapabilities {
            supports_inbound: true,
            supports_outbound: true,
            supports_modification: true,
            supports_blocking: true,
            supported_content_types: vec!["*".to_string()],
            supports_realtime: true,
            supports_batch: true,
        }
    }

    /// Typed view of the live configuration
    pub fn pii_config(&self) -> PIIConfig {
        self.detector.read().config().clone()
    }

    fn detector(&self) -> Arc<PIIDetector> {
        Arc::clone(&self.detector.read())
    }
}

impl Filter for PIIFilter {
    fn base(&self) -> &BaseFilter {
        &self.base
    }

    fn apply<'a>(
        &self,
        ctx: &FilterContext,
        content: &'a FilterContent,
    ) -> Result<FilterOutput<'a>> {
        if !self.is_enabled() {
            return Ok((FilterResult::allow(), Cow::Borrowed(content)));
        }

        let detector = self.detector();
        let config = detector.config();

        let mut violations = Vec::new();
        let masked_content = match &content.parsed {
            Some(parsed) if content.raw.is_empty() => detector
                .process_nested(parsed, "", &mut violations)
                .filter(|new_parsed| new_parsed != parsed)
                .map(|new_parsed| FilterContent {
                    parsed: Some(new_parsed),
                    ..content.clone()
                }),
            _ => {
                let (found, masked) = detector.process_text(&content.raw);
                violations = found;
                match masked {
                    // A replacement can coincide with the text it replaced
                    Cow::Owned(raw) if raw != content.raw => Some(FilterContent {
                        raw,
                        ..content.clone()
                    }),
                    _ => None,
                }
            }
        };

        if violations.is_empty() {
            return Ok((FilterResult::allow(), Cow::Borrowed(content)));
        }

        let count = violations.len();
        let (blocked, reason) = match config.action {
            FilterAction::Block => (true, format!("PII detected: {} violations found", count)),
            FilterAction::Warn => (
                false,
                format!("PII detected: {} violations found (warning)", count),
            ),
            FilterAction::Audit => (
                false,
                format!("PII detected: {} violations logged for audit", count),
            ),
            FilterAction::Allow => (false, format!("PII detected: {} violations masked", count)),
        };

        if config.log_violations {
            let mut types: Vec<&str> = violations
                .iter()
                .map(|v| v.violation_type.as_str())
                .collect();
            types.dedup();
            info!(
                filter = %self.name(),
                request_id = %ctx.request_id,
                organization_id = %ctx.organization_id,
                direction = %ctx.direction,
                violations = count,
                types = ?types,
                action = %config.action,
                "PII detected"
            );
        }

        let modified = masked_content.is_some();
        let mut result = FilterResult::new(blocked, modified, config.action, reason, violations);
        result.metadata.insert(
            "masking_strategy".to_string(),
            Value::String(config.masking_strategy.as_str().to_string()),
        );

        let output = match masked_content {
            Some(masked) => Cow::Owned(masked),
            None => Cow::Borrowed(content),
        };
        Ok((result, output))
    }

    fn validate(&self) -> Result<()> {
        self.base.validate()?;
        PIIDetector::from_config_map(&self.base.config()).map(|_| ())
    }
}
