// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Value types shared by every content filter

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::FilterError;

/// Untyped filter configuration as exchanged with the admin API
pub type ConfigMap = serde_json::Map<String, Value>;

/// Category of a content filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    Pii,
    Resource,
    Deny,
    Regex,
}

impl FilterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterType::Pii => "pii",
            FilterType::Resource => "resource",
            FilterType::Deny => "deny",
            FilterType::Regex => "regex",
        }
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome a filter recommends for a content item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FilterAction {
    Block,
    Warn,
    Audit,
    #[default]
    Allow,
}

impl FilterAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterAction::Block => "block",
            FilterAction::Warn => "warn",
            FilterAction::Audit => "audit",
            FilterAction::Allow => "allow",
        }
    }
}

impl fmt::Display for FilterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which way the inspected traffic flows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterDirection {
    /// Client -> MCP server
    Inbound,
    /// MCP server -> client
    Outbound,
}

impl FilterDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterDirection::Inbound => "inbound",
            FilterDirection::Outbound => "outbound",
        }
    }
}

impl fmt::Display for FilterDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterDirection {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inbound" => Ok(FilterDirection::Inbound),
            "outbound" => Ok(FilterDirection::Outbound),
            other => Err(FilterError::InvalidContext(format!(
                "invalid direction: {}",
                other
            ))),
        }
    }
}

/// Transport the inspected event arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportType {
    #[default]
    Http,
    Sse,
    Websocket,
    Streamable,
    Stdio,
}

/// Per-event metadata built by the gateway for one inspected payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterContext {
    pub request_id: String,
    pub organization_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub transport: TransportType,
    pub direction: FilterDirection,
    #[serde(default)]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl FilterContext {
    pub fn new(
        request_id: impl Into<String>,
        organization_id: impl Into<String>,
        direction: FilterDirection,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            organization_id: organization_id.into(),
            user_id: None,
            server_id: None,
            session_id: None,
            transport: TransportType::default(),
            direction,
            content_type: String::new(),
            metadata: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_server(mut self, server_id: impl Into<String>) -> Self {
        self.server_id = Some(server_id.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_transport(mut self, transport: TransportType) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

/// The payload under inspection
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterContent {
    #[serde(default)]
    pub raw: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed: Option<Value>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub params: HashMap<String, Value>,
}

impl FilterContent {
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            ..Default::default()
        }
    }

    pub fn from_parsed(parsed: Value) -> Self {
        Self {
            parsed: Some(parsed),
            ..Default::default()
        }
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_params(mut self, params: HashMap<String, Value>) -> Self {
        self.params = params;
        self
    }

    /// True when neither raw nor parsed data is present
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty() && self.parsed.as_ref().map_or(true, Value::is_null)
    }
}

/// One detected issue inside a payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterViolation {
    #[serde(rename = "type")]
    pub violation_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pattern: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub matched: String,
    /// Byte offset of the match in the scanned text
    pub position: usize,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub severity: String,
    /// Value actually substituted for the match, when masking happened
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl FilterViolation {
    pub fn new(
        violation_type: impl Into<String>,
        pattern: impl Into<String>,
        matched: impl Into<String>,
        position: usize,
        severity: impl Into<String>,
    ) -> Self {
        Self {
            violation_type: violation_type.into(),
            pattern: pattern.into(),
            matched: matched.into(),
            position,
            severity: severity.into(),
            replacement: None,
            metadata: HashMap::new(),
        }
    }
}

/// A filter's verdict on one payload
///
/// `blocked` implies `action == FilterAction::Block`; use [`FilterResult::new`]
/// to keep the two in step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterResult {
    pub blocked: bool,
    pub modified: bool,
    pub action: FilterAction,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default)]
    pub violations: Vec<FilterViolation>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
    pub processed_at: DateTime<Utc>,
}

impl FilterResult {
    pub fn new(
        blocked: bool,
        modified: bool,
        action: FilterAction,
        reason: impl Into<String>,
        violations: Vec<FilterViolation>,
    ) -> Self {
        let action = if blocked { FilterAction::Block } else { action };
        Self {
            blocked,
            modified,
            action,
            reason: reason.into(),
            violations,
            metadata: HashMap::new(),
            processed_at: Utc::now(),
        }
    }

    /// Unconditional allow: not blocked, not modified, no violations
    pub fn allow() -> Self {
        Self::new(false, false, FilterAction::Allow, "", Vec::new())
    }
}

/// Static declaration of what a filter supports
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterCapabilities {
    pub supports_inbound: bool,
    pub supports_outbound: bool,
    pub supports_modification: bool,
    pub supports_blocking: bool,
    /// Empty or containing `"*"` means every content type
    pub supported_content_types: Vec<String>,
    pub supports_realtime: bool,
    pub supports_batch: bool,
}

impl FilterCapabilities {
    pub fn supports_direction(&self, direction: FilterDirection) -> bool {
        match direction {
            FilterDirection::Inbound => self.supports_inbound,
            FilterDirection::Outbound => self.supports_outbound,
        }
    }

    pub fn supports_content_type(&self, content_type: &str) -> bool {
        self.supported_content_types.is_empty()
            || self
                .supported_content_types
                .iter()
                .any(|t| t == "*" || t == content_type)
    }
}

/// Running counters for one filter instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterStat {
    pub name: String,
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    pub requests_processed: u64,
    pub violations: u64,
    pub blocks: u64,
    pub modifications: u64,
    pub errors: u64,
    pub average_latency: Duration,
    pub last_active: DateTime<Utc>,
}

impl FilterStat {
    pub fn new(name: impl Into<String>, filter_type: FilterType) -> Self {
        Self {
            name: name.into(),
            filter_type,
            requests_processed: 0,
            violations: 0,
            blocks: 0,
            modifications: 0,
            errors: 0,
            average_latency: Duration::ZERO,
            last_active: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_direction_parse() {
        assert_eq!(
            "inbound".parse::<FilterDirection>().unwrap(),
            FilterDirection::Inbound
        );
        assert!("sideways".parse::<FilterDirection>().is_err());
    }

    #[test]
    fn test_blocked_result_forces_block_action() {
        let result = FilterResult::new(true, false, FilterAction::Warn, "", Vec::new());
        assert_eq!(result.action, FilterAction::Block);
    }

    #[test]
    fn test_content_is_empty() {
        assert!(FilterContent::default().is_empty());
        assert!(FilterContent::from_parsed(Value::Null).is_empty());
        assert!(!FilterContent::from_raw("x").is_empty());
        assert!(!FilterContent::from_parsed(json!({"a": 1})).is_empty());
    }

    #[test]
    fn test_capabilities_content_type() {
        let caps = FilterCapabilities {
            supported_content_types: vec!["application/json".to_string()],
            ..Default::default()
        };
        assert!(caps.supports_content_type("application/json"));
        assert!(!caps.supports_content_type("text/plain"));
        assert!(FilterCapabilities::default().supports_content_type("text/plain"));
    }

    #[test]
    fn test_violation_serializes_type_key() {
        let violation = FilterViolation::new("ssn", r"\d", "1", 0, "high");
        let value = serde_json::to_value(&violation).unwrap();
        assert_eq!(value["type"], "ssn");
        assert!(value.get("replacement").is_none());
    }
}
