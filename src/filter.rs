// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Filter and factory contracts

use serde_json::Value;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use crate::base::BaseFilter;
use crate::error::Result;
use crate::types::{
    ConfigMap, FilterCapabilities, FilterContent, FilterContext, FilterResult, FilterStat,
    FilterType,
};

/// Verdict plus the content to hand to the next filter
///
/// The content is borrowed when the filter left it untouched.
pub type FilterOutput<'a> = (FilterResult, Cow<'a, FilterContent>);

/// A content filter shared by every concurrent request
///
/// Everything except [`Filter::apply`] has a default that delegates to the
/// embedded [`BaseFilter`], so a concrete filter only supplies `base()` and
/// `apply()`, overriding `configure`/`validate` when it has typed settings.
pub trait Filter: Send + Sync {
    fn base(&self) -> &BaseFilter;

    fn apply<'a>(&self, ctx: &FilterContext, content: &'a FilterContent)
        -> Result<FilterOutput<'a>>;

    fn filter_type(&self) -> FilterType {
        self.base().filter_type()
    }

    fn name(&self) -> &str {
        self.base().name()
    }

    /// Lower runs earlier in a chain
    fn priority(&self) -> i32 {
        self.base().priority()
    }

    fn set_priority(&self, priority: i32) {
        self.base().set_priority(priority)
    }

    fn is_enabled(&self) -> bool {
        self.base().is_enabled()
    }

    fn set_enabled(&self, enabled: bool) {
        self.base().set_enabled(enabled)
    }

    /// Copy of the live configuration
    fn config(&self) -> ConfigMap {
        self.base().config()
    }

    /// Merge `config` over the live configuration; nothing changes on error
    fn configure(&self, config: &ConfigMap) -> Result<()> {
        self.base().configure(config)
    }

    /// Same checks and effect as [`Filter::configure`]
    fn set_config(&self, config: &ConfigMap) -> Result<()> {
        self.base().set_config(config)
    }

    fn validate(&self) -> Result<()> {
        self.base().validate()
    }

    fn capabilities(&self) -> FilterCapabilities {
        self.base().capabilities()
    }

    fn stats(&self) -> FilterStat {
        self.base().stats()
    }

    fn update_stats(
        &self,
        blocked: bool,
        modified: bool,
        violations: usize,
        latency: Duration,
        had_error: bool,
    ) {
        self.base()
            .update_stats(blocked, modified, violations, latency, had_error)
    }

    fn reset_stats(&self) {
        self.base().reset_stats()
    }
}

/// Builds filters of one type and describes their configuration
pub trait FilterFactory: Send + Sync {
    fn create(&self, config: &ConfigMap) -> Result<Arc<dyn Filter>>;

    fn filter_type(&self) -> FilterType;

    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Check a configuration before any filter exists
    fn validate_config(&self, config: &ConfigMap) -> Result<()>;

    fn default_config(&self) -> ConfigMap;

    /// JSON schema for the admin UI
    fn config_schema(&self) -> Value;
}
