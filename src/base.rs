// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Shared lifecycle and statistics state embedded by every filter

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{FilterError, Result};
use crate::filter::{Filter, FilterOutput};
use crate::types::{
    ConfigMap, FilterAction, FilterCapabilities, FilterContent, FilterContext, FilterResult,
    FilterStat, FilterType,
};

struct State {
    priority: i32,
    enabled: bool,
    // Replaced wholesale on every successful configure
    config: Arc<ConfigMap>,
    capabilities: FilterCapabilities,
    stats: FilterStat,
}

/// Checks a candidate configuration and installs anything derived from it
///
/// Runs under the base write lock, before the candidate goes live.
pub type ConfigHook = Box<dyn Fn(&ConfigMap) -> Result<()> + Send + Sync>;

/// Name, type, priority, enabled flag, configuration, capabilities and stats
///
/// All mutable state sits behind one reader/writer lock. Readers always get
/// copies, never references into the live state.
pub struct BaseFilter {
    filter_type: FilterType,
    name: String,
    config_hook: Option<ConfigHook>,
    state: RwLock<State>,
}

impl BaseFilter {
    pub fn new(filter_type: FilterType, name: impl Into<String>, priority: i32) -> Self {
        let name = name.into();
        Self {
            filter_type,
            state: RwLock::new(State {
                priority,
                enabled: true,
                config: Arc::new(ConfigMap::new()),
                capabilities: FilterCapabilities::default(),
                stats: FilterStat::new(name.clone(), filter_type),
            }),
            name,
            config_hook: None,
        }
    }

    /// Run `hook` on every candidate configuration; a hook error rejects it
    pub fn with_config_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ConfigMap) -> Result<()> + Send + Sync + 'static,
    {
        self.config_hook = Some(Box::new(hook));
        self
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.state.read().priority
    }

    pub fn set_priority(&self, priority: i32) {
        self.state.write().priority = priority;
    }

    pub fn is_enabled(&self) -> bool {
        self.state.read().enabled
    }

    pub fn set_enabled(&self, enabled: bool) {
        let mut state = self.state.write();
        state.enabled = enabled;
        let mut config = (*state.config).clone();
        config.insert("enabled".to_string(), Value::Bool(enabled));
        state.config = Arc::new(config);
    }

    pub fn config(&self) -> ConfigMap {
        (*self.state.read().config).clone()
    }

    /// Merge `config` over the live configuration, validating first
    pub fn set_config(&self, config: &ConfigMap) -> Result<()> {
        self.configure(config)
    }

    /// Merge `config` into a candidate, run the config hook on it, and only
    /// then make the candidate live
    ///
    /// The hook runs under the write lock so a concurrent reader sees either
    /// the old configuration or the new one. `enabled` and `priority` keys in
    /// `config` also update the matching flags.
    pub fn configure(&self, config: &ConfigMap) -> Result<()> {
        let mut state = self.state.write();

        let mut candidate = (*state.config).clone();
        for (key, value) in config {
            candidate.insert(key.clone(), value.clone());
        }
        candidate
            .entry("enabled".to_string())
            .or_insert(Value::Bool(true));

        let (enabled, priority) = lifecycle_keys(config)?;

        if let Some(hook) = &self.config_hook {
            hook(&candidate)?;
        }

        state.config = Arc::new(candidate);
        if let Some(enabled) = enabled {
            state.enabled = enabled;
        }
        if let Some(priority) = priority {
            state.priority = priority;
        }
        debug!(filter = %self.name, "configuration updated");
        Ok(())
    }

    /// Base check: the `enabled` key defaults to true
    pub fn validate(&self) -> Result<()> {
        let mut state = self.state.write();
        if !state.config.contains_key("enabled") {
            let mut config = (*state.config).clone();
            config.insert("enabled".to_string(), Value::Bool(true));
            state.config = Arc::new(config);
        }
        Ok(())
    }

    pub fn capabilities(&self) -> FilterCapabilities {
        self.state.read().capabilities.clone()
    }

    pub fn set_capabilities(&self, capabilities: FilterCapabilities) {
        self.state.write().capabilities = capabilities;
    }

    pub fn stats(&self) -> FilterStat {
        self.state.read().stats.clone()
    }

    pub fn update_stats(
        &self,
        blocked: bool,
        modified: bool,
        violations: usize,
        latency: Duration,
        had_error: bool,
    ) {
        let mut state = self.state.write();
        let stats = &mut state.stats;

        stats.requests_processed += 1;
        stats.violations += violations as u64;
        stats.last_active = Utc::now();
        if blocked {
            stats.blocks += 1;
        }
        if modified {
            stats.modifications += 1;
        }
        if had_error {
            stats.errors += 1;
        }

        // avg += (latency - avg) / n
        let avg = stats.average_latency.as_nanos() as i128;
        let sample = latency.as_nanos() as i128;
        let next = avg + (sample - avg) / stats.requests_processed as i128;
        stats.average_latency = Duration::from_nanos(next.clamp(0, u64::MAX as i128) as u64);
    }

    pub fn reset_stats(&self) {
        let mut state = self.state.write();
        state.stats = FilterStat::new(self.name.clone(), self.filter_type);
    }
}

/// Typed `enabled` and `priority` keys of a configuration, when present
pub fn lifecycle_keys(config: &ConfigMap) -> Result<(Option<bool>, Option<i32>)> {
    let enabled = match config.get("enabled") {
        None => None,
        Some(Value::Bool(b)) => Some(*b),
        Some(_) => return Err(FilterError::invalid_config("enabled", "must be a boolean")),
    };
    let priority = match config.get("priority") {
        None => None,
        Some(value) => Some(
            value
                .as_i64()
                .and_then(|p| i32::try_from(p).ok())
                .ok_or_else(|| FilterError::invalid_config("priority", "must be an integer"))?,
        ),
    };
    Ok((enabled, priority))
}

impl Filter for BaseFilter {
    fn base(&self) -> &BaseFilter {
        self
    }

    /// No detection logic: always allows, content untouched
    fn apply<'a>(
        &self,
        _ctx: &FilterContext,
        content: &'a FilterContent,
    ) -> Result<FilterOutput<'a>> {
        Ok((
            FilterResult::new(
                false,
                false,
                FilterAction::Allow,
                "base filter - no implementation",
                Vec::new(),
            ),
            Cow::Borrowed(content),
        ))
    }
}
