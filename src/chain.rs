// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Priority-ordered filter chain with aggregate metrics

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::error::{FilterError, Result};
use crate::filter::Filter;
use crate::types::{FilterAction, FilterContent, FilterContext, FilterResult, FilterStat};
use crate::utils::{
    apply_filter_with_timing, merge_filter_results, validate_filter_content,
    validate_filter_context,
};

/// What the chain does when a filter returns an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Record the error and continue with the content as it was
    FailOpen,
    /// Record the error and block the payload
    #[default]
    FailClosed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub error_policy: ErrorPolicy,
    /// Skip the remaining filters once one blocks
    pub stop_on_block: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            error_policy: ErrorPolicy::FailClosed,
            stop_on_block: true,
        }
    }
}

/// Aggregate counters across every payload the chain processed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainMetrics {
    pub total_requests: u64,
    pub total_blocked: u64,
    pub total_modified: u64,
    pub total_errors: u64,
    pub violations_by_type: HashMap<String, u64>,
    /// Running average over `total_requests`
    pub processing_time: Duration,
    pub filter_stats: HashMap<String, FilterStat>,
    pub last_reset: DateTime<Utc>,
}

impl Default for ChainMetrics {
    fn default() -> Self {
        Self {
            total_requests: 0,
            total_blocked: 0,
            total_modified: 0,
            total_errors: 0,
            violations_by_type: HashMap::new(),
            processing_time: Duration::ZERO,
            filter_stats: HashMap::new(),
            last_reset: Utc::now(),
        }
    }
}

/// Outcome of running the chain over one payload
#[derive(Debug)]
pub struct ChainOutput<'a> {
    /// Merged decision
    pub result: FilterResult,
    /// Per-filter results in execution order
    pub results: Vec<FilterResult>,
    /// Content after the last modifying filter
    pub content: Cow<'a, FilterContent>,
}

/// Runs filters in ascending priority, feeding each one the previous
/// filter's output
pub struct FilterChain {
    config: ChainConfig,
    filters: RwLock<Vec<Arc<dyn Filter>>>,
    metrics: Mutex<ChainMetrics>,
}

impl Default for FilterChain {
    fn default() -> Self {
        Self::new(ChainConfig::default())
    }
}

impl FilterChain {
    pub fn new(config: ChainConfig) -> Self {
        Self {
            config,
            filters: RwLock::new(Vec::new()),
            metrics: Mutex::new(ChainMetrics::default()),
        }
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn add_filter(&self, filter: Arc<dyn Filter>) -> Result<()> {
        if filter.name().is_empty() {
            return Err(FilterError::invalid_config("name", "filter name cannot be empty"));
        }

        let mut filters = self.filters.write();
        if filters.iter().any(|f| f.name() == filter.name()) {
            return Err(FilterError::DuplicateFilter(filter.name().to_string()));
        }
        filters.push(filter);
        Ok(())
    }

    pub fn remove_filter(&self, name: &str) -> Result<Arc<dyn Filter>> {
        let mut filters = self.filters.write();
        let index = filters
            .iter()
            .position(|f| f.name() == name)
            .ok_or_else(|| FilterError::FilterNotFound(name.to_string()))?;
        Ok(filters.remove(index))
    }

    pub fn get_filter(&self, name: &str) -> Result<Arc<dyn Filter>> {
        self.filters
            .read()
            .iter()
            .find(|f| f.name() == name)
            .cloned()
            .ok_or_else(|| FilterError::FilterNotFound(name.to_string()))
    }

    /// Every filter, in insertion order
    pub fn filters(&self) -> Vec<Arc<dyn Filter>> {
        self.filters.read().clone()
    }

    pub fn set_filter_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        self.get_filter(name)?.set_enabled(enabled);
        Ok(())
    }

    /// Re-validate every filter's live configuration
    pub fn validate_filters(&self) -> Result<()> {
        for filter in self.filters() {
            filter.validate()?;
        }
        Ok(())
    }

    /// Enabled filters sorted by priority; ties keep insertion order
    fn active_filters(&self) -> Vec<Arc<dyn Filter>> {
        let mut active: Vec<Arc<dyn Filter>> = self
            .filters
            .read()
            .iter()
            .filter(|f| f.is_enabled())
            .cloned()
            .collect();
        active.sort_by_key(|f| f.priority());
        active
    }

    pub fn apply<'a>(
        &self,
        ctx: &FilterContext,
        content: &'a FilterContent,
    ) -> Result<ChainOutput<'a>> {
        validate_filter_context(Some(ctx))?;
        validate_filter_content(Some(content))?;

        let start = Instant::now();
        let mut current: Cow<'a, FilterContent> = Cow::Borrowed(content);
        let mut results = Vec::new();
        let mut errors = 0u64;

        for filter in self.active_filters() {
            let capabilities = filter.capabilities();
            if !capabilities.supports_direction(ctx.direction)
                || !capabilities.supports_content_type(&ctx.content_type)
            {
                continue;
            }

            let (output, elapsed) = apply_filter_with_timing(filter.as_ref(), ctx, &current);
            let (result, replacement) = match output {
                Ok((result, out)) => {
                    filter.update_stats(
                        result.blocked,
                        result.modified,
                        result.violations.len(),
                        elapsed,
                        false,
                    );
                    let replacement = match out {
                        Cow::Owned(modified) => Some(modified),
                        Cow::Borrowed(_) => None,
                    };
                    (result, replacement)
                }
                Err(err) => {
                    filter.update_stats(false, false, 0, elapsed, true);
                    errors += 1;

                    match self.config.error_policy {
                        ErrorPolicy::FailOpen => {
                            warn!(
                                filter = %filter.name(),
                                request_id = %ctx.request_id,
                                error = %err,
                                policy = "fail_open",
                                "filter failed, continuing"
                            );
                            continue;
                        }
                        ErrorPolicy::FailClosed => {
                            warn!(
                                filter = %filter.name(),
                                request_id = %ctx.request_id,
                                error = %err,
                                policy = "fail_closed",
                                "filter failed, blocking"
                            );
                            let mut result = FilterResult::new(
                                true,
                                false,
                                FilterAction::Block,
                                format!("filter '{}' failed: {}", filter.name(), err),
                                Vec::new(),
                            );
                            result
                                .metadata
                                .insert("failed_filter".to_string(), filter.name().into());
                            results.push(result);
                            break;
                        }
                    }
                }
            };

            if let Some(modified) = replacement {
                current = Cow::Owned(modified);
            }

            let blocked = result.blocked;
            results.push(result);

            if blocked && self.config.stop_on_block {
                break;
            }
        }

        self.record(&results, errors, start.elapsed());

        let merged = merge_filter_results(results.clone());
        if merged.blocked {
            warn!(
                request_id = %ctx.request_id,
                organization_id = %ctx.organization_id,
                direction = %ctx.direction,
                violations = merged.violations.len(),
                reason = %merged.reason,
                "content blocked"
            );
        } else if results
            .iter()
            .any(|r| matches!(r.action, FilterAction::Warn | FilterAction::Audit))
        {
            info!(
                request_id = %ctx.request_id,
                organization_id = %ctx.organization_id,
                direction = %ctx.direction,
                violations = merged.violations.len(),
                reason = %merged.reason,
                "content flagged"
            );
        }

        Ok(ChainOutput {
            result: merged,
            results,
            content: current,
        })
    }

    fn record(&self, results: &[FilterResult], errors: u64, elapsed: Duration) {
        let mut metrics = self.metrics.lock();

        metrics.total_requests += 1;
        metrics.total_errors += errors;
        if results.iter().any(|r| r.blocked) {
            metrics.total_blocked += 1;
        }
        if results.iter().any(|r| r.modified) {
            metrics.total_modified += 1;
        }
        for violation in results.iter().flat_map(|r| &r.violations) {
            *metrics
                .violations_by_type
                .entry(violation.violation_type.clone())
                .or_insert(0) += 1;
        }

        let avg = metrics.processing_time.as_nanos() as i128;
        let sample = elapsed.as_nanos() as i128;
        let next = avg + (sample - avg) / metrics.total_requests as i128;
        metrics.processing_time = Duration::from_nanos(next.clamp(0, u64::MAX as i128) as u64);
    }

    /// Snapshot of the chain counters with fresh per-filter stats
    pub fn metrics(&self) -> ChainMetrics {
        let mut snapshot = self.metrics.lock().clone();
        snapshot.filter_stats = self
            .filters()
            .iter()
            .map(|f| (f.name().to_string(), f.stats()))
            .collect();
        snapshot
    }

    /// Zero the chain counters and every filter's stats
    pub fn reset_metrics(&self) {
        *self.metrics.lock() = ChainMetrics::default();
        for filter in self.filters() {
            filter.reset_stats();
        }
    }
}
