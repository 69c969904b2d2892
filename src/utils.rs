// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Result aggregation and input validation used by chain executors

use std::time::{Duration, Instant};

use crate::error::{FilterError, Result};
use crate::filter::{Filter, FilterOutput};
use crate::types::{FilterAction, FilterContent, FilterContext, FilterResult};

/// Combine per-filter results into one decision
///
/// - no results: allow
/// - one result: returned unchanged
/// - several: blocked/modified are OR-ed, violations concatenated in input
///   order, metadata merged with later keys winning, reasons joined
pub fn merge_filter_results(mut results: Vec<FilterResult>) -> FilterResult {
    match results.len() {
        0 => return FilterResult::allow(),
        1 => return results.remove(0),
        _ => {}
    }

    let mut merged = FilterResult::allow();
    let mut reasons = Vec::new();

    for result in results {
        if result.blocked {
            merged.blocked = true;
            merged.action = FilterAction::Block;
        }
        merged.modified |= result.modified;
        merged.violations.extend(result.violations);
        merged.metadata.extend(result.metadata);
        if !result.reason.is_empty() {
            reasons.push(result.reason);
        }
    }

    if !reasons.is_empty() {
        merged.reason = format!("Multiple filter violations: {}", reasons.join("; "));
    }

    merged
}

/// Run `filter.apply` and measure wall-clock time
///
/// The elapsed time is returned even when the filter fails, so the caller
/// can still record the attempt with `update_stats`.
pub fn apply_filter_with_timing<'a>(
    filter: &dyn Filter,
    ctx: &FilterContext,
    content: &'a FilterContent,
) -> (Result<FilterOutput<'a>>, Duration) {
    let start = Instant::now();
    let output = filter.apply(ctx, content);
    (output, start.elapsed())
}

pub fn validate_filter_content(content: Option<&FilterContent>) -> Result<()> {
    let content = content
        .ok_or_else(|| FilterError::InvalidContent("filter content cannot be nil".to_string()))?;

    if content.is_empty() {
        return Err(FilterError::InvalidContent(
            "filter content must have either raw or parsed data".to_string(),
        ));
    }

    Ok(())
}

/// Direction is an enum here, so an unrecognised value is rejected when the
/// context is built (see `FilterDirection::from_str`)
pub fn validate_filter_context(ctx: Option<&FilterContext>) -> Result<()> {
    let ctx = ctx
        .ok_or_else(|| FilterError::InvalidContext("filter context cannot be nil".to_string()))?;

    if ctx.request_id.is_empty() {
        return Err(FilterError::InvalidContext(
            "filter context must have a request ID".to_string(),
        ));
    }

    if ctx.organization_id.is_empty() {
        return Err(FilterError::InvalidContext(
            "filter context must have an organization ID".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::BaseFilter;
    use crate::types::{FilterDirection, FilterType, FilterViolation};
    use serde_json::json;

    fn result(blocked: bool, modified: bool, action: FilterAction, reason: &str) -> FilterResult {
        FilterResult::new(blocked, modified, action, reason, Vec::new())
    }

    #[test]
    fn test_merge_empty() {
        let merged = merge_filter_results(Vec::new());
        assert!(!merged.blocked);
        assert!(!merged.modified);
        assert_eq!(merged.action, FilterAction::Allow);
        assert!(merged.violations.is_empty());
    }

    #[test]
    fn test_merge_single_is_identity() {
        let mut only = result(false, true, FilterAction::Warn, "pii");
        only.violations
            .push(FilterViolation::new("ssn", "x", "y", 3, "high"));
        only.metadata.insert("k".to_string(), json!(1));

        let merged = merge_filter_results(vec![only.clone()]);
        assert_eq!(merged, only);
    }

    #[test]
    fn test_merge_many() {
        let mut first = result(false, true, FilterAction::Warn, "first");
        first.violations.push(FilterViolation::new("ssn", "", "a", 0, "medium"));
        first.metadata.insert("shared".to_string(), json!("first"));
        first.metadata.insert("only_first".to_string(), json!(true));

        let mut second = result(true, false, FilterAction::Block, "second");
        second.violations.push(FilterViolation::new("email", "", "b", 1, "low"));
        second.metadata.insert("shared".to_string(), json!("second"));

        let third = result(false, false, FilterAction::Allow, "");

        let merged = merge_filter_results(vec![first, second, third]);
        assert!(merged.blocked);
        assert!(merged.modified);
        assert_eq!(merged.action, FilterAction::Block);
        let types: Vec<&str> = merged
            .violations
            .iter()
            .map(|v| v.violation_type.as_str())
            .collect();
        assert_eq!(types, vec!["ssn", "email"]);
        assert_eq!(merged.metadata["shared"], json!("second"));
        assert_eq!(merged.metadata["only_first"], json!(true));
        assert!(merged.reason.contains("first"));
        assert!(merged.reason.contains("second"));
    }

    #[test]
    fn test_merge_without_block_allows() {
        let merged = merge_filter_results(vec![
            result(false, false, FilterAction::Warn, ""),
            result(false, false, FilterAction::Audit, ""),
        ]);
        assert!(!merged.blocked);
        assert_eq!(merged.action, FilterAction::Allow);
        assert!(merged.reason.is_empty());
    }

    #[test]
    fn test_apply_with_timing() {
        let filter = BaseFilter::new(FilterType::Regex, "noop", 1);
        let ctx = FilterContext::new("r", "o", FilterDirection::Outbound);
        let content = FilterContent::from_raw("data");

        let (output, elapsed) = apply_filter_with_timing(&filter, &ctx, &content);
        let (result, out) = output.unwrap();
        assert_eq!(result.action, FilterAction::Allow);
        assert_eq!(out.raw, "data");
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn test_validate_content() {
        assert!(validate_filter_content(None).is_err());
        assert!(validate_filter_content(Some(&FilterContent::default())).is_err());
        assert!(validate_filter_content(Some(&FilterContent::from_raw("x"))).is_ok());
        assert!(validate_filter_content(Some(&FilterContent::from_parsed(json!([1])))).is_ok());
    }

    #[test]
    fn test_validate_context() {
        assert!(validate_filter_context(None).is_err());

        let ok = FilterContext::new("req", "org", FilterDirection::Inbound);
        assert!(validate_filter_context(Some(&ok)).is_ok());

        let no_request = FilterContext::new("", "org", FilterDirection::Inbound);
        let err = validate_filter_context(Some(&no_request)).unwrap_err();
        assert!(err.to_string().contains("request ID"));

        let no_org = FilterContext::new("req", "", FilterDirection::Inbound);
        let err = validate_filter_context(Some(&no_org)).unwrap_err();
        assert!(err.to_string().contains("organization ID"));
    }
}
