// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Content filtering pipeline for MCP Gateway traffic

//! Content filters inspect MCP request and response payloads.
//!
//! A filter receives a [`FilterContext`] (who, where, which direction) and a
//! [`FilterContent`] (the payload), and returns a [`FilterResult`] plus the
//! possibly-masked content. [`FilterChain`] runs several filters in priority
//! order and merges their results.
//!
//! # Examples
//!
//! ```
//! use content_filters::{
//!     Filter, FilterAction, FilterContent, FilterContext, FilterDirection, FilterFactory,
//!     PIIFilterFactory,
//! };
//! use serde_json::json;
//!
//! let config = json!({
//!     "patterns": {"email": true},
//!     "masking_strategy": "partial",
//!     "action": "warn"
//! });
//! let filter = PIIFilterFactory.create(config.as_object().unwrap()).unwrap();
//!
//! let ctx = FilterContext::new("req-1", "org-1", FilterDirection::Outbound);
//! let content = FilterContent::from_raw("Contact john.doe@example.com");
//! let (result, masked) = filter.apply(&ctx, &content).unwrap();
//!
//! assert_eq!(result.action, FilterAction::Warn);
//! assert!(!result.blocked);
//! assert_eq!(masked.raw, "Contact jo****************om");
//! ```

pub mod base;
pub mod chain;
pub mod error;
pub mod filter;
pub mod pii_filter;
pub mod registry;
pub mod types;
pub mod utils;

pub use base::BaseFilter;
pub use chain::{ChainConfig, ChainMetrics, ChainOutput, ErrorPolicy, FilterChain};
pub use error::{ErrorKind, FilterError, Result};
pub use filter::{Filter, FilterFactory, FilterOutput};
pub use pii_filter::{MaskingStrategy, PIIConfig, PIIFilter, PIIFilterFactory};
pub use registry::{FilterInfo, FilterRegistry};
pub use types::{
    ConfigMap, FilterAction, FilterCapabilities, FilterContent, FilterContext, FilterDirection,
    FilterResult, FilterStat, FilterType, FilterViolation, TransportType,
};
pub use utils::{
    apply_filter_with_timing, merge_filter_results, validate_filter_content,
    validate_filter_context,
};
