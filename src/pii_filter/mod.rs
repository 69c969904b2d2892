// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// PII Filter
//
// PII detection and masking using:
// - RegexSet to skip patterns that cannot match
// - Copy-on-write strings so clean content is never copied
// - serde_json traversal for already-parsed payloads

pub mod config;
pub mod detector;
pub mod factory;
pub mod filter;
pub mod masking;
pub mod patterns;

pub use config::{CustomPattern, MaskingStrategy, PIIConfig};
pub use detector::PIIDetector;
pub use factory::PIIFilterFactory;
pub use filter::PIIFilter;
