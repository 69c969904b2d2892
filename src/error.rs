// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Error types for the content filtering pipeline

use thiserror::Error;

use crate::types::FilterType;

/// Broad classification used by callers to decide how to surface an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad configuration or a malformed event; resubmit corrected input
    Validation,
    /// Unexpected failure while a filter was running
    Internal,
}

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid {field}: {message}")]
    InvalidConfig { field: String, message: String },

    #[error("invalid regex pattern '{name}' in {field}: {source}")]
    InvalidPattern {
        field: String,
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid filter content: {0}")]
    InvalidContent(String),

    #[error("invalid filter context: {0}")]
    InvalidContext(String),

    #[error("filter type '{0}' is already registered")]
    AlreadyRegistered(FilterType),

    #[error("filter type '{0}' not found")]
    UnknownFilterType(FilterType),

    #[error("filter '{0}' not found")]
    FilterNotFound(String),

    #[error("filter '{0}' is already registered")]
    DuplicateFilter(String),

    #[error("filter '{filter}' failed: {message}")]
    Internal { filter: String, message: String },
}

impl FilterError {
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        FilterError::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FilterError::Internal { .. } => ErrorKind::Internal,
            _ => ErrorKind::Validation,
        }
    }
}

pub type Result<T> = std::result::Result<T, FilterError>;
