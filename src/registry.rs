// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Caller-owned registry of filter factories

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{FilterError, Result};
use crate::filter::{Filter, FilterFactory};
use crate::pii_filter::PIIFilterFactory;
use crate::types::{ConfigMap, FilterCapabilities, FilterType};

/// Description of one registered filter type for the admin API
#[derive(Debug, Clone, Serialize)]
pub struct FilterInfo {
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    pub name: String,
    pub description: String,
    pub version: String,
    pub config_schema: Value,
    pub capabilities: FilterCapabilities,
    pub default_config: ConfigMap,
}

/// Maps filter types to their factories
///
/// There is no process-wide instance: each gateway owns its registry.
#[derive(Default)]
pub struct FilterRegistry {
    factories: RwLock<HashMap<FilterType, Arc<dyn FilterFactory>>>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every filter type this crate implements
    pub fn with_builtin_filters() -> Result<Self> {
        let registry = Self::new();
        registry.register(Arc::new(PIIFilterFactory))?;
        Ok(registry)
    }

    pub fn register(&self, factory: Arc<dyn FilterFactory>) -> Result<()> {
        if factory.name().is_empty() {
            return Err(FilterError::invalid_config(
                "name",
                "filter factory name cannot be empty",
            ));
        }

        let filter_type = factory.filter_type();
        let mut factories = self.factories.write();
        if factories.contains_key(&filter_type) {
            return Err(FilterError::AlreadyRegistered(filter_type));
        }

        debug!(filter_type = %filter_type, factory = %factory.name(), "registered filter factory");
        factories.insert(filter_type, factory);
        Ok(())
    }

    pub fn get(&self, filter_type: FilterType) -> Result<Arc<dyn FilterFactory>> {
        self.factories
            .read()
            .get(&filter_type)
            .cloned()
            .ok_or(FilterError::UnknownFilterType(filter_type))
    }

    /// Registered types, sorted by name
    pub fn list(&self) -> Vec<FilterType> {
        let mut types: Vec<FilterType> = self.factories.read().keys().copied().collect();
        types.sort_by_key(|t| t.as_str());
        types
    }

    /// Validate `config` with the matching factory and build a filter
    pub fn create(&self, filter_type: FilterType, config: &ConfigMap) -> Result<Arc<dyn Filter>> {
        self.get(filter_type)?.create(config)
    }

    pub fn info(&self, filter_type: FilterType) -> Result<FilterInfo> {
        let factory = self.get(filter_type)?;
        let default_config = factory.default_config();

        // Capabilities are declared by instances, so build a throwaway one
        let capabilities = factory.create(&default_config)?.capabilities();

        Ok(FilterInfo {
            filter_type: factory.filter_type(),
            name: factory.name().to_string(),
            description: factory.description().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            config_schema: factory.config_schema(),
            capabilities,
            default_config,
        })
    }

    pub fn all_info(&self) -> Result<Vec<FilterInfo>> {
        self.list().into_iter().map(|t| self.info(t)).collect()
    }
}
