//! Configuration builder for creating test and development configurations.
//!
//! This module provides utilities for constructing Config instances with
//! sensible defaults, particularly useful for testing scenarios.

use crate::{Config, HooksConfig, ServiceConfig, StorageConfig};
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
///
/// Defaults to an in-memory store and the stock hook settings.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	service_id: String,
	storage_primary: String,
	storage_config: toml::Value,
	payment_methods: Vec<String>,
	max_discount_percent: u32,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Creates a new `ConfigBuilder` with default values suitable for testing.
	pub fn new() -> Self {
		let hooks = HooksConfig::default();
		Self {
			service_id: "test-orders".to_string(),
			storage_primary: "memory".to_string(),
			storage_config: toml::Value::Table(toml::map::Map::new()),
			payment_methods: hooks.payment_methods,
			max_discount_percent: hooks.max_discount_percent,
		}
	}

	/// Sets the service ID.
	pub fn service_id(mut self, id: impl Into<String>) -> Self {
		self.service_id = id.into();
		self
	}

	/// Sets the primary storage implementation and its configuration table.
	pub fn storage(mut self, primary: impl Into<String>, config: toml::Value) -> Self {
		self.storage_primary = primary.into();
		self.storage_config = config;
		self
	}

	/// Uses file storage rooted at `path`.
	pub fn file_storage(self, path: impl AsRef<std::path::Path>) -> Self {
		let mut table = toml::map::Map::new();
		table.insert(
			"storage_path".to_string(),
			toml::Value::String(path.as_ref().display().to_string()),
		);
		self.storage("file", toml::Value::Table(table))
	}

	/// Sets the accepted payment methods.
	pub fn payment_methods<I, S>(mut self, methods: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.payment_methods = methods.into_iter().map(Into::into).collect();
		self
	}

	/// Sets the discount ceiling in percent.
	pub fn max_discount_percent(mut self, percent: u32) -> Self {
		self.max_discount_percent = percent;
		self
	}

	/// Builds the `Config` with the configured values.
	pub fn build(self) -> Config {
		let mut implementations = HashMap::new();
		implementations.insert(self.storage_primary.clone(), self.storage_config);

		Config {
			service: ServiceConfig {
				id: self.service_id,
			},
			storage: StorageConfig {
				primary: self.storage_primary,
				implementations,
			},
			hooks: HooksConfig {
				payment_methods: self.payment_methods,
				max_discount_percent: self.max_discount_percent,
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults_point_at_memory_storage() {
		let config = ConfigBuilder::new().build();
		assert_eq!(config.storage.primary, "memory");
		assert!(config.primary_storage().is_some());
		assert_eq!(config.hooks.payment_methods, vec!["cash", "card"]);
	}

	#[test]
	fn test_file_storage_sets_path() {
		let config = ConfigBuilder::new()
			.service_id("orders-file")
			.file_storage("/tmp/orders")
			.payment_methods(["card"])
			.max_discount_percent(10)
			.build();
		assert_eq!(config.service.id, "orders-file");
		assert_eq!(config.storage.primary, "file");
		let path = config
			.primary_storage()
			.and_then(|v| v.get("storage_path"))
			.and_then(|v| v.as_str());
		assert_eq!(path, Some("/tmp/orders"));
		assert_eq!(config.hooks.max_discount_percent, 10);
	}
}
