//! Builder pattern for constructing transition engines.
//!
//! Provides a way to compose an order engine from configuration, a set of
//! storage factories and a hook registry. The storage backend is chosen by
//! name from the configured implementations.

use crate::engine::{OrderEngine, TransitionEngine};
use crate::hooks::HookRegistry;
use crate::repository::StorageOrderRepository;
use crate::state::order_transitions;
use lifecycle_config::Config;
use lifecycle_storage::{StorageError, StorageInterface, StorageService};
use lifecycle_types::Order;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine construction.
///
/// These errors indicate problems with configuration or missing required components
/// when building an engine instance.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions needed to build an engine, keyed by implementation name.
pub struct EngineFactories<SF> {
	pub storage_factories: HashMap<String, SF>,
}

/// Builder for constructing an order engine with pluggable storage.
pub struct EngineBuilder {
	config: Config,
	hooks: Option<Arc<HookRegistry<Order>>>,
}

impl EngineBuilder {
	/// Creates a new EngineBuilder with the given configuration.
	pub fn new(config: Config) -> Self {
		Self {
			config,
			hooks: None,
		}
	}

	/// Sets the hook registry the engine runs.
	pub fn with_hooks(mut self, hooks: Arc<HookRegistry<Order>>) -> Self {
		self.hooks = Some(hooks);
		self
	}

	/// Builds the storage service and the engine on top of it.
	pub fn build<SF>(self, factories: EngineFactories<SF>) -> Result<OrderEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
	{
		let hooks = self
			.hooks
			.ok_or_else(|| BuilderError::MissingComponent("hook registry".into()))?;

		let mut storage_impls = HashMap::new();
		for (name, config) in &self.config.storage.implementations {
			let Some(factory) = factories.storage_factories.get(name) else {
				tracing::warn!(
					component = "storage",
					implementation = %name,
					"No factory registered"
				);
				continue;
			};
			match factory(config) {
				Ok(implementation) => {
					let is_primary = &self.config.storage.primary == name;
					tracing::info!(
						component = "storage",
						implementation = %name,
						enabled = %is_primary,
						"Loaded"
					);
					storage_impls.insert(name.clone(), implementation);
				},
				Err(e) => {
					tracing::error!(
						component = "storage",
						implementation = %name,
						error = %e,
						"Failed to create storage implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create storage implementation '{}': {}",
						name, e
					)));
				},
			}
		}

		if storage_impls.is_empty() {
			return Err(BuilderError::Config(
				"No valid storage implementations available".into(),
			));
		}

		let primary_storage = &self.config.storage.primary;
		let storage_backend = storage_impls.remove(primary_storage).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary storage '{}' failed to load or has invalid configuration",
				primary_storage
			))
		})?;

		let storage = Arc::new(StorageService::new(storage_backend));
		let repository = Arc::new(StorageOrderRepository::new(storage));

		tracing::info!(
			service_id = %self.config.service.id,
			storage = %primary_storage,
			hooks = hooks.summary().len(),
			"Engine ready"
		);
		Ok(TransitionEngine::new(order_transitions(), hooks, repository))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use lifecycle_config::builders::config::ConfigBuilder;
	use lifecycle_storage::implementations::memory;
	use lifecycle_types::{ImplementationRegistry, OrderState, TransitionParams};
	use rust_decimal::Decimal;

	type Factory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

	fn factories() -> EngineFactories<Factory> {
		let mut storage_factories: HashMap<String, Factory> = HashMap::new();
		for (name, factory) in lifecycle_storage::get_all_implementations() {
			storage_factories.insert(name.to_string(), factory);
		}
		EngineFactories { storage_factories }
	}

	#[test]
	fn test_build_with_memory_storage() {
		let engine = EngineBuilder::new(ConfigBuilder::new().build())
			.with_hooks(Arc::new(HookRegistry::new()))
			.build(factories())
			.unwrap();

		let mut order = Order::new("Book", Decimal::new(500, 2));
		engine.create(&order).unwrap();
		engine
			.transition(&mut order, OrderState::Processing, TransitionParams::new())
			.unwrap();
		assert_eq!(engine.history(&order.id).unwrap().len(), 1);
	}

	#[test]
	fn test_build_with_file_storage() {
		let dir = tempfile::tempdir().unwrap();
		let config = ConfigBuilder::new().file_storage(dir.path()).build();
		let engine = EngineBuilder::new(config)
			.with_hooks(Arc::new(HookRegistry::new()))
			.build(factories())
			.unwrap();

		let order = Order::new("Lamp", Decimal::new(40, 0));
		engine.create(&order).unwrap();
		assert_eq!(engine.list().unwrap().len(), 1);
	}

	#[test]
	fn test_missing_hooks() {
		let result = EngineBuilder::new(ConfigBuilder::new().build()).build(factories());
		assert!(matches!(result, Err(BuilderError::MissingComponent(_))));
	}

	#[test]
	fn test_unknown_primary_storage() {
		let config = ConfigBuilder::new()
			.storage("redis", toml::Value::Table(toml::map::Map::new()))
			.build();
		let result = EngineBuilder::new(config)
			.with_hooks(Arc::new(HookRegistry::new()))
			.build(factories());
		assert!(matches!(result, Err(BuilderError::Config(_))));
	}

	#[test]
	fn test_factory_error_is_reported() {
		let mut bad_file = toml::map::Map::new();
		bad_file.insert("storage_path".into(), toml::Value::Integer(7));
		let mut config = ConfigBuilder::new()
			.storage(memory::Registry::NAME, toml::Value::Table(toml::map::Map::new()))
			.build();
		config
			.storage
			.implementations
			.insert("file".into(), toml::Value::Table(bad_file));

		let err = EngineBuilder::new(config)
			.with_hooks(Arc::new(HookRegistry::new()))
			.build(factories())
			.err()
			.unwrap();
		assert!(err
			.to_string()
			.contains("Failed to create storage implementation 'file'"));
	}
}
