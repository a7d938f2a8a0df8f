//! Persistence for lifecycle entities and their transition history.
//!
//! The engine only talks to the [`Repository`] trait. Its `commit` operation
//! saves the entity and appends the transition record as one atomic,
//! version-checked step: either both happen or neither does.

use lifecycle_storage::{StorageError, StorageService};
use lifecycle_types::{Order, OrderLog, StorageKey, Stateful, TransitionRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Transition record type for an entity type.
pub type RecordOf<E> = TransitionRecord<<E as Stateful>::State>;

/// Errors that can occur in a repository.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("Entity not found: {0}")]
	NotFound(String),
	#[error("Entity already exists: {0}")]
	AlreadyExists(String),
	#[error("Version conflict on {id}: expected {expected}, found {actual}")]
	VersionConflict { id: String, expected: u64, actual: u64 },
	#[error("Storage error: {0}")]
	Storage(String),
}

/// Persistence collaborator of the transition engine.
pub trait Repository: Send + Sync {
	type Entity: Stateful;

	/// Stores a new entity with an empty history.
	fn create(&self, entity: &Self::Entity) -> Result<(), StoreError>;

	/// Loads the current version of an entity.
	fn load(&self, id: &str) -> Result<Self::Entity, StoreError>;

	/// Saves `entity` and appends `record` atomically.
	///
	/// Fails with [`StoreError::VersionConflict`] if the stored version is not
	/// `expected_version`. Returns the new version.
	fn commit(
		&self,
		entity: &Self::Entity,
		expected_version: u64,
		record: &RecordOf<Self::Entity>,
	) -> Result<u64, StoreError>;

	/// All transition records of an entity, oldest first.
	fn history(&self, id: &str) -> Result<Vec<RecordOf<Self::Entity>>, StoreError>;

	/// All stored entities.
	fn list(&self) -> Result<Vec<Self::Entity>, StoreError>;
}

/// Stored form of an order: the entity and its append-only log.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OrderDocument {
	order: Order,
	#[serde(default)]
	history: Vec<OrderLog>,
}

/// Repository keeping each order and its history as one document in a
/// [`StorageService`] under the `orders` namespace.
pub struct StorageOrderRepository {
	storage: Arc<StorageService>,
}

impl StorageOrderRepository {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	fn document(&self, id: &str) -> Result<OrderDocument, StoreError> {
		self.storage
			.retrieve(StorageKey::Orders.as_str(), id)
			.map_err(|e| match e {
				StorageError::NotFound => StoreError::NotFound(id.to_string()),
				other => StoreError::Storage(other.to_string()),
			})
	}
}

impl Repository for StorageOrderRepository {
	type Entity = Order;

	fn create(&self, order: &Order) -> Result<(), StoreError> {
		let mut exists = false;
		self.storage
			.update_with(
				StorageKey::Orders.as_str(),
				&order.id,
				|current: Option<OrderDocument>| match current {
					Some(_) => {
						exists = true;
						Err(StorageError::Conflict(order.id.clone()))
					},
					None => Ok(OrderDocument {
						order: order.clone(),
						history: Vec::new(),
					}),
				},
			)
			.map_err(|e| match e {
				StorageError::Conflict(_) if exists => StoreError::AlreadyExists(order.id.clone()),
				other => StoreError::Storage(other.to_string()),
			})
	}

	fn load(&self, id: &str) -> Result<Order, StoreError> {
		self.document(id).map(|doc| doc.order)
	}

	fn commit(
		&self,
		order: &Order,
		expected_version: u64,
		record: &OrderLog,
	) -> Result<u64, StoreError> {
		let next_version = expected_version + 1;
		let mut found: Option<u64> = None;
		let mut missing = false;

		self.storage
			.update_with(
				StorageKey::Orders.as_str(),
				&order.id,
				|current: Option<OrderDocument>| {
					let Some(mut doc) = current else {
						missing = true;
						return Err(StorageError::NotFound);
					};
					if doc.order.version != expected_version {
						found = Some(doc.order.version);
						return Err(StorageError::Conflict(order.id.clone()));
					}
					let mut stored = order.clone();
					stored.version = next_version;
					doc.order = stored;
					doc.history.push(record.clone());
					Ok(doc)
				},
			)
			.map_err(|e| match (e, found) {
				(StorageError::Conflict(_), Some(actual)) => StoreError::VersionConflict {
					id: order.id.clone(),
					expected: expected_version,
					actual,
				},
				(StorageError::NotFound, _) if missing => StoreError::NotFound(order.id.clone()),
				(other, _) => StoreError::Storage(other.to_string()),
			})?;

		tracing::debug!(
			key = %StorageKey::Orders.document_key(&order.id),
			version = next_version,
			"Committed order document"
		);
		Ok(next_version)
	}

	fn history(&self, id: &str) -> Result<Vec<OrderLog>, StoreError> {
		self.document(id).map(|doc| doc.history)
	}

	fn list(&self) -> Result<Vec<Order>, StoreError> {
		let ids = self
			.storage
			.list(StorageKey::Orders.as_str())
			.map_err(|e| StoreError::Storage(e.to_string()))?;

		let mut orders = ids
			.iter()
			.map(|id| self.load(id))
			.collect::<Result<Vec<_>, _>>()?;
		orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
		Ok(orders)
	}
}
