//! Key-value storage under the order repositories.
//!
//! Backends store opaque bytes under string keys; [`StorageService`] layers
//! JSON documents addressed by `namespace:id` on top. Every call is blocking,
//! and `update_with` gives the engine its compare-and-set commit.

use lifecycle_types::ImplementationRegistry;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Failure of a storage call.
#[derive(Debug, Error)]
pub enum StorageError {
	#[error("Not found")]
	NotFound,
	/// A document could not be encoded or decoded as JSON.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// The backend itself failed, e.g. an I/O error.
	#[error("Backend error: {0}")]
	Backend(String),
	/// The backend's configuration table was rejected.
	#[error("Configuration error: {0}")]
	Configuration(String),
	/// A read-modify-write was refused by its update function.
	#[error("Write conflict: {0}")]
	Conflict(String),
}

/// Update function for [`StorageInterface::update_with`].
///
/// Receives the current bytes (`None` if the key is absent) and returns the
/// bytes to write. Returning an error leaves the stored value untouched.
pub type UpdateFn<'a> = &'a mut dyn FnMut(Option<Vec<u8>>) -> Result<Vec<u8>, StorageError>;

/// Byte-level operations a storage backend provides.
pub trait StorageInterface: Send + Sync {
	/// Bytes stored under `key`, or [`StorageError::NotFound`].
	fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Lists all keys starting with `prefix`, sorted.
	fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

	/// Atomically reads, transforms and writes the value under `key`.
	///
	/// No other write to the same key can interleave between the read and
	/// the write.
	fn update_with(&self, key: &str, update: UpdateFn<'_>) -> Result<(), StorageError>;
}

/// Builds a backend from its configuration table.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// [`ImplementationRegistry`] of a storage backend.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

fn entry<R: StorageRegistry>() -> (&'static str, StorageFactory) {
	(R::NAME, R::factory())
}

/// Every built-in backend as `(configuration name, factory)`.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![entry::<file::Registry>(), entry::<memory::Registry>()]
}

/// JSON documents on top of a [`StorageInterface`], keyed `namespace:id`.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	fn key(namespace: &str, id: &str) -> String {
		format!("{}:{}", namespace, id)
	}

	/// Decodes the document `namespace:id`.
	pub fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&Self::key(namespace, id))?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Atomically transforms a typed value.
	///
	/// `update` receives the current value (`None` if absent) and returns the
	/// value to store; an error aborts without writing.
	pub fn update_with<T, F>(
		&self,
		namespace: &str,
		id: &str,
		mut update: F,
	) -> Result<(), StorageError>
	where
		T: Serialize + DeserializeOwned,
		F: FnMut(Option<T>) -> Result<T, StorageError>,
	{
		self.backend
			.update_with(&Self::key(namespace, id), &mut |current| {
				let current = current
					.map(|bytes| {
						serde_json::from_slice::<T>(&bytes)
							.map_err(|e| StorageError::Serialization(e.to_string()))
					})
					.transpose()?;
				let next = update(current)?;
				serde_json::to_vec(&next).map_err(|e| StorageError::Serialization(e.to_string()))
			})
	}

	/// Lists the ids stored under a namespace, sorted.
	pub fn list(&self, namespace: &str) -> Result<Vec<String>, StorageError> {
		let prefix = Self::key(namespace, "");
		Ok(self
			.backend
			.list_keys(&prefix)?
			.into_iter()
			.filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
			.collect())
	}
}
