//! File-based storage backend implementation.
//!
//! Keys of the form `namespace:id` are stored as `<base>/<namespace>/<id>.bin`,
//! keys without a namespace as `<base>/<key>.bin`. A path component made only
//! of ASCII letters, digits, `-` and `_` is used as-is; any other component is
//! written as `~` followed by the hex of its bytes, so distinct keys never
//! share a file and listed names decode back to the original keys. Writes go to a temporary
//! file which is then renamed over the target, and every write to a key is
//! serialized through an exclusive lock on a sibling `.lock` file, so
//! read-modify-write cycles are atomic across threads and processes.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry, UpdateFn};
use fs2::FileExt;
use lifecycle_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError,
};
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Fixed-size file header.
///
/// Binary layout (16 bytes total):
/// - [0-3]: Magic bytes "OLCS"
/// - [4-5]: Version (u16, little-endian)
/// - [6-15]: Reserved
#[derive(Debug, Clone)]
struct FileHeader {
	version: u16,
}

impl FileHeader {
	const MAGIC: &'static [u8; 4] = b"OLCS";
	const VERSION: u16 = 1;
	const SIZE: usize = 16;

	fn current() -> Self {
		Self {
			version: Self::VERSION,
		}
	}

	fn serialize(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		bytes[0..4].copy_from_slice(Self::MAGIC);
		bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
		bytes
	}

	/// Parses the header at the start of `bytes`.
	///
	/// Returns `Ok(None)` for files written without a header.
	fn deserialize(bytes: &[u8]) -> Result<Option<Self>, StorageError> {
		if bytes.len() < Self::SIZE || &bytes[0..4] != Self::MAGIC {
			return Ok(None);
		}

		let version = u16::from_le_bytes([bytes[4], bytes[5]]);
		if version > Self::VERSION {
			return Err(StorageError::Backend(format!(
				"Unsupported file version: {}",
				version
			)));
		}

		Ok(Some(Self { version }))
	}
}

/// File-based storage implementation.
///
/// This implementation stores data as binary files on the filesystem,
/// providing simple persistence without requiring external services.
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
}

impl FileStorage {
	/// Creates a new FileStorage instance rooted at `base_path`.
	pub fn new(base_path: PathBuf) -> Self {
		Self { base_path }
	}

	fn is_plain(component: &str) -> bool {
		!component.is_empty()
			&& component
				.bytes()
				.all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
	}

	/// Maps one key component to a file name component.
	fn encode_component(component: &str) -> String {
		if Self::is_plain(component) {
			component.to_string()
		} else {
			format!("~{}", hex::encode(component.as_bytes()))
		}
	}

	/// Inverse of [`encode_component`](Self::encode_component). `None` for
	/// names this backend never writes.
	fn decode_component(name: &str) -> Option<String> {
		match name.strip_prefix('~') {
			Some(encoded) => hex::decode(encoded)
				.ok()
				.and_then(|bytes| String::from_utf8(bytes).ok()),
			None if Self::is_plain(name) => Some(name.to_string()),
			None => None,
		}
	}

	/// Converts a storage key to a filesystem path.
	fn get_file_path(&self, key: &str) -> PathBuf {
		match key.split_once(':') {
			Some((namespace, id)) => self
				.base_path
				.join(Self::encode_component(namespace))
				.join(format!("{}.bin", Self::encode_component(id))),
			None => self
				.base_path
				.join(format!("{}.bin", Self::encode_component(key))),
		}
	}

	/// Takes the exclusive write lock for the file at `path`.
	///
	/// The lock is released when the returned handle is dropped.
	fn lock(path: &Path) -> Result<File, StorageError> {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).map_err(|e| StorageError::Backend(e.to_string()))?;
		}
		let lock_file = OpenOptions::new()
			.create(true)
			.truncate(false)
			.write(true)
			.open(path.with_extension("lock"))
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		lock_file
			.lock_exclusive()
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		Ok(lock_file)
	}

	fn read_payload(path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
		let data = match fs::read(path) {
			Ok(data) => data,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		match FileHeader::deserialize(&data)? {
			Some(_) => Ok(Some(data[FileHeader::SIZE..].to_vec())),
			// Legacy file without header, return as-is
			None => Ok(Some(data)),
		}
	}

	/// Writes `value` behind a fresh header. Caller must hold the lock.
	fn write_payload(path: &Path, value: &[u8]) -> Result<(), StorageError> {
		let mut file_data = Vec::with_capacity(FileHeader::SIZE + value.len());
		file_data.extend_from_slice(&FileHeader::current().serialize());
		file_data.extend_from_slice(value);

		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, file_data).map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, path).map_err(|e| StorageError::Backend(e.to_string()))
	}

	fn collect_keys(
		dir: &Path,
		key_prefix: &str,
		keys: &mut Vec<String>,
	) -> Result<(), StorageError> {
		let entries = match fs::read_dir(dir) {
			Ok(entries) => entries,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		for entry in entries {
			let entry = entry.map_err(|e| StorageError::Backend(e.to_string()))?;
			let path = entry.path();
			if path.extension() != Some(std::ffi::OsStr::new("bin")) {
				continue;
			}
			let decoded = path
				.file_stem()
				.and_then(|stem| stem.to_str())
				.and_then(Self::decode_component);
			match decoded {
				Some(id) => keys.push(format!("{}{}", key_prefix, id)),
				None => tracing::debug!("Skipping file {:?}: not a storage key", path),
			}
		}
		Ok(())
	}
}

impl StorageInterface for FileStorage {
	fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		Self::read_payload(&self.get_file_path(key))?.ok_or(StorageError::NotFound)
	}

	fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let mut keys = Vec::new();
		match prefix.split_once(':') {
			Some((namespace, _)) => {
				let dir = self.base_path.join(Self::encode_component(namespace));
				Self::collect_keys(&dir, &format!("{}:", namespace), &mut keys)?;
			},
			None => {
				// Namespaced keys live in subdirectories; list those too.
				Self::collect_keys(&self.base_path, "", &mut keys)?;
				if let Ok(entries) = fs::read_dir(&self.base_path) {
					for entry in entries.flatten() {
						let path = entry.path();
						if path.is_dir() {
							let namespace = path
								.file_name()
								.and_then(|n| n.to_str())
								.and_then(Self::decode_component);
							if let Some(namespace) = namespace {
								Self::collect_keys(&path, &format!("{}:", namespace), &mut keys)?;
							}
						}
					}
				}
			},
		}

		keys.retain(|key| key.starts_with(prefix));
		keys.sort();
		Ok(keys)
	}

	fn update_with(&self, key: &str, update: UpdateFn<'_>) -> Result<(), StorageError> {
		let path = self.get_file_path(key);
		let _guard = Self::lock(&path)?;
		let current = Self::read_payload(&path)?;
		let next = update(current)?;
		Self::write_payload(&path, &next)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![], // No required fields
			vec![Field::new("storage_path", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(path) if !path.trim().is_empty() => Ok(()),
					_ => Err("storage_path cannot be empty".into()),
				}
			})],
		);
		schema.validate(config)
	}
}

/// Factory function to create a storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for file storage (default: "./data/storage")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/storage")
		.to_string();

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
