//! Loader for configurations split across several files.
//!
//! The main file may name other files through an `include` directive. Every
//! top-level section must come from exactly one file so that merging never
//! silently overrides a setting.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Reads a configuration file together with the files it includes.
pub struct ConfigLoader {
	/// Directory relative include paths are resolved against
	base_path: PathBuf,
	/// Canonical paths already read, used to reject circular includes
	loaded_files: HashSet<PathBuf>,
	/// Which file each top-level section came from
	section_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			loaded_files: HashSet::new(),
			section_sources: HashMap::new(),
		}
	}

	/// Loads a configuration file and all of its includes.
	pub fn load_config(&mut self, config_path: impl AsRef<Path>) -> Result<Config, ConfigError> {
		let root = self.resolve_path(config_path)?;
		let document: toml::Value = toml::from_str(&self.load_file(&root)?)?;

		let includes = self.extract_includes(&document)?;
		let merged = if includes.is_empty() {
			document
		} else {
			self.combine(document, includes, &root)?
		};

		let config: Config = merged.try_into()?;
		config.validate()?;
		Ok(config)
	}

	/// Reads `path`, refusing a file that was already read, and expands its
	/// environment references.
	fn load_file(&mut self, path: &Path) -> Result<String, ConfigError> {
		let canonical = path.canonicalize().map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;

		if !self.loaded_files.insert(canonical.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical.display()
			)));
		}

		let content = std::fs::read_to_string(path)?;
		resolve_env_vars(&content)
	}

	/// Reads the `include` directive, which may be a string or an array of strings.
	fn extract_includes(&self, toml: &toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
		match toml.get("include") {
			None => Ok(Vec::new()),
			Some(toml::Value::String(path)) => Ok(vec![PathBuf::from(path)]),
			Some(toml::Value::Array(items)) => items
				.iter()
				.map(|item| {
					item.as_str().map(PathBuf::from).ok_or_else(|| {
						ConfigError::Validation("Include array must contain only strings".into())
					})
				})
				.collect(),
			Some(_) => Err(ConfigError::Validation(
				"Include must be a string or array of strings".into(),
			)),
		}
	}

	/// Merges included files into the main table, rejecting duplicate sections.
	fn combine(
		&mut self,
		mut main_toml: toml::Value,
		includes: Vec<PathBuf>,
		main_path: &Path,
	) -> Result<toml::Value, ConfigError> {
		let main_table = main_toml
			.as_table_mut()
			.ok_or_else(|| ConfigError::Parse("Configuration root must be a table".into()))?;
		main_table.remove("include");

		for key in main_table.keys() {
			self.section_sources
				.insert(key.clone(), main_path.to_path_buf());
		}

		for include in includes {
			let resolved = self.resolve_path(&include)?;
			let content = self.load_file(&resolved)?;
			let include_toml: toml::Value = toml::from_str(&content)?;
			let toml::Value::Table(include_table) = include_toml else {
				continue;
			};

			if include_table.contains_key("include") {
				return Err(ConfigError::Validation(format!(
					"Nested includes are not supported: {}",
					resolved.display()
				)));
			}

			for (key, value) in include_table {
				if let Some(existing) = self.section_sources.get(&key) {
					return Err(ConfigError::Validation(format!(
						"Duplicate section '{}' found in {} and {}. \
						Each top-level section must be unique across all configuration files.",
						key,
						existing.display(),
						resolved.display()
					)));
				}
				self.section_sources.insert(key.clone(), resolved.clone());
				main_table.insert(key, value);
			}
		}

		Ok(main_toml)
	}

	/// Resolves a path relative to the base path and checks that it exists.
	fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();
		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};

		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}

		Ok(resolved)
	}
}
