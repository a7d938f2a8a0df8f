//! TOML configuration for `orderctl` and the order engine.
//!
//! A configuration names the service instance, picks the primary storage
//! backend out of the configured implementations and tunes the built-in
//! order hooks. `${VAR}` and `${VAR:-default}` references are expanded from
//! the environment before parsing.
//!
//! A file may pull in others with `include = "other.toml"` or
//! `include = ["a.toml", "b.toml"]`; a top-level section may appear in only
//! one of them.

mod loader;

#[cfg(any(test, feature = "testing"))]
pub mod builders {
	pub mod config;
}

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Failure to read, parse or validate a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// The TOML was malformed or did not match the expected shape.
	#[error("Configuration error: {0}")]
	Parse(String),
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		ConfigError::Parse(err.message().to_string())
	}
}

/// Root of a configuration file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this service instance.
	pub service: ServiceConfig,
	pub storage: StorageConfig,
	/// Settings consumed by the built-in order hooks.
	#[serde(default)]
	pub hooks: HooksConfig,
}

/// `[service]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Unique identifier for this instance, used in log output.
	pub id: String,
}

/// `[storage]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Name of the backend the engine stores orders in.
	pub primary: String,
	/// Backend tables keyed by implementation name, e.g. `memory` or `file`.
	pub implementations: HashMap<String, toml::Value>,
}

/// Settings for the built-in order hooks.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HooksConfig {
	/// Payment methods accepted when an order moves to processing.
	#[serde(default = "default_payment_methods")]
	pub payment_methods: Vec<String>,
	/// Largest discount, in percent, a transition may apply.
	#[serde(default = "default_max_discount_percent")]
	pub max_discount_percent: u32,
}

impl Default for HooksConfig {
	fn default() -> Self {
		Self {
			payment_methods: default_payment_methods(),
			max_discount_percent: default_max_discount_percent(),
		}
	}
}

/// Returns the payment methods accepted by default.
fn default_payment_methods() -> Vec<String> {
	vec!["cash".to_string(), "card".to_string()]
}

/// Returns the default discount ceiling.
fn default_max_discount_percent() -> u32 {
	100
}

/// Expands `${VAR}` and `${VAR:-default}` in `input`.
///
/// A referenced variable that is unset and has no default is an error.
/// Inputs above 1 MiB are rejected before the regex runs.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_BYTES: usize = 1 << 20;
	if input.len() > MAX_INPUT_BYTES {
		return Err(ConfigError::Validation(format!(
			"Configuration is {} bytes, the limit is {}",
			input.len(),
			MAX_INPUT_BYTES
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last..full_match.start()]);
		result.push_str(&value);
		last = full_match.end();
	}
	result.push_str(&input[last..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, resolving environment variables and
	/// `include` directives.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let base_dir = path
			.parent()
			.filter(|p| !p.as_os_str().is_empty())
			.unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path.display())))?;
		loader.load_config(file_name)
	}

	/// Returns the configuration table of the primary storage implementation.
	pub fn primary_storage(&self) -> Option<&toml::Value> {
		self.storage.implementations.get(&self.storage.primary)
	}

	/// Validates the configuration to ensure all required fields are properly set.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.trim().is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}

		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if self.storage.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Storage primary implementation cannot be empty".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}

		if self.hooks.payment_methods.is_empty() {
			return Err(ConfigError::Validation(
				"At least one payment method must be accepted".into(),
			));
		}
		if self
			.hooks
			.payment_methods
			.iter()
			.any(|method| method.trim().is_empty())
		{
			return Err(ConfigError::Validation(
				"Payment methods cannot be empty strings".into(),
			));
		}
		if self.hooks.max_discount_percent > 100 {
			return Err(ConfigError::Validation(
				"hooks.max_discount_percent cannot exceed 100".into(),
			));
		}

		Ok(())
	}
}

/// Parses configuration from a TOML string.
///
/// Environment variables are resolved and the configuration is validated
/// after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const MINIMAL: &str = r#"
[service]
id = "orders-test"

[storage]
primary = "memory"
[storage.implementations.memory]
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("LIFECYCLE_TEST_HOST", "localhost");
		std::env::set_var("LIFECYCLE_TEST_PORT", "5432");

		let input = "host = \"${LIFECYCLE_TEST_HOST}:${LIFECYCLE_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "host = \"localhost:5432\"");

		std::env::remove_var("LIFECYCLE_TEST_HOST");
		std::env::remove_var("LIFECYCLE_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${LIFECYCLE_MISSING_VAR:-default_value}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"default_value\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let input = "value = \"${LIFECYCLE_MISSING_VAR}\"";
		let result = resolve_env_vars(input);
		assert!(result.is_err());
		assert!(result
			.unwrap_err()
			.to_string()
			.contains("LIFECYCLE_MISSING_VAR"));
	}

	#[test]
	fn test_minimal_config_defaults() {
		let config: Config = MINIMAL.parse().unwrap();
		assert_eq!(config.service.id, "orders-test");
		assert_eq!(config.hooks.payment_methods, vec!["cash", "card"]);
		assert_eq!(config.hooks.max_discount_percent, 100);
		assert!(config.primary_storage().is_some());
	}

	#[test]
	fn test_config_with_env_vars() {
		std::env::set_var("LIFECYCLE_TEST_SERVICE_ID", "orders-env");

		let config_str = r#"
[service]
id = "${LIFECYCLE_TEST_SERVICE_ID}"

[storage]
primary = "file"
[storage.implementations.file]
storage_path = "${LIFECYCLE_TEST_STORAGE:-./data/orders}"
"#;

		let config: Config = config_str.parse().unwrap();
		assert_eq!(config.service.id, "orders-env");
		let path = config
			.primary_storage()
			.and_then(|v| v.get("storage_path"))
			.and_then(|v| v.as_str());
		assert_eq!(path, Some("./data/orders"));

		std::env::remove_var("LIFECYCLE_TEST_SERVICE_ID");
	}

	#[test]
	fn test_primary_storage_must_exist() {
		let config_str = r#"
[service]
id = "orders-test"

[storage]
primary = "file"
[storage.implementations.memory]
"#;
		let err = Config::from_str(config_str).unwrap_err();
		assert!(err
			.to_string()
			.contains("Primary storage 'file' not found in implementations"));
	}

	#[test]
	fn test_empty_service_id_rejected() {
		let config_str = MINIMAL.replace("orders-test", " ");
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err.to_string().contains("Service ID cannot be empty"));
	}

	#[test]
	fn test_hook_settings_validated() {
		let too_generous = format!("{}\n[hooks]\nmax_discount_percent = 150\n", MINIMAL);
		let err = Config::from_str(&too_generous).unwrap_err();
		assert!(err.to_string().contains("max_discount_percent"));

		let no_methods = format!("{}\n[hooks]\npayment_methods = []\n", MINIMAL);
		let err = Config::from_str(&no_methods).unwrap_err();
		assert!(err.to_string().contains("payment method"));
	}

	#[test]
	fn test_custom_payment_methods() {
		let config_str = format!(
			"{}\n[hooks]\npayment_methods = [\"card\", \"voucher\"]\nmax_discount_percent = 30\n",
			MINIMAL
		);
		let config = Config::from_str(&config_str).unwrap();
		assert_eq!(config.hooks.payment_methods, vec!["card", "voucher"]);
		assert_eq!(config.hooks.max_discount_percent, 30);
	}

	#[test]
	fn test_parse_error_is_reported() {
		let err = Config::from_str("[service\nid = 1").unwrap_err();
		assert!(matches!(err, ConfigError::Parse(_)));
	}
}
