//! Validation of backend configuration tables.
//!
//! Storage backends receive their `[storage.implementations.<name>]` table as
//! a raw TOML value. Each backend describes the keys it understands with a
//! [`Schema`] and exposes it through [`ConfigSchema`], so a bad table is
//! reported at startup with the offending key named.

use thiserror::Error;

/// A configuration table did not match its schema.
#[derive(Debug, Error)]
pub enum ValidationError {
	#[error("Missing required field: {0}")]
	MissingField(String),
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
}

/// Value type a key must hold.
#[derive(Debug)]
pub enum FieldType {
	String,
	/// Integer within the inclusive bounds, when given.
	Integer { min: Option<i64>, max: Option<i64> },
}

impl FieldType {
	fn name(&self) -> &'static str {
		match self {
			FieldType::String => "string",
			FieldType::Integer { .. } => "integer",
		}
	}

	fn check(&self, key: &str, value: &toml::Value) -> Result<(), ValidationError> {
		let matches = match self {
			FieldType::String => value.is_str(),
			FieldType::Integer { .. } => value.is_integer(),
		};
		if !matches {
			return Err(ValidationError::TypeMismatch {
				field: key.to_string(),
				expected: self.name().to_string(),
				actual: value.type_str().to_string(),
			});
		}

		if let (FieldType::Integer { min, max }, Some(n)) = (self, value.as_integer()) {
			let out_of_range = |relation: &str, bound: i64| ValidationError::InvalidValue {
				field: key.to_string(),
				message: format!("{} is {} {}", n, relation, bound),
			};
			if let Some(lo) = *min {
				if n < lo {
					return Err(out_of_range("below the minimum", lo));
				}
			}
			if let Some(hi) = *max {
				if n > hi {
					return Err(out_of_range("above the maximum", hi));
				}
			}
		}
		Ok(())
	}
}

/// Extra check on a value that already has the right type.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// One key of a [`Schema`].
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		self.field_type.check(&self.name, value)?;
		match &self.validator {
			Some(validator) => validator(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			}),
			None => Ok(()),
		}
	}
}

/// Keys a backend table must or may contain. Other keys are ignored.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let Some(table) = config.as_table() else {
			return Err(ValidationError::TypeMismatch {
				field: "root".to_string(),
				expected: "table".to_string(),
				actual: config.type_str().to_string(),
			});
		};

		for field in &self.required {
			match table.get(&field.name) {
				Some(value) => field.check(value)?,
				None => return Err(ValidationError::MissingField(field.name.clone())),
			}
		}
		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				field.check(value)?;
			}
		}
		Ok(())
	}
}

/// Validation entry point every backend provides for its own table.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(raw: &str) -> toml::Value {
		toml::from_str(raw).unwrap()
	}

	#[test]
	fn test_required_field_missing() {
		let schema = Schema::new(vec![Field::new("path", FieldType::String)], vec![]);
		let err = schema.validate(&parse("other = 1")).unwrap_err();
		assert!(matches!(err, ValidationError::MissingField(f) if f == "path"));
	}

	#[test]
	fn test_non_table_root() {
		let schema = Schema::new(vec![], vec![]);
		let err = schema.validate(&toml::Value::Integer(3)).unwrap_err();
		assert!(matches!(err, ValidationError::TypeMismatch { field, .. } if field == "root"));
	}

	#[test]
	fn test_integer_bounds() {
		let schema = Schema::new(
			vec![],
			vec![Field::new(
				"limit",
				FieldType::Integer {
					min: Some(0),
					max: Some(100),
				},
			)],
		);
		assert!(schema.validate(&parse("limit = 50")).is_ok());
		assert!(schema.validate(&toml::Value::Table(toml::Table::new())).is_ok());

		let err = schema.validate(&parse("limit = 101")).unwrap_err();
		assert_eq!(
			err.to_string(),
			"Invalid value for field 'limit': 101 is above the maximum 100"
		);
		let err = schema.validate(&parse("limit = \"ten\"")).unwrap_err();
		assert_eq!(
			err.to_string(),
			"Type mismatch for field 'limit': expected integer, got string"
		);
	}

	#[test]
	fn test_custom_validator() {
		let schema = Schema::new(
			vec![Field::new("path", FieldType::String).with_validator(|v| {
				match v.as_str() {
					Some(s) if !s.is_empty() => Ok(()),
					_ => Err("must not be empty".into()),
				}
			})],
			vec![],
		);
		let err = schema.validate(&parse("path = \"\"")).unwrap_err();
		assert_eq!(
			err.to_string(),
			"Invalid value for field 'path': must not be empty"
		);
	}
}
