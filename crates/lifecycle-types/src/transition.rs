//! Transition types shared by the engine, the repository and its callers.
//!
//! This module defines the entity contract the transition engine works
//! against, the hook phases, the free-form transition parameters and the
//! immutable audit record written for every accepted transition.

use crate::ChoicesEnum;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Free-form parameters supplied with a transition and stored verbatim in
/// the audit record.
pub type TransitionParams = serde_json::Map<String, serde_json::Value>;

/// Error raised when a raw parameter payload is not a JSON object.
#[derive(Debug, Error)]
pub enum ParamsError {
	#[error("Invalid JSON: {0}")]
	Json(String),
	#[error("Transition parameters must be a JSON object, got {0}")]
	NotAnObject(&'static str),
}

/// Parses a raw payload into transition parameters.
///
/// An empty or whitespace-only payload yields empty parameters.
pub fn parse_params(raw: &str) -> Result<TransitionParams, ParamsError> {
	if raw.trim().is_empty() {
		return Ok(TransitionParams::new());
	}
	let value: serde_json::Value =
		serde_json::from_str(raw).map_err(|e| ParamsError::Json(e.to_string()))?;
	match value {
		serde_json::Value::Object(map) => Ok(map),
		serde_json::Value::Null => Err(ParamsError::NotAnObject("null")),
		serde_json::Value::Bool(_) => Err(ParamsError::NotAnObject("boolean")),
		serde_json::Value::Number(_) => Err(ParamsError::NotAnObject("number")),
		serde_json::Value::String(_) => Err(ParamsError::NotAnObject("string")),
		serde_json::Value::Array(_) => Err(ParamsError::NotAnObject("array")),
	}
}

/// The point in a transition at which a hook runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
	/// Before the state change is committed. Hooks may veto and may mutate
	/// the entity; their mutations are persisted with the commit.
	Before,
	/// After the commit and the audit record. Side effects only.
	After,
}

impl Phase {
	pub fn as_str(&self) -> &'static str {
		match self {
			Phase::Before => "before",
			Phase::After => "after",
		}
	}
}

impl fmt::Display for Phase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// An entity whose lifecycle is driven by the transition engine.
///
/// The engine only reads and writes the state machine bookkeeping through
/// this trait; every other field is the business of hooks.
pub trait Stateful: Clone + Send + Sync + 'static {
	/// The enumeration of states this entity moves through.
	type State: ChoicesEnum;

	/// Stable identity of the entity.
	fn id(&self) -> &str;

	/// Current state.
	fn state(&self) -> Self::State;

	/// Time of the most recent accepted transition.
	fn state_changed_at(&self) -> DateTime<Utc>;

	/// Moves the entity into `state` at `at`.
	fn set_state(&mut self, state: Self::State, at: DateTime<Utc>);

	/// Optimistic concurrency token, bumped by every commit.
	fn version(&self) -> u64;

	fn set_version(&mut self, version: u64);
}

/// Immutable audit entry for one accepted transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord<S> {
	/// Identifier of the entity that transitioned.
	pub entity_id: String,
	/// When the transition was committed.
	pub timestamp: DateTime<Utc>,
	/// State before the transition.
	pub old_state: S,
	/// State after the transition.
	pub new_state: S,
	/// The transition's input parameters.
	#[serde(default)]
	pub extra: TransitionParams,
}

impl<S: ChoicesEnum> TransitionRecord<S> {
	pub fn new(
		entity_id: impl Into<String>,
		timestamp: DateTime<Utc>,
		old_state: S,
		new_state: S,
		extra: TransitionParams,
	) -> Self {
		Self {
			entity_id: entity_id.into(),
			timestamp,
			old_state,
			new_state,
			extra,
		}
	}
}

impl<S: ChoicesEnum> fmt::Display for TransitionRecord<S> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"#{}: {} -> {} @ {}",
			self.entity_id,
			self.old_state,
			self.new_state,
			self.timestamp.format("%Y-%m-%d %H:%M:%S")
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::OrderState;
	use chrono::TimeZone;

	#[test]
	fn test_parse_params_object() {
		let params = parse_params(r#"{"payment_method": "cash", "discount": 10}"#).unwrap();
		assert_eq!(params["payment_method"], "cash");
		assert_eq!(params["discount"], 10);
	}

	#[test]
	fn test_parse_params_empty_payload() {
		assert!(parse_params("").unwrap().is_empty());
		assert!(parse_params("   ").unwrap().is_empty());
	}

	#[test]
	fn test_parse_params_rejects_non_objects() {
		assert!(matches!(
			parse_params("[1, 2]"),
			Err(ParamsError::NotAnObject("array"))
		));
		assert!(matches!(parse_params("{oops"), Err(ParamsError::Json(_))));
	}

	#[test]
	fn test_record_display() {
		let record = TransitionRecord::new(
			"42",
			Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap(),
			OrderState::PendingPayment,
			OrderState::Processing,
			TransitionParams::new(),
		);
		assert_eq!(
			record.to_string(),
			"#42: pending_payment -> processing @ 2024-03-01 12:30:05"
		);
	}

	#[test]
	fn test_phase_serde() {
		assert_eq!(serde_json::to_string(&Phase::Before).unwrap(), "\"before\"");
		assert_eq!(Phase::After.to_string(), "after");
	}
}
