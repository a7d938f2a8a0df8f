//! Transition engine that drives an entity through its lifecycle.
//!
//! A transition validates the target against the adjacency table, runs the
//! `before` hooks of the target state, commits the new state together with a
//! transition record, and finally runs the `after` hooks.
//!
//! Before hooks operate on a scratch copy of the entity. The caller's entity
//! only changes once the commit has succeeded, so an aborted transition never
//! leaves partial mutations behind. After hooks run on the committed entity;
//! whatever they change is not persisted.

use crate::hooks::{HookError, HookRegistry};
use crate::repository::{RecordOf, Repository, StoreError};
use crate::state::TransitionTable;
use chrono::Utc;
use lifecycle_types::{
	truncate_id, ChoicesEnum, Order, Phase, Stateful, TransitionParams, TransitionRecord,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Errors that can occur while running a transition.
#[derive(Debug, Error)]
pub enum TransitionError<S: ChoicesEnum> {
	/// The target is not a legal successor of the current state.
	#[error("Can't transition from {from} to {to}")]
	IllegalTransition { from: S, to: S },
	/// A before hook rejected the parameters.
	#[error("{message}")]
	HookValidation { state: S, message: String },
	/// A before hook failed for another reason.
	#[error("Hook for {state} failed: {message}")]
	HookFailed { state: S, message: String },
	/// The entity does not exist in the repository.
	#[error("Entity not found: {0}")]
	NotFound(String),
	/// Saving the entity or appending the record failed; nothing was committed.
	#[error("Persistence error: {0}")]
	Persistence(String),
	/// The stored entity changed since it was loaded; nothing was committed.
	#[error("Entity {id} was modified concurrently (expected version {expected})")]
	Conflict { id: String, expected: u64 },
	/// The transition was committed but an after hook failed.
	#[error("Transition committed but an after hook failed: {message}")]
	AfterHook {
		record: Box<TransitionRecord<S>>,
		message: String,
	},
}

impl<S: ChoicesEnum> TransitionError<S> {
	/// Returns true if the transition was persisted despite the error.
	pub fn is_committed(&self) -> bool {
		matches!(self, TransitionError::AfterHook { .. })
	}
}

impl<S: ChoicesEnum> From<StoreError> for TransitionError<S> {
	fn from(err: StoreError) -> Self {
		match err {
			StoreError::NotFound(id) => TransitionError::NotFound(id),
			StoreError::VersionConflict { id, expected, .. } => {
				TransitionError::Conflict { id, expected }
			},
			other => TransitionError::Persistence(other.to_string()),
		}
	}
}

/// Engine for a single entity type.
pub struct TransitionEngine<E: Stateful> {
	table: Arc<TransitionTable<E::State>>,
	hooks: Arc<HookRegistry<E>>,
	repository: Arc<dyn Repository<Entity = E>>,
}

/// Engine for orders.
pub type OrderEngine = TransitionEngine<Order>;

impl<E: Stateful> Clone for TransitionEngine<E> {
	fn clone(&self) -> Self {
		Self {
			table: self.table.clone(),
			hooks: self.hooks.clone(),
			repository: self.repository.clone(),
		}
	}
}

impl<E: Stateful> TransitionEngine<E> {
	pub fn new(
		table: Arc<TransitionTable<E::State>>,
		hooks: Arc<HookRegistry<E>>,
		repository: Arc<dyn Repository<Entity = E>>,
	) -> Self {
		Self {
			table,
			hooks,
			repository,
		}
	}

	/// Legal successors of the entity's current state.
	pub fn possible_next_states(&self, entity: &E) -> Vec<E::State> {
		self.table.next_states(entity.state())
	}

	/// Moves `entity` to `target`.
	///
	/// On success the entity carries the new state, timestamp and version,
	/// and the created record is returned. On any error other than
	/// [`TransitionError::AfterHook`] the entity is left untouched.
	#[instrument(
		skip_all,
		fields(order_id = %truncate_id(entity.id()), from = %entity.state(), to = %target)
	)]
	pub fn transition(
		&self,
		entity: &mut E,
		target: E::State,
		params: TransitionParams,
	) -> Result<RecordOf<E>, TransitionError<E::State>> {
		let from = entity.state();
		if !self.table.is_allowed(from, target) {
			tracing::warn!("Rejected illegal transition");
			return Err(TransitionError::IllegalTransition { from, to: target });
		}

		let expected_version = entity.version();
		let mut scratch = entity.clone();
		self.hooks
			.execute_hooks(Phase::Before, target, &mut scratch, &params)
			.map_err(|e| {
				tracing::info!(error = %e, "Transition vetoed");
				match e {
					HookError::Validation(message) => TransitionError::HookValidation {
						state: target,
						message,
					},
					HookError::Failed(message) => TransitionError::HookFailed {
						state: target,
						message,
					},
				}
			})?;

		// Never move the timestamp backwards.
		let now = Utc::now().max(scratch.state_changed_at());
		scratch.set_state(target, now);
		let record = TransitionRecord::new(scratch.id(), now, from, target, params);

		let version = self
			.repository
			.commit(&scratch, expected_version, &record)
			.map_err(|e| {
				tracing::error!(error = %e, "Failed to commit transition");
				TransitionError::from(e)
			})?;
		scratch.set_version(version);
		*entity = scratch;
		tracing::info!(version, "Transitioned");

		if let Err(e) = self
			.hooks
			.execute_hooks(Phase::After, target, entity, &record.extra)
		{
			tracing::warn!(error = %e, "After hook failed");
			return Err(TransitionError::AfterHook {
				record: Box::new(record),
				message: e.to_string(),
			});
		}

		Ok(record)
	}

	/// Loads an entity by id and moves it to `target`.
	pub fn transition_by_id(
		&self,
		id: &str,
		target: E::State,
		params: TransitionParams,
	) -> Result<(E, RecordOf<E>), TransitionError<E::State>> {
		let mut entity = self.repository.load(id)?;
		let record = self.transition(&mut entity, target, params)?;
		Ok((entity, record))
	}

	/// Stores a new entity.
	#[instrument(skip_all, fields(order_id = %truncate_id(entity.id())))]
	pub fn create(&self, entity: &E) -> Result<(), StoreError> {
		self.repository.create(entity)?;
		tracing::info!(state = %entity.state(), "Created");
		Ok(())
	}

	pub fn load(&self, id: &str) -> Result<E, StoreError> {
		self.repository.load(id)
	}

	pub fn history(&self, id: &str) -> Result<Vec<RecordOf<E>>, StoreError> {
		self.repository.history(id)
	}

	pub fn list(&self) -> Result<Vec<E>, StoreError> {
		self.repository.list()
	}

	pub fn hooks(&self) -> &HookRegistry<E> {
		&self.hooks
	}
}
