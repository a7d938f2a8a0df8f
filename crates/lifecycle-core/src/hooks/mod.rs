//! Hook registry for state transitions.
//!
//! Hooks are callbacks attached to a `(state, phase)` pair. Every hook
//! registered for the target state of a transition runs, in registration
//! order, either before the change is committed (where it may veto it) or
//! after it (for side effects only).
//!
//! Registries are filled during initialization and are read-only once shared.
//! The process-wide order registry is installed exactly once through
//! [`install_order_hooks`].

use lifecycle_types::{ChoicesEnum, Order, Phase, Stateful, TransitionParams};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors a hook may return.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
	/// The supplied parameters were rejected; the transition is vetoed.
	#[error("{0}")]
	Validation(String),
	/// The hook failed for a reason other than parameter validation.
	#[error("{0}")]
	Failed(String),
}

/// Errors that can occur while installing a process-wide registry.
#[derive(Debug, Error)]
pub enum RegistryError {
	#[error("Hook registry already installed")]
	AlreadyInstalled,
}

/// Shared callback invoked with the entity and the transition parameters.
pub type Hook<E> =
	Arc<dyn Fn(&mut E, &TransitionParams) -> Result<(), HookError> + Send + Sync>;

/// A hook as stored in a registry, with the name used in log output.
///
/// Returned by [`HookRegistry::register_hook`]; pass it to
/// [`HookRegistry::register_shared`] to run the same callback for another
/// `(state, phase)` pair.
pub struct RegisteredHook<E> {
	name: &'static str,
	hook: Hook<E>,
}

impl<E> Clone for RegisteredHook<E> {
	fn clone(&self) -> Self {
		Self {
			name: self.name,
			hook: self.hook.clone(),
		}
	}
}

impl<E> RegisteredHook<E> {
	pub fn name(&self) -> &'static str {
		self.name
	}
}

/// Ordered hook lists keyed by `(state, phase)`.
pub struct HookRegistry<E: Stateful> {
	hooks: HashMap<(E::State, Phase), Vec<RegisteredHook<E>>>,
}

impl<E: Stateful> Default for HookRegistry<E> {
	fn default() -> Self {
		Self::new()
	}
}

impl<E: Stateful> HookRegistry<E> {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self {
			hooks: HashMap::new(),
		}
	}

	/// Appends `hook` to the list for `(state, phase)`.
	pub fn register_hook<H>(&mut self, state: E::State, phase: Phase, hook: H) -> RegisteredHook<E>
	where
		H: Fn(&mut E, &TransitionParams) -> Result<(), HookError> + Send + Sync + 'static,
	{
		let registered = RegisteredHook {
			name: std::any::type_name::<H>(),
			hook: Arc::new(hook),
		};
		self.register_shared(state, phase, &registered);
		registered
	}

	/// Appends an already registered hook to the list for `(state, phase)`.
	pub fn register_shared(&mut self, state: E::State, phase: Phase, hook: &RegisteredHook<E>) {
		tracing::debug!(%state, %phase, hook = hook.name, "Registered hook");
		self.hooks
			.entry((state, phase))
			.or_default()
			.push(hook.clone());
	}

	/// Runs the hooks for `(state, phase)` in registration order.
	///
	/// The first failure stops execution and is returned unchanged.
	pub fn execute_hooks(
		&self,
		phase: Phase,
		state: E::State,
		entity: &mut E,
		params: &TransitionParams,
	) -> Result<(), HookError> {
		let Some(entries) = self.hooks.get(&(state, phase)) else {
			return Ok(());
		};
		for entry in entries {
			if let Err(e) = (entry.hook)(entity, params) {
				tracing::debug!(%state, %phase, hook = entry.name, error = %e, "Hook failed");
				return Err(e);
			}
		}
		Ok(())
	}

	/// Number of hooks registered for `(state, phase)`.
	pub fn count(&self, state: E::State, phase: Phase) -> usize {
		self.hooks.get(&(state, phase)).map_or(0, Vec::len)
	}

	/// Summary of every non-empty `(state, phase)` list, in state declaration
	/// order.
	pub fn summary(&self) -> Vec<(E::State, Phase, usize)> {
		let mut summary = Vec::new();
		for state in E::State::members() {
			for phase in [Phase::Before, Phase::After] {
				let count = self.count(*state, phase);
				if count > 0 {
					summary.push((*state, phase, count));
				}
			}
		}
		summary
	}
}

static ORDER_HOOKS: OnceCell<Arc<HookRegistry<Order>>> = OnceCell::new();

/// Installs the process-wide order hook registry.
///
/// Must be called once, after every hook has been registered and before the
/// first transition runs.
pub fn install_order_hooks(
	registry: HookRegistry<Order>,
) -> Result<Arc<HookRegistry<Order>>, RegistryError> {
	let registry = Arc::new(registry);
	ORDER_HOOKS
		.set(registry.clone())
		.map_err(|_| RegistryError::AlreadyInstalled)?;
	tracing::info!(hooks = registry.summary().len(), "Installed order hooks");
	Ok(registry)
}

/// Returns the installed order registry, or an empty one if none was installed.
pub fn order_hooks() -> Arc<HookRegistry<Order>> {
	ORDER_HOOKS
		.get()
		.cloned()
		.unwrap_or_else(|| Arc::new(HookRegistry::new()))
}
