//! Core transition engine for the order lifecycle system.
//!
//! This crate ties the pieces together: the adjacency tables that decide which
//! state changes are legal, the hook registry that attaches behaviour to
//! `(state, phase)` pairs, the repository that commits a state change and its
//! transition record atomically, and the engine that orchestrates a
//! transition from validation to after hooks.

pub mod builder;
pub mod engine;
pub mod hooks;
pub mod repository;
pub mod state;

pub use builder::{BuilderError, EngineBuilder, EngineFactories};
pub use engine::{OrderEngine, TransitionEngine, TransitionError};
pub use hooks::{
	install_order_hooks, order_hooks, Hook, HookError, HookRegistry, RegisteredHook, RegistryError,
};
pub use repository::{RecordOf, Repository, StorageOrderRepository, StoreError};
pub use state::{order_transitions, TransitionTable};
