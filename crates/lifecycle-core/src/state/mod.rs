//! State adjacency for lifecycle entities.
//!
//! This module holds the static tables that decide which state changes are
//! legal, independent of hooks and persistence.

pub mod table;

pub use table::{order_transitions, TransitionTable};
