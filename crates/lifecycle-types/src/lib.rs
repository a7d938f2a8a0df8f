//! Types shared by every lifecycle crate.
//!
//! Choice enumerations, the order entity, transition records and the small
//! registry and validation contracts the storage backends implement.

/// Closed enumerations with machine values and labels.
pub mod choices;
/// The order entity and its states.
pub mod order;
/// Registry trait for pluggable implementations.
pub mod registry;
/// Storage namespaces.
pub mod storage;
/// Transition parameters, phases, records and the entity contract.
pub mod transition;
/// Utility functions for log formatting.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use choices::*;
pub use order::*;
pub use registry::*;
pub use storage::*;
pub use transition::*;
pub use utils::truncate_id;
pub use validation::*;

#[doc(hidden)]
pub use serde as __serde;
