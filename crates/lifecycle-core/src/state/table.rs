//! Adjacency tables describing which state changes are legal.

use lifecycle_types::{ChoicesEnum, OrderState};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Static map from a state to the set of states it may move to.
///
/// States without an entry, or with an empty entry, are terminal.
#[derive(Debug, Clone)]
pub struct TransitionTable<S: ChoicesEnum> {
	edges: HashMap<S, HashSet<S>>,
}

impl<S: ChoicesEnum> Default for TransitionTable<S> {
	fn default() -> Self {
		Self::new()
	}
}

impl<S: ChoicesEnum> TransitionTable<S> {
	/// Creates an empty table in which every state is terminal.
	pub fn new() -> Self {
		Self {
			edges: HashMap::new(),
		}
	}

	/// Declares the legal targets of `from`, adding to any declared earlier.
	pub fn allow(mut self, from: S, targets: impl IntoIterator<Item = S>) -> Self {
		self.edges.entry(from).or_default().extend(targets);
		self
	}

	/// Declares `state` as terminal.
	pub fn terminal(mut self, state: S) -> Self {
		self.edges.entry(state).or_default();
		self
	}

	/// Returns true if `to` is a legal successor of `from`.
	pub fn is_allowed(&self, from: S, to: S) -> bool {
		self.edges.get(&from).is_some_and(|set| set.contains(&to))
	}

	/// Legal successors of `from`, in member declaration order.
	pub fn next_states(&self, from: S) -> Vec<S> {
		match self.edges.get(&from) {
			Some(targets) => S::members()
				.iter()
				.copied()
				.filter(|state| targets.contains(state))
				.collect(),
			None => Vec::new(),
		}
	}

	/// Returns true if no transition leaves `state`.
	pub fn is_terminal(&self, state: S) -> bool {
		self.edges.get(&state).is_none_or(HashSet::is_empty)
	}
}

// Static transition table - each state maps to allowed next states
static ORDER_TRANSITIONS: Lazy<Arc<TransitionTable<OrderState>>> = Lazy::new(|| {
	Arc::new(
		TransitionTable::new()
			.allow(
				OrderState::PendingPayment,
				[OrderState::Processing, OrderState::Cancelled],
			)
			.allow(
				OrderState::Processing,
				[OrderState::OutForDelivery, OrderState::Refunded],
			)
			.allow(
				OrderState::OutForDelivery,
				[OrderState::Delivered, OrderState::Refunded],
			)
			.allow(OrderState::Delivered, [OrderState::Refunded])
			.terminal(OrderState::Cancelled)
			.terminal(OrderState::Refunded),
	)
});

/// The adjacency table for orders.
pub fn order_transitions() -> Arc<TransitionTable<OrderState>> {
	ORDER_TRANSITIONS.clone()
}
