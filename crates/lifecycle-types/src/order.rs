//! Order types for the lifecycle system.
//!
//! This module defines the order entity, the closed set of states an order
//! moves through, and the audit record type written for every accepted
//! order transition.

use crate::{choices_enum, ChoicesEnum, Stateful, TransitionRecord};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

choices_enum! {
	/// Lifecycle state of an order.
	pub enum OrderState {
		/// Created, waiting for the customer to pay.
		PendingPayment = "pending_payment";
		/// Paid and being prepared.
		Processing = "processing";
		/// Handed over to the courier.
		OutForDelivery = "out_for_delivery";
		/// Received by the customer.
		Delivered = "delivered", "Package Delivered";
		/// Cancelled before payment.
		Cancelled = "cancelled";
		/// Money returned to the customer.
		Refunded = "refunded";
	}
	default = PendingPayment;
}

/// Audit record of one order transition.
pub type OrderLog = TransitionRecord<OrderState>;

/// An order whose lifecycle is managed by the transition engine.
///
/// `state`, `state_changed_at` and `version` are owned by the engine;
/// `price` and `metadata` are mutated by hooks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
	/// Unique identifier for this order.
	pub id: String,
	/// What was ordered.
	pub item: String,
	/// Current lifecycle state.
	pub state: OrderState,
	/// Time of the most recent accepted transition (creation time before any).
	pub state_changed_at: DateTime<Utc>,
	/// Price with two decimal places.
	pub price: Decimal,
	/// Free-form data collected by hooks (payment method, discount, ...).
	#[serde(default)]
	pub metadata: serde_json::Map<String, serde_json::Value>,
	/// Timestamp when this order was created.
	pub created_at: DateTime<Utc>,
	/// Number of commits applied to this order.
	#[serde(default)]
	pub version: u64,
}

impl Order {
	/// Creates a new order in the default state.
	pub fn new(item: impl Into<String>, price: Decimal) -> Self {
		let now = Utc::now();
		Self {
			id: uuid::Uuid::new_v4().to_string(),
			item: item.into(),
			state: OrderState::default_state(),
			state_changed_at: now,
			price: price.round_dp(2),
			metadata: serde_json::Map::new(),
			created_at: now,
			version: 0,
		}
	}

	/// Replaces the generated identifier, mostly useful in tests.
	pub fn with_id(mut self, id: impl Into<String>) -> Self {
		self.id = id.into();
		self
	}
}

impl Stateful for Order {
	type State = OrderState;

	fn id(&self) -> &str {
		&self.id
	}

	fn state(&self) -> OrderState {
		self.state
	}

	fn state_changed_at(&self) -> DateTime<Utc> {
		self.state_changed_at
	}

	fn set_state(&mut self, state: OrderState, at: DateTime<Utc>) {
		self.state = state;
		self.state_changed_at = at;
	}

	fn version(&self) -> u64 {
		self.version
	}

	fn set_version(&mut self, version: u64) {
		self.version = version;
	}
}
