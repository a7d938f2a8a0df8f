//! End-to-end order scenarios against the memory-backed repository.

use lifecycle_core::{
	order_transitions, HookError, HookRegistry, OrderEngine, Repository, StorageOrderRepository,
	TransitionEngine, TransitionError,
};
use lifecycle_storage::{implementations::memory::MemoryStorage, StorageService};
use lifecycle_types::{ChoicesEnum, Order, OrderState, Phase, TransitionParams};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

fn params(value: Value) -> TransitionParams {
	match value {
		Value::Object(map) => map,
		other => panic!("not an object: {other}"),
	}
}

fn dec(raw: &str) -> Decimal {
	raw.parse().unwrap()
}

fn check_payment(order: &mut Order, params: &TransitionParams) -> Result<(), HookError> {
	match params.get("payment_method").and_then(Value::as_str) {
		Some(method @ ("cash" | "card")) => {
			order
				.metadata
				.insert("payment_method".into(), json!(method));
			Ok(())
		},
		Some(other) => Err(HookError::Validation(format!(
			"Invalid payment method: {other}"
		))),
		None => Err(HookError::Validation(
			"Invalid payment method: None".into(),
		)),
	}
}

fn apply_discount(order: &mut Order, params: &TransitionParams) -> Result<(), HookError> {
	let Some(discount) = params.get("discount").and_then(Value::as_u64) else {
		return Ok(());
	};
	let factor = Decimal::ONE - Decimal::from(discount) / Decimal::from(100);
	order.price = (order.price * factor).round_dp(2);
	Ok(())
}

struct Fixture {
	engine: OrderEngine,
	repository: Arc<StorageOrderRepository>,
	notifications: Arc<Mutex<Vec<String>>>,
}

fn fixture() -> Fixture {
	let notifications = Arc::new(Mutex::new(Vec::new()));
	let mut hooks = HookRegistry::<Order>::new();
	hooks.register_hook(OrderState::Processing, Phase::Before, check_payment);
	hooks.register_hook(OrderState::Processing, Phase::Before, apply_discount);

	let sent = notifications.clone();
	let notify = hooks.register_hook(
		OrderState::Cancelled,
		Phase::After,
		move |order: &mut Order, _: &TransitionParams| {
			sent.lock()
				.unwrap()
				.push(format!("{} is now {}", order.id, order.state));
			order
				.metadata
				.insert("questionnaire_sent".into(), json!(true));
			Ok(())
		},
	);
	hooks.register_shared(OrderState::Refunded, Phase::After, &notify);

	let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
	let repository = Arc::new(StorageOrderRepository::new(storage));
	let engine = TransitionEngine::new(order_transitions(), Arc::new(hooks), repository.clone());
	Fixture {
		engine,
		repository,
		notifications,
	}
}

#[test]
fn payment_with_discount_moves_to_processing() {
	let fx = fixture();
	let mut order = Order::new("Book", dec("50.00"));
	fx.engine.create(&order).unwrap();

	let record = fx
		.engine
		.transition(
			&mut order,
			OrderState::Processing,
			params(json!({"payment_method": "cash", "discount": 10})),
		)
		.unwrap();

	assert_eq!(order.state, OrderState::Processing);
	assert_eq!(order.price, dec("45.00"));
	assert_eq!(order.metadata["payment_method"], "cash");

	let history = fx.repository.history(&order.id).unwrap();
	assert_eq!(history.len(), 1);
	assert_eq!(history[0], record);
	assert_eq!(history[0].old_state, OrderState::PendingPayment);
	assert_eq!(history[0].new_state, OrderState::Processing);
	assert_eq!(
		Value::Object(history[0].extra.clone()),
		json!({"payment_method": "cash", "discount": 10})
	);
	assert_eq!(fx.repository.load(&order.id).unwrap().price, dec("45.00"));
}

#[test]
fn missing_payment_method_is_vetoed() {
	let fx = fixture();
	let mut order = Order::new("Book", dec("50.00"));
	fx.engine.create(&order).unwrap();
	let changed_at = order.state_changed_at;

	let err = fx
		.engine
		.transition(&mut order, OrderState::Processing, TransitionParams::new())
		.unwrap_err();

	assert!(matches!(err, TransitionError::HookValidation { .. }));
	assert_eq!(err.to_string(), "Invalid payment method: None");
	assert_eq!(order.state, OrderState::PendingPayment);
	assert_eq!(order.state_changed_at, changed_at);
	assert!(fx.repository.history(&order.id).unwrap().is_empty());
	assert_eq!(
		fx.repository.load(&order.id).unwrap().state,
		OrderState::PendingPayment
	);
}

#[test]
fn unknown_payment_method_is_vetoed_before_discount() {
	let fx = fixture();
	let mut order = Order::new("Book", dec("50.00"));
	fx.engine.create(&order).unwrap();

	let err = fx
		.engine
		.transition(
			&mut order,
			OrderState::Processing,
			params(json!({"payment_method": "bitcoin", "discount": 50})),
		)
		.unwrap_err();

	assert_eq!(err.to_string(), "Invalid payment method: bitcoin");
	assert_eq!(order.price, dec("50.00"));
}

#[test]
fn skipping_a_state_is_illegal() {
	let fx = fixture();
	let mut order = Order::new("Book", dec("50.00"));
	fx.engine.create(&order).unwrap();
	fx.engine
		.transition(
			&mut order,
			OrderState::Processing,
			params(json!({"payment_method": "card"})),
		)
		.unwrap();
	let snapshot = order.clone();

	let err = fx
		.engine
		.transition(&mut order, OrderState::Delivered, TransitionParams::new())
		.unwrap_err();

	assert!(matches!(
		err,
		TransitionError::IllegalTransition {
			from: OrderState::Processing,
			to: OrderState::Delivered
		}
	));
	assert_eq!(order, snapshot);
	assert_eq!(fx.repository.history(&order.id).unwrap().len(), 1);
}

#[test]
fn refund_after_delivery_runs_after_hook_without_persisting_it() {
	let fx = fixture();
	let mut order = Order::new("Book", dec("50.00"));
	fx.engine.create(&order).unwrap();
	for (target, extra) in [
		(OrderState::Processing, json!({"payment_method": "card"})),
		(OrderState::OutForDelivery, json!({})),
		(OrderState::Delivered, json!({})),
	] {
		fx.engine
			.transition(&mut order, target, params(extra))
			.unwrap();
	}
	assert_eq!(
		fx.engine.possible_next_states(&order),
		vec![OrderState::Refunded]
	);

	fx.engine
		.transition(&mut order, OrderState::Refunded, TransitionParams::new())
		.unwrap();

	assert_eq!(order.state, OrderState::Refunded);
	assert_eq!(
		*fx.notifications.lock().unwrap(),
		vec![format!("{} is now refunded", order.id)]
	);
	assert_eq!(order.metadata["questionnaire_sent"], true);

	let stored = fx.repository.load(&order.id).unwrap();
	assert_eq!(stored.state, OrderState::Refunded);
	assert!(!stored.metadata.contains_key("questionnaire_sent"));

	let history = fx.repository.history(&order.id).unwrap();
	let path: Vec<_> = history
		.iter()
		.map(|r| (r.old_state.value(), r.new_state.value()))
		.collect();
	assert_eq!(
		path,
		vec![
			("pending_payment", "processing"),
			("processing", "out_for_delivery"),
			("out_for_delivery", "delivered"),
			("delivered", "refunded"),
		]
	);
	assert!(history
		.windows(2)
		.all(|pair| pair[0].timestamp <= pair[1].timestamp));
	assert!(fx.engine.possible_next_states(&order).is_empty());
}

#[test]
fn every_illegal_pair_is_rejected() {
	let fx = fixture();
	let table = order_transitions();
	for from in OrderState::members() {
		for to in OrderState::members() {
			if table.is_allowed(*from, *to) {
				continue;
			}
			let mut order = Order::new("Racer", dec("1.00"));
			order.state = *from;
			fx.engine.create(&order).unwrap();

			let err = fx
				.engine
				.transition(&mut order, *to, TransitionParams::new())
				.unwrap_err();
			assert!(matches!(err, TransitionError::IllegalTransition { .. }));
			assert_eq!(order.state, *from);
			assert!(fx.repository.history(&order.id).unwrap().is_empty());
		}
	}
}

#[test]
fn concurrent_transitions_commit_once() {
	let fx = fixture();
	let order = Order::new("Book", dec("50.00"));
	fx.engine.create(&order).unwrap();

	let handles: Vec<_> = (0..4)
		.map(|_| {
			let engine = fx.engine.clone();
			let mut copy = order.clone();
			std::thread::spawn(move || {
				engine
					.transition(&mut copy, OrderState::Cancelled, TransitionParams::new())
					.is_ok()
			})
		})
		.collect();
	let successes = handles
		.into_iter()
		.map(|h| h.join().unwrap())
		.filter(|ok| *ok)
		.count();

	assert_eq!(successes, 1);
	assert_eq!(fx.repository.history(&order.id).unwrap().len(), 1);
}
