//! Built-in order hooks.
//!
//! Payment and discount checks guard the move to `processing`, a delivery
//! date is required before `out_for_delivery`, and customers are notified
//! after payment, dispatch, delivery, cancellation and refund.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use lifecycle_config::HooksConfig;
use lifecycle_core::{HookError, HookRegistry};
use lifecycle_types::{Order, OrderState, Phase, TransitionParams};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
#[cfg(test)]
use std::sync::Mutex;

/// Destination of customer-facing messages sent by after hooks.
pub trait Notifier: Send + Sync {
	fn notify(&self, message: &str);
}

/// Prints notifications to standard output.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
	fn notify(&self, message: &str) {
		println!("{}", message);
	}
}

/// Keeps notifications in memory.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingNotifier {
	messages: Mutex<Vec<String>>,
}

#[cfg(test)]
impl RecordingNotifier {
	pub fn messages(&self) -> Vec<String> {
		self.messages
			.lock()
			.map(|messages| messages.clone())
			.unwrap_or_default()
	}
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
	fn notify(&self, message: &str) {
		if let Ok(mut messages) = self.messages.lock() {
			messages.push(message.to_string());
		}
	}
}

/// Builds a registry holding every built-in hook.
pub fn order_registry(config: &HooksConfig, notifier: Arc<dyn Notifier>) -> HookRegistry<Order> {
	let mut registry = HookRegistry::new();

	registry.register_hook(
		OrderState::Processing,
		Phase::Before,
		validate_payment_method(config.payment_methods.clone()),
	);
	registry.register_hook(
		OrderState::Processing,
		Phase::Before,
		apply_discount(Decimal::from(config.max_discount_percent)),
	);
	registry.register_hook(
		OrderState::Processing,
		Phase::After,
		notify_payment_success(notifier.clone()),
	);

	registry.register_hook(OrderState::OutForDelivery, Phase::Before, validate_delivery_date);
	registry.register_hook(
		OrderState::OutForDelivery,
		Phase::After,
		notify_out_for_delivery(notifier.clone()),
	);

	registry.register_hook(
		OrderState::Delivered,
		Phase::After,
		notify_delivery_success(notifier.clone()),
	);

	let questionnaire =
		registry.register_hook(OrderState::Cancelled, Phase::After, send_questionnaire(notifier));
	registry.register_shared(OrderState::Refunded, Phase::After, &questionnaire);

	registry
}

/// Renders a parameter the way it appears in validation messages.
fn describe(value: Option<&Value>) -> String {
	match value {
		None | Some(Value::Null) => "None".to_string(),
		Some(Value::String(s)) => s.clone(),
		Some(other) => other.to_string(),
	}
}

/// Accepts only the configured payment methods and records the one used.
fn validate_payment_method(
	accepted: Vec<String>,
) -> impl Fn(&mut Order, &TransitionParams) -> Result<(), HookError> + Send + Sync + 'static {
	move |order, params| {
		let value = params.get("payment_method");
		match value.and_then(Value::as_str) {
			Some(method) if accepted.iter().any(|m| m == method) => {
				order
					.metadata
					.insert("payment_method".into(), Value::String(method.to_string()));
				Ok(())
			},
			_ => Err(HookError::Validation(format!(
				"Invalid payment method: {}",
				describe(value)
			))),
		}
	}
}

/// Applies an optional percentage discount to the price.
fn apply_discount(
	max_percent: Decimal,
) -> impl Fn(&mut Order, &TransitionParams) -> Result<(), HookError> + Send + Sync + 'static {
	move |order, params| {
		let value = match params.get("discount") {
			None | Some(Value::Null) => return Ok(()),
			Some(value) => value,
		};
		let invalid = || {
			HookError::Validation(format!(
				"Invalid discount percentage: {}",
				describe(Some(value))
			))
		};

		let discount = match value {
			Value::Number(n) => Decimal::from_str(&n.to_string())
				.or_else(|_| Decimal::from_scientific(&n.to_string()))
				.map_err(|_| invalid())?,
			_ => return Err(invalid()),
		};
		if discount < Decimal::ZERO || discount > max_percent {
			return Err(invalid());
		}

		let factor = Decimal::ONE - discount / Decimal::ONE_HUNDRED;
		order.price = (order.price * factor).round_dp(2);
		order.metadata.insert("discount".into(), value.clone());
		Ok(())
	}
}

/// Parses an ISO 8601 date or date-time. Values without an offset are UTC.
fn parse_delivery_date(raw: &str) -> Option<DateTime<Utc>> {
	if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
		return Some(at.with_timezone(&Utc));
	}
	const FORMATS: [&str; 4] = [
		"%Y-%m-%dT%H:%M:%S%.f",
		"%Y-%m-%d %H:%M:%S%.f",
		"%Y-%m-%dT%H:%M",
		"%Y-%m-%d %H:%M",
	];
	for format in FORMATS {
		if let Ok(at) = NaiveDateTime::parse_from_str(raw, format) {
			return Some(at.and_utc());
		}
	}
	NaiveDate::parse_from_str(raw, "%Y-%m-%d")
		.ok()
		.and_then(|date| date.and_hms_opt(0, 0, 0))
		.map(|at| at.and_utc())
}

/// Requires a future delivery date and records it.
fn validate_delivery_date(order: &mut Order, params: &TransitionParams) -> Result<(), HookError> {
	let raw = match params.get("delivery_date") {
		None | Some(Value::Null) => {
			return Err(HookError::Validation("Delivery date is required".into()))
		},
		Some(Value::String(raw)) => raw,
		Some(other) => {
			return Err(HookError::Validation(format!("Invalid delivery date: {}", other)))
		},
	};

	let date = parse_delivery_date(raw)
		.ok_or_else(|| HookError::Validation(format!("Invalid delivery date: {}", raw)))?;
	if date < Utc::now() {
		return Err(HookError::Validation(
			"Delivery date must be in the future".into(),
		));
	}

	order
		.metadata
		.insert("delivery_date".into(), Value::String(raw.clone()));
	Ok(())
}

fn notify_payment_success(
	notifier: Arc<dyn Notifier>,
) -> impl Fn(&mut Order, &TransitionParams) -> Result<(), HookError> + Send + Sync + 'static {
	move |order, params| {
		notifier.notify(&format!("Payment for order #{} successful!", order.id));
		notifier.notify(&format!(
			"Total: {} (paid with {})",
			order.price,
			describe(params.get("payment_method"))
		));
		Ok(())
	}
}

fn notify_out_for_delivery(
	notifier: Arc<dyn Notifier>,
) -> impl Fn(&mut Order, &TransitionParams) -> Result<(), HookError> + Send + Sync + 'static {
	move |order, params| {
		let raw = describe(params.get("delivery_date"));
		let date = parse_delivery_date(&raw)
			.ok_or_else(|| HookError::Failed(format!("Invalid delivery date: {}", raw)))?;
		notifier.notify(&format!("Order #{} is out for delivery!", order.id));
		notifier.notify(&format!("Delivery date: {}", date.format("%c")));
		Ok(())
	}
}

fn notify_delivery_success(
	notifier: Arc<dyn Notifier>,
) -> impl Fn(&mut Order, &TransitionParams) -> Result<(), HookError> + Send + Sync + 'static {
	move |order, _| {
		notifier.notify(&format!("Order #{} delivered successfully!", order.id));
		Ok(())
	}
}

fn send_questionnaire(
	notifier: Arc<dyn Notifier>,
) -> impl Fn(&mut Order, &TransitionParams) -> Result<(), HookError> + Send + Sync + 'static {
	move |order, _| {
		notifier.notify(&format!(
			"We're sad to see you go! Please fill out this questionnaire about order #{}.",
			order.id
		));
		Ok(())
	}
}
