//! Operator commands run by `orderctl`.
//!
//! Each command talks to the engine and writes human-readable output to the
//! given writer. Errors are returned to the caller, which prints them and
//! exits; an order is never left half-transitioned.

use clap::Subcommand;
use lifecycle_core::{OrderEngine, StoreError, TransitionError};
use lifecycle_types::{
	parse_params, ChoicesEnum, Order, OrderLog, OrderState, ParamsError, UnknownState,
};
use rust_decimal::Decimal;
use std::io::Write;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
	#[error("{0}")]
	Transition(#[from] TransitionError<OrderState>),
	#[error("{0}")]
	Store(#[from] StoreError),
	#[error("Invalid extra data: {0}")]
	Params(#[from] ParamsError),
	#[error("{0}")]
	State(#[from] UnknownState),
	#[error("Invalid item: {0}")]
	Item(String),
	#[error("Invalid price: {0}")]
	Price(String),
	#[error("Output error: {0}")]
	Io(#[from] std::io::Error),
}

/// Subcommands of the operator tool.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
	/// List every order state with its label
	States,
	/// Create an order in the initial state
	Create {
		/// Item being ordered
		#[arg(long)]
		item: String,
		/// Price with up to two decimal places
		#[arg(long)]
		price: String,
	},
	/// Show an order and the states it can move to
	Show {
		/// Order id
		id: String,
	},
	/// List all orders
	List,
	/// Move an order to another state
	Transition {
		/// Order id
		id: String,
		/// Target state value, e.g. `processing`
		state: String,
		/// Transition parameters as a JSON object
		#[arg(long, default_value = "{}")]
		extra: String,
	},
	/// Print the transition history of an order
	History {
		/// Order id
		id: String,
	},
}

/// Runs `command` against `engine`, writing its output to `out`.
pub fn run(
	engine: &OrderEngine,
	command: Command,
	out: &mut impl Write,
) -> Result<(), CommandError> {
	match command {
		Command::States => states(out),
		Command::Create { item, price } => create(engine, item, &price, out),
		Command::Show { id } => show(engine, &id, out),
		Command::List => list(engine, out),
		Command::Transition { id, state, extra } => transition(engine, &id, &state, &extra, out),
		Command::History { id } => history(engine, &id, out),
	}
}

fn states(out: &mut impl Write) -> Result<(), CommandError> {
	for (value, label) in OrderState::choices() {
		writeln!(out, "{:<18} {}", value, label)?;
	}
	Ok(())
}

fn create(
	engine: &OrderEngine,
	item: String,
	price: &str,
	out: &mut impl Write,
) -> Result<(), CommandError> {
	if item.trim().is_empty() {
		return Err(CommandError::Item("item cannot be empty".into()));
	}
	let price: Decimal = price
		.trim()
		.parse()
		.map_err(|e: rust_decimal::Error| CommandError::Price(e.to_string()))?;
	if price.is_sign_negative() {
		return Err(CommandError::Price("price cannot be negative".into()));
	}

	let order = Order::new(item, price);
	engine.create(&order)?;
	writeln!(out, "Created order {}", order.id)?;
	write_order(&order, out)
}

fn show(engine: &OrderEngine, id: &str, out: &mut impl Write) -> Result<(), CommandError> {
	let order = engine.load(id)?;
	write_order(&order, out)?;

	let next = engine.possible_next_states(&order);
	if next.is_empty() {
		writeln!(out, "Next states: none")?;
	} else {
		let rendered: Vec<String> = next
			.iter()
			.map(|state| format!("{} ({})", state.value(), state.label()))
			.collect();
		writeln!(out, "Next states: {}", rendered.join(", "))?;
	}
	Ok(())
}

fn list(engine: &OrderEngine, out: &mut impl Write) -> Result<(), CommandError> {
	let orders = engine.list()?;
	if orders.is_empty() {
		writeln!(out, "No orders")?;
		return Ok(());
	}
	for order in orders {
		writeln!(
			out,
			"{}  {:<18} {:>10}  {}",
			order.id, order.state, order.price, order.item
		)?;
	}
	Ok(())
}

fn transition(
	engine: &OrderEngine,
	id: &str,
	state: &str,
	extra: &str,
	out: &mut impl Write,
) -> Result<(), CommandError> {
	let target = OrderState::from_value(state.trim())?;
	let params = parse_params(extra)?;

	match engine.transition_by_id(id, target, params) {
		Ok((_, record)) => {
			writeln!(out, "Order {}", record)?;
			Ok(())
		},
		Err(TransitionError::AfterHook { record, message }) => {
			writeln!(out, "Order {}", record)?;
			Err(TransitionError::AfterHook { record, message }.into())
		},
		Err(e) => Err(e.into()),
	}
}

fn history(engine: &OrderEngine, id: &str, out: &mut impl Write) -> Result<(), CommandError> {
	let records = engine.history(id)?;
	if records.is_empty() {
		writeln!(out, "No transitions")?;
	}
	for record in records {
		write_record(&record, out)?;
	}
	Ok(())
}

fn write_order(order: &Order, out: &mut impl Write) -> Result<(), CommandError> {
	writeln!(out, "Item:          {}", order.item)?;
	writeln!(out, "State:         {} ({})", order.state, order.state.label())?;
	writeln!(
		out,
		"State changed: {}",
		order.state_changed_at.format("%Y-%m-%d %H:%M:%S")
	)?;
	writeln!(out, "Price:         {}", order.price)?;
	if !order.metadata.is_empty() {
		writeln!(
			out,
			"Metadata:      {}",
			serde_json::Value::Object(order.metadata.clone())
		)?;
	}
	Ok(())
}

fn write_record(record: &OrderLog, out: &mut impl Write) -> Result<(), CommandError> {
	if record.extra.is_empty() {
		writeln!(out, "Order {}", record)?;
	} else {
		writeln!(
			out,
			"Order {}  {}",
			record,
			serde_json::Value::Object(record.extra.clone())
		)?;
	}
	Ok(())
}
