//! Main entry point for `orderctl`, the order lifecycle operator tool.
//!
//! The binary loads the configuration, installs the built-in order hooks,
//! builds the transition engine on the configured storage backend and runs a
//! single operator command against it.

use clap::Parser;
use lifecycle_config::Config;
use lifecycle_core::{
	install_order_hooks, EngineBuilder, EngineFactories, HookRegistry, OrderEngine,
};
use lifecycle_types::Order;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

mod commands;
mod hooks;

/// Command-line arguments for the operator tool.
#[derive(Parser, Debug)]
#[command(name = "orderctl", author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml", env = "ORDERCTL_CONFIG")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "warn")]
	log_level: String,

	#[command(subcommand)]
	command: commands::Command,
}

/// Loads the configuration, installs the order hooks once for the process
/// and runs the requested command. Logs go to stderr, command output to
/// stdout.
fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	// RUST_LOG wins over --log-level
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_writer(std::io::stderr)
		.with_target(true)
		.init();

	let config = Config::from_file(&args.config)?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let notifier: Arc<dyn hooks::Notifier> = Arc::new(hooks::ConsoleNotifier);
	let registry = install_order_hooks(hooks::order_registry(&config.hooks, notifier))?;
	let engine = build_engine(config, registry)?;

	let stdout = std::io::stdout();
	let mut out = stdout.lock();
	if let Err(e) = commands::run(&engine, args.command, &mut out) {
		tracing::debug!(error = ?e, "Command failed");
		return Err(e.into());
	}
	Ok(())
}

/// Builds the order engine with the available storage implementations.
fn build_engine(
	config: Config,
	hooks: Arc<HookRegistry<Order>>,
) -> Result<OrderEngine, Box<dyn std::error::Error>> {
	let storage_factories: HashMap<_, _> = lifecycle_storage::get_all_implementations()
		.into_iter()
		.map(|(name, factory)| (name.to_string(), factory))
		.collect();

	let engine = EngineBuilder::new(config)
		.with_hooks(hooks)
		.build(EngineFactories { storage_factories })?;
	Ok(engine)
}
