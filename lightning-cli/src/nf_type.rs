//! Resolves the `gnb`/`ue` subcommand into a concrete [`nf_base::NfInstance`]
//! and drives its full lifecycle: load + validate config, install tracing,
//! build the runtime named by `RuntimeConfig`, run until a shutdown signal
//! arrives, then let the instance's own `start()` return. Mirrors
//! `original_source/cmd/ue.go`'s `ueFunc`/signal-wait pattern, generalized
//! from "one NF, one hard-coded config type" to the two this workspace has.

use std::fs::File;
use std::io::Read;
use std::sync::Arc;

use color_eyre::eyre::{Context, Result, eyre};
use nf_base::{LoggingConfig, NfConfig, NfInstance, RuntimeConfig, RuntimeType};
use parsing::YamlParser;
use serde_valid::Validate;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub const GNB_STR: &str = "gnb";
pub const UE_STR: &str = "ue";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NfType {
	Gnb,
	Ue,
}

impl NfType {
	pub fn from_str(s: &str) -> Option<Self> {
		match s {
			GNB_STR => Some(Self::Gnb),
			UE_STR => Some(Self::Ue),
			_ => None,
		}
	}

	pub fn to_str(&self) -> &'static str {
		match self {
			Self::Gnb => GNB_STR,
			Self::Ue => UE_STR,
		}
	}
}

fn read_config_file(config_path: &str) -> Result<String> {
	let mut file = File::open(config_path).wrap_err_with(|| format!("opening config file {config_path}"))?;
	let mut contents = String::new();
	file.read_to_string(&mut contents).wrap_err("reading config file")?;
	Ok(contents)
}

pub struct App;

impl App {
	pub fn start_app(nf_type: &str, config_path: &str) -> Result<()> {
		let nf_type = NfType::from_str(nf_type).ok_or_else(|| eyre!("unknown network function {nf_type:?}"))?;
		match nf_type {
			NfType::Gnb => run_nf::<gnb_app::GnbApp>(config_path),
			NfType::Ue => run_nf::<ue_app::UeApp>(config_path),
		}
	}
}

fn run_nf<A>(config_path: &str) -> Result<()>
where
	A: NfInstance + Send + Sync + 'static,
	A::Config: Validate,
{
	let contents = read_config_file(config_path)?;
	let config: A::Config = YamlParser::from_yaml(&contents);
	config.validate().map_err(|e| eyre!(e.to_string())).wrap_err("config failed validation")?;

	init_tracing(config.get_log_config());
	let runtime = build_runtime(config.get_runtime_config())?;
	runtime.block_on(drive::<A>(config))
}

fn init_tracing(logging: &LoggingConfig) {
	if !logging.enable {
		return;
	}
	let filter = tracing_subscriber::EnvFilter::try_new(&logging.level).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
	tracing_subscriber::fmt().with_env_filter(filter).with_target(logging.report_caller).init();
}

fn build_runtime(runtime: &RuntimeConfig) -> Result<tokio::runtime::Runtime> {
	let mut builder = match runtime.rt_type {
		RuntimeType::Single => tokio::runtime::Builder::new_current_thread(),
		RuntimeType::Multi => tokio::runtime::Builder::new_multi_thread(),
	};
	builder.enable_all().build().wrap_err("building tokio runtime")
}

async fn drive<A>(config: A::Config) -> Result<()>
where
	A: NfInstance + Send + Sync + 'static,
{
	let shutdown = CancellationToken::new();
	let app = Arc::new(A::initialize(config, shutdown.clone()).map_err(|e| eyre!(e.to_string()))?);
	let start_task = tokio::spawn(async move { app.start().await });
	tokio::pin!(start_task);

	tokio::select! {
		_ = wait_for_signal() => {
			info!("shutdown signal received, stopping");
			shutdown.cancel();
			join_start_task(start_task.await)
		}
		result = &mut start_task => {
			join_start_task(result)
		}
	}
}

fn join_start_task<E: std::error::Error>(result: Result<Result<(), E>, tokio::task::JoinError>) -> Result<()> {
	match result {
		Ok(Ok(())) => Ok(()),
		Ok(Err(e)) => Err(eyre!(e.to_string())),
		Err(e) => Err(eyre!(e.to_string())),
	}
}

async fn wait_for_signal() {
	let ctrl_c = tokio::signal::ctrl_c();
	#[cfg(unix)]
	{
		let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).expect("installing SIGTERM handler");
		tokio::select! {
			_ = ctrl_c => {}
			_ = terminate.recv() => {}
		}
	}
	#[cfg(not(unix))]
	{
		let _ = ctrl_c.await;
	}
}
