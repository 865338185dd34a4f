use std::{error, fmt};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio_util::sync::CancellationToken;

/// Common lifecycle shape shared by the gNB and the UE binaries: built from a
/// validated config, then run until `shutdown` is cancelled. Unlike the core
/// network functions this crate was adapted from, neither peer registers
/// with an NRF, so the trait only covers init/start.
pub trait NfInstance: Sized {
	type Config: DeserializeOwned + fmt::Debug + NfConfig;
	type Error: error::Error + Send + Sync + 'static;
	fn initialize(
		cfg: Self::Config,
		shutdown: CancellationToken,
	) -> Result<Self, Self::Error>;
	async fn start(&self) -> Result<(), Self::Error>;
}

pub trait NfConfig {
	fn get_log_config(&self) -> &LoggingConfig;
	fn get_runtime_config(&self) -> &RuntimeConfig;
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
	pub enable: bool,
	pub level: String,
	pub report_caller: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
	#[serde(rename = "type")]
	pub rt_type: RuntimeType,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum RuntimeType {
	#[serde(rename = "single")]
	Single,
	#[serde(rename = "multi")]
	Multi,
}
