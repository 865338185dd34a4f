//! The UE engine: the simulated subscriber this workspace's gNB terminates.
//! [`UeApp`] is the [`NfInstance`] the outer `ue` binary subcommand drives;
//! everything else is internal plumbing reused by `supervisor::run`.

pub mod codec;
pub mod config;
pub mod context;
pub mod data_plane;
pub mod error;
pub mod n1;
pub mod procedures;
pub mod security;
pub mod supervisor;

use nf_base::NfInstance;
use tokio_util::sync::CancellationToken;

pub use config::UeConfig;
pub use error::SupervisorError;

pub struct UeApp {
	config: UeConfig,
	shutdown: CancellationToken,
}

impl NfInstance for UeApp {
	type Config = UeConfig;
	type Error = SupervisorError;

	fn initialize(config: Self::Config, shutdown: CancellationToken) -> Result<Self, Self::Error> {
		Ok(Self { config, shutdown })
	}

	async fn start(&self) -> Result<(), Self::Error> {
		supervisor::run(self.config.clone(), self.shutdown.clone()).await
	}
}
