//! The gNB engine: the simulated radio/core boundary this workspace exists
//! to emulate. [`GnbApp`] is the [`NfInstance`] the outer `gnb` binary crate
//! drives; everything else is internal plumbing reused by `supervisor::run`.

pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod gtp;
pub mod ids;
pub mod management_api;
pub mod n1;
pub mod n2;
pub mod procedures;
pub mod supervisor;
pub mod xn;

use nf_base::NfInstance;
use tokio_util::sync::CancellationToken;

pub use config::GnbConfig;
pub use error::SupervisorError;

pub struct GnbApp {
	config: GnbConfig,
	shutdown: CancellationToken,
}

impl NfInstance for GnbApp {
	type Config = GnbConfig;
	type Error = SupervisorError;

	fn initialize(config: Self::Config, shutdown: CancellationToken) -> Result<Self, Self::Error> {
		Ok(Self { config, shutdown })
	}

	async fn start(&self) -> Result<(), Self::Error> {
		supervisor::run(self.config.clone(), self.shutdown.clone()).await
	}
}
