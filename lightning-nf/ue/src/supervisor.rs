//! UE lifecycle orchestration (C8), mirroring the gNB crate's
//! `supervisor.rs`: dial, register, bring up PDU sessions, park, then tear
//! down on shutdown. Grounded in `original_source/cmd/ue.go`'s
//! `NewUe`/`Start`/`Stop` sequence, generalized from "dial once, never
//! implement a data plane" to this engine's full §4.8 scope.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::UeConfig;
use crate::context::UeContext;
use crate::error::SupervisorError;
use crate::{n1, procedures};

pub async fn run(config: UeConfig, shutdown: CancellationToken) -> Result<(), SupervisorError> {
	let ran_addr = SocketAddr::new(config.ue.ran_ip, config.ue.ran_port);
	let mut stream = n1::dial(ran_addr).await?;
	info!(%ran_addr, "control-plane connection established");

	let ctx = Arc::new(UeContext::new(config.ue.nrdc.is_some()));

	procedures::run_registration(&config, &ctx, &mut stream).await?;
	info!("registration complete");

	procedures::run_session_setup(&config, &ctx, &mut stream).await?;
	info!("PDU session setup complete");

	procedures::park(&config, &ctx, &mut stream, &shutdown).await;

	if shutdown.is_cancelled() {
		if let Err(e) = procedures::deregister(&ctx, &mut stream).await {
			warn!(error = %e, "deregistration failed during shutdown");
		}
	}

	let _ = stream.shutdown().await;
	info!("UE stopped");
	Ok(())
}
