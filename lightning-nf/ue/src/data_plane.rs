//! UE data plane (C8): one UDP "connection" plus one TUN device per PDU
//! session. Grounded in SPEC_FULL.md §4.8/§6 rather than in the donor Go UE
//! (which implements no data plane at all): the first datagram sent is the
//! `UE_DATA_PLANE_INITIAL_PACKET` sentinel the gNB's
//! `supervisor::data_plane_receive_loop` binds the UE's source address
//! against; every datagram after that is a bare inner IP packet, matching
//! the already-built gNB transport supervisor's UDP-based data plane (§4.8's
//! "TCP" wording for this socket is treated as a drafting inconsistency —
//! see `DESIGN.md`).

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tun::AsyncDevice;

use crate::error::{TransportError, TunError};

/// Matches `gnb-app`'s `supervisor::UE_DATA_PLANE_INITIAL_PACKET` exactly.
pub const UE_DATA_PLANE_INITIAL_PACKET: &[u8] = b"UE_DATA_PLANE_INITIAL_PACKET";

pub async fn dial_and_announce(data_plane_addr: SocketAddr) -> Result<UdpSocket, TransportError> {
	let socket = UdpSocket::bind("0.0.0.0:0").await.map_err(TransportError::ReadError)?;
	socket.connect(data_plane_addr).await.map_err(|source| TransportError::DialError { addr: data_plane_addr, source })?;
	socket.send(UE_DATA_PLANE_INITIAL_PACKET).await.map_err(TransportError::WriteError)?;
	debug!(%data_plane_addr, "announced UE data-plane address");
	Ok(socket)
}

pub fn bring_up_tun(name: &str, address: std::net::Ipv4Addr) -> Result<AsyncDevice, TunError> {
	let mut config = tun::Configuration::default();
	config.tun_name(name).address(address).netmask((255, 255, 255, 0)).up();
	tun::create_as_async(&config).map_err(|source| TunError::CreateFailed {
		name: name.to_string(),
		source: std::io::Error::new(std::io::ErrorKind::Other, source.to_string()),
	})
}

/// Reads IP packets off the TUN device and forwards them to the RAN
/// data-plane socket, skipping IPv6 (SPEC_FULL.md §4.8: "skipping IPv6").
pub async fn tun_to_socket(mut tun_dev: tokio::io::ReadHalf<AsyncDevice>, socket: Arc<UdpSocket>, shutdown: CancellationToken) {
	let mut buf = vec![0u8; 2048];
	loop {
		let n = tokio::select! {
			_ = shutdown.cancelled() => break,
			read = tun_dev.read(&mut buf) => match read {
				Ok(0) => break,
				Ok(n) => n,
				Err(e) => {
					warn!(error = %e, "TUN read failed");
					break;
				}
			},
		};
		if buf[0] >> 4 == 6 {
			continue;
		}
		if let Err(e) = socket.send(&buf[..n]).await {
			warn!(error = %e, "data-plane send failed");
		}
	}
}

/// Reads datagrams from the RAN data-plane socket and writes them to the
/// TUN device as raw IP packets.
pub async fn socket_to_tun(socket: Arc<UdpSocket>, mut tun_dev: tokio::io::WriteHalf<AsyncDevice>, shutdown: CancellationToken) {
	let mut buf = vec![0u8; 2048];
	loop {
		let n = tokio::select! {
			_ = shutdown.cancelled() => break,
			recv = socket.recv(&mut buf) => match recv {
				Ok(n) => n,
				Err(e) => {
					warn!(error = %e, "data-plane recv failed");
					break;
				}
			},
		};
		if let Err(e) = tun_dev.write_all(&buf[..n]).await {
			warn!(error = %e, "TUN write failed");
			break;
		}
	}
}
