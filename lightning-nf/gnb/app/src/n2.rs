//! The N2 association: one SCTP stream to the AMF, shared by every UE.
//!
//! Grounded in the donor's `ngap/network/tnla_assoc.rs` (`recvmsg_eor_buf`
//! for one-PDU-per-call EOR reads, `sendmsg` with a fixed PPID) and
//! `ngap/network/network.rs` (socket construction via `SctpSocket`). The
//! donor only ever accepts associations, playing the AMF's server role; a
//! gNB dials out instead, so the connect path here has no direct donor
//! counterpart and is extrapolated symmetrically from its listener-bind
//! code.
//!
//! Because this is one stream serving many UEs, a single reader task owns
//! the socket and demultiplexes by RAN-UE-NGAP-ID into each UE's
//! [`crate::context::RanUe::n2_inbox`]; messages that name no UE (only the
//! NG-Setup response, consumed directly by the supervisor before the reader
//! starts) never reach this loop. Symmetrically, a single writer task owns
//! outbound order, draining a shared channel so procedure runners never
//! touch the socket directly.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use socket2::Domain;
use tokio_sctp::{SctpSocket, SctpStream, SendOptions};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::codec::ngap;
use crate::context::GnbContext;
use crate::error::TransportError;

const NGAP_PPID: u32 = 0x3c000000;
const READ_BUFFER_SIZE: usize = 2048;

/// Dials the AMF and returns the connected association. PPID is set per
/// message at send time, not on the socket.
pub async fn dial(amf_addr: SocketAddr, ran_addr: SocketAddr) -> Result<SctpStream, TransportError> {
	let domain = match ran_addr.ip() {
		IpAddr::V4(_) => Domain::IPV4,
		IpAddr::V6(_) => Domain::IPV6,
	};
	let socket = SctpSocket::new(domain).map_err(TransportError::SocketCreationError)?;
	socket.bind(ran_addr).map_err(TransportError::SocketCreationError)?;
	socket.connect(amf_addr).await.map_err(|source| TransportError::DialError { addr: amf_addr, source })
}

/// Reads exactly one NGAP PDU's worth of bytes off the association, relying
/// on SCTP's EOR semantics: one `recvmsg` call returns one complete message.
pub async fn read_one(stream: &SctpStream) -> Result<Bytes, TransportError> {
	let mut buf = BytesMut::with_capacity(READ_BUFFER_SIZE);
	let (n, _, _) = stream.recvmsg_eor_buf(&mut buf).await.map_err(TransportError::ReadError)?;
	if n == 0 {
		return Err(TransportError::ConnectionClosed);
	}
	Ok(buf.freeze())
}

pub async fn write_one(stream: &SctpStream, data: &[u8]) -> Result<(), TransportError> {
	let options = SendOptions { ppid: NGAP_PPID, ..Default::default() };
	stream.sendmsg(data, None, &options).await.map_err(TransportError::WriteError)?;
	Ok(())
}

pub type N2OutSender = tokio::sync::mpsc::UnboundedSender<Bytes>;
pub type N2OutReceiver = tokio::sync::mpsc::UnboundedReceiver<Bytes>;

/// Shared reader: decodes each inbound PDU and routes it to the RAN-UE it
/// names. A PDU naming no live UE (stale or already-released) is dropped
/// with a debug log rather than treated as an error — the AMF side of a
/// race is not this engine's concern.
pub async fn reader_task(stream: Arc<SctpStream>, gnb_context: Arc<GnbContext>, shutdown: CancellationToken) {
	loop {
		let read = tokio::select! {
			_ = shutdown.cancelled() => break,
			read = read_one(&stream) => read,
		};
		let bytes = match read {
			Ok(b) => b,
			Err(e) => {
				warn!(error = %e, "N2 read failed, stopping reader");
				break;
			}
		};
		let pdu = match ngap::decode_ngap_pdu(&bytes) {
			Ok(p) => p,
			Err(e) => {
				warn!(error = %e, "dropping malformed N2 PDU");
				continue;
			}
		};
		let Some(ran_ue_ngap_id) = ngap::demux_ran_ue_ngap_id(&pdu) else {
			debug!("dropping N2 PDU with no RAN-UE-NGAP-ID to route by");
			continue;
		};
		match gnb_context.ran_ues.get_async(&ran_ue_ngap_id).await {
			Some(entry) => {
				let _ = entry.get().n2_inbox.send(pdu);
			}
			None => debug!(ran_ue_ngap_id, "N2 PDU for unknown or released UE, dropping"),
		}
	}
}

/// Shared writer: the only task that ever calls `sendmsg` on the
/// association, giving every UE's uplink NGAP traffic a single, FIFO choke
/// point.
pub async fn writer_task(stream: Arc<SctpStream>, mut out_rx: N2OutReceiver, shutdown: CancellationToken) {
	loop {
		let sent = tokio::select! {
			_ = shutdown.cancelled() => break,
			sent = out_rx.recv() => sent,
		};
		let Some(bytes) = sent else { break };
		trace!(len = bytes.len(), "sending N2 PDU");
		if let Err(e) = write_one(&stream, &bytes).await {
			warn!(error = %e, "failed to write N2 PDU");
		}
	}
}
