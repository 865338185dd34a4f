//! GTP-U encapsulation and the two pump tasks that move user-plane traffic
//! between N3 (the UPF-facing UDP socket) and each UE's data-plane encoder.
//!
//! Header layout (TS 29.281), grounded in the byte-for-byte construction the
//! donor's Go gNB uses on N3:
//!
//! ```text
//! byte 0: flags (0x32 = version 1, PT=1, E=1)
//! byte 1: message type (0xFF = T-PDU)
//! bytes 2..4: length, big-endian, payload length + 4
//! bytes 4..8: TEID, big-endian
//! bytes 8..12: extension trailer (seq/N-PDU/next-ext-type), 0 when unused
//! [extension headers...]
//! payload
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use scc::HashMap as SccHashMap;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

const GTP_FLAGS: u8 = 0x32;
const GTP_MSG_TYPE_TPDU: u8 = 0xFF;
const PDU_SESSION_CONTAINER_EXT_TYPE: u8 = 0x85;
const NO_MORE_EXTENSIONS: u8 = 0x00;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GtpError {
	#[error("packet shorter than the 8-byte fixed GTP header")]
	TooShort,
	#[error("header length field does not match the actual payload")]
	LengthMismatch,
	#[error("unrecognised extension header type {0:#x}")]
	UnknownExtension(u8),
	#[error("truncated extension header")]
	TruncatedExtension,
}

/// Builds a T-PDU GTP-U packet with an empty PDU-Session-Container
/// extension footer, matching the donor's uplink encoder exactly.
pub fn encapsulate(teid: u32, payload: &[u8]) -> Bytes {
	let mut buf = BytesMut::with_capacity(12 + payload.len());
	buf.put_u8(GTP_FLAGS);
	buf.put_u8(GTP_MSG_TYPE_TPDU);
	buf.put_u16((payload.len() + 4) as u16);
	buf.put_u32(teid);
	// sequence number / N-PDU number / next-extension-header-type: all zero,
	// i.e. "no extensions present" trailer.
	buf.put_u32(0);
	buf.put_slice(payload);
	buf.freeze()
}

/// Parsed GTP-U packet: TEID plus the inner payload, extension headers
/// (PDU-Session-Container included) stripped.
#[derive(Debug, PartialEq, Eq)]
pub struct Decapsulated {
	pub teid: u32,
	pub payload: Bytes,
}

pub fn decapsulate(mut packet: Bytes) -> Result<Decapsulated, GtpError> {
	if packet.len() < 8 {
		return Err(GtpError::TooShort);
	}
	let flags = packet[0];
	// length is the wire-declared size; bounds on the extension chain are
	// enforced step by step below instead of cross-checked against it.
	let teid = u32::from_be_bytes([packet[4], packet[5], packet[6], packet[7]]);
	let has_optional_fields = flags & 0x07 != 0;
	packet.advance(8);

	let mut next_ext_type = NO_MORE_EXTENSIONS;
	if has_optional_fields {
		if packet.len() < 4 {
			return Err(GtpError::TruncatedExtension);
		}
		// sequence number (2 bytes) + N-PDU number (1 byte) + next-ext-type (1 byte)
		next_ext_type = packet[3];
		packet.advance(4);
	}

	while next_ext_type != NO_MORE_EXTENSIONS {
		if packet.is_empty() {
			return Err(GtpError::TruncatedExtension);
		}
		let ext_len_units = packet[0] as usize;
		let ext_len_bytes = ext_len_units * 4;
		if ext_len_bytes == 0 || packet.len() < ext_len_bytes {
			return Err(GtpError::TruncatedExtension);
		}
		match next_ext_type {
			PDU_SESSION_CONTAINER_EXT_TYPE => {}
			other => return Err(GtpError::UnknownExtension(other)),
		}
		next_ext_type = packet[ext_len_bytes - 1];
		packet.advance(ext_len_bytes);
	}

	Ok(Decapsulated { teid, payload: packet })
}

pub type UeAddr = SocketAddr;

/// A single outbound (already-encapsulated) GTP-U datagram destined for N3.
pub struct GtpOutDatagram(pub Bytes);

pub type GtpOutSender = mpsc::UnboundedSender<GtpOutDatagram>;
pub type GtpOutReceiver = mpsc::UnboundedReceiver<GtpOutDatagram>;

/// Downlink pump: reads from N3, demultiplexes by DL-TEID, forwards to the
/// owning UE's data-plane socket address.
pub async fn downlink_pump(
	n3_socket: Arc<UdpSocket>,
	dl_teid_to_addr: Arc<SccHashMap<u32, UeAddr>>,
	data_plane_socket: Arc<UdpSocket>,
	shutdown: CancellationToken,
) {
	let mut buf = vec![0u8; 2048];
	loop {
		let recv = tokio::select! {
			_ = shutdown.cancelled() => break,
			recv = n3_socket.recv_from(&mut buf) => recv,
		};
		let (len, _from) = match recv {
			Ok(v) => v,
			Err(e) => {
				warn!(error = %e, "N3 downlink recv failed");
				continue;
			}
		};
		let packet = Bytes::copy_from_slice(&buf[..len]);
		let decoded = match decapsulate(packet) {
			Ok(d) => d,
			Err(e) => {
				warn!(error = %e, "dropping malformed GTP-U packet");
				continue;
			}
		};
		let Some(addr) = dl_teid_to_addr.get(&decoded.teid).map(|e| *e.get()) else {
			debug!(teid = decoded.teid, "no UE registered for DL-TEID, dropping");
			continue;
		};
		if let Err(e) = data_plane_socket.send_to(&decoded.payload, addr).await {
			warn!(error = %e, %addr, "failed to forward downlink packet to UE");
		}
	}
}

/// Uplink pump: drains the shared "gtp out" channel and writes each
/// already-framed datagram to N3. One task, one writer, so UEs each holding
/// their own encoder task get FIFO ordering of their own uplink traffic.
pub async fn uplink_pump(
	n3_socket: Arc<UdpSocket>,
	n3_addr: SocketAddr,
	mut out_rx: GtpOutReceiver,
	shutdown: CancellationToken,
) {
	loop {
		let datagram = tokio::select! {
			_ = shutdown.cancelled() => break,
			d = out_rx.recv() => d,
		};
		let Some(GtpOutDatagram(bytes)) = datagram else {
			break;
		};
		trace!(len = bytes.len(), "sending uplink GTP-U packet to N3");
		if let Err(e) = n3_socket.send_to(&bytes, n3_addr).await {
			warn!(error = %e, "failed to write uplink GTP-U packet to N3");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_with_no_extensions() {
		let payload = b"hello upf";
		let packet = encapsulate(0x0000_2A2A, payload);
		let decoded = decapsulate(packet).unwrap();
		assert_eq!(decoded.teid, 0x0000_2A2A);
		assert_eq!(&decoded.payload[..], payload);
	}

	#[test]
	fn round_trips_for_payload_up_to_1500_bytes() {
		let payload = vec![0xAB; 1500];
		let packet = encapsulate(7, &payload);
		let decoded = decapsulate(packet).unwrap();
		assert_eq!(decoded.teid, 7);
		assert_eq!(decoded.payload.len(), 1500);
	}

	#[test]
	fn round_trips_with_one_pdu_session_container_extension() {
		// Build by hand: set has-extension flag, add one 4-byte extension
		// (1 length unit) carrying a PDU-Session-Container, terminated by 0x00.
		let payload = b"ext payload";
		let mut buf = BytesMut::new();
		buf.put_u8(0x32 | 0x04); // E bit set
		buf.put_u8(GTP_MSG_TYPE_TPDU);
		buf.put_u16((payload.len() + 4 + 4) as u16);
		buf.put_u32(99);
		buf.put_u16(0); // seq
		buf.put_u8(0); // N-PDU
		buf.put_u8(PDU_SESSION_CONTAINER_EXT_TYPE); // next ext type
		// one extension header, 1 length unit (4 bytes): len, 2 content bytes, next-type
		buf.put_u8(1);
		buf.put_u8(0x00);
		buf.put_u8(0x00);
		buf.put_u8(NO_MORE_EXTENSIONS);
		buf.put_slice(payload);

		let decoded = decapsulate(buf.freeze()).unwrap();
		assert_eq!(decoded.teid, 99);
		assert_eq!(&decoded.payload[..], payload);
	}

	#[test]
	fn round_trips_with_two_chained_extensions() {
		// Same shape as the one-extension case, but the first extension's
		// next-type points at a second PDU-Session-Container extension
		// instead of NO_MORE_EXTENSIONS, exercising decapsulate's chain walk.
		let payload = b"two ext payload";
		let mut buf = BytesMut::new();
		buf.put_u8(0x32 | 0x04); // E bit set
		buf.put_u8(GTP_MSG_TYPE_TPDU);
		buf.put_u16((payload.len() + 4 + 4 + 4) as u16);
		buf.put_u32(1234);
		buf.put_u16(0); // seq
		buf.put_u8(0); // N-PDU
		buf.put_u8(PDU_SESSION_CONTAINER_EXT_TYPE); // next ext type
		// first extension header, 1 length unit (4 bytes): len, 2 content bytes, next-type
		buf.put_u8(1);
		buf.put_u8(0x00);
		buf.put_u8(0x00);
		buf.put_u8(PDU_SESSION_CONTAINER_EXT_TYPE);
		// second extension header, chained off the first, terminated by 0x00
		buf.put_u8(1);
		buf.put_u8(0x00);
		buf.put_u8(0x00);
		buf.put_u8(NO_MORE_EXTENSIONS);
		buf.put_slice(payload);

		let decoded = decapsulate(buf.freeze()).unwrap();
		assert_eq!(decoded.teid, 1234);
		assert_eq!(&decoded.payload[..], payload);
	}

	#[test]
	fn rejects_too_short_packet() {
		assert_eq!(decapsulate(Bytes::from_static(b"short")), Err(GtpError::TooShort));
	}
}
