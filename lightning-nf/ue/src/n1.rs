//! N1 framing: the UE's side of the control-plane TCP connection. The wire
//! format here must match the gNB crate's own `n1.rs` bit-for-bit — they are
//! two ends of the same length-prefixed NAS-frame protocol — so this module
//! is a deliberate duplicate of that file's framing logic, adjusted for the
//! UE's role as the dialling side rather than the listener.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::TransportError;

pub const TUNNEL_UPDATE: &str = "tunnel update";

const LENGTH_PREFIX_LEN: usize = 4;
const MAX_FRAME_LEN: u32 = 1 << 20;

/// SPEC_FULL.md §5's "the UE's control-plane waiter uses 1-second read
/// deadlines so it can check cancellation."
pub const PARK_READ_DEADLINE: Duration = Duration::from_secs(1);

pub async fn dial(ran_addr: SocketAddr) -> Result<TcpStream, TransportError> {
	TcpStream::connect(ran_addr).await.map_err(|source| TransportError::DialError { addr: ran_addr, source })
}

pub async fn read_frame(stream: &mut TcpStream) -> Result<Bytes, TransportError> {
	let mut len_buf = [0u8; LENGTH_PREFIX_LEN];
	stream.read_exact(&mut len_buf).await.map_err(map_read_err)?;
	let len = u32::from_be_bytes(len_buf);
	if len > MAX_FRAME_LEN {
		return Err(TransportError::FrameTooLarge);
	}
	let mut body = BytesMut::zeroed(len as usize);
	stream.read_exact(&mut body).await.map_err(map_read_err)?;
	Ok(body.freeze())
}

pub async fn write_frame(stream: &mut TcpStream, payload: &[u8]) -> Result<(), TransportError> {
	let mut framed = BytesMut::with_capacity(LENGTH_PREFIX_LEN + payload.len());
	framed.put_u32(payload.len() as u32);
	framed.put_slice(payload);
	stream.write_all(&framed).await.map_err(TransportError::WriteError)
}

/// An incrementally-buffered reader, reused for the parked phase where a
/// control-socket read must be retried on a 1-second deadline instead of
/// racing a second future — the gNB's equivalent reader races against a
/// modify-indication channel instead; the UE has no such second source, but
/// still needs cancellation-safe buffering across deadline timeouts for the
/// same reason `AsyncReadExt::read_buf` documents.
pub struct FrameReader {
	buf: BytesMut,
}

impl FrameReader {
	pub fn new() -> Self {
		Self { buf: BytesMut::new() }
	}

	pub async fn read_frame(&mut self, stream: &mut TcpStream) -> Result<Bytes, TransportError> {
		loop {
			if let Some(frame) = self.try_take_frame()? {
				return Ok(frame);
			}
			let n = stream.read_buf(&mut self.buf).await.map_err(TransportError::ReadError)?;
			if n == 0 {
				return Err(TransportError::ConnectionClosed);
			}
		}
	}

	/// Reads until either a full frame is available or `PARK_READ_DEADLINE`
	/// elapses, returning `Ok(None)` on timeout so the caller can check its
	/// shutdown token and retry.
	pub async fn read_frame_timeout(&mut self, stream: &mut TcpStream) -> Result<Option<Bytes>, TransportError> {
		if let Some(frame) = self.try_take_frame()? {
			return Ok(Some(frame));
		}
		match tokio::time::timeout(PARK_READ_DEADLINE, stream.read_buf(&mut self.buf)).await {
			Ok(Ok(0)) => Err(TransportError::ConnectionClosed),
			Ok(Ok(_)) => self.try_take_frame(),
			Ok(Err(source)) => Err(TransportError::ReadError(source)),
			Err(_elapsed) => Ok(None),
		}
	}

	fn try_take_frame(&mut self) -> Result<Option<Bytes>, TransportError> {
		if self.buf.len() < LENGTH_PREFIX_LEN {
			return Ok(None);
		}
		let len = u32::from_be_bytes(self.buf[..LENGTH_PREFIX_LEN].try_into().expect("checked length above"));
		if len > MAX_FRAME_LEN {
			return Err(TransportError::FrameTooLarge);
		}
		let total = LENGTH_PREFIX_LEN + len as usize;
		if self.buf.len() < total {
			return Ok(None);
		}
		self.buf.advance(LENGTH_PREFIX_LEN);
		Ok(Some(self.buf.split_to(len as usize).freeze()))
	}
}

impl Default for FrameReader {
	fn default() -> Self {
		Self::new()
	}
}

fn map_read_err(source: std::io::Error) -> TransportError {
	if source.kind() == std::io::ErrorKind::UnexpectedEof {
		TransportError::ConnectionClosed
	} else {
		TransportError::ReadError(source)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn frame_layout_is_length_then_payload() {
		let mut buf = BytesMut::new();
		buf.put_u32(3);
		buf.put_slice(b"abc");
		let mut cursor = buf.freeze();
		let len = cursor.get_u32();
		assert_eq!(len, 3);
		assert_eq!(&cursor[..], b"abc");
	}
}
