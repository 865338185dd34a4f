//! Error taxonomy (C8), one `thiserror` enum per concern, mirroring the gNB
//! engine's `error.rs` naming convention so the two peers read as the same
//! codebase from opposite ends of the wire.

use std::net::SocketAddr;

use security::SecurityError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
	#[error("failed to create socket")]
	SocketCreationError,
	#[error("failed to dial {addr}")]
	DialError { addr: SocketAddr, #[source] source: std::io::Error },
	#[error("failed to read from socket")]
	ReadError(#[source] std::io::Error),
	#[error("failed to write to socket")]
	WriteError(#[source] std::io::Error),
	#[error("connection closed by peer")]
	ConnectionClosed,
	#[error("read timed out")]
	ReadTimeout,
	#[error("frame exceeds maximum length")]
	FrameTooLarge,
}

#[derive(Debug, Error)]
pub enum CodecError {
	#[error("failed to encode {what}")]
	EncodeError { what: &'static str },
	#[error("failed to decode {what}")]
	DecodeError { what: &'static str },
	#[error("unexpected NAS message, wanted {expected}, got {actual}")]
	UnexpectedMessage { expected: &'static str, actual: &'static str },
	#[error("missing mandatory IE: {0}")]
	MissingIe(&'static str),
	#[error("malformed SUCI/mobile identity")]
	MalformedMobileIdentity,
	#[error("NAS decode failed: {0}")]
	NasDecodeError(String),
	#[error(transparent)]
	Convert(#[from] crate::codec::convert::ConvertError),
}

#[derive(Debug, Error)]
pub enum TunError {
	#[error("failed to create TUN device {name}")]
	CreateFailed { name: String, #[source] source: std::io::Error },
	#[error("failed to read from TUN device")]
	ReadError(#[source] std::io::Error),
	#[error("failed to write to TUN device")]
	WriteError(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ProcedureError {
	#[error(transparent)]
	Transport(#[from] TransportError),
	#[error(transparent)]
	Codec(#[from] CodecError),
	#[error(transparent)]
	Security(#[from] SecurityError),
	#[error(transparent)]
	Tun(#[from] TunError),
	#[error("invalid UE state for this operation: {0}")]
	InvalidState(&'static str),
	#[error("no security context established")]
	NoSecurityContext,
}

#[derive(Debug, Error)]
pub enum SupervisorError {
	#[error(transparent)]
	Transport(#[from] TransportError),
	#[error(transparent)]
	Procedure(#[from] ProcedureError),
	#[error("registration did not complete before shutdown")]
	RegistrationIncomplete,
}
