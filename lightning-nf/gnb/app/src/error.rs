//! Component error enums. Each mirrors the donor's per-module convention of
//! one `thiserror` enum per concern, variants named for the concrete failure
//! rather than grouped under a generic "Error".

use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
	#[error("failed to create socket: {0}")]
	SocketCreationError(#[source] std::io::Error),
	#[error("failed to bind listener on {addr}: {source}")]
	ListenerBindingError { addr: SocketAddr, #[source] source: std::io::Error },
	#[error("failed to connect to {addr}: {source}")]
	DialError { addr: SocketAddr, #[source] source: std::io::Error },
	#[error("socket read failed: {0}")]
	ReadError(#[source] std::io::Error),
	#[error("socket write failed: {0}")]
	WriteError(#[source] std::io::Error),
	#[error("peer closed the connection")]
	ConnectionClosed,
	#[error("read deadline exceeded")]
	ReadTimeout,
}

#[derive(Debug, Error)]
pub enum CodecError {
	#[error("failed to encode {what}: {source}")]
	EncodeError { what: &'static str, #[source] source: asn1_per::ThreeGppAsn1PerError },
	#[error("failed to decode {what}: {source}")]
	DecodeError { what: &'static str, #[source] source: asn1_per::ThreeGppAsn1PerError },
	#[error("unexpected procedure code: expected {expected}, got {actual}")]
	UnexpectedProcedureCode { expected: &'static str, actual: String },
	#[error("unexpected PDU presence variant: expected {expected}")]
	UnexpectedPresence { expected: &'static str },
	#[error("required IE missing: {0}")]
	MissingIe(&'static str),
	#[error("failed to decode NAS message: {0}")]
	NasDecodeError(String),
	#[error("{0}")]
	Convert(#[from] crate::codec::convert::ConvertError),
}

#[derive(Debug, Error)]
pub enum ProcedureError {
	#[error(transparent)]
	Transport(#[from] TransportError),
	#[error(transparent)]
	Codec(#[from] CodecError),
	#[error(transparent)]
	Resource(#[from] ResourceError),
	#[error("Xn peer operation failed: {0}")]
	Xn(#[from] XnError),
	#[error("precondition not met: {0}")]
	InvalidState(&'static str),
}

#[derive(Debug, Error)]
pub enum ResourceError {
	#[error("allocator exhausted: no free id in 1..65535")]
	AllocatorExhausted,
}

#[derive(Debug, Error)]
pub enum XnError {
	#[error(transparent)]
	Transport(#[from] TransportError),
	#[error(transparent)]
	Codec(#[from] CodecError),
	#[error("Xn frame is malformed: {0}")]
	MalformedFrame(&'static str),
	#[error("Xn round trip timed out")]
	Timeout,
}

#[derive(Debug, Error)]
pub enum ManagementApiError {
	#[error("no RAN UE found with imsi {0}")]
	UeNotFound(String),
	#[error(transparent)]
	Procedure(#[from] ProcedureError),
}

#[derive(Debug, Error)]
pub enum SupervisorError {
	#[error(transparent)]
	Transport(#[from] TransportError),
	#[error(transparent)]
	Codec(#[from] CodecError),
	#[error("NG setup was rejected or timed out")]
	NgSetupFailed,
	#[error("invalid configuration: {0}")]
	Config(#[from] crate::codec::convert::ConvertError),
}
