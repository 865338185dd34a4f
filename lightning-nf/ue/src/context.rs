//! Per-UE state (C4 UE-side), mirroring the gNB crate's `context::ran_ue`
//! `Mutex<Option<T>>` + getter/setter + `.expect("poisoned")` convention,
//! adjusted for a single UE owning zero-or-two PDU sessions rather than a
//! gNB owning many UEs.

use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

use crate::security::UeSecurityContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UeState {
	Created,
	Registering,
	SecurityEstablished,
	PduSetup,
	Active,
	Deregistering,
	Released,
}

/// A PDU session's data-plane leg: absent until brought up, and — for
/// session 2 under NR-DC — deferred until the first `"tunnel update"`
/// toggles it on, per SPEC_FULL.md §4.8's "open or close a second
/// data-plane... connection to the secondary gNB" wording.
pub enum SessionDataPlane {
	Pending,
	Active { shutdown: CancellationToken },
}

pub struct PduSession {
	pub pdu_session_id: u8,
	pub address: Mutex<Option<std::net::Ipv4Addr>>,
	pub data_plane: Mutex<SessionDataPlane>,
}

impl PduSession {
	pub fn new(pdu_session_id: u8) -> Self {
		Self { pdu_session_id, address: Mutex::new(None), data_plane: Mutex::new(SessionDataPlane::Pending) }
	}

	pub fn set_address(&self, address: std::net::Ipv4Addr) {
		*self.address.lock().expect("PduSession mutex poisoned") = Some(address);
	}

	pub fn get_address(&self) -> Option<std::net::Ipv4Addr> {
		*self.address.lock().expect("PduSession mutex poisoned")
	}
}

pub struct UeContext {
	pub supi: Mutex<Option<String>>,
	pub state: Mutex<UeState>,
	pub security: Mutex<Option<UeSecurityContext>>,
	pub session1: PduSession,
	pub session2: Option<PduSession>,
}

impl UeContext {
	pub fn new(nrdc: bool) -> Self {
		Self {
			supi: Mutex::new(None),
			state: Mutex::new(UeState::Created),
			security: Mutex::new(None),
			session1: PduSession::new(1),
			session2: nrdc.then(|| PduSession::new(2)),
		}
	}

	pub fn set_state(&self, state: UeState) {
		*self.state.lock().expect("UeContext mutex poisoned") = state;
	}

	pub fn get_state(&self) -> UeState {
		*self.state.lock().expect("UeContext mutex poisoned")
	}

	pub fn set_supi(&self, supi: String) {
		*self.supi.lock().expect("UeContext mutex poisoned") = Some(supi);
	}

	pub fn get_supi(&self) -> Option<String> {
		self.supi.lock().expect("UeContext mutex poisoned").clone()
	}
}
