//! Per-UE state as seen from the gNB's NGAP/NAS side. Exposes only
//! field-level getters/setters plus `release`, matching the donor's
//! convention of keeping UE context structs free of business logic.

use std::net::SocketAddr;
use std::sync::Mutex;
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::{mpsc, oneshot};

use crate::error::ProcedureError;
use crate::ids::IdAllocator;

/// A management-API request to run the modify-indication procedure,
/// carrying the oneshot the caller awaits for the procedure's outcome.
pub type ModifyRequest = oneshot::Sender<Result<(), ProcedureError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UeState {
	Created,
	InitRunning,
	PduSetup,
	Active,
	DeregRunning,
	Released,
}

/// The gNB-side context for one UE across its NGAP/NAS lifetime.
pub struct RanUe {
	pub ran_ue_ngap_id: u32,
	pub amf_ue_ngap_id: Mutex<Option<u64>>,
	pub imsi: Mutex<Option<String>>,
	pub dl_teid: Mutex<Option<u32>>,
	pub ul_teid: Mutex<Option<u32>>,
	pub state: Mutex<UeState>,
	/// NR-DC activation flag; toggled by the modify-indication procedure,
	/// protected by its own mutex per the spec's locking discipline.
	pub nrdc_active: Mutex<bool>,
	/// The data-plane peer address this UE's DL-TEID is bound to, learned
	/// from the `UE_DATA_PLANE_INITIAL_PACKET` rendezvous; kept so `release`
	/// can also drop the `addr_to_peer` demux entry.
	pub data_plane_addr: Mutex<Option<SocketAddr>>,
	/// The UE-facing control socket (N1 in the spec's terminology).
	pub n1_socket: AsyncMutex<TcpStream>,
	/// The secondary gNB's tunnel, learned over Xn during session-1
	/// establishment; reused both to populate session 1's
	/// `additionalDLQosFlowPerTNLInformation` and as session 2's primary
	/// tunnel, and again by every later modify-indication round.
	pub xn_secondary: Mutex<Option<ngap_models::QosFlowPerTnlInformationItem>>,
	/// The shared N2 reader task's half of this UE's demuxed NGAP inbox.
	/// Kept on the UE so the reader task can look it up and push into it;
	/// the procedure runner holds the matching receiver directly instead of
	/// through this struct, since only it ever calls `recv`.
	pub n2_inbox: mpsc::UnboundedSender<ngap_models::NgapPdu>,
	/// The management API's half of the modify-indication request channel;
	/// the procedure runner holds the matching receiver, for the same
	/// reason it holds the `n2_inbox` receiver directly.
	pub modify_requests: mpsc::UnboundedSender<ModifyRequest>,
}

impl RanUe {
	pub fn new(
		ran_ue_ngap_id: u32,
		n1_socket: TcpStream,
		n2_inbox: mpsc::UnboundedSender<ngap_models::NgapPdu>,
		modify_requests: mpsc::UnboundedSender<ModifyRequest>,
	) -> Self {
		Self {
			ran_ue_ngap_id,
			amf_ue_ngap_id: Mutex::new(None),
			imsi: Mutex::new(None),
			dl_teid: Mutex::new(None),
			ul_teid: Mutex::new(None),
			state: Mutex::new(UeState::Created),
			nrdc_active: Mutex::new(false),
			data_plane_addr: Mutex::new(None),
			n1_socket: AsyncMutex::new(n1_socket),
			xn_secondary: Mutex::new(None),
			n2_inbox,
			modify_requests,
		}
	}

	pub fn set_state(&self, state: UeState) {
		*self.state.lock().expect("RanUe.state mutex poisoned") = state;
	}

	pub fn get_state(&self) -> UeState {
		*self.state.lock().expect("RanUe.state mutex poisoned")
	}

	pub fn set_amf_ue_ngap_id(&self, id: u64) {
		*self.amf_ue_ngap_id.lock().expect("RanUe.amf_ue_ngap_id mutex poisoned") = Some(id);
	}

	pub fn get_amf_ue_ngap_id(&self) -> Option<u64> {
		*self.amf_ue_ngap_id.lock().expect("RanUe.amf_ue_ngap_id mutex poisoned")
	}

	pub fn set_imsi(&self, imsi: String) {
		*self.imsi.lock().expect("RanUe.imsi mutex poisoned") = Some(imsi);
	}

	pub fn get_imsi(&self) -> Option<String> {
		self.imsi.lock().expect("RanUe.imsi mutex poisoned").clone()
	}

	pub fn set_dl_teid(&self, teid: u32) {
		*self.dl_teid.lock().expect("RanUe.dl_teid mutex poisoned") = Some(teid);
	}

	pub fn get_dl_teid(&self) -> Option<u32> {
		*self.dl_teid.lock().expect("RanUe.dl_teid mutex poisoned")
	}

	pub fn set_ul_teid(&self, teid: u32) {
		*self.ul_teid.lock().expect("RanUe.ul_teid mutex poisoned") = Some(teid);
	}

	pub fn get_ul_teid(&self) -> Option<u32> {
		*self.ul_teid.lock().expect("RanUe.ul_teid mutex poisoned")
	}

	pub fn set_nrdc_active(&self, active: bool) {
		*self.nrdc_active.lock().expect("RanUe.nrdc_active mutex poisoned") = active;
	}

	pub fn is_nrdc_active(&self) -> bool {
		*self.nrdc_active.lock().expect("RanUe.nrdc_active mutex poisoned")
	}

	pub fn set_data_plane_addr(&self, addr: SocketAddr) {
		*self.data_plane_addr.lock().expect("RanUe.data_plane_addr mutex poisoned") = Some(addr);
	}

	pub fn get_data_plane_addr(&self) -> Option<SocketAddr> {
		*self.data_plane_addr.lock().expect("RanUe.data_plane_addr mutex poisoned")
	}

	pub fn set_xn_secondary(&self, item: ngap_models::QosFlowPerTnlInformationItem) {
		*self.xn_secondary.lock().expect("RanUe.xn_secondary mutex poisoned") = Some(item);
	}

	pub fn get_xn_secondary(&self) -> Option<ngap_models::QosFlowPerTnlInformationItem> {
		self.xn_secondary.lock().expect("RanUe.xn_secondary mutex poisoned").clone()
	}

	/// Releases this UE's pooled IDs. Idempotent callers must ensure this is
	/// invoked exactly once per UE; a double release panics via the
	/// allocator's own fail-fast contract.
	pub fn release(&self, ran_ue_id_alloc: &IdAllocator, teid_alloc: &IdAllocator) {
		ran_ue_id_alloc.release(self.ran_ue_ngap_id);
		if let Some(teid) = self.get_dl_teid() {
			teid_alloc.release(teid);
		}
	}
}
