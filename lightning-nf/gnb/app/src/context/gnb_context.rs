//! The gNB's single bundle of shared mutable state: ID allocators, the
//! demux maps, the GTP-out channel and the static config. Unlike the donor's
//! `AppContext`, which sits behind a process-wide `OnceCell` because an AMF
//! juggles many served NFs, a simulated gNB has exactly one of these per
//! process; it is built once at startup and threaded through as an `Arc`
//! (axum `State`, task spawns) rather than looked up from a global.

use std::net::SocketAddr;
use std::sync::Arc;

use rustc_hash::FxBuildHasher;
use scc::HashMap as SccHashMap;
use tokio::sync::mpsc;

use crate::config::GnbConfig;
use crate::gtp::GtpOutSender;
use crate::ids::IdAllocator;
use crate::n2::N2OutSender;

use super::ran_ue::{ModifyRequest, RanUe};
use super::xn_ue::XnUe;

/// Tagged variant stored in the address→peer demux map, replacing the
/// donor's dynamic dispatch over "is this a RanUe or an XnUe" with a plain
/// enum match.
#[derive(Clone)]
pub enum DataPlanePeer {
	Ran(Arc<RanUe>),
	Xn(Arc<XnUe>),
}

pub struct GnbContext {
	pub config: GnbConfig,

	pub ran_ue_id_allocator: IdAllocator,
	pub teid_allocator: IdAllocator,

	/// ran-ue-ngap-id -> RanUe
	pub ran_ues: SccHashMap<u32, Arc<RanUe>, FxBuildHasher>,
	/// imsi -> XnUe, populated only by the secondary role
	pub xn_ues: SccHashMap<String, Arc<XnUe>, FxBuildHasher>,

	/// DL-TEID -> the data-plane socket address learned for that UE.
	pub dl_teid_to_addr: Arc<SccHashMap<u32, SocketAddr>>,
	/// data-plane socket address -> the peer that owns it.
	pub addr_to_peer: Arc<SccHashMap<SocketAddr, DataPlanePeer, FxBuildHasher>>,

	pub gtp_out: GtpOutSender,
	/// The shared N2 writer task's inbox; every procedure runner sends its
	/// encoded uplink NGAP PDUs here instead of touching the SCTP stream.
	pub n2_out: N2OutSender,

	/// The rendezvous the data-plane receive loop drains one entry from
	/// every time it sees a `UE_DATA_PLANE_INITIAL_PACKET` datagram, binding
	/// that packet's source address to the most recently admitted UE's
	/// DL-TEID. A capacity-1 channel is this engine's closest idiomatic
	/// match for the donor's unbuffered Go channel of the same role.
	pub dl_teid_and_ue_type: mpsc::Sender<(u32, DataPlanePeer)>,
}

impl GnbContext {
	pub fn new(
		config: GnbConfig,
		gtp_out: GtpOutSender,
		n2_out: N2OutSender,
	) -> (Arc<Self>, mpsc::Receiver<(u32, DataPlanePeer)>) {
		let (dl_teid_and_ue_type, bind_rx) = mpsc::channel(1);
		let context = Arc::new(Self {
			config,
			ran_ue_id_allocator: IdAllocator::new(),
			teid_allocator: IdAllocator::new(),
			ran_ues: SccHashMap::with_hasher(FxBuildHasher::default()),
			xn_ues: SccHashMap::with_hasher(FxBuildHasher::default()),
			dl_teid_to_addr: Arc::new(SccHashMap::default()),
			addr_to_peer: Arc::new(SccHashMap::with_hasher(FxBuildHasher::default())),
			gtp_out,
			n2_out,
			dl_teid_and_ue_type,
		});
		(context, bind_rx)
	}

	/// Registers a newly-admitted peer's DL-TEID with the data-plane receive
	/// loop, to be consumed the next time an initial packet arrives. Used by
	/// both the RAN-UE procedure runner (primary leg) and the Xn secondary
	/// handler (secondary leg) — both bind into the same shared data-plane
	/// socket.
	pub async fn bind_data_plane(&self, dl_teid: u32, peer: DataPlanePeer) -> Result<(), crate::error::TransportError> {
		self.dl_teid_and_ue_type.send((dl_teid, peer)).await.map_err(|_| crate::error::TransportError::ConnectionClosed)
	}

	/// Admits a new UE, allocating its RAN-UE-NGAP-ID and wiring the
	/// mpsc channel the shared N2 reader task will push demuxed NGAP PDUs
	/// into. The receiving half goes to the caller, which owns the per-UE
	/// procedure task.
	pub async fn admit_ran_ue(
		&self,
		n1_socket: tokio::net::TcpStream,
	) -> Result<
		(Arc<RanUe>, tokio::sync::mpsc::UnboundedReceiver<ngap_models::NgapPdu>, tokio::sync::mpsc::UnboundedReceiver<ModifyRequest>),
		crate::error::ResourceError,
	> {
		let ran_ue_ngap_id = self.ran_ue_id_allocator.allocate()?;
		let (n2_tx, n2_rx) = tokio::sync::mpsc::unbounded_channel();
		let (modify_tx, modify_rx) = tokio::sync::mpsc::unbounded_channel();
		let ue = Arc::new(RanUe::new(ran_ue_ngap_id, n1_socket, n2_tx, modify_tx));
		let _ = self.ran_ues.insert_async(ran_ue_ngap_id, ue.clone()).await;
		Ok((ue, n2_rx, modify_rx))
	}

	pub async fn release_ran_ue(&self, ue: &Arc<RanUe>) {
		ue.release(&self.ran_ue_id_allocator, &self.teid_allocator);
		self.ran_ues.remove_async(&ue.ran_ue_ngap_id).await;
		if let Some(teid) = ue.get_dl_teid() {
			self.dl_teid_to_addr.remove_async(&teid).await;
		}
		if let Some(addr) = ue.get_data_plane_addr() {
			self.addr_to_peer.remove_async(&addr).await;
		}
	}

	pub async fn find_ran_ue_by_imsi(&self, imsi: &str) -> Option<Arc<RanUe>> {
		let mut found = None;
		self.ran_ues
			.scan_async(|_, ue| {
				if found.is_none() && ue.get_imsi().as_deref() == Some(imsi) {
					found = Some(ue.clone());
				}
			})
			.await;
		found
	}
}
