//! The per-UE procedure engine: one Tokio task per admitted UE running the
//! linear registration → PDU-session-establishment → (parked) →
//! deregistration sequence, grounded in `gnb/ranUe.go`'s `SetupN1`/`ReleaseN1`
//! pair from the system this engine was distilled from. Every step is a
//! blocking read on N1 or N2, a transform through [`crate::codec`], and a
//! blocking write to the other side — there is no retry layer here; any
//! error aborts the procedure and the caller tears the UE down.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use ngap_models::NgapPdu;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::codec::{nas, ngap};
use crate::context::{DataPlanePeer, GnbContext, ModifyRequest, RanUe, UeState};
use crate::error::ProcedureError;
use crate::n1::{self, FrameReader};
use crate::xn::XnClient;

/// Paces the phases of `setupN1` exactly as the donor source does, with no
/// correctness bound given in the spec to relax it by.
const INTER_PHASE_PACE: Duration = Duration::from_secs(1);

/// Runs a UE from admission to release. Consumes the receivers
/// [`GnbContext::admit_ran_ue`] handed back alongside the `RanUe`, since
/// only this task ever calls `recv` on them.
pub async fn run_ue(
	gnb: Arc<GnbContext>,
	ue: Arc<RanUe>,
	mut n2_rx: mpsc::UnboundedReceiver<NgapPdu>,
	mut modify_rx: mpsc::UnboundedReceiver<ModifyRequest>,
) {
	ue.set_state(UeState::InitRunning);
	if let Err(e) = setup_n1(&gnb, &ue, &mut n2_rx).await {
		warn!(ran_ue_ngap_id = ue.ran_ue_ngap_id, error = %e, "UE setup failed, releasing");
		gnb.release_ran_ue(&ue).await;
		return;
	}

	info!(ran_ue_ngap_id = ue.ran_ue_ngap_id, imsi = ?ue.get_imsi(), "UE active");
	let dereg_request = park_until_deregistration(&gnb, &ue, &mut n2_rx, &mut modify_rx).await;

	ue.set_state(UeState::DeregRunning);
	match dereg_request {
		Ok(nas_pdu) => {
			if let Err(e) = process_ue_deregistration(&gnb, &ue, &mut n2_rx, nas_pdu).await {
				warn!(ran_ue_ngap_id = ue.ran_ue_ngap_id, error = %e, "deregistration procedure failed");
			}
		}
		Err(e) => {
			warn!(ran_ue_ngap_id = ue.ran_ue_ngap_id, error = %e, "N1 closed before a deregistration request arrived");
		}
	}

	ue.set_state(UeState::Released);
	gnb.release_ran_ue(&ue).await;
}

/// `setupN1`: initialization, then session 1, then (if NR-DC) session 2.
async fn setup_n1(
	gnb: &Arc<GnbContext>,
	ue: &Arc<RanUe>,
	n2_rx: &mut mpsc::UnboundedReceiver<NgapPdu>,
) -> Result<(), ProcedureError> {
	process_ue_initialization(gnb, ue, n2_rx).await?;
	tokio::time::sleep(INTER_PHASE_PACE).await;

	let dl_teid = gnb.teid_allocator.allocate()?;
	ue.set_dl_teid(dl_teid);
	gnb.bind_data_plane(dl_teid, DataPlanePeer::Ran(ue.clone())).await?;

	ue.set_state(UeState::PduSetup);
	process_ue_pdu_session_establishment(gnb, ue, n2_rx, 1).await?;
	tokio::time::sleep(INTER_PHASE_PACE).await;

	if gnb.config.gnb.nrdc {
		if let Err(e) = process_ue_pdu_session_establishment(gnb, ue, n2_rx, 2).await {
			// Non-fatal: a failed secondary leg degrades to single
			// connectivity instead of tearing the UE down (§9 resolved
			// open question).
			warn!(ran_ue_ngap_id = ue.ran_ue_ngap_id, error = %e, "NR-DC session 2 establishment failed, continuing single-connectivity");
		}
	}

	ue.set_state(UeState::Active);
	Ok(())
}

/// §4.4.1 — registration, authentication, security-mode, initial context
/// setup, registration-complete, and the trailing UE-configuration-update.
async fn process_ue_initialization(
	gnb: &Arc<GnbContext>,
	ue: &Arc<RanUe>,
	n2_rx: &mut mpsc::UnboundedReceiver<NgapPdu>,
) -> Result<(), ProcedureError> {
	// 1. RegistrationRequest (UE) -> cache IMSI -> InitialUEMessage (N2).
	let registration_request = n1_read(ue).await?;
	if let Ok(message) = nas::decode_gmm_message(&registration_request) {
		if let Some(imsi) = nas::extract_imsi_from_registration_request(&message) {
			ue.set_imsi(imsi);
		}
	}
	let initial_ue_message = ngap::build_initial_ue_message(ue.ran_ue_ngap_id, registration_request)?;
	gnb.n2_out.send(initial_ue_message).map_err(|_| crate::error::TransportError::ConnectionClosed)?;

	// 2. DownlinkNASTransport(AuthenticationRequest) (N2) -> forward (N1).
	let (amf_ue_ngap_id, _, auth_request) = ngap::extract_downlink_nas_transport(n2_recv(n2_rx).await?)?;
	ue.set_amf_ue_ngap_id(amf_ue_ngap_id);
	n1_write(ue, &auth_request).await?;

	// 3. AuthenticationResponse (N1) -> UplinkNASTransport (N2).
	let auth_response = n1_read(ue).await?;
	forward_uplink(gnb, ue, amf_ue_ngap_id, auth_response)?;

	// 4. DownlinkNASTransport(SecurityModeCommand) (N2) -> forward (N1).
	let (_, _, security_mode_command) = ngap::extract_downlink_nas_transport(n2_recv(n2_rx).await?)?;
	n1_write(ue, &security_mode_command).await?;

	// 5. SecurityModeComplete (N1) -> UplinkNASTransport (N2).
	let security_mode_complete = n1_read(ue).await?;
	forward_uplink(gnb, ue, amf_ue_ngap_id, security_mode_complete)?;

	// 6. InitialContextSetupRequest (N2) -> InitialContextSetupResponse (N2).
	let initial_context_setup_request = n2_recv(n2_rx).await?;
	ngap::expect_initial_context_setup_request(&initial_context_setup_request)?;
	let response = ngap::build_initial_context_setup_response(ue.ran_ue_ngap_id, amf_ue_ngap_id)?;
	gnb.n2_out.send(response).map_err(|_| crate::error::TransportError::ConnectionClosed)?;

	// 7. RegistrationComplete (N1) -> UplinkNASTransport (N2).
	let registration_complete = n1_read(ue).await?;
	forward_uplink(gnb, ue, amf_ue_ngap_id, registration_complete)?;

	// 8. UEConfigurationUpdateCommand (N2) -> validated and dropped.
	let configuration_update = n2_recv(n2_rx).await?;
	ngap::expect_ue_configuration_update_command(&configuration_update)?;

	Ok(())
}

/// §4.4.2 — one PDU session's establishment. The Xn-obtained secondary
/// tunnel is cached on the UE (`xn_secondary`): written during session 1 (if
/// NR-DC is on) and read back during session 2, whose primary tunnel *is*
/// the secondary gNB's tunnel, and again by every later modify-indication.
async fn process_ue_pdu_session_establishment(
	gnb: &Arc<GnbContext>,
	ue: &Arc<RanUe>,
	n2_rx: &mut mpsc::UnboundedReceiver<NgapPdu>,
	pdu_session_id: u8,
) -> Result<(), ProcedureError> {
	let amf_ue_ngap_id = ue.get_amf_ue_ngap_id().ok_or(ProcedureError::InvalidState("AMF-UE-NGAP-ID not yet set"))?;

	// 1. PDUSessionEstablishmentRequest (N1) -> UplinkNASTransport (N2).
	let establishment_request = n1_read(ue).await?;
	forward_uplink(gnb, ue, amf_ue_ngap_id, establishment_request)?;

	// 2-3. PDUSessionResourceSetupRequest (N2); extract the session item.
	let setup_request = n2_recv(n2_rx).await?;
	let raw_setup_request = ngap::encode_ngap_pdu(&setup_request)?;
	let (_, _, items) = ngap::extract_pdu_session_resource_setup_request(setup_request)?;
	let item = items
		.into_iter()
		.find(|item| item.pdu_session_id == pdu_session_id)
		.ok_or(crate::error::CodecError::MissingIe("PDUSessionResourceSetupListSUReq item for this session"))?;

	// 4. Set UL-TEID from the transfer.
	let ul_teid = ngap::decode_pdu_session_resource_setup_request_transfer(&item.transfer)?;
	ue.set_ul_teid(ul_teid);

	// 5. Session 1, NR-DC on: fetch the secondary tunnel over Xn.
	if pdu_session_id == 1 && gnb.config.gnb.nrdc {
		if let Some(client) = xn_client(gnb) {
			let imsi = ue.get_imsi().unwrap_or_default();
			match client.setup_request_transfer(&imsi, raw_setup_request).await {
				Ok(remote_item) => ue.set_xn_secondary(remote_item),
				Err(e) => warn!(ran_ue_ngap_id = ue.ran_ue_ngap_id, error = %e, "Xn setup-request-transfer failed, proceeding primary-only"),
			}
		}
	}

	// 6. Forward the NAS accept to the UE.
	n1_write(ue, &item.nas_pdu).await?;

	// 7. Build the response transfer.
	let transfer = match pdu_session_id {
		1 => ngap::build_pdu_session_resource_setup_response_transfer(
			ue.get_dl_teid().ok_or(ProcedureError::InvalidState("DL-TEID not yet allocated"))?,
			gnb.config.gnb.ran_n3_ip,
			ue.get_xn_secondary(),
		)?,
		_ => {
			let remote = ue
				.get_xn_secondary()
				.ok_or(crate::error::CodecError::MissingIe("no Xn secondary tunnel available for NR-DC session 2"))?;
			ngap::build_pdu_session_resource_setup_response_transfer_from_xn(remote)?
		}
	};

	// 8. Send the response.
	let response = ngap::build_pdu_session_resource_setup_response(
		ue.ran_ue_ngap_id,
		amf_ue_ngap_id,
		vec![ngap::SetupResponseItem { pdu_session_id, transfer }],
	)?;
	gnb.n2_out.send(response).map_err(|_| crate::error::TransportError::ConnectionClosed)?;

	Ok(())
}

/// §4.4.3 — modify indication, triggered by the management API. Always
/// makes one Xn `ModifyIndication` round trip; if NR-DC was off before this
/// call, also makes an Xn `ModifyConfirm` round trip once N2 confirms.
/// Finishes by writing the literal `"tunnel update"` control word to N1 and
/// flipping the UE's NR-DC flag.
async fn process_ue_pdu_session_modify_indication(
	gnb: &Arc<GnbContext>,
	ue: &Arc<RanUe>,
	n2_rx: &mut mpsc::UnboundedReceiver<NgapPdu>,
) -> Result<(), ProcedureError> {
	let amf_ue_ngap_id = ue.get_amf_ue_ngap_id().ok_or(ProcedureError::InvalidState("AMF-UE-NGAP-ID not yet set"))?;
	let dl_teid = ue.get_dl_teid().ok_or(ProcedureError::InvalidState("DL-TEID not yet allocated"))?;
	let imsi = ue.get_imsi().unwrap_or_default();
	let was_nrdc_active = ue.is_nrdc_active();

	let client = xn_client(gnb).ok_or(crate::error::XnError::MalformedFrame("no Xn peer configured"))?;
	let secondary = ue.get_xn_secondary();

	let modify_indication =
		ngap::build_pdu_session_resource_modify_indication(ue.ran_ue_ngap_id, amf_ue_ngap_id, 1, dl_teid, gnb.config.gnb.ran_n3_ip, secondary)?;

	// §4.7: the secondary's reply is either the same PDU or one whose
	// secondary-tunnel fields were populated/updated — forward whatever it
	// sent rather than the pre-round-trip copy, so an updated tunnel
	// actually reaches the AMF.
	let via_xn = client.modify_indication(&imsi, modify_indication.clone()).await?;
	let outgoing = match ngap::validate_modify_indication_reply(&via_xn) {
		Ok(()) => via_xn,
		Err(e) => {
			warn!(ran_ue_ngap_id = ue.ran_ue_ngap_id, error = %e, "Xn modify-indication reply was malformed, sending unmodified indication");
			modify_indication
		}
	};

	gnb.n2_out.send(outgoing).map_err(|_| crate::error::TransportError::ConnectionClosed)?;

	let confirm = n2_recv(n2_rx).await?;
	ngap::expect_pdu_session_resource_modify_confirm(&confirm)?;

	if !was_nrdc_active {
		let modify_confirm_bytes = ngap::encode_ngap_pdu(&confirm)?;
		client.modify_confirm(&imsi, modify_confirm_bytes).await?;
	}

	n1_write_tunnel_update(ue).await?;
	ue.set_nrdc_active(!was_nrdc_active);

	Ok(())
}

/// §4.4.4 — deregistration. `deregistration_request` is the NAS PDU that
/// [`park_until_deregistration`] already read off N1.
async fn process_ue_deregistration(
	gnb: &Arc<GnbContext>,
	ue: &Arc<RanUe>,
	n2_rx: &mut mpsc::UnboundedReceiver<NgapPdu>,
	deregistration_request: Bytes,
) -> Result<(), ProcedureError> {
	let amf_ue_ngap_id = ue.get_amf_ue_ngap_id().ok_or(ProcedureError::InvalidState("AMF-UE-NGAP-ID not yet set"))?;

	// 1. DeregistrationRequest -> UplinkNASTransport (N2).
	forward_uplink(gnb, ue, amf_ue_ngap_id, deregistration_request)?;

	// 2. DownlinkNASTransport(DeregistrationAccept) (N2) -> forward (N1).
	let (_, _, deregistration_accept) = ngap::extract_downlink_nas_transport(n2_recv(n2_rx).await?)?;
	n1_write(ue, &deregistration_accept).await?;

	// 3. UEContextReleaseCommand (N2) -> UEContextReleaseComplete (N2).
	let release_command = n2_recv(n2_rx).await?;
	ngap::expect_ue_context_release_command(&release_command)?;
	let pdu_session_ids: &[u8] = if gnb.config.gnb.nrdc { &[1, 2] } else { &[1] };
	let release_complete = ngap::build_ue_context_release_complete(
		ue.ran_ue_ngap_id,
		amf_ue_ngap_id,
		pdu_session_ids,
		plmn_bytes(gnb)?,
		tac_bytes(gnb)?,
	)?;
	gnb.n2_out.send(release_complete).map_err(|_| crate::error::TransportError::ConnectionClosed)?;

	Ok(())
}

/// Parks on N1, racing a deregistration read against inbound modify
/// requests from the management API. Returns the raw NAS
/// `DeregistrationRequest` bytes once one arrives, or the transport error
/// that ended the race (N1 closed by the supervisor at shutdown, most
/// commonly).
async fn park_until_deregistration(
	gnb: &Arc<GnbContext>,
	ue: &Arc<RanUe>,
	n2_rx: &mut mpsc::UnboundedReceiver<NgapPdu>,
	modify_rx: &mut mpsc::UnboundedReceiver<ModifyRequest>,
) -> Result<Bytes, ProcedureError> {
	let mut sock = ue.n1_socket.lock().await;
	let mut reader = FrameReader::new();
	loop {
		tokio::select! {
			biased;
			request = modify_rx.recv() => {
				let Some(reply) = request else {
					continue;
				};
				let result = process_ue_pdu_session_modify_indication(gnb, ue, n2_rx).await;
				let _ = reply.send(result);
			}
			frame = reader.read_frame(&mut sock) => {
				return frame.map_err(ProcedureError::from);
			}
		}
	}
}

fn n1_read(ue: &RanUe) -> impl std::future::Future<Output = Result<Bytes, crate::error::TransportError>> + '_ {
	async move {
		let mut sock = ue.n1_socket.lock().await;
		n1::read_frame(&mut sock).await
	}
}

async fn n1_write(ue: &RanUe, payload: &[u8]) -> Result<(), crate::error::TransportError> {
	let mut sock = ue.n1_socket.lock().await;
	n1::write_frame(&mut sock, payload).await
}

async fn n1_write_tunnel_update(ue: &RanUe) -> Result<(), crate::error::TransportError> {
	let mut sock = ue.n1_socket.lock().await;
	n1::write_tunnel_update(&mut sock).await
}

async fn n2_recv(n2_rx: &mut mpsc::UnboundedReceiver<NgapPdu>) -> Result<NgapPdu, crate::error::TransportError> {
	n2_rx.recv().await.ok_or(crate::error::TransportError::ConnectionClosed)
}

fn forward_uplink(gnb: &GnbContext, ue: &RanUe, amf_ue_ngap_id: u64, nas_pdu: Bytes) -> Result<(), ProcedureError> {
	let transport = ngap::build_uplink_nas_transport(ue.ran_ue_ngap_id, amf_ue_ngap_id, nas_pdu)?;
	gnb.n2_out.send(transport).map_err(|_| crate::error::TransportError::ConnectionClosed)?;
	Ok(())
}

fn xn_client(gnb: &GnbContext) -> Option<XnClient> {
	let peer = gnb.config.gnb.xn_peer.as_ref()?;
	Some(XnClient::new(SocketAddr::new(peer.xn_ip, peer.xn_port)))
}

fn plmn_bytes(gnb: &GnbContext) -> Result<ngap::PlmnBytes, crate::error::CodecError> {
	Ok(crate::codec::convert::plmn_id_to_bytes(&gnb.config.gnb.tai.broadcast_plmn_id.mcc, &gnb.config.gnb.tai.broadcast_plmn_id.mnc)?)
}

fn tac_bytes(gnb: &GnbContext) -> Result<ngap::TacBytes, crate::error::CodecError> {
	Ok(crate::codec::convert::tac_to_bytes(&gnb.config.gnb.tai.tac)?)
}
