//! UE-side procedure engine (C8), the mirror of the gNB crate's
//! `procedures.rs`: drives the subscriber's end of §4.4.1 registration,
//! §4.4.2 PDU session establishment, the parked `"tunnel update"` watch, and
//! §4.4.4 deregistration.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use nas_models::message::GmmMessage;
use security::{CipheringAlgorithm, IntegrityAlgorithm};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::codec::convert::serving_network_name;
use crate::codec::nas as nas_codec;
use crate::config::{AccessType, CipheringAlgorithmIe, IntegrityAlgorithmIe, UeConfig};
use crate::context::{SessionDataPlane, UeContext, UeState};
use crate::data_plane;
use crate::error::ProcedureError;
use crate::n1::{self, FrameReader, TUNNEL_UPDATE};
use crate::security::{self as ue_security, UeSecurityContext};

const INTER_PHASE_PACE: Duration = Duration::from_secs(1);

fn select_ciphering(ie: &CipheringAlgorithmIe) -> CipheringAlgorithm {
	if ie.nea3 {
		CipheringAlgorithm::Nea3
	} else if ie.nea2 {
		CipheringAlgorithm::Nea2
	} else if ie.nea1 {
		CipheringAlgorithm::Nea1
	} else {
		CipheringAlgorithm::Nea0
	}
}

fn select_integrity(ie: &IntegrityAlgorithmIe) -> IntegrityAlgorithm {
	if ie.nia3 {
		IntegrityAlgorithm::Nia3
	} else if ie.nia2 {
		IntegrityAlgorithm::Nia2
	} else if ie.nia1 {
		IntegrityAlgorithm::Nia1
	} else {
		IntegrityAlgorithm::Nia0
	}
}

/// Security-capability bitmask, one bit per algorithm id (EA0/IA0 in bit 0).
fn capability_bitmask(alg_id: u8) -> u8 {
	1u8 << alg_id
}

fn decode_hex_fixed<const N: usize>(s: &str) -> [u8; N] {
	let mut out = [0u8; N];
	faster_hex::hex_decode(s.as_bytes(), &mut out).expect("configured hex field is well-formed");
	out
}

fn supi(config: &UeConfig) -> String {
	format!("imsi-{}{}{}", config.ue.plmn_id.mcc, config.ue.plmn_id.mnc, config.ue.msin)
}

async fn write_plain(stream: &mut TcpStream, gmm: &GmmMessage) -> Result<(), ProcedureError> {
	let body = nas_codec::encode_gmm_message(gmm)?;
	let mut framed = Vec::with_capacity(2 + body.len());
	framed.push(ue_security::EPD_5GMM);
	framed.push(ue_security::SHT_PLAIN);
	framed.extend_from_slice(&body);
	n1::write_frame(stream, &framed).await?;
	Ok(())
}

fn decode_plain(frame: &Bytes) -> Result<GmmMessage, ProcedureError> {
	Ok(nas_codec::decode_gmm_message(&frame[2..])?)
}

/// §4.4.1 registration + §33.501 authentication/security-mode, from the
/// subscriber's side. Returns the established security context.
pub async fn run_registration(config: &UeConfig, ctx: &UeContext, stream: &mut TcpStream) -> Result<(), ProcedureError> {
	ctx.set_supi(supi(config));
	ctx.set_state(UeState::Registering);

	let ciphering = select_ciphering(&config.ue.ciphering_algorithm);
	let integrity = select_integrity(&config.ue.integrity_algorithm);
	let ea = capability_bitmask(ciphering.id());
	let ia = capability_bitmask(integrity.id());

	let registration_request = nas_codec::build_registration_request(&config.ue.plmn_id.mcc, &config.ue.plmn_id.mnc, &config.ue.msin, ea, ia);
	write_plain(stream, &registration_request).await?;
	info!("sent RegistrationRequest");

	let auth_request_frame = n1::read_frame(stream).await?;
	let auth_request = decode_plain(&auth_request_frame)?;
	let (rand, _autn) = nas_codec::extract_authentication_request(&auth_request)?;
	info!("received AuthenticationRequest");

	let k: [u8; 16] = decode_hex_fixed(&config.ue.authentication_subscription.enc_permanent_key);
	let opc: [u8; 16] = decode_hex_fixed(&config.ue.authentication_subscription.enc_opc_key);
	let amf: [u8; 2] = decode_hex_fixed(&config.ue.authentication_subscription.authentication_management_field);
	let sqn: [u8; 6] = decode_hex_fixed(&config.ue.authentication_subscription.sequence_number);
	let sn_name = serving_network_name(&config.ue.plmn_id.mcc, &config.ue.plmn_id.mnc);
	let bearer = ue_security::bearer_for(config.ue.access_type);

	let supi_str = ctx.get_supi().expect("supi set above");
	let (security_context, res_star) = ue_security::derive_res_star_and_set_key(&supi_str, ciphering, integrity, &sqn, &amf, &k, &opc, &rand, &sn_name, bearer);
	*ctx.security.lock().expect("UeContext mutex poisoned") = Some(security_context);

	let auth_response = nas_codec::build_authentication_response(&res_star);
	write_plain(stream, &auth_response).await?;
	info!("sent AuthenticationResponse");

	let sm_command_frame = n1::read_frame(stream).await?;
	let sm_command = {
		let mut guard = ctx.security.lock().expect("UeContext mutex poisoned");
		let sec = guard.as_mut().expect("security context set above");
		let plain = sec.unprotect(&sm_command_frame)?;
		nas_codec::decode_gmm_message(&plain)?
	};
	if !matches!(sm_command, GmmMessage::SecurityModeCommand(_)) {
		return Err(ProcedureError::Codec(crate::error::CodecError::UnexpectedMessage {
			expected: "SecurityModeCommand",
			actual: nas_codec::message_name(&sm_command),
		}));
	}
	info!("received SecurityModeCommand");
	ctx.set_state(UeState::SecurityEstablished);

	let registration_with_capability = nas_codec::build_registration_request_with_capability(&config.ue.plmn_id.mcc, &config.ue.plmn_id.mnc, &config.ue.msin, ea, ia);
	let container = nas_codec::encode_gmm_message(&registration_with_capability)?;
	let sm_complete = nas_codec::build_security_mode_complete(None, Some(container));
	let sm_complete_bytes = nas_codec::encode_gmm_message(&sm_complete)?;
	let frame = {
		let mut guard = ctx.security.lock().expect("UeContext mutex poisoned");
		let sec = guard.as_mut().expect("security context set above");
		sec.protect(&sm_complete_bytes, ue_security::SHT_INTEGRITY_PROTECTED_AND_CIPHERED_NEW_CONTEXT)
	};
	n1::write_frame(stream, &frame).await?;
	info!("sent SecurityModeComplete");

	tokio::time::sleep(INTER_PHASE_PACE).await;

	let registration_complete = nas_codec::build_registration_complete();
	let registration_complete_bytes = nas_codec::encode_gmm_message(&registration_complete)?;
	let frame = protect(ctx, &registration_complete_bytes);
	n1::write_frame(stream, &frame).await?;
	info!("sent RegistrationComplete");

	Ok(())
}

fn protect(ctx: &UeContext, plain: &[u8]) -> Bytes {
	let mut guard = ctx.security.lock().expect("UeContext mutex poisoned");
	let sec: &mut UeSecurityContext = guard.as_mut().expect("security context established before this call");
	sec.protect(plain, ue_security::SHT_INTEGRITY_PROTECTED_AND_CIPHERED)
}

/// §4.4.2, subscriber side: establishes one PDU session and, for session 1,
/// immediately brings up its TUN device and data-plane pump tasks. Session
/// 2 under NR-DC only records its assigned address here — its data plane
/// stays [`SessionDataPlane::Pending`] until the control socket delivers
/// `"tunnel update"`, per §4.8.
pub async fn establish_pdu_session(config: &UeConfig, ctx: &Arc<UeContext>, stream: &mut TcpStream, pdu_session_id: u8) -> Result<(), ProcedureError> {
	let request = nas_codec::build_pdu_session_establishment_request(pdu_session_id);
	let request_bytes = nas_codec::encode_gmm_message(&request)?;
	let frame = protect(ctx, &request_bytes);
	n1::write_frame(stream, &frame).await?;
	info!(pdu_session_id, "sent PDUSessionEstablishmentRequest");

	let accept_frame = n1::read_frame(stream).await?;
	let plain = {
		let mut guard = ctx.security.lock().expect("UeContext mutex poisoned");
		guard.as_mut().expect("security context established").unprotect(&accept_frame)?
	};
	let accept = nas_codec::decode_gmm_message(&plain)?;
	let address = nas_codec::extract_pdu_session_establishment_accept(&accept)?;
	info!(pdu_session_id, %address, "received PDUSessionEstablishmentAccept");

	let session = if pdu_session_id == 1 { &ctx.session1 } else { ctx.session2.as_ref().expect("session 2 configured for nrdc") };
	session.set_address(address);

	if pdu_session_id == 1 {
		let data_plane_addr = SocketAddr::new(config.ue.ran_data_plane_ip, config.ue.ran_data_plane_port);
		activate_session_data_plane(config, session, data_plane_addr, CancellationToken::new()).await?;
	}

	Ok(())
}

async fn activate_session_data_plane(
	config: &UeConfig,
	session: &crate::context::PduSession,
	data_plane_addr: SocketAddr,
	shutdown: CancellationToken,
) -> Result<(), ProcedureError> {
	let address = session.get_address().expect("session address set before activation");
	let tun_name = format!("{}{}", config.ue.tun_name_prefix, session.pdu_session_id);
	let tun_dev = data_plane::bring_up_tun(&tun_name, address)?;
	let (tun_read, tun_write) = tokio::io::split(tun_dev);
	let socket = Arc::new(data_plane::dial_and_announce(data_plane_addr).await?);

	tokio::spawn(data_plane::tun_to_socket(tun_read, socket.clone(), shutdown.clone()));
	tokio::spawn(data_plane::socket_to_tun(socket, tun_write, shutdown.clone()));

	*session.data_plane.lock().expect("PduSession mutex poisoned") = SessionDataPlane::Active { shutdown };
	info!(pdu_session_id = session.pdu_session_id, %tun_name, "data plane active");
	Ok(())
}

/// Parks on the control socket, checking `shutdown` between 1-second read
/// attempts (SPEC_FULL.md §5), and handles `"tunnel update"` by toggling
/// session 2's data plane on or off. Returns when `shutdown` is cancelled or
/// the socket closes.
pub async fn park(config: &UeConfig, ctx: &Arc<UeContext>, stream: &mut TcpStream, shutdown: &CancellationToken) {
	let mut reader = FrameReader::new();
	loop {
		if shutdown.is_cancelled() {
			return;
		}
		match reader.read_frame_timeout(stream).await {
			Ok(None) => continue,
			Ok(Some(frame)) => {
				if frame.as_ref() == TUNNEL_UPDATE.as_bytes() {
					handle_tunnel_update(config, ctx).await;
				} else {
					warn!(len = frame.len(), "dropping unrecognized control-plane payload");
				}
			}
			Err(e) => {
				warn!(error = %e, "control-plane read failed, ending park loop");
				return;
			}
		}
	}
}

async fn handle_tunnel_update(config: &UeConfig, ctx: &Arc<UeContext>) {
	let Some(session) = ctx.session2.as_ref() else {
		warn!("received tunnel update with no NR-DC session configured, dropping");
		return;
	};
	let nrdc = config.ue.nrdc.as_ref().expect("session2 implies nrdc config present");

	let was_active = matches!(&*session.data_plane.lock().expect("PduSession mutex poisoned"), SessionDataPlane::Active { .. });
	if was_active {
		if let SessionDataPlane::Active { shutdown } = std::mem::replace(&mut *session.data_plane.lock().expect("PduSession mutex poisoned"), SessionDataPlane::Pending) {
			shutdown.cancel();
		}
		info!("tunnel update: deactivated session 2 data plane");
	} else {
		let addr = SocketAddr::new(nrdc.secondary_ran_data_plane_ip, nrdc.secondary_ran_data_plane_port);
		if let Err(e) = activate_session_data_plane(config, session, addr, CancellationToken::new()).await {
			warn!(error = %e, "failed to activate session 2 data plane");
			return;
		}
		info!("tunnel update: activated session 2 data plane");
	}
}

/// §4.4.4, subscriber side: sends `DeregistrationRequest` and waits for the
/// matching `DeregistrationAccept`. Invoked by the supervisor on graceful
/// shutdown — the donor UE never sends this message at all, a gap this
/// engine closes so the protocol engine is symmetric with the gNB side,
/// which can only run its own dereg procedure in response to one arriving.
pub async fn deregister(ctx: &UeContext, stream: &mut TcpStream) -> Result<(), ProcedureError> {
	ctx.set_state(UeState::Deregistering);
	let request = nas_codec::build_deregistration_request();
	let request_bytes = nas_codec::encode_gmm_message(&request)?;
	let frame = protect(ctx, &request_bytes);
	n1::write_frame(stream, &frame).await?;
	info!("sent DeregistrationRequest");

	let accept_frame = n1::read_frame(stream).await?;
	let plain = {
		let mut guard = ctx.security.lock().expect("UeContext mutex poisoned");
		guard.as_mut().expect("security context established").unprotect(&accept_frame)?
	};
	let accept = nas_codec::decode_gmm_message(&plain)?;
	if !matches!(accept, GmmMessage::DeregistrationAcceptUeOriginating(_)) {
		warn!(actual = nas_codec::message_name(&accept), "expected DeregistrationAccept");
	}
	ctx.set_state(UeState::Released);
	Ok(())
}

pub async fn run_session_setup(config: &UeConfig, ctx: &Arc<UeContext>, stream: &mut TcpStream) -> Result<(), ProcedureError> {
	ctx.set_state(UeState::PduSetup);
	establish_pdu_session(config, ctx, stream, 1).await?;
	if ctx.session2.is_some() {
		tokio::time::sleep(INTER_PHASE_PACE).await;
		if let Err(e) = establish_pdu_session(config, ctx, stream, 2).await {
			warn!(error = %e, "session 2 establishment failed, continuing with session 1 only");
		}
	}
	ctx.set_state(UeState::Active);
	Ok(())
}
