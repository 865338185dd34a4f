//! Builders and extractors for every GMM message the UE originates or
//! receives, grounded in `ue/nas.go`'s message-construction helpers
//! (`buildRegistrationRequest`, `buildAuthenticationResponse`,
//! `buildSecurityModeComplete`, `buildRegistrationComplete`,
//! `buildDeregistrationRequest`, `buildPduSessionEstablishmentRequest`) and,
//! for decoding, the same `nas_models::message::GmmMessage` the gNB crate's
//! `codec/nas.rs` already decodes against — the encode side is inferred by
//! symmetry with that confirmed decode API, since this workspace has no
//! prior NAS-encoding call site to copy from directly.

use bytes::Bytes;
use nas_models::message::GmmMessage;
use nas_models::types::MobileIdentity;

use crate::error::CodecError;

pub fn decode_gmm_message(bytes: &[u8]) -> Result<GmmMessage, CodecError> {
	GmmMessage::from_bytes(bytes).map_err(|source| CodecError::NasDecodeError(source.to_string()))
}

pub fn encode_gmm_message(message: &GmmMessage) -> Result<Bytes, CodecError> {
	message
		.to_bytes()
		.map(Bytes::from)
		.map_err(|source| CodecError::NasDecodeError(source.to_string()))
}

pub fn message_name(message: &GmmMessage) -> &'static str {
	match message {
		GmmMessage::RegistrationRequest(_) => "RegistrationRequest",
		GmmMessage::AuthenticationRequest(_) => "AuthenticationRequest",
		GmmMessage::AuthenticationResponse(_) => "AuthenticationResponse",
		GmmMessage::AuthenticationFailure(_) => "AuthenticationFailure",
		GmmMessage::SecurityModeCommand(_) => "SecurityModeCommand",
		GmmMessage::SecurityModeComplete(_) => "SecurityModeComplete",
		GmmMessage::RegistrationComplete(_) => "RegistrationComplete",
		GmmMessage::DeregistrationRequestUeOriginating(_) => "DeregistrationRequest",
		GmmMessage::DeregistrationAcceptUeOriginating(_) => "DeregistrationAccept",
		GmmMessage::UlNasTransport(_) => "ULNASTransport",
		GmmMessage::DlNasTransport(_) => "DLNASTransport",
		GmmMessage::GmmStatus(_) => "GMMStatus",
		_ => "Other",
	}
}

/// `suci-0-<mcc>-<mnc>-0000-0-0-<msin>`, the null-scheme SUCI format the
/// gNB's own `suci_to_imsi` parses on the way in.
fn suci_string(mcc: &str, mnc: &str, msin: &str) -> String {
	format!("suci-0-{mcc}-{mnc}-0000-0-0-{msin}")
}

pub fn build_registration_request(mcc: &str, mnc: &str, msin: &str, ciphering_caps: u8, integrity_caps: u8) -> GmmMessage {
	let suci = suci_string(mcc, mnc, msin);
	let mobile_identity = MobileIdentity::Suci(suci.parse().expect("well-formed SUCI"));
	GmmMessage::RegistrationRequest(Box::new(nas_models::message::RegistrationRequest {
		nas_5gs_mobile_identity: mobile_identity.into(),
		ue_security_capability: nas_models::types::UeSecurityCapability {
			ea: ciphering_caps,
			ia: integrity_caps,
			..Default::default()
		},
		..Default::default()
	}))
}

/// Appended to `RegistrationRequest` as the `NASMessageContainer` carried
/// inside `SecurityModeComplete`, matching `ue/nas.go`'s
/// `buildNasSecurityModeCompleteMessage`'s replay of the original plaintext
/// request with 5GMM capability attached. The `0x07` capability octet is
/// grounded in `ue/ue.go`'s `get5GmmCapability`.
pub fn build_registration_request_with_capability(mcc: &str, mnc: &str, msin: &str, ciphering_caps: u8, integrity_caps: u8) -> GmmMessage {
	let mut message = build_registration_request(mcc, mnc, msin, ciphering_caps, integrity_caps);
	if let GmmMessage::RegistrationRequest(request) = &mut message {
		request.capability_5gmm = Some(nas_models::types::Capability5GMM { octet: [0x07, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0], ..Default::default() });
	}
	message
}

pub fn build_authentication_response(res_star: &[u8; 16]) -> GmmMessage {
	GmmMessage::AuthenticationResponse(Box::new(nas_models::message::AuthenticationResponse {
		authentication_response_parameter: nas_models::types::AuthenticationResponseParameter { res: res_star.to_vec() },
		..Default::default()
	}))
}

pub fn build_security_mode_complete(imeisv: Option<String>, nas_message_container: Option<Bytes>) -> GmmMessage {
	GmmMessage::SecurityModeComplete(Box::new(nas_models::message::SecurityModeComplete {
		imeisv: imeisv.map(|v| nas_models::types::MobileIdentity::Imeisv(v.parse().expect("well-formed IMEISV"))),
		nas_message_container: nas_message_container.map(|b| nas_models::types::NasMessageContainer { container: b.to_vec() }),
		..Default::default()
	}))
}

pub fn build_registration_complete() -> GmmMessage {
	GmmMessage::RegistrationComplete(Box::new(nas_models::message::RegistrationComplete::default()))
}

pub fn build_deregistration_request() -> GmmMessage {
	GmmMessage::DeregistrationRequestUeOriginating(Box::new(nas_models::message::DeregistrationRequestUeOriginating::default()))
}

/// Wraps a 5GSM `PDUSessionEstablishmentRequest` inside a GMM
/// `ULNASTransport`, the standard NAS layering the gNB's own
/// `process_ue_pdu_session_establishment` forwards opaquely on N2.
pub fn build_pdu_session_establishment_request(pdu_session_id: u8) -> GmmMessage {
	let gsm = nas_models::message::GsmMessage::PduSessionEstablishmentRequest(Box::new(nas_models::message::PduSessionEstablishmentRequest {
		pdu_session_id,
		pdu_session_type: nas_models::types::PduSessionType::Ipv4,
		..Default::default()
	}));
	let payload = gsm.to_bytes().expect("well-formed 5GSM payload");
	GmmMessage::UlNasTransport(Box::new(nas_models::message::UlNasTransport {
		pdu_session_id: Some(pdu_session_id),
		payload_container: nas_models::types::PayloadContainer { container: payload },
		..Default::default()
	}))
}

/// Extracts `RAND`/`AUTN` from an `AuthenticationRequest`.
pub fn extract_authentication_request(message: &GmmMessage) -> Result<([u8; 16], [u8; 16]), CodecError> {
	let GmmMessage::AuthenticationRequest(request) = message else {
		return Err(CodecError::UnexpectedMessage { expected: "AuthenticationRequest", actual: message_name(message) });
	};
	let rand: [u8; 16] = request.authentication_parameter_rand.rand.clone().try_into().map_err(|_| CodecError::MissingIe("RAND"))?;
	let autn: [u8; 16] = request.authentication_parameter_autn.autn.clone().try_into().map_err(|_| CodecError::MissingIe("AUTN"))?;
	Ok((rand, autn))
}

/// Extracts the `PDUAddress` IE from a `PDUSessionEstablishmentAccept`
/// carried inside a `DLNASTransport`'s payload container.
pub fn extract_pdu_session_establishment_accept(message: &GmmMessage) -> Result<std::net::Ipv4Addr, CodecError> {
	let GmmMessage::DlNasTransport(transport) = message else {
		return Err(CodecError::UnexpectedMessage { expected: "DLNASTransport", actual: message_name(message) });
	};
	let gsm = nas_models::message::GsmMessage::from_bytes(&transport.payload_container.container)
		.map_err(|source| CodecError::NasDecodeError(source.to_string()))?;
	let nas_models::message::GsmMessage::PduSessionEstablishmentAccept(accept) = gsm else {
		return Err(CodecError::MissingIe("PDUSessionEstablishmentAccept"));
	};
	let octets = accept.pdu_address.ok_or(CodecError::MissingIe("PDUAddress"))?.address;
	if octets.len() < 4 {
		return Err(CodecError::MissingIe("PDUAddress"));
	}
	Ok(std::net::Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn suci_string_matches_null_scheme_format() {
		assert_eq!(suci_string("001", "01", "0000000001"), "suci-0-001-01-0000-0-0-0000000001");
	}
}
