//! The gNB never builds or fully parses NAS content — NAS PDUs travel
//! opaquely between the UE and the AMF, riding inside `NAS-PDU` IEs on the N2
//! side and inside the UE's N1 frame on the other. The one exception is the
//! initial `RegistrationRequest`: the gNB peeks at its 5GS mobile identity to
//! cache an IMSI for later Xn/management-API lookups, mirroring
//! `ranUe.go`'s `GetMobileIdentityIMSI` in the system this was distilled
//! from, itself grounded in the donor's `nas/handlers/registration_request.rs`
//! mobile-identity match.

use nas_models::message::GmmMessage;
use nas_models::types::MobileIdentity;

use crate::error::CodecError;

pub fn decode_gmm_message(bytes: &[u8]) -> Result<GmmMessage, CodecError> {
	GmmMessage::from_bytes(bytes).map_err(|source| CodecError::NasDecodeError(source.to_string()))
}

pub fn message_name(message: &GmmMessage) -> &'static str {
	match message {
		GmmMessage::RegistrationRequest(_) => "RegistrationRequest",
		GmmMessage::AuthenticationResponse(_) => "AuthenticationResponse",
		GmmMessage::AuthenticationFailure(_) => "AuthenticationFailure",
		GmmMessage::SecurityModeComplete(_) => "SecurityModeComplete",
		GmmMessage::RegistrationComplete(_) => "RegistrationComplete",
		GmmMessage::DeregistrationRequestUeOriginating(_) => "DeregistrationRequest",
		GmmMessage::UlNasTransport(_) => "ULNASTransport",
		GmmMessage::GmmStatus(_) => "GMMStatus",
		_ => "Other",
	}
}

/// Extracts the SUCI carried in a `RegistrationRequest`'s 5GS mobile identity
/// and renders it as `imsi-<mcc><mnc><msin>`, the format the rest of this
/// engine uses to key UEs. Returns `None` for any other identity type (5G-GUTI
/// re-registration, emergency IMEI, etc.) — those procedures aren't modelled.
pub fn extract_imsi_from_registration_request(message: &GmmMessage) -> Option<String> {
	let GmmMessage::RegistrationRequest(request) = message else {
		return None;
	};
	match request.nas_5gs_mobile_identity.get_mobile_identity() {
		MobileIdentity::Suci(suci) => suci_to_imsi(&suci.to_string()),
		_ => None,
	}
}

/// A SUCI renders as `suci-0-<mcc>-<mnc>-<routing indicator>-<protection
/// scheme>-<home network key id>-<scheme output>`; the scheme output for the
/// null-scheme SUCIs this simulator issues is the bare MSIN.
fn suci_to_imsi(suci: &str) -> Option<String> {
	let mut parts = suci.split('-');
	let _supi_format = parts.next()?;
	let _routing_type = parts.next()?;
	let mcc = parts.next()?;
	let mnc = parts.next()?;
	let _routing_indicator = parts.next()?;
	let _protection_scheme = parts.next()?;
	let _home_network_key_id = parts.next()?;
	let msin = parts.next()?;
	Some(format!("imsi-{mcc}{mnc}{msin}"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn suci_to_imsi_parses_null_scheme_suci() {
		let suci = "suci-0-001-01-0000-0-0-0000000001";
		assert_eq!(suci_to_imsi(suci), Some("imsi-00101 0000000001".replace(' ', "")));
	}

	#[test]
	fn suci_to_imsi_rejects_malformed_input() {
		assert_eq!(suci_to_imsi("not-a-suci"), None);
	}
}
