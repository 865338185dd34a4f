//! PLMN-identity packing, duplicated from the gNB crate's
//! `codec/convert/plmn.rs` rather than shared, matching this workspace's
//! convention of keeping each NF crate self-contained.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConvertError {
	#[error("MCC {0:?} is not exactly 3 decimal digits")]
	InvalidMcc(String),
	#[error("MNC {0:?} is not 2 or 3 decimal digits")]
	InvalidMnc(String),
}

fn digit(c: u8) -> Result<u8, ConvertError> {
	match c {
		b'0'..=b'9' => Ok(c - b'0'),
		_ => Err(ConvertError::InvalidMcc(String::new())),
	}
}

pub fn plmn_id_to_bytes(mcc: &str, mnc: &str) -> Result<[u8; 3], ConvertError> {
	if mcc.len() != 3 || !mcc.bytes().all(|b| b.is_ascii_digit()) {
		return Err(ConvertError::InvalidMcc(mcc.to_string()));
	}
	if !(mnc.len() == 2 || mnc.len() == 3) || !mnc.bytes().all(|b| b.is_ascii_digit()) {
		return Err(ConvertError::InvalidMnc(mnc.to_string()));
	}
	let mcc = mcc.as_bytes();
	let mnc = mnc.as_bytes();
	let mnc3 = if mnc.len() == 3 { digit(mnc[2])? } else { 0xF };

	let b0 = (digit(mcc[1])? << 4) | digit(mcc[0])?;
	let b1 = (mnc3 << 4) | digit(mcc[2])?;
	let b2 = (digit(mnc[1])? << 4) | digit(mnc[0])?;
	Ok([b0, b1, b2])
}

/// 3GPP TS 23.003 §28.7.8 serving-network name used as `sn_name` in every
/// KDF call: `"5G:mnc<MNC>.mcc<MCC>.3gppnetwork.org"`, MNC zero-padded to
/// three digits.
pub fn serving_network_name(mcc: &str, mnc: &str) -> String {
	let mnc3 = if mnc.len() == 2 { format!("0{mnc}") } else { mnc.to_string() };
	format!("5G:mnc{mnc3}.mcc{mcc}.3gppnetwork.org")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sn_name_pads_two_digit_mnc() {
		assert_eq!(serving_network_name("208", "93"), "5G:mnc093.mcc208.3gppnetwork.org");
	}

	#[test]
	fn sn_name_keeps_three_digit_mnc() {
		assert_eq!(serving_network_name("234", "150"), "5G:mnc150.mcc234.3gppnetwork.org");
	}

	#[test]
	fn rejects_malformed_mcc() {
		assert_eq!(plmn_id_to_bytes("20", "93"), Err(ConvertError::InvalidMcc("20".into())));
	}
}
