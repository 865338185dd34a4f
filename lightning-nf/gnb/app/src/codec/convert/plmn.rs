//! PLMN-Identity packing, TS 38.413 §9.3.3.5: three octets of BCD-encoded
//! MCC/MNC digits, with `0xF` filling the MNC's third digit when the MNC is
//! only two digits long.
//!
//! `mcc`/`mnc` are taken straight from `GnbConfig`/`UeConfig`'s plain
//! `String` fields (`model/plmn.go`'s `PlmnIdIE{Mcc,Mnc}` in the original
//! console tooling) rather than any SBI model type.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConvertError {
	#[error("MCC {0:?} is not exactly 3 decimal digits")]
	InvalidMcc(String),
	#[error("MNC {0:?} is not 2 or 3 decimal digits")]
	InvalidMnc(String),
	#[error("TAC {0:?} is not exactly 6 hex digits")]
	InvalidTac(String),
	#[error("PLMN identity bytes are not valid BCD")]
	InvalidPlmnBytes,
	#[error("gNB ID {0:?} is not an even-length hex string of at most 8 digits")]
	InvalidGnbId(String),
}

fn digit(c: u8) -> Result<u8, ConvertError> {
	match c {
		b'0'..=b'9' => Ok(c - b'0'),
		_ => Err(ConvertError::InvalidMcc(String::new())),
	}
}

/// Packs MCC/MNC decimal-digit strings into the 3-byte PLMN identity.
///
/// Layout (per octet, low nibble first): `MCC2 MCC1 | MCC3 MNC3 | MNC2 MNC1`,
/// with `MNC3 = 0xF` when `mnc` has only two digits.
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

/// Inverse of [`plmn_id_to_bytes`], returning `(mcc, mnc)`.
pub fn plmn_id_to_string(bytes: &[u8; 3]) -> Result<(String, String), ConvertError> {
	let mcc1 = bytes[0] & 0x0F;
	let mcc2 = (bytes[0] >> 4) & 0x0F;
	let mcc3 = bytes[1] & 0x0F;
	let mnc3 = (bytes[1] >> 4) & 0x0F;
	let mnc1 = bytes[2] & 0x0F;
	let mnc2 = (bytes[2] >> 4) & 0x0F;

	for d in [mcc1, mcc2, mcc3, mnc1, mnc2] {
		if d > 9 {
			return Err(ConvertError::InvalidPlmnBytes);
		}
	}
	let mcc = format!("{mcc1}{mcc2}{mcc3}");
	let mnc = if mnc3 == 0xF {
		format!("{mnc1}{mnc2}")
	} else if mnc3 <= 9 {
		format!("{mnc1}{mnc2}{mnc3}")
	} else {
		return Err(ConvertError::InvalidPlmnBytes);
	};
	Ok((mcc, mnc))
}

/// Convenience wrapper used by config loading: turns the bytes straight back
/// into the `"mcc-mnc"` display form used in logs.
pub fn string_to_plmn_id(mcc: &str, mnc: &str) -> Result<String, ConvertError> {
	plmn_id_to_bytes(mcc, mnc)?;
	Ok(format!("{mcc}-{mnc}"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn two_digit_mnc_round_trips() {
		let bytes = plmn_id_to_bytes("208", "93").unwrap();
		assert_eq!(bytes, [0x02, 0xF8, 0x39]);
		assert_eq!(plmn_id_to_string(&bytes).unwrap(), ("208".into(), "93".into()));
	}

	#[test]
	fn three_digit_mnc_round_trips() {
		let bytes = plmn_id_to_bytes("234", "15").unwrap();
		assert_eq!(bytes, [0x32, 0xF4, 0x51]);
		assert_eq!(plmn_id_to_string(&bytes).unwrap(), ("234".into(), "15".into()));
	}

	#[test]
	fn leading_zero_digits_round_trip() {
		let bytes = plmn_id_to_bytes("001", "001").unwrap();
		assert_eq!(bytes, [0x00, 0x01, 0x10]);
		assert_eq!(plmn_id_to_string(&bytes).unwrap(), ("001".into(), "001".into()));
	}

	#[test]
	fn rejects_malformed_input() {
		assert_eq!(
			plmn_id_to_bytes("20", "93"),
			Err(ConvertError::InvalidMcc("20".into()))
		);
		assert_eq!(
			plmn_id_to_bytes("208", "9"),
			Err(ConvertError::InvalidMnc("9".into()))
		);
	}
}
