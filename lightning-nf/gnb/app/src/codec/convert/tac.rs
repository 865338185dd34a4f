//! Tracking Area Code packing: a 6 hex-digit string (as configured under
//! `GnbConfig.gnb.tai.tac`, mirroring `model/plmn.go`'s `TaiIE{Tac}`) to/from
//! the 3-byte big-endian value NGAP carries on the wire.

use faster_hex::{hex_decode, hex_encode};

use super::plmn::ConvertError;

pub fn tac_to_bytes(tac: &str) -> Result<[u8; 3], ConvertError> {
	if tac.len() != 6 || !tac.bytes().all(|b| b.is_ascii_hexdigit()) {
		return Err(ConvertError::InvalidTac(tac.to_string()));
	}
	let mut out = [0u8; 3];
	hex_decode(tac.as_bytes(), &mut out).map_err(|_| ConvertError::InvalidTac(tac.to_string()))?;
	Ok(out)
}

pub fn bytes_to_tac(bytes: &[u8; 3]) -> String {
	let mut buf = [0u8; 6];
	hex_encode(bytes, &mut buf).expect("buffer is exactly 2x the input length");
	String::from_utf8(buf.to_vec()).expect("hex_encode only emits ASCII")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips() {
		let bytes = tac_to_bytes("123456").unwrap();
		assert_eq!(bytes, [0x12, 0x34, 0x56]);
		assert_eq!(bytes_to_tac(&bytes), "123456");
	}

	#[test]
	fn rejects_wrong_length() {
		assert_eq!(tac_to_bytes("1234"), Err(ConvertError::InvalidTac("1234".into())));
	}
}
