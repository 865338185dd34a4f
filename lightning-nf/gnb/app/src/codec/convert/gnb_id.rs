//! Global gNB ID packing, TS 38.413 §9.3.1.6: a bit string of 22 to 32 bits.
//! Configured the same way `tac.rs` configures TAC — an even-length hex
//! string under `GnbIe.gnb_id` — then right-aligned into a `u32` alongside
//! its genuine bit length, since `GnbId::GnbId` wants both.

use faster_hex::hex_decode;

use super::plmn::ConvertError;

pub fn gnb_id_to_u32_and_bits(gnb_id: &str) -> Result<(u32, u8), ConvertError> {
	let byte_len = gnb_id.len() / 2;
	if gnb_id.is_empty() || gnb_id.len() % 2 != 0 || byte_len > 4 || !gnb_id.bytes().all(|b| b.is_ascii_hexdigit()) {
		return Err(ConvertError::InvalidGnbId(gnb_id.to_string()));
	}
	let mut decoded = vec![0u8; byte_len];
	hex_decode(gnb_id.as_bytes(), &mut decoded).map_err(|_| ConvertError::InvalidGnbId(gnb_id.to_string()))?;
	let mut bytes = [0u8; 4];
	bytes[4 - byte_len..].copy_from_slice(&decoded);
	Ok((u32::from_be_bytes(bytes), (byte_len * 8) as u8))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn packs_three_byte_gnb_id() {
		let (value, bits) = gnb_id_to_u32_and_bits("000314").unwrap();
		assert_eq!(value, 0x0000_0314);
		assert_eq!(bits, 24);
	}

	#[test]
	fn rejects_odd_length() {
		assert_eq!(gnb_id_to_u32_and_bits("123"), Err(ConvertError::InvalidGnbId("123".into())));
	}
}
