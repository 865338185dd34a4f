//! 5G-S-TMSI packing, TS 23.003 §2.10: `AMF-Set-ID(10) || AMF-Pointer(6) ||
//! 5G-TMSI(32)` packed into 48 bits and rendered as a 12 hex-digit string,
//! the form carried in NGAP's `FiveG-S-TMSI` IE and in the registration
//! request's mobile identity when the UE has a valid GUTI.

use bitvec::prelude::*;
use faster_hex::hex_encode;

/// `amf_set_id` must fit in 10 bits, `amf_pointer` in 6 bits.
pub fn build_five_g_s_tmsi(amf_set_id: u16, amf_pointer: u8, five_g_tmsi: u32) -> String {
	let mut bits = bitvec![u8, Msb0; 0; 48];
	bits[0..10].store_be(amf_set_id);
	bits[10..16].store_be(amf_pointer);
	bits[16..48].store_be(five_g_tmsi);

	let bytes = bits.as_raw_slice();
	let mut buf = [0u8; 12];
	hex_encode(bytes, &mut buf).expect("buffer is exactly 2x the input length");
	String::from_utf8(buf.to_vec()).expect("hex_encode only emits ASCII")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn packs_known_bit_pattern() {
		// amf_set_id = 0b01_0110_1010 (0x16A), amf_pointer = 0b10_1010 (0x2A),
		// five_g_tmsi = 0x12345678.
		let s = build_five_g_s_tmsi(0x16A, 0x2A, 0x1234_5678);
		assert_eq!(s, "5aaa12345678");
	}

	#[test]
	fn distinct_tmsi_values_produce_distinct_strings() {
		let a = build_five_g_s_tmsi(1, 1, 0x0000_0001);
		let b = build_five_g_s_tmsi(1, 1, 0x0000_0002);
		assert_ne!(a, b);
	}
}
