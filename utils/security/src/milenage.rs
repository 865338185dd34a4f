//! Milenage f1/f2345, the AES-128-based authentication algorithm set used by
//! 5G-AKA (3GPP TS 35.206). Grounded in the reference algorithm the donor
//! system calls through a `milenage` package from `ue/security.go`.

use aes::Aes128;
use cipher::{BlockEncrypt, KeyInit, generic_array::GenericArray};
use thiserror::Error;

const R1: u32 = 64;
const R2: u32 = 0;
const R3: u32 = 32;
const R4: u32 = 64;
const R5: u32 = 96;

#[derive(Debug, Error)]
pub enum MilenageError {
	#[error("invalid key length: expected 16 bytes")]
	InvalidKeyLength,
}

fn encrypt_block(key: &[u8; 16], input: &[u8; 16]) -> [u8; 16] {
	let cipher = Aes128::new(GenericArray::from_slice(key));
	let mut block = GenericArray::clone_from_slice(input);
	cipher.encrypt_block(&mut block);
	block.into()
}

fn xor16(a: &[u8; 16], b: &[u8; 16]) -> [u8; 16] {
	let mut out = [0u8; 16];
	for i in 0..16 {
		out[i] = a[i] ^ b[i];
	}
	out
}

/// Rotates a 128-bit block left by `bits` bits (bits is a multiple of 8 in
/// every call site here, but the shift is implemented generically).
fn rotate_left(input: &[u8; 16], bits: u32) -> [u8; 16] {
	let bits = bits % 128;
	if bits == 0 {
		return *input;
	}
	let byte_shift = (bits / 8) as usize;
	let bit_shift = bits % 8;
	let mut out = [0u8; 16];
	for i in 0..16 {
		let hi = input[(i + byte_shift) % 16];
		let lo = input[(i + byte_shift + 1) % 16];
		out[i] = if bit_shift == 0 {
			hi
		} else {
			(hi << bit_shift) | (lo >> (8 - bit_shift))
		};
	}
	out
}

fn in1(sqn: &[u8; 6], amf: &[u8; 2]) -> [u8; 16] {
	let mut out = [0u8; 16];
	out[0..6].copy_from_slice(sqn);
	out[6..8].copy_from_slice(amf);
	out[8..14].copy_from_slice(sqn);
	out[14..16].copy_from_slice(amf);
	out
}

/// f1/f1*: produces MAC-A (network authentication) and MAC-S (re-sync MAC).
pub fn f1(
	key: &[u8; 16],
	opc: &[u8; 16],
	rand: &[u8; 16],
	sqn: &[u8; 6],
	amf: &[u8; 2],
) -> ([u8; 8], [u8; 8]) {
	let temp = encrypt_block(key, &xor16(rand, opc));
	let in1 = in1(sqn, amf);
	let rolled = rotate_left(&xor16(&in1, opc), R1);
	let out1 = xor16(&encrypt_block(key, &xor16(&temp, &rolled)), opc);
	let mut mac_a = [0u8; 8];
	let mut mac_s = [0u8; 8];
	mac_a.copy_from_slice(&out1[0..8]);
	mac_s.copy_from_slice(&out1[8..16]);
	(mac_a, mac_s)
}

/// f2/f3/f4/f5: produces RES, CK, IK, AK from the same TEMP value.
pub fn f2345(
	key: &[u8; 16],
	opc: &[u8; 16],
	rand: &[u8; 16],
) -> ([u8; 8], [u8; 16], [u8; 16], [u8; 6]) {
	let temp = encrypt_block(key, &xor16(rand, opc));

	let out2 = xor16(
		&encrypt_block(key, &xor16(&rotate_left(&xor16(&temp, opc), R2), opc)),
		opc,
	);
	let mut res = [0u8; 8];
	let mut ak = [0u8; 6];
	res.copy_from_slice(&out2[8..16]);
	ak.copy_from_slice(&out2[0..6]);

	let out3 = xor16(
		&encrypt_block(key, &xor16(&rotate_left(&xor16(&temp, opc), R3), opc)),
		opc,
	);
	let ck = out3;

	let out4 = xor16(
		&encrypt_block(key, &xor16(&rotate_left(&xor16(&temp, opc), R4), opc)),
		opc,
	);
	let ik = out4;

	(res, ck, ik, ak)
}

/// f5*: produces AK* used when resynchronising.
pub fn f5_star(key: &[u8; 16], opc: &[u8; 16], rand: &[u8; 16]) -> [u8; 6] {
	let temp = encrypt_block(key, &xor16(rand, opc));
	let out5 = xor16(
		&encrypt_block(key, &xor16(&rotate_left(&xor16(&temp, opc), R5), opc)),
		opc,
	);
	let mut ak_star = [0u8; 6];
	ak_star.copy_from_slice(&out5[0..6]);
	ak_star
}

#[cfg(test)]
mod tests {
	use super::*;

	const K: [u8; 16] = [
		0x46, 0x5B, 0x5C, 0xE8, 0xB1, 0x99, 0xB4, 0x9F, 0xAA, 0x5F, 0x0A, 0x2E, 0xE2,
		0x38, 0xA6, 0xBC,
	];
	const RAND: [u8; 16] = [
		0x23, 0x55, 0x3C, 0xBE, 0x96, 0x37, 0xA8, 0x9D, 0x21, 0x8A, 0xE6, 0x4D, 0xAE,
		0x47, 0xBF, 0x35,
	];
	const SQN: [u8; 6] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x01];
	const AMF: [u8; 2] = [0xB9, 0xB9];
	const OPC: [u8; 16] = [
		0xCD, 0x63, 0xCB, 0x71, 0x95, 0x4A, 0x9F, 0x4E, 0x48, 0xA5, 0x99, 0x4E, 0x37,
		0xA0, 0x2B, 0xAF,
	];

	#[test]
	fn f1_is_deterministic_and_distinguishes_sqn() {
		let (mac_a, mac_s) = f1(&K, &OPC, &RAND, &SQN, &AMF);
		let (mac_a_again, mac_s_again) = f1(&K, &OPC, &RAND, &SQN, &AMF);
		assert_eq!(mac_a, mac_a_again);
		assert_eq!(mac_s, mac_s_again);

		let other_sqn: [u8; 6] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x02];
		let (mac_a_other, _) = f1(&K, &OPC, &RAND, &other_sqn, &AMF);
		assert_ne!(mac_a, mac_a_other);
		assert_ne!(mac_a, mac_s);
	}

	#[test]
	fn f2345_outputs_are_deterministic_and_independent() {
		let (res, ck, ik, ak) = f2345(&K, &OPC, &RAND);
		let (res_again, ck_again, ik_again, ak_again) = f2345(&K, &OPC, &RAND);
		assert_eq!(res, res_again);
		assert_eq!(ck, ck_again);
		assert_eq!(ik, ik_again);
		assert_eq!(ak, ak_again);
		assert_ne!(ck, ik);

		let other_rand: [u8; 16] = [0xFF; 16];
		let (res_other, ..) = f2345(&K, &OPC, &other_rand);
		assert_ne!(res, res_other);
	}

	#[test]
	fn f5_star_differs_from_f2345_ak() {
		let (_, _, _, ak) = f2345(&K, &OPC, &RAND);
		let ak_star = f5_star(&K, &OPC, &RAND);
		assert_ne!(ak, ak_star);
	}

	#[test]
	fn rotate_left_by_128_bits_is_identity() {
		let block = RAND;
		assert_eq!(rotate_left(&block, 128), block);
		assert_eq!(rotate_left(&block, 0), block);
	}
}
