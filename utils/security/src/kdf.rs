//! The generic 3GPP key derivation function, Annex A of TS 33.220:
//! `HMAC-SHA-256(Key, S)` where `S = FC || P0 || L0 || P1 || L1 || ...`,
//! and the NAS-specific FC codes from TS 33.501 Annex A.

use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const FC_FOR_KAUSF_DERIVATION: u8 = 0x6A;
pub const FC_FOR_KSEAF_DERIVATION: u8 = 0x6C;
pub const FC_FOR_KAMF_DERIVATION: u8 = 0x6D;
pub const FC_FOR_ALGORITHM_KEY_DERIVATION: u8 = 0x69;
pub const FC_FOR_RES_STAR_XRES_STAR_DERIVATION: u8 = 0x6B;

pub const N_NAS_ENC_ALG: u8 = 0x01;
pub const N_NAS_INT_ALG: u8 = 0x02;

type HmacSha256 = Hmac<Sha256>;

/// Runs the generic KDF over an arbitrary list of parameters, returning the
/// full 256-bit HMAC-SHA-256 output.
pub fn kdf(key: &[u8], fc: u8, params: &[&[u8]]) -> [u8; 32] {
	let mut s = Vec::with_capacity(1 + params.iter().map(|p| p.len() + 2).sum::<usize>());
	s.push(fc);
	for p in params {
		s.extend_from_slice(p);
		s.extend_from_slice(&(p.len() as u16).to_be_bytes());
	}
	let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
	mac.update(&s);
	let result = mac.finalize().into_bytes();
	let mut out = [0u8; 32];
	out.copy_from_slice(&result);
	out
}

/// `K_AUSF = KDF(CK||IK, FC_KAUSF, SN_NAME, SQN xor AK)`.
pub fn derive_k_ausf(ck: &[u8; 16], ik: &[u8; 16], sn_name: &[u8], sqn_xor_ak: &[u8; 6]) -> [u8; 32] {
	let mut key = Vec::with_capacity(32);
	key.extend_from_slice(ck);
	key.extend_from_slice(ik);
	kdf(&key, FC_FOR_KAUSF_DERIVATION, &[sn_name, sqn_xor_ak])
}

/// `K_SEAF = KDF(K_AUSF, FC_KSEAF, SN_NAME)`.
pub fn derive_k_seaf(k_ausf: &[u8; 32], sn_name: &[u8]) -> [u8; 32] {
	kdf(k_ausf, FC_FOR_KSEAF_DERIVATION, &[sn_name])
}

/// `K_AMF = KDF(K_SEAF, FC_KAMF, SUPI-digits, ABBA)`.
pub fn derive_k_amf(k_seaf: &[u8; 32], supi_digits: &str, abba: &[u8]) -> [u8; 32] {
	kdf(k_seaf, FC_FOR_KAMF_DERIVATION, &[supi_digits.as_bytes(), abba])
}

/// `K_NASenc / K_NASint = KDF(K_AMF, FC_ALG, alg_distinguisher, alg_id)`,
/// returning the lower 128 bits as the derived material.
pub fn derive_algorithm_key(k_amf: &[u8; 32], alg_distinguisher: u8, alg_id: u8) -> [u8; 16] {
	let out = kdf(
		k_amf,
		FC_FOR_ALGORITHM_KEY_DERIVATION,
		&[&[alg_distinguisher], &[alg_id]],
	);
	let mut key = [0u8; 16];
	key.copy_from_slice(&out[16..32]);
	key
}

/// `RES* = KDF(CK||IK, FC_RES_STAR, SN_NAME, RAND, RES)`, lower half taken.
pub fn derive_res_star(
	ck: &[u8; 16],
	ik: &[u8; 16],
	sn_name: &[u8],
	rand: &[u8; 16],
	res: &[u8],
) -> [u8; 16] {
	let mut key = Vec::with_capacity(32);
	key.extend_from_slice(ck);
	key.extend_from_slice(ik);
	let out = kdf(&key, FC_FOR_RES_STAR_XRES_STAR_DERIVATION, &[sn_name, rand, res]);
	let mut res_star = [0u8; 16];
	res_star.copy_from_slice(&out[16..32]);
	res_star
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn kdf_is_deterministic_and_sensitive_to_params() {
		let key = [0x11u8; 16];
		let a = kdf(&key, FC_FOR_KAUSF_DERIVATION, &[b"5G:mnc093.mcc208.3gppnetwork.org", &[0u8; 6]]);
		let b = kdf(&key, FC_FOR_KAUSF_DERIVATION, &[b"5G:mnc093.mcc208.3gppnetwork.org", &[0u8; 6]]);
		assert_eq!(a, b);

		let c = kdf(&key, FC_FOR_KAUSF_DERIVATION, &[b"5G:mnc093.mcc208.3gppnetwork.org", &[1u8; 6]]);
		assert_ne!(a, c);
	}

	#[test]
	fn algorithm_key_derivation_differs_for_enc_and_int() {
		let k_amf = [0x22u8; 32];
		let kenc = derive_algorithm_key(&k_amf, N_NAS_ENC_ALG, 2);
		let kint = derive_algorithm_key(&k_amf, N_NAS_INT_ALG, 2);
		assert_ne!(kenc, kint);
	}

	#[test]
	fn key_hierarchy_chains_without_panicking() {
		let ck = [0x01u8; 16];
		let ik = [0x02u8; 16];
		let sn_name = b"5G:mnc093.mcc208.3gppnetwork.org";
		let sqn_xor_ak = [0u8; 6];
		let k_ausf = derive_k_ausf(&ck, &ik, sn_name, &sqn_xor_ak);
		let k_seaf = derive_k_seaf(&k_ausf, sn_name);
		let k_amf = derive_k_amf(&k_seaf, "208930000007487", &[0x00, 0x00]);
		assert_ne!(k_amf, [0u8; 32]);
	}
}
