//! NAS ciphering (NEA) and integrity (NIA) protection, TS 33.501 / TS 24.501.
//!
//! Only the null algorithms (NEA0/NIA0) and the AES-128 based algorithms
//! (128-NEA2/128-NIA2) are implemented; NEA1/NIA1 (SNOW 3G) and NEA3/NIA3
//! (ZUC) are recognised as valid configuration values but return
//! [`SecurityError::UnsupportedAlgorithm`] when actually used, matching the
//! "unsupported algorithm" failure kind called out for NAS protection.

use aes::Aes128;
use cipher::{KeyIvInit, StreamCipher};
use cmac::{Cmac, Mac};
use subtle::ConstantTimeEq;
use thiserror::Error;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;
type Aes128Cmac = Cmac<Aes128>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecurityError {
	#[error("unsupported NAS algorithm id {0}")]
	UnsupportedAlgorithm(u8),
	#[error("NAS MAC verification failed")]
	MacMismatch,
	#[error("NAS sequence number regression detected")]
	SequenceNumberRegression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipheringAlgorithm {
	Nea0,
	Nea1,
	Nea2,
	Nea3,
}

impl CipheringAlgorithm {
	pub fn id(self) -> u8 {
		match self {
			CipheringAlgorithm::Nea0 => 0,
			CipheringAlgorithm::Nea1 => 1,
			CipheringAlgorithm::Nea2 => 2,
			CipheringAlgorithm::Nea3 => 3,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityAlgorithm {
	Nia0,
	Nia1,
	Nia2,
	Nia3,
}

impl IntegrityAlgorithm {
	pub fn id(self) -> u8 {
		match self {
			IntegrityAlgorithm::Nia0 => 0,
			IntegrityAlgorithm::Nia1 => 1,
			IntegrityAlgorithm::Nia2 => 2,
			IntegrityAlgorithm::Nia3 => 3,
		}
	}
}

/// Builds the 128-bit initial counter block shared by 128-NEA2 and the CMAC
/// input prefix for 128-NIA2: `COUNT(32) || BEARER(5) || DIRECTION(1) || 0^26`.
fn counter_block(count: u32, bearer: u8, direction: u8) -> [u8; 16] {
	let mut block = [0u8; 16];
	block[0..4].copy_from_slice(&count.to_be_bytes());
	block[4] = (bearer << 3) | (direction << 2);
	block
}

/// Encrypts (or decrypts — the stream cipher is symmetric) `data` in place
/// with the configured NEA algorithm.
pub fn apply_cipher(
	alg: CipheringAlgorithm,
	key: &[u8; 16],
	count: u32,
	bearer: u8,
	direction: u8,
	data: &mut [u8],
) -> Result<(), SecurityError> {
	match alg {
		CipheringAlgorithm::Nea0 => Ok(()),
		CipheringAlgorithm::Nea2 => {
			let iv = counter_block(count, bearer, direction);
			let mut cipher = Aes128Ctr::new(key.into(), (&iv).into());
			cipher.apply_keystream(data);
			Ok(())
		}
		CipheringAlgorithm::Nea1 | CipheringAlgorithm::Nea3 => {
			Err(SecurityError::UnsupportedAlgorithm(alg.id()))
		}
	}
}

/// Computes the 4-byte NAS-MAC for `data` under the configured NIA algorithm.
pub fn compute_mac(
	alg: IntegrityAlgorithm,
	key: &[u8; 16],
	count: u32,
	bearer: u8,
	direction: u8,
	data: &[u8],
) -> Result<[u8; 4], SecurityError> {
	match alg {
		IntegrityAlgorithm::Nia0 => Ok([0u8; 4]),
		IntegrityAlgorithm::Nia2 => {
			let mut mac = Aes128Cmac::new(key.into());
			mac.update(&counter_block(count, bearer, direction));
			mac.update(data);
			let full = mac.finalize().into_bytes();
			let mut out = [0u8; 4];
			out.copy_from_slice(&full[0..4]);
			Ok(out)
		}
		IntegrityAlgorithm::Nia1 | IntegrityAlgorithm::Nia3 => {
			Err(SecurityError::UnsupportedAlgorithm(alg.id()))
		}
	}
}

/// Verifies a received NAS-MAC in constant time.
pub fn verify_mac(
	alg: IntegrityAlgorithm,
	key: &[u8; 16],
	count: u32,
	bearer: u8,
	direction: u8,
	data: &[u8],
	received_mac: &[u8; 4],
) -> Result<(), SecurityError> {
	let expected = compute_mac(alg, key, count, bearer, direction, data)?;
	if expected.ct_eq(received_mac).into() {
		Ok(())
	} else {
		Err(SecurityError::MacMismatch)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const KEY: [u8; 16] = [0x42u8; 16];

	#[test]
	fn nea0_is_identity() {
		let mut data = b"hello nas".to_vec();
		let original = data.clone();
		apply_cipher(CipheringAlgorithm::Nea0, &KEY, 1, 1, 0, &mut data).unwrap();
		assert_eq!(data, original);
	}

	#[test]
	fn nea2_round_trips() {
		let mut data = b"registration request payload".to_vec();
		let original = data.clone();
		apply_cipher(CipheringAlgorithm::Nea2, &KEY, 7, 1, 0, &mut data).unwrap();
		assert_ne!(data, original);
		apply_cipher(CipheringAlgorithm::Nea2, &KEY, 7, 1, 0, &mut data).unwrap();
		assert_eq!(data, original);
	}

	#[test]
	fn nia2_mac_detects_tamper() {
		let data = b"security mode complete";
		let mac = compute_mac(IntegrityAlgorithm::Nia2, &KEY, 3, 1, 1, data).unwrap();
		assert!(verify_mac(IntegrityAlgorithm::Nia2, &KEY, 3, 1, 1, data, &mac).is_ok());

		let tampered = b"security mode complet3";
		assert_eq!(
			verify_mac(IntegrityAlgorithm::Nia2, &KEY, 3, 1, 1, tampered, &mac),
			Err(SecurityError::MacMismatch)
		);
	}

	#[test]
	fn nia1_and_nea3_are_unsupported() {
		let mut data = vec![0u8; 4];
		assert_eq!(
			apply_cipher(CipheringAlgorithm::Nea3, &KEY, 0, 0, 0, &mut data),
			Err(SecurityError::UnsupportedAlgorithm(3))
		);
		assert_eq!(
			compute_mac(IntegrityAlgorithm::Nia1, &KEY, 0, 0, 0, &data),
			Err(SecurityError::UnsupportedAlgorithm(1))
		);
	}
}
