pub mod count;
pub mod kdf;
pub mod milenage;
pub mod nas_protection;

pub use count::NasCount;
pub use kdf::{derive_algorithm_key, derive_k_amf, derive_k_ausf, derive_k_seaf, derive_res_star};
pub use milenage::{f1, f2345, f5_star};
pub use nas_protection::{
	CipheringAlgorithm, IntegrityAlgorithm, SecurityError, apply_cipher, compute_mac, verify_mac,
};
