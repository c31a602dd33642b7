//! AES-GCM sealing for sensitive cache entries
//!
//! The configured passphrase is expanded to a 32-byte key with SHA-256.
//! Sealed bytes are `nonce || ciphertext` with a fresh random nonce per
//! write.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use sha2::{Digest, Sha256};

use crate::error::{EnvyError, EnvyResult, ErrorKind};

/// Nonce length prepended to sealed bytes
pub const NONCE_LEN: usize = 12;

/// Seals and opens cache entry bytes
pub struct Sealer {
	cipher: Aes256Gcm,
}

impl Sealer {
	/// Derive the AEAD key from a passphrase
	pub fn new(passphrase: &str) -> Self {
		let digest = Sha256::digest(passphrase.as_bytes());
		let key = Key::<Aes256Gcm>::from_slice(&digest);
		Sealer { cipher: Aes256Gcm::new(key) }
	}

	/// Encrypt plaintext into `nonce || ciphertext`
	pub fn seal(&self, plaintext: &[u8]) -> EnvyResult<Vec<u8>> {
		let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
		let ciphertext = self.cipher.encrypt(&nonce, plaintext).map_err(|_| {
			EnvyError::new(ErrorKind::Internal, "Failed to encrypt cache entry")
		})?;
		let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
		out.extend_from_slice(&nonce);
		out.extend_from_slice(&ciphertext);
		Ok(out)
	}

	/// Decrypt `nonce || ciphertext`
	pub fn open(&self, sealed: &[u8]) -> EnvyResult<Vec<u8>> {
		if sealed.len() < NONCE_LEN {
			return Err(EnvyError::new(
				ErrorKind::Internal,
				"Sealed cache entry is too short",
			));
		}
		let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
		self.cipher
			.decrypt(Nonce::from_slice(nonce), ciphertext)
			.map_err(|_| EnvyError::new(ErrorKind::Internal, "Failed to decrypt cache entry"))
	}
}

impl std::fmt::Debug for Sealer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		// The cipher holds key material; never include it in debug output
		f.debug_struct("Sealer").finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_seal_open_roundtrip() {
		let sealer = Sealer::new("hunter2");
		let sealed = sealer.seal(b"top secret payload").unwrap();
		assert_ne!(&sealed[NONCE_LEN..], b"top secret payload".as_slice());
		assert_eq!(sealer.open(&sealed).unwrap(), b"top secret payload");
	}

	#[test]
	fn test_nonces_differ_per_seal() {
		let sealer = Sealer::new("hunter2");
		let a = sealer.seal(b"same").unwrap();
		let b = sealer.seal(b"same").unwrap();
		assert_ne!(a, b);
	}

	#[test]
	fn test_wrong_passphrase_fails() {
		let sealed = Sealer::new("right").seal(b"data").unwrap();
		assert!(Sealer::new("wrong").open(&sealed).is_err());
	}

	#[test]
	fn test_truncated_input_rejected() {
		let sealer = Sealer::new("k");
		assert!(sealer.open(&[0u8; 4]).is_err());
	}
}

// vim: ts=4
