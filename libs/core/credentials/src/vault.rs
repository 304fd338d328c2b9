// [libs/core/credentials/src/vault.rs]
//! Encrypts session bytes for disk persistence under the operator's
//! master passphrase. Grounded on the source's `VaultCryptoEngine`:
//! PBKDF2-HMAC-SHA256 key derivation feeding AES-256-GCM, kept at the
//! same 150,000-iteration cost factor.

use crate::errors::RegistryError;
use crate::secure_bytes::SecureBytes;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroize;

const PBKDF2_ITERATIONS: u32 = 150_000;
const KEY_LENGTH_BYTES: usize = 32;
const NONCE_LENGTH_BYTES: usize = 12;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEnvelope {
    pub cipher_text_base64: String,
    pub nonce_base64: String,
    pub salt_base64: String,
}

/// Derives a 256-bit key from `master_passphrase` and `salt` via PBKDF2.
fn derive_key(master_passphrase: &str, salt: &[u8]) -> [u8; KEY_LENGTH_BYTES] {
    let mut key = [0u8; KEY_LENGTH_BYTES];
    pbkdf2_hmac::<Sha256>(master_passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    key
}

pub fn seal(session_bytes: &SecureBytes, master_passphrase: &str, salt: &[u8; 16]) -> Result<SessionEnvelope, RegistryError> {
    let mut derived = derive_key(master_passphrase, salt);
    let key = Key::<Aes256Gcm>::from_slice(&derived);
    let cipher = Aes256Gcm::new(key);

    let mut nonce_bytes = [0u8; NONCE_LENGTH_BYTES];
    // The nonce only needs to be unique per (key, message); a random draw
    // is sufficient since each seal re-derives its own salt.
    getrandom(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let cipher_text = cipher.encrypt(nonce, session_bytes.expose()).map_err(|_| RegistryError::VaultFault)?;
    derived.zeroize();

    Ok(SessionEnvelope {
        cipher_text_base64: BASE64.encode(cipher_text),
        nonce_base64: BASE64.encode(nonce_bytes),
        salt_base64: BASE64.encode(salt),
    })
}

pub fn unseal(envelope: &SessionEnvelope, master_passphrase: &str) -> Result<SecureBytes, RegistryError> {
    let salt = BASE64.decode(&envelope.salt_base64).map_err(|_| RegistryError::VaultFault)?;
    let nonce_bytes = BASE64.decode(&envelope.nonce_base64).map_err(|_| RegistryError::VaultFault)?;
    let cipher_text = BASE64.decode(&envelope.cipher_text_base64).map_err(|_| RegistryError::VaultFault)?;

    let mut derived = derive_key(master_passphrase, &salt);
    let key = Key::<Aes256Gcm>::from_slice(&derived);
    let cipher = Aes256Gcm::new(key);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let plain = cipher.decrypt(nonce, cipher_text.as_ref()).map_err(|_| RegistryError::VaultFault)?;
    derived.zeroize();
    Ok(SecureBytes::new(plain))
}

/// Minimal CSPRNG draw without adding a dependency solely for nonces —
/// `aes-gcm`'s own `OsRng` re-export covers this.
fn getrandom(buffer: &mut [u8]) {
    use aes_gcm::aead::rand_core::RngCore;
    aes_gcm::aead::OsRng.fill_bytes(buffer);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seals_and_unseals_round_trip() {
        let original = SecureBytes::new(b"telegram-session-bytes".to_vec());
        let salt = [7u8; 16];
        let envelope = seal(&original, "correct horse battery staple", &salt).unwrap();
        let recovered = unseal(&envelope, "correct horse battery staple").unwrap();
        assert_eq!(original, recovered);
    }

    #[test]
    fn wrong_passphrase_fails_closed() {
        let original = SecureBytes::new(b"telegram-session-bytes".to_vec());
        let salt = [3u8; 16];
        let envelope = seal(&original, "right passphrase", &salt).unwrap();
        assert!(unseal(&envelope, "wrong passphrase").is_err());
    }
}
