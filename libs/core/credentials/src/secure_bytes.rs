// [libs/core/credentials/src/secure_bytes.rs]
//! `SecureBytes`: the in-process wrapper around raw session bytes. It
//! supports constant-time equality against a candidate, its textual
//! form is redacted, and its destruction overwrites the underlying
//! buffer before release.
//!
//! Grounded on the source's `VaultCryptoEngine`: raw bytes recovered
//! from an AES-256-GCM payload under a PBKDF2-derived key, except here
//! the bytes never leave process memory unencrypted for longer than the
//! call that needs them.

use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureBytes(Vec<u8>);

impl SecureBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        SecureBytes(bytes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl PartialEq for SecureBytes {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for SecureBytes {}

impl fmt::Debug for SecureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureBytes({} bytes, redacted)", self.0.len())
    }
}

impl fmt::Display for SecureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<redacted {} bytes>", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_buffers_compare_equal_in_constant_time() {
        let a = SecureBytes::new(vec![1, 2, 3, 4]);
        let b = SecureBytes::new(vec![1, 2, 3, 4]);
        assert_eq!(a, b);
    }

    #[test]
    fn unequal_buffers_of_same_length_differ() {
        let a = SecureBytes::new(vec![1, 2, 3, 4]);
        let b = SecureBytes::new(vec![1, 2, 3, 5]);
        assert_ne!(a, b);
    }

    #[test]
    fn debug_and_display_never_leak_contents() {
        let secret = SecureBytes::new(b"super-secret-session".to_vec());
        assert!(!format!("{secret:?}").contains("super-secret-session"));
        assert!(!format!("{secret}").contains("super-secret-session"));
    }
}
