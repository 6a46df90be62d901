use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};

/// AES-256-GCM encryption for identity document images at rest.
///
/// Identity documents are the most sensitive bytes this system touches;
/// nothing is written to the object store unencrypted.
pub struct EncryptionService {
    cipher: Aes256Gcm,
}

impl EncryptionService {
    /// Create from a base64-encoded 32-byte key.
    pub fn new(key_base64: &str) -> Result<Self, EncryptionError> {
        use base64::Engine;
        let key_bytes = base64::engine::general_purpose::STANDARD
            .decode(key_base64)
            .map_err(|_| EncryptionError::InvalidKey)?;

        if key_bytes.len() != 32 {
            return Err(EncryptionError::InvalidKey);
        }

        let cipher =
            Aes256Gcm::new_from_slice(&key_bytes).map_err(|_| EncryptionError::InvalidKey)?;

        Ok(Self { cipher })
    }

    /// Encrypt image bytes, returning the 12-byte nonce prepended to the
    /// ciphertext.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| EncryptionError::EncryptFailed)?;

        let mut output = nonce.to_vec();
        output.extend(ciphertext);
        Ok(output)
    }

    /// Decrypt bytes whose first 12 bytes are the nonce.
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        if data.len() < 12 {
            return Err(EncryptionError::DecryptFailed);
        }

        let (nonce_bytes, ciphertext) = data.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| EncryptionError::DecryptFailed)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    #[error("encryption key must be 32 base64-encoded bytes")]
    InvalidKey,

    #[error("encryption failed")]
    EncryptFailed,

    #[error("decryption failed")]
    DecryptFailed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    fn service() -> EncryptionService {
        let key = base64::engine::general_purpose::STANDARD.encode([7u8; 32]);
        EncryptionService::new(&key).unwrap()
    }

    #[test]
    fn roundtrip() {
        let svc = service();
        let plaintext = b"passport scan bytes";
        let sealed = svc.encrypt(plaintext).unwrap();
        assert_ne!(sealed, plaintext.to_vec());
        assert_eq!(svc.decrypt(&sealed).unwrap(), plaintext.to_vec());
    }

    #[test]
    fn short_key_rejected() {
        let key = base64::engine::general_purpose::STANDARD.encode([7u8; 16]);
        assert!(matches!(
            EncryptionService::new(&key),
            Err(EncryptionError::InvalidKey)
        ));
    }

    #[test]
    fn truncated_ciphertext_rejected() {
        let svc = service();
        assert!(matches!(
            svc.decrypt(&[1, 2, 3]),
            Err(EncryptionError::DecryptFailed)
        ));
    }
}
