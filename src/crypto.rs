//! Secret encryption using AES-256-GCM
//!
//! Provider API keys and webhook signing secrets are stored encrypted, with the
//! owning tenant and the field name bound in as additional authenticated data so a
//! ciphertext cannot be replayed into another tenant's row or another column.

#![allow(deprecated)]

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
};
use thiserror::Error;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

const VERSION_ENCRYPTED: u8 = 0x01;
const VERSION_FIELD_LEN: usize = 1;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const MIN_ENCRYPTED_LEN: usize = VERSION_FIELD_LEN + NONCE_LEN + TAG_LEN;

/// Crypto error types
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("invalid ciphertext format")]
    InvalidFormat,
    #[error("empty ciphertext")]
    EmptyCiphertext,
}

/// Secure wrapper for encryption keys with zeroization
#[derive(Debug, Clone, Zeroize, ZeroizeOnDrop)]
pub struct ZeroizingKey(Vec<u8>);

/// Type alias for crypto keys
pub type CryptoKey = ZeroizingKey;

impl CryptoKey {
    /// Create a new crypto key from bytes
    pub fn new(bytes: Vec<u8>) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::EncryptionFailed(
                "Invalid key length: expected 32 bytes".to_string(),
            ));
        }
        Ok(ZeroizingKey(bytes))
    }

    /// Get the key as bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Which integration secret a ciphertext belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretField {
    ApiKey,
    WebhookSecret,
}

impl SecretField {
    fn as_str(self) -> &'static str {
        match self {
            SecretField::ApiKey => "api_key",
            SecretField::WebhookSecret => "webhook_secret",
        }
    }

    fn aad(self, tenant_id: Uuid) -> String {
        format!("{}|integration_settings|{}", tenant_id, self.as_str())
    }
}

/// Encrypt bytes using AES-256-GCM
pub fn encrypt_bytes(
    key: &CryptoKey,
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher_key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
    let cipher = Aes256Gcm::new(cipher_key);

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let mut ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    // version || nonce || ciphertext+tag
    let mut result = Vec::with_capacity(VERSION_FIELD_LEN + NONCE_LEN + ciphertext.len());
    result.push(VERSION_ENCRYPTED);
    result.extend_from_slice(&nonce);
    result.append(&mut ciphertext);

    Ok(result)
}

/// Decrypt bytes using AES-256-GCM
pub fn decrypt_bytes(
    key: &CryptoKey,
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.is_empty() {
        return Err(CryptoError::EmptyCiphertext);
    }

    if !is_encrypted_payload(ciphertext) {
        return Err(CryptoError::InvalidFormat);
    }

    let nonce = Nonce::from_slice(&ciphertext[VERSION_FIELD_LEN..VERSION_FIELD_LEN + NONCE_LEN]);
    let tag_and_ct = &ciphertext[VERSION_FIELD_LEN + NONCE_LEN..];

    debug_assert!(tag_and_ct.len() >= TAG_LEN);

    let cipher_key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
    let cipher = Aes256Gcm::new(cipher_key);

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: tag_and_ct,
                aad,
            },
        )
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}

/// Determine if a payload is using the encrypted format
pub fn is_encrypted_payload(ciphertext: &[u8]) -> bool {
    ciphertext.len() >= MIN_ENCRYPTED_LEN && ciphertext[0] == VERSION_ENCRYPTED
}

/// Encrypt a tenant secret for storage in `integration_settings`.
pub fn encrypt_secret(
    key: &CryptoKey,
    tenant_id: Uuid,
    field: SecretField,
    secret: &str,
) -> Result<Vec<u8>, CryptoError> {
    encrypt_bytes(key, field.aad(tenant_id).as_bytes(), secret.as_bytes())
}

/// Decrypt a tenant secret previously written by [`encrypt_secret`].
pub fn decrypt_secret(
    key: &CryptoKey,
    tenant_id: Uuid,
    field: SecretField,
    ciphertext: &[u8],
) -> Result<Zeroizing<String>, CryptoError> {
    let bytes = Zeroizing::new(decrypt_bytes(
        key,
        field.aad(tenant_id).as_bytes(),
        ciphertext,
    )?);
    String::from_utf8(bytes.to_vec())
        .map(Zeroizing::new)
        .map_err(|e| CryptoError::DecryptionFailed(format!("Invalid UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> CryptoKey {
        CryptoKey::new(vec![7u8; 32]).expect("valid test key")
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = test_key();
        let encrypted = encrypt_bytes(&key, b"aad", b"secret message").expect("encrypts");
        let decrypted = decrypt_bytes(&key, b"aad", &encrypted).expect("decrypts");

        assert_eq!(decrypted, b"secret message");
    }

    #[test]
    fn test_modified_ciphertext_fails() {
        let key = test_key();
        let mut encrypted = encrypt_bytes(&key, b"aad", b"secret message").expect("encrypts");
        encrypted[13] ^= 0x01;

        assert!(decrypt_bytes(&key, b"aad", &encrypted).is_err());
    }

    #[test]
    fn test_nonce_uniqueness() {
        let key = test_key();
        let first = encrypt_bytes(&key, b"aad", b"same").expect("encrypts");
        let second = encrypt_bytes(&key, b"aad", b"same").expect("encrypts");

        assert_ne!(&first[1..13], &second[1..13]);
    }

    #[test]
    fn test_unversioned_payload_rejected() {
        let key = test_key();
        let result = decrypt_bytes(&key, b"aad", b"plaintext-api-key-without-marker");
        assert!(matches!(result, Err(CryptoError::InvalidFormat)));

        let short = vec![VERSION_ENCRYPTED, 0x02];
        assert!(matches!(
            decrypt_bytes(&key, b"aad", &short),
            Err(CryptoError::InvalidFormat)
        ));
    }

    #[test]
    fn test_invalid_key_length_rejected() {
        assert!(CryptoKey::new(vec![0u8; 16]).is_err());
        assert!(CryptoKey::new(vec![0u8; 64]).is_err());
    }

    #[test]
    fn secret_roundtrip_is_bound_to_tenant_and_field() {
        let key = test_key();
        let tenant = Uuid::new_v4();

        let ciphertext =
            encrypt_secret(&key, tenant, SecretField::ApiKey, "ff-api-key").expect("encrypts");
        assert!(is_encrypted_payload(&ciphertext));

        let plain =
            decrypt_secret(&key, tenant, SecretField::ApiKey, &ciphertext).expect("decrypts");
        assert_eq!(plain.as_str(), "ff-api-key");

        assert!(decrypt_secret(&key, Uuid::new_v4(), SecretField::ApiKey, &ciphertext).is_err());
        assert!(decrypt_secret(&key, tenant, SecretField::WebhookSecret, &ciphertext).is_err());
    }
}
