//! Crypto helpers for report framing: chunked RSA PKCS#1 v1.5 and the
//! HMAC-SHA256 body tag carried in the `Hash` header.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::error::{PulseError, Result};

type HmacSha256 = Hmac<Sha256>;

/// PKCS#1 v1.5 padding overhead in bytes.
const PKCS1_OVERHEAD: usize = 11;

/// Parse an RSA public key from PEM (`BEGIN PUBLIC KEY`).
pub fn load_public_key(pem: &str) -> Result<RsaPublicKey> {
    RsaPublicKey::from_public_key_pem(pem)
        .map_err(|e| PulseError::Crypto { reason: format!("bad public key PEM: {e}") })
}

/// Parse an RSA private key from PEM.
///
/// Accepts both `BEGIN RSA PRIVATE KEY` (PKCS#1) and `BEGIN PRIVATE KEY`
/// (PKCS#8) encodings.
pub fn load_private_key(pem: &str) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs1_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
        .map_err(|e| PulseError::Crypto { reason: format!("bad private key PEM: {e}") })
}

/// Encrypt a buffer of arbitrary length as a concatenation of PKCS#1 v1.5
/// blocks. Each plaintext block is `key size − 11` bytes; each ciphertext
/// block is exactly `key size` bytes.
pub fn encrypt_blocks(key: &RsaPublicKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let step = key.size() - PKCS1_OVERHEAD;
    let mut rng = rand::rngs::OsRng;
    let mut encrypted = Vec::with_capacity(plaintext.len() + key.size());

    for chunk in plaintext.chunks(step) {
        let cipher = key
            .encrypt(&mut rng, Pkcs1v15Encrypt, chunk)
            .map_err(|e| PulseError::Crypto { reason: format!("RSA encrypt failed: {e}") })?;
        encrypted.extend_from_slice(&cipher);
    }

    Ok(encrypted)
}

/// Decrypt a concatenation of `key size`-byte PKCS#1 v1.5 blocks.
pub fn decrypt_blocks(key: &RsaPrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let step = key.size();
    let mut decrypted = Vec::with_capacity(ciphertext.len());

    for chunk in ciphertext.chunks(step) {
        let plain = key
            .decrypt(Pkcs1v15Encrypt, chunk)
            .map_err(|e| PulseError::Crypto { reason: format!("RSA decrypt failed: {e}") })?;
        decrypted.extend_from_slice(&plain);
    }

    Ok(decrypted)
}

/// Compute base64(HMAC-SHA256(key, body)) for the `Hash` header.
pub fn body_hash(key: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}

/// Verify a `Hash` header value against a body. Comparison is constant-time.
pub fn verify_body_hash(key: &str, body: &[u8], header: &str) -> Result<()> {
    let expected = BASE64
        .decode(header)
        .map_err(|e| PulseError::MalformedMetric { reason: format!("bad Hash header: {e}") })?;

    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| PulseError::MalformedMetric { reason: "body hash mismatch".to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> RsaPrivateKey {
        let mut rng = rand::thread_rng();
        RsaPrivateKey::new(&mut rng, 1024).unwrap()
    }

    #[test]
    fn multi_block_encrypt_round_trips() {
        let private = test_key();
        let public = RsaPublicKey::from(&private);

        // Longer than one 1024-bit block can hold, so chunking kicks in.
        let plaintext: Vec<u8> = (0..500u16).map(|i| (i % 251) as u8).collect();

        let ciphertext = encrypt_blocks(&public, &plaintext).unwrap();
        assert_eq!(ciphertext.len() % public.size(), 0);
        assert!(ciphertext.len() > plaintext.len());

        let decrypted = decrypt_blocks(&private, &ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn hash_verifies_and_rejects() {
        let tag = body_hash("secret", b"payload");
        assert!(verify_body_hash("secret", b"payload", &tag).is_ok());
        assert!(verify_body_hash("secret", b"tampered", &tag).is_err());
        assert!(verify_body_hash("other", b"payload", &tag).is_err());
        assert!(verify_body_hash("secret", b"payload", "not base64 !!!").is_err());
    }

    #[test]
    fn known_hmac_vector() {
        // RFC 4231-style check against an independently computed tag.
        let tag = body_hash("key", b"The quick brown fox jumps over the lazy dog");
        assert_eq!(tag, "97yD9DBThCSxMpjmqm+xQ+9NWaFJRhdZl0edvC0aPNg=");
    }
}
