use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::encryption::EncryptionProvider;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Associated data bound into every tag; a ciphertext produced for some other
/// purpose with the same key will not open as a registry secret.
const SECRET_AAD: &[u8] = b"registry-credential-secret";

/// Stored form of an encrypted registry secret: `base64(nonce || ciphertext || tag)`
struct SealedSecret {
    nonce: [u8; NONCE_LEN],
    /// Ciphertext with the GCM tag appended
    body: Vec<u8>,
}

impl SealedSecret {
    fn encode(&self) -> String {
        let mut combined = Vec::with_capacity(NONCE_LEN + self.body.len());
        combined.extend_from_slice(&self.nonce);
        combined.extend_from_slice(&self.body);
        BASE64.encode(combined)
    }

    fn decode(stored: &str) -> Result<Self> {
        let combined = BASE64
            .decode(stored)
            .context("Stored secret is not valid base64")?;

        if combined.len() < NONCE_LEN + TAG_LEN {
            bail!(
                "Stored secret is too short to be encrypted ({} bytes)",
                combined.len()
            );
        }

        let (nonce, body) = combined.split_at(NONCE_LEN);
        let mut nonce_bytes = [0u8; NONCE_LEN];
        nonce_bytes.copy_from_slice(nonce);

        Ok(Self {
            nonce: nonce_bytes,
            body: body.to_vec(),
        })
    }
}

fn decode_key(key_base64: &str) -> Result<[u8; KEY_LEN]> {
    let key_bytes = BASE64
        .decode(key_base64.trim())
        .context("Encryption key is not valid base64")?;

    key_bytes.as_slice().try_into().map_err(|_| {
        anyhow!(
            "Encryption key must be {} bytes for AES-256-GCM, got {} bytes",
            KEY_LEN,
            key_bytes.len()
        )
    })
}

/// AES-256-GCM cipher for registry secrets, keyed from the `[encryption]`
/// settings section.
///
/// Every call to `encrypt` draws a fresh nonce, so the same password never
/// produces the same stored string twice.
pub struct LocalEncryptionProvider {
    cipher: Aes256Gcm,
}

impl LocalEncryptionProvider {
    /// Create a provider from a base64-encoded 32-byte key
    pub fn new(key_base64: &str) -> Result<Self> {
        let key = decode_key(key_base64)?;
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| anyhow!("Failed to create AES-256-GCM cipher: {e}"))?;
        Ok(Self { cipher })
    }

    fn seal(&self, plaintext: &[u8]) -> Result<SealedSecret> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let body = self
            .cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext,
                    aad: SECRET_AAD,
                },
            )
            .map_err(|e| anyhow!("Encryption failed: {e}"))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        nonce_bytes.copy_from_slice(nonce.as_slice());
        Ok(SealedSecret {
            nonce: nonce_bytes,
            body,
        })
    }

    fn open(&self, sealed: &SealedSecret) -> Result<Vec<u8>> {
        self.cipher
            .decrypt(
                Nonce::from_slice(&sealed.nonce),
                Payload {
                    msg: &sealed.body,
                    aad: SECRET_AAD,
                },
            )
            .map_err(|_| anyhow!("Decryption failed: wrong key or tampered secret"))
    }
}

#[async_trait]
impl EncryptionProvider for LocalEncryptionProvider {
    async fn encrypt(&self, plaintext: &str) -> Result<String> {
        Ok(self.seal(plaintext.as_bytes())?.encode())
    }

    async fn decrypt(&self, ciphertext: &str) -> Result<String> {
        let sealed = SealedSecret::decode(ciphertext)?;
        let plaintext = self.open(&sealed)?;
        String::from_utf8(plaintext).context("Decrypted secret is not valid UTF-8")
    }

    fn provider_name(&self) -> &str {
        "local-aes-256-gcm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    fn random_key() -> String {
        let mut key = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        BASE64.encode(key)
    }

    fn random_provider() -> LocalEncryptionProvider {
        LocalEncryptionProvider::new(&random_key()).unwrap()
    }

    #[tokio::test]
    async fn test_encrypt_decrypt_roundtrip() {
        let provider = random_provider();

        for plaintext in ["pw", "", "päss wörd with spaces", "dckr_pat_0123456789abcdefghij"] {
            let ciphertext = provider.encrypt(plaintext).await.unwrap();
            assert_ne!(ciphertext, plaintext);
            assert_eq!(provider.decrypt(&ciphertext).await.unwrap(), plaintext);
        }
    }

    #[tokio::test]
    async fn test_different_nonces() {
        let provider = random_provider();

        let ciphertext1 = provider.encrypt("same message").await.unwrap();
        let ciphertext2 = provider.encrypt("same message").await.unwrap();

        assert_ne!(ciphertext1, ciphertext2);
        assert_eq!(provider.decrypt(&ciphertext1).await.unwrap(), "same message");
        assert_eq!(provider.decrypt(&ciphertext2).await.unwrap(), "same message");
    }

    #[tokio::test]
    async fn test_decrypt_with_wrong_key_fails() {
        let ciphertext = random_provider().encrypt("secret").await.unwrap();
        assert!(random_provider().decrypt(&ciphertext).await.is_err());
    }

    #[tokio::test]
    async fn test_decrypt_rejects_short_and_plaintext_input() {
        let provider = random_provider();
        assert!(provider.decrypt(&BASE64.encode(b"short")).await.is_err());
        assert!(provider.decrypt("pw").await.is_err());
    }

    #[tokio::test]
    async fn test_secret_without_registry_aad_is_rejected() {
        let key = random_key();
        let provider = LocalEncryptionProvider::new(&key).unwrap();

        // Same key, but sealed without the registry associated data
        let raw = Aes256Gcm::new_from_slice(&decode_key(&key).unwrap()).unwrap();
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let body = raw.encrypt(&nonce, b"pw".as_slice()).unwrap();
        let mut combined = nonce.to_vec();
        combined.extend_from_slice(&body);

        let err = provider.decrypt(&BASE64.encode(combined)).await.unwrap_err();
        assert!(err.to_string().contains("Decryption failed"));
    }

    #[tokio::test]
    async fn test_tampered_secret_is_rejected() {
        let provider = random_provider();
        let stored = provider.encrypt("pw").await.unwrap();

        let mut bytes = BASE64.decode(&stored).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        assert!(provider.decrypt(&BASE64.encode(bytes)).await.is_err());
    }

    #[test]
    fn test_new_accepts_key_with_surrounding_whitespace() {
        let key = format!("{}\n", random_key());
        assert!(LocalEncryptionProvider::new(&key).is_ok());
    }

    #[test]
    fn test_invalid_key_length() {
        let err = LocalEncryptionProvider::new(&BASE64.encode(b"tooshort"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("got 8 bytes"), "{err}");
    }
}
