//! 取件码生成、加密存储与脱敏
//!
//! Ciphertext format: base64(nonce_12bytes || ciphertext || tag_16bytes), AES-256-GCM.

use crate::config::PickupConfig;
use crate::error::{AppError, AppResult};
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::Engine;
use rand::Rng;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;
pub const MASK_CHAR: char = '•';

#[derive(Clone)]
pub struct PickupCodeGenerator {
    key: [u8; KEY_LEN],
    code_length: usize,
}

impl Drop for PickupCodeGenerator {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl std::fmt::Debug for PickupCodeGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PickupCodeGenerator")
            .field("code_length", &self.code_length)
            .finish_non_exhaustive()
    }
}

impl PickupCodeGenerator {
    /// `secret_key_b64` must decode to exactly 32 bytes.
    pub fn new(secret_key_b64: &str, code_length: usize) -> AppResult<Self> {
        let mut bytes = base64::engine::general_purpose::STANDARD
            .decode(secret_key_b64.trim())
            .map_err(|e| AppError::ConfigError(format!("pickup secret key is not base64: {e}")))?;
        if bytes.len() != KEY_LEN {
            let len = bytes.len();
            bytes.zeroize();
            return Err(AppError::ConfigError(format!(
                "pickup secret key wrong length: {len} (expected {KEY_LEN})"
            )));
        }
        if code_length == 0 {
            return Err(AppError::ConfigError("pickup code length must be positive".into()));
        }

        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&bytes);
        bytes.zeroize();
        Ok(Self { key, code_length })
    }

    pub fn from_config(config: &PickupConfig) -> AppResult<Self> {
        Self::new(&config.secret_key, config.code_length)
    }

    pub fn code_length(&self) -> usize {
        self.code_length
    }

    /// Numeric code, every digit drawn independently from the OS CSPRNG.
    pub fn generate(&self) -> String {
        let mut rng = OsRng;
        (0..self.code_length)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect()
    }

    pub fn encrypt(&self, code: &str) -> AppResult<String> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|_| AppError::InternalError("Invalid pickup key".into()))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::RngCore::fill_bytes(&mut OsRng, &mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, code.as_bytes())
            .map_err(|_| AppError::InternalError("Pickup code encryption failed".into()))?;

        // nonce || ciphertext (includes tag)
        let mut result = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);

        Ok(base64::engine::general_purpose::STANDARD.encode(&result))
    }

    /// `None` on malformed input, wrong key or tampered data.
    pub fn decrypt(&self, encrypted_b64: &str) -> Option<String> {
        let data = base64::engine::general_purpose::STANDARD
            .decode(encrypted_b64)
            .ok()?;
        if data.len() < NONCE_LEN + TAG_LEN {
            return None;
        }

        let cipher = Aes256Gcm::new_from_slice(&self.key).ok()?;
        let nonce = Nonce::from_slice(&data[..NONCE_LEN]);
        let plaintext = cipher.decrypt(nonce, &data[NONCE_LEN..]).ok()?;
        String::from_utf8(plaintext).ok()
    }

    pub fn verify(&self, encrypted_b64: &str, candidate: &str) -> bool {
        match self.decrypt(encrypted_b64) {
            Some(code) => code == candidate,
            None => false,
        }
    }

    /// `847392` -> `84••92`: first two and last two kept from length 5 up.
    /// Shorter codes keep less so at least one character is always hidden:
    /// length <= 2 is fully masked, 3-4 keep only the outer characters.
    pub fn mask(code: &str) -> String {
        let chars: Vec<char> = code.chars().collect();
        let keep = match chars.len() {
            0..=2 => 0,
            3..=4 => 1,
            _ => 2,
        };
        chars
            .iter()
            .enumerate()
            .map(|(i, c)| {
                if i < keep || i >= chars.len() - keep {
                    *c
                } else {
                    MASK_CHAR
                }
            })
            .collect()
    }

    /// Lookup digest for short-lived claim codes; plaintext never reaches the event log.
    pub fn hash(code: &str) -> String {
        hex::encode(Sha256::digest(code.as_bytes()))
    }
}
