//! Decryption of encrypted state envelopes
//!
//! OpenTofu's state encryption with a `pbkdf2` key provider stores the state as
//!
//! ```text
//! {
//!   "meta": { "key_provider.pbkdf2.<name>": "<base64 JSON KeyDerivationParams>" },
//!   "encrypted_data": "<base64 (12-byte nonce || ciphertext || tag)>"
//! }
//! ```
//!
//! The key is derived from the passphrase with PBKDF2-HMAC and the payload is
//! opened with AES-GCM without associated data. Nothing is returned unless the
//! authentication tag verifies.

use std::collections::HashMap;

use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, AeadCore, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Sha256, Sha512};
use zeroize::Zeroizing;

use crate::config::EncryptionConfig;
use crate::error::{StateError, StateResult};

/// AES-GCM nonce length in bytes
pub const NONCE_LEN: usize = 12;

/// Prefix of the `meta` entry written by a pbkdf2 key provider
pub const META_KEY_PREFIX: &str = "key_provider.pbkdf2.";

type Aes192Gcm = AesGcm<aes_gcm::aes::Aes192, U12>;

const METADATA_ERROR: &str = "failed to extract metadata";
const DECRYPTION_ERROR: &str = "decryption failed";

/// Hash function used inside PBKDF2's HMAC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashFunction {
    Sha256,
    Sha512,
}

impl HashFunction {
    /// Resolve the name stored in the key provider metadata
    pub fn from_name(name: &str) -> StateResult<Self> {
        match name {
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            _ => Err(StateError::config("unsupported hash function")),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }
}

/// Key derivation parameters, as stored (base64 JSON) in the envelope metadata
#[derive(Debug, Clone, Deserialize)]
struct RawKeyDerivationParams {
    salt: String,
    iterations: u32,
    hash_function: String,
    key_length: usize,
}

/// Decoded key derivation parameters
///
/// The hash function is kept as its stored name; it is resolved only after
/// both metadata and ciphertext have been extracted.
#[derive(Debug, Clone)]
pub struct KeyDerivationParams {
    pub salt: Vec<u8>,
    pub iterations: u32,
    pub hash_function: String,
    pub key_length: usize,
}

impl KeyDerivationParams {
    /// Decode the base64 JSON value of a `meta` entry
    pub fn from_meta_value(encoded: &str) -> StateResult<Self> {
        let json = BASE64
            .decode(encoded)
            .map_err(|_| StateError::format(METADATA_ERROR))?;
        let raw: RawKeyDerivationParams =
            serde_json::from_slice(&json).map_err(|_| StateError::format(METADATA_ERROR))?;
        let salt = BASE64
            .decode(&raw.salt)
            .map_err(|_| StateError::format(METADATA_ERROR))?;

        if raw.iterations == 0 {
            return Err(StateError::format(METADATA_ERROR));
        }

        Ok(Self {
            salt,
            iterations: raw.iterations,
            hash_function: raw.hash_function,
            key_length: raw.key_length,
        })
    }

    /// Derive the key from a passphrase
    ///
    /// Deterministic: identical parameters and passphrase give identical keys.
    pub fn derive_key(&self, hash: HashFunction, passphrase: &[u8]) -> Zeroizing<Vec<u8>> {
        let mut key = Zeroizing::new(vec![0u8; self.key_length]);
        match hash {
            HashFunction::Sha256 => {
                pbkdf2::pbkdf2_hmac::<Sha256>(passphrase, &self.salt, self.iterations, &mut key)
            }
            HashFunction::Sha512 => {
                pbkdf2::pbkdf2_hmac::<Sha512>(passphrase, &self.salt, self.iterations, &mut key)
            }
        }
        key
    }
}

#[derive(Deserialize)]
struct RawEnvelope {
    meta: HashMap<String, String>,
    encrypted_data: String,
}

/// An encrypted state as found in a backend
#[derive(Debug, Clone)]
pub struct EncryptedEnvelope {
    pub params: KeyDerivationParams,
    /// Decoded `encrypted_data`: nonce followed by ciphertext and tag
    pub payload: Vec<u8>,
}

impl EncryptedEnvelope {
    /// Extract the key provider's parameters and the ciphertext
    pub fn from_state(raw: Value, key_provider_name: &str) -> StateResult<Self> {
        let envelope: RawEnvelope =
            serde_json::from_value(raw).map_err(|_| StateError::format(METADATA_ERROR))?;

        let meta_key = format!("{}{}", META_KEY_PREFIX, key_provider_name);
        let encoded = envelope
            .meta
            .get(&meta_key)
            .ok_or_else(|| StateError::format(METADATA_ERROR))?;
        let params = KeyDerivationParams::from_meta_value(encoded)?;

        let payload = BASE64
            .decode(&envelope.encrypted_data)
            .map_err(|_| StateError::format(METADATA_ERROR))?;

        Ok(Self { params, payload })
    }

    /// Derive the key and open the payload, returning the plaintext bytes
    pub fn open(&self, passphrase: &[u8]) -> StateResult<Zeroizing<Vec<u8>>> {
        let hash = HashFunction::from_name(&self.params.hash_function)?;

        // AES only takes 128, 192 and 256 bit keys; skip the derivation otherwise.
        if !matches!(self.params.key_length, 16 | 24 | 32) {
            return Err(StateError::decryption(DECRYPTION_ERROR));
        }
        if self.payload.len() < NONCE_LEN {
            return Err(StateError::decryption(DECRYPTION_ERROR));
        }

        log::debug!(
            "deriving {}-byte key with pbkdf2-{}",
            self.params.key_length,
            hash.name()
        );
        let key = self.params.derive_key(hash, passphrase);
        let (nonce, ciphertext) = self.payload.split_at(NONCE_LEN);
        aes_gcm_open(&key, nonce, ciphertext)
    }
}

fn aes_gcm_open(key: &[u8], nonce: &[u8], ciphertext: &[u8]) -> StateResult<Zeroizing<Vec<u8>>> {
    let plaintext = match key.len() {
        16 => decrypt_with::<Aes128Gcm>(key, nonce, ciphertext),
        24 => decrypt_with::<Aes192Gcm>(key, nonce, ciphertext),
        32 => decrypt_with::<Aes256Gcm>(key, nonce, ciphertext),
        _ => None,
    };

    plaintext
        .map(Zeroizing::new)
        .ok_or_else(|| StateError::decryption(DECRYPTION_ERROR))
}

/// `nonce` must be exactly [`NONCE_LEN`] bytes
fn decrypt_with<C>(key: &[u8], nonce: &[u8], ciphertext: &[u8]) -> Option<Vec<u8>>
where
    C: KeyInit + Aead + AeadCore<NonceSize = U12>,
{
    let cipher = C::new_from_slice(key).ok()?;
    cipher
        .decrypt(aes_gcm::aead::Nonce::<C>::from_slice(nonce), ciphertext)
        .ok()
}

/// Decrypt an envelope fetched from a backend into the plain state document
pub fn decrypt_state(raw: Value, encryption: &EncryptionConfig) -> StateResult<Value> {
    let envelope = EncryptedEnvelope::from_state(raw, &encryption.key_provider_name)?;
    log::debug!(
        "decrypting state with key provider '{}' ({} iterations)",
        encryption.key_provider_name,
        envelope.params.iterations
    );

    let plaintext = envelope.open(encryption.passphrase.as_bytes())?;

    let text = std::str::from_utf8(&plaintext)
        .map_err(|_| StateError::format("decrypted state is not valid UTF-8"))?;
    serde_json::from_str(text)
        .map_err(|e| StateError::format(format!("invalid JSON in decrypted state: {}", e)))
}
