//! Helpers for building encrypted envelopes in tests

use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, AeadCore, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};

use crate::envelope::{HashFunction, KeyDerivationParams, META_KEY_PREFIX};

/// Base64 JSON value of a `meta` entry
pub(crate) fn encode_params(
    salt: &[u8],
    iterations: u32,
    hash_function: &str,
    key_length: usize,
) -> String {
    let params = json!({
        "salt": BASE64.encode(salt),
        "iterations": iterations,
        "hash_function": hash_function,
        "key_length": key_length,
    });
    BASE64.encode(params.to_string())
}

/// Seals a state the way a pbkdf2 key provider with AES-GCM would
pub(crate) struct EnvelopeBuilder {
    passphrase: String,
    key_provider_name: String,
    salt: Vec<u8>,
    iterations: u32,
    hash_function: String,
    key_length: usize,
    nonce: [u8; 12],
}

impl EnvelopeBuilder {
    pub(crate) fn new(passphrase: &str) -> Self {
        Self {
            passphrase: passphrase.to_string(),
            key_provider_name: "default".to_string(),
            salt: b"0123456789abcdef0123456789abcdef".to_vec(),
            iterations: 1000,
            hash_function: "sha256".to_string(),
            key_length: 32,
            nonce: *b"unique nonce",
        }
    }

    pub(crate) fn key_provider_name(mut self, name: &str) -> Self {
        self.key_provider_name = name.to_string();
        self
    }

    pub(crate) fn salt(mut self, salt: &[u8]) -> Self {
        self.salt = salt.to_vec();
        self
    }

    pub(crate) fn iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub(crate) fn hash_function(mut self, hash_function: &str) -> Self {
        self.hash_function = hash_function.to_string();
        self
    }

    pub(crate) fn key_length(mut self, key_length: usize) -> Self {
        self.key_length = key_length;
        self
    }

    pub(crate) fn seal(&self, state: &Value) -> Value {
        self.seal_bytes(state.to_string().as_bytes())
    }

    pub(crate) fn seal_bytes(&self, plaintext: &[u8]) -> Value {
        let params = KeyDerivationParams {
            salt: self.salt.clone(),
            iterations: self.iterations,
            hash_function: self.hash_function.clone(),
            key_length: self.key_length,
        };
        let hash = HashFunction::from_name(&self.hash_function).unwrap();
        let key = params.derive_key(hash, self.passphrase.as_bytes());

        let ciphertext = match self.key_length {
            16 => encrypt_with::<Aes128Gcm>(&key, &self.nonce, plaintext),
            24 => encrypt_with::<AesGcm<aes_gcm::aes::Aes192, U12>>(&key, &self.nonce, plaintext),
            32 => encrypt_with::<Aes256Gcm>(&key, &self.nonce, plaintext),
            other => panic!("unsupported key length {}", other),
        };

        let mut payload = self.nonce.to_vec();
        payload.extend_from_slice(&ciphertext);

        let meta_key = format!("{}{}", META_KEY_PREFIX, self.key_provider_name);
        json!({
            "meta": {
                meta_key: encode_params(&self.salt, self.iterations, &self.hash_function, self.key_length),
            },
            "encrypted_data": BASE64.encode(payload),
            "encryption_version": "v0",
        })
    }
}

fn encrypt_with<C>(key: &[u8], nonce: &[u8], plaintext: &[u8]) -> Vec<u8>
where
    C: KeyInit + Aead + AeadCore<NonceSize = U12>,
{
    let cipher = C::new_from_slice(key).unwrap();
    cipher
        .encrypt(aes_gcm::aead::Nonce::<C>::from_slice(nonce), plaintext)
        .unwrap()
}
