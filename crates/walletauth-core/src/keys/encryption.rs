/*
[INPUT]:  Plaintext key material and a password
[OUTPUT]: Hex ciphertext (salt || nonce || AES-256-GCM output) and back
[POS]:    Keys layer - pluggable symmetric encryption
[UPDATE]: When changing KDF parameters or ciphertext layout
*/

use std::fmt;
use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::Argon2;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{Result, WalletAuthError};

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Symmetric cipher keyed by a password
pub trait Cipher: Send + Sync {
    fn encrypt(&self, plaintext: &str, password: &str) -> Result<String>;

    fn decrypt(&self, ciphertext: &str, password: &str) -> Result<String>;
}

/// Argon2id key derivation + AES-256-GCM
#[derive(Debug, Default, Clone, Copy)]
pub struct AesGcmCipher;

impl AesGcmCipher {
    fn derive_key(password: &str, salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        Argon2::default()
            .hash_password_into(password.as_bytes(), salt, &mut *key)
            .map_err(|e| WalletAuthError::Encryption(format!("key derivation failed: {e}")))?;
        Ok(key)
    }
}

impl Cipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &str, password: &str) -> Result<String> {
        let mut salt = [0u8; SALT_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

        let key = Self::derive_key(password, &salt)?;
        let cipher = Aes256Gcm::new_from_slice(key.as_slice())
            .map_err(|e| WalletAuthError::Encryption(format!("cipher init failed: {e}")))?;
        let encrypted = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|e| WalletAuthError::Encryption(format!("encryption failed: {e}")))?;

        let mut out = Vec::with_capacity(SALT_LEN + NONCE_LEN + encrypted.len());
        out.extend_from_slice(&salt);
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&encrypted);
        Ok(hex::encode(out))
    }

    fn decrypt(&self, ciphertext: &str, password: &str) -> Result<String> {
        let bytes = hex::decode(ciphertext)
            .map_err(|_| WalletAuthError::Encryption("ciphertext is not hex".into()))?;
        if bytes.len() <= SALT_LEN + NONCE_LEN {
            return Err(WalletAuthError::Encryption("ciphertext too short".into()));
        }
        let (salt, rest) = bytes.split_at(SALT_LEN);
        let (nonce_bytes, encrypted) = rest.split_at(NONCE_LEN);

        let key = Self::derive_key(password, salt)?;
        let cipher = Aes256Gcm::new_from_slice(key.as_slice())
            .map_err(|e| WalletAuthError::Encryption(format!("cipher init failed: {e}")))?;
        let decrypted = Zeroizing::new(
            cipher
                .decrypt(Nonce::from_slice(nonce_bytes), encrypted)
                .map_err(|_| {
                    WalletAuthError::Encryption(
                        "decryption failed - wrong password or corrupted data".into(),
                    )
                })?,
        );

        String::from_utf8(decrypted.to_vec())
            .map_err(|_| WalletAuthError::Encryption("plaintext is not UTF-8".into()))
    }
}

type CipherFn = dyn Fn(&str, &str) -> Result<String> + Send + Sync;

/// Cipher built from caller-supplied encrypt/decrypt functions
#[derive(Clone)]
pub struct FnCipher {
    encrypt: Arc<CipherFn>,
    decrypt: Arc<CipherFn>,
}

impl FnCipher {
    pub fn new<E, D>(encrypt: E, decrypt: D) -> Self
    where
        E: Fn(&str, &str) -> Result<String> + Send + Sync + 'static,
        D: Fn(&str, &str) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            encrypt: Arc::new(encrypt),
            decrypt: Arc::new(decrypt),
        }
    }
}

impl Cipher for FnCipher {
    fn encrypt(&self, plaintext: &str, password: &str) -> Result<String> {
        (self.encrypt)(plaintext, password)
    }

    fn decrypt(&self, ciphertext: &str, password: &str) -> Result<String> {
        (self.decrypt)(ciphertext, password)
    }
}

/// Password plus cipher used to protect stored or exported key material
#[derive(Clone)]
pub struct Encryption {
    password: Zeroizing<String>,
    cipher: Arc<dyn Cipher>,
}

impl Encryption {
    /// Default cipher (Argon2id + AES-256-GCM)
    pub fn new(password: &str) -> Self {
        Self::with_cipher(password, Arc::new(AesGcmCipher))
    }

    pub fn with_cipher(password: &str, cipher: Arc<dyn Cipher>) -> Self {
        Self {
            password: Zeroizing::new(password.to_string()),
            cipher,
        }
    }

    /// Custom encrypt/decrypt functions in place of the default cipher
    pub fn with_functions<E, D>(password: &str, encrypt: E, decrypt: D) -> Self
    where
        E: Fn(&str, &str) -> Result<String> + Send + Sync + 'static,
        D: Fn(&str, &str) -> Result<String> + Send + Sync + 'static,
    {
        Self::with_cipher(password, Arc::new(FnCipher::new(encrypt, decrypt)))
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        self.cipher.encrypt(plaintext, &self.password)
    }

    pub fn decrypt(&self, ciphertext: &str) -> Result<String> {
        self.cipher.decrypt(ciphertext, &self.password)
    }
}

impl fmt::Debug for Encryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encryption")
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Whether key material is stored or exported encrypted
///
/// Plaintext must be asked for explicitly with `Protection::None`.
#[derive(Debug, Clone)]
pub enum Protection {
    None,
    Encrypted(Encryption),
}

impl Protection {
    pub fn password(password: &str) -> Self {
        Self::Encrypted(Encryption::new(password))
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, Self::Encrypted(_))
    }

    pub fn encryption(&self) -> Option<&Encryption> {
        match self {
            Self::None => None,
            Self::Encrypted(encryption) => Some(encryption),
        }
    }
}
