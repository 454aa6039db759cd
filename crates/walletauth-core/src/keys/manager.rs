/*
[INPUT]:  Key sources (private key, mnemonic, keystore JSON), protection, storage
[OUTPUT]: Loaded local signer, exported key material, persisted WalletData
[POS]:    Keys layer - key lifecycle (generate, import, save, load, export, delete)
[UPDATE]: When adding strategies or changing the persisted record format
*/

use std::sync::Arc;

use alloy_primitives::Address;
use alloy_signer_local::coins_bip39::{English, Mnemonic};
use alloy_signer_local::MnemonicBuilder;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::error::{Result, WalletAuthError};
use crate::keys::encryption::Protection;
use crate::keys::keystore;
use crate::keys::storage::{KeyStorage, MemoryStorage};
use crate::signer::{LocalSigner, WalletSigner};
use crate::types::{WalletData, WalletStrategy};

/// Storage key the wallet record is kept under
pub const WALLET_STORAGE_KEY: &str = "walletauth.wallet-data";

const MNEMONIC_WORDS: usize = 12;

/// Key material accepted by `import`
#[derive(Clone)]
pub enum KeySource {
    PrivateKey(String),
    Mnemonic(String),
    EncryptedJson { json: String, password: String },
}

impl KeySource {
    pub fn strategy(&self) -> WalletStrategy {
        match self {
            Self::PrivateKey(_) => WalletStrategy::PrivateKey,
            Self::Mnemonic(_) => WalletStrategy::Mnemonic,
            Self::EncryptedJson { .. } => WalletStrategy::EncryptedJson,
        }
    }
}

impl std::fmt::Debug for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeySource::{}", self.strategy())
    }
}

struct LoadedKey {
    signer: LocalSigner,
    mnemonic: Option<Zeroizing<String>>,
}

/// Owns at most one in-memory key and persists it through a `KeyStorage`
///
/// Mutating calls take `&mut self`; the only guard is against overwriting an
/// already loaded key.
pub struct KeyManager {
    storage: Arc<dyn KeyStorage>,
    loaded: Option<LoadedKey>,
}

impl KeyManager {
    pub fn new(storage: Arc<dyn KeyStorage>) -> Self {
        Self {
            storage,
            loaded: None,
        }
    }

    /// Manager backed by process-local storage
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    pub fn storage(&self) -> &Arc<dyn KeyStorage> {
        &self.storage
    }

    /// Address of the loaded key, if any
    pub fn address(&self) -> Option<Address> {
        self.loaded.as_ref().map(|key| key.signer.address())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Signer for the loaded key
    pub fn signer(&self) -> Result<&LocalSigner> {
        self.loaded
            .as_ref()
            .map(|key| &key.signer)
            .ok_or(WalletAuthError::NotInitialized)
    }

    /// Drop the in-memory key without touching storage
    pub fn unload(&mut self) {
        self.loaded = None;
    }

    /// Generate a fresh mnemonic-backed key
    pub fn generate(&mut self) -> Result<Address> {
        self.ensure_empty()?;

        let mnemonic = Mnemonic::<English>::new_with_count(&mut rand::thread_rng(), MNEMONIC_WORDS)
            .map_err(|e| WalletAuthError::Signing(format!("mnemonic generation failed: {e}")))?;
        let phrase = Zeroizing::new(mnemonic.to_phrase());
        let signer = signer_from_mnemonic(&phrase)?;

        let address = signer.address();
        self.loaded = Some(LoadedKey {
            signer,
            mnemonic: Some(phrase),
        });
        info!(%address, "wallet generated");
        Ok(address)
    }

    /// Import key material, decrypting it first when protection is supplied
    ///
    /// A wrong password surfaces as the strategy's format error
    /// (`InvalidPrivateKey`, `InvalidMnemonic` or `InvalidKeystore`).
    pub fn import(&mut self, source: KeySource, protection: &Protection) -> Result<Address> {
        self.ensure_empty()?;

        let strategy = source.strategy();
        let loaded = match source {
            KeySource::PrivateKey(data) => {
                let key = Zeroizing::new(
                    decrypt_input(&data, protection).map_err(|_| WalletAuthError::InvalidPrivateKey)?,
                );
                if !is_private_key_hex(&key) {
                    return Err(WalletAuthError::InvalidPrivateKey);
                }
                LoadedKey {
                    signer: LocalSigner::from_private_key(&key)?,
                    mnemonic: None,
                }
            }
            KeySource::Mnemonic(data) => {
                let phrase = Zeroizing::new(
                    decrypt_input(&data, protection).map_err(|_| WalletAuthError::InvalidMnemonic)?,
                );
                let phrase = Zeroizing::new(normalize_phrase(&phrase));
                LoadedKey {
                    signer: signer_from_mnemonic(&phrase)?,
                    mnemonic: Some(phrase),
                }
            }
            KeySource::EncryptedJson { json, password } => {
                let json = decrypt_input(&json, protection).map_err(|_| {
                    WalletAuthError::InvalidKeystore("could not decrypt keystore".into())
                })?;
                LoadedKey {
                    signer: keystore::decrypt_keystore(&json, &password)?,
                    mnemonic: None,
                }
            }
        };

        let address = loaded.signer.address();
        self.loaded = Some(loaded);
        info!(%address, %strategy, "wallet imported");
        Ok(address)
    }

    /// Key material in the requested strategy's format
    pub fn export(&self, strategy: WalletStrategy, protection: &Protection) -> Result<String> {
        let key = self.loaded.as_ref().ok_or(WalletAuthError::NotInitialized)?;

        match strategy {
            WalletStrategy::PrivateKey => {
                let plain = Zeroizing::new(key.signer.private_key_hex());
                protect(&plain, protection)
            }
            WalletStrategy::Mnemonic => {
                let phrase = key
                    .mnemonic
                    .as_ref()
                    .ok_or(WalletAuthError::MnemonicUnavailable)?;
                protect(phrase, protection)
            }
            WalletStrategy::EncryptedJson => {
                let encryption = protection
                    .encryption()
                    .ok_or(WalletAuthError::PasswordRequired)?;
                keystore::encrypt_keystore(&key.signer, encryption.password())
            }
        }
    }

    /// Persist the loaded key to the default storage
    pub async fn save(&self, strategy: WalletStrategy, protection: &Protection) -> Result<()> {
        self.save_to(strategy, protection, self.storage.as_ref()).await
    }

    /// Persist the loaded key to an explicit storage
    pub async fn save_to(
        &self,
        strategy: WalletStrategy,
        protection: &Protection,
        storage: &dyn KeyStorage,
    ) -> Result<()> {
        let address = self.address().ok_or(WalletAuthError::NotInitialized)?;
        let data = self.export(strategy, protection)?;

        let record = WalletData {
            address: address.to_checksum(None),
            strategy,
            data,
            is_encrypted: protection.is_encrypted(),
        };
        storage
            .set_item(WALLET_STORAGE_KEY, &serde_json::to_string(&record)?)
            .await?;
        info!(%address, %strategy, encrypted = record.is_encrypted, "wallet saved");
        Ok(())
    }

    /// Load the saved key from the default storage
    pub async fn load(&mut self, strategy: WalletStrategy, protection: &Protection) -> Result<Address> {
        let storage = Arc::clone(&self.storage);
        self.load_from(strategy, protection, storage.as_ref()).await
    }

    /// Load the saved key from an explicit storage
    ///
    /// Fails when the stored strategy or encryption flag disagrees with the request.
    pub async fn load_from(
        &mut self,
        strategy: WalletStrategy,
        protection: &Protection,
        storage: &dyn KeyStorage,
    ) -> Result<Address> {
        self.ensure_empty()?;

        let record = read_record(storage)
            .await?
            .ok_or(WalletAuthError::NoSavedWallet)?;

        if record.strategy != strategy {
            return Err(WalletAuthError::StrategyMismatch {
                expected: strategy.to_string(),
                found: record.strategy.to_string(),
            });
        }
        if record.is_encrypted != protection.is_encrypted() {
            return Err(WalletAuthError::EncryptionMismatch {
                stored_encrypted: record.is_encrypted,
            });
        }

        let source = match strategy {
            WalletStrategy::PrivateKey => KeySource::PrivateKey(record.data),
            WalletStrategy::Mnemonic => KeySource::Mnemonic(record.data),
            WalletStrategy::EncryptedJson => {
                let encryption = protection
                    .encryption()
                    .ok_or(WalletAuthError::PasswordRequired)?;
                KeySource::EncryptedJson {
                    json: record.data,
                    password: encryption.password().to_string(),
                }
            }
        };
        // keystore JSON carries its own encryption
        let protection = match strategy {
            WalletStrategy::EncryptedJson => Protection::None,
            _ => protection.clone(),
        };

        let address = self.import(source, &protection)?;
        debug!(%address, %strategy, "wallet loaded from storage");
        Ok(address)
    }

    /// Whether the loaded key is the one in storage
    pub async fn is_saved(&self) -> Result<bool> {
        let Some(address) = self.address() else {
            return Ok(false);
        };
        Ok(read_record(self.storage.as_ref())
            .await?
            .is_some_and(|record| record.address.eq_ignore_ascii_case(&address.to_checksum(None))))
    }

    /// Stored record, if any
    pub async fn saved_data(&self) -> Result<Option<WalletData>> {
        read_record(self.storage.as_ref()).await
    }

    pub async fn delete_saved(&self) -> Result<()> {
        self.storage.remove_item(WALLET_STORAGE_KEY).await?;
        info!("saved wallet deleted");
        Ok(())
    }

    fn ensure_empty(&self) -> Result<()> {
        if self.loaded.is_some() {
            return Err(WalletAuthError::AlreadyInitialized);
        }
        Ok(())
    }
}

async fn read_record(storage: &dyn KeyStorage) -> Result<Option<WalletData>> {
    match storage.get_item(WALLET_STORAGE_KEY).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| WalletAuthError::Storage(format!("corrupted wallet record: {e}"))),
        None => Ok(None),
    }
}

fn decrypt_input(data: &str, protection: &Protection) -> Result<String> {
    match protection.encryption() {
        Some(encryption) => encryption.decrypt(data),
        None => Ok(data.to_string()),
    }
}

fn protect(plain: &str, protection: &Protection) -> Result<String> {
    match protection.encryption() {
        Some(encryption) => encryption.encrypt(plain),
        None => Ok(plain.to_string()),
    }
}

fn signer_from_mnemonic(phrase: &str) -> Result<LocalSigner> {
    let signer = MnemonicBuilder::<English>::default()
        .phrase(phrase)
        .build()
        .map_err(|_| WalletAuthError::InvalidMnemonic)?;
    Ok(LocalSigner::from_signer(signer))
}

fn normalize_phrase(phrase: &str) -> String {
    phrase.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `0x` optional, then exactly 64 hex digits
pub fn is_private_key_hex(value: &str) -> bool {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    digits.len() == 64 && digits.chars().all(|c| c.is_ascii_hexdigit())
}
