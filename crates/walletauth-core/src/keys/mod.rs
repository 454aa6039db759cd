/*
[INPUT]:  Key material, passwords and a storage backend
[OUTPUT]: Managed local signer with optional encrypted persistence
[POS]:    Keys layer - key material management behind the signer abstraction
[UPDATE]: When adding strategies, ciphers or storage backends
*/

pub mod encryption;
pub mod keystore;
pub mod manager;
pub mod storage;

pub use encryption::{AesGcmCipher, Cipher, Encryption, FnCipher, Protection};
pub use keystore::{KEYSTORE_VERSION, decrypt_keystore, encrypt_keystore};
pub use manager::{KeyManager, KeySource, WALLET_STORAGE_KEY};
pub use storage::{FileStorage, KeyStorage, MemoryStorage};
