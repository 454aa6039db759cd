/*
[INPUT]:  Private key plus password, or Web3 Secret Storage JSON plus password
[OUTPUT]: Version 3 keystore document and the recovered key
[POS]:    Keys layer - encrypted-keystore strategy format
[UPDATE]: When the keystore backend or its staging changes
*/

use std::fs;
use std::path::Path;

use alloy_signer_local::{LocalSignerError, PrivateKeySigner};
use serde::Deserialize;
use tempfile::TempDir;
use zeroize::Zeroizing;

use crate::error::{Result, WalletAuthError};
use crate::signer::{LocalSigner, WalletSigner};

pub const KEYSTORE_VERSION: u32 = 3;

/// File name used while staging a keystore for the file-based backend
const STAGED_FILE: &str = "keystore.json";

/// Envelope fields checked before decryption
#[derive(Debug, Deserialize)]
struct KeystoreHeader {
    version: u32,
    #[serde(default)]
    address: Option<String>,
}

/// Encrypt a signer's private key into Web3 Secret Storage JSON
pub fn encrypt_keystore(signer: &LocalSigner, password: &str) -> Result<String> {
    let dir = staging_dir()?;
    let secret = Zeroizing::new(signer.inner().credential().to_bytes().to_vec());

    PrivateKeySigner::encrypt_keystore(
        dir.path(),
        &mut rand::thread_rng(),
        secret.as_slice(),
        password,
        Some(STAGED_FILE),
    )
    .map_err(keystore_error)?;

    Ok(fs::read_to_string(dir.path().join(STAGED_FILE))?)
}

/// Decrypt Web3 Secret Storage JSON
///
/// When the document records an address it must match the decrypted key.
pub fn decrypt_keystore(json: &str, password: &str) -> Result<LocalSigner> {
    let header: KeystoreHeader = serde_json::from_str(json)
        .map_err(|e| WalletAuthError::InvalidKeystore(format!("malformed keystore: {e}")))?;
    if header.version != KEYSTORE_VERSION {
        return Err(WalletAuthError::InvalidKeystore(format!(
            "unsupported keystore version {}",
            header.version
        )));
    }

    let dir = staging_dir()?;
    let path = dir.path().join(STAGED_FILE);
    fs::write(&path, json)?;
    let signer = LocalSigner::from_signer(decrypt_file(&path, password)?);

    if let Some(recorded) = header.address.as_deref() {
        let recorded = recorded.trim_start_matches("0x");
        if !recorded.eq_ignore_ascii_case(&hex::encode(signer.address().as_slice())) {
            return Err(WalletAuthError::InvalidKeystore(
                "address does not match key".into(),
            ));
        }
    }
    Ok(signer)
}

fn decrypt_file(path: &Path, password: &str) -> Result<PrivateKeySigner> {
    PrivateKeySigner::decrypt_keystore(path, password).map_err(keystore_error)
}

fn staging_dir() -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix("walletauth-keystore")
        .tempdir()
        .map_err(|e| WalletAuthError::Storage(format!("keystore staging failed: {e}")))
}

fn keystore_error(err: LocalSignerError) -> WalletAuthError {
    WalletAuthError::InvalidKeystore(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Web3 Secret Storage PBKDF2 test vector, password `testpassword`
    const PBKDF2_VECTOR: &str = r#"{
        "crypto": {
            "cipher": "aes-128-ctr",
            "cipherparams": {"iv": "6087dab2f9fdbbfaddc31a909735c1e6"},
            "ciphertext": "5318b4d5bcd28de64ee5559e671353e16f075ecae9f99c7a79a38af5f869aa46",
            "kdf": "pbkdf2",
            "kdfparams": {
                "c": 262144,
                "dklen": 32,
                "prf": "hmac-sha256",
                "salt": "ae3cd4e7013836a3df6bd7241b12db061dbe2c6785853cce422d148a624ce0bd"
            },
            "mac": "517ead924a9d0dc3124507e3393d175ce3ff7c1e96529c6c555ce9e51205e9b2"
        },
        "id": "3198bc9c-6672-5ab3-d995-4942343ae5b6",
        "version": 3
    }"#;

    const PBKDF2_VECTOR_KEY: &str =
        "0x7a28b5ba57c53603b0b07b56bba752f7784bf506fa95edc395f5cf6c7514fe9d";

    #[test]
    fn test_decrypt_known_vector() {
        let signer = decrypt_keystore(PBKDF2_VECTOR, "testpassword").unwrap();
        assert_eq!(signer.private_key_hex(), PBKDF2_VECTOR_KEY);
    }

    #[test]
    fn test_keystore_round_trip() {
        let signer = LocalSigner::random();
        let json = encrypt_keystore(&signer, "pw").unwrap();
        assert!(!json.contains(&signer.private_key_hex()[2..]));

        let document: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(document["version"], 3);

        let restored = decrypt_keystore(&json, "pw").unwrap();
        assert_eq!(restored.address(), signer.address());
    }

    #[test]
    fn test_keystore_wrong_password() {
        assert!(matches!(
            decrypt_keystore(PBKDF2_VECTOR, "nope"),
            Err(WalletAuthError::InvalidKeystore(_))
        ));
    }

    #[test]
    fn test_keystore_rejects_other_versions() {
        let legacy = PBKDF2_VECTOR.replace("\"version\": 3", "\"version\": 1");
        let err = decrypt_keystore(&legacy, "testpassword").unwrap_err();
        assert!(err.to_string().contains("unsupported keystore version 1"));
    }

    #[test]
    fn test_keystore_address_tamper() {
        let tampered = PBKDF2_VECTOR.replace(
            "\"version\": 3",
            &format!("\"address\": \"{}\", \"version\": 3", "11".repeat(20)),
        );
        assert!(matches!(
            decrypt_keystore(&tampered, "testpassword"),
            Err(WalletAuthError::InvalidKeystore(_))
        ));
    }
}
