//! Password-protected single-key export format.

use super::kdf::{derive_key, Argon2Params, SALT_LEN};
use crate::domain::keys::{KeyKind, TypedKey};
use crate::foundation::util::encoding::decode_hex;
use crate::foundation::{NodeError, Result};
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::XChaCha20Poly1305;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

pub const EXPORT_CIPHER: &str = "xchacha20-poly1305";
pub const EXPORT_KDF: &str = "argon2id";
const NONCE_LEN: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedKeyExport {
    pub key_type: KeyKind,
    pub public_key: String,
    pub crypto: ExportCrypto,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportCrypto {
    pub cipher: String,
    pub ciphertext: String,
    pub nonce: String,
    pub kdf: String,
    pub kdf_params: ExportKdfParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportKdfParams {
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
    pub salt: String,
}

/// Export passwords are prefixed with the key type so one blob never imports as another type.
fn domain_password(kind: KeyKind, password: &str) -> Zeroizing<String> {
    Zeroizing::new(format!("{}{}", kind.password_domain(), password))
}

fn export_aad(kind: KeyKind, public_key: &str) -> Vec<u8> {
    let mut aad = kind.as_str().as_bytes().to_vec();
    aad.extend_from_slice(public_key.as_bytes());
    aad
}

/// Encrypts `key` under `password` with a fresh salt and nonce.
pub fn export_key<K: TypedKey>(key: &K, password: &str, kdf_params: &Argon2Params) -> Result<Vec<u8>> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut nonce);

    let public_key = key.public_key_hex();
    let secret = derive_key(domain_password(K::KIND, password).as_bytes(), &salt, kdf_params)?;
    let cipher = XChaCha20Poly1305::new_from_slice(&secret[..]).map_err(|e| NodeError::crypto("export cipher", e.to_string()))?;
    let raw = key.raw();
    let aad = export_aad(K::KIND, &public_key);
    let ciphertext = cipher
        .encrypt(&nonce.into(), Payload { msg: raw.as_slice(), aad: &aad })
        .map_err(|e| NodeError::crypto("export encrypt", e.to_string()))?;

    let export = EncryptedKeyExport {
        key_type: K::KIND,
        public_key,
        crypto: ExportCrypto {
            cipher: EXPORT_CIPHER.to_string(),
            ciphertext: hex::encode(ciphertext),
            nonce: hex::encode(nonce),
            kdf: EXPORT_KDF.to_string(),
            kdf_params: ExportKdfParams {
                m_cost: kdf_params.m_cost,
                t_cost: kdf_params.t_cost,
                p_cost: kdf_params.p_cost,
                salt: hex::encode(salt),
            },
        },
    };
    Ok(serde_json::to_vec(&export)?)
}

/// Decrypts an export produced by [`export_key`]. Every failure, including a key type mismatch,
/// is reported as `DecryptionFailed`.
pub fn import_key<K: TypedKey>(json: &[u8], password: &str) -> Result<K> {
    let export: EncryptedKeyExport =
        serde_json::from_slice(json).map_err(|e| NodeError::decryption_failed(format!("malformed key export: {}", e)))?;
    if export.key_type != K::KIND {
        return Err(NodeError::decryption_failed(format!("export holds a {} key, expected {}", export.key_type, K::KIND)));
    }
    if export.crypto.cipher != EXPORT_CIPHER || export.crypto.kdf != EXPORT_KDF {
        return Err(NodeError::decryption_failed(format!(
            "unsupported export crypto cipher={} kdf={}",
            export.crypto.cipher, export.crypto.kdf
        )));
    }

    let salt = decode_field(&export.crypto.kdf_params.salt, "salt")?;
    let nonce: [u8; NONCE_LEN] = decode_field(&export.crypto.nonce, "nonce")?
        .try_into()
        .map_err(|_| NodeError::decryption_failed("export nonce must be 24 bytes"))?;
    let ciphertext = decode_field(&export.crypto.ciphertext, "ciphertext")?;
    let params = Argon2Params {
        m_cost: export.crypto.kdf_params.m_cost,
        t_cost: export.crypto.kdf_params.t_cost,
        p_cost: export.crypto.kdf_params.p_cost,
    };
    params.validate().map_err(|e| NodeError::decryption_failed(format!("export kdf_params: {}", e)))?;

    let secret = derive_key(domain_password(K::KIND, password).as_bytes(), &salt, &params)
        .map_err(|e| NodeError::decryption_failed(e.to_string()))?;
    let cipher = XChaCha20Poly1305::new_from_slice(&secret[..]).map_err(|e| NodeError::crypto("export cipher", e.to_string()))?;
    let aad = export_aad(K::KIND, &export.public_key);
    let raw = Zeroizing::new(
        cipher
            .decrypt(&nonce.into(), Payload { msg: &ciphertext, aad: &aad })
            .map_err(|_| NodeError::decryption_failed(format!("unable to decrypt {} key (wrong password?)", K::KIND)))?,
    );

    let key = K::from_raw(&raw).map_err(|e| NodeError::decryption_failed(e.to_string()))?;
    if key.public_key_hex() != export.public_key {
        return Err(NodeError::decryption_failed("decrypted key does not match exported public key"));
    }
    Ok(key)
}

fn decode_field(value: &str, field: &str) -> Result<Vec<u8>> {
    decode_hex(value).map_err(|e| NodeError::decryption_failed(format!("export {}: {}", field, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::keys::{CsaKey, P2PKey, WorkflowKey};

    #[test]
    fn export_round_trips_id_and_public_key() {
        let key = WorkflowKey::generate().expect("generate");
        let blob = export_key(&key, "pw", &Argon2Params::fast()).expect("export");
        let imported: WorkflowKey = import_key(&blob, "pw").expect("import");
        assert_eq!(imported.id(), key.id());
        assert_eq!(imported.public_key_hex(), key.public_key_hex());
    }

    #[test]
    fn exports_use_fresh_salt_and_nonce() {
        let key = CsaKey::generate().expect("generate");
        let a: EncryptedKeyExport = serde_json::from_slice(&export_key(&key, "pw", &Argon2Params::fast()).expect("a")).expect("json");
        let b: EncryptedKeyExport = serde_json::from_slice(&export_key(&key, "pw", &Argon2Params::fast()).expect("b")).expect("json");
        assert_ne!(a.crypto.nonce, b.crypto.nonce);
        assert_ne!(a.crypto.kdf_params.salt, b.crypto.kdf_params.salt);
        assert_eq!(a.crypto.cipher, EXPORT_CIPHER);
    }

    #[test]
    fn type_mismatch_and_garbage_are_decryption_failures() {
        let key = P2PKey::generate().expect("generate");
        let blob = export_key(&key, "pw", &Argon2Params::fast()).expect("export");
        assert!(matches!(import_key::<CsaKey>(&blob, "pw"), Err(NodeError::DecryptionFailed { .. })));
        assert!(matches!(import_key::<P2PKey>(b"{not json", "pw"), Err(NodeError::DecryptionFailed { .. })));
        assert!(matches!(import_key::<P2PKey>(&blob, "nope"), Err(NodeError::DecryptionFailed { .. })));
    }

    #[test]
    fn oversized_kdf_params_are_rejected_without_deriving() {
        let key = CsaKey::generate().expect("generate");
        let blob = export_key(&key, "pw", &Argon2Params::fast()).expect("export");
        let mut export: EncryptedKeyExport = serde_json::from_slice(&blob).expect("json");
        export.crypto.kdf_params.m_cost = u32::MAX;
        let crafted = serde_json::to_vec(&export).expect("encode");
        assert!(matches!(import_key::<CsaKey>(&crafted, "pw"), Err(NodeError::DecryptionFailed { .. })));

        export.crypto.kdf_params.m_cost = Argon2Params::fast().m_cost;
        export.crypto.kdf_params.t_cost = u32::MAX;
        let crafted = serde_json::to_vec(&export).expect("encode");
        assert!(matches!(import_key::<CsaKey>(&crafted, "pw"), Err(NodeError::DecryptionFailed { .. })));
    }
}
