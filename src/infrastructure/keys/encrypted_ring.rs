//! Encrypted key ring blob (Argon2id + XChaCha20-Poly1305).
//!
//! Layout: `magic(4) | version(1) | m_cost(4) | t_cost(4) | p_cost(4) | salt(32) | nonce(24) | ciphertext+tag`.
//! The whole header is bound as associated data, so tampering with the KDF parameters fails decryption.

use super::kdf::{derive_key, Argon2Params, SALT_LEN};
use crate::domain::keys::{KeyRing, RawKeyRing};
use crate::foundation::{NodeError, Result};
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::XChaCha20Poly1305;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

const MAGIC: [u8; 4] = *b"ONKR";
const VERSION: u8 = 1;
const NONCE_LEN: usize = 24;
const HEADER_LEN: usize = 4 + 1 + 12 + SALT_LEN + NONCE_LEN;

#[derive(Debug, Clone)]
pub struct EncryptedKeyRing {
    pub version: u8,
    pub kdf_params: Argon2Params,
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext_and_tag: Vec<u8>,
}

impl EncryptedKeyRing {
    pub fn seal(ring: &KeyRing, password: &str, kdf_params: Argon2Params) -> Result<Self> {
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut nonce);

        let raw = ring.to_raw();
        let plaintext = Zeroizing::new(bincode::serialize(&raw).map_err(|e| crate::serde_err!("bincode", e))?);

        let mut sealed = Self { version: VERSION, kdf_params, salt, nonce, ciphertext_and_tag: Vec::new() };
        let key = derive_key(password.as_bytes(), &salt, &kdf_params)?;
        let cipher = XChaCha20Poly1305::new_from_slice(&key[..]).map_err(|e| NodeError::crypto("key ring cipher", e.to_string()))?;
        let aad = sealed.header_bytes();
        sealed.ciphertext_and_tag = cipher
            .encrypt(&nonce.into(), Payload { msg: plaintext.as_ref(), aad: aad.as_ref() })
            .map_err(|e| NodeError::crypto("key ring encrypt", e.to_string()))?;
        Ok(sealed)
    }

    pub fn open(&self, password: &str) -> Result<KeyRing> {
        let key = derive_key(password.as_bytes(), &self.salt, &self.kdf_params)?;
        let cipher = XChaCha20Poly1305::new_from_slice(&key[..]).map_err(|e| NodeError::crypto("key ring cipher", e.to_string()))?;
        let aad = self.header_bytes();
        let plaintext = Zeroizing::new(
            cipher
                .decrypt(&self.nonce.into(), Payload { msg: self.ciphertext_and_tag.as_ref(), aad: aad.as_ref() })
                .map_err(|_| NodeError::decryption_failed("unable to decrypt key ring (wrong password?)"))?,
        );
        let raw: RawKeyRing = bincode::deserialize(&plaintext)
            .map_err(|e| NodeError::unsupported_key_ring_format(format!("key ring payload: {}", e)))?;
        KeyRing::from_raw(&raw)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = self.header_bytes();
        buf.extend_from_slice(&self.ciphertext_and_tag);
        buf
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(NodeError::unsupported_key_ring_format(format!("blob is {} bytes, header needs {}", data.len(), HEADER_LEN)));
        }
        if data[0..4] != MAGIC {
            return Err(NodeError::unsupported_key_ring_format("invalid magic bytes"));
        }
        let version = data[4];
        if version != VERSION {
            return Err(NodeError::unsupported_key_ring_format(format!("blob version {} (expected {})", version, VERSION)));
        }
        let kdf_params = Argon2Params { m_cost: read_u32(data, 5)?, t_cost: read_u32(data, 9)?, p_cost: read_u32(data, 13)? };
        kdf_params.validate().map_err(|e| NodeError::decryption_failed(format!("key ring kdf params: {}", e)))?;
        let salt: [u8; SALT_LEN] =
            data[17..17 + SALT_LEN].try_into().map_err(|_| NodeError::unsupported_key_ring_format("invalid salt bytes"))?;
        let nonce: [u8; NONCE_LEN] =
            data[49..HEADER_LEN].try_into().map_err(|_| NodeError::unsupported_key_ring_format("invalid nonce bytes"))?;
        Ok(Self { version, kdf_params, salt, nonce, ciphertext_and_tag: data[HEADER_LEN..].to_vec() })
    }

    fn header_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN);
        buf.extend_from_slice(&MAGIC);
        buf.push(self.version);
        buf.extend_from_slice(&self.kdf_params.m_cost.to_le_bytes());
        buf.extend_from_slice(&self.kdf_params.t_cost.to_le_bytes());
        buf.extend_from_slice(&self.kdf_params.p_cost.to_le_bytes());
        buf.extend_from_slice(&self.salt);
        buf.extend_from_slice(&self.nonce);
        buf
    }
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    let bytes: [u8; 4] =
        data[offset..offset + 4].try_into().map_err(|_| NodeError::unsupported_key_ring_format("invalid argon2 parameter bytes"))?;
    Ok(u32::from_le_bytes(bytes))
}
