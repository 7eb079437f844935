use super::{random_seed, raw_seed, KeyKind, KeyRing, TypedKey};
use crate::foundation::{KeyId, NodeError, Result};
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::XChaCha20Poly1305;
use std::collections::BTreeMap;
use std::fmt;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

const SEAL_CONTEXT: &str = "oracle-node-core workflow sealed box v1";
const PUBLIC_KEY_LEN: usize = 32;
const TAG_LEN: usize = 16;

/// X25519 key used by workflow DON members to receive encrypted payloads.
#[derive(Clone)]
pub struct WorkflowKey {
    secret: StaticSecret,
    public: PublicKey,
}

impl WorkflowKey {
    pub fn public_key(&self) -> [u8; PUBLIC_KEY_LEN] {
        *self.public.as_bytes()
    }

    /// Anonymously encrypts `plaintext` so only this key can open it.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        seal_to(self.public.as_bytes(), plaintext)
    }

    pub fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < PUBLIC_KEY_LEN + TAG_LEN {
            return Err(NodeError::decryption_failed(format!("sealed payload too short: {} bytes", sealed.len())));
        }
        let (eph_bytes, ciphertext) = sealed.split_at(PUBLIC_KEY_LEN);
        let mut eph = [0u8; PUBLIC_KEY_LEN];
        eph.copy_from_slice(eph_bytes);
        let shared = self.secret.diffie_hellman(&PublicKey::from(eph));
        if !shared.was_contributory() {
            return Err(NodeError::decryption_failed("non-contributory ephemeral key"));
        }
        let (key, nonce) = seal_key_and_nonce(shared.as_bytes(), &eph, self.public.as_bytes());
        let aad = seal_aad(&eph, self.public.as_bytes());
        XChaCha20Poly1305::new(&(*key).into())
            .decrypt(&nonce.into(), Payload { msg: ciphertext, aad: &aad })
            .map_err(|_| NodeError::decryption_failed("sealed payload authentication failed"))
    }
}

/// Encrypts `plaintext` to `recipient` with a fresh ephemeral X25519 key.
///
/// Output layout: `ephemeral_public(32) || ciphertext || tag(16)`.
pub fn seal_to(recipient: &[u8; PUBLIC_KEY_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let ephemeral = StaticSecret::from(*random_seed());
    let eph_public = PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(&PublicKey::from(*recipient));
    if !shared.was_contributory() {
        return Err(NodeError::crypto("workflow seal", "recipient public key is low order"));
    }
    let (key, nonce) = seal_key_and_nonce(shared.as_bytes(), eph_public.as_bytes(), recipient);
    let aad = seal_aad(eph_public.as_bytes(), recipient);
    let ciphertext = XChaCha20Poly1305::new(&(*key).into())
        .encrypt(&nonce.into(), Payload { msg: plaintext, aad: &aad })
        .map_err(|e| NodeError::crypto("workflow seal", e.to_string()))?;

    let mut out = Vec::with_capacity(PUBLIC_KEY_LEN + ciphertext.len());
    out.extend_from_slice(eph_public.as_bytes());
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

// The ephemeral key is never reused, so deriving the nonce alongside the key is safe.
fn seal_key_and_nonce(shared: &[u8; 32], eph_public: &[u8; 32], recipient: &[u8; 32]) -> (Zeroizing<[u8; 32]>, [u8; 24]) {
    let mut hasher = blake3::Hasher::new_derive_key(SEAL_CONTEXT);
    hasher.update(shared);
    hasher.update(eph_public);
    hasher.update(recipient);
    let mut okm = Zeroizing::new([0u8; 56]);
    hasher.finalize_xof().fill(&mut okm[..]);

    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&okm[..32]);
    let mut nonce = [0u8; 24];
    nonce.copy_from_slice(&okm[32..]);
    (key, nonce)
}

fn seal_aad(eph_public: &[u8; 32], recipient: &[u8; 32]) -> [u8; 64] {
    let mut aad = [0u8; 64];
    aad[..32].copy_from_slice(eph_public);
    aad[32..].copy_from_slice(recipient);
    aad
}

impl TypedKey for WorkflowKey {
    const KIND: KeyKind = KeyKind::Workflow;

    fn generate() -> Result<Self> {
        Self::from_raw(&random_seed()[..])
    }

    fn from_raw(raw: &[u8]) -> Result<Self> {
        let seed = raw_seed(Self::KIND, raw)?;
        let secret = StaticSecret::from(*seed);
        let public = PublicKey::from(&secret);
        Ok(Self { secret, public })
    }

    fn raw(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.secret.to_bytes().to_vec())
    }

    fn id(&self) -> KeyId {
        KeyId::new(hex::encode(self.public.as_bytes()))
    }

    fn public_key_hex(&self) -> String {
        hex::encode(self.public.as_bytes())
    }

    fn slot(ring: &KeyRing) -> &BTreeMap<KeyId, Self> {
        &ring.workflow
    }

    fn slot_mut(ring: &mut KeyRing) -> &mut BTreeMap<KeyId, Self> {
        &mut ring.workflow
    }
}

impl fmt::Debug for WorkflowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WorkflowKey {{ public_key: {} }}", self.public_key_hex())
    }
}
