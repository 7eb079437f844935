use super::{random_seed, raw_seed, KeyKind, KeyRing, TypedKey};
use crate::foundation::{KeyId, NodeError, Result};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use std::collections::BTreeMap;
use std::fmt;
use zeroize::Zeroizing;

/// Ed25519 key identifying the node to the operator control plane.
#[derive(Clone)]
pub struct CsaKey {
    signing: SigningKey,
}

impl CsaKey {
    pub fn public_key(&self) -> [u8; 32] {
        self.signing.verifying_key().to_bytes()
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing.sign(message).to_bytes()
    }

    pub fn verify(public_key: &[u8; 32], message: &[u8], signature: &[u8; 64]) -> Result<()> {
        let verifying = VerifyingKey::from_bytes(public_key).map_err(|e| NodeError::crypto("ed25519 verify", e.to_string()))?;
        verifying
            .verify(message, &Signature::from_bytes(signature))
            .map_err(|e| NodeError::crypto("ed25519 verify", e.to_string()))
    }
}

impl TypedKey for CsaKey {
    const KIND: KeyKind = KeyKind::Csa;

    fn generate() -> Result<Self> {
        Self::from_raw(&random_seed()[..])
    }

    fn from_raw(raw: &[u8]) -> Result<Self> {
        let seed = raw_seed(Self::KIND, raw)?;
        Ok(Self { signing: SigningKey::from_bytes(&seed) })
    }

    fn raw(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.signing.to_bytes().to_vec())
    }

    fn id(&self) -> KeyId {
        KeyId::new(self.public_key_hex())
    }

    fn public_key_hex(&self) -> String {
        hex::encode(self.public_key())
    }

    fn slot(ring: &KeyRing) -> &BTreeMap<KeyId, Self> {
        &ring.csa
    }

    fn slot_mut(ring: &mut KeyRing) -> &mut BTreeMap<KeyId, Self> {
        &mut ring.csa
    }
}

impl fmt::Debug for CsaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CsaKey {{ public_key: {} }}", self.public_key_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_verifies_against_public_key() {
        let key = CsaKey::generate().expect("generate");
        let sig = key.sign(b"csa message");
        CsaKey::verify(&key.public_key(), b"csa message", &sig).expect("valid signature");
        assert!(CsaKey::verify(&key.public_key(), b"other message", &sig).is_err());
    }
}
