use super::{random_seed, raw_seed, KeyKind, KeyRing, TypedKey};
use crate::foundation::{KeyId, Result};
use ed25519_dalek::{Signer, SigningKey};
use std::collections::BTreeMap;
use std::fmt;
use zeroize::Zeroizing;

const PEER_ID_PREFIX: &str = "p2p_";

/// Ed25519 key used for peer-to-peer transport identity.
#[derive(Clone)]
pub struct P2PKey {
    signing: SigningKey,
}

impl P2PKey {
    pub fn public_key(&self) -> [u8; 32] {
        self.signing.verifying_key().to_bytes()
    }

    /// Peer id advertised to other nodes.
    pub fn peer_id(&self) -> String {
        format!("{}{}", PEER_ID_PREFIX, self.public_key_hex())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing.sign(message).to_bytes()
    }
}

impl TypedKey for P2PKey {
    const KIND: KeyKind = KeyKind::P2P;

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
        &ring.p2p
    }

    fn slot_mut(ring: &mut KeyRing) -> &mut BTreeMap<KeyId, Self> {
        &mut ring.p2p
    }
}

impl fmt::Debug for P2PKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P2PKey {{ peer_id: {} }}", self.peer_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_id_embeds_public_key() {
        let key = P2PKey::from_raw(&[3u8; 32]).expect("from raw");
        assert_eq!(key.peer_id(), format!("p2p_{}", key.id()));
    }
}
