use super::{CsaKey, EthKey, KeyKind, P2PKey, TypedKey, WorkflowKey};
use crate::foundation::{KeyId, NodeError, Result, KEY_RING_VERSION};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use zeroize::Zeroize;

/// Decrypted key ring: one map per key type, keyed by key id.
#[derive(Clone, Debug, Default)]
pub struct KeyRing {
    pub workflow: BTreeMap<KeyId, WorkflowKey>,
    pub csa: BTreeMap<KeyId, CsaKey>,
    pub p2p: BTreeMap<KeyId, P2PKey>,
    pub eth: BTreeMap<KeyId, EthKey>,
}

/// Serialized plaintext form of [`KeyRing`]; only ever written inside the encrypted blob.
#[derive(Default, Serialize, Deserialize)]
pub struct RawKeyRing {
    pub version: u32,
    pub keys: BTreeMap<KeyKind, BTreeMap<KeyId, Vec<u8>>>,
}

impl Drop for RawKeyRing {
    fn drop(&mut self) {
        for ring in self.keys.values_mut() {
            for value in ring.values_mut() {
                value.zeroize();
            }
        }
    }
}

impl KeyRing {
    pub fn len(&self) -> usize {
        self.workflow.len() + self.csa.len() + self.p2p.len() + self.eth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count(&self, kind: KeyKind) -> usize {
        match kind {
            KeyKind::Workflow => self.workflow.len(),
            KeyKind::Csa => self.csa.len(),
            KeyKind::P2P => self.p2p.len(),
            KeyKind::Eth => self.eth.len(),
        }
    }

    pub fn to_raw(&self) -> RawKeyRing {
        let mut raw = RawKeyRing { version: KEY_RING_VERSION, keys: BTreeMap::new() };
        raw_slot(&mut raw, &self.workflow);
        raw_slot(&mut raw, &self.csa);
        raw_slot(&mut raw, &self.p2p);
        raw_slot(&mut raw, &self.eth);
        raw
    }

    /// Rebuilds typed keys and checks every stored id against the id derived from its material.
    pub fn from_raw(raw: &RawKeyRing) -> Result<Self> {
        if raw.version != KEY_RING_VERSION {
            return Err(NodeError::unsupported_key_ring_format(format!(
                "key ring version {} (expected {})",
                raw.version, KEY_RING_VERSION
            )));
        }
        let mut ring = KeyRing::default();
        typed_slot::<WorkflowKey>(raw, &mut ring)?;
        typed_slot::<CsaKey>(raw, &mut ring)?;
        typed_slot::<P2PKey>(raw, &mut ring)?;
        typed_slot::<EthKey>(raw, &mut ring)?;
        Ok(ring)
    }
}

fn raw_slot<K: TypedKey>(raw: &mut RawKeyRing, keys: &BTreeMap<KeyId, K>) {
    if keys.is_empty() {
        return;
    }
    let slot = raw.keys.entry(K::KIND).or_default();
    for (id, key) in keys {
        slot.insert(id.clone(), key.raw().to_vec());
    }
}

fn typed_slot<K: TypedKey>(raw: &RawKeyRing, ring: &mut KeyRing) -> Result<()> {
    let Some(entries) = raw.keys.get(&K::KIND) else {
        return Ok(());
    };
    if K::KIND.is_singleton() && entries.len() > 1 {
        return Err(NodeError::unsupported_key_ring_format(format!("{} ring holds {} keys", K::KIND, entries.len())));
    }
    let slot = K::slot_mut(ring);
    for (id, material) in entries {
        let key = K::from_raw(material)?;
        if &key.id() != id {
            return Err(NodeError::unsupported_key_ring_format(format!("{} key id {} does not match its material", K::KIND, id)));
        }
        slot.insert(id.clone(), key);
    }
    Ok(())
}
