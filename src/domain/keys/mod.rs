//! Typed key material held by the keystore.
//!
//! Every key type carries 32 bytes of raw private material and derives its id from the public key.
//! Workflow and CSA rings hold at most one key; P2P and Eth rings hold any number.

mod csa;
mod eth;
mod p2p;
mod ring;
mod workflow;

pub use csa::CsaKey;
pub use eth::EthKey;
pub use p2p::P2PKey;
pub use ring::{KeyRing, RawKeyRing};
pub use workflow::{seal_to, WorkflowKey};

use crate::foundation::{KeyId, NodeError, Result, KEY_RAW_LEN};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use zeroize::Zeroizing;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    Workflow,
    Csa,
    P2P,
    Eth,
}

impl KeyKind {
    pub const ALL: [KeyKind; 4] = [KeyKind::Workflow, KeyKind::Csa, KeyKind::P2P, KeyKind::Eth];

    pub const fn as_str(self) -> &'static str {
        match self {
            KeyKind::Workflow => "workflow",
            KeyKind::Csa => "csa",
            KeyKind::P2P => "p2p",
            KeyKind::Eth => "eth",
        }
    }

    /// Singleton rings reject a second key.
    pub const fn is_singleton(self) -> bool {
        matches!(self, KeyKind::Workflow | KeyKind::Csa)
    }

    /// Prefix mixed into export passwords so a blob exported for one key type never decrypts as another.
    pub const fn password_domain(self) -> &'static str {
        match self {
            KeyKind::Workflow => "workflowkey",
            KeyKind::Csa => "csakey",
            KeyKind::P2P => "p2pkey",
            KeyKind::Eth => "ethkey",
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for KeyKind {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "workflow" => Ok(KeyKind::Workflow),
            "csa" => Ok(KeyKind::Csa),
            "p2p" => Ok(KeyKind::P2P),
            "eth" | "evm" => Ok(KeyKind::Eth),
            other => Err(NodeError::Message(format!("unknown key type: {other}"))),
        }
    }
}

/// A key type that can live in the key ring.
///
/// `slot`/`slot_mut` select this type's map inside [`KeyRing`], which lets one generic store
/// implementation serve every key type.
pub trait TypedKey: Clone + fmt::Debug + Send + Sync + 'static {
    const KIND: KeyKind;

    fn generate() -> Result<Self>;

    fn from_raw(raw: &[u8]) -> Result<Self>;

    fn raw(&self) -> Zeroizing<Vec<u8>>;

    fn id(&self) -> KeyId;

    fn public_key_hex(&self) -> String;

    fn slot(ring: &KeyRing) -> &BTreeMap<KeyId, Self>;

    fn slot_mut(ring: &mut KeyRing) -> &mut BTreeMap<KeyId, Self>;
}

pub(crate) fn random_seed() -> Zeroizing<[u8; KEY_RAW_LEN]> {
    let mut seed = Zeroizing::new([0u8; KEY_RAW_LEN]);
    OsRng.fill_bytes(&mut seed[..]);
    seed
}

pub(crate) fn raw_seed(kind: KeyKind, raw: &[u8]) -> Result<Zeroizing<[u8; KEY_RAW_LEN]>> {
    if raw.len() != KEY_RAW_LEN {
        return Err(NodeError::invalid_key_material(kind.as_str(), format!("expected {} raw bytes, got {}", KEY_RAW_LEN, raw.len())));
    }
    let mut seed = Zeroizing::new([0u8; KEY_RAW_LEN]);
    seed.copy_from_slice(raw);
    Ok(seed)
}
