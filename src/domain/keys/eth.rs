use super::{random_seed, raw_seed, KeyKind, KeyRing, TypedKey};
use crate::foundation::{Address, KeyId, NodeError, Result};
use secp256k1::ecdsa::RecoverableSignature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha3::{Digest, Keccak256};
use std::collections::BTreeMap;
use std::fmt;
use zeroize::Zeroizing;

// A uniformly random 32-byte string is a valid secp256k1 scalar with overwhelming probability.
const MAX_GENERATE_ATTEMPTS: usize = 8;

/// secp256k1 transmitter key; its id is the checksum-free lowercase EVM address.
#[derive(Clone)]
pub struct EthKey {
    secret: SecretKey,
    public: PublicKey,
    address: Address,
}

impl EthKey {
    pub fn address(&self) -> Address {
        self.address
    }

    /// Uncompressed public key without the `0x04` tag.
    pub fn public_key_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out.copy_from_slice(&self.public.serialize_uncompressed()[1..]);
        out
    }

    /// Signs a 32-byte digest; returns `r || s || recovery_id`.
    pub fn sign_hash(&self, digest: &[u8; 32]) -> [u8; 65] {
        let secp = Secp256k1::signing_only();
        let signature = secp.sign_ecdsa_recoverable(&Message::from_digest(*digest), &self.secret);
        let (recovery_id, compact) = signature.serialize_compact();
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&compact);
        out[64] = recovery_id.to_i32() as u8;
        out
    }

    /// Recovers the signer address of a signature produced by [`EthKey::sign_hash`].
    pub fn recover_address(digest: &[u8; 32], signature: &[u8; 65]) -> Result<Address> {
        let recovery_id = secp256k1::ecdsa::RecoveryId::from_i32(i32::from(signature[64]))?;
        let recoverable = RecoverableSignature::from_compact(&signature[..64], recovery_id)?;
        let public = Secp256k1::verification_only().recover_ecdsa(&Message::from_digest(*digest), &recoverable)?;
        Ok(address_from_public(&public))
    }
}

fn address_from_public(public: &PublicKey) -> Address {
    let hash = Keccak256::digest(&public.serialize_uncompressed()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    Address::new(address)
}

impl TypedKey for EthKey {
    const KIND: KeyKind = KeyKind::Eth;

    fn generate() -> Result<Self> {
        for _ in 0..MAX_GENERATE_ATTEMPTS {
            if let Ok(key) = Self::from_raw(&random_seed()[..]) {
                return Ok(key);
            }
        }
        Err(NodeError::crypto("eth key generation", "no valid secp256k1 scalar produced"))
    }

    fn from_raw(raw: &[u8]) -> Result<Self> {
        let seed = raw_seed(Self::KIND, raw)?;
        let secret = SecretKey::from_slice(&seed[..]).map_err(|e| NodeError::invalid_key_material(Self::KIND.as_str(), e.to_string()))?;
        let public = PublicKey::from_secret_key(&Secp256k1::signing_only(), &secret);
        let address = address_from_public(&public);
        Ok(Self { secret, public, address })
    }

    fn raw(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.secret.secret_bytes().to_vec())
    }

    fn id(&self) -> KeyId {
        KeyId::new(self.address.to_string())
    }

    fn public_key_hex(&self) -> String {
        hex::encode(self.public_key_bytes())
    }

    fn slot(ring: &KeyRing) -> &BTreeMap<KeyId, Self> {
        &ring.eth
    }

    fn slot_mut(ring: &mut KeyRing) -> &mut BTreeMap<KeyId, Self> {
        &mut ring.eth
    }
}

impl fmt::Debug for EthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EthKey {{ address: {} }}", self.address)
    }
}
