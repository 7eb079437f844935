//! Argon2id password hashing shared by the key ring blob and key exports.

use crate::foundation::{NodeError, Result};
use argon2::{Algorithm, Argon2, ParamsBuilder, Version};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

pub const SALT_LEN: usize = 32;

/// Upper bound for each parameter, as a multiple of the default.
const LIMIT_FACTOR: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argon2Params {
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self { m_cost: 65536, t_cost: 3, p_cost: 4 }
    }
}

impl Argon2Params {
    /// Cheap parameters for tests and throwaway keystores. Never use for real key material.
    pub const fn fast() -> Self {
        Self { m_cost: 256, t_cost: 1, p_cost: 1 }
    }

    /// Largest parameters this crate will derive with. Blobs and exports carry their own
    /// parameters, so anything above this is refused before memory is allocated.
    pub fn limits() -> Self {
        let default = Self::default();
        Self {
            m_cost: default.m_cost * LIMIT_FACTOR,
            t_cost: default.t_cost * LIMIT_FACTOR,
            p_cost: default.p_cost * LIMIT_FACTOR,
        }
    }

    pub fn within_limits(&self) -> bool {
        let limits = Self::limits();
        self.m_cost <= limits.m_cost && self.t_cost <= limits.t_cost && self.p_cost <= limits.p_cost
    }

    pub fn validate(&self) -> Result<()> {
        self.builder().map(|_| ())
    }

    fn builder(&self) -> Result<argon2::Params> {
        if !self.within_limits() {
            let limits = Self::limits();
            return Err(NodeError::crypto(
                "argon2 params",
                format!(
                    "m_cost={} t_cost={} p_cost={} exceed limits m_cost={} t_cost={} p_cost={}",
                    self.m_cost, self.t_cost, self.p_cost, limits.m_cost, limits.t_cost, limits.p_cost
                ),
            ));
        }
        ParamsBuilder::new()
            .m_cost(self.m_cost)
            .t_cost(self.t_cost)
            .p_cost(self.p_cost)
            .build()
            .map_err(|e| NodeError::crypto("argon2 params", e.to_string()))
    }
}

pub fn derive_key(password: &[u8], salt: &[u8], params: &Argon2Params) -> Result<Zeroizing<[u8; 32]>> {
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.builder()?);
    let mut key = Zeroizing::new([0u8; 32]);
    argon2.hash_password_into(password, salt, &mut key[..]).map_err(|e| NodeError::crypto("argon2 derive", e.to_string()))?;
    Ok(key)
}
