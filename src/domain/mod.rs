//! Domain layer: key material and chain data models, free of storage and transport concerns.

pub mod keys;
pub mod logpoller;

pub use keys::{CsaKey, EthKey, KeyKind, KeyRing, P2PKey, RawKeyRing, TypedKey, WorkflowKey};
pub use logpoller::{Block, BlockTag, Confirmations, Filter, Log, LogQuery, LogRange, PollPhase, StoredBlock};
