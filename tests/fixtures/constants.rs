#![allow(dead_code)]

use oracle_node_core::foundation::{Address, ChainId};

pub const TEST_CHAIN_ID: ChainId = 1337;
pub const TEST_PASSWORD: &str = "correct horse battery staple";
pub const TEST_EXPORT_PASSWORD: &str = "export-password";
pub const TEST_EMITTER: Address = Address::new([0xE1; 20]);
pub const TEST_EVENT: &str = "Emitted(uint256)";
