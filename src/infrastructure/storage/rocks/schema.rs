use crate::foundation::ChainId;

/// Helper to build storage keys consistently.
pub struct KeyBuilder {
    buf: Vec<u8>,
}

impl KeyBuilder {
    pub fn with_capacity(cap: usize) -> Self {
        Self { buf: Vec::with_capacity(cap) }
    }

    pub fn prefix(mut self, prefix: &[u8]) -> Self {
        self.buf.extend_from_slice(prefix);
        self
    }

    pub fn str(mut self, value: &str) -> Self {
        self.buf.extend_from_slice(value.as_bytes());
        self
    }

    pub fn u64_be(mut self, value: u64) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn sep(mut self) -> Self {
        self.buf.push(b':');
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

pub const CF_DEFAULT: &str = "default";
pub const CF_METADATA: &str = "metadata";
pub const CF_BLOCKS: &str = "blocks";
pub const CF_LOGS: &str = "logs";
pub const CF_FILTERS: &str = "filters";
pub const CF_KEYRING: &str = "keyring";

/// Every column family the node opens, in creation order.
pub const COLUMN_FAMILIES: [&str; 6] = [CF_DEFAULT, CF_METADATA, CF_BLOCKS, CF_LOGS, CF_FILTERS, CF_KEYRING];

pub const PREFIX_BLOCK: &[u8] = b"blk:";
pub const PREFIX_LOG: &[u8] = b"log:";
pub const PREFIX_FILTER: &[u8] = b"flt:";
pub const KEY_SCHEMA_VERSION: &[u8] = b"schema_version";
pub const KEY_KEYRING: &[u8] = b"keyring";

/// Big-endian numbers keep RocksDB's byte order equal to numeric order.
pub fn key_block(chain_id: ChainId, number: u64) -> Vec<u8> {
    KeyBuilder::with_capacity(4 + 8 + 8).prefix(PREFIX_BLOCK).u64_be(chain_id).u64_be(number).build()
}

pub fn key_block_prefix(chain_id: ChainId) -> Vec<u8> {
    KeyBuilder::with_capacity(4 + 8).prefix(PREFIX_BLOCK).u64_be(chain_id).build()
}

pub fn key_log(chain_id: ChainId, block_number: u64, log_index: u64) -> Vec<u8> {
    KeyBuilder::with_capacity(4 + 8 + 8 + 8).prefix(PREFIX_LOG).u64_be(chain_id).u64_be(block_number).u64_be(log_index).build()
}

pub fn key_log_prefix(chain_id: ChainId) -> Vec<u8> {
    KeyBuilder::with_capacity(4 + 8).prefix(PREFIX_LOG).u64_be(chain_id).build()
}

pub fn key_filter(chain_id: ChainId, name: &str) -> Vec<u8> {
    KeyBuilder::with_capacity(4 + 8 + 1 + name.len()).prefix(PREFIX_FILTER).u64_be(chain_id).sep().str(name).build()
}

pub fn key_filter_prefix(chain_id: ChainId) -> Vec<u8> {
    KeyBuilder::with_capacity(4 + 8 + 1).prefix(PREFIX_FILTER).u64_be(chain_id).sep().build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_keys_sort_numerically() {
        assert!(key_block(1, 9) < key_block(1, 10));
        assert!(key_block(1, u64::MAX) < key_block(2, 0));
        assert!(key_log(1, 5, 300) < key_log(1, 6, 0));
        assert!(key_block(7, 3).starts_with(&key_block_prefix(7)));
    }
}
