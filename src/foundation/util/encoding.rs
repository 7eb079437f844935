use crate::foundation::NodeError;

pub fn strip_hex_prefix(s: &str) -> &str {
    let trimmed = s.trim();
    trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")).unwrap_or(trimmed)
}

pub fn decode_hex(s: &str) -> Result<Vec<u8>, NodeError> {
    hex::decode(strip_hex_prefix(s)).map_err(|e| e.into())
}

/// Decodes exactly `N` bytes of hex, with or without a `0x` prefix.
pub fn parse_hex_fixed<const N: usize>(s: &str) -> Result<[u8; N], NodeError> {
    let bytes = decode_hex(s)?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| NodeError::EncodingError(format!("expected {} bytes of hex, got {}", N, len)))
}

/// Parses an Ethereum JSON-RPC quantity (`"0x1a"`).
pub fn parse_hex_quantity(s: &str) -> Result<u64, NodeError> {
    let digits = strip_hex_prefix(s);
    if digits.is_empty() {
        return Err(NodeError::EncodingError(format!("empty hex quantity: {:?}", s)));
    }
    u64::from_str_radix(digits, 16).map_err(|err| NodeError::EncodingError(format!("invalid hex quantity {:?}: {}", s, err)))
}

pub fn format_hex_quantity(value: u64) -> String {
    format!("0x{:x}", value)
}
