//! Ethereum JSON-RPC over HTTP.

use super::ChainClient;
use crate::domain::logpoller::{Block, BlockTag, Log, LogQuery, LogRange};
use crate::foundation::util::encoding::{decode_hex, format_hex_quantity, parse_hex_quantity};
use crate::foundation::{Address, BlockHash, ChainId, NodeError, Result, Topic, TxHash};
use async_trait::async_trait;
use log::{debug, trace};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcBlock {
    number: String,
    hash: String,
    parent_hash: String,
    timestamp: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    block_number: String,
    block_hash: String,
    transaction_hash: String,
    log_index: String,
    address: String,
    topics: Vec<String>,
    data: String,
    #[serde(default)]
    block_timestamp: Option<String>,
    #[serde(default)]
    removed: bool,
}

pub struct JsonRpcChainClient {
    client: reqwest::Client,
    url: String,
    chain_id: ChainId,
    next_id: AtomicU64,
}

impl JsonRpcChainClient {
    pub fn new(url: impl Into<String>, chain_id: ChainId, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| NodeError::ConfigError(format!("failed to build http client: {}", e)))?;
        Ok(Self { client, url: url.into(), chain_id, next_id: AtomicU64::new(1) })
    }

    /// Builds a client and checks `eth_chainId` against `expected_chain_id`.
    pub async fn connect(url: impl Into<String>, expected_chain_id: ChainId, request_timeout: Duration) -> Result<Self> {
        let client = Self::new(url, expected_chain_id, request_timeout)?;
        let reported: String = client.call("eth_chainId", json!([])).await?.ok_or_else(|| {
            NodeError::chain_invalid_response("eth_chainId", "null result")
        })?;
        let reported = parse_hex_quantity(&reported).map_err(|e| NodeError::chain_invalid_response("eth_chainId", e.to_string()))?;
        if reported != expected_chain_id {
            return Err(NodeError::ConfigError(format!(
                "endpoint {} reports chain id {} but {} is configured",
                client.url, reported, expected_chain_id
            )));
        }
        Ok(client)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest { jsonrpc: "2.0", id, method, params };
        trace!("json-rpc request url={} method={} id={}", self.url, method, id);

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| NodeError::chain_transient(method, e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(NodeError::chain_transient(method, format!("http status {}", status)));
        }
        let body = response.text().await.map_err(|e| NodeError::chain_transient(method, e.to_string()))?;
        let parsed: JsonRpcResponse =
            serde_json::from_str(&body).map_err(|e| NodeError::chain_invalid_response(method, format!("malformed envelope: {}", e)))?;
        if let Some(err) = parsed.error {
            debug!("json-rpc error url={} method={} code={} message={}", self.url, method, err.code, err.message);
            return Err(NodeError::chain_transient(method, format!("rpc error {}: {}", err.code, err.message)));
        }
        match parsed.result {
            None | Some(Value::Null) => Ok(None),
            Some(value) => {
                serde_json::from_value(value).map(Some).map_err(|e| NodeError::chain_invalid_response(method, e.to_string()))
            }
        }
    }

    async fn block(&self, method: &str, params: Value, what: String) -> Result<Block> {
        let raw: RpcBlock =
            self.call(method, params).await?.ok_or_else(|| NodeError::chain_transient(method, format!("{} not found", what)))?;
        convert_block(method, raw)
    }
}

fn tag_param(tag: BlockTag) -> String {
    match tag {
        BlockTag::Latest => "latest".to_string(),
        BlockTag::Finalized => "finalized".to_string(),
        BlockTag::Number(n) => format_hex_quantity(n),
    }
}

fn convert_block(method: &str, raw: RpcBlock) -> Result<Block> {
    let invalid = |e: NodeError| NodeError::chain_invalid_response(method, e.to_string());
    Ok(Block {
        number: parse_hex_quantity(&raw.number).map_err(invalid)?,
        hash: raw.hash.parse::<BlockHash>().map_err(invalid)?,
        parent_hash: raw.parent_hash.parse::<BlockHash>().map_err(invalid)?,
        timestamp: parse_hex_quantity(&raw.timestamp).map_err(invalid)?,
    })
}

fn convert_log(raw: RpcLog) -> Result<Log> {
    let invalid = |e: NodeError| NodeError::chain_invalid_response("eth_getLogs", e.to_string());
    Ok(Log {
        block_number: parse_hex_quantity(&raw.block_number).map_err(invalid)?,
        block_hash: raw.block_hash.parse::<BlockHash>().map_err(invalid)?,
        block_timestamp: raw.block_timestamp.as_deref().map(parse_hex_quantity).transpose().map_err(invalid)?.unwrap_or(0),
        tx_hash: raw.transaction_hash.parse::<TxHash>().map_err(invalid)?,
        log_index: parse_hex_quantity(&raw.log_index).map_err(invalid)?,
        address: raw.address.parse::<Address>().map_err(invalid)?,
        topics: raw.topics.iter().map(|t| t.parse::<Topic>()).collect::<Result<Vec<_>>>().map_err(invalid)?,
        data: decode_hex(&raw.data).map_err(invalid)?,
    })
}

fn logs_filter(query: &LogQuery) -> Value {
    let mut filter = serde_json::Map::new();
    match query.range {
        LogRange::Blocks { from, to } => {
            filter.insert("fromBlock".to_string(), Value::String(format_hex_quantity(from)));
            filter.insert("toBlock".to_string(), Value::String(format_hex_quantity(to)));
        }
        LogRange::BlockHash(hash) => {
            filter.insert("blockHash".to_string(), Value::String(hash.to_string()));
        }
    }
    if !query.addresses.is_empty() {
        filter.insert("address".to_string(), json!(query.addresses.iter().map(|a| a.to_string()).collect::<Vec<_>>()));
    }
    if !query.event_sigs.is_empty() {
        filter.insert("topics".to_string(), json!([query.event_sigs.iter().map(|s| s.to_string()).collect::<Vec<_>>()]));
    }
    Value::Object(filter)
}

#[async_trait]
impl ChainClient for JsonRpcChainClient {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn header_by_number(&self, tag: BlockTag) -> Result<Block> {
        let param = tag_param(tag);
        self.block("eth_getBlockByNumber", json!([param, false]), format!("block {}", param)).await
    }

    async fn header_by_hash(&self, hash: &BlockHash) -> Result<Block> {
        self.block("eth_getBlockByHash", json!([hash.to_string(), false]), format!("block {}", hash)).await
    }

    async fn filter_logs(&self, query: &LogQuery) -> Result<Vec<Log>> {
        let raw: Vec<RpcLog> = self.call("eth_getLogs", json!([logs_filter(query)])).await?.unwrap_or_default();
        raw.into_iter().filter(|log| !log.removed).map(convert_log).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_conversion_parses_quantities_and_hashes() {
        let raw = RpcBlock {
            number: "0x1b4".to_string(),
            hash: format!("0x{}", "ab".repeat(32)),
            parent_hash: format!("0x{}", "cd".repeat(32)),
            timestamp: "0x5f5e100".to_string(),
        };
        let block = convert_block("eth_getBlockByNumber", raw).expect("convert");
        assert_eq!(block.number, 436);
        assert_eq!(block.timestamp, 100_000_000);
        assert_eq!(block.hash, BlockHash::new([0xab; 32]));
    }

    #[test]
    fn malformed_hash_is_invalid_response() {
        let raw = RpcBlock {
            number: "0x1".to_string(),
            hash: "0x1234".to_string(),
            parent_hash: format!("0x{}", "00".repeat(32)),
            timestamp: "0x0".to_string(),
        };
        let err = convert_block("eth_getBlockByNumber", raw).expect_err("short hash");
        assert!(matches!(err, NodeError::ChainClientInvalidResponse { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn log_filter_uses_topic0_alternatives() {
        let query = LogQuery {
            range: LogRange::Blocks { from: 1, to: 16 },
            addresses: vec![Address::new([1; 20])],
            event_sigs: vec![Topic::new([2; 32]), Topic::new([3; 32])],
        };
        let filter = logs_filter(&query);
        assert_eq!(filter["fromBlock"], "0x1");
        assert_eq!(filter["toBlock"], "0x10");
        assert_eq!(filter["topics"][0].as_array().map(|a| a.len()), Some(2));
    }

    #[test]
    fn log_conversion_reads_camel_case_fields() {
        let raw: RpcLog = serde_json::from_value(json!({
            "blockNumber": "0xa",
            "blockHash": format!("0x{}", "11".repeat(32)),
            "transactionHash": format!("0x{}", "22".repeat(32)),
            "logIndex": "0x3",
            "address": format!("0x{}", "33".repeat(20)),
            "topics": [format!("0x{}", "44".repeat(32))],
            "data": "0x0102",
        }))
        .expect("deserialize");
        let log = convert_log(raw).expect("convert");
        assert_eq!(log.block_number, 10);
        assert_eq!(log.log_index, 3);
        assert_eq!(log.data, vec![1, 2]);
        assert_eq!(log.block_timestamp, 0);
    }
}
