use crate::infrastructure::config::types::{AppConfig, KeystoreBackend};

const MIN_POLL_PERIOD_MS: u64 = 100;
const MAX_BACKFILL_BATCH_SIZE: u64 = 10_000;

impl AppConfig {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let poller = &self.log_poller;
        if poller.chain_id == 0 {
            errors.push("log_poller.chain_id must be set".to_string());
        }
        if poller.poll_period_ms < MIN_POLL_PERIOD_MS {
            errors.push(format!("log_poller.poll_period_ms must be >= {}", MIN_POLL_PERIOD_MS));
        }
        if !poller.use_finality_tag && poller.finality_depth == 0 {
            errors.push("log_poller.finality_depth must be > 0 unless use_finality_tag is set".to_string());
        }
        if poller.backfill_batch_size == 0 || poller.backfill_batch_size > MAX_BACKFILL_BATCH_SIZE {
            errors.push(format!("log_poller.backfill_batch_size must be within 1..={}", MAX_BACKFILL_BATCH_SIZE));
        }
        if poller.keep_finalized_blocks_depth > 0 && poller.prune_period_secs == 0 {
            errors.push("log_poller.prune_period_secs must be > 0 when pruning is enabled".to_string());
        }

        if self.rpc.endpoints.is_empty() {
            errors.push("rpc.endpoints must list at least one endpoint".to_string());
        }
        for url in &self.rpc.endpoints {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(format!("invalid rpc.endpoints entry (expected http(s) url): {}", url));
            }
        }
        if self.rpc.retry_attempts == 0 {
            errors.push("rpc.retry_attempts must be > 0".to_string());
        }
        if self.rpc.request_timeout_ms == 0 {
            errors.push("rpc.request_timeout_ms must be > 0".to_string());
        }
        if self.rpc.circuit_breaker.failure_threshold == 0 {
            errors.push("rpc.circuit_breaker.failure_threshold must be > 0".to_string());
        }

        if let Err(err) = self.keystore.kdf.validate() {
            errors.push(format!("keystore.kdf: {}", err));
        }
        if self.keystore.backend == KeystoreBackend::Rocks && self.keystore.path.is_some() {
            errors.push("keystore.path only applies to the file backend".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
