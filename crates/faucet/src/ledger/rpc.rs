//! Minimal Ethereum JSON-RPC client.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tempo_faucet_common::{Address, Hash};
use tracing::trace;

use super::{LedgerError, LedgerResult};

/// JSON-RPC error object.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl RpcErrorObject {
    /// Execution reverts come back as code 3, or as a generic server error
    /// whose message mentions the revert.
    fn is_rejection(&self) -> bool {
        self.code == 3 || self.message.to_lowercase().contains("revert")
    }

    fn describe(&self) -> String {
        match &self.data {
            Some(Value::String(data)) => format!("{} ({})", self.message, data),
            _ => self.message.clone(),
        }
    }
}

impl From<RpcErrorObject> for LedgerError {
    fn from(err: RpcErrorObject) -> Self {
        if err.is_rejection() {
            LedgerError::Rejected(err.describe())
        } else {
            LedgerError::Unavailable(format!("{} (code {})", err.describe(), err.code))
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

/// Receipt fields the faucet cares about.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: Hash,
    #[serde(default)]
    pub status: Option<String>,
}

impl TransactionReceipt {
    /// Post-Byzantium status; receipts without one count as success.
    pub fn succeeded(&self) -> bool {
        !matches!(self.status.as_deref(), Some("0x0") | Some("0x00"))
    }
}

/// RPC client for interacting with the chain
pub struct JsonRpcClient {
    rpc_url: String,
    client: reqwest::Client,
    timeout: Duration,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(rpc_url: impl Into<String>, timeout: Duration) -> LedgerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Unavailable(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            rpc_url: rpc_url.into(),
            client,
            timeout,
            next_id: AtomicU64::new(1),
        })
    }

    /// Issue a call and decode its `result`.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> LedgerResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id
        });

        trace!(method, id, "RPC call");

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.transport_error(method, e))?;

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| self.transport_error(method, e))?;

        if let Some(error) = body.error {
            return Err(error.into());
        }

        serde_json::from_value(body.result.unwrap_or(Value::Null)).map_err(|e| {
            LedgerError::Unavailable(format!("{}: unexpected result: {}", method, e))
        })
    }

    fn transport_error(&self, method: &str, err: reqwest::Error) -> LedgerError {
        if err.is_timeout() {
            LedgerError::Timeout(self.timeout)
        } else {
            LedgerError::Unavailable(format!("{}: {}", method, err))
        }
    }

    pub async fn chain_id(&self) -> LedgerResult<u64> {
        let result: String = self.call("eth_chainId", json!([])).await?;
        parse_quantity(&result).map(|v| v as u64)
    }

    pub async fn gas_price(&self) -> LedgerResult<u128> {
        let result: String = self.call("eth_gasPrice", json!([])).await?;
        parse_quantity(&result)
    }

    pub async fn transaction_count(&self, address: &Address) -> LedgerResult<u64> {
        let result: String = self
            .call("eth_getTransactionCount", json!([address.to_hex(), "pending"]))
            .await?;
        parse_quantity(&result).map(|v| v as u64)
    }

    pub async fn estimate_gas(&self, from: &Address, to: &Address, data: &[u8]) -> LedgerResult<u64> {
        let result: String = self
            .call(
                "eth_estimateGas",
                json!([{
                    "from": from.to_hex(),
                    "to": to.to_hex(),
                    "data": format!("0x{}", hex::encode(data)),
                }]),
            )
            .await?;
        parse_quantity(&result).map(|v| v as u64)
    }

    /// `eth_call` against the latest block, returning raw return data.
    pub async fn eth_call(&self, to: &Address, data: &[u8]) -> LedgerResult<Vec<u8>> {
        let result: String = self
            .call(
                "eth_call",
                json!([{
                    "to": to.to_hex(),
                    "data": format!("0x{}", hex::encode(data)),
                }, "latest"]),
            )
            .await?;
        hex::decode(result.trim_start_matches("0x"))
            .map_err(|e| LedgerError::Unavailable(format!("eth_call: bad return data: {}", e)))
    }

    pub async fn send_raw_transaction(&self, raw: &[u8]) -> LedgerResult<Hash> {
        self.call(
            "eth_sendRawTransaction",
            json!([format!("0x{}", hex::encode(raw))]),
        )
        .await
    }

    pub async fn transaction_receipt(&self, hash: &Hash) -> LedgerResult<Option<TransactionReceipt>> {
        self.call("eth_getTransactionReceipt", json!([hash.to_string()]))
            .await
    }
}

/// Parse a hex `QUANTITY` such as `0x1a`.
pub(crate) fn parse_quantity(value: &str) -> LedgerResult<u128> {
    let digits = value.trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| LedgerError::Unavailable(format!("bad quantity '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x").unwrap(), 0);
        assert_eq!(parse_quantity("0xa455").unwrap(), 42069);
        assert!(parse_quantity("0xnope").is_err());
    }

    #[test]
    fn test_revert_maps_to_rejection() {
        let err: RpcErrorObject = serde_json::from_value(json!({
            "code": 3,
            "message": "execution reverted",
            "data": "0x08c379a0"
        }))
        .unwrap();
        assert_eq!(
            LedgerError::from(err),
            LedgerError::Rejected("execution reverted (0x08c379a0)".to_string())
        );

        let err: RpcErrorObject = serde_json::from_value(json!({
            "code": -32000,
            "message": "Execution Reverted: insufficient balance"
        }))
        .unwrap();
        assert!(matches!(LedgerError::from(err), LedgerError::Rejected(_)));
    }

    #[test]
    fn test_other_errors_are_unavailable() {
        let err: RpcErrorObject = serde_json::from_value(json!({
            "code": -32601,
            "message": "method not found"
        }))
        .unwrap();
        assert_eq!(
            LedgerError::from(err),
            LedgerError::Unavailable("method not found (code -32601)".to_string())
        );
    }

    #[test]
    fn test_receipt_status() {
        let receipt: TransactionReceipt = serde_json::from_value(json!({
            "transactionHash": format!("0x{}", "ab".repeat(32)),
            "status": "0x0",
            "blockNumber": "0x10"
        }))
        .unwrap();
        assert!(!receipt.succeeded());

        let receipt: TransactionReceipt = serde_json::from_value(json!({
            "transactionHash": format!("0x{}", "ab".repeat(32)),
            "status": "0x1"
        }))
        .unwrap();
        assert!(receipt.succeeded());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_unavailable() {
        let client = JsonRpcClient::new("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();
        let result = client.chain_id().await;
        assert!(matches!(
            result,
            Err(LedgerError::Unavailable(_)) | Err(LedgerError::Timeout(_))
        ));
    }
}
