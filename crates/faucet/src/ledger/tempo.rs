//! [`LedgerClient`] for a Tempo node over JSON-RPC.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};
use std::time::Duration;
use tempo_faucet_common::{Address, Hash};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use super::rpc::JsonRpcClient;
use super::tx::{erc20, LegacyTransaction};
use super::wallet::ServiceWallet;
use super::{LedgerClient, LedgerError, LedgerResult, TokenBalance};
use crate::tokens::{FundingAmount, TokenId};

#[derive(Debug, Clone)]
pub struct LedgerOptions {
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Fixed gas limit for transfers; estimated per transfer when unset.
    pub gas_limit: Option<u64>,
    pub receipt_poll_interval: Duration,
    pub receipt_timeout: Duration,
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            gas_limit: None,
            receipt_poll_interval: Duration::from_millis(500),
            receipt_timeout: Duration::from_secs(30),
        }
    }
}

pub struct TempoLedgerClient {
    rpc: JsonRpcClient,
    wallet: ServiceWallet,
    options: LedgerOptions,
    chain_id: OnceCell<u64>,
    decimals: DashMap<TokenId, u8>,
    /// Next nonce for the service wallet. `None` re-reads it from the node.
    /// Held across signing and submission so transfers go out one at a time.
    nonce: Mutex<Option<u64>>,
}

impl TempoLedgerClient {
    pub fn new(rpc_url: &str, wallet: ServiceWallet, options: LedgerOptions) -> LedgerResult<Self> {
        let rpc = JsonRpcClient::new(rpc_url, options.request_timeout)?;
        info!(address = %wallet.address(), rpc_url, "Ledger client initialized");

        Ok(Self {
            rpc,
            wallet,
            options,
            chain_id: OnceCell::new(),
            decimals: DashMap::new(),
            nonce: Mutex::new(None),
        })
    }

    async fn decimals(&self, token: TokenId) -> LedgerResult<u8> {
        if let Some(decimals) = self.decimals.get(&token) {
            return Ok(*decimals);
        }

        let data = self
            .rpc
            .eth_call(&token.contract(), &erc20::decimals_calldata())
            .await?;
        let decimals = erc20::decode_decimals(&data)?;
        self.decimals.insert(token, decimals);
        Ok(decimals)
    }

    async fn gas_limit(&self, to: &Address, data: &[u8]) -> LedgerResult<u64> {
        match self.options.gas_limit {
            Some(limit) => Ok(limit),
            None => {
                let estimate = self
                    .rpc
                    .estimate_gas(&self.wallet.address(), to, data)
                    .await?;
                // headroom for state changes between estimate and inclusion
                Ok(estimate.saturating_add(estimate / 5))
            }
        }
    }

    /// Sign and submit a contract call, returning its hash once accepted
    /// into the pool.
    async fn submit(&self, to: Address, data: Vec<u8>) -> LedgerResult<Hash> {
        let chain_id = self.chain_id().await?;
        let gas_limit = self.gas_limit(&to, &data).await?;
        let gas_price = self.rpc.gas_price().await?;

        let mut next_nonce = self.nonce.lock().await;
        let nonce = match *next_nonce {
            Some(nonce) => nonce,
            None => self.rpc.transaction_count(&self.wallet.address()).await?,
        };

        let tx = LegacyTransaction {
            nonce,
            gas_price,
            gas_limit,
            to,
            value: 0,
            data,
            chain_id,
        };
        let signed = tx.sign(self.wallet.signing_key())?;

        match self.rpc.send_raw_transaction(&signed.raw).await {
            Ok(hash) => {
                *next_nonce = Some(nonce + 1);
                if hash != signed.hash {
                    warn!(expected = %signed.hash, reported = %hash, "Node reported unexpected transaction hash");
                }
                debug!(%hash, nonce, "Transaction submitted");
                Ok(hash)
            }
            Err(e) => {
                *next_nonce = None;
                Err(e)
            }
        }
    }

    async fn wait_for_receipt(&self, hash: &Hash) -> LedgerResult<()> {
        let poll = async {
            loop {
                if let Some(receipt) = self.rpc.transaction_receipt(hash).await? {
                    return if receipt.succeeded() {
                        Ok(())
                    } else {
                        Err(LedgerError::Rejected(format!("transaction {} reverted", hash)))
                    };
                }
                tokio::time::sleep(self.options.receipt_poll_interval).await;
            }
        };

        tokio::time::timeout(self.options.receipt_timeout, poll)
            .await
            .map_err(|_| LedgerError::Timeout(self.options.receipt_timeout))?
    }
}

#[async_trait]
impl LedgerClient for TempoLedgerClient {
    fn service_address(&self) -> Address {
        self.wallet.address()
    }

    async fn chain_id(&self) -> LedgerResult<u64> {
        self.chain_id
            .get_or_try_init(|| self.rpc.chain_id())
            .await
            .copied()
    }

    async fn balance(&self, token: TokenId) -> LedgerResult<TokenBalance> {
        let decimals = self.decimals(token).await?;
        let data = self
            .rpc
            .eth_call(
                &token.contract(),
                &erc20::balance_of_calldata(&self.wallet.address()),
            )
            .await?;
        Ok(TokenBalance::new(erc20::decode_balance(&data)?, decimals))
    }

    async fn transfer(
        &self,
        token: TokenId,
        recipient: &Address,
        amount: FundingAmount,
    ) -> LedgerResult<Hash> {
        if recipient.is_zero() {
            return Err(LedgerError::InvalidRecipient(
                "cannot transfer to the zero address".to_string(),
            ));
        }
        if *recipient == self.wallet.address() {
            return Err(LedgerError::InvalidRecipient(
                "cannot transfer to the service wallet".to_string(),
            ));
        }

        let decimals = self.decimals(token).await?;
        let units = amount.base_units(decimals).ok_or_else(|| {
            LedgerError::Rejected(format!("{} {} overflows token precision", amount, token))
        })?;

        let hash = self
            .submit(token.contract(), erc20::transfer_calldata(recipient, units))
            .await?;
        info!(%token, %recipient, %amount, %hash, "Token transfer initiated");

        self.wait_for_receipt(&hash).await?;
        info!(%hash, "Token transfer confirmed");
        Ok(hash)
    }

    async fn replenish(&self) -> LedgerResult<Vec<Hash>> {
        let address = self.wallet.address();
        info!(%address, "Requesting funds from native faucet");

        let response: Value = self
            .rpc
            .call("tempo_fundAddress", json!([address.to_checksum()]))
            .await?;

        let hashes = match response {
            Value::Array(items) => items
                .into_iter()
                .map(serde_json::from_value)
                .collect::<Result<Vec<Hash>, _>>(),
            Value::Null => Ok(Vec::new()),
            single => serde_json::from_value(single).map(|hash| vec![hash]),
        }
        .map_err(|e| LedgerError::Unavailable(format!("tempo_fundAddress: {}", e)))?;

        info!(count = hashes.len(), "Service wallet funded");
        Ok(hashes)
    }
}
