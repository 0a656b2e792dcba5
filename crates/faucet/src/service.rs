//! Faucet service core logic

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tempo_faucet_common::Address;
use tracing::{info, warn};

use crate::error::{FaucetError, FaucetResult};
use crate::ledger::{LedgerClient, TokenBalance};
use crate::metrics;
use crate::orchestrator::{FundingOrchestrator, FundingRequest, TransferResult};
use crate::quota::{QuotaPolicy, QuotaSnapshot, RateLimiter};
use crate::tokens::TokenId;

/// Quota left after a successful request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaRemaining {
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FundingReceipt {
    pub transfer: TransferResult,
    pub quota: QuotaRemaining,
}

/// Rate limiter admission in front of the funding workflow.
pub struct FaucetService {
    limiter: RateLimiter,
    orchestrator: FundingOrchestrator,
}

impl FaucetService {
    pub fn new(limiter: RateLimiter, orchestrator: FundingOrchestrator) -> Self {
        Self {
            limiter,
            orchestrator,
        }
    }

    pub fn policy(&self) -> &QuotaPolicy {
        self.limiter.policy()
    }

    fn ledger(&self) -> &Arc<dyn LedgerClient> {
        self.orchestrator.ledger()
    }

    /// Consume one quota slot for the recipient and send the tokens.
    ///
    /// The slot stays consumed when the transfer fails.
    pub async fn request_funding(&self, request: &FundingRequest) -> FaucetResult<FundingReceipt> {
        let token = request.token.name();
        let address = request.recipient.to_checksum();

        let decision = self
            .limiter
            .check_and_consume(&address)
            .await
            .map_err(|e| {
                metrics::record_funding(token, "store_unavailable");
                FaucetError::from(e)
            })?;

        if !decision.allowed {
            warn!(%address, reset_at = %decision.reset_at, "Rate limit exceeded");
            metrics::RATE_LIMIT_DENIALS_TOTAL.inc();
            metrics::record_funding(token, "rate_limited");
            return Err(FaucetError::RateLimitExceeded {
                reset_at: decision.reset_at,
                remaining: decision.remaining,
            });
        }

        info!(%address, token, amount = %request.amount, "Processing funding request");

        match self.orchestrator.fund(request).await {
            Ok(transfer) => {
                metrics::record_funding(token, "success");
                Ok(FundingReceipt {
                    transfer,
                    quota: QuotaRemaining {
                        remaining: decision.remaining,
                        reset_at: decision.reset_at,
                    },
                })
            }
            Err(e) => {
                metrics::record_funding(token, &e.code().to_lowercase());
                Err(e)
            }
        }
    }

    /// Read-only quota status; accepts any address string.
    pub async fn inspect_quota(&self, address: &str) -> FaucetResult<QuotaSnapshot> {
        Ok(self.limiter.inspect(address).await?)
    }

    pub async fn balance(&self, token: TokenId) -> FaucetResult<TokenBalance> {
        Ok(self.ledger().balance(token).await?)
    }

    pub async fn chain_id(&self) -> FaucetResult<u64> {
        Ok(self.ledger().chain_id().await?)
    }

    pub fn service_address(&self) -> Address {
        self.ledger().service_address()
    }
}
