//! Balance check, replenishment and transfer for an admitted request.

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempo_faucet_common::{Address, Hash};
use tracing::{debug, info, warn};

use crate::error::{FaucetError, FaucetResult};
use crate::ledger::{LedgerClient, LedgerError, LedgerResult, TokenBalance};
use crate::metrics;
use crate::tokens::{FundingAmount, TokenId};

/// A validated request to fund `recipient`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundingRequest {
    pub recipient: Address,
    pub token: TokenId,
    pub amount: FundingAmount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    pub tx_hash: Hash,
    pub amount: FundingAmount,
    pub token: TokenId,
    pub recipient: Address,
}

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorOptions {
    /// Bound on balance reads and replenishment.
    pub call_timeout: Duration,
    /// Bound on a transfer including its receipt.
    pub transfer_timeout: Duration,
    pub replenish_grace: Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(10),
            transfer_timeout: Duration::from_secs(60),
            replenish_grace: Duration::from_secs(2),
        }
    }
}

/// Runs the funding workflow for requests that already passed the rate
/// limiter. Performs at most one replenishment and at most one transfer.
pub struct FundingOrchestrator {
    ledger: Arc<dyn LedgerClient>,
    options: OrchestratorOptions,
}

impl FundingOrchestrator {
    pub fn new(ledger: Arc<dyn LedgerClient>, options: OrchestratorOptions) -> Self {
        Self { ledger, options }
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.ledger
    }

    pub async fn fund(&self, request: &FundingRequest) -> FaucetResult<TransferResult> {
        let FundingRequest {
            recipient,
            token,
            amount,
        } = *request;

        self.check_recipient(&recipient)?;

        let balance = self.balance(token).await?;
        debug!(%token, %amount, %balance, "Preparing token transfer");

        if !balance.covers(amount) {
            warn!(%token, %balance, "Insufficient balance, requesting funds from native faucet");
            self.replenish().await?;

            if !self.options.replenish_grace.is_zero() {
                tokio::time::sleep(self.options.replenish_grace).await;
            }

            let balance = self.balance(token).await?;
            if !balance.covers(amount) {
                return Err(FaucetError::InsufficientFunds {
                    token,
                    required: amount,
                    available: balance,
                });
            }
        }

        let started = Instant::now();
        let tx_hash = with_timeout(
            self.options.transfer_timeout,
            self.ledger.transfer(token, &recipient, amount),
        )
        .await?;
        metrics::TRANSFER_DURATION.observe(started.elapsed().as_secs_f64());

        info!(%token, %recipient, %amount, %tx_hash, "Token transfer confirmed");
        Ok(TransferResult {
            tx_hash,
            amount,
            token,
            recipient,
        })
    }

    fn check_recipient(&self, recipient: &Address) -> FaucetResult<()> {
        if recipient.is_zero() {
            return Err(FaucetError::InvalidRecipient(
                "cannot fund the zero address".to_string(),
            ));
        }
        if *recipient == self.ledger.service_address() {
            return Err(FaucetError::InvalidRecipient(
                "cannot fund the service wallet".to_string(),
            ));
        }
        Ok(())
    }

    async fn balance(&self, token: TokenId) -> FaucetResult<TokenBalance> {
        Ok(with_timeout(self.options.call_timeout, self.ledger.balance(token)).await?)
    }

    async fn replenish(&self) -> FaucetResult<()> {
        match with_timeout(self.options.call_timeout, self.ledger.replenish()).await {
            Ok(hashes) => {
                metrics::record_replenish(true);
                info!(count = hashes.len(), "Service wallet replenished");
                Ok(())
            }
            Err(e) => {
                metrics::record_replenish(false);
                warn!(error = %e, "Failed to replenish service wallet");
                Err(e.into())
            }
        }
    }
}

async fn with_timeout<T>(
    limit: Duration,
    call: impl Future<Output = LedgerResult<T>>,
) -> LedgerResult<T> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| LedgerError::Timeout(limit))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLedger;

    fn options() -> OrchestratorOptions {
        OrchestratorOptions {
            call_timeout: Duration::from_secs(1),
            transfer_timeout: Duration::from_secs(1),
            replenish_grace: Duration::from_millis(5),
        }
    }

    fn orchestrator(ledger: MockLedger) -> (FundingOrchestrator, Arc<MockLedger>) {
        let ledger = Arc::new(ledger);
        (FundingOrchestrator::new(ledger.clone(), options()), ledger)
    }

    fn request(token: TokenId, amount: FundingAmount) -> FundingRequest {
        FundingRequest {
            recipient: "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".parse().unwrap(),
            token,
            amount,
        }
    }

    #[tokio::test]
    async fn test_sufficient_balance_skips_replenish() {
        let (orchestrator, ledger) =
            orchestrator(MockLedger::new().with_balance(TokenId::AlphaUsd, 20_000));

        let result = orchestrator
            .fund(&request(TokenId::AlphaUsd, FundingAmount::Large))
            .await
            .unwrap();

        assert_eq!(result.amount, FundingAmount::Large);
        assert_eq!(ledger.replenish_calls(), 0);
        assert_eq!(ledger.transfers().len(), 1);
    }

    #[tokio::test]
    async fn test_low_balance_replenishes_once_then_transfers() {
        let (orchestrator, ledger) = orchestrator(
            MockLedger::new()
                .with_balance(TokenId::PathUsd, 3000)
                .with_replenish(7000),
        );

        let result = orchestrator
            .fund(&request(TokenId::PathUsd, FundingAmount::Medium))
            .await
            .unwrap();

        assert_eq!(result.token, TokenId::PathUsd);
        assert_eq!(ledger.replenish_calls(), 1);
        assert_eq!(
            ledger.transfers(),
            vec![(TokenId::PathUsd, result.recipient, FundingAmount::Medium)]
        );
    }

    #[tokio::test]
    async fn test_still_short_after_replenish_is_insufficient() {
        let (orchestrator, ledger) = orchestrator(
            MockLedger::new()
                .with_balance(TokenId::BetaUsd, 100)
                .with_replenish(100),
        );

        let err = orchestrator
            .fund(&request(TokenId::BetaUsd, FundingAmount::Small))
            .await
            .unwrap_err();

        match err {
            FaucetError::InsufficientFunds {
                required,
                available,
                ..
            } => {
                assert_eq!(required, FundingAmount::Small);
                assert_eq!(available, TokenBalance::from_whole_tokens(200, 6));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(ledger.replenish_calls(), 1);
        assert!(ledger.transfers().is_empty());
    }

    #[tokio::test]
    async fn test_replenish_failure_propagates() {
        let (orchestrator, ledger) = orchestrator(
            MockLedger::new()
                .failing_replenish(LedgerError::Unavailable("faucet RPC down".to_string())),
        );

        let err = orchestrator
            .fund(&request(TokenId::ThetaUsd, FundingAmount::Small))
            .await
            .unwrap_err();

        assert!(matches!(err, FaucetError::LedgerUnavailable(_)));
        assert!(ledger.transfers().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_transfer() {
        let (orchestrator, _) = orchestrator(
            MockLedger::new()
                .with_balance(TokenId::PathUsd, 10_000)
                .failing_transfer(LedgerError::Rejected("execution reverted".to_string())),
        );

        let err = orchestrator
            .fund(&request(TokenId::PathUsd, FundingAmount::Small))
            .await
            .unwrap_err();
        assert!(matches!(err, FaucetError::TransferRejected(_)));
    }

    #[tokio::test]
    async fn test_slow_ledger_times_out() {
        let ledger = Arc::new(MockLedger::new().with_delay(Duration::from_secs(5)));
        let orchestrator = FundingOrchestrator::new(
            ledger,
            OrchestratorOptions {
                call_timeout: Duration::from_millis(20),
                ..options()
            },
        );

        let err = orchestrator
            .fund(&request(TokenId::PathUsd, FundingAmount::Small))
            .await
            .unwrap_err();
        assert!(matches!(err, FaucetError::LedgerUnavailable(_)));
    }

    #[tokio::test]
    async fn test_invalid_recipients() {
        let (orchestrator, ledger) =
            orchestrator(MockLedger::new().with_balance(TokenId::PathUsd, 10_000));

        let mut zero = request(TokenId::PathUsd, FundingAmount::Small);
        zero.recipient = Address::ZERO;
        assert!(matches!(
            orchestrator.fund(&zero).await,
            Err(FaucetError::InvalidRecipient(_))
        ));

        let mut own = zero;
        own.recipient = ledger.service_address();
        assert!(matches!(
            orchestrator.fund(&own).await,
            Err(FaucetError::InvalidRecipient(_))
        ));
        assert!(ledger.transfers().is_empty());
    }
}
