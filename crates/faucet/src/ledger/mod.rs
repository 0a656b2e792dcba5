//! Access to the Tempo ledger from the service wallet.
//!
//! [`LedgerClient`] is the capability the funding workflow depends on;
//! [`TempoLedgerClient`] implements it over JSON-RPC.

mod rpc;
mod tempo;
mod tx;
mod wallet;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tempo_faucet_common::{Address, Hash};
use thiserror::Error;

use crate::tokens::{FundingAmount, TokenId};

pub use rpc::{JsonRpcClient, RpcErrorObject, TransactionReceipt};
pub use tempo::{LedgerOptions, TempoLedgerClient};
pub use tx::{erc20, LegacyTransaction, SignedTransaction};
pub use wallet::ServiceWallet;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Transport or node failure; the caller may retry later.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("ledger call timed out after {0:?}")]
    Timeout(Duration),

    /// The ledger refused to execute the request.
    #[error("rejected by ledger: {0}")]
    Rejected(String),

    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("signing failed: {0}")]
    Signing(String),
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// A token balance in base units together with the token's precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBalance {
    pub raw: u128,
    pub decimals: u8,
}

impl TokenBalance {
    pub fn new(raw: u128, decimals: u8) -> Self {
        Self { raw, decimals }
    }

    /// Balance of `whole` tokens, saturating on overflow.
    pub fn from_whole_tokens(whole: u64, decimals: u8) -> Self {
        let raw = 10u128
            .checked_pow(u32::from(decimals))
            .and_then(|scale| scale.checked_mul(u128::from(whole)))
            .unwrap_or(u128::MAX);
        Self { raw, decimals }
    }

    /// Whether this balance can pay out `amount`.
    pub fn covers(&self, amount: FundingAmount) -> bool {
        amount
            .base_units(self.decimals)
            .map(|needed| self.raw >= needed)
            .unwrap_or(false)
    }
}

/// Decimal rendering, e.g. `1234.5` for a raw `1234500000` with 6 decimals.
impl fmt::Display for TokenBalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.raw.to_string();
        let decimals = usize::from(self.decimals);
        let (int_part, frac_part) = if digits.len() > decimals {
            let split = digits.len() - decimals;
            (digits[..split].to_string(), digits[split..].to_string())
        } else {
            ("0".to_string(), format!("{:0>width$}", digits, width = decimals))
        };
        let frac = frac_part.trim_end_matches('0');
        let frac = if frac.is_empty() { "0" } else { frac };
        write!(f, "{}.{}", int_part, frac)
    }
}

impl Serialize for TokenBalance {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Operations the faucet needs from the ledger.
///
/// Implementations must serialize outgoing transfers from the service wallet
/// so concurrent callers never submit conflicting transactions.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Address of the service wallet.
    fn service_address(&self) -> Address;

    async fn chain_id(&self) -> LedgerResult<u64>;

    /// Service wallet balance of `token`.
    async fn balance(&self, token: TokenId) -> LedgerResult<TokenBalance>;

    /// Send `amount` of `token` to `recipient` and wait until the ledger has
    /// acknowledged it.
    async fn transfer(
        &self,
        token: TokenId,
        recipient: &Address,
        amount: FundingAmount,
    ) -> LedgerResult<Hash>;

    /// Ask the upstream issuer to top up the service wallet.
    async fn replenish(&self) -> LedgerResult<Vec<Hash>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_display() {
        assert_eq!(TokenBalance::new(1_234_500_000, 6).to_string(), "1234.5");
        assert_eq!(TokenBalance::new(5, 6).to_string(), "0.000005");
        assert_eq!(TokenBalance::new(0, 6).to_string(), "0.0");
        assert_eq!(TokenBalance::from_whole_tokens(3000, 6).to_string(), "3000.0");
        assert_eq!(TokenBalance::new(42, 0).to_string(), "42.0");
    }

    #[test]
    fn test_balance_covers() {
        let balance = TokenBalance::from_whole_tokens(5000, 6);
        assert!(balance.covers(FundingAmount::Small));
        assert!(balance.covers(FundingAmount::Medium));
        assert!(!balance.covers(FundingAmount::Large));

        let just_short = TokenBalance::new(balance.raw - 1, 6);
        assert!(!just_short.covers(FundingAmount::Medium));
    }
}
