//! Rate-limited token faucet for the Tempo testnet
//!
//! Accepts a recipient address, a token and an amount tier, checks the
//! address against a fixed-window quota and sends the tokens from a service
//! wallet, topping the wallet up from the chain's native faucet when it runs
//! low.

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod orchestrator;
pub mod quota;
pub mod service;
pub mod tokens;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use config::FaucetConfig;
pub use error::{FaucetError, FaucetResult};
pub use orchestrator::{FundingOrchestrator, FundingRequest, OrchestratorOptions, TransferResult};
pub use service::{FaucetService, FundingReceipt};
pub use tokens::{FundingAmount, TokenId};
