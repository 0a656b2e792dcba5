//! In-process ledger double for unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tempo_faucet_common::{Address, Hash};

use crate::ledger::{LedgerClient, LedgerError, LedgerResult, TokenBalance};
use crate::tokens::{FundingAmount, TokenId};

pub const DECIMALS: u8 = 6;

pub struct MockLedger {
    address: Address,
    balances: Mutex<HashMap<TokenId, u128>>,
    replenish_whole: u64,
    replenish_error: Option<LedgerError>,
    transfer_error: Option<LedgerError>,
    delay: Duration,
    unavailable: AtomicBool,
    replenish_calls: AtomicUsize,
    transfers: Mutex<Vec<(TokenId, Address, FundingAmount)>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            address: Address::from_slice(&[0x5e; 20]),
            balances: Mutex::new(HashMap::new()),
            replenish_whole: 0,
            replenish_error: None,
            transfer_error: None,
            delay: Duration::ZERO,
            unavailable: AtomicBool::new(false),
            replenish_calls: AtomicUsize::new(0),
            transfers: Mutex::new(Vec::new()),
        }
    }

    pub fn with_balance(self, token: TokenId, whole: u64) -> Self {
        self.balances
            .lock()
            .unwrap()
            .insert(token, TokenBalance::from_whole_tokens(whole, DECIMALS).raw);
        self
    }

    /// Each replenishment credits `whole` tokens of every token.
    pub fn with_replenish(mut self, whole: u64) -> Self {
        self.replenish_whole = whole;
        self
    }

    pub fn failing_replenish(mut self, err: LedgerError) -> Self {
        self.replenish_error = Some(err);
        self
    }

    pub fn failing_transfer(mut self, err: LedgerError) -> Self {
        self.transfer_error = Some(err);
        self
    }

    /// Delay every balance read.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn replenish_calls(&self) -> usize {
        self.replenish_calls.load(Ordering::SeqCst)
    }

    pub fn transfers(&self) -> Vec<(TokenId, Address, FundingAmount)> {
        self.transfers.lock().unwrap().clone()
    }

    fn check_available(&self) -> LedgerResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(LedgerError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    fn service_address(&self) -> Address {
        self.address
    }

    async fn chain_id(&self) -> LedgerResult<u64> {
        self.check_available()?;
        Ok(42_429)
    }

    async fn balance(&self, token: TokenId) -> LedgerResult<TokenBalance> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.check_available()?;
        let raw = self.balances.lock().unwrap().get(&token).copied().unwrap_or(0);
        Ok(TokenBalance::new(raw, DECIMALS))
    }

    async fn transfer(
        &self,
        token: TokenId,
        recipient: &Address,
        amount: FundingAmount,
    ) -> LedgerResult<Hash> {
        self.check_available()?;
        if let Some(err) = &self.transfer_error {
            return Err(err.clone());
        }

        let needed = amount.base_units(DECIMALS).unwrap();
        let mut balances = self.balances.lock().unwrap();
        let balance = balances.entry(token).or_insert(0);
        if *balance < needed {
            return Err(LedgerError::Rejected("insufficient balance".to_string()));
        }
        *balance -= needed;

        let mut transfers = self.transfers.lock().unwrap();
        transfers.push((token, *recipient, amount));
        Ok(Hash::keccak(&transfers.len().to_be_bytes()))
    }

    async fn replenish(&self) -> LedgerResult<Vec<Hash>> {
        self.check_available()?;
        self.replenish_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.replenish_error {
            return Err(err.clone());
        }

        let credit = TokenBalance::from_whole_tokens(self.replenish_whole, DECIMALS).raw;
        let mut balances = self.balances.lock().unwrap();
        for token in TokenId::ALL {
            *balances.entry(token).or_insert(0) += credit;
        }
        Ok(vec![Hash::keccak(b"replenish")])
    }
}
