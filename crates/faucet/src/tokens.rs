//! Supported TIP-20 tokens and the fixed amount tiers the faucet dispenses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tempo_faucet_common::Address;

/// A token the faucet can dispense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenId {
    #[serde(rename = "pathUSD")]
    PathUsd,
    #[serde(rename = "AlphaUSD")]
    AlphaUsd,
    #[serde(rename = "BetaUSD")]
    BetaUsd,
    #[serde(rename = "ThetaUSD")]
    ThetaUsd,
}

impl TokenId {
    pub const ALL: [TokenId; 4] = [
        TokenId::PathUsd,
        TokenId::AlphaUsd,
        TokenId::BetaUsd,
        TokenId::ThetaUsd,
    ];

    /// Name used on the wire and in the landing page.
    pub fn name(&self) -> &'static str {
        match self {
            TokenId::PathUsd => "pathUSD",
            TokenId::AlphaUsd => "AlphaUSD",
            TokenId::BetaUsd => "BetaUSD",
            TokenId::ThetaUsd => "ThetaUSD",
        }
    }

    /// Contract address of the token on Tempo.
    pub fn contract(&self) -> Address {
        let mut bytes = [0u8; 20];
        bytes[0] = 0x20;
        bytes[1] = 0xc0;
        bytes[19] = match self {
            TokenId::PathUsd => 0,
            TokenId::AlphaUsd => 1,
            TokenId::BetaUsd => 2,
            TokenId::ThetaUsd => 3,
        };
        Address(bytes)
    }

    /// Comma-separated list of every supported token name.
    pub fn names() -> String {
        Self::ALL.iter().map(|t| t.name()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TokenId {
    type Err = UnknownToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| UnknownToken(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown token '{0}'")]
pub struct UnknownToken(pub String);

/// One of the fixed dispensing tiers, in whole tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FundingAmount {
    Small,
    Medium,
    Large,
}

impl FundingAmount {
    pub const ALL: [FundingAmount; 3] = [
        FundingAmount::Small,
        FundingAmount::Medium,
        FundingAmount::Large,
    ];

    pub fn whole_tokens(&self) -> u64 {
        match self {
            FundingAmount::Small => 1_000,
            FundingAmount::Medium => 5_000,
            FundingAmount::Large => 10_000,
        }
    }

    pub fn from_whole_tokens(value: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.whole_tokens() == value)
    }

    /// Amount in the token's smallest unit, `None` on overflow.
    pub fn base_units(&self, decimals: u8) -> Option<u128> {
        10u128
            .checked_pow(u32::from(decimals))
            .and_then(|scale| scale.checked_mul(u128::from(self.whole_tokens())))
    }

    /// Comma-separated list of every allowed tier.
    pub fn tiers() -> String {
        Self::ALL
            .iter()
            .map(|a| a.whole_tokens().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for FundingAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.whole_tokens())
    }
}

impl Serialize for FundingAmount {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.whole_tokens())
    }
}

impl<'de> Deserialize<'de> for FundingAmount {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u64::deserialize(deserializer)?;
        Self::from_whole_tokens(value).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid amount {}, must be one of: {}",
                value,
                Self::tiers()
            ))
        })
    }
}
