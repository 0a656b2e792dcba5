//! Request body validation for `POST /api/fund`.
//!
//! Works on the raw JSON value so every problem with a body is reported at
//! once instead of stopping at the first deserialization error.

use serde_json::Value;
use tempo_faucet_common::Address;

use crate::orchestrator::FundingRequest;
use crate::tokens::{FundingAmount, TokenId};

/// Validate a fund request body, collecting every error.
pub fn validate_fund_request(body: &Value) -> Result<FundingRequest, Vec<String>> {
    let mut errors = Vec::new();

    let recipient = match body.get("address") {
        None | Some(Value::Null) => {
            errors.push("Address is required".to_string());
            None
        }
        Some(Value::String(s)) if s.is_empty() => {
            errors.push("Address is required".to_string());
            None
        }
        Some(value) => {
            let parsed = value.as_str().and_then(parse_address);
            if parsed.is_none() {
                errors.push("Invalid Ethereum address".to_string());
            }
            parsed
        }
    };

    let token = match body.get("token") {
        None | Some(Value::Null) => {
            errors.push("Token is required".to_string());
            None
        }
        Some(Value::String(s)) if s.is_empty() => {
            errors.push("Token is required".to_string());
            None
        }
        Some(value) => {
            let parsed = value.as_str().and_then(|s| s.parse::<TokenId>().ok());
            if parsed.is_none() {
                errors.push(format!("Invalid token. Must be one of: {}", TokenId::names()));
            }
            parsed
        }
    };

    let amount = match body.get("amount") {
        None | Some(Value::Null) => {
            errors.push("Amount is required".to_string());
            None
        }
        Some(value) => {
            let parsed = parse_amount(value);
            if parsed.is_none() {
                errors.push(format!(
                    "Invalid amount. Must be one of: {}",
                    FundingAmount::tiers()
                ));
            }
            parsed
        }
    };

    match (recipient, token, amount) {
        (Some(recipient), Some(token), Some(amount)) if errors.is_empty() => Ok(FundingRequest {
            recipient,
            token,
            amount,
        }),
        _ => Err(errors),
    }
}

/// `0x` followed by 40 hex digits. Mixed-case input must carry a valid
/// EIP-55 checksum.
pub fn parse_address(value: &str) -> Option<Address> {
    let digits = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X"))?;
    if digits.len() != 40 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    value.parse().ok()
}

/// Amounts must be JSON numbers; `5000.0` is accepted, `"5000"` is not.
fn parse_amount(value: &Value) -> Option<FundingAmount> {
    let number = value.as_f64()?;
    if number.fract() != 0.0 || number < 0.0 {
        return None;
    }
    FundingAmount::from_whole_tokens(number as u64)
}
