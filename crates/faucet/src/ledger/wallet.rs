use k256::ecdsa::SigningKey;
use std::fmt;
use tempo_faucet_common::{Address, Hash};

use super::{LedgerError, LedgerResult};

/// Key pair of the wallet the faucet pays out from.
pub struct ServiceWallet {
    signing_key: SigningKey,
    address: Address,
}

impl ServiceWallet {
    /// Load from a hex private key, with or without `0x`.
    pub fn from_private_key(private_key: &str) -> LedgerResult<Self> {
        let key_hex = private_key.trim().trim_start_matches("0x");
        let key_bytes = hex::decode(key_hex)
            .map_err(|e| LedgerError::Signing(format!("Invalid private key hex: {}", e)))?;

        if key_bytes.len() != 32 {
            return Err(LedgerError::Signing(format!(
                "Private key must be 32 bytes, got {}",
                key_bytes.len()
            )));
        }

        let signing_key = SigningKey::from_slice(&key_bytes)
            .map_err(|e| LedgerError::Signing(format!("Invalid signing key: {}", e)))?;

        // Address = last 20 bytes of keccak(uncompressed pubkey without the 0x04 tag)
        let public_key = signing_key.verifying_key().to_encoded_point(false);
        let hash = Hash::keccak(&public_key.as_bytes()[1..]);
        let address = Address::from_slice(&hash.0[12..]);

        Ok(Self {
            signing_key,
            address,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

impl fmt::Debug for ServiceWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceWallet")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_addresses() {
        let wallet = ServiceWallet::from_private_key(
            "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318",
        )
        .unwrap();
        assert_eq!(
            wallet.address().to_checksum(),
            "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23"
        );

        let wallet = ServiceWallet::from_private_key(&format!("{:0>64}", "1")).unwrap();
        assert_eq!(
            wallet.address().to_checksum(),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
        );
    }

    #[test]
    fn test_rejects_bad_keys() {
        assert!(ServiceWallet::from_private_key("0xnothex").is_err());
        assert!(ServiceWallet::from_private_key("0x1234").is_err());
        assert!(ServiceWallet::from_private_key(&"0".repeat(64)).is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let wallet = ServiceWallet::from_private_key(&"11".repeat(32)).unwrap();
        let debug = format!("{:?}", wallet);
        assert!(debug.contains("address"));
        assert!(!debug.contains(&"11".repeat(32)));
    }
}
