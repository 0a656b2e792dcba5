//! Token calldata and legacy (EIP-155) transaction signing.

use k256::ecdsa::SigningKey;
use rlp::RlpStream;
use tempo_faucet_common::{Address, Hash};

use super::{LedgerError, LedgerResult};

/// ABI encoding for the TIP-20 token calls the faucet makes.
pub mod erc20 {
    use ethabi::{ParamType, Token};
    use tempo_faucet_common::Address;

    use crate::ledger::{LedgerError, LedgerResult};

    pub const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

    fn abi_address(address: &Address) -> Token {
        Token::Address(ethabi::Address::from_slice(&address.0))
    }

    fn call(name: &str, params: &[ParamType], args: &[Token]) -> Vec<u8> {
        let mut data = ethabi::short_signature(name, params).to_vec();
        data.extend(ethabi::encode(args));
        data
    }

    /// `transfer(address,uint256)`
    pub fn transfer_calldata(recipient: &Address, amount: u128) -> Vec<u8> {
        call(
            "transfer",
            &[ParamType::Address, ParamType::Uint(256)],
            &[abi_address(recipient), Token::Uint(ethabi::Uint::from(amount))],
        )
    }

    /// `balanceOf(address)`
    pub fn balance_of_calldata(owner: &Address) -> Vec<u8> {
        call("balanceOf", &[ParamType::Address], &[abi_address(owner)])
    }

    /// `decimals()`
    pub fn decimals_calldata() -> Vec<u8> {
        call("decimals", &[], &[])
    }

    fn decode_uint(data: &[u8], bits: usize) -> LedgerResult<ethabi::Uint> {
        let mut tokens = ethabi::decode(&[ParamType::Uint(bits)], data)
            .map_err(|e| LedgerError::Unavailable(format!("undecodable return data: {}", e)))?;
        match tokens.pop() {
            Some(Token::Uint(value)) => Ok(value),
            other => Err(LedgerError::Unavailable(format!(
                "expected uint return value, got {:?}",
                other
            ))),
        }
    }

    pub fn decode_balance(data: &[u8]) -> LedgerResult<u128> {
        let value = decode_uint(data, 256)?;
        if value.bits() > 128 {
            return Err(LedgerError::Unavailable(format!(
                "balance {} exceeds supported range",
                value
            )));
        }
        Ok(value.low_u128())
    }

    pub fn decode_decimals(data: &[u8]) -> LedgerResult<u8> {
        let value = decode_uint(data, 8)?;
        if value.bits() > 8 {
            return Err(LedgerError::Unavailable(format!(
                "decimals {} out of range",
                value
            )));
        }
        Ok(value.low_u64() as u8)
    }
}

/// Unsigned pre-EIP-1559 transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub value: u128,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

/// A signed transaction ready for `eth_sendRawTransaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub raw: Vec<u8>,
    pub hash: Hash,
    pub v: u64,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl SignedTransaction {
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }
}

impl LegacyTransaction {
    fn append_body(&self, stream: &mut RlpStream) {
        append_uint(stream, u128::from(self.nonce));
        append_uint(stream, self.gas_price);
        append_uint(stream, u128::from(self.gas_limit));
        stream.append(&self.to.0.to_vec());
        append_uint(stream, self.value);
        stream.append(&self.data);
    }

    /// Keccak of `rlp([nonce, gasPrice, gas, to, value, data, chainId, 0, 0])`.
    pub fn signing_hash(&self) -> Hash {
        let mut stream = RlpStream::new_list(9);
        self.append_body(&mut stream);
        append_uint(&mut stream, u128::from(self.chain_id));
        append_uint(&mut stream, 0);
        append_uint(&mut stream, 0);
        Hash::keccak(&stream.out())
    }

    pub fn sign(&self, key: &SigningKey) -> LedgerResult<SignedTransaction> {
        let hash = self.signing_hash();
        let (signature, recovery_id) = key
            .sign_prehash_recoverable(&hash.0)
            .map_err(|e| LedgerError::Signing(e.to_string()))?;

        let v = u64::from(recovery_id.to_byte()) + 35 + self.chain_id * 2;
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&signature.r().to_bytes());
        s.copy_from_slice(&signature.s().to_bytes());

        let mut stream = RlpStream::new_list(9);
        self.append_body(&mut stream);
        append_uint(&mut stream, u128::from(v));
        stream.append(&trim_leading_zeros(&r).to_vec());
        stream.append(&trim_leading_zeros(&s).to_vec());
        let raw = stream.out().to_vec();

        Ok(SignedTransaction {
            hash: Hash::keccak(&raw),
            raw,
            v,
            r,
            s,
        })
    }
}

/// RLP integers are big-endian with no leading zeros; zero is the empty string.
fn append_uint(stream: &mut RlpStream, value: u128) {
    stream.append(&trim_leading_zeros(&value.to_be_bytes()).to_vec());
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}
