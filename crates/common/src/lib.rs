//! Shared types and utilities for the Tempo faucet workspace.

pub mod types;
pub mod utils;

pub use types::{Address, Hash, ParseError};
