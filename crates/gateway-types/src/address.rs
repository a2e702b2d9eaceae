use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A base58-encoded Solana address. Opaque to the core: the pipeline never
/// inspects it beyond string equality (matching a mint) and passing it
/// through to the 402 challenge body.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("address must be 32..44 base58 characters, got {0}")]
    InvalidLength(usize),
    #[error("address is not valid base58: {0}")]
    InvalidBase58(#[from] bs58::decode::Error),
}

impl Address {
    pub fn new(value: impl Into<String>) -> Result<Self, AddressError> {
        let value = value.into();
        if !(32..=44).contains(&value.len()) {
            return Err(AddressError::InvalidLength(value.len()));
        }
        bs58::decode(&value).into_vec()?;
        Ok(Address(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::new(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
