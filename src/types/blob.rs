// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Binary payload of a [`Cell::Blob`](super::Cell::Blob).
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Default, Serialize, Deserialize)]
pub struct Blob(Vec<u8>);

impl Blob {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for Blob {
    fn from(bytes: &[u8]) -> Self {
        Blob(bytes.into())
    }
}

impl From<Vec<u8>> for Blob {
    fn from(vec: Vec<u8>) -> Self {
        Blob(vec)
    }
}

impl Deref for Blob {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// An error which can be returned when parsing a blob.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseBlobError {
    #[error("invalid hex digit: {0}")]
    Int(#[from] std::num::ParseIntError),
    #[error("odd number of hex digits")]
    Length,
    #[error("non-ascii character in hex string")]
    NotHex,
}

impl FromStr for Blob {
    type Err = ParseBlobError;

    /// Parses `\x`-prefixed hex, or takes the raw bytes of any other string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(hex) = s.strip_prefix("\\x") else {
            return Ok(Blob(s.as_bytes().into()));
        };
        if hex.len() % 2 != 0 {
            return Err(ParseBlobError::Length);
        }
        let bytes = hex
            .as_bytes()
            .chunks(2)
            .map(|pair| -> Result<u8, ParseBlobError> {
                let digits = std::str::from_utf8(pair).map_err(|_| ParseBlobError::NotHex)?;
                Ok(u8::from_str_radix(digits, 16)?)
            })
            .collect::<Result<Vec<u8>, ParseBlobError>>()?;
        Ok(Blob(bytes))
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'\\x{self}'")
    }
}

impl fmt::Display for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}
