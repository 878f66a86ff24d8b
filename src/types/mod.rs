// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! The scalar model: affinities and nullable cells.

use std::str::FromStr;

use parse_display::Display;
use serde::{Deserialize, Serialize};

mod blob;
mod timestamp;
mod value;

pub use self::blob::*;
pub use self::timestamp::*;
pub use self::value::*;

/// The scalar type tag of a [`Cell`].
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Affinity {
    #[display("BOOLEAN")]
    Bool,
    #[display("BIGINT")]
    Int,
    #[display("DOUBLE")]
    Float,
    #[display("TIMESTAMP")]
    Timestamp,
    #[display("TEXT")]
    Text,
    #[display("BLOB")]
    Blob,
}

impl Affinity {
    /// The natural byte width of a value of this affinity.
    ///
    /// Returns `None` for variable-width affinities, whose size is declared by the
    /// expression producing them.
    pub const fn fixed_width(&self) -> Option<usize> {
        match self {
            Self::Bool => Some(1),
            Self::Int | Self::Float | Self::Timestamp => Some(8),
            Self::Text | Self::Blob => None,
        }
    }

    /// Returns `true` if arithmetic is defined on values of this affinity.
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }

    /// Returns a null cell of this affinity.
    pub const fn null(self) -> Cell {
        Cell::Null(self)
    }
}

impl FromStr for Affinity {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bool" | "boolean" | "logical" => Ok(Self::Bool),
            "int" | "int4" | "int8" | "integer" | "bigint" => Ok(Self::Int),
            "float" | "float8" | "double" | "real" => Ok(Self::Float),
            "timestamp" | "datetime" => Ok(Self::Timestamp),
            "text" | "string" | "varchar" | "char" => Ok(Self::Text),
            "blob" | "binary" | "bytea" => Ok(Self::Blob),
            _ => Err(ConvertError::UnknownAffinity(s.into())),
        }
    }
}

/// The error type of value conversion and scalar arithmetic.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    #[error("no function {0}({1}, {2})")]
    NoBinaryOp(String, Affinity, Affinity),
    #[error("no function {0}({1})")]
    NoUnaryOp(String, Affinity),
    #[error("can not compare {0} with {1}")]
    NoCompare(Affinity, Affinity),
    #[error("{0} out of range")]
    Overflow(&'static str),
    #[error("division by zero")]
    DivisionByZero,
    #[error("failed to cast {0} to {1}")]
    Cast(String, Affinity),
    #[error("expected a boolean predicate but got {0}")]
    NotBool(Affinity),
    #[error("input column #{index} out of range for a row of {len} columns")]
    ColumnOutOfRange { index: usize, len: usize },
    #[error("unknown affinity: {0}")]
    UnknownAffinity(String),
    #[error("invalid timestamp: {0}")]
    ParseTimestamp(#[from] ParseTimestampError),
    #[error("invalid blob: {0}")]
    ParseBlob(#[from] ParseBlobError),
}
