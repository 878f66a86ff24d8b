// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::sync::Arc;

use crate::types::ConvertError;

/// The result type of aggregation.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type of aggregation.
///
/// Data-dependent degeneracies (empty groups, zero variance, `0/0`) are not errors;
/// they evaluate to a typed null. Errors are reserved for ill-typed input and for
/// work records whose shape does not match the aggregate driving them.
#[derive(thiserror::Error, Debug, Clone)]
#[error(transparent)]
pub struct Error {
    inner: Arc<Inner>,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Inner {
    #[error("conversion error: {0}")]
    Convert(#[from] ConvertError),
    #[error("compound record mismatch: expected {expected} members but got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("work record mismatch at member {member}: expected {expected} slots but got {actual}")]
    SlotMismatch {
        member: usize,
        expected: usize,
        actual: usize,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    pub fn kind(&self) -> &Inner {
        &self.inner
    }

    pub(crate) fn shape_mismatch(expected: usize, actual: usize) -> Self {
        Inner::ShapeMismatch { expected, actual }.into()
    }

    pub(crate) fn slot_mismatch(member: usize, expected: usize, actual: usize) -> Self {
        Inner::SlotMismatch {
            member,
            expected,
            actual,
        }
        .into()
    }

    /// Attributes a slot mismatch to the given member of a compound record.
    pub(crate) fn at_member(self, member: usize) -> Self {
        if let Inner::SlotMismatch {
            expected, actual, ..
        } = *self.inner
        {
            return Self::slot_mismatch(member, expected, actual);
        }
        self
    }

    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Inner::InvalidArgument(msg.into()).into()
    }
}

impl From<Inner> for Error {
    fn from(e: Inner) -> Self {
        Error { inner: Arc::new(e) }
    }
}

impl From<ConvertError> for Error {
    fn from(e: ConvertError) -> Self {
        Inner::from(e).into()
    }
}
