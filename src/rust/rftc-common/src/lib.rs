// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

//! Types shared by the sequence model and the device controller.

pub mod hardware;
pub mod ids;
pub mod units;

use std::fmt::Display;

pub use ids::{
    AwgId, CaptureUnitId, DigitalOutId, DigitalOutTrigger, ExternalTrigger, StgId, UnitId,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A value was rejected at the call that introduced it.
    #[error("Invalid argument `{field}` = {value}: {constraint}")]
    InvalidArgument {
        field: &'static str,
        value: String,
        constraint: String,
    },

    /// A byte buffer does not have the expected layout.
    #[error("Malformed data: {0}")]
    Format(String),

    #[error("Index {index} is out of range for a sequence of length {len}")]
    IndexOutOfRange { index: i128, len: u64 },
}

impl Error {
    pub fn invalid_argument(
        field: &'static str,
        value: impl Display,
        constraint: impl Into<String>,
    ) -> Self {
        Error::InvalidArgument {
            field,
            value: value.to_string(),
            constraint: constraint.into(),
        }
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Error::Format(msg.into())
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::InvalidArgument { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
