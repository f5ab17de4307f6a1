// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

//! Orchestration of the signal generation and capture accelerator.
//!
//! A [`Controller`] owns the [`RegisterAccess`] handle of one device and
//! hands out per-family controls:
//!
//! ```rust
//! use rftc_common::AwgId;
//! use rftc_controller::{Controller, SimulatedDevice};
//!
//! let device = SimulatedDevice::new();
//! let mut controller = Controller::new(device.clone());
//! controller.awg().start(&[AwgId::U0, AwgId::U2])?;
//! controller.close()?;
//! # Ok::<(), rftc_controller::Error>(())
//! ```

mod arena;
mod awg;
mod cancel;
mod capture;
mod clock;
mod controller;
mod digital_out;
pub mod mask;
mod poll;
mod register;
pub mod regmap;
mod settings;
mod sim;
mod stg;
#[cfg(test)]
mod tests;
mod trigger;
mod unit;

use std::time::Duration;

pub use cancel::CancelToken;
pub use clock::{Clock, SimulatedClock, SystemClock};
pub use controller::Controller;
pub use register::RegisterAccess;
pub use settings::{ControllerSettings, SanitizationChange};
pub use sim::{PulseRecord, SimulatedDevice};
pub use trigger::TriggerCtrl;
pub use unit::{
    Awg, AwgCtrl, Capture, CaptureCtrl, DigitalOut, DigitalOutCtrl, Module, Pausable, Stg,
    StgCtrl, UnitCtrl, UnitState,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Common(#[from] rftc_common::Error),

    /// An upload batch does not fit into the device memory it targets.
    #[error("Upload requires {required} bytes but only {capacity} bytes are available")]
    CapacityExceeded { required: u64, capacity: u64 },

    #[error("Timed out after {timeout:?} waiting for {kind} units {pending:?} to become {condition}")]
    Timeout {
        kind: &'static str,
        condition: &'static str,
        pending: Vec<u32>,
        timeout: Duration,
    },

    #[error("Cancelled while waiting for {kind} units {pending:?} to become {condition}")]
    Cancelled {
        kind: &'static str,
        condition: &'static str,
        pending: Vec<u32>,
    },

    /// A failure reported by the [`RegisterAccess`] implementation.
    #[error(transparent)]
    Register(#[from] anyhow::Error),
}

impl Error {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Units a failed wait was still waiting for.
    pub fn pending_units(&self) -> &[u32] {
        match self {
            Error::Timeout { pending, .. } | Error::Cancelled { pending, .. } => pending,
            _ => &[],
        }
    }
}

/// `log` target of [`Controller::with_log`].
pub const LOG_TARGET: &str = "rftc::controller";

pub type Result<T, E = Error> = std::result::Result<T, E>;
