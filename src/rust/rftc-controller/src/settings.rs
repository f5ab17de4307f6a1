// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

//! Settings of a controller session.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use rftc_common::hardware::{DEFAULT_SAMPLE_WIDTH_BITS, WAVE_RAM_SIZE};
use rftc_sequence::SampleFormat;

use crate::Result;

#[derive(Debug, Clone)]
pub struct SanitizationChange {
    pub field: &'static str,
    pub original: String,
    pub sanitized: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerSettings {
    /// Sleep between two status polls.
    pub poll_interval_ms: u64,
    pub ready_timeout_ms: u64,
    pub idle_timeout_ms: u64,
    /// Width of the converter samples, 1 to 16 bits.
    pub sample_width_bits: u8,
    /// Bytes of wave memory available to one upload batch.
    pub wave_ram_size: u64,
    pub show_upload_progress: bool,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        ControllerSettings {
            poll_interval_ms: 10,
            ready_timeout_ms: 5000,
            idle_timeout_ms: 5000,
            sample_width_bits: DEFAULT_SAMPLE_WIDTH_BITS,
            wave_ram_size: WAVE_RAM_SIZE,
            show_upload_progress: false,
        }
    }
}

impl ControllerSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| rftc_common::Error::format(format!("invalid controller settings: {e}")).into())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| rftc_common::Error::format(e.to_string()).into())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn sample_format(&self) -> Result<SampleFormat> {
        Ok(SampleFormat::new(self.sample_width_bits)?)
    }

    fn validate(&self) -> Result<()> {
        if !(1..=DEFAULT_SAMPLE_WIDTH_BITS).contains(&self.sample_width_bits) {
            return Err(rftc_common::Error::invalid_argument(
                "sample_width_bits",
                self.sample_width_bits,
                format!("must be between 1 and {DEFAULT_SAMPLE_WIDTH_BITS}"),
            )
            .into());
        }
        if self.wave_ram_size == 0 || self.wave_ram_size > WAVE_RAM_SIZE {
            return Err(rftc_common::Error::invalid_argument(
                "wave_ram_size",
                self.wave_ram_size,
                format!("must be between 1 and {WAVE_RAM_SIZE:#x} bytes"),
            )
            .into());
        }
        Ok(())
    }

    /// Reject invalid values and adjust the ones that can be fixed.
    pub fn sanitize(&mut self) -> Result<Vec<SanitizationChange>> {
        self.validate()?;
        let mut changes = vec![];
        if self.poll_interval_ms == 0 {
            changes.push(SanitizationChange {
                field: "poll_interval_ms",
                original: self.poll_interval_ms.to_string(),
                sanitized: 1.to_string(),
                reason: "Must be at least 1 ms.".to_string(),
            });
            self.poll_interval_ms = 1;
        }
        Ok(changes)
    }
}
