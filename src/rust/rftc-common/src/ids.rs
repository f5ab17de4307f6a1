// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

//! Closed enumerations of the addressable hardware units.
//!
//! Every identifier maps infallibly to its index, which is also its bit
//! position in the target-select and trigger-mask registers. Conversion
//! from a raw integer is the only fallible direction.

use std::fmt;

use crate::{Error, Result};

/// A hardware unit that can be addressed by a bit position.
pub trait UnitId: Copy + Eq + Ord + fmt::Debug + fmt::Display + 'static {
    /// Human readable name of the unit family, used in diagnostics.
    const KIND: &'static str;
    /// All units of this family in ascending index order.
    const ALL: &'static [Self];

    fn index(self) -> u32;

    fn from_index(index: u32) -> Result<Self> {
        Self::ALL
            .get(index as usize)
            .copied()
            .ok_or_else(|| {
                Error::invalid_argument(
                    Self::KIND,
                    index,
                    format!("must be less than {}", Self::ALL.len()),
                )
            })
    }
}

macro_rules! unit_ids {
    ($(#[$meta:meta])* $name:ident, $kind:literal, [$($variant:ident = $index:literal),+ $(,)?]) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $($variant = $index),+
        }

        impl UnitId for $name {
            const KIND: &'static str = $kind;
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn index(self) -> u32 {
                self as u32
            }
        }

        impl TryFrom<u32> for $name {
            type Error = Error;

            fn try_from(value: u32) -> Result<Self> {
                <$name as UnitId>::from_index(value)
            }
        }

        impl From<$name> for u32 {
            fn from(value: $name) -> u32 {
                value.index()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} {}", $kind, self.index())
            }
        }
    };
}

unit_ids!(
    /// Arbitrary waveform generator output channel.
    AwgId, "AWG",
    [U0 = 0, U1 = 1, U2 = 2, U3 = 3, U4 = 4, U5 = 5, U6 = 6, U7 = 7,
     U8 = 8, U9 = 9, U10 = 10, U11 = 11, U12 = 12, U13 = 13, U14 = 14, U15 = 15]
);

unit_ids!(
    /// Stimulus generator channel.
    StgId, "STG",
    [U0 = 0, U1 = 1, U2 = 2, U3 = 3, U4 = 4, U5 = 5, U6 = 6, U7 = 7]
);

unit_ids!(
    /// Capture unit.
    CaptureUnitId, "capture unit",
    [U0 = 0, U1 = 1, U2 = 2, U3 = 3, U4 = 4, U5 = 5, U6 = 6, U7 = 7]
);

unit_ids!(
    /// Digital output module.
    DigitalOutId, "digital output",
    [U0 = 0, U1 = 1, U2 = 2, U3 = 3]
);

unit_ids!(
    /// External hardware trigger input line.
    ExternalTrigger, "external trigger",
    [Line0 = 0, Line1 = 1, Line2 = 2, Line3 = 3]
);

/// Cooperative trigger fired into digital output modules when any stimulus
/// generator reaches the corresponding transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DigitalOutTrigger {
    Start = 0,
    Restart = 1,
    Pause = 2,
    Resume = 3,
}

impl DigitalOutTrigger {
    pub const ALL: [DigitalOutTrigger; 4] = [
        DigitalOutTrigger::Start,
        DigitalOutTrigger::Restart,
        DigitalOutTrigger::Pause,
        DigitalOutTrigger::Resume,
    ];

    pub fn index(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for DigitalOutTrigger {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(DigitalOutTrigger::Start),
            1 => Ok(DigitalOutTrigger::Restart),
            2 => Ok(DigitalOutTrigger::Pause),
            3 => Ok(DigitalOutTrigger::Resume),
            _ => Err(Error::invalid_argument(
                "digital output trigger",
                value,
                "must be one of 0 (start), 1 (restart), 2 (pause), 3 (resume)",
            )),
        }
    }
}

impl fmt::Display for DigitalOutTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DigitalOutTrigger::Start => "start",
            DigitalOutTrigger::Restart => "restart",
            DigitalOutTrigger::Pause => "pause",
            DigitalOutTrigger::Resume => "resume",
        };
        f.write_str(name)
    }
}
