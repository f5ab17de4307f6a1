// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

//! Sequence model of the signal generation and capture accelerator.
//!
//! Builders validate every value when it is added, so serializing a built
//! sequence never fails. Reading device memory back goes through
//! [`flattened::reconstruct`].

pub mod capture;
pub mod codec;
pub mod digital_out;
pub mod flattened;
pub mod lazy;
pub mod stimulus;
pub mod wave;

pub use capture::{CaptureConfig, CaptureHazard, CaptureSequence, CaptureStep, SkippedCapture};
pub use codec::SampleFormat;
pub use digital_out::{DigitalOutputEntry, DigitalOutputSequence, DigitalOutputVector};
pub use flattened::{
    FlattenedIQWaveform, FlattenedSequence, FlattenedStep, FlattenedWaveform, ParameterBlock,
    StepBoundary, reconstruct,
};
pub use lazy::LazySamples;
pub use rftc_common::{Error, Result};
pub use stimulus::{Stimulus, WaveChunk};
pub use wave::{Cycles, WaveImage, WaveSequence, WaveSpec, WaveStep};
