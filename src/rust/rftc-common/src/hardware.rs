// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

//! Hardware limits of the signal generation and capture accelerator.

/// Number of samples in one hardware word.
pub const SAMPLES_PER_WORD: u64 = 16;

/// Bytes occupied by one stored real sample.
pub const BYTES_PER_SAMPLE: u64 = 2;

/// Bytes occupied by one hardware word of real samples.
pub const BYTES_PER_WORD: u64 = SAMPLES_PER_WORD * BYTES_PER_SAMPLE;

/// Wave parts of stimulus chunks must be a multiple of this many samples.
pub const WAVE_PART_MIN_SAMPLES: u64 = 1024;

/// Size of the wave memory arena in bytes.
pub const WAVE_RAM_SIZE: u64 = 0x8000_0000;

pub const MAX_CHUNKS_PER_STIMULUS: usize = 16;

pub const MAX_CAPTURE_SEQUENCES: usize = 8;

pub const MAX_DIGITAL_OUT_ENTRIES: usize = 32;

/// Upper bound for the duration of a single digital output entry.
pub const MAX_DIGITAL_OUT_DURATION_NS: f64 = 1.4e10;

/// Default sample width of the digital to analog converters.
pub const DEFAULT_SAMPLE_WIDTH_BITS: u8 = 16;

/// Largest amplitude a parametric wave may request.
pub const MAX_AMPLITUDE: f64 = i16::MAX as f64;
