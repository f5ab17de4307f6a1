// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

//! Conversions between nanoseconds, samples and hardware words.
//!
//! Sampling rates are given in mega samples per second, so one sample lasts
//! `1000 / rate` nanoseconds.

use crate::hardware::SAMPLES_PER_WORD;

pub fn samples_to_ns(samples: u64, sampling_rate_msps: f64) -> f64 {
    1000.0 * samples as f64 / sampling_rate_msps
}

/// Number of samples covering `ns`, rounded to the nearest sample.
pub fn ns_to_samples(ns: f64, sampling_rate_msps: f64) -> u64 {
    (ns * sampling_rate_msps / 1000.0).round() as u64
}

pub fn words_to_samples(words: u32) -> u64 {
    u64::from(words) * SAMPLES_PER_WORD
}

/// Round `samples` up to a whole number of hardware words.
pub fn ceil_to_word(samples: u64) -> u64 {
    samples.div_ceil(SAMPLES_PER_WORD) * SAMPLES_PER_WORD
}

/// [`ceil_to_word`] for counts read from untrusted memory.
pub fn checked_ceil_to_word(samples: u64) -> Option<u64> {
    samples
        .div_ceil(SAMPLES_PER_WORD)
        .checked_mul(SAMPLES_PER_WORD)
}

pub fn ceil_to_grid(value: u64, grid: u64) -> u64 {
    value.div_ceil(grid) * grid
}
