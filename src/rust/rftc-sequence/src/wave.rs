// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

//! Waveform sequences played by the arbitrary waveform generators.

use std::collections::BTreeMap;
use std::f64::consts::TAU;

use bytes::{BufMut, Bytes, BytesMut};
use num_complex::Complex;

use rftc_common::hardware::MAX_AMPLITUDE;
use rftc_common::units::{ceil_to_word, checked_ceil_to_word, ns_to_samples};
use rftc_common::{Error, Result};

use crate::codec::SampleFormat;

/// Number of times a waveform repeats within its step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycles {
    Finite(u32),
    /// Repeat until the generator is terminated.
    Infinite,
}

impl Cycles {
    pub fn is_infinite(&self) -> bool {
        matches!(self, Cycles::Infinite)
    }

    fn validate(&self) -> Result<()> {
        match self {
            Cycles::Finite(0) => Err(Error::invalid_argument(
                "num_cycles",
                0,
                "must be at least 1",
            )),
            _ => Ok(()),
        }
    }
}

/// The waveform of a single step.
#[derive(Debug, Clone, PartialEq)]
pub enum WaveSpec {
    Sine {
        frequency_mhz: f64,
        amplitude: f64,
        phase_deg: f64,
        cycles: Cycles,
    },
    Sawtooth {
        frequency_mhz: f64,
        amplitude: f64,
        phase_deg: f64,
        /// Position of the crest within one period, in `[0, 1]`.
        crest_pos: f64,
        cycles: Cycles,
    },
    Square {
        frequency_mhz: f64,
        amplitude: f64,
        phase_deg: f64,
        /// Fraction of the period at the high level, in `(0, 1)`.
        duty_cycle: f64,
        cycles: Cycles,
    },
    Gaussian {
        amplitude: f64,
        duration_ns: f64,
        variance: f64,
        cycles: Cycles,
    },
    ArbitraryReal {
        samples: Vec<i16>,
        cycles: Cycles,
    },
    ArbitraryIQ {
        samples: Vec<Complex<i16>>,
        cycles: Cycles,
    },
}

fn check_positive(field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::invalid_argument(field, value, "must be finite and positive"));
    }
    Ok(())
}

fn check_finite(field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(Error::invalid_argument(field, value, "must be finite"));
    }
    Ok(())
}

fn check_amplitude(amplitude: f64) -> Result<()> {
    if !(0.0..=MAX_AMPLITUDE).contains(&amplitude) {
        return Err(Error::invalid_argument(
            "amplitude",
            amplitude,
            format!("must be within [0, {MAX_AMPLITUDE}]"),
        ));
    }
    Ok(())
}

fn to_sample(value: f64) -> i16 {
    value.round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

impl WaveSpec {
    pub fn cycles(&self) -> Cycles {
        match self {
            WaveSpec::Sine { cycles, .. }
            | WaveSpec::Sawtooth { cycles, .. }
            | WaveSpec::Square { cycles, .. }
            | WaveSpec::Gaussian { cycles, .. }
            | WaveSpec::ArbitraryReal { cycles, .. }
            | WaveSpec::ArbitraryIQ { cycles, .. } => *cycles,
        }
    }

    pub fn is_infinite(&self) -> bool {
        self.cycles().is_infinite()
    }

    pub fn validate(&self) -> Result<()> {
        self.cycles().validate()?;
        match self {
            WaveSpec::Sine {
                frequency_mhz,
                amplitude,
                phase_deg,
                ..
            } => {
                check_positive("frequency", *frequency_mhz)?;
                check_amplitude(*amplitude)?;
                check_finite("phase", *phase_deg)
            }
            WaveSpec::Sawtooth {
                frequency_mhz,
                amplitude,
                phase_deg,
                crest_pos,
                ..
            } => {
                check_positive("frequency", *frequency_mhz)?;
                check_amplitude(*amplitude)?;
                check_finite("phase", *phase_deg)?;
                if !(0.0..=1.0).contains(crest_pos) {
                    return Err(Error::invalid_argument(
                        "crest_pos",
                        crest_pos,
                        "must be within [0, 1]",
                    ));
                }
                Ok(())
            }
            WaveSpec::Square {
                frequency_mhz,
                amplitude,
                phase_deg,
                duty_cycle,
                ..
            } => {
                check_positive("frequency", *frequency_mhz)?;
                check_amplitude(*amplitude)?;
                check_finite("phase", *phase_deg)?;
                if !(*duty_cycle > 0.0 && *duty_cycle < 1.0) {
                    return Err(Error::invalid_argument(
                        "duty_cycle",
                        duty_cycle,
                        "must be within (0, 1)",
                    ));
                }
                Ok(())
            }
            WaveSpec::Gaussian {
                amplitude,
                duration_ns,
                variance,
                ..
            } => {
                check_amplitude(*amplitude)?;
                check_positive("duration", *duration_ns)?;
                check_positive("variance", *variance)
            }
            WaveSpec::ArbitraryReal { samples, .. } => {
                if samples.is_empty() {
                    return Err(Error::invalid_argument(
                        "samples",
                        "[]",
                        "must not be empty",
                    ));
                }
                Ok(())
            }
            WaveSpec::ArbitraryIQ { samples, .. } => {
                if samples.is_empty() {
                    return Err(Error::invalid_argument(
                        "samples",
                        "[]",
                        "must not be empty",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Frequency in MHz. Arbitrary waves repeat once per sample list.
    pub fn frequency_mhz(&self, sampling_rate_msps: f64) -> f64 {
        match self {
            WaveSpec::Sine { frequency_mhz, .. }
            | WaveSpec::Sawtooth { frequency_mhz, .. }
            | WaveSpec::Square { frequency_mhz, .. } => *frequency_mhz,
            WaveSpec::Gaussian { duration_ns, .. } => 1000.0 / duration_ns,
            WaveSpec::ArbitraryReal { samples, .. } => sampling_rate_msps / samples.len() as f64,
            WaveSpec::ArbitraryIQ { samples, .. } => sampling_rate_msps / samples.len() as f64,
        }
    }

    /// Duration in ns; infinite waves last forever.
    pub fn duration_ns(&self, sampling_rate_msps: f64) -> f64 {
        match self.cycles() {
            Cycles::Infinite => f64::INFINITY,
            Cycles::Finite(n) => 1000.0 * f64::from(n) / self.frequency_mhz(sampling_rate_msps),
        }
    }

    fn num_samples(&self, sampling_rate_msps: f64) -> u64 {
        match (self, self.cycles()) {
            (WaveSpec::ArbitraryReal { samples, .. }, Cycles::Finite(n)) => {
                (samples.len() as u64).saturating_mul(u64::from(n))
            }
            (WaveSpec::ArbitraryIQ { samples, .. }, Cycles::Finite(n)) => {
                (samples.len() as u64).saturating_mul(u64::from(n))
            }
            (WaveSpec::ArbitraryReal { samples, .. }, Cycles::Infinite) => samples.len() as u64,
            (WaveSpec::ArbitraryIQ { samples, .. }, Cycles::Infinite) => samples.len() as u64,
            (_, Cycles::Finite(_)) => {
                ns_to_samples(self.duration_ns(sampling_rate_msps), sampling_rate_msps)
            }
            (_, Cycles::Infinite) => {
                let period_ns = 1000.0 / self.frequency_mhz(sampling_rate_msps);
                ns_to_samples(period_ns, sampling_rate_msps).max(1)
            }
        }
    }

    /// Value of a parametric wave at sample `k`, with an additional phase shift.
    fn parametric_value(&self, k: usize, sampling_rate_msps: f64, shift_deg: f64) -> f64 {
        let t_us = k as f64 / sampling_rate_msps;
        let position = |frequency_mhz: f64, phase_deg: f64| {
            (frequency_mhz * t_us + (phase_deg + shift_deg) / 360.0).rem_euclid(1.0)
        };
        match self {
            WaveSpec::Sine {
                frequency_mhz,
                amplitude,
                phase_deg,
                ..
            } => amplitude * (TAU * position(*frequency_mhz, *phase_deg)).sin(),
            WaveSpec::Sawtooth {
                frequency_mhz,
                amplitude,
                phase_deg,
                crest_pos,
                ..
            } => {
                let x = position(*frequency_mhz, *phase_deg);
                let level = if x < *crest_pos {
                    x / crest_pos
                } else if *crest_pos < 1.0 {
                    (1.0 - x) / (1.0 - crest_pos)
                } else {
                    1.0
                };
                amplitude * (2.0 * level - 1.0)
            }
            WaveSpec::Square {
                frequency_mhz,
                amplitude,
                phase_deg,
                duty_cycle,
                ..
            } => {
                if position(*frequency_mhz, *phase_deg) < *duty_cycle {
                    *amplitude
                } else {
                    -amplitude
                }
            }
            WaveSpec::Gaussian {
                amplitude,
                duration_ns,
                variance,
                ..
            } => {
                let x = 2.0 * ((1000.0 * t_us / duration_ns).rem_euclid(1.0) - 0.5);
                amplitude * (-x * x / (2.0 * variance)).exp()
            }
            WaveSpec::ArbitraryReal { .. } | WaveSpec::ArbitraryIQ { .. } => 0.0,
        }
    }

    /// Real samples of the whole step (one cycle for infinite steps).
    pub fn real_samples(&self, sampling_rate_msps: f64) -> Vec<i16> {
        let n = self.num_samples(sampling_rate_msps) as usize;
        match self {
            WaveSpec::ArbitraryReal { samples, .. } => samples.iter().copied().cycle().take(n).collect(),
            WaveSpec::ArbitraryIQ { samples, .. } => {
                samples.iter().map(|s| s.re).cycle().take(n).collect()
            }
            _ => (0..n)
                .map(|k| to_sample(self.parametric_value(k, sampling_rate_msps, 0.0)))
                .collect(),
        }
    }

    /// I/Q samples of the whole step.
    ///
    /// Parametric waves put the wave shifted by -90 degrees on the quadrature
    /// channel; Gaussian and real arbitrary waves leave it at zero.
    pub fn iq_samples(&self, sampling_rate_msps: f64) -> Vec<Complex<i16>> {
        let n = self.num_samples(sampling_rate_msps) as usize;
        match self {
            WaveSpec::ArbitraryIQ { samples, .. } => samples.iter().copied().cycle().take(n).collect(),
            WaveSpec::ArbitraryReal { samples, .. } => samples
                .iter()
                .map(|&s| Complex::new(s, 0))
                .cycle()
                .take(n)
                .collect(),
            WaveSpec::Gaussian { .. } => self
                .real_samples(sampling_rate_msps)
                .into_iter()
                .map(|s| Complex::new(s, 0))
                .collect(),
            _ => (0..n)
                .map(|k| {
                    Complex::new(
                        to_sample(self.parametric_value(k, sampling_rate_msps, 0.0)),
                        to_sample(self.parametric_value(k, sampling_rate_msps, -90.0)),
                    )
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaveStep {
    pub step_id: u32,
    pub waveform: WaveSpec,
    pub post_blank_ns: f64,
}

impl WaveStep {
    pub fn duration_ns(&self, sampling_rate_msps: f64) -> f64 {
        self.waveform.duration_ns(sampling_rate_msps)
    }

    /// Duration plus post blank.
    pub fn interval_ns(&self, sampling_rate_msps: f64) -> f64 {
        self.duration_ns(sampling_rate_msps) + self.post_blank_ns
    }

    pub fn is_infinite(&self) -> bool {
        self.waveform.is_infinite()
    }
}

/// Steps of one AWG keyed by step id.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveSequence {
    sampling_rate_msps: f64,
    is_iq: bool,
    steps: BTreeMap<u32, WaveStep>,
}

/// Device memory image of a [`WaveSequence`].
#[derive(Debug, Clone, PartialEq)]
pub struct WaveImage {
    /// Parameter block; see [`crate::flattened::ParameterBlock`].
    pub parameters: Bytes,
    /// Prime samples of every step, each padded to whole words.
    pub samples: Bytes,
}

impl WaveSequence {
    pub fn new(sampling_rate_msps: f64, is_iq: bool) -> Result<Self> {
        check_positive("sampling_rate", sampling_rate_msps)?;
        Ok(WaveSequence {
            sampling_rate_msps,
            is_iq,
            steps: BTreeMap::new(),
        })
    }

    pub fn add_step(
        &mut self,
        step_id: u32,
        waveform: WaveSpec,
        post_blank_ns: f64,
    ) -> Result<&mut Self> {
        if self.steps.contains_key(&step_id) {
            return Err(Error::invalid_argument(
                "step_id",
                step_id,
                "is already part of the sequence",
            ));
        }
        if !post_blank_ns.is_finite() || post_blank_ns < 0.0 {
            return Err(Error::invalid_argument(
                "post_blank",
                post_blank_ns,
                "must be finite and not negative",
            ));
        }
        waveform.validate()?;
        if !self.is_iq && matches!(waveform, WaveSpec::ArbitraryIQ { .. }) {
            return Err(Error::invalid_argument(
                "waveform",
                "ArbitraryIQ",
                "I/Q waveforms require an I/Q sequence",
            ));
        }
        if let Some(infinite) = self.steps.values().find(|s| s.is_infinite()) {
            if step_id > infinite.step_id {
                return Err(Error::invalid_argument(
                    "step_id",
                    step_id,
                    format!("must precede the infinite step {}", infinite.step_id),
                ));
            }
        }
        if waveform.is_infinite() {
            if let Some(last) = self.steps.keys().next_back().filter(|&&last| last > step_id) {
                return Err(Error::invalid_argument(
                    "step_id",
                    step_id,
                    format!("an infinite step must be the last step, but step {last} follows"),
                ));
            }
        }
        self.steps.insert(
            step_id,
            WaveStep {
                step_id,
                waveform,
                post_blank_ns,
            },
        );
        Ok(self)
    }

    pub fn sampling_rate_msps(&self) -> f64 {
        self.sampling_rate_msps
    }

    pub fn is_iq(&self) -> bool {
        self.is_iq
    }

    pub fn num_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn step(&self, step_id: u32) -> Option<&WaveStep> {
        self.steps.get(&step_id)
    }

    /// Steps in ascending step id order.
    pub fn steps(&self) -> impl Iterator<Item = &WaveStep> {
        self.steps.values()
    }

    pub fn step_ids(&self) -> Vec<u32> {
        self.steps.keys().copied().collect()
    }

    pub fn step_duration_ns(&self, step_id: u32) -> Option<f64> {
        self.step(step_id)
            .map(|s| s.duration_ns(self.sampling_rate_msps))
    }

    pub fn step_interval_ns(&self, step_id: u32) -> Option<f64> {
        self.step(step_id)
            .map(|s| s.interval_ns(self.sampling_rate_msps))
    }

    /// Total duration; infinite when the sequence ends with an infinite step.
    pub fn duration_ns(&self) -> f64 {
        self.steps()
            .map(|s| s.interval_ns(self.sampling_rate_msps))
            .sum()
    }

    /// Parameter block describing every step; see [`crate::flattened::ParameterBlock`].
    pub fn serialize_parameters(&self) -> Bytes {
        let rate = self.sampling_rate_msps;
        let mut buf = BytesMut::with_capacity(16 + 24 * self.steps.len());
        buf.put_u32_le(self.steps.len() as u32);
        buf.put_u32_le(u32::from(self.is_iq));
        buf.put_f64_le(rate);
        for step in self.steps() {
            buf.put_u32_le(step.step_id);
            buf.put_u32_le(u32::from(step.is_infinite()));
            buf.put_u64_le(step.waveform.num_samples(rate));
            buf.put_u64_le(ns_to_samples(step.post_blank_ns, rate));
        }
        buf.freeze()
    }

    /// Length in bytes of [`WaveSequence::serialize_samples`], computed without
    /// synthesizing a single sample. Saturates at `u64::MAX`.
    pub fn sample_image_len(&self, format: SampleFormat) -> u64 {
        let channels: u64 = if self.is_iq { 2 } else { 1 };
        let bytes_per_sample = format.bytes_per_sample() as u64;
        self.steps().fold(0u64, |total, step| {
            let stored = checked_ceil_to_word(step.waveform.num_samples(self.sampling_rate_msps))
                .unwrap_or(u64::MAX);
            total.saturating_add(
                stored
                    .saturating_mul(channels)
                    .saturating_mul(bytes_per_sample),
            )
        })
    }

    /// Prime samples of every step, each zero padded to whole words.
    ///
    /// I/Q sequences interleave the two channels sample by sample.
    pub fn serialize_samples(&self, format: SampleFormat) -> Bytes {
        let rate = self.sampling_rate_msps;
        let mut buf = BytesMut::new();
        for step in self.steps() {
            let (raw, channels): (Vec<i32>, usize) = if self.is_iq {
                let samples = step
                    .waveform
                    .iq_samples(rate)
                    .into_iter()
                    .flat_map(|s| [i32::from(s.re), i32::from(s.im)])
                    .collect();
                (samples, 2)
            } else {
                let samples = step
                    .waveform
                    .real_samples(rate)
                    .into_iter()
                    .map(i32::from)
                    .collect();
                (samples, 1)
            };
            let num_prime = (raw.len() / channels) as u64;
            let padding = (ceil_to_word(num_prime) - num_prime) as usize * channels;
            format.put_samples(&mut buf, raw.into_iter().chain(std::iter::repeat_n(0, padding)));
        }
        buf.freeze()
    }

    pub fn to_image(&self, format: SampleFormat) -> WaveImage {
        WaveImage {
            parameters: self.serialize_parameters(),
            samples: self.serialize_samples(format),
        }
    }
}
