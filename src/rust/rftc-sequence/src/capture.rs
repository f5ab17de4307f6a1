// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

//! Capture sequences and the capture configuration blob.
//!
//! A capture step starts `delay_ns` after the wave step with the same id
//! starts on the paired AWG. The hardware silently skips a capture whose
//! delay exceeds the interval of that wave step; such captures are reported
//! as [`CaptureHazard`]s instead of being rejected.

use std::collections::BTreeMap;

use bytes::{BufMut, Bytes, BytesMut};

use rftc_common::hardware::MAX_CAPTURE_SEQUENCES;
use rftc_common::{AwgId, CaptureUnitId, Error, Result, UnitId};

use crate::codec::Reader;
use crate::wave::WaveSequence;

/// Magic tag of the capture configuration blob.
pub const CAPTURE_CONFIG_MAGIC: [u8; 4] = *b"CPCF";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureStep {
    window_ns: f64,
    delay_ns: f64,
    accumulate: bool,
}

impl CaptureStep {
    pub fn new(window_ns: f64, delay_ns: f64, accumulate: bool) -> Result<Self> {
        if !window_ns.is_finite() || window_ns <= 0.0 {
            return Err(Error::invalid_argument(
                "window",
                window_ns,
                "must be finite and positive",
            ));
        }
        if !delay_ns.is_finite() || delay_ns < 0.0 {
            return Err(Error::invalid_argument(
                "delay",
                delay_ns,
                "must be finite and not negative",
            ));
        }
        Ok(CaptureStep {
            window_ns,
            delay_ns,
            accumulate,
        })
    }

    pub fn window_ns(&self) -> f64 {
        self.window_ns
    }

    pub fn delay_ns(&self) -> f64 {
        self.delay_ns
    }

    pub fn accumulate(&self) -> bool {
        self.accumulate
    }
}

/// A capture step the hardware will skip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkippedCapture {
    pub step_id: u32,
    pub delay_ns: f64,
    /// Duration plus post blank of the paired wave step.
    pub interval_ns: f64,
}

/// A skipped capture step of a configured capture unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureHazard {
    pub unit: CaptureUnitId,
    pub step_id: u32,
    pub delay_ns: f64,
    pub interval_ns: f64,
}

/// Capture steps keyed by step id, bound to the AWG whose output is captured.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSequence {
    awg: AwgId,
    sampling_rate_msps: f64,
    is_iq: bool,
    steps: BTreeMap<u32, CaptureStep>,
}

impl CaptureSequence {
    pub fn new(awg: AwgId, sampling_rate_msps: f64, is_iq: bool) -> Result<Self> {
        if !sampling_rate_msps.is_finite() || sampling_rate_msps <= 0.0 {
            return Err(Error::invalid_argument(
                "sampling_rate",
                sampling_rate_msps,
                "must be finite and positive",
            ));
        }
        Ok(CaptureSequence {
            awg,
            sampling_rate_msps,
            is_iq,
            steps: BTreeMap::new(),
        })
    }

    pub fn add_step(
        &mut self,
        step_id: u32,
        window_ns: f64,
        delay_ns: f64,
        accumulate: bool,
    ) -> Result<&mut Self> {
        let step = CaptureStep::new(window_ns, delay_ns, accumulate)?;
        if self.steps.contains_key(&step_id) {
            return Err(Error::invalid_argument(
                "step_id",
                step_id,
                "is already part of the sequence",
            ));
        }
        self.steps.insert(step_id, step);
        Ok(self)
    }

    pub fn awg(&self) -> AwgId {
        self.awg
    }

    pub fn sampling_rate_msps(&self) -> f64 {
        self.sampling_rate_msps
    }

    pub fn is_iq(&self) -> bool {
        self.is_iq
    }

    pub fn step(&self, step_id: u32) -> Option<&CaptureStep> {
        self.steps.get(&step_id)
    }

    pub fn steps(&self) -> impl Iterator<Item = (u32, &CaptureStep)> {
        self.steps.iter().map(|(&id, step)| (id, step))
    }

    pub fn step_ids(&self) -> Vec<u32> {
        self.steps.keys().copied().collect()
    }

    pub fn num_steps(&self) -> usize {
        self.steps.len()
    }

    /// Capture steps whose delay exceeds the interval of the matching step of `waves`.
    ///
    /// Steps without a wave counterpart and steps paired with an infinite wave
    /// step are never skipped.
    pub fn skipped_steps(&self, waves: &WaveSequence) -> Vec<SkippedCapture> {
        self.steps()
            .filter_map(|(step_id, step)| {
                let interval_ns = waves.step_interval_ns(step_id)?;
                (step.delay_ns > interval_ns).then_some(SkippedCapture {
                    step_id,
                    delay_ns: step.delay_ns,
                    interval_ns,
                })
            })
            .collect()
    }

    pub fn is_step_skipped(&self, step_id: u32, waves: &WaveSequence) -> bool {
        match (self.step(step_id), waves.step_interval_ns(step_id)) {
            (Some(step), Some(interval)) => step.delay_ns > interval,
            _ => false,
        }
    }

    /// Serialize the sequence payload, steps in ascending id order.
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(20 + 24 * self.steps.len());
        buf.put_u32_le(self.awg.index());
        buf.put_u32_le(u32::from(self.is_iq));
        buf.put_f64_le(self.sampling_rate_msps);
        buf.put_u32_le(self.steps.len() as u32);
        for (step_id, step) in self.steps() {
            buf.put_u32_le(step_id);
            buf.put_u32_le(u32::from(step.accumulate));
            buf.put_f64_le(step.window_ns);
            buf.put_f64_le(step.delay_ns);
        }
        buf.freeze()
    }

    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(data, "capture sequence");
        let awg = AwgId::try_from(reader.u32()?).map_err(|e| Error::format(e.to_string()))?;
        let is_iq = reader.u32()? != 0;
        let rate = reader.f64()?;
        let mut sequence =
            CaptureSequence::new(awg, rate, is_iq).map_err(|e| Error::format(e.to_string()))?;
        let count = reader.u32()?;
        for _ in 0..count {
            let step_id = reader.u32()?;
            let accumulate = reader.u32()? != 0;
            let window_ns = reader.f64()?;
            let delay_ns = reader.f64()?;
            sequence
                .add_step(step_id, window_ns, delay_ns, accumulate)
                .map_err(|e| Error::format(e.to_string()))?;
        }
        reader.finish()?;
        Ok(sequence)
    }
}

/// Capture sequences of all capture units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureConfig {
    sequences: BTreeMap<CaptureUnitId, CaptureSequence>,
}

impl CaptureConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_capture_sequence(
        &mut self,
        unit: CaptureUnitId,
        sequence: CaptureSequence,
    ) -> Result<&mut Self> {
        if self.sequences.contains_key(&unit) {
            return Err(Error::invalid_argument(
                "unit",
                unit,
                "already has a capture sequence",
            ));
        }
        if self.sequences.len() >= MAX_CAPTURE_SEQUENCES {
            return Err(Error::invalid_argument(
                "unit",
                unit,
                format!("at most {MAX_CAPTURE_SEQUENCES} capture sequences are supported"),
            ));
        }
        self.sequences.insert(unit, sequence);
        Ok(self)
    }

    pub fn get(&self, unit: CaptureUnitId) -> Option<&CaptureSequence> {
        self.sequences.get(&unit)
    }

    /// Sequences in ascending unit order.
    pub fn iter(&self) -> impl Iterator<Item = (CaptureUnitId, &CaptureSequence)> {
        self.sequences.iter().map(|(&unit, seq)| (unit, seq))
    }

    pub fn units(&self) -> Vec<CaptureUnitId> {
        self.sequences.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_slice(&CAPTURE_CONFIG_MAGIC);
        buf.put_u32_le(self.sequences.len() as u32);
        for (unit, sequence) in self.iter() {
            let payload = sequence.serialize();
            buf.put_u32_le(unit.index());
            buf.put_u32_le(payload.len() as u32);
            buf.put_slice(&payload);
        }
        buf.freeze()
    }

    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(data, "capture configuration");
        let magic = reader.tag()?;
        if magic != CAPTURE_CONFIG_MAGIC {
            return Err(Error::format(format!(
                "unknown capture configuration tag {:?}",
                String::from_utf8_lossy(&magic)
            )));
        }
        let count = reader.u32()?;
        let mut config = CaptureConfig::new();
        for _ in 0..count {
            let unit =
                CaptureUnitId::try_from(reader.u32()?).map_err(|e| Error::format(e.to_string()))?;
            let len = reader.u32()? as usize;
            let sequence = CaptureSequence::deserialize(reader.bytes(len)?)?;
            config
                .add_capture_sequence(unit, sequence)
                .map_err(|e| Error::format(e.to_string()))?;
        }
        reader.finish()?;
        Ok(config)
    }

    /// Every capture step the hardware will skip, given the wave sequences of the paired AWGs.
    pub fn hazards(&self, waves: &BTreeMap<AwgId, WaveSequence>) -> Vec<CaptureHazard> {
        self.iter()
            .filter_map(|(unit, sequence)| Some((unit, sequence, waves.get(&sequence.awg())?)))
            .flat_map(|(unit, sequence, waves)| {
                sequence
                    .skipped_steps(waves)
                    .into_iter()
                    .map(move |skipped| CaptureHazard {
                        unit,
                        step_id: skipped.step_id,
                        delay_ns: skipped.delay_ns,
                        interval_ns: skipped.interval_ns,
                    })
            })
            .collect()
    }
}
