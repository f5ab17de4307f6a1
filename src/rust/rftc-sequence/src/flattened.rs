// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

//! Reconstruction of step waveforms from device memory.
//!
//! The device describes a stored sequence with a [`ParameterBlock`]. Every
//! step occupies its prime samples rounded up to whole words in the sample
//! memory; the padding is skipped when reading back.

use bytes::{BufMut, Bytes, BytesMut};
use indexmap::IndexMap;
use num_complex::Complex;

use rftc_common::units::{checked_ceil_to_word, samples_to_ns};
use rftc_common::{Error, Result};

use crate::codec::{Reader, SampleFormat};

/// Offset of the first step record in a parameter block.
pub const PARAMETER_HEADER_LEN: usize = 16;
/// Stride of the step records in a parameter block.
pub const STEP_RECORD_LEN: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepRecord {
    pub step_id: u32,
    pub infinite: bool,
    pub num_prime_samples: u64,
    pub num_post_blank_samples: u64,
}

/// Step metadata of a stored sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBlock {
    pub is_iq: bool,
    pub sampling_rate_msps: f64,
    pub records: Vec<StepRecord>,
}

impl ParameterBlock {
    pub fn encoded_len(num_steps: usize) -> usize {
        PARAMETER_HEADER_LEN + STEP_RECORD_LEN * num_steps
    }

    /// Decode a block. Bytes past the last record are ignored.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(data, "parameter block");
        let num_steps = reader.u32()?;
        let is_iq = reader.u32()? != 0;
        let sampling_rate_msps = reader.f64()?;
        if !sampling_rate_msps.is_finite() || sampling_rate_msps <= 0.0 {
            return Err(Error::format(format!(
                "invalid sampling rate {sampling_rate_msps} in parameter block"
            )));
        }
        if reader.remaining() < STEP_RECORD_LEN * num_steps as usize {
            return Err(Error::format(format!(
                "parameter block announces {num_steps} steps but holds only {} bytes of records",
                reader.remaining()
            )));
        }
        let records = (0..num_steps)
            .map(|_| {
                Ok(StepRecord {
                    step_id: reader.u32()?,
                    infinite: reader.u32()? != 0,
                    num_prime_samples: reader.u64()?,
                    num_post_blank_samples: reader.u64()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ParameterBlock {
            is_iq,
            sampling_rate_msps,
            records,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::encoded_len(self.records.len()));
        buf.put_u32_le(self.records.len() as u32);
        buf.put_u32_le(u32::from(self.is_iq));
        buf.put_f64_le(self.sampling_rate_msps);
        for record in &self.records {
            buf.put_u32_le(record.step_id);
            buf.put_u32_le(u32::from(record.infinite));
            buf.put_u64_le(record.num_prime_samples);
            buf.put_u64_le(record.num_post_blank_samples);
        }
        buf.freeze()
    }

    fn channels(&self) -> u64 {
        if self.is_iq { 2 } else { 1 }
    }

    fn stored_bytes(&self, record: &StepRecord, format: SampleFormat) -> Option<u64> {
        checked_ceil_to_word(record.num_prime_samples)?
            .checked_mul(self.channels())?
            .checked_mul(format.bytes_per_sample() as u64)
    }

    /// Bytes of sample memory the described steps occupy.
    ///
    /// Fails if the sample counts do not fit into 64 bits.
    pub fn sample_bytes(&self, format: SampleFormat) -> Result<u64> {
        self.records
            .iter()
            .try_fold(0u64, |total, r| total.checked_add(self.stored_bytes(r, format)?))
            .ok_or_else(|| {
                Error::format("parameter block describes more sample memory than is addressable")
            })
    }
}

/// Samples of one reconstructed step.
#[derive(Debug, Clone, PartialEq)]
pub struct Flattened<T> {
    step_id: u32,
    samples: Vec<T>,
    sampling_rate_msps: f64,
    infinite: bool,
    num_post_blank_samples: u64,
}

pub type FlattenedWaveform = Flattened<i16>;
pub type FlattenedIQWaveform = Flattened<Complex<i16>>;

impl<T> Flattened<T> {
    pub fn step_id(&self) -> u32 {
        self.step_id
    }

    /// Prime samples, excluding the post blank.
    pub fn samples(&self) -> &[T] {
        &self.samples
    }

    pub fn num_prime_samples(&self) -> u64 {
        self.samples.len() as u64
    }

    pub fn sampling_rate_msps(&self) -> f64 {
        self.sampling_rate_msps
    }

    pub fn is_infinite(&self) -> bool {
        self.infinite
    }

    /// Duration of the prime samples; infinite steps last forever.
    pub fn duration_ns(&self) -> f64 {
        if self.infinite {
            f64::INFINITY
        } else {
            samples_to_ns(self.num_prime_samples(), self.sampling_rate_msps)
        }
    }

    pub fn num_post_blank_samples(&self) -> u64 {
        self.num_post_blank_samples
    }

    pub fn post_blank_ns(&self) -> f64 {
        samples_to_ns(self.num_post_blank_samples, self.sampling_rate_msps)
    }

    /// Sample times in ns relative to the step start.
    pub fn times_ns(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.num_prime_samples()).map(|k| samples_to_ns(k, self.sampling_rate_msps))
    }
}

impl FlattenedIQWaveform {
    pub fn i_samples(&self) -> Vec<i16> {
        self.samples.iter().map(|s| s.re).collect()
    }

    pub fn q_samples(&self) -> Vec<i16> {
        self.samples.iter().map(|s| s.im).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlattenedStep {
    Real(FlattenedWaveform),
    IQ(FlattenedIQWaveform),
}

macro_rules! delegate {
    ($self:ident.$method:ident()) => {
        match $self {
            FlattenedStep::Real(w) => w.$method(),
            FlattenedStep::IQ(w) => w.$method(),
        }
    };
}

impl FlattenedStep {
    pub fn step_id(&self) -> u32 {
        delegate!(self.step_id())
    }

    pub fn duration_ns(&self) -> f64 {
        delegate!(self.duration_ns())
    }

    pub fn post_blank_ns(&self) -> f64 {
        delegate!(self.post_blank_ns())
    }

    pub fn num_prime_samples(&self) -> u64 {
        delegate!(self.num_prime_samples())
    }

    pub fn is_infinite(&self) -> bool {
        delegate!(self.is_infinite())
    }

    pub fn as_real(&self) -> Option<&FlattenedWaveform> {
        match self {
            FlattenedStep::Real(w) => Some(w),
            FlattenedStep::IQ(_) => None,
        }
    }

    pub fn as_iq(&self) -> Option<&FlattenedIQWaveform> {
        match self {
            FlattenedStep::IQ(w) => Some(w),
            FlattenedStep::Real(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    StepStart,
    PostBlankStart,
}

/// Position annotating a rendered sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct StepBoundary {
    pub position_ns: f64,
    pub label: String,
    pub kind: BoundaryKind,
}

/// Reconstructed steps in the order the device stores them.
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedSequence {
    is_iq: bool,
    sampling_rate_msps: f64,
    steps: IndexMap<u32, FlattenedStep>,
}

impl FlattenedSequence {
    pub fn is_iq(&self) -> bool {
        self.is_iq
    }

    pub fn sampling_rate_msps(&self) -> f64 {
        self.sampling_rate_msps
    }

    pub fn get(&self, step_id: u32) -> Option<&FlattenedStep> {
        self.steps.get(&step_id)
    }

    pub fn steps(&self) -> impl Iterator<Item = &FlattenedStep> {
        self.steps.values()
    }

    pub fn step_ids(&self) -> Vec<u32> {
        self.steps.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Whether a blank region follows the step.
    pub fn has_post_blank(&self, step_id: u32) -> Option<bool> {
        self.get(step_id).map(|s| s.post_blank_ns() > 0.0)
    }

    pub fn duration_ns(&self) -> f64 {
        self.steps()
            .map(|s| s.duration_ns() + s.post_blank_ns())
            .sum()
    }

    /// Start of every step and of every post blank region.
    ///
    /// Nothing is placed after an infinite step.
    pub fn step_boundaries(&self) -> Vec<StepBoundary> {
        let mut boundaries = Vec::new();
        let mut position_ns = 0.0;
        for step in self.steps() {
            boundaries.push(StepBoundary {
                position_ns,
                label: format!("step {}", step.step_id()),
                kind: BoundaryKind::StepStart,
            });
            if step.is_infinite() {
                break;
            }
            position_ns += step.duration_ns();
            if step.post_blank_ns() > 0.0 {
                boundaries.push(StepBoundary {
                    position_ns,
                    label: format!("step {} post blank", step.step_id()),
                    kind: BoundaryKind::PostBlankStart,
                });
                position_ns += step.post_blank_ns();
            }
        }
        boundaries
    }
}

/// Rebuild the steps described by `block` from the sample memory `data`.
pub fn reconstruct(
    block: &ParameterBlock,
    data: &[u8],
    format: SampleFormat,
) -> Result<FlattenedSequence> {
    let required = block.sample_bytes(format)?;
    if (data.len() as u64) < required {
        return Err(Error::format(format!(
            "sample memory holds {} bytes, the parameter block requires {required}",
            data.len()
        )));
    }
    let mut reader = Reader::new(data, "sample memory");
    let mut steps = IndexMap::with_capacity(block.records.len());
    for record in &block.records {
        let stored = block
            .stored_bytes(record, format)
            .ok_or_else(|| Error::format(format!("step {} is too large", record.step_id)))?;
        let bytes = reader.bytes(stored as usize)?;
        let prime_len = (record.num_prime_samples * block.channels()) as usize
            * format.bytes_per_sample();
        let prime = &bytes[..prime_len];
        let step = if block.is_iq {
            FlattenedStep::IQ(Flattened {
                step_id: record.step_id,
                samples: format.deserialize_iq(prime)?,
                sampling_rate_msps: block.sampling_rate_msps,
                infinite: record.infinite,
                num_post_blank_samples: record.num_post_blank_samples,
            })
        } else {
            FlattenedStep::Real(Flattened {
                step_id: record.step_id,
                samples: format.deserialize_i16(prime)?,
                sampling_rate_msps: block.sampling_rate_msps,
                infinite: record.infinite,
                num_post_blank_samples: record.num_post_blank_samples,
            })
        };
        if steps.insert(record.step_id, step).is_some() {
            return Err(Error::format(format!(
                "step {} appears twice in the parameter block",
                record.step_id
            )));
        }
    }
    Ok(FlattenedSequence {
        is_iq: block.is_iq,
        sampling_rate_msps: block.sampling_rate_msps,
        steps,
    })
}
