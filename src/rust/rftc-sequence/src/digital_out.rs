// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

//! Digital output vectors and sequences.

use std::collections::BTreeMap;

use bytes::{BufMut, Bytes, BytesMut};

use rftc_common::hardware::{MAX_DIGITAL_OUT_DURATION_NS, MAX_DIGITAL_OUT_ENTRIES};
use rftc_common::{Error, Result};

use crate::codec::Reader;

/// One output value held for a duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DigitalOutputEntry {
    pub value: u8,
    pub duration_ns: f64,
}

/// Output values played one after another after an initial delay.
#[derive(Debug, Clone, PartialEq)]
pub struct DigitalOutputVector {
    delay_ns: f64,
    entries: Vec<DigitalOutputEntry>,
}

impl DigitalOutputVector {
    pub fn new(delay_ns: f64) -> Result<Self> {
        if !delay_ns.is_finite() || delay_ns < 0.0 {
            return Err(Error::invalid_argument(
                "delay",
                delay_ns,
                "must be finite and not negative",
            ));
        }
        Ok(DigitalOutputVector {
            delay_ns,
            entries: Vec::new(),
        })
    }

    pub fn add(&mut self, value: u8, duration_ns: f64) -> Result<&mut Self> {
        if !(duration_ns > 0.0 && duration_ns <= MAX_DIGITAL_OUT_DURATION_NS) {
            return Err(Error::invalid_argument(
                "duration",
                duration_ns,
                format!("must be within (0, {MAX_DIGITAL_OUT_DURATION_NS:e}] ns"),
            ));
        }
        if self.entries.len() >= MAX_DIGITAL_OUT_ENTRIES {
            return Err(Error::invalid_argument(
                "entries",
                self.entries.len() + 1,
                format!("at most {MAX_DIGITAL_OUT_ENTRIES} entries are supported"),
            ));
        }
        self.entries.push(DigitalOutputEntry { value, duration_ns });
        Ok(self)
    }

    pub fn delay_ns(&self) -> f64 {
        self.delay_ns
    }

    pub fn entries(&self) -> &[DigitalOutputEntry] {
        &self.entries
    }

    /// Delay plus the durations of all entries.
    pub fn duration_ns(&self) -> f64 {
        self.delay_ns + self.entries.iter().map(|e| e.duration_ns).sum::<f64>()
    }

    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(12 + 12 * self.entries.len());
        buf.put_f64_le(self.delay_ns);
        buf.put_u32_le(self.entries.len() as u32);
        for entry in &self.entries {
            buf.put_u32_le(u32::from(entry.value));
            buf.put_f64_le(entry.duration_ns);
        }
        buf.freeze()
    }

    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(data, "digital output vector");
        let vector = Self::read(&mut reader)?;
        reader.finish()?;
        Ok(vector)
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self> {
        let mut vector =
            DigitalOutputVector::new(reader.f64()?).map_err(|e| Error::format(e.to_string()))?;
        let count = reader.u32()?;
        for _ in 0..count {
            let raw = reader.u32()?;
            let value = u8::try_from(raw)
                .map_err(|_| Error::format(format!("output value {raw} exceeds 8 bits")))?;
            let duration_ns = reader.f64()?;
            vector
                .add(value, duration_ns)
                .map_err(|e| Error::format(e.to_string()))?;
        }
        Ok(vector)
    }
}

/// Digital output vectors keyed by step id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DigitalOutputSequence {
    steps: BTreeMap<u32, DigitalOutputVector>,
}

impl DigitalOutputSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_step(&mut self, step_id: u32, vector: DigitalOutputVector) -> Result<&mut Self> {
        if self.steps.contains_key(&step_id) {
            return Err(Error::invalid_argument(
                "step_id",
                step_id,
                "is already part of the sequence",
            ));
        }
        self.steps.insert(step_id, vector);
        Ok(self)
    }

    pub fn step(&self, step_id: u32) -> Option<&DigitalOutputVector> {
        self.steps.get(&step_id)
    }

    pub fn steps(&self) -> impl Iterator<Item = (u32, &DigitalOutputVector)> {
        self.steps.iter().map(|(&id, v)| (id, v))
    }

    pub fn step_ids(&self) -> Vec<u32> {
        self.steps.keys().copied().collect()
    }

    pub fn num_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u32_le(self.steps.len() as u32);
        for (step_id, vector) in self.steps() {
            let payload = vector.serialize();
            buf.put_u32_le(step_id);
            buf.put_u32_le(payload.len() as u32);
            buf.put_slice(&payload);
        }
        buf.freeze()
    }

    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(data, "digital output sequence");
        let count = reader.u32()?;
        let mut sequence = DigitalOutputSequence::new();
        for _ in 0..count {
            let step_id = reader.u32()?;
            let len = reader.u32()? as usize;
            let vector = DigitalOutputVector::deserialize(reader.bytes(len)?)?;
            sequence
                .add_step(step_id, vector)
                .map_err(|e| Error::format(e.to_string()))?;
        }
        reader.finish()?;
        Ok(sequence)
    }
}
