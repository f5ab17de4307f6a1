// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

//! Stimulus generator input: wait padding followed by repeated chunks.
//!
//! The expanded sample stream of a [`Stimulus`] is
//!
//! ```text
//! wait ++ (chunk0 * repeats0 ++ chunk1 * repeats1 ++ ...) * seq_repeats
//! ```
//!
//! where every chunk is its wave part followed by its blank words.

use bytes::{Bytes, BytesMut};

use rftc_common::hardware::{
    MAX_CHUNKS_PER_STIMULUS, SAMPLES_PER_WORD, WAVE_PART_MIN_SAMPLES,
};
use rftc_common::units::words_to_samples;
use rftc_common::{Error, Result};

use crate::codec::SampleFormat;
use crate::lazy::LazySamples;

/// A repeatable wave part followed by a blank region.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveChunk {
    samples: Vec<i16>,
    num_blank_words: u32,
    num_repeats: u32,
}

impl WaveChunk {
    pub fn new(samples: Vec<i16>, num_blank_words: u32, num_repeats: u32) -> Result<Self> {
        if samples.is_empty() || samples.len() as u64 % WAVE_PART_MIN_SAMPLES != 0 {
            return Err(Error::invalid_argument(
                "samples",
                format!("{} samples", samples.len()),
                format!("length must be a positive multiple of {WAVE_PART_MIN_SAMPLES}"),
            ));
        }
        if num_repeats == 0 {
            return Err(Error::invalid_argument(
                "num_repeats",
                num_repeats,
                "must be at least 1",
            ));
        }
        Ok(WaveChunk {
            samples,
            num_blank_words,
            num_repeats,
        })
    }

    pub fn wave_samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn num_wave_samples(&self) -> u64 {
        self.samples.len() as u64
    }

    pub fn num_wave_words(&self) -> u32 {
        (self.num_wave_samples() / SAMPLES_PER_WORD) as u32
    }

    pub fn num_blank_words(&self) -> u32 {
        self.num_blank_words
    }

    pub fn num_blank_samples(&self) -> u64 {
        words_to_samples(self.num_blank_words)
    }

    pub fn num_repeats(&self) -> u32 {
        self.num_repeats
    }

    /// Samples of one repetition: wave part plus blank.
    pub fn num_samples(&self) -> u64 {
        self.num_wave_samples() + self.num_blank_samples()
    }

    pub(crate) fn checked_expanded_len(&self) -> Option<u64> {
        self.num_samples().checked_mul(u64::from(self.num_repeats))
    }

    /// Sample at `offset` within one repetition.
    pub(crate) fn sample_at(&self, offset: u64) -> i16 {
        self.samples.get(offset as usize).copied().unwrap_or(0)
    }
}

/// Input of one stimulus generator.
#[derive(Debug, Clone, PartialEq)]
pub struct Stimulus {
    num_wait_words: u32,
    num_seq_repeats: u32,
    chunks: Vec<WaveChunk>,
}

impl Stimulus {
    pub fn new(num_wait_words: u32, num_seq_repeats: u32) -> Result<Self> {
        if num_seq_repeats == 0 {
            return Err(Error::invalid_argument(
                "num_seq_repeats",
                num_seq_repeats,
                "must be at least 1",
            ));
        }
        Ok(Stimulus {
            num_wait_words,
            num_seq_repeats,
            chunks: vec![],
        })
    }

    /// Append a chunk. Nothing is modified when the arguments are rejected.
    pub fn add_chunk(
        &mut self,
        samples: Vec<i16>,
        num_blank_words: u32,
        num_repeats: u32,
    ) -> Result<&mut Self> {
        if self.chunks.len() >= MAX_CHUNKS_PER_STIMULUS {
            return Err(Error::invalid_argument(
                "chunks",
                self.chunks.len() + 1,
                format!("a stimulus holds at most {MAX_CHUNKS_PER_STIMULUS} chunks"),
            ));
        }
        let chunk = WaveChunk::new(samples, num_blank_words, num_repeats)?;
        let fits = chunk
            .checked_expanded_len()
            .and_then(|len| len.checked_add(self.checked_cycle_len()?))
            .and_then(|cycle| cycle.checked_mul(u64::from(self.num_seq_repeats)))
            .and_then(|len| len.checked_add(self.num_wait_samples()))
            .is_some();
        if !fits {
            return Err(Error::invalid_argument(
                "num_repeats",
                num_repeats,
                "the expanded stimulus would exceed 2^64 samples",
            ));
        }
        self.chunks.push(chunk);
        Ok(self)
    }

    pub fn num_wait_words(&self) -> u32 {
        self.num_wait_words
    }

    pub fn num_wait_samples(&self) -> u64 {
        words_to_samples(self.num_wait_words)
    }

    pub fn num_seq_repeats(&self) -> u32 {
        self.num_seq_repeats
    }

    pub fn chunks(&self) -> &[WaveChunk] {
        &self.chunks
    }

    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    fn checked_cycle_len(&self) -> Option<u64> {
        self.chunks
            .iter()
            .try_fold(0u64, |acc, c| acc.checked_add(c.checked_expanded_len()?))
    }

    /// Samples of one traversal of the chunk list.
    pub fn cycle_len(&self) -> u64 {
        // Bounded at construction.
        self.checked_cycle_len().unwrap_or(u64::MAX)
    }

    /// Length of the expanded sample stream.
    pub fn num_samples(&self, include_wait: bool) -> u64 {
        let body = self.cycle_len() * u64::from(self.num_seq_repeats);
        if include_wait {
            body + self.num_wait_samples()
        } else {
            body
        }
    }

    /// Materialize the expanded sample stream.
    ///
    /// Only meant for small stimuli: the result holds every expanded sample.
    pub fn all_samples(&self, include_wait: bool) -> Vec<i16> {
        let mut samples = Vec::with_capacity(self.num_samples(include_wait) as usize);
        if include_wait {
            samples.resize(self.num_wait_samples() as usize, 0);
        }
        for _ in 0..self.num_seq_repeats {
            for chunk in &self.chunks {
                for _ in 0..chunk.num_repeats {
                    samples.extend_from_slice(&chunk.samples);
                    samples.resize(samples.len() + chunk.num_blank_samples() as usize, 0);
                }
            }
        }
        samples
    }

    /// A view of the expanded sample stream that computes each sample on access.
    pub fn all_samples_lazy(&self, include_wait: bool) -> LazySamples<'_> {
        LazySamples::new(self, include_wait)
    }

    /// Bytes the wave parts occupy in device memory.
    pub fn serialized_size(&self, format: SampleFormat) -> u64 {
        self.chunks
            .iter()
            .map(|c| c.num_wave_samples() * format.bytes_per_sample() as u64)
            .sum()
    }

    /// Raw wave part of every chunk, in chunk order.
    pub fn serialize_chunks(&self, format: SampleFormat) -> Vec<Bytes> {
        self.chunks
            .iter()
            .map(|c| format.serialize_i16(&c.samples))
            .collect()
    }

    /// All wave parts back to back.
    pub fn serialize(&self, format: SampleFormat) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.serialized_size(format) as usize);
        for chunk in &self.chunks {
            format.put_samples(&mut buf, chunk.samples.iter().map(|&s| i32::from(s)));
        }
        buf.freeze()
    }
}
