// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

//! Stimulus upload of the stimulus generators.

use std::collections::BTreeMap;

use bytes::Bytes;

use rftc_common::{StgId, UnitId};
use rftc_log::info;
use rftc_sequence::{Stimulus, WaveChunk};

use crate::arena;
use crate::regmap::{
    CHUNK_ADDR, CHUNK_BLANK_WORDS, CHUNK_REPEATS, CHUNK_WAVE_WORDS, DATA_ADDR, DATA_LEN,
    NUM_CHUNKS, NUM_SEQ_REPEATS, NUM_WAIT_WORDS, STIMULUS_RAM_BASE,
};
use crate::unit::{Module, Stg, StgCtrl};
use crate::{RegisterAccess, Result};

impl<R: RegisterAccess> StgCtrl<'_, R> {
    /// Upload a batch of stimuli, replacing any earlier batch.
    ///
    /// The chunks of all stimuli are placed back to back from the start of
    /// the wave memory. A batch that does not fit is rejected before any
    /// memory write.
    pub fn set_stimuli(&mut self, stimuli: &BTreeMap<StgId, Stimulus>) -> Result<()> {
        let format = self.ctx.settings.sample_format()?;
        let blocks: Vec<(StgId, u32, &WaveChunk, Bytes)> = stimuli
            .iter()
            .flat_map(|(&stg, stimulus)| {
                stimulus
                    .chunks()
                    .iter()
                    .zip(stimulus.serialize_chunks(format))
                    .zip(0u32..)
                    .map(move |((chunk, data), i)| (stg, i, chunk, data))
            })
            .collect();
        let sizes: Vec<u64> = blocks.iter().map(|(.., data)| data.len() as u64).collect();
        let offsets = arena::allocate(&sizes, self.ctx.settings.wave_ram_size)?;

        let show_progress = self.ctx.settings.show_upload_progress;
        let regs = &mut self.ctx.regs;
        // First address and total length per generator.
        let mut placed: BTreeMap<StgId, (u64, u64)> = BTreeMap::new();
        for ((stg, i, chunk, data), offset) in blocks.iter().zip(&offsets) {
            let addr = STIMULUS_RAM_BASE + offset;
            regs.write_dram(addr, data, show_progress)?;

            let entry = Stg::LAYOUT.chunk(stg.index(), *i);
            regs.write_u64(entry + CHUNK_ADDR, addr)?;
            regs.write(entry + CHUNK_WAVE_WORDS, chunk.num_wave_words())?;
            regs.write(entry + CHUNK_BLANK_WORDS, chunk.num_blank_words())?;
            regs.write(entry + CHUNK_REPEATS, chunk.num_repeats())?;
            placed.entry(*stg).or_insert((addr, 0)).1 += data.len() as u64;
        }

        for (&stg, stimulus) in stimuli {
            let unit = Stg::LAYOUT.unit(stg.index());
            let (addr, num_bytes) = placed.get(&stg).copied().unwrap_or((STIMULUS_RAM_BASE, 0));
            regs.write(unit + NUM_WAIT_WORDS, stimulus.num_wait_words())?;
            regs.write(unit + NUM_SEQ_REPEATS, stimulus.num_seq_repeats())?;
            regs.write(unit + NUM_CHUNKS, stimulus.num_chunks() as u32)?;
            regs.write_u64(unit + DATA_ADDR, addr)?;
            regs.write_u64(unit + DATA_LEN, num_bytes)?;
            info!(
                self.ctx.diagnostics,
                "Uploaded {} chunks ({} bytes) to {}",
                stimulus.num_chunks(),
                num_bytes,
                stg
            );
        }
        Ok(())
    }
}
