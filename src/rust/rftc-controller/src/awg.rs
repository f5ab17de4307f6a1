// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

//! Wave sequence upload of the arbitrary waveform generators.

use std::collections::BTreeMap;

use bytes::Bytes;

use rftc_common::{AwgId, UnitId};
use rftc_log::info;
use rftc_sequence::WaveSequence;

use crate::arena;
use crate::capture::report_hazards;
use crate::regmap::{AWG_RAM_BASE, DATA_ADDR, DATA_LEN, PARAM_ADDR, PARAM_LEN};
use crate::unit::{Awg, AwgCtrl, Module};
use crate::{RegisterAccess, Result};

impl<R: RegisterAccess> AwgCtrl<'_, R> {
    /// Upload a batch of wave sequences, replacing any earlier batch.
    ///
    /// The batch is placed from the start of the AWG wave memory and rejected
    /// as a whole before any sample is synthesized if it does not fit.
    pub fn set_wave_sequences(&mut self, sequences: BTreeMap<AwgId, WaveSequence>) -> Result<()> {
        let format = self.ctx.settings.sample_format()?;
        let parameters: Vec<Bytes> = sequences
            .values()
            .map(WaveSequence::serialize_parameters)
            .collect();
        let sizes: Vec<u64> = sequences
            .values()
            .zip(&parameters)
            .flat_map(|(sequence, params)| {
                [params.len() as u64, sequence.sample_image_len(format)]
            })
            .collect();
        let offsets = arena::allocate(&sizes, self.ctx.settings.wave_ram_size)?;

        let show_progress = self.ctx.settings.show_upload_progress;
        let regs = &mut self.ctx.regs;
        for (((awg, sequence), params), offsets) in sequences
            .iter()
            .zip(&parameters)
            .zip(offsets.chunks_exact(2))
        {
            let samples = sequence.serialize_samples(format);
            let param_addr = AWG_RAM_BASE + offsets[0];
            let data_addr = AWG_RAM_BASE + offsets[1];
            regs.write_dram(param_addr, params, show_progress)?;
            regs.write_dram(data_addr, &samples, show_progress)?;

            let unit = Awg::LAYOUT.unit(awg.index());
            regs.write_u64(unit + PARAM_ADDR, param_addr)?;
            regs.write(unit + PARAM_LEN, params.len() as u32)?;
            regs.write_u64(unit + DATA_ADDR, data_addr)?;
            regs.write_u64(unit + DATA_LEN, samples.len() as u64)?;
            info!(
                self.ctx.diagnostics,
                "Uploaded {} steps ({} sample bytes) to {}",
                sequence.num_steps(),
                samples.len(),
                awg
            );
        }
        self.ctx.uploads.waves = sequences;
        report_hazards(self.ctx);
        Ok(())
    }

    /// The wave sequence last uploaded to `awg`.
    pub fn wave_sequence(&self, awg: AwgId) -> Option<&WaveSequence> {
        self.ctx.uploads.waves.get(&awg)
    }
}
