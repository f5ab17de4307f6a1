// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

//! Digital output sequence upload and cooperative triggers.

use std::collections::BTreeMap;

use bytes::Bytes;

use rftc_common::{DigitalOutId, DigitalOutTrigger, UnitId};
use rftc_log::info;
use rftc_sequence::DigitalOutputSequence;

use crate::mask::UnitMask;
use crate::regmap::{
    DIGITAL_OUT_AREA, PARAM_ADDR, PARAM_LEN, digital_out_addr, digital_out_trigger_mask,
};
use crate::unit::{DigitalOut, DigitalOutCtrl, Module};
use crate::{Error, RegisterAccess, Result};

impl<R: RegisterAccess> DigitalOutCtrl<'_, R> {
    /// Upload one sequence per digital output module.
    ///
    /// Every sequence is checked against its memory area before the first write.
    pub fn set_sequences(
        &mut self,
        sequences: &BTreeMap<DigitalOutId, DigitalOutputSequence>,
    ) -> Result<()> {
        let payloads: Vec<(DigitalOutId, Bytes)> = sequences
            .iter()
            .map(|(&unit, sequence)| (unit, sequence.serialize()))
            .collect();
        if let Some((_, largest)) = payloads.iter().max_by_key(|(_, data)| data.len()) {
            let required = largest.len() as u64;
            if required > DIGITAL_OUT_AREA {
                return Err(Error::CapacityExceeded {
                    required,
                    capacity: DIGITAL_OUT_AREA,
                });
            }
        }

        let show_progress = self.ctx.settings.show_upload_progress;
        for (unit, data) in &payloads {
            let addr = digital_out_addr(unit.index());
            let base = DigitalOut::LAYOUT.unit(unit.index());
            self.ctx.regs.write_dram(addr, data, show_progress)?;
            self.ctx.regs.write_u64(base + PARAM_ADDR, addr)?;
            self.ctx.regs.write(base + PARAM_LEN, data.len() as u32)?;
            info!(
                self.ctx.diagnostics,
                "Uploaded {} steps ({} bytes) to {}",
                sequences.get(unit).map_or(0, DigitalOutputSequence::num_steps),
                data.len(),
                unit
            );
        }
        Ok(())
    }

    /// Let `trigger` start (or stop starting) the given modules.
    pub fn set_cooperative_trigger(
        &mut self,
        trigger: DigitalOutTrigger,
        units: &[DigitalOutId],
        enabled: bool,
    ) -> Result<()> {
        UnitMask::update(
            &mut self.ctx.regs,
            digital_out_trigger_mask(trigger),
            1,
            units,
            enabled,
        )?;
        Ok(())
    }

    pub fn cooperative_trigger_units(
        &mut self,
        trigger: DigitalOutTrigger,
    ) -> Result<Vec<DigitalOutId>> {
        let mask = UnitMask::read(&mut self.ctx.regs, digital_out_trigger_mask(trigger), 1)?;
        Ok(mask.units())
    }
}
