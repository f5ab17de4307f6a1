// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

//! Capture configuration upload and captured data readback.

use rftc_common::{CaptureUnitId, UnitId};
use rftc_log::{info, warn};
use rftc_sequence::{CaptureConfig, CaptureHazard, FlattenedSequence, ParameterBlock, reconstruct};

use crate::controller::Context;
use crate::regmap::{
    CAPTURE_CONFIG_ADDR, CAPTURE_PARAM_AREA, CAPTURE_RESULT_STRIDE, DATA_ADDR, PARAM_ADDR,
    capture_result_addr,
};
use crate::unit::{Capture, CaptureCtrl, Module};
use crate::{RegisterAccess, Result};

/// Warn about every capture step the current uploads make the hardware skip.
pub(crate) fn report_hazards<R>(ctx: &Context<R>) {
    let Some(config) = &ctx.uploads.capture else {
        return;
    };
    for hazard in config.hazards(&ctx.uploads.waves) {
        warn!(
            ctx.diagnostics,
            "{} skips step {}: capture delay {} ns exceeds the step interval of {} ns",
            hazard.unit,
            hazard.step_id,
            hazard.delay_ns,
            hazard.interval_ns
        );
    }
}

impl<R: RegisterAccess> CaptureCtrl<'_, R> {
    /// Upload the capture configuration and point every configured unit at its result area.
    pub fn set_capture_config(&mut self, config: CaptureConfig) -> Result<()> {
        let blob = config.serialize();
        let show_progress = self.ctx.settings.show_upload_progress;
        let regs = &mut self.ctx.regs;
        regs.write_dram(CAPTURE_CONFIG_ADDR, &blob, show_progress)?;
        regs.write_u64(Capture::LAYOUT.config_addr(), CAPTURE_CONFIG_ADDR)?;
        regs.write(Capture::LAYOUT.config_len(), blob.len() as u32)?;
        for unit in config.units() {
            let base = Capture::LAYOUT.unit(unit.index());
            let result_addr = capture_result_addr(unit.index());
            regs.write_u64(base + PARAM_ADDR, result_addr)?;
            regs.write_u64(base + DATA_ADDR, result_addr + CAPTURE_PARAM_AREA)?;
        }
        info!(
            self.ctx.diagnostics,
            "Uploaded capture configuration for units {:?} ({} bytes)",
            config.units(),
            blob.len()
        );
        self.ctx.uploads.capture = Some(config);
        report_hazards(self.ctx);
        Ok(())
    }

    pub fn capture_config(&self) -> Option<&CaptureConfig> {
        self.ctx.uploads.capture.as_ref()
    }

    /// Capture steps the hardware will skip with the current uploads.
    pub fn hazards(&self) -> Vec<CaptureHazard> {
        self.ctx
            .uploads
            .capture
            .as_ref()
            .map(|config| config.hazards(&self.ctx.uploads.waves))
            .unwrap_or_default()
    }

    /// Whether `step_id` of `unit` is skipped. Unknown units and steps are never skipped.
    pub fn is_capture_step_skipped(&self, unit: CaptureUnitId, step_id: u32) -> bool {
        let Some(sequence) = self.ctx.uploads.capture.as_ref().and_then(|c| c.get(unit)) else {
            return false;
        };
        self.ctx
            .uploads
            .waves
            .get(&sequence.awg())
            .is_some_and(|waves| sequence.is_step_skipped(step_id, waves))
    }

    /// Read back and reconstruct what `unit` captured in its last run.
    pub fn read_captured(&mut self, unit: CaptureUnitId) -> Result<FlattenedSequence> {
        let format = self.ctx.settings.sample_format()?;
        let addr = capture_result_addr(unit.index());
        let header = self
            .ctx
            .regs
            .read_dram(addr, CAPTURE_PARAM_AREA as usize)?;
        let block = ParameterBlock::decode(&header)?;
        let num_bytes = block.sample_bytes(format)?;
        let area = CAPTURE_RESULT_STRIDE - CAPTURE_PARAM_AREA;
        if num_bytes > area {
            return Err(rftc_common::Error::format(format!(
                "{unit} reports {num_bytes} bytes of samples, its result area holds {area}"
            ))
            .into());
        }
        let data = self
            .ctx
            .regs
            .read_dram(addr + CAPTURE_PARAM_AREA, num_bytes as usize)?;
        Ok(reconstruct(&block, &data, format)?)
    }
}
