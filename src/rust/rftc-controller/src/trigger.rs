// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

//! Global enables of the external trigger lines.

use rftc_common::ExternalTrigger;
use rftc_log::debug;

use crate::controller::Context;
use crate::mask::UnitMask;
use crate::regmap::EXTERNAL_TRIGGER_ENABLE;
use crate::{RegisterAccess, Result};

pub struct TriggerCtrl<'a, R> {
    ctx: &'a mut Context<R>,
}

impl<'a, R: RegisterAccess> TriggerCtrl<'a, R> {
    pub(crate) fn new(ctx: &'a mut Context<R>) -> Self {
        TriggerCtrl { ctx }
    }

    pub fn set_external_triggers_enabled(
        &mut self,
        lines: &[ExternalTrigger],
        enabled: bool,
    ) -> Result<()> {
        debug!(
            self.ctx.diagnostics,
            "Setting external triggers {:?} enabled = {}", lines, enabled
        );
        UnitMask::update(&mut self.ctx.regs, EXTERNAL_TRIGGER_ENABLE, 1, lines, enabled)?;
        Ok(())
    }

    pub fn enabled_external_triggers(&mut self) -> Result<Vec<ExternalTrigger>> {
        let mask = UnitMask::read(&mut self.ctx.regs, EXTERNAL_TRIGGER_ENABLE, 1)?;
        Ok(mask.units())
    }
}
