// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

//! The pulsed control protocol shared by all unit families.
//!
//! Every operation selects its units in the target-select mask, pulses one
//! bit of the master control register and releases the selection again,
//! whether or not the pulse succeeded.

use std::marker::PhantomData;
use std::time::Duration;

use rftc_common::{AwgId, CaptureUnitId, DigitalOutId, ExternalTrigger, StgId, UnitId};
use rftc_log::debug;

use crate::cancel::CancelToken;
use crate::controller::Context;
use crate::mask::UnitMask;
use crate::poll::{self, Condition};
use crate::regmap::{self, ModuleLayout, ctrl, status};
use crate::{RegisterAccess, Result};

/// A family of identical units sharing one module block.
pub trait Module {
    type Id: UnitId;
    const LAYOUT: ModuleLayout;
}

/// Families supporting pause, resume and restart.
pub trait Pausable: Module {}

#[derive(Debug, Clone, Copy)]
pub struct Awg;

#[derive(Debug, Clone, Copy)]
pub struct Stg;

#[derive(Debug, Clone, Copy)]
pub struct Capture;

#[derive(Debug, Clone, Copy)]
pub struct DigitalOut;

impl Module for Awg {
    type Id = AwgId;
    const LAYOUT: ModuleLayout = regmap::AWG;
}

impl Module for Stg {
    type Id = StgId;
    const LAYOUT: ModuleLayout = regmap::STG;
}

impl Module for Capture {
    type Id = CaptureUnitId;
    const LAYOUT: ModuleLayout = regmap::CAPTURE;
}

impl Module for DigitalOut {
    type Id = DigitalOutId;
    const LAYOUT: ModuleLayout = regmap::DIGITAL_OUT;
}

impl Pausable for Stg {}
impl Pausable for DigitalOut {}

/// State of a unit as inferred from its status bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Idle,
    Ready,
    Active,
    Paused,
    Done,
}

impl UnitState {
    pub fn from_status(bits: u32) -> Self {
        let is_set = |bit: u32| bits & (1 << bit) != 0;
        if is_set(status::DONE) {
            UnitState::Done
        } else if is_set(status::PAUSED) {
            UnitState::Paused
        } else if is_set(status::BUSY) {
            UnitState::Active
        } else if is_set(status::READY) {
            UnitState::Ready
        } else {
            UnitState::Idle
        }
    }
}

/// Controls the units of one family.
pub struct UnitCtrl<'a, R, M> {
    pub(crate) ctx: &'a mut Context<R>,
    module: PhantomData<M>,
}

pub type AwgCtrl<'a, R> = UnitCtrl<'a, R, Awg>;
pub type StgCtrl<'a, R> = UnitCtrl<'a, R, Stg>;
pub type CaptureCtrl<'a, R> = UnitCtrl<'a, R, Capture>;
pub type DigitalOutCtrl<'a, R> = UnitCtrl<'a, R, DigitalOut>;

impl<'a, R: RegisterAccess, M: Module> UnitCtrl<'a, R, M> {
    pub(crate) fn new(ctx: &'a mut Context<R>) -> Self {
        UnitCtrl {
            ctx,
            module: PhantomData,
        }
    }

    fn set_selected(&mut self, units: &[M::Id], selected: bool) -> Result<()> {
        let layout = M::LAYOUT;
        UnitMask::update(
            &mut self.ctx.regs,
            layout.target_select(),
            layout.mask_words(),
            units,
            selected,
        )?;
        Ok(())
    }

    fn set_ctrl_bit(&mut self, bit: u32, value: bool) -> Result<()> {
        self.ctx
            .regs
            .write_bits(M::LAYOUT.master_ctrl(), bit, 1, u32::from(value))?;
        Ok(())
    }

    /// Drive `bit` through 0, 1, 0.
    fn pulse(&mut self, bit: u32) -> Result<()> {
        self.set_ctrl_bit(bit, false)?;
        self.set_ctrl_bit(bit, true)?;
        self.set_ctrl_bit(bit, false)
    }

    /// Run `op` with `units` selected. The selection is released on every path.
    fn with_selection(
        &mut self,
        name: &str,
        units: &[M::Id],
        op: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        if units.is_empty() {
            return Ok(());
        }
        debug!(
            self.ctx.diagnostics,
            "{} {} units {:?}",
            name,
            M::LAYOUT.name,
            units
        );
        self.set_selected(units, true)?;
        let result = op(self);
        let released = self.set_selected(units, false);
        result.and(released)
    }

    fn pulsed(&mut self, name: &str, bit: u32, units: &[M::Id]) -> Result<()> {
        self.with_selection(name, units, |this| this.pulse(bit))
    }

    pub fn reset(&mut self, units: &[M::Id]) -> Result<()> {
        self.pulsed("Reset", ctrl::RESET, units)
    }

    /// Prepare the units, wait until all of them are ready and start them together.
    pub fn start(&mut self, units: &[M::Id]) -> Result<()> {
        self.with_selection("Start", units, |this| {
            this.set_ctrl_bit(ctrl::PREPARE, false)?;
            this.set_ctrl_bit(ctrl::PREPARE, true)?;
            let timeout = this.ctx.settings.ready_timeout();
            let ready = poll::wait_until(this.ctx, &M::LAYOUT, units, poll::READY, timeout, None);
            let lowered = this.set_ctrl_bit(ctrl::PREPARE, false);
            ready?;
            lowered?;
            this.pulse(ctrl::START)
        })
    }

    /// Stop the units immediately, leaving them idle.
    pub fn terminate(&mut self, units: &[M::Id]) -> Result<()> {
        self.pulsed("Terminate", ctrl::TERMINATE, units)
    }

    pub fn clear_done(&mut self, units: &[M::Id]) -> Result<()> {
        self.pulsed("Clear done of", ctrl::DONE_CLR, units)
    }

    pub fn state(&mut self, unit: M::Id) -> Result<UnitState> {
        let bits = self.ctx.regs.read(M::LAYOUT.status(unit.index()))?;
        Ok(UnitState::from_status(bits))
    }

    pub fn states(&mut self, units: &[M::Id]) -> Result<Vec<(M::Id, UnitState)>> {
        units
            .iter()
            .map(|&unit| Ok((unit, self.state(unit)?)))
            .collect()
    }

    fn wait(
        &mut self,
        condition: Condition,
        timeout: Duration,
        units: &[M::Id],
        cancel: Option<&CancelToken>,
    ) -> Result<()> {
        poll::wait_until(self.ctx, &M::LAYOUT, units, condition, timeout, cancel)
    }

    /// Wait until every unit has finished.
    pub fn wait_for_stop(&mut self, timeout: Duration, units: &[M::Id]) -> Result<()> {
        self.wait(poll::DONE, timeout, units, None)
    }

    pub fn wait_for_stop_with_cancel(
        &mut self,
        timeout: Duration,
        units: &[M::Id],
        cancel: &CancelToken,
    ) -> Result<()> {
        self.wait(poll::DONE, timeout, units, Some(cancel))
    }

    /// Wait with the configured ready timeout until every unit is ready.
    pub fn wait_for_ready(&mut self, units: &[M::Id]) -> Result<()> {
        let timeout = self.ctx.settings.ready_timeout();
        self.wait(poll::READY, timeout, units, None)
    }

    pub fn wait_for_ready_with_cancel(
        &mut self,
        units: &[M::Id],
        cancel: &CancelToken,
    ) -> Result<()> {
        let timeout = self.ctx.settings.ready_timeout();
        self.wait(poll::READY, timeout, units, Some(cancel))
    }

    /// Wait with the configured idle timeout until no unit is busy.
    pub fn wait_for_idle(&mut self, units: &[M::Id]) -> Result<()> {
        let timeout = self.ctx.settings.idle_timeout();
        self.wait(poll::IDLE, timeout, units, None)
    }

    pub fn wait_for_idle_with_cancel(
        &mut self,
        units: &[M::Id],
        cancel: &CancelToken,
    ) -> Result<()> {
        let timeout = self.ctx.settings.idle_timeout();
        self.wait(poll::IDLE, timeout, units, Some(cancel))
    }

    /// Let `line` start (or stop starting) the given units.
    pub fn set_external_start_trigger(
        &mut self,
        line: ExternalTrigger,
        units: &[M::Id],
        enabled: bool,
    ) -> Result<()> {
        let layout = M::LAYOUT;
        UnitMask::update(
            &mut self.ctx.regs,
            layout.start_trigger_mask(line),
            layout.mask_words(),
            units,
            enabled,
        )?;
        Ok(())
    }

    pub fn external_start_trigger_units(&mut self, line: ExternalTrigger) -> Result<Vec<M::Id>> {
        let layout = M::LAYOUT;
        let mask = UnitMask::read(
            &mut self.ctx.regs,
            layout.start_trigger_mask(line),
            layout.mask_words(),
        )?;
        Ok(mask.units())
    }
}

impl<R: RegisterAccess, M: Pausable> UnitCtrl<'_, R, M> {
    pub fn pause(&mut self, units: &[M::Id]) -> Result<()> {
        self.pulsed("Pause", ctrl::PAUSE, units)
    }

    pub fn resume(&mut self, units: &[M::Id]) -> Result<()> {
        self.pulsed("Resume", ctrl::RESUME, units)
    }

    pub fn restart(&mut self, units: &[M::Id]) -> Result<()> {
        self.pulsed("Restart", ctrl::RESTART, units)
    }
}
