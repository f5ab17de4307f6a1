// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

//! A session with one device.

use std::collections::BTreeMap;

use rftc_common::AwgId;
use rftc_log::{Diagnostics, LogDiagnostics, NullDiagnostics, info, warn};
use rftc_sequence::{CaptureConfig, WaveSequence};

use crate::clock::{Clock, SystemClock};
use crate::settings::ControllerSettings;
use crate::trigger::TriggerCtrl;
use crate::unit::{AwgCtrl, CaptureCtrl, DigitalOutCtrl, StgCtrl, UnitCtrl};
use crate::{LOG_TARGET, RegisterAccess, Result};

/// What was last uploaded, for queries after a run.
#[derive(Debug, Default)]
pub(crate) struct Uploads {
    pub(crate) waves: BTreeMap<AwgId, WaveSequence>,
    pub(crate) capture: Option<CaptureConfig>,
}

pub(crate) struct Context<R> {
    pub(crate) regs: R,
    pub(crate) settings: ControllerSettings,
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) diagnostics: Box<dyn Diagnostics>,
    pub(crate) uploads: Uploads,
}

/// Owns the register handle of one device and releases it when dropped.
///
/// Operations on the shared target-select and control registers are not
/// atomic, so a controller must not be driven from two threads at once.
pub struct Controller<R: RegisterAccess> {
    ctx: Context<R>,
    released: bool,
}

impl<R: RegisterAccess> Controller<R> {
    pub fn new(regs: R) -> Self {
        Controller {
            ctx: Context {
                regs,
                settings: ControllerSettings::default(),
                clock: Box::new(SystemClock::new()),
                diagnostics: Box::new(NullDiagnostics),
                uploads: Uploads::default(),
            },
            released: false,
        }
    }

    /// Replace the settings after sanitizing them.
    pub fn with_settings(mut self, mut settings: ControllerSettings) -> Result<Self> {
        for change in settings.sanitize()? {
            warn!(
                self.ctx.diagnostics,
                "Setting `{}` changed from {} to {}: {}",
                change.field,
                change.original,
                change.sanitized,
                change.reason
            );
        }
        self.ctx.settings = settings;
        Ok(self)
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.ctx.clock = Box::new(clock);
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: impl Diagnostics + 'static) -> Self {
        self.ctx.diagnostics = Box::new(diagnostics);
        self
    }

    /// Send diagnostics to the `log` facade under [`LOG_TARGET`].
    ///
    /// `verbose` enables the per-round messages of polling waits.
    pub fn with_log(self, verbose: bool) -> Self {
        self.with_diagnostics(LogDiagnostics::new(LOG_TARGET).with_verbose(verbose))
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.ctx.settings
    }

    pub fn awg(&mut self) -> AwgCtrl<'_, R> {
        UnitCtrl::new(&mut self.ctx)
    }

    pub fn stg(&mut self) -> StgCtrl<'_, R> {
        UnitCtrl::new(&mut self.ctx)
    }

    pub fn capture(&mut self) -> CaptureCtrl<'_, R> {
        UnitCtrl::new(&mut self.ctx)
    }

    pub fn digital_out(&mut self) -> DigitalOutCtrl<'_, R> {
        UnitCtrl::new(&mut self.ctx)
    }

    pub fn triggers(&mut self) -> TriggerCtrl<'_, R> {
        TriggerCtrl::new(&mut self.ctx)
    }

    /// Direct access to the register handle.
    pub fn registers(&mut self) -> &mut R {
        &mut self.ctx.regs
    }

    /// Release the register handle and report a failure to do so.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.ctx.regs.release()?;
        info!(self.ctx.diagnostics, "Released the register handle");
        Ok(())
    }
}

impl<R: RegisterAccess> Drop for Controller<R> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(
                self.ctx.diagnostics,
                "Failed to release the register handle: {err:#}"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimulatedDevice;

    #[test]
    fn test_with_log() {
        let controller = Controller::new(SimulatedDevice::new());
        assert!(!controller.ctx.diagnostics.is_verbose());
        let controller = controller.with_log(true);
        assert!(controller.ctx.diagnostics.is_verbose());
        let controller = controller.with_log(false);
        assert!(!controller.ctx.diagnostics.is_verbose());
    }
}
