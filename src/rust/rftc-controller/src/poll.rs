// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

//! Sleep-and-recheck loop over unit status bits.

use std::time::Duration;

use rftc_common::UnitId;
use rftc_log::{debug, diagnostic, warn};

use crate::cancel::CancelToken;
use crate::controller::Context;
use crate::regmap::{ModuleLayout, status};
use crate::{Error, RegisterAccess, Result};

/// A status bit every waited-on unit has to reach.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Condition {
    pub name: &'static str,
    pub bit: u32,
    pub set: bool,
}

pub(crate) const DONE: Condition = Condition {
    name: "done",
    bit: status::DONE,
    set: true,
};

pub(crate) const READY: Condition = Condition {
    name: "ready",
    bit: status::READY,
    set: true,
};

pub(crate) const IDLE: Condition = Condition {
    name: "idle",
    bit: status::BUSY,
    set: false,
};

fn pending_units<R: RegisterAccess, I: UnitId>(
    ctx: &mut Context<R>,
    layout: &ModuleLayout,
    units: &[I],
    condition: Condition,
) -> Result<Vec<u32>> {
    let mut pending = Vec::new();
    for unit in units {
        let bit = ctx
            .regs
            .read_bits(layout.status(unit.index()), condition.bit, 1)?;
        if (bit == 1) != condition.set {
            pending.push(unit.index());
        }
    }
    pending.sort_unstable();
    pending.dedup();
    Ok(pending)
}

/// Poll until every unit satisfies `condition`, the timeout elapses or `cancel` fires.
///
/// The status is checked once more after the last sleep, so a unit reaching
/// the condition right at the deadline still succeeds.
pub(crate) fn wait_until<R: RegisterAccess, I: UnitId>(
    ctx: &mut Context<R>,
    layout: &ModuleLayout,
    units: &[I],
    condition: Condition,
    timeout: Duration,
    cancel: Option<&CancelToken>,
) -> Result<()> {
    let start = ctx.clock.now();
    let poll_interval = ctx.settings.poll_interval();
    let mut rounds = 0u64;
    loop {
        let pending = pending_units(ctx, layout, units, condition)?;
        if pending.is_empty() {
            debug!(
                ctx.diagnostics,
                "{} units {:?} are {} after {} poll rounds",
                layout.name,
                units,
                condition.name,
                rounds
            );
            return Ok(());
        }
        if cancel.is_some_and(CancelToken::is_cancelled) {
            warn!(
                ctx.diagnostics,
                "Cancelled waiting for {} units {:?} to become {}",
                layout.name,
                pending,
                condition.name
            );
            return Err(Error::Cancelled {
                kind: layout.name,
                condition: condition.name,
                pending,
            });
        }
        let elapsed = ctx.clock.now().saturating_sub(start);
        if elapsed >= timeout {
            warn!(
                ctx.diagnostics,
                "Timed out after {:?} waiting for {} units {:?} to become {}",
                timeout,
                layout.name,
                pending,
                condition.name
            );
            return Err(Error::Timeout {
                kind: layout.name,
                condition: condition.name,
                pending,
                timeout,
            });
        }
        diagnostic!(
            ctx.diagnostics,
            "Waiting for {} units {:?} to become {}",
            layout.name,
            pending,
            condition.name
        );
        ctx.clock.sleep(poll_interval.min(timeout - elapsed));
        rounds += 1;
    }
}
