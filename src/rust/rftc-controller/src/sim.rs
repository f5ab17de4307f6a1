// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

//! An in-memory device model for tests and dry runs.
//!
//! Registers and memory live in a shared state, so a test can keep one clone
//! of the device to inspect while a [`Controller`](crate::Controller) owns
//! another.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::bail;

use crate::RegisterAccess;
use crate::mask::UnitMask;
use crate::regmap::{ModuleLayout, ctrl, status};

/// A rising edge of a master control bit and the units selected at that moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulseRecord {
    pub module: &'static str,
    pub bit: u32,
    pub selected: Vec<u32>,
}

#[derive(Debug)]
struct DelayedStatus {
    reads_left: u32,
    value: u32,
}

#[derive(Debug)]
struct State {
    registers: HashMap<u32, u32>,
    memory: Vec<(u64, Vec<u8>)>,
    register_writes: Vec<(u32, u32)>,
    dram_writes: Vec<(u64, usize)>,
    pulses: Vec<PulseRecord>,
    delayed: HashMap<u32, DelayedStatus>,
    failing: HashSet<u32>,
    fail_release: bool,
    release_count: usize,
    auto_ready: bool,
    auto_complete: bool,
}

impl Default for State {
    fn default() -> Self {
        State {
            registers: HashMap::new(),
            memory: Vec::new(),
            register_writes: Vec::new(),
            dram_writes: Vec::new(),
            pulses: Vec::new(),
            delayed: HashMap::new(),
            failing: HashSet::new(),
            fail_release: false,
            release_count: 0,
            auto_ready: true,
            auto_complete: false,
        }
    }
}

impl State {
    fn register(&self, addr: u32) -> u32 {
        self.registers.get(&addr).copied().unwrap_or(0)
    }

    fn selected(&self, layout: &ModuleLayout) -> Vec<u32> {
        let words = (0..layout.mask_words() as u32)
            .map(|i| self.register(layout.target_select() + 4 * i))
            .collect();
        UnitMask::from_words(words)
            .indices()
            .into_iter()
            .filter(|&i| i < layout.num_units)
            .collect()
    }

    fn on_rising_edge(&mut self, layout: &ModuleLayout, bit: u32) {
        let selected = self.selected(layout);
        let ready = 1 << status::READY;
        let busy = 1 << status::BUSY;
        let paused = 1 << status::PAUSED;
        let done = 1 << status::DONE;
        let running = if self.auto_complete { done } else { busy };
        for &unit in &selected {
            let addr = layout.status(unit);
            let current = self.register(addr);
            let next = match bit {
                ctrl::RESET | ctrl::TERMINATE => 0,
                ctrl::PREPARE if self.auto_ready => current | ready,
                ctrl::START => (current & !ready) | running,
                ctrl::DONE_CLR => current & !done,
                ctrl::PAUSE if current & busy != 0 => current | paused,
                ctrl::RESUME => current & !paused,
                ctrl::RESTART => (current & !(done | paused | busy)) | running,
                _ => current,
            };
            self.registers.insert(addr, next);
        }
        self.pulses.push(PulseRecord {
            module: layout.name,
            bit,
            selected,
        });
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedDevice {
    state: Arc<Mutex<State>>,
}

impl SimulatedDevice {
    /// A device whose units become ready when prepared and run until stopped.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether preparing a unit makes it ready.
    pub fn set_auto_ready(&self, enabled: bool) {
        self.state().auto_ready = enabled;
    }

    /// Whether starting a unit finishes it immediately.
    pub fn set_auto_complete(&self, enabled: bool) {
        self.state().auto_complete = enabled;
    }

    pub fn set_register(&self, addr: u32, value: u32) {
        self.state().registers.insert(addr, value);
    }

    pub fn register(&self, addr: u32) -> u32 {
        self.state().register(addr)
    }

    /// Let the register at `addr` change to `value` after it has been read `reads` times.
    pub fn set_register_after_reads(&self, addr: u32, reads: u32, value: u32) {
        self.state()
            .delayed
            .insert(addr, DelayedStatus { reads_left: reads, value });
    }

    /// Make every access to the register at `addr` fail.
    pub fn fail_register(&self, addr: u32) {
        self.state().failing.insert(addr);
    }

    pub fn fail_release(&self, enabled: bool) {
        self.state().fail_release = enabled;
    }

    pub fn release_count(&self) -> usize {
        self.state().release_count
    }

    pub fn pulses(&self) -> Vec<PulseRecord> {
        self.state().pulses.clone()
    }

    /// Every register write in order.
    pub fn register_writes(&self) -> Vec<(u32, u32)> {
        self.state().register_writes.clone()
    }

    /// Address and length of every memory write in order.
    pub fn dram_writes(&self) -> Vec<(u64, usize)> {
        self.state().dram_writes.clone()
    }

    /// Place `data` in device memory without recording a write.
    pub fn load_memory(&self, addr: u64, data: &[u8]) {
        self.state().memory.push((addr, data.to_vec()));
    }

    /// `len` bytes of device memory at `addr`. Unwritten bytes read as zero.
    pub fn memory(&self, addr: u64, len: usize) -> Vec<u8> {
        let state = self.state();
        let mut out = vec![0; len];
        let end = addr + len as u64;
        for (start, data) in &state.memory {
            let seg_end = start + data.len() as u64;
            let from = addr.max(*start);
            let to = end.min(seg_end);
            if from < to {
                let dst = (from - addr) as usize..(to - addr) as usize;
                let src = (from - start) as usize..(to - start) as usize;
                out[dst].copy_from_slice(&data[src]);
            }
        }
        out
    }
}

impl RegisterAccess for SimulatedDevice {
    fn read(&mut self, addr: u32) -> anyhow::Result<u32> {
        let mut state = self.state();
        if state.failing.contains(&addr) {
            bail!("simulated failure reading register {addr:#x}");
        }
        if let Some(delayed) = state.delayed.get_mut(&addr) {
            if delayed.reads_left == 0 {
                let value = delayed.value;
                state.delayed.remove(&addr);
                state.registers.insert(addr, value);
            } else {
                delayed.reads_left -= 1;
            }
        }
        Ok(state.register(addr))
    }

    fn write(&mut self, addr: u32, value: u32) -> anyhow::Result<()> {
        let mut state = self.state();
        if state.failing.contains(&addr) {
            bail!("simulated failure writing register {addr:#x}");
        }
        let previous = state.register(addr);
        state.registers.insert(addr, value);
        state.register_writes.push((addr, value));
        if let Some(layout) = ModuleLayout::ALL.iter().find(|l| l.master_ctrl() == addr) {
            let rising = value & !previous;
            for bit in (0..32).filter(|bit| rising & (1 << bit) != 0) {
                state.on_rising_edge(layout, bit);
            }
        }
        Ok(())
    }

    fn write_dram(&mut self, addr: u64, data: &[u8], _show_progress: bool) -> anyhow::Result<()> {
        let mut state = self.state();
        state.dram_writes.push((addr, data.len()));
        state.memory.push((addr, data.to_vec()));
        Ok(())
    }

    fn read_dram(&mut self, addr: u64, len: usize) -> anyhow::Result<Vec<u8>> {
        Ok(self.memory(addr, len))
    }

    fn release(&mut self) -> anyhow::Result<()> {
        let mut state = self.state();
        if state.fail_release {
            bail!("simulated failure releasing the device");
        }
        state.release_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regmap::{AWG, STG};

    #[test]
    fn test_pulse_acts_on_selected_units() {
        let mut device = SimulatedDevice::new();
        device.write(STG.target_select(), 0b11).unwrap();
        device.write(STG.master_ctrl(), 1 << ctrl::PREPARE).unwrap();
        assert_eq!(device.read(STG.status(0)).unwrap(), 1 << status::READY);
        assert_eq!(device.read(STG.status(2)).unwrap(), 0);

        device.write(STG.master_ctrl(), 1 << ctrl::START).unwrap();
        assert_eq!(device.register(STG.status(1)), 1 << status::BUSY);
        assert_eq!(
            device.pulses().last().unwrap(),
            &PulseRecord {
                module: "STG",
                bit: ctrl::START,
                selected: vec![0, 1]
            }
        );

        device.write(STG.master_ctrl(), 1 << ctrl::PAUSE).unwrap();
        assert_eq!(
            device.register(STG.status(0)),
            (1 << status::BUSY) | (1 << status::PAUSED)
        );
    }

    #[test]
    fn test_level_does_not_retrigger() {
        let mut device = SimulatedDevice::new();
        device.write(AWG.master_ctrl(), 1 << ctrl::RESET).unwrap();
        device.write(AWG.master_ctrl(), 1 << ctrl::RESET).unwrap();
        assert_eq!(device.pulses().len(), 1);
    }

    #[test]
    fn test_delayed_register_and_memory_overlay() {
        let mut device = SimulatedDevice::new();
        device.set_register_after_reads(0x10, 2, 7);
        assert_eq!(device.read(0x10).unwrap(), 0);
        assert_eq!(device.read(0x10).unwrap(), 0);
        assert_eq!(device.read(0x10).unwrap(), 7);

        device.write_dram(4, &[1, 2, 3, 4], false).unwrap();
        device.load_memory(6, &[9]);
        assert_eq!(device.read_dram(2, 8).unwrap(), vec![0, 0, 1, 2, 9, 4, 0, 0]);
        assert_eq!(device.dram_writes(), vec![(4, 4)]);
    }
}
