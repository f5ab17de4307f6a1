// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

//! Register and memory map of the accelerator.
//!
//! Every unit family occupies one module block holding a shared master
//! control register, the target-select bitmask, the external start-trigger
//! masks and one register block per unit.

use rftc_common::hardware::BYTES_PER_WORD;
use rftc_common::{DigitalOutTrigger, ExternalTrigger, UnitId};

/// Bits of the master control register.
pub mod ctrl {
    pub const RESET: u32 = 0;
    pub const PREPARE: u32 = 1;
    pub const START: u32 = 2;
    pub const TERMINATE: u32 = 3;
    pub const DONE_CLR: u32 = 4;
    pub const PAUSE: u32 = 5;
    pub const RESUME: u32 = 6;
    pub const RESTART: u32 = 7;
}

/// Bits of the per-unit status register.
pub mod status {
    pub const READY: u32 = 0;
    pub const BUSY: u32 = 1;
    pub const PAUSED: u32 = 2;
    pub const DONE: u32 = 3;
}

// Module block offsets.
pub const MASTER_CTRL: u32 = 0x000;
/// Device memory address of the module configuration, two words.
pub const CONFIG_ADDR: u32 = 0x008;
pub const CONFIG_LEN: u32 = 0x010;
pub const TARGET_SELECT: u32 = 0x020;
pub const START_TRIGGER_MASK: u32 = 0x040;
pub const START_TRIGGER_MASK_STRIDE: u32 = 0x010;
pub const UNIT_BASE: u32 = 0x400;
pub const UNIT_STRIDE: u32 = 0x400;

// Unit block offsets.
pub const STATUS: u32 = 0x00;
/// Device memory address of the unit parameters, two words.
pub const PARAM_ADDR: u32 = 0x08;
pub const PARAM_LEN: u32 = 0x10;
/// Device memory address of the unit samples, two words.
pub const DATA_ADDR: u32 = 0x18;
/// Length of the unit samples in bytes, two words.
pub const DATA_LEN: u32 = 0x20;
pub const NUM_WAIT_WORDS: u32 = 0x30;
pub const NUM_SEQ_REPEATS: u32 = 0x34;
pub const NUM_CHUNKS: u32 = 0x38;
pub const CHUNK_TABLE: u32 = 0x40;
pub const CHUNK_STRIDE: u32 = 0x20;

// Chunk table entry offsets.
pub const CHUNK_ADDR: u32 = 0x00;
pub const CHUNK_WAVE_WORDS: u32 = 0x08;
pub const CHUNK_BLANK_WORDS: u32 = 0x0C;
pub const CHUNK_REPEATS: u32 = 0x10;

/// Global trigger block.
pub const TRIGGER_BASE: u32 = 0x5_0000;
/// One enable bit per external trigger line.
pub const EXTERNAL_TRIGGER_ENABLE: u32 = TRIGGER_BASE;
/// One mask per cooperative trigger, one bit per digital output module.
pub const DIGITAL_OUT_TRIGGER_MASK: u32 = TRIGGER_BASE + 0x10;

pub fn digital_out_trigger_mask(trigger: DigitalOutTrigger) -> u32 {
    DIGITAL_OUT_TRIGGER_MASK + 4 * trigger.index()
}

// Device memory.
pub const STIMULUS_RAM_BASE: u64 = 0x0;
pub const AWG_RAM_BASE: u64 = 0x1_0000_0000;
pub const CAPTURE_CONFIG_ADDR: u64 = 0x2_0000_0000;
pub const CAPTURE_RESULT_BASE: u64 = 0x2_1000_0000;
pub const CAPTURE_RESULT_STRIDE: u64 = 0x1000_0000;
/// Space reserved for the parameter block in front of the captured samples.
pub const CAPTURE_PARAM_AREA: u64 = 0x1_0000;
pub const DIGITAL_OUT_RAM_BASE: u64 = 0x3_0000_0000;
pub const DIGITAL_OUT_AREA: u64 = 0x1_0000;

/// Alignment of every block placed in device memory.
pub const DRAM_ALIGN: u64 = BYTES_PER_WORD;

/// Location of one module block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleLayout {
    pub name: &'static str,
    pub base: u32,
    pub num_units: u32,
}

pub const AWG: ModuleLayout = ModuleLayout {
    name: "AWG",
    base: 0x1_0000,
    num_units: 16,
};

pub const STG: ModuleLayout = ModuleLayout {
    name: "STG",
    base: 0x2_0000,
    num_units: 8,
};

pub const CAPTURE: ModuleLayout = ModuleLayout {
    name: "capture",
    base: 0x3_0000,
    num_units: 8,
};

pub const DIGITAL_OUT: ModuleLayout = ModuleLayout {
    name: "digital output",
    base: 0x4_0000,
    num_units: 4,
};

impl ModuleLayout {
    pub const fn master_ctrl(&self) -> u32 {
        self.base + MASTER_CTRL
    }

    pub const fn config_addr(&self) -> u32 {
        self.base + CONFIG_ADDR
    }

    pub const fn config_len(&self) -> u32 {
        self.base + CONFIG_LEN
    }

    pub const fn target_select(&self) -> u32 {
        self.base + TARGET_SELECT
    }

    /// Number of 32 bit words of the target-select and trigger masks.
    pub const fn mask_words(&self) -> usize {
        self.num_units.div_ceil(32) as usize
    }

    pub fn start_trigger_mask(&self, line: ExternalTrigger) -> u32 {
        self.base + START_TRIGGER_MASK + START_TRIGGER_MASK_STRIDE * line.index()
    }

    pub const fn unit(&self, index: u32) -> u32 {
        self.base + UNIT_BASE + UNIT_STRIDE * index
    }

    pub const fn status(&self, index: u32) -> u32 {
        self.unit(index) + STATUS
    }

    pub const fn chunk(&self, index: u32, chunk: u32) -> u32 {
        self.unit(index) + CHUNK_TABLE + CHUNK_STRIDE * chunk
    }

    pub const ALL: [ModuleLayout; 4] = [AWG, STG, CAPTURE, DIGITAL_OUT];
}

pub fn capture_result_addr(unit: u32) -> u64 {
    CAPTURE_RESULT_BASE + CAPTURE_RESULT_STRIDE * u64::from(unit)
}

pub fn digital_out_addr(unit: u32) -> u64 {
    DIGITAL_OUT_RAM_BASE + DIGITAL_OUT_AREA * u64::from(unit)
}
