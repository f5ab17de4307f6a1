// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

//! Bitmask registers addressing a set of units.

use bitvec::prelude::*;

use rftc_common::UnitId;

use crate::RegisterAccess;

/// A target-select or trigger mask spanning one or more 32 bit words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitMask {
    bits: BitVec<u32, Lsb0>,
}

impl UnitMask {
    pub fn new(num_words: usize) -> Self {
        UnitMask {
            bits: BitVec::repeat(false, 32 * num_words),
        }
    }

    pub fn from_words(words: Vec<u32>) -> Self {
        UnitMask {
            bits: BitVec::from_vec(words),
        }
    }

    pub fn of<I: UnitId>(num_words: usize, units: &[I]) -> Self {
        let mut mask = UnitMask::new(num_words);
        mask.insert_all(units);
        mask
    }

    pub fn words(&self) -> &[u32] {
        self.bits.as_raw_slice()
    }

    pub fn set(&mut self, index: u32, value: bool) {
        if let Some(mut bit) = self.bits.get_mut(index as usize) {
            *bit = value;
        }
    }

    pub fn insert_all<I: UnitId>(&mut self, units: &[I]) {
        for unit in units {
            self.set(unit.index(), true);
        }
    }

    pub fn remove_all<I: UnitId>(&mut self, units: &[I]) {
        for unit in units {
            self.set(unit.index(), false);
        }
    }

    pub fn contains(&self, index: u32) -> bool {
        self.bits.get(index as usize).is_some_and(|bit| *bit)
    }

    /// Indices of the set bits in ascending order.
    pub fn indices(&self) -> Vec<u32> {
        self.bits.iter_ones().map(|i| i as u32).collect()
    }

    /// The set units of family `I`; bits past the family size are ignored.
    pub fn units<I: UnitId>(&self) -> Vec<I> {
        I::ALL
            .iter()
            .copied()
            .filter(|unit| self.contains(unit.index()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.not_any()
    }

    pub(crate) fn read<R: RegisterAccess + ?Sized>(
        regs: &mut R,
        addr: u32,
        num_words: usize,
    ) -> anyhow::Result<Self> {
        Ok(UnitMask::from_words(regs.read_multi(addr, num_words)?))
    }

    pub(crate) fn write<R: RegisterAccess + ?Sized>(
        &self,
        regs: &mut R,
        addr: u32,
    ) -> anyhow::Result<()> {
        regs.write_multi(addr, self.words())
    }

    /// Read-modify-write setting or clearing the bits of `units`.
    pub(crate) fn update<R: RegisterAccess + ?Sized, I: UnitId>(
        regs: &mut R,
        addr: u32,
        num_words: usize,
        units: &[I],
        value: bool,
    ) -> anyhow::Result<()> {
        let mut mask = UnitMask::read(regs, addr, num_words)?;
        if value {
            mask.insert_all(units);
        } else {
            mask.remove_all(units);
        }
        mask.write(regs, addr)
    }
}
