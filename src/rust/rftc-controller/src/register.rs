// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

//! The register and memory capability of a connected device.

use anyhow::{Context, bail};

fn field_mask(bit_offset: u32, width: u32) -> anyhow::Result<u32> {
    if width == 0 || bit_offset + width > 32 {
        bail!("bit field {bit_offset}+{width} does not fit into a 32 bit register");
    }
    Ok(if width == 32 {
        u32::MAX
    } else {
        ((1u32 << width) - 1) << bit_offset
    })
}

/// Byte addressed access to the registers and memory of a device.
///
/// All device mutation goes through this trait. Implementations report
/// transport failures as [`anyhow::Error`]; callers pass them on unchanged.
pub trait RegisterAccess {
    fn read(&mut self, addr: u32) -> anyhow::Result<u32>;

    fn write(&mut self, addr: u32, value: u32) -> anyhow::Result<()>;

    /// Write `data` to device memory at `addr`.
    fn write_dram(&mut self, addr: u64, data: &[u8], show_progress: bool) -> anyhow::Result<()>;

    /// Read `len` bytes of device memory at `addr`.
    fn read_dram(&mut self, addr: u64, len: usize) -> anyhow::Result<Vec<u8>>;

    /// Read `count` consecutive registers.
    fn read_multi(&mut self, addr: u32, count: usize) -> anyhow::Result<Vec<u32>> {
        (0..count as u32)
            .map(|i| self.read(addr + 4 * i))
            .collect()
    }

    /// Write consecutive registers starting at `addr`.
    fn write_multi(&mut self, addr: u32, values: &[u32]) -> anyhow::Result<()> {
        for (i, &value) in values.iter().enumerate() {
            self.write(addr + 4 * i as u32, value)?;
        }
        Ok(())
    }

    fn read_bits(&mut self, addr: u32, bit_offset: u32, width: u32) -> anyhow::Result<u32> {
        let mask = field_mask(bit_offset, width)?;
        Ok((self.read(addr)? & mask) >> bit_offset)
    }

    /// Read-modify-write of a bit field.
    fn write_bits(
        &mut self,
        addr: u32,
        bit_offset: u32,
        width: u32,
        value: u32,
    ) -> anyhow::Result<()> {
        let mask = field_mask(bit_offset, width)?;
        let shifted = value
            .checked_shl(bit_offset)
            .filter(|v| v & !mask == 0)
            .with_context(|| format!("value {value:#x} does not fit into {width} bits"))?;
        let current = self.read(addr)?;
        self.write(addr, (current & !mask) | shifted)
    }

    /// Write a 64 bit value to two consecutive registers, low word first.
    fn write_u64(&mut self, addr: u32, value: u64) -> anyhow::Result<()> {
        self.write_multi(addr, &[value as u32, (value >> 32) as u32])
    }

    fn read_u64(&mut self, addr: u32) -> anyhow::Result<u64> {
        match self.read_multi(addr, 2)?.as_slice() {
            &[low, high] => Ok(u64::from(low) | (u64::from(high) << 32)),
            words => bail!("expected 2 registers at {addr:#x}, got {}", words.len()),
        }
    }

    /// Release the underlying connection.
    fn release(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<T: RegisterAccess + ?Sized> RegisterAccess for Box<T> {
    fn read(&mut self, addr: u32) -> anyhow::Result<u32> {
        (**self).read(addr)
    }

    fn write(&mut self, addr: u32, value: u32) -> anyhow::Result<()> {
        (**self).write(addr, value)
    }

    fn write_dram(&mut self, addr: u64, data: &[u8], show_progress: bool) -> anyhow::Result<()> {
        (**self).write_dram(addr, data, show_progress)
    }

    fn read_dram(&mut self, addr: u64, len: usize) -> anyhow::Result<Vec<u8>> {
        (**self).read_dram(addr, len)
    }

    fn read_multi(&mut self, addr: u32, count: usize) -> anyhow::Result<Vec<u32>> {
        (**self).read_multi(addr, count)
    }

    fn write_multi(&mut self, addr: u32, values: &[u32]) -> anyhow::Result<()> {
        (**self).write_multi(addr, values)
    }

    fn release(&mut self) -> anyhow::Result<()> {
        (**self).release()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Registers(HashMap<u32, u32>);

    impl RegisterAccess for Registers {
        fn read(&mut self, addr: u32) -> anyhow::Result<u32> {
            Ok(self.0.get(&addr).copied().unwrap_or(0))
        }

        fn write(&mut self, addr: u32, value: u32) -> anyhow::Result<()> {
            self.0.insert(addr, value);
            Ok(())
        }

        fn write_dram(&mut self, _addr: u64, _data: &[u8], _show_progress: bool) -> anyhow::Result<()> {
            Ok(())
        }

        fn read_dram(&mut self, _addr: u64, len: usize) -> anyhow::Result<Vec<u8>> {
            Ok(vec![0; len])
        }
    }

    #[test]
    fn test_bit_fields() {
        let mut regs = Registers::default();
        regs.write(0x10, 0xffff_0000).unwrap();
        regs.write_bits(0x10, 4, 4, 0xa).unwrap();
        assert_eq!(regs.read(0x10).unwrap(), 0xffff_00a0);
        assert_eq!(regs.read_bits(0x10, 4, 4).unwrap(), 0xa);
        assert_eq!(regs.read_bits(0x10, 16, 16).unwrap(), 0xffff);
        regs.write_bits(0x10, 0, 32, 7).unwrap();
        assert_eq!(regs.read(0x10).unwrap(), 7);
    }

    #[test]
    fn test_bit_field_limits() {
        let mut regs = Registers::default();
        assert!(regs.write_bits(0x0, 30, 4, 1).is_err());
        assert!(regs.write_bits(0x0, 0, 2, 4).is_err());
        assert!(regs.read_bits(0x0, 0, 0).is_err());
    }

    #[test]
    fn test_multi_and_wide_registers() {
        let mut regs = Registers::default();
        regs.write_multi(0x20, &[1, 2, 3]).unwrap();
        assert_eq!(regs.read(0x28).unwrap(), 3);
        assert_eq!(regs.read_multi(0x20, 3).unwrap(), vec![1, 2, 3]);
        regs.write_u64(0x40, 0x1_2345_6789).unwrap();
        assert_eq!(regs.read(0x44).unwrap(), 1);
        assert_eq!(regs.read_u64(0x40).unwrap(), 0x1_2345_6789);
    }
}
