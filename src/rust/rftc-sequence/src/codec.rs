// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

//! Little-endian encoding helpers and the raw sample format.
//!
//! The device stores samples as unsigned words masked to the converter
//! width. Writing only masks; reading always sign-extends.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_complex::Complex;

use rftc_common::{Error, Result};

/// Width of the raw samples exchanged with the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleFormat {
    bits: u8,
}

impl SampleFormat {
    /// The 16 bit format used by the wave and capture memories.
    pub const DEFAULT: SampleFormat = SampleFormat { bits: 16 };

    pub fn new(bits: u8) -> Result<Self> {
        if bits == 0 || bits > 32 {
            return Err(Error::invalid_argument(
                "sample_width_bits",
                bits,
                "must be between 1 and 32",
            ));
        }
        Ok(SampleFormat { bits })
    }

    pub fn bits(&self) -> u8 {
        self.bits
    }

    /// Bytes of one stored sample: 16 bit words up to 16 bits, 32 bit words above.
    pub fn bytes_per_sample(&self) -> usize {
        if self.bits <= 16 { 2 } else { 4 }
    }

    fn mask(&self) -> u32 {
        if self.bits == 32 {
            u32::MAX
        } else {
            (1u32 << self.bits) - 1
        }
    }

    /// Raw representation of `value`: the two's complement bits, masked to the width.
    pub fn encode(&self, value: i32) -> u32 {
        (value as u32) & self.mask()
    }

    /// Recover the signed value from a raw word.
    pub fn decode(&self, raw: u32) -> i32 {
        let masked = i64::from(raw & self.mask());
        let sign_bit = 1i64 << (self.bits - 1);
        ((masked ^ sign_bit) - sign_bit) as i32
    }

    pub fn serialize(&self, samples: &[i32]) -> Bytes {
        let mut buf = BytesMut::with_capacity(samples.len() * self.bytes_per_sample());
        self.put_samples(&mut buf, samples.iter().copied());
        buf.freeze()
    }

    pub fn serialize_i16(&self, samples: &[i16]) -> Bytes {
        let mut buf = BytesMut::with_capacity(samples.len() * self.bytes_per_sample());
        self.put_samples(&mut buf, samples.iter().map(|&s| i32::from(s)));
        buf.freeze()
    }

    pub(crate) fn put_samples(&self, buf: &mut BytesMut, samples: impl Iterator<Item = i32>) {
        for sample in samples {
            let raw = self.encode(sample);
            if self.bytes_per_sample() == 2 {
                buf.put_u16_le(raw as u16);
            } else {
                buf.put_u32_le(raw);
            }
        }
    }

    pub fn deserialize(&self, data: &[u8]) -> Result<Vec<i32>> {
        let width = self.bytes_per_sample();
        if data.len() % width != 0 {
            return Err(Error::format(format!(
                "{} bytes are not a whole number of {}-byte samples",
                data.len(),
                width
            )));
        }
        let mut reader = data;
        let mut samples = Vec::with_capacity(data.len() / width);
        while reader.has_remaining() {
            let raw = if width == 2 {
                u32::from(reader.get_u16_le())
            } else {
                reader.get_u32_le()
            };
            samples.push(self.decode(raw));
        }
        Ok(samples)
    }

    /// Deserialize and narrow to 16 bit samples.
    pub fn deserialize_i16(&self, data: &[u8]) -> Result<Vec<i16>> {
        self.deserialize(data)?
            .into_iter()
            .map(|s| {
                i16::try_from(s).map_err(|_| {
                    Error::format(format!("sample {s} does not fit into 16 bits"))
                })
            })
            .collect()
    }

    /// Interleaved I/Q pairs.
    pub fn deserialize_iq(&self, data: &[u8]) -> Result<Vec<Complex<i16>>> {
        let samples = self.deserialize_i16(data)?;
        if samples.len() % 2 != 0 {
            return Err(Error::format(
                "I/Q data must contain an even number of samples",
            ));
        }
        Ok(samples
            .chunks_exact(2)
            .map(|pair| Complex::new(pair[0], pair[1]))
            .collect())
    }
}

impl Default for SampleFormat {
    fn default() -> Self {
        SampleFormat::DEFAULT
    }
}

/// Bounds-checked little-endian reader.
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    what: &'static str,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8], what: &'static str) -> Self {
        Reader { data, what }
    }

    fn require(&self, len: usize) -> Result<()> {
        if self.data.remaining() < len {
            return Err(Error::format(format!(
                "{} truncated: needed {} more bytes, {} left",
                self.what,
                len,
                self.data.remaining()
            )));
        }
        Ok(())
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        self.require(4)?;
        Ok(self.data.get_u32_le())
    }

    pub(crate) fn u64(&mut self) -> Result<u64> {
        self.require(8)?;
        Ok(self.data.get_u64_le())
    }

    pub(crate) fn f64(&mut self) -> Result<f64> {
        self.require(8)?;
        Ok(self.data.get_f64_le())
    }

    pub(crate) fn tag(&mut self) -> Result<[u8; 4]> {
        self.require(4)?;
        let mut tag = [0u8; 4];
        self.data.copy_to_slice(&mut tag);
        Ok(tag)
    }

    pub(crate) fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.require(len)?;
        let (head, tail) = self.data.split_at(len);
        self.data = tail;
        Ok(head)
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.remaining()
    }

    pub(crate) fn finish(self) -> Result<()> {
        if self.data.has_remaining() {
            return Err(Error::format(format!(
                "{} has {} trailing bytes",
                self.what,
                self.data.remaining()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_serialize_masks_without_sign_extension() {
        let format = SampleFormat::new(12).unwrap();
        let bytes = format.serialize(&[-1, 2047, -2048]);
        assert_eq!(&bytes[..], &[0xff, 0x0f, 0xff, 0x07, 0x00, 0x08]);
    }

    #[test]
    fn test_deserialize_sign_extends() {
        let format = SampleFormat::new(12).unwrap();
        assert_eq!(
            format.deserialize(&[0xff, 0x0f, 0xff, 0x07, 0x00, 0x08]).unwrap(),
            vec![-1, 2047, -2048]
        );
        // Bits above the width are ignored.
        assert_eq!(format.deserialize(&[0xff, 0xff]).unwrap(), vec![-1]);
    }

    #[test]
    fn test_wide_format_uses_32_bit_words() {
        let format = SampleFormat::new(32).unwrap();
        let bytes = format.serialize(&[i32::MIN, -1]);
        assert_eq!(bytes.len(), 8);
        assert_eq!(format.deserialize(&bytes).unwrap(), vec![i32::MIN, -1]);
    }

    #[test]
    fn test_length_must_match_width() {
        let err = SampleFormat::DEFAULT.deserialize(&[0, 1, 2]).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
        assert!(SampleFormat::new(0).is_err());
        assert!(SampleFormat::new(33).is_err());
    }

    #[test]
    fn test_deserialize_iq() {
        let bytes = SampleFormat::DEFAULT.serialize_i16(&[1, -1, 3, -3]);
        assert_eq!(
            SampleFormat::DEFAULT.deserialize_iq(&bytes).unwrap(),
            vec![Complex::new(1, -1), Complex::new(3, -3)]
        );
        let odd = SampleFormat::DEFAULT.serialize_i16(&[1, 2, 3]);
        assert!(SampleFormat::DEFAULT.deserialize_iq(&odd).is_err());
    }

    #[test]
    fn test_reader_reports_truncation() {
        let mut reader = Reader::new(&[1, 0, 0], "header");
        let err = reader.u32().unwrap_err();
        assert!(err.to_string().contains("header truncated"));
    }

    fn width_and_samples() -> impl Strategy<Value = (u8, Vec<i32>)> {
        (1u8..=32).prop_flat_map(|bits| {
            let min = -(1i64 << (bits - 1));
            let max = (1i64 << (bits - 1)) - 1;
            let values = (min..=max).prop_map(|v| v as i32);
            (Just(bits), prop::collection::vec(values, 0..64))
        })
    }

    proptest! {
        #[test]
        fn prop_round_trip((bits, samples) in width_and_samples()) {
            let format = SampleFormat::new(bits).unwrap();
            let bytes = format.serialize(&samples);
            prop_assert_eq!(format.deserialize(&bytes).unwrap(), samples);
        }

        #[test]
        fn prop_serialize_only_masks((bits, samples) in width_and_samples()) {
            let format = SampleFormat::new(bits).unwrap();
            let bytes = format.serialize(&samples);
            let mut reader = &bytes[..];
            for sample in samples {
                let raw = if format.bytes_per_sample() == 2 {
                    u32::from(reader.get_u16_le())
                } else {
                    reader.get_u32_le()
                };
                prop_assert_eq!(raw, (sample as u32) & format.mask());
            }
        }
    }
}
