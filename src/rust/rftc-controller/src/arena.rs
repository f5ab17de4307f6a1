// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

//! Placement of an upload batch in a fixed memory region.

use crate::regmap::DRAM_ALIGN;
use crate::{Error, Result};

/// Offsets of blocks of the given sizes laid out back to back from the
/// region start, each aligned to [`DRAM_ALIGN`].
///
/// The whole batch is rejected if it does not fit into `capacity` bytes.
/// Sizes too large to address saturate the reported requirement.
pub(crate) fn allocate(sizes: &[u64], capacity: u64) -> Result<Vec<u64>> {
    let mut offsets = Vec::with_capacity(sizes.len());
    let mut cursor = 0u64;
    let mut required = 0u64;
    for &size in sizes {
        offsets.push(cursor);
        required = cursor.saturating_add(size);
        cursor = required
            .checked_next_multiple_of(DRAM_ALIGN)
            .unwrap_or(u64::MAX);
    }
    if required > capacity {
        return Err(Error::CapacityExceeded { required, capacity });
    }
    Ok(offsets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_blocks_are_aligned() {
        assert_eq!(allocate(&[10, 64, 1], 1024).unwrap(), vec![0, 32, 96]);
        assert!(allocate(&[], 0).unwrap().is_empty());
    }

    #[test]
    fn test_batch_exceeding_capacity() {
        assert_eq!(allocate(&[32, 32], 64).unwrap(), vec![0, 32]);
        let err = allocate(&[32, 33], 64).unwrap_err();
        assert!(matches!(
            err,
            Error::CapacityExceeded {
                required: 65,
                capacity: 64
            }
        ));
    }

    #[test]
    fn test_saturating_sizes_are_rejected() {
        let err = allocate(&[64, u64::MAX, 32], 1 << 31).unwrap_err();
        assert!(matches!(
            err,
            Error::CapacityExceeded {
                required: u64::MAX,
                ..
            }
        ));
    }

    proptest! {
        #[test]
        fn test_blocks_never_overlap(sizes in prop::collection::vec(0u64..5000, 0..20)) {
            let offsets = allocate(&sizes, u64::MAX).unwrap();
            for (pair, size) in offsets.windows(2).zip(&sizes) {
                prop_assert_eq!(pair[0] % DRAM_ALIGN, 0);
                prop_assert!(pair[0] + size <= pair[1]);
            }
            let required = offsets.last().zip(sizes.last()).map_or(0, |(o, s)| o + s);
            prop_assert!(allocate(&sizes, required).is_ok());
            if required > 0 {
                prop_assert!(allocate(&sizes, required - 1).is_err());
            }
        }
    }
}
