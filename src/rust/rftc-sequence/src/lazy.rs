// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

//! Indexable view over the expanded sample stream of a [`Stimulus`].
//!
//! Repeat counts go up to `u32::MAX`, so the expansion is never materialized.
//! The view keeps one `(start, end)` range per chunk covering a single
//! traversal of the chunk list; a lookup strips the wait padding, folds the
//! index into one traversal, binary searches the owning chunk and folds
//! again into one repetition of that chunk.

use std::iter::FusedIterator;
use std::ops::Range;

use rftc_common::{Error, Result};

use crate::stimulus::{Stimulus, WaveChunk};

#[derive(Debug, Clone)]
pub struct LazySamples<'a> {
    chunks: &'a [WaveChunk],
    /// Half-open range of each chunk within one traversal.
    ranges: Vec<Range<u64>>,
    wait_len: u64,
    cycle_len: u64,
    len: u64,
}

impl<'a> LazySamples<'a> {
    pub(crate) fn new(stimulus: &'a Stimulus, include_wait: bool) -> Self {
        let mut ranges = Vec::with_capacity(stimulus.num_chunks());
        let mut start = 0u64;
        for chunk in stimulus.chunks() {
            let end = start + chunk.num_samples() * u64::from(chunk.num_repeats());
            ranges.push(start..end);
            start = end;
        }
        let wait_len = if include_wait {
            stimulus.num_wait_samples()
        } else {
            0
        };
        LazySamples {
            chunks: stimulus.chunks(),
            ranges,
            wait_len,
            cycle_len: start,
            len: stimulus.num_samples(include_wait),
        }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sample at `index`, or `None` past the end.
    pub fn get(&self, index: u64) -> Option<i16> {
        if index >= self.len {
            return None;
        }
        if index < self.wait_len {
            return Some(0);
        }
        let offset = (index - self.wait_len) % self.cycle_len;
        let owner = self.ranges.partition_point(|range| range.end <= offset);
        let range = &self.ranges[owner];
        let chunk = &self.chunks[owner];
        let within = (offset - range.start) % chunk.num_samples();
        Some(chunk.sample_at(within))
    }

    /// Sample at `index`, where negative values count from the end.
    pub fn at(&self, index: i64) -> Result<i16> {
        let resolved = if index < 0 {
            i128::from(self.len) + i128::from(index)
        } else {
            i128::from(index)
        };
        u64::try_from(resolved)
            .ok()
            .and_then(|i| self.get(i))
            .ok_or(Error::IndexOutOfRange {
                index: i128::from(index),
                len: self.len,
            })
    }

    /// Samples of `range`, computed index by index.
    pub fn slice(&self, range: Range<u64>) -> Result<Vec<i16>> {
        if range.start > range.end || range.end > self.len {
            return Err(Error::IndexOutOfRange {
                index: i128::from(range.end),
                len: self.len,
            });
        }
        Ok(range.filter_map(|i| self.get(i)).collect())
    }

    pub fn iter(&self) -> Iter<'_, 'a> {
        Iter {
            view: self,
            front: 0,
            back: self.len,
        }
    }
}

impl<'v, 'a> IntoIterator for &'v LazySamples<'a> {
    type Item = i16;
    type IntoIter = Iter<'v, 'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct Iter<'v, 'a> {
    view: &'v LazySamples<'a>,
    front: u64,
    back: u64,
}

impl Iterator for Iter<'_, '_> {
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        if self.front >= self.back {
            return None;
        }
        let sample = self.view.get(self.front);
        self.front += 1;
        sample
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        match usize::try_from(remaining) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }

    fn nth(&mut self, n: usize) -> Option<i16> {
        self.front = self.front.saturating_add(n as u64).min(self.back);
        self.next()
    }
}

impl DoubleEndedIterator for Iter<'_, '_> {
    fn next_back(&mut self) -> Option<i16> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        self.view.get(self.back)
    }
}

impl FusedIterator for Iter<'_, '_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn stimulus() -> Stimulus {
        let mut stimulus = Stimulus::new(2, 3).unwrap();
        stimulus
            .add_chunk((0..1024).map(|i| i as i16 + 1).collect(), 1, 2)
            .unwrap()
            .add_chunk(vec![-5; 1024], 0, 1)
            .unwrap();
        stimulus
    }

    #[test]
    fn test_lookup_regions() {
        let stimulus = stimulus();
        let lazy = stimulus.all_samples_lazy(true);
        let cycle = (1024 + 16) * 2 + 1024;
        assert_eq!(lazy.len(), 32 + 3 * cycle);
        // Wait padding.
        assert_eq!(lazy.get(0), Some(0));
        assert_eq!(lazy.get(31), Some(0));
        // First chunk, first repetition.
        assert_eq!(lazy.get(32), Some(1));
        assert_eq!(lazy.get(32 + 1023), Some(1024));
        // Blank words of the first chunk.
        assert_eq!(lazy.get(32 + 1024), Some(0));
        // Second repetition of the first chunk.
        assert_eq!(lazy.get(32 + 1040), Some(1));
        // Second chunk.
        assert_eq!(lazy.get(32 + 2080), Some(-5));
        // Second traversal.
        assert_eq!(lazy.get(32 + cycle), Some(1));
        assert_eq!(lazy.get(lazy.len() - 1), Some(-5));
        assert_eq!(lazy.get(lazy.len()), None);
    }

    #[test]
    fn test_without_wait() {
        let stimulus = stimulus();
        let lazy = stimulus.all_samples_lazy(false);
        assert_eq!(lazy.get(0), Some(1));
        assert_eq!(lazy.len(), stimulus.num_samples(false));
    }

    #[test]
    fn test_negative_and_out_of_range_indices() {
        let stimulus = stimulus();
        let lazy = stimulus.all_samples_lazy(true);
        assert_eq!(lazy.at(-1).unwrap(), -5);
        assert_eq!(lazy.at(0).unwrap(), 0);
        let len = lazy.len() as i64;
        assert_eq!(lazy.at(-len).unwrap(), 0);
        assert!(matches!(
            lazy.at(-len - 1),
            Err(Error::IndexOutOfRange { .. })
        ));
        assert!(matches!(lazy.at(len), Err(Error::IndexOutOfRange { .. })));
    }

    #[test]
    fn test_slice() {
        let stimulus = stimulus();
        let lazy = stimulus.all_samples_lazy(true);
        assert_eq!(lazy.slice(30..34).unwrap(), vec![0, 0, 1, 2]);
        assert!(lazy.slice(0..lazy.len() + 1).is_err());
        assert!(lazy.slice(5..5).unwrap().is_empty());
    }

    #[test]
    fn test_huge_expansion_is_not_materialized() {
        let mut stimulus = Stimulus::new(0, u32::MAX).unwrap();
        stimulus.add_chunk(vec![3; 1024], 0, 1000).unwrap();
        let lazy = stimulus.all_samples_lazy(true);
        assert_eq!(lazy.len(), 1024 * 1000 * u64::from(u32::MAX));
        assert_eq!(lazy.get(lazy.len() - 1), Some(3));
        assert_eq!(lazy.iter().rev().take(3).collect::<Vec<_>>(), vec![3, 3, 3]);
    }

    #[test]
    fn test_iterator_nth_and_empty() {
        let stimulus = stimulus();
        let lazy = stimulus.all_samples_lazy(true);
        let mut iter = lazy.iter();
        assert_eq!(iter.nth(32), Some(1));
        assert_eq!(iter.next(), Some(2));

        let empty = Stimulus::new(4, 1).unwrap();
        let lazy = empty.all_samples_lazy(true);
        assert_eq!(lazy.len(), 64);
        assert!(lazy.iter().all(|s| s == 0));
        let lazy = empty.all_samples_lazy(false);
        assert!(lazy.is_empty());
        assert_eq!(lazy.iter().next(), None);
    }
}
