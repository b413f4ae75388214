//! Chunk arithmetic for the even partition of a padded line set.
//!
//! The coordinator pads the source to a multiple of the group size so every
//! rank gets a chunk of the same length. Rank `r` owns the contiguous range
//! `chunk_size * r .. chunk_size * (r + 1)`, which makes the global 1-based line
//! number of a local match `chunk_size * r + local_index + 1`.

use std::ops::Range;

use crate::error::{Error, Result};

/// Smallest multiple of `workers` that is `>= lines`.
///
/// # Panics
///
/// Panics if `workers` is zero.
pub fn padded_len(lines: u64, workers: u64) -> u64 {
    assert!(workers > 0, "worker count must be non-zero");
    lines.div_ceil(workers) * workers
}

/// How a source of `source_lines` lines is split over `workers` ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Partition {
    source_lines: u64,
    chunk_size: u64,
    workers: u64,
}

impl Partition {
    /// Partition `source_lines` lines over `workers` ranks.
    pub fn new(source_lines: u64, workers: u64) -> Result<Self> {
        if workers == 0 {
            return Err(Error::InvalidGroupSize(0));
        }
        Ok(Partition {
            source_lines,
            chunk_size: padded_len(source_lines, workers) / workers,
            workers,
        })
    }

    /// Rebuild a partition announced by the coordinator, checking that the
    /// chunk size is the one this group would have computed.
    pub fn from_parts(source_lines: u64, chunk_size: u64, workers: u64) -> Result<Self> {
        let partition = Partition::new(source_lines, workers)?;
        if partition.chunk_size != chunk_size {
            return Err(Error::Internal(format!(
                "announced chunk size {chunk_size} does not cover {source_lines} lines over {workers} workers"
            )));
        }
        Ok(partition)
    }

    /// Lines in the unpadded source.
    pub fn source_lines(&self) -> u64 {
        self.source_lines
    }

    /// Lines per rank.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Number of ranks.
    pub fn workers(&self) -> u64 {
        self.workers
    }

    /// Lines after padding.
    pub fn padded_lines(&self) -> u64 {
        self.chunk_size * self.workers
    }

    /// Number of empty lines appended by the coordinator.
    pub fn padding(&self) -> u64 {
        self.padded_lines() - self.source_lines
    }

    /// 0-based indices of the padded line set owned by `rank`.
    pub fn chunk_range(&self, rank: u64) -> Range<u64> {
        let start = self.chunk_size * rank;
        start..start + self.chunk_size
    }

    /// Number of leading lines of `rank`'s chunk that come from the source;
    /// the rest of the chunk is padding.
    pub fn source_lines_in(&self, rank: u64) -> u64 {
        let start = self.chunk_size * rank;
        self.source_lines.saturating_sub(start).min(self.chunk_size)
    }

    /// 1-based line number of `local_index` within `rank`'s chunk.
    pub fn global_line(&self, rank: u64, local_index: u64) -> u64 {
        self.chunk_size * rank + local_index + 1
    }

    /// `true` if the 1-based `global_line` is one of the appended padding lines.
    pub fn is_padding(&self, global_line: u64) -> bool {
        global_line > self.source_lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn pads_to_next_multiple() {
        assert_eq!(padded_len(0, 4), 0);
        assert_eq!(padded_len(3, 2), 4);
        assert_eq!(padded_len(8, 4), 8);
        assert_eq!(padded_len(9, 4), 12);
        assert_eq!(padded_len(5, 1), 5);
    }

    #[test]
    fn three_lines_two_workers() {
        let p = Partition::new(3, 2).unwrap();
        assert_eq!(p.chunk_size(), 2);
        assert_eq!(p.padded_lines(), 4);
        assert_eq!(p.padding(), 1);
        assert_eq!(p.chunk_range(1), 2..4);
        assert_eq!(p.global_line(1, 0), 3);
        assert!(!p.is_padding(3));
        assert!(p.is_padding(4));
    }

    #[test]
    fn padding_sits_at_the_tail() {
        // 1 line over 4 workers: ranks 1..4 hold nothing but padding
        let p = Partition::new(1, 4).unwrap();
        assert_eq!(p.chunk_size(), 1);
        assert_eq!(p.source_lines_in(0), 1);
        assert_eq!(p.source_lines_in(1), 0);
        assert_eq!(p.source_lines_in(3), 0);

        let p = Partition::new(10, 4).unwrap();
        let counts: Vec<u64> = (0..4).map(|r| p.source_lines_in(r)).collect();
        assert_eq!(counts, vec![3, 3, 3, 1]);
    }

    #[test]
    fn empty_source_has_empty_chunks() {
        let p = Partition::new(0, 3).unwrap();
        assert_eq!(p.chunk_size(), 0);
        assert!(p.chunk_range(2).is_empty());
    }

    #[test]
    fn rejects_zero_workers_and_bad_announcements() {
        assert!(Partition::new(10, 0).is_err());
        assert!(Partition::from_parts(10, 3, 4).is_ok());
        assert!(Partition::from_parts(10, 2, 4).is_err());
    }

    proptest! {
        #[test]
        fn padded_len_is_smallest_cover(lines in 0u64..10_000, workers in 1u64..64) {
            let padded = padded_len(lines, workers);
            prop_assert_eq!(padded % workers, 0);
            prop_assert!(padded >= lines);
            prop_assert!(padded < lines + workers);
        }

        #[test]
        fn chunks_tile_the_padded_set(lines in 0u64..2_000, workers in 1u64..32) {
            let p = Partition::new(lines, workers).unwrap();
            let mut next = 0;
            for rank in 0..workers {
                let range = p.chunk_range(rank);
                prop_assert_eq!(range.start, next);
                prop_assert_eq!(range.end - range.start, p.chunk_size());
                next = range.end;
            }
            prop_assert_eq!(next, p.padded_lines());
        }

        #[test]
        fn global_lines_increase_with_rank_then_index(lines in 1u64..2_000, workers in 1u64..32) {
            let p = Partition::new(lines, workers).unwrap();
            let mut prev = 0;
            for rank in 0..workers {
                for local in 0..p.chunk_size() {
                    let line = p.global_line(rank, local);
                    prop_assert!(line > prev);
                    prev = line;
                }
            }
            prop_assert_eq!(prev, p.padded_lines());
        }
    }
}
