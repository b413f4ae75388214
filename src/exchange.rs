//! Two-phase aggregation of contributions whose sizes are only known to
//! their senders.
//!
//! Phase A, [`negotiate_sizes`]: every rank contributes one integer, its
//! element count, and every rank learns the full [`Layout`].
//!
//! Phase B, [`exchange_with_layout`]: one variable-count gather places rank
//! `r`'s block at `displs[r]` on the root, in rank order.
//!
//! The layout is computed once and [scaled](Layout::scaled) for payloads that
//! carry several elements per logical item (fixed-width text records). Since
//! every rank knows the global total, a zero total skips Phase B everywhere
//! and no zero-length transfer is attempted.

use std::ops::Range;

use crate::collective::Collective;
use crate::datatype::MpiDatatype;
use crate::error::{Error, Result};

/// Per-rank counts and prefix-sum displacements for a v-collective.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    counts: Vec<i32>,
    displs: Vec<i32>,
    total: usize,
}

impl Layout {
    /// Build a layout from per-rank element counts, in rank order.
    ///
    /// Counts and displacements must fit the `i32` arguments of MPI's
    /// v-collectives.
    pub fn from_counts(counts: &[u64]) -> Result<Self> {
        let mut layout = Layout {
            counts: Vec::with_capacity(counts.len()),
            displs: Vec::with_capacity(counts.len()),
            total: 0,
        };
        let mut offset: i32 = 0;
        for &count in counts {
            let count = i32::try_from(count).map_err(|_| Error::InvalidCount(count as i64))?;
            layout.counts.push(count);
            layout.displs.push(offset);
            offset = offset
                .checked_add(count)
                .ok_or_else(|| Error::InvalidCount(i64::from(offset) + i64::from(count)))?;
        }
        layout.total = offset as usize;
        Ok(layout)
    }

    /// The same layout with every count multiplied by `factor`.
    pub fn scaled(&self, factor: usize) -> Result<Self> {
        let factor = factor as u64;
        let counts = self
            .counts
            .iter()
            .map(|&c| {
                (c as u64)
                    .checked_mul(factor)
                    .ok_or(Error::InvalidCount(i64::MAX))
            })
            .collect::<Result<Vec<_>>>()?;
        Layout::from_counts(&counts)
    }

    /// Elements contributed by each rank.
    pub fn counts(&self) -> &[i32] {
        &self.counts
    }

    /// Offset of each rank's block in the merged buffer.
    pub fn displs(&self) -> &[i32] {
        &self.displs
    }

    /// Elements contributed by `rank`.
    pub fn count(&self, rank: usize) -> usize {
        self.counts.get(rank).map_or(0, |&c| c as usize)
    }

    /// Where `rank`'s block lands in the merged buffer.
    pub fn block(&self, rank: usize) -> Range<usize> {
        let start = self.displs.get(rank).map_or(self.total, |&d| d as usize);
        start..start + self.count(rank)
    }

    /// Size of the merged buffer.
    pub fn total(&self) -> usize {
        self.total
    }

    /// `true` if no rank contributes anything.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Phase A: share every rank's element count with the whole group.
pub fn negotiate_sizes<C: Collective>(comm: &C, local_count: usize) -> Result<Layout> {
    let mut counts = vec![0u64; comm.size() as usize];
    comm.allgather(&[local_count as u64], &mut counts)?;
    Layout::from_counts(&counts)
}

/// Phase B: gather `send` from every rank into one buffer on `root`, laid out
/// by `layout`. Returns the merged buffer on the root and an empty vector on
/// the other ranks.
pub fn exchange_with_layout<C, T>(
    comm: &C,
    layout: &Layout,
    send: &[T],
    root: i32,
) -> Result<Vec<T>>
where
    C: Collective,
    T: MpiDatatype,
{
    let expected = layout.count(comm.rank() as usize);
    if send.len() != expected {
        return Err(Error::InvalidBuffer(format!(
            "rank {} offers {} elements, layout says {expected}",
            comm.rank(),
            send.len()
        )));
    }
    if layout.is_empty() {
        return Ok(Vec::new());
    }
    let mut recv = if comm.rank() == root {
        vec![T::default(); layout.total()]
    } else {
        Vec::new()
    };
    comm.gatherv(send, &mut recv, layout.counts(), layout.displs(), root)?;
    Ok(recv)
}
