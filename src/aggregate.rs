//! Merging per-rank matches into one ordered result on the coordinator.
//!
//! Ranks hold contiguous chunks assigned in rank order and report matches in
//! chunk order, so walking the gathered blocks in rank order already yields
//! strictly increasing line numbers. [`ResultSet::from_ordered`] checks that
//! instead of sorting.

use std::fmt;
use std::slice;

use tracing::debug;

use crate::collective::{Collective, GroupContext};
use crate::distribute::Assignment;
use crate::error::{Error, Result};
use crate::exchange::{exchange_with_layout, negotiate_sizes};
use crate::search::LocalMatches;

/// A matching line of the source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Match {
    /// 1-based line number
    pub line: u64,
    /// Line text with record padding removed
    pub text: String,
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.text)
    }
}

/// All matches of one search, ordered by line number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    matches: Vec<Match>,
    per_rank: Vec<u64>,
}

impl ResultSet {
    /// Wrap matches that are already in file order, rejecting any sequence
    /// whose line numbers are not strictly increasing.
    pub fn from_ordered(matches: Vec<Match>, per_rank: Vec<u64>) -> Result<Self> {
        if let Some(pair) = matches.windows(2).find(|w| w[0].line >= w[1].line) {
            return Err(Error::OrderViolation {
                prev: pair[0].line,
                next: pair[1].line,
            });
        }
        Ok(ResultSet { matches, per_rank })
    }

    /// Matches in line order.
    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    /// Number of matches reported by each rank.
    pub fn per_rank(&self) -> &[u64] {
        &self.per_rank
    }

    /// Number of matches.
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// `true` if nothing matched.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Iterate over the matches in line order.
    pub fn iter(&self) -> slice::Iter<'_, Match> {
        self.matches.iter()
    }

    /// Take the matches.
    pub fn into_matches(self) -> Vec<Match> {
        self.matches
    }
}

impl IntoIterator for ResultSet {
    type Item = Match;
    type IntoIter = std::vec::IntoIter<Match>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Match;
    type IntoIter = slice::Iter<'a, Match>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.iter()
    }
}

/// Collect every rank's matches on the coordinator.
///
/// Collective: every rank must call it. Returns `Some` on the coordinator
/// and `None` elsewhere.
pub fn aggregate<C: Collective>(
    comm: &C,
    ctx: GroupContext,
    assignment: &Assignment,
    local: &LocalMatches<'_>,
) -> Result<Option<ResultSet>> {
    let outbound = local.encode(assignment)?;
    let codec = assignment.codec();
    let root = GroupContext::COORDINATOR;

    let layout = negotiate_sizes(comm, local.len())?;
    debug!(
        rank = ctx.rank(),
        local = local.len(),
        total = layout.total(),
        "negotiated result layout"
    );

    let line_numbers = exchange_with_layout(comm, &layout, &outbound.line_numbers, root)?;
    let text_layout = layout.scaled(codec.width())?;
    let records = exchange_with_layout(comm, &text_layout, &outbound.records, root)?;

    if !ctx.is_coordinator() {
        return Ok(None);
    }

    let texts = codec.decode_batch(&records)?;
    if texts.len() != line_numbers.len() {
        return Err(Error::Internal(format!(
            "gathered {} line numbers but {} records",
            line_numbers.len(),
            texts.len()
        )));
    }
    let matches = line_numbers
        .into_iter()
        .zip(texts)
        .map(|(line, text)| Match { line, text })
        .collect();
    let per_rank = layout.counts().iter().map(|&c| c as u64).collect();
    ResultSet::from_ordered(matches, per_rank).map(Some)
}
