//! Per-rank substring scan.

use crate::distribute::Assignment;
use crate::error::Result;

/// A line of this rank's chunk that contains the pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalMatch<'a> {
    /// 0-based index within the chunk
    pub local_index: usize,
    /// The matching line
    pub text: &'a str,
}

/// Matches found in one chunk, in chunk order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalMatches<'a> {
    matches: Vec<LocalMatch<'a>>,
}

/// Matches encoded for the result exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outbound {
    /// 1-based global line numbers
    pub line_numbers: Vec<u64>,
    /// One fixed-width record per match
    pub records: Vec<u8>,
}

impl<'a> LocalMatches<'a> {
    /// Number of matches.
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// `true` if nothing matched.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Matches in chunk order.
    pub fn as_slice(&self) -> &[LocalMatch<'a>] {
        &self.matches
    }

    /// Turn local indices into global line numbers and the text into records
    /// using the assignment's codec.
    pub fn encode(&self, assignment: &Assignment) -> Result<Outbound> {
        let line_numbers = self
            .matches
            .iter()
            .map(|m| assignment.global_line(m.local_index))
            .collect::<Vec<_>>();
        let first = line_numbers.first().copied().unwrap_or(1);
        let records = assignment
            .codec()
            .encode_batch(self.matches.iter().map(|m| m.text), first)?;
        Ok(Outbound {
            line_numbers,
            records: records.bytes,
        })
    }
}

/// Scan `lines` once, in order, keeping those that contain `pattern`.
///
/// Containment is exact and byte-for-byte: no tokenising, escaping or regex.
/// An empty pattern matches every line.
pub fn scan_lines<'a>(lines: &'a [String], pattern: &str) -> LocalMatches<'a> {
    let matches = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.contains(pattern))
        .map(|(local_index, line)| LocalMatch {
            local_index,
            text: line.as_str(),
        })
        .collect();
    LocalMatches { matches }
}

/// Scan this rank's chunk for the assignment's pattern.
///
/// Padding lines are never scanned, so even the empty pattern only reports
/// lines that exist in the file.
pub fn scan(assignment: &Assignment) -> LocalMatches<'_> {
    scan_lines(assignment.source_lines(), assignment.pattern())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn owned(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn substring_not_word_match() {
        let lines = owned(&["apple", "banana", "cherry", "date"]);
        let found = scan_lines(&lines, "an");
        assert_eq!(
            found.as_slice(),
            [LocalMatch {
                local_index: 1,
                text: "banana"
            }]
        );
    }

    #[test]
    fn pattern_is_literal() {
        let lines = owned(&["a.c", "abc", "a*c"]);
        let idx: Vec<_> = scan_lines(&lines, "a.c")
            .as_slice()
            .iter()
            .map(|m| m.local_index)
            .collect();
        assert_eq!(idx, vec![0]);
    }

    #[test]
    fn empty_pattern_matches_every_line() {
        let lines = owned(&["x", "", "y"]);
        assert_eq!(scan_lines(&lines, "").len(), 3);
    }

    #[test]
    fn no_match_is_empty() {
        let lines = owned(&["x", "y"]);
        assert!(scan_lines(&lines, "zzz").is_empty());
    }

    proptest! {
        #[test]
        fn included_iff_contained(
            lines in prop::collection::vec("[ab ]{0,8}", 0..32),
            pattern in "[ab]{0,3}",
        ) {
            let found = scan_lines(&lines, &pattern);
            let indices: Vec<usize> = found.as_slice().iter().map(|m| m.local_index).collect();
            let expected: Vec<usize> = lines
                .iter()
                .enumerate()
                .filter(|(_, l)| l.contains(pattern.as_str()))
                .map(|(i, _)| i)
                .collect();
            prop_assert_eq!(indices, expected);
        }
    }
}
