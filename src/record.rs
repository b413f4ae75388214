//! Fixed-width record codec.
//!
//! Lines travel between ranks as records of exactly `width` bytes: the line's
//! UTF-8 bytes right-padded with a pad byte. A batch of records is one
//! contiguous buffer with no per-element metadata, so it can be scattered and
//! gathered with plain byte counts.
//!
//! Decoding strips trailing pad bytes only; interior bytes are never touched.
//! A line survives the round trip exactly when it [fits](RecordCodec::fits):
//! at most `width` bytes and not ending in the pad byte. What happens to a line
//! that does not fit is decided by the codec's [`OverflowPolicy`].

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Record width used by the original grep tool (`LINELENGTH`).
pub const DEFAULT_RECORD_WIDTH: usize = 100;

/// Default pad byte. NUL does not occur in ordinary text, so trailing
/// whitespace survives the round trip.
pub const DEFAULT_PAD: u8 = 0x00;

/// Pad byte of the original tool. Trailing spaces of a line are lost with it.
pub const LEGACY_PAD: u8 = b' ';

/// What to do with a line that cannot be encoded losslessly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OverflowPolicy {
    /// Cut over-long lines at the last character boundary that fits and keep going.
    #[default]
    Truncate,
    /// Fail the encode.
    Reject,
}

impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "truncate" => Ok(OverflowPolicy::Truncate),
            "reject" => Ok(OverflowPolicy::Reject),
            other => Err(format!(
                "unknown overflow policy '{other}' (expected 'truncate' or 'reject')"
            )),
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::Truncate => f.write_str("truncate"),
            OverflowPolicy::Reject => f.write_str("reject"),
        }
    }
}

/// Outcome of encoding one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoded {
    /// The record decodes back to the line.
    Exact,
    /// The line was longer than the record and was cut to `kept` bytes.
    Truncated {
        /// Bytes of the original line kept in the record
        kept: usize,
    },
    /// The line ends with the pad byte; those trailing bytes will not decode.
    PadCollision,
}

impl Encoded {
    /// `true` unless the record decodes back to the line.
    pub fn is_lossy(&self) -> bool {
        !matches!(self, Encoded::Exact)
    }
}

/// A contiguous buffer of fixed-width records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedRecords {
    /// `records * width` bytes
    pub bytes: Vec<u8>,
    /// Number of records in `bytes`
    pub records: usize,
    /// Records that will not decode to their source line
    pub lossy: usize,
}

/// Encoder/decoder between text lines and fixed-width records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordCodec {
    width: usize,
    pad: u8,
    overflow: OverflowPolicy,
}

impl Default for RecordCodec {
    fn default() -> Self {
        RecordCodec {
            width: DEFAULT_RECORD_WIDTH,
            pad: DEFAULT_PAD,
            overflow: OverflowPolicy::default(),
        }
    }
}

impl RecordCodec {
    /// Create a codec. `width` must be non-zero and `pad` must be ASCII, so
    /// stripping pad bytes can never split a multi-byte character.
    pub fn new(width: usize, pad: u8) -> Result<Self> {
        if width == 0 {
            return Err(Error::InvalidRecordWidth(width));
        }
        if !pad.is_ascii() {
            return Err(Error::InvalidPad(pad));
        }
        Ok(RecordCodec {
            width,
            pad,
            overflow: OverflowPolicy::default(),
        })
    }

    /// Codec matching the original tool: 100-byte records padded with spaces.
    pub fn legacy() -> Self {
        RecordCodec {
            width: DEFAULT_RECORD_WIDTH,
            pad: LEGACY_PAD,
            overflow: OverflowPolicy::Truncate,
        }
    }

    /// Replace the overflow policy.
    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    /// Record width in bytes.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Pad byte.
    pub fn pad(&self) -> u8 {
        self.pad
    }

    /// Overflow policy.
    pub fn overflow(&self) -> OverflowPolicy {
        self.overflow
    }

    /// `true` if `line` survives an encode/decode round trip.
    pub fn fits(&self, line: &str) -> bool {
        line.len() <= self.width && line.as_bytes().last() != Some(&self.pad)
    }

    /// Append one record for `line` to `out`.
    ///
    /// `line_no` (1-based) is only used to label errors. Under
    /// [`OverflowPolicy::Reject`] a line that does not fit is an error and
    /// nothing is appended.
    pub fn encode_into(&self, line: &str, line_no: u64, out: &mut Vec<u8>) -> Result<Encoded> {
        let bytes = line.as_bytes();
        let outcome = if bytes.len() > self.width {
            if self.overflow == OverflowPolicy::Reject {
                return Err(Error::RecordOverflow {
                    line: line_no,
                    len: bytes.len(),
                    width: self.width,
                });
            }
            Encoded::Truncated {
                kept: floor_char_boundary(line, self.width),
            }
        } else if bytes.last() == Some(&self.pad) {
            if self.overflow == OverflowPolicy::Reject {
                return Err(Error::PadCollision {
                    line: line_no,
                    pad: self.pad,
                });
            }
            Encoded::PadCollision
        } else {
            Encoded::Exact
        };

        let kept = match outcome {
            Encoded::Truncated { kept } => kept,
            _ => bytes.len(),
        };
        out.extend_from_slice(&bytes[..kept]);
        out.resize(out.len() + self.width - kept, self.pad);
        Ok(outcome)
    }

    /// Encode every line into one contiguous buffer. Lines are numbered from
    /// `first_line` for error reporting.
    pub fn encode_batch<I, S>(&self, lines: I, first_line: u64) -> Result<EncodedRecords>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lines = lines.into_iter();
        let mut batch = EncodedRecords {
            bytes: Vec::with_capacity(lines.size_hint().0 * self.width),
            ..EncodedRecords::default()
        };
        for (i, line) in lines.enumerate() {
            let outcome = self.encode_into(line.as_ref(), first_line + i as u64, &mut batch.bytes)?;
            batch.records += 1;
            if outcome.is_lossy() {
                batch.lossy += 1;
            }
        }
        Ok(batch)
    }

    /// Decode one record, stripping trailing pad bytes.
    pub fn decode(&self, record: &[u8]) -> Result<String> {
        if record.len() != self.width {
            return Err(Error::InvalidBuffer(format!(
                "record of {} bytes, codec width is {}",
                record.len(),
                self.width
            )));
        }
        let end = record
            .iter()
            .rposition(|&b| b != self.pad)
            .map_or(0, |i| i + 1);
        Ok(std::str::from_utf8(&record[..end])?.to_owned())
    }

    /// Decode a buffer of back-to-back records.
    pub fn decode_batch(&self, bytes: &[u8]) -> Result<Vec<String>> {
        if bytes.len() % self.width != 0 {
            return Err(Error::InvalidBuffer(format!(
                "{} bytes is not a whole number of {}-byte records",
                bytes.len(),
                self.width
            )));
        }
        bytes
            .chunks_exact(self.width)
            .map(|record| self.decode(record))
            .collect()
    }
}

/// Largest index `<= max` that falls on a character boundary of `s`.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn codec(width: usize) -> RecordCodec {
        RecordCodec::new(width, DEFAULT_PAD).unwrap()
    }

    #[test]
    fn rejects_bad_configuration() {
        assert!(matches!(
            RecordCodec::new(0, b' '),
            Err(Error::InvalidRecordWidth(0))
        ));
        assert!(matches!(
            RecordCodec::new(8, 0xff),
            Err(Error::InvalidPad(0xff))
        ));
    }

    #[test]
    fn pads_to_width() {
        let mut out = Vec::new();
        let outcome = codec(6).encode_into("abc", 1, &mut out).unwrap();
        assert_eq!(outcome, Encoded::Exact);
        assert_eq!(out, b"abc\0\0\0");
    }

    #[test]
    fn padding_line_decodes_empty() {
        let c = RecordCodec::legacy();
        let mut out = Vec::new();
        c.encode_into("", 4, &mut out).unwrap();
        assert_eq!(out.len(), DEFAULT_RECORD_WIDTH);
        assert_eq!(c.decode(&out).unwrap(), "");
    }

    #[test]
    fn keeps_interior_whitespace() {
        let c = RecordCodec::new(12, b' ').unwrap();
        let mut out = Vec::new();
        c.encode_into("a  b\tc", 1, &mut out).unwrap();
        assert_eq!(c.decode(&out).unwrap(), "a  b\tc");
    }

    #[test]
    fn exact_width_line_is_not_truncated() {
        let c = codec(5);
        let mut out = Vec::new();
        assert_eq!(c.encode_into("hello", 1, &mut out).unwrap(), Encoded::Exact);
        assert_eq!(c.decode(&out).unwrap(), "hello");
    }

    #[test]
    fn truncates_on_char_boundary() {
        // 'é' is two bytes; cutting at 4 would split it
        let c = codec(4);
        let mut out = Vec::new();
        let outcome = c.encode_into("abcé", 1, &mut out).unwrap();
        assert_eq!(outcome, Encoded::Truncated { kept: 3 });
        assert_eq!(out.len(), 4);
        assert_eq!(c.decode(&out).unwrap(), "abc");
    }

    #[test]
    fn reject_policy_reports_line() {
        let c = codec(3).with_overflow(OverflowPolicy::Reject);
        let mut out = Vec::new();
        let err = c.encode_into("toolong", 9, &mut out).unwrap_err();
        assert!(matches!(
            err,
            Error::RecordOverflow {
                line: 9,
                len: 7,
                width: 3
            }
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn legacy_pad_collides_with_trailing_space() {
        let c = RecordCodec::legacy();
        assert!(!c.fits("trailing "));
        let mut out = Vec::new();
        assert_eq!(
            c.encode_into("trailing ", 1, &mut out).unwrap(),
            Encoded::PadCollision
        );
        assert_eq!(c.decode(&out).unwrap(), "trailing");

        let strict = c.with_overflow(OverflowPolicy::Reject);
        assert!(matches!(
            strict.encode_into("trailing ", 2, &mut Vec::new()),
            Err(Error::PadCollision { line: 2, pad: b' ' })
        ));
    }

    #[test]
    fn batch_counts_lossy_records() {
        let c = codec(4);
        let batch = c.encode_batch(["ab", "abcdef", "", "wxyz"], 1).unwrap();
        assert_eq!(batch.records, 4);
        assert_eq!(batch.lossy, 1);
        assert_eq!(batch.bytes.len(), 16);
        assert_eq!(
            c.decode_batch(&batch.bytes).unwrap(),
            vec!["ab", "abcd", "", "wxyz"]
        );
    }

    #[test]
    fn decode_rejects_ragged_buffers() {
        let c = codec(4);
        assert!(c.decode(b"abc").is_err());
        assert!(c.decode_batch(b"abcdefg").is_err());
        assert!(c.decode_batch(&[]).unwrap().is_empty());
    }

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("Reject".parse::<OverflowPolicy>(), Ok(OverflowPolicy::Reject));
        assert_eq!("truncate".parse::<OverflowPolicy>(), Ok(OverflowPolicy::Truncate));
        assert!("drop".parse::<OverflowPolicy>().is_err());
    }

    proptest! {
        #[test]
        fn fitting_lines_round_trip(line in "[^\\x00]{0,24}", slack in 0usize..8) {
            let width = line.len().max(1) + slack;
            let c = codec(width);
            prop_assert!(c.fits(&line));
            let mut out = Vec::new();
            prop_assert_eq!(c.encode_into(&line, 1, &mut out).unwrap(), Encoded::Exact);
            prop_assert_eq!(out.len(), width);
            prop_assert_eq!(c.decode(&out).unwrap(), line);
        }

        #[test]
        fn truncated_lines_are_prefixes(line in "\\PC{0,40}", width in 1usize..16) {
            let c = codec(width);
            let mut out = Vec::new();
            c.encode_into(&line, 1, &mut out).unwrap();
            prop_assert_eq!(out.len(), width);
            let decoded = c.decode(&out).unwrap();
            prop_assert!(line.starts_with(decoded.as_str()));
        }
    }
}
