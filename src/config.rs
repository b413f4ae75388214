//! Run configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::Result;
use crate::record::{OverflowPolicy, RecordCodec, DEFAULT_PAD, DEFAULT_RECORD_WIDTH};
use crate::sink::DEFAULT_OUTPUT;

/// Where the coordinator writes its results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// A file, replaced atomically
    File(PathBuf),
    /// Standard output
    Stdout,
}

impl Default for Output {
    fn default() -> Self {
        Output::File(PathBuf::from(DEFAULT_OUTPUT))
    }
}

impl FromStr for Output {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(if s == "-" {
            Output::Stdout
        } else {
            Output::File(PathBuf::from(s))
        })
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::File(path) => write!(f, "{}", path.display()),
            Output::Stdout => f.write_str("-"),
        }
    }
}

/// Everything one search needs. Only the coordinator's copy of `input`,
/// `record_width`, `pad` and `overflow` is used; the pattern is taken from
/// the coordinator as well and broadcast to the workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrepConfig {
    /// Newline-delimited text file to search
    pub input: PathBuf,
    /// Literal substring to look for
    pub pattern: String,
    /// Result destination
    pub output: Output,
    /// Fixed record width in bytes
    pub record_width: usize,
    /// Record pad byte
    pub pad: u8,
    /// Handling of lines that do not fit a record
    pub overflow: OverflowPolicy,
}

impl GrepConfig {
    /// Search `input` for `pattern` with default settings.
    pub fn new(input: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        GrepConfig {
            input: input.into(),
            pattern: pattern.into(),
            output: Output::default(),
            record_width: DEFAULT_RECORD_WIDTH,
            pad: DEFAULT_PAD,
            overflow: OverflowPolicy::default(),
        }
    }

    /// Set the output destination.
    pub fn with_output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }

    /// Set the record width.
    pub fn with_record_width(mut self, width: usize) -> Self {
        self.record_width = width;
        self
    }

    /// Set the pad byte.
    pub fn with_pad(mut self, pad: u8) -> Self {
        self.pad = pad;
        self
    }

    /// Set the overflow policy.
    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    /// Codec described by this configuration.
    pub fn codec(&self) -> Result<RecordCodec> {
        Ok(RecordCodec::new(self.record_width, self.pad)?.with_overflow(self.overflow))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn defaults_match_legacy_tool_layout() {
        let cfg = GrepConfig::new("in.txt", "needle");
        assert_eq!(cfg.output, Output::File(PathBuf::from("program_result.txt")));
        assert_eq!(cfg.record_width, 100);
        let codec = cfg.codec().unwrap();
        assert_eq!(codec.width(), 100);
        assert_eq!(codec.overflow(), OverflowPolicy::Truncate);
    }

    #[test]
    fn dash_means_stdout() {
        assert_eq!("-".parse::<Output>().unwrap(), Output::Stdout);
        assert_eq!(
            "res.txt".parse::<Output>().unwrap(),
            Output::File(PathBuf::from("res.txt"))
        );
    }

    #[test]
    fn invalid_codec_settings_surface() {
        let cfg = GrepConfig::new("in.txt", "x").with_record_width(0);
        assert!(matches!(cfg.codec(), Err(Error::InvalidRecordWidth(0))));
    }
}
