//! Error types for ferrogrep

use std::path::PathBuf;
use thiserror::Error;

/// Result type for ferrogrep operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for distributed search operations
#[derive(Error, Debug)]
pub enum Error {
    /// MPI has already been initialized
    #[error("MPI has already been initialized")]
    AlreadyInitialized,

    /// Invalid rank specified (outside `0..size`)
    #[error("Invalid rank: {0}")]
    InvalidRank(i32),

    /// Invalid worker-group size
    #[error("Invalid group size: {0}")]
    InvalidGroupSize(i64),

    /// Invalid buffer provided to a collective
    #[error("Invalid buffer: {0}")]
    InvalidBuffer(String),

    /// Invalid count specified (negative, or beyond what a v-collective can address)
    #[error("Invalid count: {0}")]
    InvalidCount(i64),

    /// Record codec configured with an unusable width
    #[error("Invalid record width: {0}")]
    InvalidRecordWidth(usize),

    /// Record codec configured with a non-ASCII pad byte
    #[error("Invalid pad byte 0x{0:02x}: pad must be ASCII")]
    InvalidPad(u8),

    /// Line longer than the record width under the reject policy
    #[error("line {line} is {len} bytes, record width is {width}")]
    RecordOverflow {
        /// 1-based source line
        line: u64,
        /// Byte length of the line
        len: usize,
        /// Configured record width
        width: usize,
    },

    /// Line ending in the pad byte under the reject policy
    #[error("line {line} ends with the pad byte 0x{pad:02x} and would not survive decoding")]
    PadCollision {
        /// 1-based source line
        line: u64,
        /// Configured pad byte
        pad: u8,
    },

    /// A decoded record is not valid UTF-8
    #[error("record is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// Reading the input or writing the output failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File being read or written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The coordinator could not prepare the input and told the group to stop
    #[error("coordinator aborted the search")]
    CoordinatorAborted,

    /// A peer in the local worker group failed, so the group was torn down
    #[error("worker group aborted")]
    Aborted,

    /// Gathered line numbers were not strictly increasing
    #[error("result order violated: line {next} follows line {prev}")]
    OrderViolation {
        /// Previously accepted line
        prev: u64,
        /// Offending line
        next: u64,
    },

    /// MPI error with code and the runtime's message
    #[error("MPI error (code {code}): {message}")]
    Mpi {
        /// Raw MPI return code
        code: i32,
        /// Text from `MPI_Error_string`
        message: String,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Attach a path to an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an error from an MPI error code.
    #[cfg(feature = "mpi")]
    pub fn from_code(code: i32) -> Self {
        let mut buf = [0u8; 512];
        let mut len: i32 = 0;
        let ret = unsafe {
            crate::ffi::ferrogrep_error_string(code, buf.as_mut_ptr().cast(), &mut len)
        };
        let message = if ret == 0 {
            let len = (len.max(0) as usize).min(buf.len());
            String::from_utf8_lossy(&buf[..len]).into_owned()
        } else {
            "unknown MPI error".to_string()
        };
        Error::Mpi { code, message }
    }

    /// `true` if no peer can be left blocked in a collective by this failure.
    ///
    /// Holds for the coordinator's own input, codec and encode failures, which
    /// are announced to the workers before they are returned, and for output
    /// errors, which happen after every collective has completed.
    pub fn leaves_peers_unblocked(&self) -> bool {
        matches!(
            self,
            Error::Io { .. }
                | Error::InvalidRecordWidth(_)
                | Error::InvalidPad(_)
                | Error::RecordOverflow { .. }
                | Error::PadCollision { .. }
                | Error::CoordinatorAborted
        )
    }

    /// Check an MPI return code, returning Ok(()) for success.
    #[cfg(feature = "mpi")]
    pub fn check(code: i32) -> Result<()> {
        if code == 0 {
            Ok(())
        } else {
            Err(Error::from_code(code))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_mentions_path() {
        let err = Error::io(
            "/no/such/file.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/no/such/file.txt"), "{msg}");
        assert!(msg.contains("missing"), "{msg}");
    }

    #[test]
    fn overflow_message_names_line_and_width() {
        let err = Error::RecordOverflow {
            line: 7,
            len: 140,
            width: 100,
        };
        assert_eq!(err.to_string(), "line 7 is 140 bytes, record width is 100");
    }

    #[test]
    fn setup_failures_leave_peers_unblocked() {
        let missing = Error::io("in.txt", std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(missing.leaves_peers_unblocked());
        assert!(Error::InvalidRecordWidth(0).leaves_peers_unblocked());
        assert!(Error::PadCollision { line: 1, pad: b' ' }.leaves_peers_unblocked());
        assert!(Error::CoordinatorAborted.leaves_peers_unblocked());

        assert!(!Error::Aborted.leaves_peers_unblocked());
        assert!(!Error::OrderViolation { prev: 3, next: 2 }.leaves_peers_unblocked());
        assert!(!Error::InvalidBuffer("short".into()).leaves_peers_unblocked());
    }

    #[test]
    fn pad_message_is_hex() {
        assert_eq!(
            Error::InvalidPad(0xc3).to_string(),
            "Invalid pad byte 0xc3: pad must be ASCII"
        );
    }
}
