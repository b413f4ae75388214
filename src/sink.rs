//! Writing the coordinator's results.
//!
//! One line per match, `<line>:<text>\n`, in ascending line order.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::aggregate::ResultSet;
use crate::error::{Error, Result};

/// Output file name used by the original tool.
pub const DEFAULT_OUTPUT: &str = "program_result.txt";

/// Destination for a finished [`ResultSet`].
pub trait Sink {
    /// Write every match. Called once, on the coordinator only.
    fn write_results(&mut self, results: &ResultSet) -> Result<()>;
}

/// Format `results` onto `out`.
pub fn write_results<W: Write>(mut out: W, results: &ResultSet) -> io::Result<()> {
    for m in results {
        writeln!(out, "{m}")?;
    }
    out.flush()
}

/// Writes results to a file, all or nothing.
///
/// The output is staged in a hidden sibling file and renamed over the target
/// once complete, so a failed run never leaves a partial result file behind.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    /// Sink writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSink { path: path.into() }
    }

    /// Target path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map_or_else(|| "ferrogrep-output".into(), |n| n.to_string_lossy().into_owned());
        let parent = self.path.parent().unwrap_or_else(|| Path::new(""));
        parent.join(format!(".{name}.partial"))
    }

    fn stage(&self, staging: &Path, results: &ResultSet) -> io::Result<()> {
        let file = File::create(staging)?;
        let mut out = BufWriter::new(file);
        write_results(&mut out, results)?;
        out.into_inner().map_err(io::IntoInnerError::into_error)?.sync_all()
    }
}

impl Sink for FileSink {
    fn write_results(&mut self, results: &ResultSet) -> Result<()> {
        let staging = self.staging_path();
        let written = self
            .stage(&staging, results)
            .and_then(|()| fs::rename(&staging, &self.path));
        if let Err(e) = written {
            let _ = fs::remove_file(&staging);
            return Err(Error::io(&self.path, e));
        }
        Ok(())
    }
}

/// Writes results to any [`Write`] implementation, e.g. stdout.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: W,
}

impl<W: Write> WriterSink<W> {
    /// Sink wrapping `writer`.
    pub fn new(writer: W) -> Self {
        WriterSink { writer }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Sink for WriterSink<W> {
    fn write_results(&mut self, results: &ResultSet) -> Result<()> {
        write_results(&mut self.writer, results).map_err(|e| Error::io("<writer>", e))
    }
}
