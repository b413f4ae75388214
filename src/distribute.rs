//! Loading the source on the coordinator and distributing equal chunks.
//!
//! The coordinator encodes every line (plus the padding lines that make the
//! count divisible by the group size) into fixed-width records, then:
//!
//! 1. broadcasts a header `[status, source_lines, chunk_size, record_width,
//!    pad, pattern_len]`,
//! 2. broadcasts the pattern bytes (skipped when the pattern is empty),
//! 3. scatters `chunk_size` records to each rank, itself included (skipped
//!    when the chunk size is zero).
//!
//! Workers adopt the coordinator's record width and pad byte from the header,
//! so the codec only has to be configured where the file is read. If the
//! coordinator cannot prepare its input it broadcasts an abort header instead
//! and every worker returns [`Error::CoordinatorAborted`].

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::iter;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::collective::{Collective, GroupContext};
use crate::error::{Error, Result};
use crate::partition::Partition;
use crate::record::RecordCodec;

const STATUS: usize = 0;
const SOURCE_LINES: usize = 1;
const CHUNK_SIZE: usize = 2;
const RECORD_WIDTH: usize = 3;
const PAD: usize = 4;
const PATTERN_LEN: usize = 5;
const HEADER_LEN: usize = 6;

const STATUS_READY: u64 = 0;
const STATUS_ABORT: u64 = 1;

const ROOT: i32 = GroupContext::COORDINATOR;

/// The coordinator's input, one entry per line, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceText {
    lines: Vec<String>,
}

impl SourceText {
    /// Read a newline-delimited text file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        Self::from_reader(BufReader::new(file)).map_err(|e| Error::io(path, e))
    }

    /// Split a reader into lines. `\n` and a preceding `\r` are removed;
    /// bytes that are not UTF-8 are replaced with U+FFFD.
    pub fn from_reader<R: BufRead>(mut reader: R) -> io::Result<Self> {
        let mut lines = Vec::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            if buf.last() == Some(&b'\n') {
                buf.pop();
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
            }
            lines.push(String::from_utf8_lossy(&buf).into_owned());
        }
        Ok(SourceText { lines })
    }

    /// Build a source from lines already in memory.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SourceText {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Lines in file order.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// `true` for an empty file.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// One rank's share of the search: its decoded chunk and everything needed to
/// search it and report matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    rank: u64,
    partition: Partition,
    codec: RecordCodec,
    pattern: String,
    lines: Vec<String>,
}

impl Assignment {
    /// Rank this chunk belongs to.
    pub fn rank(&self) -> u64 {
        self.rank
    }

    /// Partition shared by the whole group.
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Codec the coordinator encoded the records with.
    pub fn codec(&self) -> &RecordCodec {
        &self.codec
    }

    /// The search pattern, as announced by the coordinator.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Decoded lines of the chunk, padding included.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Decoded lines of the chunk that come from the source file.
    pub fn source_lines(&self) -> &[String] {
        let n = self.partition.source_lines_in(self.rank) as usize;
        &self.lines[..n.min(self.lines.len())]
    }

    /// 1-based file line number of `local_index`.
    pub fn global_line(&self, local_index: usize) -> u64 {
        self.partition.global_line(self.rank, local_index as u64)
    }
}

/// Drives the broadcast-then-scatter distribution step.
pub struct Distributor<'c, C> {
    comm: &'c C,
    ctx: GroupContext,
}

impl<'c, C: Collective> Distributor<'c, C> {
    /// Distributor for the calling rank.
    pub fn new(comm: &'c C, ctx: GroupContext) -> Self {
        Distributor { comm, ctx }
    }

    /// Coordinator side: encode `source`, announce the partition and pattern,
    /// and scatter the chunks. Returns the coordinator's own chunk.
    ///
    /// An encode failure (reject policy) is announced as an abort before it is
    /// returned, so the workers do not wait for data that never comes.
    pub fn send(
        &self,
        source: &SourceText,
        codec: &RecordCodec,
        pattern: &str,
    ) -> Result<Assignment> {
        if !self.ctx.is_coordinator() {
            return Err(Error::Internal(format!(
                "rank {} cannot distribute the source",
                self.ctx.rank()
            )));
        }

        let partition = Partition::new(source.len() as u64, self.ctx.size() as u64)?;
        let padding = iter::repeat("").take(partition.padding() as usize);
        let lines = source.lines().iter().map(String::as_str).chain(padding);
        let records = match codec.encode_batch(lines, 1) {
            Ok(records) => records,
            Err(e) => return Err(self.abort(e)),
        };
        if records.lossy > 0 {
            warn!(
                lines = records.lossy,
                width = codec.width(),
                "lines do not fit the record width and will not match as written"
            );
        }
        info!(
            source_lines = partition.source_lines(),
            padding = partition.padding(),
            chunk_size = partition.chunk_size(),
            workers = partition.workers(),
            "distributing input"
        );

        let mut header = [0u64; HEADER_LEN];
        header[STATUS] = STATUS_READY;
        header[SOURCE_LINES] = partition.source_lines();
        header[CHUNK_SIZE] = partition.chunk_size();
        header[RECORD_WIDTH] = codec.width() as u64;
        header[PAD] = u64::from(codec.pad());
        header[PATTERN_LEN] = pattern.len() as u64;
        self.comm.broadcast(&mut header, ROOT)?;

        if !pattern.is_empty() {
            let mut bytes = pattern.as_bytes().to_vec();
            self.comm.broadcast(&mut bytes, ROOT)?;
        }

        let lines = self.scatter_chunk(&records.bytes, &partition, codec)?;
        Ok(Assignment {
            rank: self.ctx.rank() as u64,
            partition,
            codec: *codec,
            pattern: pattern.to_owned(),
            lines,
        })
    }

    /// Worker side: receive the header, pattern and this rank's chunk.
    pub fn receive(&self) -> Result<Assignment> {
        let mut header = [0u64; HEADER_LEN];
        self.comm.broadcast(&mut header, ROOT)?;
        if header[STATUS] != STATUS_READY {
            return Err(Error::CoordinatorAborted);
        }

        let partition = Partition::from_parts(
            header[SOURCE_LINES],
            header[CHUNK_SIZE],
            self.ctx.size() as u64,
        )?;
        let width = usize::try_from(header[RECORD_WIDTH])
            .map_err(|_| Error::InvalidRecordWidth(usize::MAX))?;
        let pad = u8::try_from(header[PAD]).map_err(|_| Error::InvalidPad(u8::MAX))?;
        let codec = RecordCodec::new(width, pad)?;

        let pattern_len = usize::try_from(header[PATTERN_LEN])
            .map_err(|_| Error::InvalidCount(header[PATTERN_LEN] as i64))?;
        let mut bytes = vec![0u8; pattern_len];
        if pattern_len > 0 {
            self.comm.broadcast(&mut bytes, ROOT)?;
        }
        let pattern = String::from_utf8(bytes).map_err(|e| e.utf8_error())?;

        let lines = self.scatter_chunk(&[], &partition, &codec)?;
        debug!(
            rank = self.ctx.rank(),
            lines = lines.len(),
            "received chunk"
        );
        Ok(Assignment {
            rank: self.ctx.rank() as u64,
            partition,
            codec,
            pattern,
            lines,
        })
    }

    /// Coordinator side: tell the workers to give up, then hand `err` back.
    pub fn abort(&self, err: Error) -> Error {
        let mut header = [0u64; HEADER_LEN];
        header[STATUS] = STATUS_ABORT;
        if let Err(e) = self.comm.broadcast(&mut header, ROOT) {
            warn!(error = %e, "failed to announce abort to workers");
        }
        err
    }

    fn scatter_chunk(
        &self,
        send: &[u8],
        partition: &Partition,
        codec: &RecordCodec,
    ) -> Result<Vec<String>> {
        let chunk_bytes = usize::try_from(partition.chunk_size())
            .ok()
            .and_then(|n| n.checked_mul(codec.width()))
            .ok_or(Error::InvalidCount(partition.chunk_size() as i64))?;
        if chunk_bytes == 0 {
            return Ok(Vec::new());
        }
        let mut recv = vec![0u8; chunk_bytes];
        self.comm.scatter(send, &mut recv, ROOT)?;
        codec.decode_batch(&recv)
    }
}
