//! # ferrogrep
//!
//! Distributed literal substring search over a line-oriented text file.
//!
//! A coordinator rank loads the file, pads it to a whole number of lines per
//! worker and scatters fixed-width records. Every rank scans its chunk, and
//! the matches are collected back on the coordinator in two phases (counts,
//! then variable-length payloads) into an ordered [`ResultSet`].
//!
//! The pipeline is written against the [`Collective`] trait and runs on:
//! - [`LocalGroup`]: an in-process thread group, always available
//! - `Communicator`: an MPI communicator, with the `mpi` feature
//!
//! ## Quick Start
//!
//! ```no_run
//! use ferrogrep::{grep, GrepConfig, LocalGroup};
//!
//! fn main() -> Result<(), ferrogrep::Error> {
//!     let config = GrepConfig::new("corpus.txt", "needle");
//!     let group = LocalGroup::new(4)?;
//!
//!     let mut outcomes = group.run(|comm| grep::run(&comm, &config));
//!     if let Some(results) = outcomes.remove(0)? {
//!         for m in &results {
//!             println!("{m}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description | Dependencies |
//! |---------|-------------|--------------|
//! | `mpi`   | MPI backend through the C layer in `csrc/` | system MPI |

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

mod aggregate;
mod collective;
mod config;
mod datatype;
mod distribute;
mod error;
mod exchange;
pub mod grep;
mod local;
mod partition;
pub mod record;
pub mod search;
mod sink;

#[cfg(feature = "mpi")]
mod comm;
#[cfg(feature = "mpi")]
mod ffi;
#[cfg(feature = "mpi")]
mod mpi;

pub use aggregate::{aggregate, Match, ResultSet};
pub use collective::{Collective, GroupContext};
pub use config::{GrepConfig, Output};
pub use datatype::{DatatypeTag, MpiDatatype};
pub use distribute::{Assignment, Distributor, SourceText};
pub use error::{Error, Result};
pub use exchange::{exchange_with_layout, negotiate_sizes, Layout};
pub use local::{LocalComm, LocalGroup};
pub use partition::{padded_len, Partition};
pub use record::{OverflowPolicy, RecordCodec};
pub use search::scan;
pub use sink::{write_results, FileSink, Sink, WriterSink, DEFAULT_OUTPUT};

#[cfg(feature = "mpi")]
pub use comm::Communicator;
#[cfg(feature = "mpi")]
pub use mpi::Mpi;
