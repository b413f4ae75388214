//! The search pipeline: distribute, scan, aggregate.

use std::time::Instant;

use tracing::{debug, info, info_span};

use crate::aggregate::{aggregate, ResultSet};
use crate::collective::Collective;
use crate::config::GrepConfig;
use crate::distribute::{Distributor, SourceText};
use crate::error::Result;
use crate::record::RecordCodec;
use crate::search;
use crate::sink::Sink;

/// Run one distributed search.
///
/// Collective: every rank of `comm` must call it with its own `config`; only
/// the coordinator's input, pattern and codec settings are used. Returns the
/// ordered results on the coordinator and `None` on the other ranks.
///
/// If the coordinator cannot read its input or configure its codec the whole
/// group fails: the coordinator returns that error and every other rank
/// returns [`Error::CoordinatorAborted`](crate::Error::CoordinatorAborted).
pub fn run<C: Collective>(comm: &C, config: &GrepConfig) -> Result<Option<ResultSet>> {
    let ctx = comm.context()?;
    let _span = info_span!("grep", rank = ctx.rank()).entered();
    let started = Instant::now();
    let distributor = Distributor::new(comm, ctx);

    let assignment = if ctx.is_coordinator() {
        match prepare(config) {
            Ok((source, codec)) => distributor.send(&source, &codec, &config.pattern)?,
            Err(e) => return Err(distributor.abort(e)),
        }
    } else {
        distributor.receive()?
    };
    let distributed = started.elapsed();

    let local = search::scan(&assignment);
    debug!(
        lines = assignment.lines().len(),
        matches = local.len(),
        "scanned chunk"
    );

    let results = aggregate(comm, ctx, &assignment, &local)?;
    if let Some(results) = &results {
        info!(
            matches = results.len(),
            per_rank = ?results.per_rank(),
            distribute_ms = distributed.as_millis() as u64,
            total_ms = started.elapsed().as_millis() as u64,
            "search complete"
        );
    }
    Ok(results)
}

/// [`run`], then hand the results to `sink` on the coordinator.
///
/// Returns the number of matches written on the coordinator and `None` on the
/// other ranks.
pub fn run_to_sink<C, S>(comm: &C, config: &GrepConfig, sink: &mut S) -> Result<Option<usize>>
where
    C: Collective,
    S: Sink + ?Sized,
{
    match run(comm, config)? {
        Some(results) => {
            sink.write_results(&results)?;
            Ok(Some(results.len()))
        }
        None => Ok(None),
    }
}

fn prepare(config: &GrepConfig) -> Result<(SourceText, RecordCodec)> {
    let codec = config.codec()?;
    let source = SourceText::load(&config.input)?;
    info!(
        path = %config.input.display(),
        lines = source.len(),
        "loaded input"
    );
    Ok((source, codec))
}
