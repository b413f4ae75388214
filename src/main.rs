use std::io;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ferrogrep::record::{DEFAULT_PAD, DEFAULT_RECORD_WIDTH, LEGACY_PAD};
use ferrogrep::{
    grep, Error, FileSink, GrepConfig, LocalGroup, OverflowPolicy, Output, ResultSet, Sink,
    WriterSink,
};

#[derive(Parser, Debug)]
#[command(
    name = "ferrogrep",
    version,
    about = "Distributed literal substring search over the lines of a text file"
)]
struct Args {
    /// Literal substring to search for
    pattern: String,
    /// Newline-delimited text file to search
    file: PathBuf,
    /// Where to write `line:text` results ("-" for stdout)
    #[arg(short, long, default_value = ferrogrep::DEFAULT_OUTPUT)]
    output: Output,
    /// Run on N in-process ranks instead of the MPI job
    #[arg(short, long, env = "FERROGREP_WORKERS")]
    workers: Option<NonZeroUsize>,
    /// Fixed record width in bytes
    #[arg(long, env = "FERROGREP_RECORD_WIDTH", default_value_t = DEFAULT_RECORD_WIDTH)]
    record_width: usize,
    /// Pad records with spaces like the original tool (drops trailing spaces)
    #[arg(long)]
    legacy_pad: bool,
    /// What to do with lines longer than the record width: truncate or reject
    #[arg(long, env = "FERROGREP_OVERFLOW", default_value_t = OverflowPolicy::Truncate)]
    overflow: OverflowPolicy,
}

impl Args {
    fn config(&self) -> GrepConfig {
        GrepConfig::new(&self.file, &self.pattern)
            .with_output(self.output.clone())
            .with_record_width(self.record_width)
            .with_pad(if self.legacy_pad { LEGACY_PAD } else { DEFAULT_PAD })
            .with_overflow(self.overflow)
    }
}

fn main() -> Result<()> {
    // Logs go to stderr so `-o -` keeps stdout for results. Honors RUST_LOG.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    launch(&args, &args.config())
}

/// Without `--workers`, join the surrounding MPI job.
#[cfg(feature = "mpi")]
fn launch(args: &Args, config: &GrepConfig) -> Result<()> {
    match args.workers {
        Some(n) => run_local(config, n.get()),
        None => run_mpi(config),
    }
}

/// Without `--workers`, use one rank per available core.
#[cfg(not(feature = "mpi"))]
fn launch(args: &Args, config: &GrepConfig) -> Result<()> {
    let workers = args.workers.map_or_else(
        || std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
        NonZeroUsize::get,
    );
    run_local(config, workers)
}

fn run_local(config: &GrepConfig, workers: usize) -> Result<()> {
    let group = LocalGroup::new(workers)?;
    info!(workers, "starting in-process group");

    let outcomes = group.run(|comm| grep::run(&comm, config));
    let results = first_failure(outcomes)?;
    let Some(results) = results else {
        bail!("coordinator produced no results");
    };

    let written = emit(&config.output, &results)?;
    info!(matches = written, output = %config.output, "done");
    Ok(())
}

/// Result of the coordinator, or the most relevant error of the group.
fn first_failure(
    outcomes: Vec<ferrogrep::Result<Option<ResultSet>>>,
) -> Result<Option<ResultSet>> {
    let mut outcomes = outcomes.into_iter();
    let coordinator = outcomes.next().context("empty group")?;

    // A worker failure makes the coordinator fail with `Aborted`; report the cause.
    let root_cause = outcomes
        .filter_map(|o| o.err())
        .find(|e| !matches!(e, Error::Aborted | Error::CoordinatorAborted));
    match (coordinator, root_cause) {
        (Ok(results), None) => Ok(results),
        (Err(Error::Aborted), Some(cause)) => Err(cause).context("worker failed"),
        (Err(e), _) => Err(e).context("search failed"),
        (Ok(_), Some(cause)) => Err(cause).context("worker failed"),
    }
}

fn emit(output: &Output, results: &ResultSet) -> Result<usize> {
    match output {
        Output::File(path) => FileSink::new(path)
            .write_results(results)
            .with_context(|| format!("writing {}", path.display()))?,
        Output::Stdout => WriterSink::new(io::stdout().lock()).write_results(results)?,
    }
    Ok(results.len())
}

#[cfg(feature = "mpi")]
fn run_mpi(config: &GrepConfig) -> Result<()> {
    use ferrogrep::{Collective, Mpi};
    use tracing::{debug, error};

    let mpi = Mpi::init().context("initializing MPI")?;
    let world = mpi.world();
    if world.rank() == 0 {
        match mpi.version() {
            Ok(version) => info!(size = world.size(), %version, "joined MPI job"),
            Err(e) => info!(size = world.size(), error = %e, "joined MPI job"),
        }
    }

    let mut sink: Box<dyn Sink> = match &config.output {
        Output::File(path) => Box::new(FileSink::new(path)),
        Output::Stdout => Box::new(WriterSink::new(io::stdout())),
    };
    let started = mpi.wtime();
    let outcome = grep::run_to_sink(&world, config, sink.as_mut());
    debug!(rank = world.rank(), seconds = mpi.wtime() - started, "rank finished");

    match outcome {
        Ok(Some(written)) => {
            info!(matches = written, output = %config.output, "done");
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(e) if e.leaves_peers_unblocked() => Err(e).context("search failed"),
        Err(e) => {
            error!(error = %e, "search failed, aborting job");
            world.abort(1)
        }
    }
}
