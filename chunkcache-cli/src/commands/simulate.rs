//! Simulate command - drive a synthetic workload through a compute gateway.
//!
//! Requests pick chunks with a configurable popularity skew, so a small set of
//! hot chunks competes with a long tail for the cache budget. Each miss
//! "computes" a chunk by sleeping and allocating a payload. At the end the
//! gateway and store statistics show how often requests hit, coalesced onto
//! running computations, or forced evictions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chunkcache::cache::{CacheKey, ChunkCoords, Store};
use chunkcache::config::{format_size, parse_size, ConfigFile};
use chunkcache::gateway::{ComputeError, ComputeGateway};
use chunkcache::logging::init_logging;
use clap::Args;
use console::style;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::error::CliError;

/// Dataset id used for all synthetic keys.
const SIM_DATASET: &str = "simulated";

/// Arguments for `chunkcache simulate`.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Total number of requests to issue
    #[arg(long, default_value_t = 2000)]
    pub requests: u64,

    /// Number of distinct chunks requested
    #[arg(long, default_value_t = 200)]
    pub keys: u64,

    /// Maximum requests in flight at once
    #[arg(long, default_value_t = 32)]
    pub concurrency: usize,

    /// Size of each computed chunk (e.g. 64KB, 1MB)
    #[arg(long, default_value = "64KB")]
    pub chunk_size: String,

    /// Cache capacity, overriding config.ini (e.g. 8MB)
    #[arg(long)]
    pub capacity: Option<String>,

    /// Simulated compute time per chunk in milliseconds
    #[arg(long, default_value_t = 5)]
    pub compute_ms: u64,

    /// Fraction of computations that fail (0.0 to 1.0)
    #[arg(long, default_value_t = 0.0)]
    pub failure_rate: f64,

    /// Popularity skew: 0 is uniform, larger values concentrate on fewer chunks
    #[arg(long, default_value_t = 1.0)]
    pub skew: f64,

    /// Random seed for a reproducible workload
    #[arg(long)]
    pub seed: Option<u64>,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// One synthetic request.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SimRequest {
    key_index: u64,
    fail: bool,
}

/// Outcomes observed by callers.
#[derive(Debug, Default)]
struct Tally {
    succeeded: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    bytes_served: AtomicU64,
}

impl Tally {
    fn record(&self, result: &Result<Bytes, ComputeError>) {
        match result {
            Ok(value) => {
                self.succeeded.fetch_add(1, Ordering::Relaxed);
                self.bytes_served
                    .fetch_add(value.len() as u64, Ordering::Relaxed);
            }
            Err(ComputeError::Cancelled) => {
                self.cancelled.fetch_add(1, Ordering::Relaxed);
            }
            Err(ComputeError::Failed(_)) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Run the simulate command.
pub fn run(args: SimulateArgs) -> Result<(), CliError> {
    validate(&args)?;

    let config = ConfigFile::load()?;
    let _logging_guard = init_logging(&config.logging.directory, &config.logging.file)
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;

    let capacity = match &args.capacity {
        Some(s) => parse_size(s)?,
        None => config.cache.capacity,
    };
    let chunk_size = parse_size(&args.chunk_size)?;
    let chunk_len = usize::try_from(chunk_size)
        .map_err(|_| CliError::InvalidArgument(format!("--chunk-size {} is too large", args.chunk_size)))?;

    let store = Arc::new(Store::with_cost_model(capacity, config.cost.to_cost_model())?);
    let gateway = ComputeGateway::new(Arc::clone(&store));

    let seed = args.seed.unwrap_or_else(|| rand::rng().random());
    let workload = build_workload(&args, &mut StdRng::seed_from_u64(seed));

    info!(
        requests = args.requests,
        keys = args.keys,
        concurrency = args.concurrency,
        chunk_size,
        capacity,
        seed,
        "Starting simulation"
    );

    print_header(&args, capacity, chunk_size, seed);

    let progress = progress_bar(args.requests, args.no_progress);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let started = Instant::now();
    let tally = runtime.block_on(drive(
        &gateway,
        workload,
        args.concurrency,
        Duration::from_millis(args.compute_ms),
        chunk_len,
        &progress,
    ));
    let elapsed = started.elapsed();
    progress.finish_and_clear();

    gateway.log_stats();
    print_summary(&gateway, &tally, elapsed);

    Ok(())
}

fn validate(args: &SimulateArgs) -> Result<(), CliError> {
    if args.keys == 0 {
        return Err(CliError::InvalidArgument(
            "--keys must be at least 1".to_string(),
        ));
    }
    if args.concurrency == 0 {
        return Err(CliError::InvalidArgument(
            "--concurrency must be at least 1".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&args.failure_rate) {
        return Err(CliError::InvalidArgument(format!(
            "--failure-rate must be between 0.0 and 1.0, got {}",
            args.failure_rate
        )));
    }
    if !args.skew.is_finite() || args.skew < 0.0 {
        return Err(CliError::InvalidArgument(format!(
            "--skew must be a non-negative number, got {}",
            args.skew
        )));
    }
    Ok(())
}

/// Map a uniform sample in `[0, 1)` to a key index, favoring low indices
/// as `skew` grows.
fn skewed_index(sample: f64, keys: u64, skew: f64) -> u64 {
    let index = (sample.powf(1.0 + skew) * keys as f64) as u64;
    index.min(keys - 1)
}

fn build_workload(args: &SimulateArgs, rng: &mut impl Rng) -> Vec<SimRequest> {
    (0..args.requests)
        .map(|_| SimRequest {
            key_index: skewed_index(rng.random::<f64>(), args.keys, args.skew),
            fail: rng.random_bool(args.failure_rate),
        })
        .collect()
}

fn sim_key(index: u64) -> CacheKey {
    CacheKey::chunk(SIM_DATASET, "var", ChunkCoords::new(vec![index]))
}

async fn drive(
    gateway: &ComputeGateway<Bytes>,
    workload: Vec<SimRequest>,
    concurrency: usize,
    compute_time: Duration,
    chunk_len: usize,
    progress: &ProgressBar,
) -> Tally {
    let tally = Tally::default();

    stream::iter(workload)
        .for_each_concurrent(concurrency, |request| {
            let tally = &tally;
            async move {
                let result = gateway
                    .fetch(sim_key(request.key_index), move || async move {
                        tokio::time::sleep(compute_time).await;
                        if request.fail {
                            Err(std::io::Error::other("simulated compute failure"))
                        } else {
                            Ok(Bytes::from(vec![(request.key_index % 251) as u8; chunk_len]))
                        }
                    })
                    .await;
                tally.record(&result);
                progress.inc(1);
            }
        })
        .await;

    tally
}

fn progress_bar(total: u64, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(total);
    if let Ok(bar_style) = ProgressStyle::default_bar()
        .template("  {spinner:.cyan} {bar:30.cyan/dim} {pos}/{len} requests  {elapsed:.dim}")
    {
        bar.set_style(bar_style.progress_chars("━╸─"));
    }
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

fn print_header(args: &SimulateArgs, capacity: u64, chunk_size: u64, seed: u64) {
    println!("{}", style("chunkcache simulation").cyan().bold());
    println!(
        "  {} requests over {} chunks of {} (skew {}, concurrency {})",
        args.requests,
        args.keys,
        format_size(chunk_size),
        args.skew,
        args.concurrency
    );
    println!(
        "  cache capacity {}, working set {}",
        format_size(capacity),
        format_size(chunk_size.saturating_mul(args.keys))
    );
    println!("  seed {}", style(seed).dim());
    println!();
}

fn print_summary(gateway: &ComputeGateway<Bytes>, tally: &Tally, elapsed: Duration) {
    let stats = gateway.stats();
    let store = gateway.store().stats();

    println!(
        "{} in {:.2}s",
        style("Simulation complete").green().bold(),
        elapsed.as_secs_f64()
    );
    println!();
    println!("{}", style("Requests").bold());
    println!("  succeeded    {}", tally.succeeded.load(Ordering::Relaxed));
    println!("  failed       {}", tally.failed.load(Ordering::Relaxed));
    println!("  cancelled    {}", tally.cancelled.load(Ordering::Relaxed));
    println!(
        "  served       {}",
        format_size(tally.bytes_served.load(Ordering::Relaxed))
    );
    println!();
    println!("{}", style("Gateway").bold());
    println!(
        "  hits         {} ({:.1}%)",
        stats.hits,
        stats.hit_ratio() * 100.0
    );
    println!(
        "  coalesced    {} ({:.1}%)",
        stats.coalesced,
        stats.coalescing_ratio() * 100.0
    );
    println!("  computed     {}", stats.computed);
    println!("  failed       {}", stats.failed);
    println!("  too large    {}", stats.uncached_too_large);
    println!();
    println!("{}", style("Store").bold());
    println!(
        "  entries      {} using {} of {} ({:.1}%)",
        store.entry_count,
        format_size(store.size_bytes),
        format_size(store.capacity_bytes),
        store.utilization() * 100.0
    );
    println!(
        "  evictions    {} ({} freed)",
        store.evictions,
        format_size(store.evicted_bytes)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> SimulateArgs {
        SimulateArgs {
            requests: 500,
            keys: 50,
            concurrency: 8,
            chunk_size: "1KB".to_string(),
            capacity: None,
            compute_ms: 1,
            failure_rate: 0.0,
            skew: 1.0,
            seed: Some(7),
            no_progress: true,
        }
    }

    #[test]
    fn test_skewed_index_bounds() {
        assert_eq!(skewed_index(0.0, 10, 2.0), 0);
        assert_eq!(skewed_index(0.999_999, 10, 0.0), 9);
        assert_eq!(skewed_index(1.0, 10, 0.0), 9);
    }

    #[test]
    fn test_skew_concentrates_requests() {
        let uniform = skewed_index(0.5, 100, 0.0);
        let skewed = skewed_index(0.5, 100, 3.0);
        assert_eq!(uniform, 50);
        assert!(skewed < uniform);
    }

    #[test]
    fn test_workload_is_reproducible() {
        let a = build_workload(&args(), &mut StdRng::seed_from_u64(42));
        let b = build_workload(&args(), &mut StdRng::seed_from_u64(42));

        assert_eq!(a.len(), 500);
        assert_eq!(a, b);
        assert!(a.iter().all(|r| r.key_index < 50 && !r.fail));
    }

    #[test]
    fn test_validate_rejects_bad_arguments() {
        assert!(validate(&args()).is_ok());
        assert!(validate(&SimulateArgs { keys: 0, ..args() }).is_err());
        assert!(validate(&SimulateArgs { concurrency: 0, ..args() }).is_err());
        assert!(validate(&SimulateArgs { failure_rate: 1.5, ..args() }).is_err());
        assert!(validate(&SimulateArgs { skew: -1.0, ..args() }).is_err());
    }

    #[tokio::test]
    async fn test_drive_counts_every_request() {
        let gateway = ComputeGateway::with_capacity(16 * 1024).unwrap();
        let workload = build_workload(&args(), &mut StdRng::seed_from_u64(1));

        let tally = drive(
            &gateway,
            workload,
            8,
            Duration::from_millis(1),
            1024,
            &ProgressBar::hidden(),
        )
        .await;

        assert_eq!(tally.succeeded.load(Ordering::Relaxed), 500);
        assert_eq!(gateway.stats().requests, 500);
        assert!(gateway.store().size_bytes() <= 16 * 1024);
        assert!(gateway.stats().computed <= 500);
    }

    #[tokio::test]
    async fn test_drive_reports_failures() {
        let gateway = ComputeGateway::with_capacity(16 * 1024).unwrap();
        let workload = vec![SimRequest { key_index: 0, fail: true }; 3];

        let tally = drive(
            &gateway,
            workload,
            1,
            Duration::from_millis(1),
            1024,
            &ProgressBar::hidden(),
        )
        .await;

        assert_eq!(tally.failed.load(Ordering::Relaxed), 3);
        assert_eq!(gateway.stats().failed, 3);
        assert!(gateway.store().is_empty());
    }
}
