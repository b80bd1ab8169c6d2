//! chaintable Stress Binary
//!
//! Drives a shared table from many worker threads and verifies the
//! guard's guarantees: no lost increments, no torn reads, atomic clear.

use clap::Parser;
use chaintable::{ConcurrentTable, Result, TableConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::{fmt, EnvFilter};

/// chaintable Stress Driver
#[derive(Parser, Debug)]
#[command(name = "chaintable-stress")]
#[command(about = "Concurrent workload driver for the chained hash table")]
#[command(version)]
struct Args {
    /// Number of worker threads
    #[arg(short, long, default_value = "5")]
    workers: usize,

    /// Increments per worker in the counter phase
    #[arg(short, long, default_value = "100")]
    increments: u64,

    /// Bucket count of the shared table
    #[arg(short, long, default_value = "100")]
    buckets: usize,

    /// Random add/read/delete operations per worker in the mixed phase
    #[arg(short, long, default_value = "50")]
    mixed_ops: usize,

    /// Also run the counter phase as separate get/set calls and report lost updates
    #[arg(long)]
    racy: bool,
}

/// Highest key touched by the mixed phase
const MIXED_KEY_SPACE: u64 = 30;

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,chaintable=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("chaintable-stress v{}", chaintable::VERSION);
    tracing::info!(
        "Workers: {}, buckets: {}, increments: {}, mixed ops: {}",
        args.workers,
        args.buckets,
        args.increments,
        args.mixed_ops
    );

    let config = TableConfig::builder().bucket_count(args.buckets).build();
    let table: ConcurrentTable<String, u64> = match ConcurrentTable::from_config(&config) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!("Failed to create table: {}", e);
            std::process::exit(1);
        }
    };

    let phases: [(&str, fn(&ConcurrentTable<String, u64>, &Args) -> Result<bool>); 3] = [
        ("counter", run_counter_phase),
        ("mixed", run_mixed_phase),
        ("clear", run_clear_phase),
    ];

    let mut failed = false;
    for (name, phase) in phases {
        match phase(&table, &args) {
            Ok(true) => tracing::info!("Phase '{}' passed", name),
            Ok(false) => {
                tracing::error!("Phase '{}' failed verification", name);
                failed = true;
            }
            Err(e) => {
                tracing::error!("Phase '{}' aborted: {}", name, e);
                failed = true;
            }
        }
    }

    if args.racy {
        if let Err(e) = run_racy_counter(&table, &args) {
            tracing::error!("Racy counter run aborted: {}", e);
            failed = true;
        }
    }

    match table.stats() {
        Ok(stats) => tracing::info!("Final table: {}", stats),
        Err(e) => tracing::error!("Could not read final stats: {}", e),
    }

    if failed {
        std::process::exit(1);
    }
}

// =============================================================================
// Phases
// =============================================================================

/// Every worker bumps its own counter and one shared counter via `upsert`
fn run_counter_phase(table: &ConcurrentTable<String, u64>, args: &Args) -> Result<bool> {
    table.clear()?;

    run_workers(args.workers, |id| {
        let own = format!("counter_{}", id);
        for _ in 0..args.increments {
            table.upsert(own.clone(), || 0, |n| *n += 1)?;
            table.upsert("counter_shared".to_string(), || 0, |n| *n += 1)?;
        }
        Ok(())
    })?;

    let mut ok = true;
    for id in 0..args.workers {
        let value = table.get(format!("counter_{}", id).as_str())?;
        if value != args.increments {
            tracing::error!("counter_{} = {}, expected {}", id, value, args.increments);
            ok = false;
        }
    }

    let expected = args.workers as u64 * args.increments;
    let shared = table.get("counter_shared")?;
    if shared != expected {
        tracing::error!("counter_shared = {}, expected {}", shared, expected);
        ok = false;
    }

    Ok(ok)
}

/// Random add/read/delete on a small key space; misses are expected
fn run_mixed_phase(table: &ConcurrentTable<String, u64>, args: &Args) -> Result<bool> {
    table.clear()?;
    for i in 0..20 {
        table.set(mixed_key(i), i)?;
    }

    run_workers(args.workers, |id| {
        let mut rng = StdRng::seed_from_u64(id as u64);
        for _ in 0..args.mixed_ops {
            let key = mixed_key(rng.gen_range(0..=MIXED_KEY_SPACE));
            match rng.gen_range(0..3) {
                0 => {
                    table.set(key, id as u64)?;
                }
                1 => {
                    let _ = table.get(key.as_str()).or_else(not_found_as_zero)?;
                }
                _ => {
                    table.delete(key.as_str()).or_else(not_found_as_zero)?;
                }
            }
        }
        Ok(())
    })?;

    // Every surviving entry must be consistent with the key space
    let items = table.items()?;
    let count = table.count()?;
    let in_range = items
        .iter()
        .all(|(k, _)| (0..=MIXED_KEY_SPACE).any(|i| *k == mixed_key(i)));

    if items.len() != count || !in_range {
        tracing::error!("Mixed phase left {} items but count() = {}", items.len(), count);
        return Ok(false);
    }

    tracing::debug!("Mixed phase left {} entries", count);
    Ok(true)
}

/// Several workers clear a populated table at once
fn run_clear_phase(table: &ConcurrentTable<String, u64>, args: &Args) -> Result<bool> {
    for i in 0..50 {
        table.set(format!("clear_{}", i), i)?;
    }

    run_workers(args.workers.min(3).max(1), |_| table.clear())?;

    let count = table.count()?;
    if count != 0 {
        tracing::error!("Table holds {} entries after clear", count);
        return Ok(false);
    }
    Ok(true)
}

/// Same counter workload as separate get/set calls; reports, never fails
fn run_racy_counter(table: &ConcurrentTable<String, u64>, args: &Args) -> Result<()> {
    table.clear()?;

    run_workers(args.workers, |_| {
        for _ in 0..args.increments {
            let current = table.get("racy").or_else(not_found_as_zero)?;
            table.set("racy".to_string(), current + 1)?;
        }
        Ok(())
    })?;

    let expected = args.workers as u64 * args.increments;
    let actual = table.get("racy").or_else(not_found_as_zero)?;
    if actual < expected {
        tracing::warn!(
            "get-then-set lost {} of {} updates",
            expected - actual,
            expected
        );
    } else {
        tracing::info!("get-then-set happened not to lose updates this run");
    }
    Ok(())
}

// =============================================================================
// Helpers
// =============================================================================

/// Run `work(id)` on `count` scoped threads and surface the first error
fn run_workers<F>(count: usize, work: F) -> Result<()>
where
    F: Fn(usize) -> Result<()> + Sync,
{
    let work = &work;
    let outcomes = crossbeam::scope(|s| {
        let handles: Vec<_> = (0..count)
            .map(|id| s.spawn(move |_| work(id)))
            .collect();

        handles
            .into_iter()
            .map(|h| h.join())
            .collect::<Vec<_>>()
    });

    let outcomes = match outcomes {
        Ok(outcomes) => outcomes,
        Err(_) => {
            tracing::error!("Worker scope panicked");
            std::process::exit(1);
        }
    };

    for outcome in outcomes {
        match outcome {
            Ok(result) => result?,
            Err(_) => {
                tracing::error!("Worker thread panicked");
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

/// Treat a miss as zero, propagate anything else
fn not_found_as_zero(e: chaintable::TableError) -> Result<u64> {
    if e.is_not_found() {
        Ok(0)
    } else {
        Err(e)
    }
}

fn mixed_key(i: u64) -> String {
    format!("slot_{}", i)
}
