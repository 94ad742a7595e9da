//! Shard Tool command-line front end
//!
//! Spreads the shards of a model checkpoint across storage volumes and
//! benchmarks concurrent reads from those volumes.
//!
//! # Usage
//!
//! ```bash
//! # Show how shards would be split, without moving anything
//! shardtool plan /data/model /mnt/raid0n0/model /mnt/raid0n1/model
//!
//! # Move them
//! shardtool distribute /data/model /mnt/raid0n0/model /mnt/raid0n1/model
//!
//! # Read every shard back, one thread per volume
//! shardtool bench /mnt/raid0n0/model /mnt/raid0n1/model --expected-shards 8
//!
//! # With a configuration file and JSON output
//! shardtool --config shardtool.toml bench --json /mnt/raid0n0/model
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shard_core::distribute::{DistributionPlan, DistributionReport, Distributor};
use shard_core::harness::{
    gib_per_sec, to_gib, HarnessReport, ShardMeasurement, ThroughputHarness,
};
use shard_core::shard::discover_volume;
use shard_core::storage::{LocalStorage, StorageBackend};
use shard_core::tensor::SafetensorsLoader;
use shard_core::ToolConfig;

/// Shard distribution and volume throughput tool
#[derive(Parser, Debug)]
#[command(name = "shardtool")]
#[command(about = "Distribute model shards across volumes and measure read throughput")]
struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Print reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct DistributeArgs {
    /// Directory holding the shards
    source: PathBuf,

    /// Destination directories, one per volume
    #[arg(required = true)]
    destinations: Vec<PathBuf>,

    /// File name suffix identifying shards
    #[arg(long)]
    shard_suffix: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Move shards from a source directory onto destination volumes
    Distribute(DistributeArgs),

    /// Print the moves `distribute` would make
    Plan(DistributeArgs),

    /// Load every shard on each volume concurrently and report throughput
    Bench {
        /// Volume directories, one worker each
        #[arg(required = true)]
        volumes: Vec<PathBuf>,

        /// Fail unless every volume holds exactly this many shards
        #[arg(long)]
        expected_shards: Option<usize>,

        /// File name suffix identifying shards
        #[arg(long)]
        shard_suffix: Option<String>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<ToolConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => ToolConfig::from_file(path)?,
        None => ToolConfig::default(),
    };
    Ok(config.with_env_overrides())
}

fn build_distributor(
    config: &mut ToolConfig,
    shard_suffix: Option<String>,
) -> Result<Distributor, Box<dyn std::error::Error>> {
    if let Some(suffix) = shard_suffix {
        config.distribute.shard_suffix = suffix;
    }
    config.validate()?;

    let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(&config.storage)?);
    Ok(Distributor::new(storage, config.distribute.shard_suffix.clone()))
}

fn print_plan(plan: &DistributionPlan) {
    println!("Source: {}", plan.source.display());
    for dest in &plan.destinations {
        println!(
            "{}: {} shards, {} other entries",
            dest.dir.display(),
            dest.shards.len(),
            dest.other.len()
        );
        for name in dest.other.iter().chain(&dest.shards) {
            println!("  {name}");
        }
    }
    println!("Total moves: {}", plan.total_moves());
}

fn print_distribution(report: &DistributionReport) {
    for dest in &report.destinations {
        println!(
            "{}: moved {} shards, {} other entries",
            dest.dir.display(),
            dest.shards_moved,
            dest.other_moved
        );
    }
    println!("Total moves: {}", report.total_moves());
}

/// One line of the per-shard details listed under each volume.
fn shard_line(shard: &ShardMeasurement) -> String {
    let index = shard
        .shard_index
        .map_or_else(|| "-".to_string(), |i| i.to_string());
    let name = shard
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!(
        "  Shard {}: {}  {:.2} GiB at {:.2} GiB/s",
        index,
        name,
        to_gib(shard.byte_size),
        gib_per_sec(shard.rate())
    )
}

fn print_bench(report: &HarnessReport) {
    for (worker, volume) in report.workers.iter().zip(&report.aggregate.volumes) {
        let status = if volume.complete { "" } else { " (incomplete)" };
        println!(
            "{}: {} shards, {:.2} GiB in {:.2} s -> {:.2} GiB/s{}",
            volume.volume_label,
            volume.shard_count,
            volume.gib(),
            volume.total_duration.as_secs_f64(),
            gib_per_sec(volume.rate),
            status
        );
        for shard in &worker.shards {
            println!("{}", shard_line(shard));
        }
        if let Some(failure) = &worker.failure {
            println!("  stopped: {}", failure.message);
        }
    }
    println!(
        "Combined: {:.2} GiB, wall clock {:.2} s -> {:.2} GiB/s effective",
        to_gib(report.aggregate.combined_bytes),
        report.aggregate.wall_clock.as_secs_f64(),
        gib_per_sec(report.aggregate.effective_rate)
    );
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let filter = tracing_subscriber::filter::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = load_config(args.config.as_ref())?;

    match args.command {
        Command::Distribute(cmd) => {
            let distributor = build_distributor(&mut config, cmd.shard_suffix)?;

            tracing::info!(
                "Distributing {} across {} destinations",
                cmd.source.display(),
                cmd.destinations.len()
            );
            let report = distributor.distribute(&cmd.source, &cmd.destinations)?;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_distribution(&report);
            }
        }
        Command::Plan(cmd) => {
            let distributor = build_distributor(&mut config, cmd.shard_suffix)?;
            let plan = distributor.plan(&cmd.source, &cmd.destinations)?;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                print_plan(&plan);
            }
        }
        Command::Bench {
            volumes,
            expected_shards,
            shard_suffix,
        } => {
            if let Some(suffix) = shard_suffix {
                config.bench.shard_suffix = suffix;
            }
            if expected_shards.is_some() {
                config.bench.expected_shards_per_volume = expected_shards;
            }
            config.validate()?;

            let storage = Arc::new(LocalStorage::new(&config.storage)?);

            let mut assignments = Vec::with_capacity(volumes.len());
            for (i, dir) in volumes.iter().enumerate() {
                let listing = discover_volume(
                    storage.as_ref(),
                    dir,
                    format!("RAID{i}"),
                    &config.bench.shard_suffix,
                    config.bench.expected_shards_per_volume,
                )?;
                tracing::info!(
                    "{}: {} shards in {}",
                    listing.shards.label(),
                    listing.shards.len(),
                    dir.display()
                );
                if !listing.other_files.is_empty() {
                    tracing::info!(
                        "{}: additional files {:?}",
                        listing.shards.label(),
                        listing.other_files
                    );
                }
                assignments.push(listing.shards);
            }

            let harness = ThroughputHarness::new(Arc::new(SafetensorsLoader::new(storage)));
            let report = harness.measure(&assignments)?;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_bench(&report);
            }

            if !report.is_complete() {
                return Err(format!(
                    "incomplete volumes: {}",
                    report.aggregate.incomplete_volumes().join(", ")
                )
                .into());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn measurement(path: &str, shard_index: Option<u32>) -> ShardMeasurement {
        ShardMeasurement {
            path: PathBuf::from(path),
            shard_index,
            byte_size: 3 << 30,
            buffer_count: 4,
            elapsed: Duration::from_secs(2),
            checksum: 0,
        }
    }

    #[test]
    fn test_shard_line() {
        let line = shard_line(&measurement(
            "/mnt/raid0n0/model-00003-of-00016.safetensors",
            Some(3),
        ));
        assert_eq!(
            line,
            "  Shard 3: model-00003-of-00016.safetensors  3.00 GiB at 1.50 GiB/s"
        );
    }

    #[test]
    fn test_shard_line_without_index() {
        let line = shard_line(&measurement("weights.safetensors", None));
        assert!(line.starts_with("  Shard -: weights.safetensors"));
    }
}
