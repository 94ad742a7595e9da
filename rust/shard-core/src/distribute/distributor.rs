// rust/shard-core/src/distribute/distributor.rs

//! Moves a directory's contents onto several destination volumes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::split::split_ranges;
use crate::error::{Result, ShardError};
use crate::shard::is_shard_name;
use crate::storage::StorageBackend;

/// Files one destination will receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationPlan {
    pub dir: PathBuf,
    /// Shard file names, in load order.
    pub shards: Vec<String>,
    /// Non-shard entries; only ever populated for the first destination.
    pub other: Vec<String>,
}

/// The complete set of moves for one distribution, computed up front.
#[derive(Debug, Clone, Serialize)]
pub struct DistributionPlan {
    pub source: PathBuf,
    pub destinations: Vec<DestinationPlan>,
}

impl DistributionPlan {
    /// Total number of entries that will be moved.
    pub fn total_moves(&self) -> usize {
        self.destinations
            .iter()
            .map(|d| d.shards.len() + d.other.len())
            .sum()
    }

    /// Number of shards per destination, in destination order.
    pub fn shard_counts(&self) -> Vec<usize> {
        self.destinations.iter().map(|d| d.shards.len()).collect()
    }
}

/// What a completed distribution moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationSummary {
    pub dir: PathBuf,
    pub shards_moved: usize,
    pub other_moved: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DistributionReport {
    pub destinations: Vec<DestinationSummary>,
}

impl DistributionReport {
    pub fn total_moves(&self) -> usize {
        self.destinations
            .iter()
            .map(|d| d.shards_moved + d.other_moved)
            .sum()
    }
}

/// Splits a source directory across destination volumes.
///
/// Non-shard entries all go to the first destination. Shards are sorted by
/// name and cut into contiguous runs whose sizes differ by at most one, the
/// earlier destinations taking the extra shards.
pub struct Distributor {
    storage: Arc<dyn StorageBackend>,
    shard_suffix: String,
}

impl Distributor {
    pub fn new(storage: Arc<dyn StorageBackend>, shard_suffix: impl Into<String>) -> Self {
        Self {
            storage,
            shard_suffix: shard_suffix.into(),
        }
    }

    /// Computes the moves without touching the filesystem.
    ///
    /// # Errors
    ///
    /// Returns a precondition error if no destinations are given, the
    /// source directory is missing or a destination already holds an entry
    /// of the same name, and a storage error if the source cannot be listed.
    pub fn plan(&self, source: &Path, destinations: &[PathBuf]) -> Result<DistributionPlan> {
        if destinations.is_empty() {
            return Err(ShardError::precondition(
                "at least one destination directory is required",
            ));
        }

        if !self.storage.exists(source)? || !self.storage.metadata(source)?.is_dir {
            return Err(ShardError::precondition(format!(
                "source directory {} does not exist",
                source.display()
            )));
        }

        let (mut shards, other): (Vec<String>, Vec<String>) = self
            .storage
            .list(source)?
            .into_iter()
            .partition(|name| is_shard_name(name, &self.shard_suffix));
        shards.sort();

        let mut plans: Vec<DestinationPlan> = split_ranges(shards.len(), destinations.len())
            .into_iter()
            .zip(destinations)
            .map(|(range, dir)| DestinationPlan {
                dir: dir.clone(),
                shards: shards[range].to_vec(),
                other: Vec::new(),
            })
            .collect();
        plans[0].other = other;

        let plan = DistributionPlan {
            source: source.to_path_buf(),
            destinations: plans,
        };
        self.check_targets_free(&plan)?;
        Ok(plan)
    }

    /// Fails if any planned target name is already taken in its destination.
    fn check_targets_free(&self, plan: &DistributionPlan) -> Result<()> {
        for dest in &plan.destinations {
            for name in dest.other.iter().chain(&dest.shards) {
                let target = dest.dir.join(name);
                if self.storage.exists(&target)? {
                    return Err(ShardError::precondition(format!(
                        "{} already exists, refusing to overwrite it",
                        target.display()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Plans and executes a distribution.
    ///
    /// All destination directories are created before the first move. The
    /// batch is not transactional: if a move fails, earlier moves stay
    /// applied and the error reports how many completed.
    ///
    /// # Errors
    ///
    /// Returns a precondition error (see [`Distributor::plan`]), a storage
    /// error if a destination cannot be created, or
    /// [`ShardError::PartialDistribution`] if a move fails.
    pub fn distribute(&self, source: &Path, destinations: &[PathBuf]) -> Result<DistributionReport> {
        let plan = self.plan(source, destinations)?;
        self.execute(&plan)
    }

    /// Executes a previously computed plan.
    ///
    /// # Errors
    ///
    /// See [`Distributor::distribute`].
    pub fn execute(&self, plan: &DistributionPlan) -> Result<DistributionReport> {
        self.check_targets_free(plan)?;
        for dest in &plan.destinations {
            self.storage.create_dir_all(&dest.dir)?;
        }

        let mut completed = 0usize;
        let mut report = DistributionReport::default();

        for dest in &plan.destinations {
            for name in &dest.other {
                self.move_entry(&plan.source, &dest.dir, name)
                    .map_err(|e| ShardError::partial_distribution(completed, e))?;
                completed += 1;
            }

            for name in &dest.shards {
                self.move_entry(&plan.source, &dest.dir, name)
                    .map_err(|e| ShardError::partial_distribution(completed, e))?;
                completed += 1;
            }

            info!(
                destination = %dest.dir.display(),
                shards = dest.shards.len(),
                other = dest.other.len(),
                "destination populated"
            );

            report.destinations.push(DestinationSummary {
                dir: dest.dir.clone(),
                shards_moved: dest.shards.len(),
                other_moved: dest.other.len(),
            });
        }

        Ok(report)
    }

    fn move_entry(&self, source: &Path, dest: &Path, name: &str) -> Result<()> {
        let from = source.join(name);
        let to = dest.join(name);
        debug!(from = %from.display(), to = %to.display(), "moving");
        self.storage.rename(&from, &to)
    }
}
