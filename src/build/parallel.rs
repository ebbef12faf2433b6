//! Parallel chain execution.
//!
//! All chains of one wave are independent: each reads only its own source
//! and, for template chains, the asset map frozen before the wave started.
//! The executor runs them on a rayon pool and returns results in input
//! order, so the first failure reported is always the same one regardless
//! of scheduling.

use rayon::prelude::*;
use rayon::ThreadPool;
use std::sync::{Arc, OnceLock};

use crate::artifact::{Artifact, SourceArtifact};
use crate::build::BuildError;
use crate::transforms::{run_chain, Transform, TransformOptions};

/// Default number of parallel jobs (uses available parallelism).
pub fn default_jobs() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// One unit of work: a source and the chain it runs through.
///
/// Passthrough sources use an empty chain.
#[derive(Debug, Clone, Copy)]
pub struct ChainJob<'a> {
    pub source: &'a SourceArtifact,
    pub chain: &'a [Arc<dyn Transform>],
}

/// Parallel chain executor.
///
/// The worker pool is started on first use and shared by clones.
#[derive(Debug, Clone)]
pub struct ParallelBuild {
    /// Number of parallel jobs
    jobs: usize,
    /// Worker pool, `None` when it failed to start
    pool: Arc<OnceLock<Option<ThreadPool>>>,
}

impl Default for ParallelBuild {
    fn default() -> Self {
        Self::new()
    }
}

impl ParallelBuild {
    /// Create an executor using all available cores.
    pub fn new() -> Self {
        Self { jobs: default_jobs(), pool: Arc::default() }
    }

    /// Set the number of parallel jobs.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self.pool = Arc::default();
        self
    }

    /// Get the number of parallel jobs.
    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Run every job's chain and collect the produced artifacts.
    ///
    /// Results are in job order. On failure the error of the earliest
    /// failing job is returned.
    pub fn run_chains(
        &self,
        jobs: &[ChainJob<'_>],
        options: &TransformOptions,
    ) -> Result<Vec<Vec<Artifact>>, BuildError> {
        let results = self.map(jobs, |job| execute_job(job, options));
        results.into_iter().collect()
    }

    /// Map `f` over `items` on the pool, preserving order.
    pub fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        // For single-threaded or single-item waves, just execute sequentially
        if self.jobs == 1 || items.len() <= 1 {
            return items.iter().map(f).collect();
        }

        match self.pool() {
            Some(pool) => pool.install(|| items.par_iter().map(f).collect()),
            None => items.iter().map(f).collect(),
        }
    }

    fn pool(&self) -> Option<&ThreadPool> {
        self.pool
            .get_or_init(|| {
                match rayon::ThreadPoolBuilder::new().num_threads(self.jobs).build() {
                    Ok(pool) => Some(pool),
                    Err(e) => {
                        tracing::warn!("failed to start worker pool, running sequentially: {}", e);
                        None
                    }
                }
            })
            .as_ref()
    }
}

fn execute_job(
    job: &ChainJob<'_>,
    options: &TransformOptions,
) -> Result<Vec<Artifact>, BuildError> {
    let path = job.source.path.clone();
    tracing::debug!(source = %path.display(), units = job.chain.len(), "running chain");

    run_chain(job.chain, job.source.to_artifact(), options)
        .map_err(|(unit, source)| BuildError::Transform { path, unit, source })
}
