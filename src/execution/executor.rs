// Execution engine coordinator

use crate::error::Result;
use crate::execution::operators::{
    HashJoinConfig, HashJoinOperator, JoinOperator, RadixJoinConfig, RadixJoinOperator,
    SortMergeConfig, SortMergeJoinOperator, TrieJoinConfig, TrieJoinOperator,
};
use crate::execution::scheduler::WorkerPool;
use crate::types::{CastRow, ResultRow, TitleRow};
use log::debug;

/// Which engine to run, with its configuration
#[derive(Clone, Debug)]
pub enum JoinStrategy {
    /// Equality join through a hash table
    Hash(HashJoinConfig),
    /// Equality join over inputs sorted by join key
    SortMerge(SortMergeConfig),
    /// Equality join over radix buckets
    Radix(RadixJoinConfig),
    /// Prefix-match join of cast notes against titles
    Trie(TrieJoinConfig),
}

impl JoinStrategy {
    /// Instantiate the engine, validating its configuration
    pub fn operator(&self) -> Result<Box<dyn JoinOperator>> {
        Ok(match self {
            JoinStrategy::Hash(config) => Box::new(HashJoinOperator::new(config.clone())),
            JoinStrategy::SortMerge(config) => {
                Box::new(SortMergeJoinOperator::new(config.clone())?)
            }
            JoinStrategy::Radix(config) => Box::new(RadixJoinOperator::new(config.clone())?),
            JoinStrategy::Trie(config) => Box::new(TrieJoinOperator::new(config.clone())),
        })
    }
}

/// Executor that owns a worker pool and runs join strategies on it.
/// Reusing one executor avoids rebuilding threads for every join.
pub struct Executor {
    pool: WorkerPool,
}

impl Executor {
    /// Create an executor with `parallelism` workers
    pub fn new(parallelism: usize) -> Result<Self> {
        Ok(Self {
            pool: WorkerPool::new(parallelism)?,
        })
    }

    pub fn parallelism(&self) -> usize {
        self.pool.workers()
    }

    /// Execute one join and return the results
    ///
    /// # Arguments
    /// * `strategy` - Engine and configuration to use
    /// * `cast` - Fact relation (must be sorted by `movie_id` for `SortMerge`)
    /// * `title` - Dimension relation (must be sorted by `title_id` for `SortMerge`)
    pub fn execute(
        &self,
        strategy: &JoinStrategy,
        cast: &[CastRow],
        title: &[TitleRow],
    ) -> Result<Vec<ResultRow>> {
        let operator = strategy.operator()?;
        debug!(
            "Executing {} join on {} workers: {} cast rows, {} title rows",
            operator.name(),
            self.pool.workers(),
            cast.len(),
            title.len()
        );
        let rows = operator.execute(&self.pool, cast, title)?;
        debug!("{} join produced {} rows", operator.name(), rows.len());
        Ok(rows)
    }
}
