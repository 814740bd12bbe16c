pub mod hash_join;
pub mod radix_join;
pub mod sort_merge_join;
pub mod trie_join;

// Export operators for use by executor
pub use hash_join::{BuildPolicy, HashJoinConfig, HashJoinOperator};
pub use radix_join::{RadixJoinConfig, RadixJoinOperator, RadixPartition};
pub use sort_merge_join::{ChunkPair, SortMergeConfig, SortMergeJoinOperator};
pub use trie_join::{PrefixTrie, TrieJoinConfig, TrieJoinOperator};

use crate::error::{JoinError, Result};
use crate::execution::scheduler::WorkerPool;
use crate::types::{CastRow, ResultRow, TitleRow};

/// Trait for all join engines.
///
/// Every engine takes the fact relation (`cast`) and the dimension relation (`title`) by
/// shared reference, never mutates them, and returns a freshly allocated result owned by the
/// caller. Engines differ in algorithm and preconditions, not in contract.
pub trait JoinOperator: Send + Sync {
    /// Short engine name used in logs
    fn name(&self) -> &'static str;

    /// Run the join on an existing worker pool
    ///
    /// # Arguments
    /// * `pool` - Workers to fork onto; its size is the degree of parallelism
    /// * `cast` - Fact relation
    /// * `title` - Dimension relation
    fn execute(
        &self,
        pool: &WorkerPool,
        cast: &[CastRow],
        title: &[TitleRow],
    ) -> Result<Vec<ResultRow>>;

    /// Run the join on a fresh pool of `parallelism` workers.
    /// Empty inputs return an empty result without spawning any worker.
    fn join(
        &self,
        cast: &[CastRow],
        title: &[TitleRow],
        parallelism: usize,
    ) -> Result<Vec<ResultRow>> {
        if parallelism == 0 {
            return Err(JoinError::InvalidParallelism(parallelism));
        }
        if cast.is_empty() || title.is_empty() {
            return Ok(Vec::new());
        }
        let pool = WorkerPool::new(parallelism)?;
        self.execute(&pool, cast, title)
    }
}
