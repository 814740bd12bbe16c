// Cache-conscious sort-merge join

use crate::error::{JoinError, Result};
use crate::execution::operators::JoinOperator;
use crate::execution::output::concat_in_order;
use crate::execution::scheduler::{Schedule, WorkerPool};
use crate::types::{combine, CastRow, JoinKey, ResultRow, TitleRow};
use log::{debug, trace};
use std::cmp::Ordering;
use std::mem::size_of;
use std::ops::Range;

/// Half of a 512 KiB second-level cache
pub const DEFAULT_CACHE_BUDGET_BYTES: usize = 256 * 1024;

/// Configuration for [`SortMergeJoinOperator`]
#[derive(Clone, Debug)]
pub struct SortMergeConfig {
    /// Bytes of cast rows a chunk should roughly fit in
    pub cache_budget_bytes: usize,
    /// How chunk pairs are handed to workers
    pub schedule: Schedule,
}

impl Default for SortMergeConfig {
    fn default() -> Self {
        Self {
            cache_budget_bytes: DEFAULT_CACHE_BUDGET_BYTES,
            schedule: Schedule::Dynamic(1),
        }
    }
}

impl SortMergeConfig {
    /// Target rows per chunk derived from the cache budget
    pub fn chunk_rows(&self) -> usize {
        self.cache_budget_bytes / size_of::<CastRow>()
    }
}

/// A cast range and a title range covering exactly the same join keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkPair {
    pub cast: Range<usize>,
    pub title: Range<usize>,
}

/// Sort-merge join over inputs sorted ascending by join key.
///
/// Both relations MUST already be sorted (`movie_id` and `title_id` ascending). This is a
/// caller contract and is not checked: unsorted input silently produces wrong or incomplete
/// results. Use [`crate::types::sort_cast_relation`] / [`crate::types::sort_title_relation`]
/// to get sorted copies.
pub struct SortMergeJoinOperator {
    config: SortMergeConfig,
    chunk_rows: usize,
}

impl SortMergeJoinOperator {
    /// Create the operator; the cache budget must hold at least one cast row
    pub fn new(config: SortMergeConfig) -> Result<Self> {
        let chunk_rows = config.chunk_rows();
        if chunk_rows == 0 {
            return Err(JoinError::InvalidCacheBudget(config.cache_budget_bytes));
        }
        Ok(Self { config, chunk_rows })
    }

    pub fn chunk_rows(&self) -> usize {
        self.chunk_rows
    }
}

impl Default for SortMergeJoinOperator {
    fn default() -> Self {
        let config = SortMergeConfig::default();
        Self {
            chunk_rows: config.chunk_rows(),
            config,
        }
    }
}

/// Split both sorted relations into key-aligned chunk pairs of roughly `chunk_rows` rows.
///
/// For each step a window of `chunk_rows` is proposed on both sides; the cut key is the smaller
/// of the two windows' last keys, and each side's chunk then ends after its last row with a key
/// at or below the cut. A key group therefore always lands whole in one pair, on both sides.
/// Pairs where one side is empty cannot match and are dropped.
pub fn plan_chunks(cast: &[CastRow], title: &[TitleRow], chunk_rows: usize) -> Vec<ChunkPair> {
    let chunk_rows = chunk_rows.max(1);
    let mut chunks = Vec::new();
    let (mut c_pos, mut t_pos) = (0, 0);

    while c_pos < cast.len() && t_pos < title.len() {
        let c_window = (c_pos + chunk_rows).min(cast.len());
        let t_window = (t_pos + chunk_rows).min(title.len());
        let cut = cast[c_window - 1]
            .movie_id
            .min(title[t_window - 1].title_id);

        let c_end = c_pos + cast[c_pos..].partition_point(|r| r.movie_id <= cut);
        let t_end = t_pos + title[t_pos..].partition_point(|r| r.title_id <= cut);
        if c_end > c_pos && t_end > t_pos {
            chunks.push(ChunkPair {
                cast: c_pos..c_end,
                title: t_pos..t_end,
            });
        }
        c_pos = c_end;
        t_pos = t_end;
    }
    chunks
}

/// End (exclusive) of the group starting at `start`
fn group_end<T: JoinKey>(rows: &[T], start: usize) -> usize {
    let key = rows[start].join_key();
    start + rows[start..].iter().take_while(|r| r.join_key() == key).count()
}

/// Group-wise merge join of two sorted slices
fn merge_join(cast: &[CastRow], title: &[TitleRow], out: &mut Vec<ResultRow>) {
    let (mut c, mut t) = (0, 0);
    while c < cast.len() && t < title.len() {
        match cast[c].movie_id.cmp(&title[t].title_id) {
            Ordering::Less => c = group_end(cast, c),
            Ordering::Greater => t = group_end(title, t),
            Ordering::Equal => {
                let c_end = group_end(cast, c);
                let t_end = group_end(title, t);
                for cast_row in &cast[c..c_end] {
                    for title_row in &title[t..t_end] {
                        out.push(combine(cast_row, title_row));
                    }
                }
                c = c_end;
                t = t_end;
            }
        }
    }
}

impl JoinOperator for SortMergeJoinOperator {
    fn name(&self) -> &'static str {
        "sort-merge"
    }

    fn execute(
        &self,
        pool: &WorkerPool,
        cast: &[CastRow],
        title: &[TitleRow],
    ) -> Result<Vec<ResultRow>> {
        if cast.is_empty() || title.is_empty() {
            return Ok(Vec::new());
        }

        let chunks = plan_chunks(cast, title, self.chunk_rows);
        debug!(
            "Sort-merge: {} chunk pairs of ~{} rows",
            chunks.len(),
            self.chunk_rows
        );

        let per_chunk = pool.map_indexed(chunks.len(), self.config.schedule, |i| {
            let pair = &chunks[i];
            let mut out = Vec::new();
            merge_join(
                &cast[pair.cast.clone()],
                &title[pair.title.clone()],
                &mut out,
            );
            trace!(
                "Chunk {}: cast {:?}, title {:?} -> {} rows",
                i,
                pair.cast,
                pair.title,
                out.len()
            );
            out
        });
        Ok(concat_in_order(per_chunk))
    }
}
