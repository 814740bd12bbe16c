// Hash joins (shared and partitioned build)

use crate::error::Result;
use crate::execution::operators::JoinOperator;
use crate::execution::output::{concat_in_order, OffsetPlan};
use crate::execution::scheduler::{Schedule, WorkerPool};
use crate::types::{combine, CastRow, ResultRow, TitleRow};
use log::debug;
use std::collections::HashMap;
use std::ops::Range;

/// How the build side (title relation) is turned into a hash table
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BuildPolicy {
    /// One map built sequentially, key -> single title row.
    /// Duplicate title keys collapse and the last row wins, so matches can go missing when
    /// `title_id` is not unique.
    Shared,
    /// Per-worker multimaps over contiguous title ranges, merged before probing.
    /// Handles duplicates on both sides and keeps cast order in the output.
    #[default]
    Partitioned,
}

/// Configuration for [`HashJoinOperator`]
#[derive(Clone, Debug)]
pub struct HashJoinConfig {
    pub policy: BuildPolicy,
    /// Probe schedule of the shared policy (default: round-robin chunks of 508 rows)
    pub probe_schedule: Schedule,
}

impl Default for HashJoinConfig {
    fn default() -> Self {
        Self {
            policy: BuildPolicy::default(),
            probe_schedule: Schedule::StaticChunked(508),
        }
    }
}

/// Hash join: build a hash table from the title side, probe with cast rows.
pub struct HashJoinOperator {
    config: HashJoinConfig,
}

impl HashJoinOperator {
    pub fn new(config: HashJoinConfig) -> Self {
        Self { config }
    }

    /// Shared single-map build with default probe schedule
    pub fn shared() -> Self {
        Self::new(HashJoinConfig {
            policy: BuildPolicy::Shared,
            ..HashJoinConfig::default()
        })
    }

    /// Partitioned multimap build
    pub fn partitioned() -> Self {
        Self::new(HashJoinConfig {
            policy: BuildPolicy::Partitioned,
            ..HashJoinConfig::default()
        })
    }

    pub fn policy(&self) -> BuildPolicy {
        self.config.policy
    }

    fn join_shared(
        &self,
        pool: &WorkerPool,
        cast: &[CastRow],
        title: &[TitleRow],
    ) -> Vec<ResultRow> {
        // Build: key -> title row, later rows overwrite earlier ones
        let mut map: HashMap<i32, &TitleRow> = HashMap::with_capacity(title.len());
        for row in title {
            map.insert(row.title_id, row);
        }
        debug!(
            "Shared build: {} distinct keys from {} title rows",
            map.len(),
            title.len()
        );

        // Probe: each worker appends to its own buffer
        let reserve = cast.len() / pool.workers();
        let parts = pool.parallel_for(
            cast.len(),
            self.config.probe_schedule,
            |_| Vec::with_capacity(reserve),
            |out: &mut Vec<ResultRow>, range: Range<usize>| {
                for row in &cast[range] {
                    if let Some(title_row) = map.get(&row.movie_id) {
                        out.push(combine(row, title_row));
                    }
                }
            },
        );
        concat_in_order(parts)
    }

    fn join_partitioned(
        &self,
        pool: &WorkerPool,
        cast: &[CastRow],
        title: &[TitleRow],
    ) -> Result<Vec<ResultRow>> {
        let map = build_multimap(pool, title);
        debug!(
            "Partitioned build: {} distinct keys from {} title rows",
            map.len(),
            title.len()
        );

        // Pass 1: exact match count per cast row
        let counts = pool.map_indexed(cast.len(), Schedule::Static, |i| {
            map.get(&cast[i].movie_id).map_or(0, Vec::len)
        });
        let plan = OffsetPlan::from_counts(&counts)?;
        debug!("Partitioned probe: {} matches", plan.total());

        // Pass 2: each cast row fills its own range
        Ok(plan.scatter(pool, |i, slot: &mut [ResultRow]| {
            let row = &cast[i];
            if let Some(matches) = map.get(&row.movie_id) {
                for (dst, &t) in slot.iter_mut().zip(matches) {
                    *dst = combine(row, &title[t]);
                }
            }
        }))
    }
}

/// Build one multimap (key -> title row indices) from per-worker partial maps.
/// Indices under each key stay in title order.
fn build_multimap(pool: &WorkerPool, title: &[TitleRow]) -> HashMap<i32, Vec<usize>> {
    let partials = pool.parallel_for(
        title.len(),
        Schedule::Static,
        |_| HashMap::new(),
        |map: &mut HashMap<i32, Vec<usize>>, range: Range<usize>| {
            for idx in range {
                map.entry(title[idx].title_id).or_default().push(idx);
            }
        },
    );

    // Merge sequentially in worker order
    let mut partials = partials.into_iter();
    let mut merged = partials.next().unwrap_or_default();
    for partial in partials {
        for (key, mut rows) in partial {
            merged.entry(key).or_default().append(&mut rows);
        }
    }
    merged
}

impl JoinOperator for HashJoinOperator {
    fn name(&self) -> &'static str {
        match self.config.policy {
            BuildPolicy::Shared => "hash-shared",
            BuildPolicy::Partitioned => "hash-partitioned",
        }
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
        match self.config.policy {
            BuildPolicy::Shared => Ok(self.join_shared(pool, cast, title)),
            BuildPolicy::Partitioned => self.join_partitioned(pool, cast, title),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cast_rows(keys: &[i32]) -> Vec<CastRow> {
        keys.iter()
            .enumerate()
            .map(|(i, &k)| CastRow::new(k, format!("c{}", i)))
            .collect()
    }

    fn title_rows(keys: &[i32]) -> Vec<TitleRow> {
        keys.iter()
            .enumerate()
            .map(|(i, &k)| TitleRow::new(k, format!("t{}", i)))
            .collect()
    }

    fn pairs(rows: &[ResultRow]) -> Vec<(String, String)> {
        rows.iter()
            .map(|r| (r.note.clone(), r.title.clone()))
            .collect()
    }

    #[test]
    fn test_single_match_group() {
        let cast = cast_rows(&[1, 2, 2]);
        let title = title_rows(&[2]);
        for op in [HashJoinOperator::shared(), HashJoinOperator::partitioned()] {
            let rows = op.join(&cast, &title, 2).unwrap();
            assert_eq!(rows.len(), 2, "{}", op.name());
            assert!(rows.iter().all(|r| r.movie_id == 2 && r.title_id == 2));
        }
    }

    #[test]
    fn test_partitioned_handles_duplicates_in_cast_order() {
        let cast = cast_rows(&[3, 1, 3, 9]);
        let title = title_rows(&[3, 1, 3, 3]);
        for workers in [1, 2, 3, 8] {
            let rows = HashJoinOperator::partitioned()
                .join(&cast, &title, workers)
                .unwrap();
            let expected: Vec<(String, String)> = [
                ("c0", "t0"),
                ("c0", "t2"),
                ("c0", "t3"),
                ("c1", "t1"),
                ("c2", "t0"),
                ("c2", "t2"),
                ("c2", "t3"),
            ]
            .iter()
            .map(|(c, t)| (c.to_string(), t.to_string()))
            .collect();
            assert_eq!(pairs(&rows), expected, "workers={}", workers);
        }
    }

    #[test]
    fn test_shared_last_title_wins() {
        let cast = cast_rows(&[5]);
        let title = title_rows(&[5, 5]);
        let rows = HashJoinOperator::shared().join(&cast, &title, 1).unwrap();
        assert_eq!(pairs(&rows), vec![("c0".to_string(), "t1".to_string())]);
    }

    #[test]
    fn test_no_matches() {
        let cast = cast_rows(&[1, 2]);
        let title = title_rows(&[3]);
        for op in [HashJoinOperator::shared(), HashJoinOperator::partitioned()] {
            assert!(op.join(&cast, &title, 4).unwrap().is_empty());
        }
    }

    #[test]
    fn test_empty_inputs() {
        let cast = cast_rows(&[1]);
        let title = title_rows(&[1]);
        let pool = WorkerPool::new(2).unwrap();
        for op in [HashJoinOperator::shared(), HashJoinOperator::partitioned()] {
            assert!(op.execute(&pool, &[], &title).unwrap().is_empty());
            assert!(op.execute(&pool, &cast, &[]).unwrap().is_empty());
        }
    }

    #[test]
    fn test_multimap_merge_keeps_title_order() {
        let title = title_rows(&[4, 4, 1, 4, 1]);
        let pool = WorkerPool::new(3).unwrap();
        let map = build_multimap(&pool, &title);
        assert_eq!(map[&4], vec![0, 1, 3]);
        assert_eq!(map[&1], vec![2, 4]);
    }
}
