// Radix-partitioned hash join

use crate::error::{JoinError, Result};
use crate::execution::operators::JoinOperator;
use crate::execution::output::OffsetPlan;
use crate::execution::scheduler::{Schedule, WorkerPool};
use crate::types::{combine, CastRow, JoinKey, ResultRow, TitleRow};
use log::debug;
use std::collections::HashMap;
use std::ops::Range;

pub const DEFAULT_RADIX_BITS: u32 = 10;
pub const MAX_RADIX_BITS: u32 = 20;

/// Configuration for [`RadixJoinOperator`]
#[derive(Clone, Debug)]
pub struct RadixJoinConfig {
    /// Low key bits used to pick a bucket; `2^radix_bits` buckets
    pub radix_bits: u32,
    /// How buckets are handed to workers in the join phase
    pub schedule: Schedule,
}

impl Default for RadixJoinConfig {
    fn default() -> Self {
        Self {
            radix_bits: DEFAULT_RADIX_BITS,
            schedule: Schedule::Static,
        }
    }
}

/// One relation reordered into radix buckets by `key & mask`.
///
/// Holds row indices into the borrowed relation, grouped by bucket; bucket `b` spans
/// `bounds[b]..bounds[b + 1]`. Equal keys always share a bucket, unequal keys may collide.
pub struct RadixPartition<'a, T> {
    rows: &'a [T],
    order: Vec<usize>,
    bounds: Vec<usize>,
}

impl<'a, T: JoinKey> RadixPartition<'a, T> {
    /// Two-pass counting sort of `rows` into `2^bits` buckets; `bits` outside
    /// `1..=MAX_RADIX_BITS` is rejected with [`JoinError::InvalidRadixBits`]
    pub fn new(rows: &'a [T], bits: u32) -> Result<Self> {
        check_bits(bits)?;
        let buckets = 1usize << bits;
        let mask = (buckets - 1) as u32;
        let bucket_of = |row: &T| (row.join_key() as u32 & mask) as usize;

        let mut sizes = vec![0usize; buckets];
        for row in rows {
            sizes[bucket_of(row)] += 1;
        }

        let plan = OffsetPlan::from_counts(&sizes)?;
        let mut cursors = plan.bounds()[..buckets].to_vec();
        let mut order = vec![0usize; rows.len()];
        for (idx, row) in rows.iter().enumerate() {
            let bucket = bucket_of(row);
            order[cursors[bucket]] = idx;
            cursors[bucket] += 1;
        }

        Ok(Self {
            rows,
            order,
            bounds: plan.bounds().to_vec(),
        })
    }

    pub fn bucket_count(&self) -> usize {
        self.bounds.len() - 1
    }

    /// `bucket_count() + 1` boundaries into the reordered relation
    pub fn bounds(&self) -> &[usize] {
        &self.bounds
    }

    pub fn bucket_range(&self, bucket: usize) -> Range<usize> {
        self.bounds[bucket]..self.bounds[bucket + 1]
    }

    pub fn bucket_len(&self, bucket: usize) -> usize {
        self.bounds[bucket + 1] - self.bounds[bucket]
    }

    /// Rows of one bucket, in input order
    pub fn bucket(&self, bucket: usize) -> impl Iterator<Item = &'a T> + '_ {
        let rows = self.rows;
        self.order[self.bucket_range(bucket)]
            .iter()
            .map(move |&idx| &rows[idx])
    }
}

fn check_bits(bits: u32) -> Result<()> {
    if bits == 0 || bits > MAX_RADIX_BITS {
        return Err(JoinError::InvalidRadixBits {
            bits,
            max: MAX_RADIX_BITS,
        });
    }
    Ok(())
}

/// Radix join: partition both relations by low key bits, then hash-join bucket pairs.
#[derive(Default)]
pub struct RadixJoinOperator {
    config: RadixJoinConfig,
}

impl RadixJoinOperator {
    pub fn new(config: RadixJoinConfig) -> Result<Self> {
        check_bits(config.radix_bits)?;
        Ok(Self { config })
    }

    /// Operator with the given radix width and default schedule
    pub fn with_bits(radix_bits: u32) -> Result<Self> {
        Self::new(RadixJoinConfig {
            radix_bits,
            ..RadixJoinConfig::default()
        })
    }
}

/// Hash join of one bucket pair, appending to `out`
fn join_bucket(
    titles: &RadixPartition<'_, TitleRow>,
    casts: &RadixPartition<'_, CastRow>,
    bucket: usize,
    out: &mut Vec<ResultRow>,
) {
    let title_len = titles.bucket_len(bucket);
    if title_len == 0 || casts.bucket_len(bucket) == 0 {
        return;
    }

    let mut table: HashMap<i32, Vec<&TitleRow>> = HashMap::with_capacity(title_len);
    for row in titles.bucket(bucket) {
        table.entry(row.title_id).or_default().push(row);
    }
    for cast_row in casts.bucket(bucket) {
        if let Some(matches) = table.get(&cast_row.movie_id) {
            for title_row in matches {
                out.push(combine(cast_row, title_row));
            }
        }
    }
}

impl JoinOperator for RadixJoinOperator {
    fn name(&self) -> &'static str {
        "radix"
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

        // Partition phase: one section per relation
        let bits = self.config.radix_bits;
        let (titles, casts) = pool.sections(
            || RadixPartition::new(title, bits),
            || RadixPartition::new(cast, bits),
        );
        let (titles, casts) = (titles?, casts?);
        debug!(
            "Radix: partitioned {} title and {} cast rows into {} buckets",
            title.len(),
            cast.len(),
            titles.bucket_count()
        );

        // Join phase: buckets are independent
        let buffers = pool.parallel_for(
            titles.bucket_count(),
            self.config.schedule,
            |_| Vec::new(),
            |out: &mut Vec<ResultRow>, range: Range<usize>| {
                for bucket in range {
                    join_bucket(&titles, &casts, bucket, out);
                }
            },
        );

        // Aggregation: per-worker offsets into one result
        let counts: Vec<usize> = buffers.iter().map(Vec::len).collect();
        let plan = OffsetPlan::from_counts(&counts)?;
        debug!("Radix: {} matches from {} workers", plan.total(), counts.len());
        Ok(plan.scatter_owned(pool, buffers))
    }
}
