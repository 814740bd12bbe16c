// Parallel result aggregation

use crate::error::{JoinError, Result};
use crate::execution::scheduler::WorkerPool;
use rayon::prelude::*;
use std::ops::Range;

/// Concatenate per-worker buffers in worker-index order into one exactly-sized vector
pub fn concat_in_order<T>(parts: Vec<Vec<T>>) -> Vec<T> {
    let total = parts.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(total);
    for part in parts {
        out.extend(part);
    }
    out
}

/// Disjoint output ranges derived from per-item match counts.
///
/// Built with an exclusive prefix sum: item `i` owns `bounds[i]..bounds[i + 1]` of the result.
/// Items are whatever the caller counted (driving rows, workers, buckets). Because ranges never
/// overlap, the write pass needs no synchronisation and output order follows item order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OffsetPlan {
    bounds: Vec<usize>,
}

impl OffsetPlan {
    /// Exclusive prefix sum over `counts`. Fails instead of wrapping if the total does not
    /// fit in `usize`.
    pub fn from_counts(counts: &[usize]) -> Result<Self> {
        let mut bounds = Vec::with_capacity(counts.len() + 1);
        let mut running = 0usize;
        bounds.push(running);
        for &count in counts {
            running = running
                .checked_add(count)
                .ok_or(JoinError::OffsetOverflow(counts.len()))?;
            bounds.push(running);
        }
        Ok(Self { bounds })
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.bounds.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of output slots
    pub fn total(&self) -> usize {
        self.bounds[self.bounds.len() - 1]
    }

    /// `len() + 1` boundaries; the first `len()` entries are the exclusive prefix sum
    pub fn bounds(&self) -> &[usize] {
        &self.bounds
    }

    /// Output range owned by `item`
    pub fn range(&self, item: usize) -> Range<usize> {
        self.bounds[item]..self.bounds[item + 1]
    }

    /// Pre-size the output and let `fill(item, slot)` write each non-empty item's range in
    /// parallel. `slot.len()` equals that item's count.
    pub fn scatter<T, F>(&self, pool: &WorkerPool, fill: F) -> Vec<T>
    where
        T: Default + Send,
        F: Fn(usize, &mut [T]) + Sync,
    {
        let mut out = Vec::with_capacity(self.total());
        out.resize_with(self.total(), T::default);
        let slots = self.split(&mut out);
        pool.install(|| {
            slots
                .into_par_iter()
                .for_each(|(item, slot)| fill(item, slot))
        });
        out
    }

    /// Move each item's buffer into its range. `parts[i].len()` must equal the count the plan
    /// was built from.
    pub fn scatter_owned<T>(&self, pool: &WorkerPool, mut parts: Vec<Vec<T>>) -> Vec<T>
    where
        T: Default + Send,
    {
        debug_assert_eq!(parts.len(), self.len());
        let mut out = Vec::with_capacity(self.total());
        out.resize_with(self.total(), T::default);
        let moves: Vec<(&mut [T], Vec<T>)> = self
            .split(&mut out)
            .into_iter()
            .map(|(item, slot)| (slot, std::mem::take(&mut parts[item])))
            .collect();
        pool.install(|| {
            moves.into_par_iter().for_each(|(slot, part)| {
                debug_assert_eq!(slot.len(), part.len());
                for (dst, src) in slot.iter_mut().zip(part) {
                    *dst = src;
                }
            })
        });
        out
    }

    /// Carve `out` into one mutable slice per non-empty item
    fn split<'a, T>(&self, out: &'a mut [T]) -> Vec<(usize, &'a mut [T])> {
        let mut slots = Vec::new();
        let mut rest = out;
        for item in 0..self.len() {
            let count = self.bounds[item + 1] - self.bounds[item];
            if count == 0 {
                continue;
            }
            let (slot, tail) = std::mem::take(&mut rest).split_at_mut(count);
            slots.push((item, slot));
            rest = tail;
        }
        slots
    }
}
