// Fork-join worker pool

use crate::error::{JoinError, Result};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

/// How the iterations of a parallel loop are handed to workers.
///
/// Mirrors the classic fork-join loop schedules so every engine can pin the policy it was tuned
/// with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Schedule {
    /// One contiguous, near-equal range per worker. Worker `w` always gets the `w`-th range.
    Static,
    /// Fixed-size chunks dealt round-robin: chunk `i` goes to worker `i % workers`.
    StaticChunked(usize),
    /// Fixed-size chunks claimed first-come first-served from a shared cursor.
    Dynamic(usize),
    /// Claimed like `Dynamic`, but each chunk is `remaining / workers` rows, never below the
    /// given minimum.
    Guided(usize),
}

/// A fixed-size pool of workers. Every parallel call returns only after all of its tasks
/// finished, so consecutive calls are separated by a barrier.
pub struct WorkerPool {
    pool: ThreadPool,
    workers: usize,
}

impl WorkerPool {
    /// Create a pool with exactly `workers` threads
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(JoinError::InvalidParallelism(workers));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("join-worker-{}", i))
            .build()?;
        Ok(Self { pool, workers })
    }

    /// Number of workers (degree of parallelism)
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run a parallel loop over `0..len`.
    ///
    /// Each logical worker receives its own scratch value from `init(worker)` and is called
    /// with the ranges the schedule assigns to it. Scratch values are returned in worker-index
    /// order, which is how engines collect their private output buffers.
    pub fn parallel_for<S, I, F>(&self, len: usize, schedule: Schedule, init: I, body: F) -> Vec<S>
    where
        S: Send,
        I: Fn(usize) -> S + Sync,
        F: Fn(&mut S, Range<usize>) + Sync,
    {
        let workers = self.workers;
        let cursor = AtomicUsize::new(0);
        self.pool.install(|| {
            (0..workers)
                .into_par_iter()
                .map(|worker| {
                    let mut scratch = init(worker);
                    run_worker(len, workers, worker, schedule, &cursor, &mut |range: Range<usize>| {
                        body(&mut scratch, range)
                    });
                    scratch
                })
                .collect()
        })
    }

    /// Compute `f(i)` for every `i` in `0..len`, returning results in index order
    /// regardless of schedule.
    pub fn map_indexed<T, F>(&self, len: usize, schedule: Schedule, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync,
    {
        let parts = self.parallel_for(
            len,
            schedule,
            |_| Vec::new(),
            |out: &mut Vec<(usize, T)>, range: Range<usize>| out.extend(range.map(|i| (i, f(i)))),
        );
        let mut indexed: Vec<(usize, T)> = parts.into_iter().flatten().collect();
        // static ranges are contiguous and ascending per worker
        if schedule != Schedule::Static {
            indexed.sort_unstable_by_key(|(i, _)| *i);
        }
        indexed.into_iter().map(|(_, value)| value).collect()
    }

    /// Run two independent sections in parallel
    pub fn sections<A, B, RA, RB>(&self, a: A, b: B) -> (RA, RB)
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send,
    {
        self.pool.join(a, b)
    }

    /// Run a rayon computation inside this pool
    pub(crate) fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}

/// The `worker`-th of `workers` near-equal contiguous ranges of `0..len`
pub fn static_range(len: usize, workers: usize, worker: usize) -> Range<usize> {
    let base = len / workers;
    let extra = len % workers;
    let start = worker * base + worker.min(extra);
    let end = start + base + usize::from(worker < extra);
    start..end
}

fn guided_chunk(remaining: usize, workers: usize, min_chunk: usize) -> usize {
    (remaining / workers).max(min_chunk).min(remaining)
}

fn run_worker(
    len: usize,
    workers: usize,
    worker: usize,
    schedule: Schedule,
    cursor: &AtomicUsize,
    body: &mut dyn FnMut(Range<usize>),
) {
    match schedule {
        Schedule::Static => {
            let range = static_range(len, workers, worker);
            if !range.is_empty() {
                body(range);
            }
        }
        Schedule::StaticChunked(chunk) => {
            let chunk = chunk.clamp(1, len.max(1));
            let stride = chunk.saturating_mul(workers);
            let mut start = chunk.saturating_mul(worker);
            while start < len {
                body(start..start.saturating_add(chunk).min(len));
                start = start.saturating_add(stride);
            }
        }
        Schedule::Dynamic(chunk) => {
            let chunk = chunk.clamp(1, len.max(1));
            loop {
                let start = cursor.fetch_add(chunk, Ordering::Relaxed);
                if start >= len {
                    break;
                }
                body(start..(start + chunk).min(len));
            }
        }
        Schedule::Guided(min_chunk) => {
            let min_chunk = min_chunk.max(1);
            while let Ok(start) = cursor.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |start| {
                (start < len).then(|| start + guided_chunk(len - start, workers, min_chunk))
            }) {
                body(start..start + guided_chunk(len - start, workers, min_chunk));
            }
        }
    }
}
