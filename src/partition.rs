//! Work partitioning for the scorer, bootstrap, and permutation stages.
//!
//! All three produce independent per-feature results, so they share one
//! mechanism: split the row range into contiguous chunks, run the chunks on
//! the rayon pool over read-only borrows, and stitch the results back in
//! input order. Rows left over after even division are processed
//! sequentially and appended; they are never dropped and never reordered.

use std::ops::Range;

use rayon::prelude::*;

/// Default minimum rows per worker below which parallel dispatch is not
/// worth its overhead.
pub const DEFAULT_MIN_CHUNK: usize = 100;

/// How a row range will be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPlan {
    Sequential,
    Parallel {
        per_worker: usize,
        leftover: usize,
    },
}

/// Splits per-feature work across rayon workers, or runs it inline when the
/// chunks would be too small to justify dispatch.
#[derive(Debug, Clone, Copy)]
pub struct Partitioner {
    workers: usize,
    min_chunk: usize,
}

impl Partitioner {
    pub fn new(workers: usize, min_chunk: usize) -> Self {
        Self {
            workers: workers.max(1),
            min_chunk: min_chunk.max(1),
        }
    }

    /// Single-threaded partitioner; every range runs inline.
    pub fn sequential() -> Self {
        Self::new(1, 1)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Decide sequential vs parallel execution for `n_items` rows.
    pub fn plan(&self, n_items: usize) -> ExecutionPlan {
        if self.workers < 2 {
            return ExecutionPlan::Sequential;
        }
        let per_worker = n_items / self.workers;
        if per_worker < self.min_chunk {
            ExecutionPlan::Sequential
        } else {
            ExecutionPlan::Parallel {
                per_worker,
                leftover: n_items % self.workers,
            }
        }
    }

    /// Run `work` over `0..n_items` and return per-item results in input
    /// order, regardless of worker count. `work` receives a contiguous
    /// sub-range and must return one result per item in that range; it only
    /// borrows shared state immutably, so chunks race on nothing.
    pub fn map_chunks<R, F>(&self, n_items: usize, work: F) -> Vec<R>
    where
        R: Send,
        F: Fn(Range<usize>) -> Vec<R> + Sync,
    {
        match self.plan(n_items) {
            ExecutionPlan::Sequential => work(0..n_items),
            ExecutionPlan::Parallel { per_worker, .. } => {
                let body = self.workers * per_worker;
                let chunk_results: Vec<Vec<R>> = (0..self.workers)
                    .into_par_iter()
                    .map(|i| work(i * per_worker..(i + 1) * per_worker))
                    .collect();

                let mut merged = Vec::with_capacity(n_items);
                for chunk in chunk_results {
                    merged.extend(chunk);
                }
                // leftover rows run sequentially after the joined chunks
                if body < n_items {
                    merged.extend(work(body..n_items));
                }
                merged
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn squares(range: Range<usize>) -> Vec<usize> {
        range.map(|i| i * i).collect()
    }

    #[test]
    fn small_inputs_stay_sequential() {
        let p = Partitioner::new(4, 100);
        assert_eq!(p.plan(50), ExecutionPlan::Sequential);
        assert_eq!(p.map_chunks(5, squares), vec![0, 1, 4, 9, 16]);
    }

    #[test]
    fn parallel_output_matches_sequential_for_any_worker_count() {
        let expected = squares(0..103);
        for workers in 1..=6 {
            let p = Partitioner::new(workers, 1);
            assert_eq!(p.map_chunks(103, squares), expected, "workers={workers}");
        }
    }

    #[test]
    fn leftovers_are_present_exactly_once() {
        // 10 items over 4 workers: 2 per worker, 2 leftover
        let p = Partitioner::new(4, 2);
        match p.plan(10) {
            ExecutionPlan::Parallel {
                per_worker,
                leftover,
            } => {
                assert_eq!(per_worker, 2);
                assert_eq!(leftover, 2);
            }
            other => panic!("expected parallel plan, got {other:?}"),
        }
        let out = p.map_chunks(10, |r| r.collect::<Vec<_>>());
        assert_eq!(out, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn single_worker_never_dispatches() {
        let p = Partitioner::sequential();
        assert_eq!(p.plan(1_000_000), ExecutionPlan::Sequential);
    }
}
