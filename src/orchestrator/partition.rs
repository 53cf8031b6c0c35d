//! Workload partitioner
//!
//! Splits units `1..=total` into contiguous buckets whose sizes differ by at
//! most one, the earlier buckets taking the remainder.

/// Buckets of 1-based unit numbers, one per worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    buckets: Vec<Vec<usize>>,
}

impl Partition {
    pub fn buckets(&self) -> &[Vec<usize>] {
        &self.buckets
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.buckets.iter().map(Vec::len).collect()
    }

    pub fn worker_count(&self) -> usize {
        self.buckets.len()
    }

    /// `(worker_index, units)` for every non-empty bucket, in worker order
    pub fn assignments(&self) -> Vec<(usize, Vec<usize>)> {
        self.buckets
            .iter()
            .enumerate()
            .filter(|(_, units)| !units.is_empty())
            .map(|(i, units)| (i, units.clone()))
            .collect()
    }
}

/// Balanced split of `total_units` across `worker_count` workers.
///
/// `worker_count == 0` yields no buckets; `total_units == 0` yields
/// `worker_count` empty buckets; more workers than units leaves the trailing
/// buckets empty.
pub fn partition(total_units: usize, worker_count: usize) -> Partition {
    if worker_count == 0 || total_units == 0 {
        return Partition {
            buckets: vec![Vec::new(); worker_count],
        };
    }

    let base = total_units / worker_count;
    let remainder = total_units % worker_count;

    let mut buckets = Vec::with_capacity(worker_count);
    let mut next = 1;
    for worker in 0..worker_count {
        let size = base + usize::from(worker < remainder);
        buckets.push((next..next + size).collect());
        next += size;
    }
    Partition { buckets }
}

/// Tabs needed to create `total` macros in submissions of `batch_size`.
///
/// A single tab when everything fits in one submission, otherwise one tab per
/// submission up to `max_tabs`, sized by [`partition`].
pub fn tab_batch_sizes(total: usize, max_tabs: usize, batch_size: usize) -> Vec<usize> {
    if total == 0 {
        return Vec::new();
    }
    if total <= batch_size || batch_size == 0 || max_tabs <= 1 {
        return vec![total];
    }
    let required = total.div_ceil(batch_size);
    partition(total, required.min(max_tabs)).sizes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_units_gives_empty_buckets() {
        let p = partition(0, 3);
        assert_eq!(p.buckets(), &[Vec::<usize>::new(), vec![], vec![]]);
        assert!(p.assignments().is_empty());
    }

    #[test]
    fn zero_workers_gives_no_buckets() {
        assert_eq!(partition(5, 0).worker_count(), 0);
    }

    #[test]
    fn seven_over_three() {
        let p = partition(7, 3);
        assert_eq!(p.sizes(), vec![3, 2, 2]);
        assert_eq!(p.buckets(), &[vec![1, 2, 3], vec![4, 5], vec![6, 7]]);
    }

    #[test]
    fn ten_over_three() {
        assert_eq!(partition(10, 3).sizes(), vec![4, 3, 3]);
    }

    #[test]
    fn more_workers_than_units_leaves_trailing_buckets_empty() {
        let p = partition(2, 4);
        assert_eq!(p.sizes(), vec![1, 1, 0, 0]);
        let workers: Vec<usize> = p.assignments().into_iter().map(|(i, _)| i).collect();
        assert_eq!(workers, vec![0, 1]);
    }

    #[test]
    fn buckets_cover_every_unit_once_and_stay_balanced() {
        for total in 0..60 {
            for workers in 1..9 {
                let p = partition(total, workers);
                assert_eq!(p.worker_count(), workers);

                let flat: Vec<usize> = p.buckets().iter().flatten().copied().collect();
                assert_eq!(flat, (1..=total).collect::<Vec<_>>(), "{total}/{workers}");

                let sizes = p.sizes();
                let max = *sizes.iter().max().unwrap();
                let min = *sizes.iter().min().unwrap();
                assert!(max - min <= 1, "{total}/{workers}: {sizes:?}");
                assert!(sizes.windows(2).all(|w| w[0] >= w[1]));
            }
        }
    }

    #[test]
    fn tab_batches() {
        assert_eq!(tab_batch_sizes(8, 3, 10), vec![8]);
        assert_eq!(tab_batch_sizes(25, 3, 10), vec![9, 8, 8]);
        assert_eq!(tab_batch_sizes(25, 5, 10), vec![9, 8, 8]);
        assert_eq!(tab_batch_sizes(40, 2, 10), vec![20, 20]);
        assert!(tab_batch_sizes(0, 3, 10).is_empty());
    }
}
