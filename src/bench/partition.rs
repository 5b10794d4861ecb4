//! Workload partitioning
//!
//! Splits a workload into contiguous blocks, one per worker. Every block
//! gets `N / K` identifiers and the last one also absorbs the `N % K`
//! remainder.

use std::sync::Arc;

use crate::bench::workload::BundleIdentifier;
use crate::{BenchError, Result};

/// Contiguous slice of the workload owned by one worker
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Worker index, `0..K`
    pub index: usize,
    /// Identifiers to install, in order
    pub bundles: Arc<[BundleIdentifier]>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}

/// Splits workloads across a fixed number of workers
#[derive(Debug, Clone, Copy)]
pub struct Partitioner {
    workers: usize,
    oversubscribe_last: bool,
}

impl Partitioner {
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            oversubscribe_last: false,
        }
    }

    /// Append the first identifier of the workload to the last partition.
    ///
    /// Off by default; only for runs that deliberately want one extra install.
    pub fn with_oversubscribed_last(mut self, enabled: bool) -> Self {
        self.oversubscribe_last = enabled;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Block sizes for `total` items over `workers` workers
    pub fn block_sizes(total: usize, workers: usize) -> Result<Vec<usize>> {
        if workers == 0 {
            return Err(BenchError::ConfigError(
                "Worker count must be greater than 0".to_string(),
            ));
        }
        if workers > total {
            return Err(BenchError::ConfigError(format!(
                "Worker count {} exceeds workload size {}",
                workers, total
            )));
        }

        let base = total / workers;
        let mut sizes = vec![base; workers];
        sizes[workers - 1] += total % workers;
        Ok(sizes)
    }

    /// Split `workload` into one partition per worker
    pub fn split(&self, workload: &[BundleIdentifier]) -> Result<Vec<Partition>> {
        let sizes = Self::block_sizes(workload.len(), self.workers)?;
        let last = sizes.len() - 1;

        let mut partitions = Vec::with_capacity(sizes.len());
        let mut offset = 0;
        for (index, size) in sizes.into_iter().enumerate() {
            let mut bundles = workload[offset..offset + size].to_vec();
            if index == last && self.oversubscribe_last {
                bundles.push(workload[0].clone());
            }
            partitions.push(Partition {
                index,
                bundles: bundles.into(),
            });
            offset += size;
        }
        Ok(partitions)
    }
}

/// Total installs the partitions will issue
pub fn coverage(partitions: &[Partition]) -> usize {
    partitions.iter().map(Partition::len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workload(n: usize) -> Vec<BundleIdentifier> {
        (1..=n).map(|i| format!("b_{}", i)).collect()
    }

    #[test]
    fn test_even_split() {
        let partitions = Partitioner::new(4).split(&workload(5000)).unwrap();
        let sizes: Vec<_> = partitions.iter().map(Partition::len).collect();
        assert_eq!(sizes, vec![1250, 1250, 1250, 1250]);
        assert_eq!(coverage(&partitions), 5000);
    }

    #[test]
    fn test_remainder_goes_to_last() {
        let partitions = Partitioner::new(3).split(&workload(5000)).unwrap();
        let sizes: Vec<_> = partitions.iter().map(Partition::len).collect();
        assert_eq!(sizes, vec![1666, 1666, 1668]);
        assert_eq!(coverage(&partitions), 5000);
    }

    #[test]
    fn test_partitions_are_contiguous_and_cover_once() {
        let items = workload(103);
        let partitions = Partitioner::new(7).split(&items).unwrap();

        let rejoined: Vec<_> = partitions
            .iter()
            .flat_map(|p| p.bundles.iter().cloned())
            .collect();
        assert_eq!(rejoined, items);
        for (i, p) in partitions.iter().enumerate() {
            assert_eq!(p.index, i);
        }
    }

    #[test]
    fn test_block_sizes_for_many_shapes() {
        for total in 1..60 {
            for workers in 1..=total {
                let sizes = Partitioner::block_sizes(total, workers).unwrap();
                assert_eq!(sizes.len(), workers);
                assert_eq!(sizes.iter().sum::<usize>(), total);
                assert!(sizes[..workers - 1].iter().all(|&s| s == total / workers));
            }
        }
    }

    #[test]
    fn test_single_worker_gets_everything() {
        let partitions = Partitioner::new(1).split(&workload(10)).unwrap();
        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].len(), 10);
    }

    #[test]
    fn test_invalid_worker_counts() {
        assert!(matches!(
            Partitioner::new(0).split(&workload(10)),
            Err(BenchError::ConfigError(_))
        ));
        assert!(matches!(
            Partitioner::new(11).split(&workload(10)),
            Err(BenchError::ConfigError(_))
        ));
        assert!(Partitioner::new(1).split(&[]).is_err());
    }

    #[test]
    fn test_oversubscribed_last_partition() {
        let items = workload(10);
        let partitions = Partitioner::new(3)
            .with_oversubscribed_last(true)
            .split(&items)
            .unwrap();

        assert_eq!(coverage(&partitions), 11);
        let last = partitions.last().unwrap();
        assert_eq!(last.len(), 5);
        assert_eq!(last.bundles.last().unwrap(), "b_1");
    }
}
