// SPDX-FileCopyrightText: 2025 xfnw
//
// SPDX-License-Identifier: MPL-2.0

use crate::{batch::Batch, parse::parse_quad};
use quadmark::{Registry, ShardPlan};
use rayon::prelude::*;
use std::{net::Ipv4Addr, num::NonZeroUsize};
use tracing::debug;

/// batches smaller than this are not worth splitting up
pub const SEQUENTIAL_THRESHOLD: usize = 1000;

/// boundaries splitting `len` items into `parts` contiguous ranges
///
/// part `i` is `bounds[i]..bounds[i + 1]`
pub fn partition(len: usize, parts: usize) -> Vec<usize> {
    (0..=parts).map(|i| len * i / parts).collect()
}

fn valid<'a>(lines: impl Iterator<Item = &'a [u8]>) -> impl Iterator<Item = Ipv4Addr> {
    lines.filter_map(|line| parse_quad(line).ok())
}

/// parse some lines, sorting the addresses by which shard they belong to
fn bucket<'a>(lines: impl Iterator<Item = &'a [u8]>, plan: &ShardPlan) -> Vec<Vec<Ipv4Addr>> {
    let mut out = vec![Vec::new(); plan.len()];
    for addr in valid(lines) {
        out[plan.shard_of(addr.octets()[0])].push(addr);
    }
    out
}

/// mark every valid address in a batch, skipping lines that do not parse
///
/// large batches get split into at least two contiguous line ranges, each
/// parsed on its own worker with the caller taking the last one. marking
/// then happens per registry shard, so no two workers ever write the same
/// word.
pub fn process(batch: &Batch, registry: &mut Registry, workers: NonZeroUsize) {
    if batch.is_empty() {
        return;
    }
    if batch.len() < SEQUENTIAL_THRESHOLD {
        for addr in valid(batch.lines()) {
            registry.mark(addr);
        }
        return;
    }

    let parts = workers.get().max(2);
    let plan = ShardPlan::new(parts);
    let bounds = partition(batch.len(), parts);
    debug!(lines = batch.len(), parts, shards = plan.len(), "splitting batch");

    let mut buckets = vec![Vec::new(); parts];
    rayon::scope(|s| {
        let plan = &plan;
        let mut jobs = buckets.iter_mut().zip(bounds.windows(2));
        let caller = jobs.next_back();
        for (out, range) in jobs {
            s.spawn(move |_| *out = bucket(batch.lines_in(range[0]..range[1]), plan));
        }
        if let Some((out, range)) = caller {
            *out = bucket(batch.lines_in(range[0]..range[1]), plan);
        }
    });

    registry
        .shards(plan.len())
        .into_par_iter()
        .enumerate()
        .for_each(|(j, mut shard)| {
            for addr in buckets.iter().flat_map(|b| &b[j]) {
                shard.mark(*addr);
            }
        });
}

#[cfg(test)]
mod tests {
    use super::{SEQUENTIAL_THRESHOLD, partition, process};
    use crate::batch::Batch;
    use quadmark::Registry;
    use std::{net::Ipv4Addr, num::NonZeroUsize};

    #[test]
    fn partition_covers() {
        assert_eq!(partition(10, 3), [0, 3, 6, 10]);
        assert_eq!(partition(1000, 2), [0, 500, 1000]);
        for (len, parts) in [(1000, 7), (1001, 16), (5, 8)] {
            let bounds = partition(len, parts);
            assert_eq!(bounds.len(), parts + 1);
            assert_eq!(bounds[0], 0);
            assert_eq!(bounds[parts], len);
            assert!(bounds.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn small_batch() {
        let batch: Batch = ["10.0.0.1", "10.0.0.1", "10.0.0.2", "nope"]
            .into_iter()
            .collect();
        let mut reg = Registry::new();
        process(&batch, &mut reg, NonZeroUsize::MIN);
        assert!(reg.contains(Ipv4Addr::new(10, 0, 0, 2)));
        assert_eq!(reg.count(), 2);
    }

    fn big_batch() -> (Batch, Vec<Ipv4Addr>) {
        let mut lines = vec![];
        let mut addrs = vec![];
        for i in 0..5000u32 {
            // spread across first octets, with plenty of shared words
            let addr = Ipv4Addr::from(i.wrapping_mul(2_654_435_761) & 0xffff_ff0f);
            lines.push(addr.to_string());
            addrs.push(addr);
            if i % 7 == 0 {
                lines.push(format!("{addr}.1"));
                lines.push("300.1.1.1".to_string());
            }
        }
        (lines.into_iter().collect(), addrs)
    }

    #[test]
    fn split_batch() {
        let (batch, addrs) = big_batch();
        assert!(batch.len() >= SEQUENTIAL_THRESHOLD);

        let mut expected = Registry::new();
        for addr in &addrs {
            expected.mark(*addr);
        }

        for workers in [1, 2, 3, 16, 300] {
            let mut reg = Registry::new();
            process(&batch, &mut reg, NonZeroUsize::new(workers).unwrap());
            for addr in &addrs {
                assert!(reg.contains(*addr));
            }
            assert_eq!(reg.count(), expected.count());
        }
    }
}
