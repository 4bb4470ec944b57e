// SPDX-FileCopyrightText: 2025 xfnw
//
// SPDX-License-Identifier: MIT

//! a presence bitmap for the whole ipv4 address space
//!
//! there is one bit for every address, found by using the first three octets
//! to pick a [`BitGroup`] and the last octet to pick a bit inside it. the
//! memory cost is fixed at 512 MiB no matter how many addresses get marked,
//! and bits are only ever set, never cleared.
//!
//! ```rust,no_run
//! use quadmark::Registry;
//! use std::net::Ipv4Addr;
//!
//! let mut reg = Registry::new();
//! reg.mark(Ipv4Addr::new(10, 0, 0, 1));
//! reg.mark(Ipv4Addr::new(10, 0, 0, 1));
//! assert_eq!(reg.count(), 1);
//! ```

use rayon::prelude::*;
use std::{fmt, net::Ipv4Addr, ops::Range};

/// how many bits a [`BitGroup`] holds, one per possible last octet
pub const GROUP_BITS: usize = 256;

const WORD_BITS: usize = u64::BITS as usize;
const GROUP_WORDS: usize = GROUP_BITS / WORD_BITS;
/// groups sharing one first octet
const PLANE_GROUPS: usize = 1 << 16;
const PLANES: usize = 256;

/// the bits for every last octet behind a single `a.b.c` prefix
pub type BitGroup = [u64; GROUP_WORDS];

/// turn a bit position inside a [`BitGroup`] into the word holding it and
/// the mask selecting it
#[must_use]
pub fn bit_position(pos: u8) -> (usize, u64) {
    let pos = usize::from(pos);
    (pos / WORD_BITS, 1 << (pos % WORD_BITS))
}

fn group_index(o0: u8, o1: u8, o2: u8) -> usize {
    usize::from(o0) << 16 | usize::from(o1) << 8 | usize::from(o2)
}

fn set_bit(group: &mut BitGroup, pos: u8) -> bool {
    let (word, mask) = bit_position(pos);
    let fresh = group[word] & mask == 0;
    group[word] |= mask;
    fresh
}

/// the bitmap itself, indexed like a `[256][256][256]` array of [`BitGroup`]s
pub struct Registry {
    groups: Box<[BitGroup]>,
}

impl Registry {
    /// allocate a registry with every bit unset
    #[must_use]
    pub fn new() -> Self {
        Self {
            groups: vec![[0; GROUP_WORDS]; PLANES * PLANE_GROUPS].into_boxed_slice(),
        }
    }

    /// set the bit for an address
    ///
    /// returns true if the address had not been marked before
    pub fn mark(&mut self, addr: Ipv4Addr) -> bool {
        let [o0, o1, o2, o3] = addr.octets();
        set_bit(&mut self.groups[group_index(o0, o1, o2)], o3)
    }

    /// check if an address has been marked
    #[must_use]
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let [o0, o1, o2, o3] = addr.octets();
        let (word, mask) = bit_position(o3);
        self.groups[group_index(o0, o1, o2)][word] & mask != 0
    }

    /// the bit group behind the prefix `o0.o1.o2`
    #[must_use]
    pub fn group(&self, o0: u8, o1: u8, o2: u8) -> &BitGroup {
        &self.groups[group_index(o0, o1, o2)]
    }

    /// count every set bit, which is the number of distinct addresses marked
    ///
    /// every word gets visited exactly once, with the planes summed in
    /// parallel
    #[must_use]
    pub fn count(&self) -> u64 {
        self.groups
            .par_chunks(PLANE_GROUPS)
            .map(|plane| {
                plane
                    .iter()
                    .flatten()
                    .map(|word| u64::from(word.count_ones()))
                    .sum::<u64>()
            })
            .sum()
    }

    /// split the registry into disjoint [`Shard`]s along the first octet
    ///
    /// `n` gets clamped to `1..=256`, see [`ShardPlan`] for where the
    /// boundaries land. since each shard holds its own exclusive borrow, two
    /// shards can never touch the same word.
    pub fn shards(&mut self, n: usize) -> Vec<Shard<'_>> {
        let plan = ShardPlan::new(n);
        let mut rest: &mut [BitGroup] = &mut self.groups;
        let mut out = Vec::with_capacity(plan.len());
        for range in plan.ranges() {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(range.len() * PLANE_GROUPS);
            rest = tail;
            out.push(Shard {
                octets: range,
                groups: head,
            });
        }
        out
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("groups", &self.groups.len())
            .finish_non_exhaustive()
    }
}

/// where the first octets get split when sharding a [`Registry`]
///
/// shard `j` of `n` owns first octets `256*j/n .. 256*(j+1)/n`, so every
/// octet belongs to exactly one shard and no shard is empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardPlan {
    bounds: Vec<usize>,
    lookup: [u8; PLANES],
}

impl ShardPlan {
    /// plan `n` shards, clamped to `1..=256`
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(n: usize) -> Self {
        let n = n.clamp(1, PLANES);
        let bounds: Vec<usize> = (0..=n).map(|j| PLANES * j / n).collect();
        let mut lookup = [0; PLANES];
        for (j, pair) in bounds.windows(2).enumerate() {
            // j < 256 after the clamp
            lookup[pair[0]..pair[1]].fill(j as u8);
        }
        Self { bounds, lookup }
    }

    /// number of shards
    #[must_use]
    pub fn len(&self) -> usize {
        self.bounds.len() - 1
    }

    /// always false, a plan has at least one shard
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// index of the shard owning a first octet
    #[must_use]
    pub fn shard_of(&self, o0: u8) -> usize {
        usize::from(self.lookup[usize::from(o0)])
    }

    /// the first octets owned by each shard, in order
    pub fn ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.bounds.windows(2).map(|pair| pair[0]..pair[1])
    }
}

/// an exclusive slice of a [`Registry`] covering a range of first octets
pub struct Shard<'a> {
    octets: Range<usize>,
    groups: &'a mut [BitGroup],
}

impl Shard<'_> {
    /// the first octets this shard owns
    #[must_use]
    pub fn octets(&self) -> Range<usize> {
        self.octets.clone()
    }

    /// set the bit for an address, returning true if it was unset
    ///
    /// # Panics
    ///
    /// panics if the first octet is outside of [`Shard::octets`]
    pub fn mark(&mut self, addr: Ipv4Addr) -> bool {
        let [o0, o1, o2, o3] = addr.octets();
        assert!(
            self.octets.contains(&usize::from(o0)),
            "{addr} does not belong to shard {:?}",
            self.octets
        );
        let index = group_index(o0, o1, o2) - self.octets.start * PLANE_GROUPS;
        set_bit(&mut self.groups[index], o3)
    }
}

impl fmt::Debug for Shard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shard")
            .field("octets", &self.octets)
            .finish_non_exhaustive()
    }
}
