// SPDX-FileCopyrightText: 2025 xfnw
//
// SPDX-License-Identifier: MPL-2.0

use std::num::{NonZeroU64, NonZeroUsize};

#[derive(Debug, foxerror::FoxError)]
pub enum Error {
    /// could not open input file
    InputOpen(std::io::Error),
    /// could not read input
    InputRead(std::io::Error),
}

const BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(1_000_000).unwrap();
const PROGRESS_EVERY: NonZeroU64 = NonZeroU64::new(100_000_000).unwrap();

/// knobs for a single counting run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// most lines collected into one batch
    pub batch_size: NonZeroUsize,
    /// how many parts a large batch gets split into
    pub workers: NonZeroUsize,
    /// report progress whenever the line count is a multiple of this
    pub progress_every: Option<NonZeroU64>,
}

impl Config {
    /// one worker per cpu, minus one left for reading, but never less than 2
    pub fn default_workers() -> NonZeroUsize {
        let cpus = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
        NonZeroUsize::new(cpus.saturating_sub(1).max(2)).unwrap_or(NonZeroUsize::MIN)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_size: BATCH_SIZE,
            workers: Self::default_workers(),
            progress_every: Some(PROGRESS_EVERY),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    /// every line read, including the ones that did not parse
    pub lines: u64,
    /// distinct addresses seen
    pub unique: u64,
}

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.batch_size.get(), 1_000_000);
    assert_eq!(config.progress_every.map(NonZeroU64::get), Some(100_000_000));
    assert!(config.workers.get() >= 2);
}
