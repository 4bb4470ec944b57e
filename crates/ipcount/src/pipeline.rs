// SPDX-FileCopyrightText: 2025 xfnw
//
// SPDX-License-Identifier: MPL-2.0

use crate::{
    batch::LineBatcher,
    process::process,
    types::{Config, Error, Summary},
};
use quadmark::Registry;
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};
use tracing::debug;

const READ_BUFFER: usize = 1 << 20;

/// count the distinct addresses in a file
pub fn count_file(
    path: &Path,
    config: &Config,
    progress: impl FnMut(u64) + Send + 'static,
) -> Result<Summary, Error> {
    let file = File::open(path).map_err(Error::InputOpen)?;
    count_unique(BufReader::with_capacity(READ_BUFFER, file), config, progress)
}

/// count the distinct addresses in some input, one per line
///
/// while a batch is being processed the next one is already being read,
/// with at most one batch in flight. `progress` gets the running line count
/// as described by [`Config::progress_every`].
pub fn count_unique<R: BufRead + Send>(
    input: R,
    config: &Config,
    progress: impl FnMut(u64) + Send + 'static,
) -> Result<Summary, Error> {
    let mut lines = LineBatcher::new(input, config.batch_size);
    if let Some(every) = config.progress_every {
        lines = lines.with_progress(every, progress);
    }
    let mut registry = Registry::new();

    debug!(?config, "reading");
    let mut batch = lines.next_batch()?;
    while !lines.is_exhausted() {
        let (next, ()) = rayon::join(
            || lines.next_batch(),
            || process(&batch, &mut registry, config.workers),
        );
        batch = next?;
    }

    debug!(lines = batch.len(), "draining");
    process(&batch, &mut registry, config.workers);

    debug!("reducing");
    let unique = registry.count();
    Ok(Summary {
        lines: lines.lines_read(),
        unique,
    })
}

#[cfg(test)]
mod tests {
    use super::{count_file, count_unique};
    use crate::types::{Config, Error, Summary};
    use std::{io::Cursor, num::NonZeroUsize, path::Path};

    fn count_with(lines: &[&str], batch_size: usize) -> Summary {
        let config = Config {
            batch_size: NonZeroUsize::new(batch_size).unwrap(),
            workers: NonZeroUsize::new(3).unwrap(),
            progress_every: None,
        };
        let input = lines.iter().flat_map(|l| [*l, "\n"]).collect::<String>();
        count_unique(Cursor::new(input), &config, |_| ()).unwrap()
    }

    fn count(lines: &[&str]) -> u64 {
        count_with(lines, 1_000_000).unique
    }

    #[test]
    fn scenarios() {
        assert_eq!(count(&["10.0.0.1", "10.0.0.1", "10.0.0.2"]), 2);
        assert_eq!(count(&["1.2.3.4", "1.2.3.4.5", "bad"]), 1);
        assert_eq!(count(&[]), 0);
        assert_eq!(count(&["abc", "1.2.3", "1.2.3.400", "256.0.0.0", "-1.0.0.0"]), 0);
        assert_eq!(count(&["0.0.0.0", "255.255.255.255"]), 2);

        let block: Vec<_> = (0..=255).map(|o3| format!("0.0.0.{o3}")).collect();
        let block: Vec<_> = block.iter().map(String::as_str).collect();
        assert_eq!(count(&block), 256);
    }

    #[test]
    fn line_totals() {
        let summary = count_with(&["1.1.1.1", "", "junk", "1.1.1.1"], 3);
        assert_eq!(summary, Summary { lines: 4, unique: 1 });
    }

    fn generated() -> Vec<String> {
        (0..3000u32)
            .map(|i| match i % 5 {
                0 => "not an address".to_string(),
                1 => format!("10.{}.{}.{}", i % 3, i % 251, i % 97),
                _ => std::net::Ipv4Addr::from(i.wrapping_mul(0x9e37_79b9) % 7919).to_string(),
            })
            .collect()
    }

    #[test]
    fn order_independent() {
        let forward = generated();
        let mut backward = forward.clone();
        backward.reverse();
        let mut shuffled = forward.clone();
        shuffled.rotate_left(1234);

        let counts: Vec<_> = [forward, backward, shuffled]
            .iter()
            .map(|lines| count(&lines.iter().map(String::as_str).collect::<Vec<_>>()))
            .collect();
        assert!(counts[0] > 0);
        assert_eq!(counts[0], counts[1]);
        assert_eq!(counts[0], counts[2]);
    }

    #[test]
    fn batch_size_independent() {
        let lines = generated();
        let lines: Vec<_> = lines.iter().map(String::as_str).collect();
        let counts: Vec<_> = [1, 10, 999, 1000, 100_000]
            .into_iter()
            .map(|size| count_with(&lines, size))
            .collect();
        for summary in &counts {
            assert_eq!(*summary, counts[0]);
        }
        assert_eq!(counts[0].lines, 3000);
    }

    #[test]
    fn missing_file() {
        let res = count_file(
            Path::new("/nonexistent/ipcount/input"),
            &Config::default(),
            |_| (),
        );
        assert!(matches!(res, Err(Error::InputOpen(_))));
    }
}
