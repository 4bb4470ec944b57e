// SPDX-FileCopyrightText: 2025 xfnw
//
// SPDX-License-Identifier: MPL-2.0

use argh::{FromArgs, from_env};
use std::{
    num::{NonZeroU64, NonZeroUsize},
    path::PathBuf,
    process::ExitCode,
    time::Instant,
};
use tracing::{Level, error};

mod batch;
mod parse;
mod pipeline;
mod process;
mod types;

/// count the distinct ipv4 addresses in a file with one address per line
#[derive(Debug, FromArgs)]
#[argh(help_triggers("-h", "--help"))]
struct Opt {
    /// lines read per batch (default 1000000)
    #[argh(option, short = 'b')]
    batch_size: Option<NonZeroUsize>,
    /// workers per batch (default one less than the cpu count, at least 2)
    #[argh(option, short = 'j')]
    jobs: Option<NonZeroUsize>,
    /// print progress every this many lines, 0 to turn off (default 100000000)
    #[argh(option, short = 'p')]
    progress_every: Option<u64>,
    /// log what is going on to stderr
    #[argh(switch, short = 'v')]
    verbose: bool,
    #[argh(positional)]
    file: PathBuf,
}

fn scanned(lines: u64) -> String {
    if lines % 1_000_000 == 0 && lines > 0 {
        format!("{} Million", lines / 1_000_000)
    } else {
        lines.to_string()
    }
}

fn main() -> ExitCode {
    let opt: Opt = from_env();

    let level = if opt.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mut config = types::Config::default();
    if let Some(batch_size) = opt.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(jobs) = opt.jobs {
        config.workers = jobs;
    }
    if let Some(every) = opt.progress_every {
        config.progress_every = NonZeroU64::new(every);
    }

    let start = Instant::now();
    let summary = match pipeline::count_file(&opt.file, &config, |lines| {
        println!("Lines Scanned: {}", scanned(lines));
    }) {
        Ok(summary) => summary,
        Err(e) => {
            error!(file = %opt.file.display(), "giving up");
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    println!("Lines Scanned: {}", summary.lines);
    println!("Total Unique IPs: {}", summary.unique);
    println!("Elapsed Time: {:?}", start.elapsed());
    ExitCode::SUCCESS
}

#[test]
fn scanned_format() {
    assert_eq!(scanned(100_000_000), "100 Million");
    assert_eq!(scanned(4), "4");
    assert_eq!(scanned(0), "0");
}
