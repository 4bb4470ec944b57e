// SPDX-FileCopyrightText: 2025 xfnw
//
// SPDX-License-Identifier: MPL-2.0

use crate::types::Error;
use std::{
    io::{self, BufRead},
    num::{NonZeroU64, NonZeroUsize},
    ops::Range,
};
use tracing::debug;

/// a chunk of raw input lines
///
/// the lines sit back to back in one buffer, with their terminators still
/// attached, and only get trimmed when looked at
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Batch {
    buf: Vec<u8>,
    ends: Vec<usize>,
}

impl Batch {
    fn with_capacity(lines: usize) -> Self {
        Self {
            buf: Vec::new(),
            ends: Vec::with_capacity(lines),
        }
    }

    /// append one line from the reader, returning false at end of input
    fn read_line(&mut self, reader: &mut impl BufRead) -> io::Result<bool> {
        if reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(false);
        }
        self.ends.push(self.buf.len());
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.ends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    /// a single line, without `\n` or `\r\n`
    ///
    /// # Panics
    ///
    /// panics if `i` is out of bounds
    pub fn line(&self, i: usize) -> &[u8] {
        let start = if i == 0 { 0 } else { self.ends[i - 1] };
        let line = &self.buf[start..self.ends[i]];
        let line = line.strip_suffix(b"\n").unwrap_or(line);
        line.strip_suffix(b"\r").unwrap_or(line)
    }

    pub fn lines(&self) -> impl Iterator<Item = &[u8]> {
        self.lines_in(0..self.len())
    }

    pub fn lines_in(&self, range: Range<usize>) -> impl Iterator<Item = &[u8]> {
        range.map(|i| self.line(i))
    }
}

impl<S: AsRef<str>> FromIterator<S> for Batch {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut batch = Self::default();
        for line in iter {
            batch.buf.extend_from_slice(line.as_ref().as_bytes());
            batch.buf.push(b'\n');
            batch.ends.push(batch.buf.len());
        }
        batch
    }
}

type ProgressHook = Box<dyn FnMut(u64) + Send>;

/// reads input into [`Batch`]es of a bounded size
pub struct LineBatcher<R> {
    reader: R,
    max_lines: NonZeroUsize,
    lines_read: u64,
    exhausted: bool,
    progress: Option<(NonZeroU64, ProgressHook)>,
}

impl<R: BufRead> LineBatcher<R> {
    pub fn new(reader: R, max_lines: NonZeroUsize) -> Self {
        Self {
            reader,
            max_lines,
            lines_read: 0,
            exhausted: false,
            progress: None,
        }
    }

    /// call `report` with the running line count every `every` lines
    #[must_use]
    pub fn with_progress(mut self, every: NonZeroU64, report: impl FnMut(u64) + Send + 'static) -> Self {
        self.progress = Some((every, Box::new(report)));
        self
    }

    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    /// whether the reader has hit end of input
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// read until the batch is full or the input runs out
    ///
    /// the returned batch is handed over whole, the next call starts filling
    /// a fresh one. once exhausted this only returns empty batches.
    pub fn next_batch(&mut self) -> Result<Batch, Error> {
        let mut batch = Batch::with_capacity(self.max_lines.get().min(1 << 20));
        while !self.exhausted && batch.len() < self.max_lines.get() {
            if !batch
                .read_line(&mut self.reader)
                .map_err(Error::InputRead)?
            {
                self.exhausted = true;
                break;
            }
            self.lines_read += 1;
            if let Some((every, report)) = &mut self.progress
                && self.lines_read % every.get() == 0
            {
                report(self.lines_read);
            }
        }
        debug!(
            lines = batch.len(),
            total = self.lines_read,
            exhausted = self.exhausted,
            "batch ready"
        );
        Ok(batch)
    }
}
