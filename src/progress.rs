// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Console progress feedback

use std::io::Write;

/// How much per-item feedback to print
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    Silent,
    /// One character per item, newline every [`DOTS_PER_LINE`] items
    #[default]
    Dots,
    /// Whole record or error report per item
    Full,
}

pub const DOTS_PER_LINE: usize = 100;

impl From<u8> for Verbosity {
    fn from(level: u8) -> Self {
        match level {
            0 => Verbosity::Silent,
            1 => Verbosity::Dots,
            _ => Verbosity::Full,
        }
    }
}

/// Writes progress to a sink, dropping write errors.
pub struct Progress<W: Write> {
    out: W,
    verbosity: Verbosity,
}

impl<W: Write> Progress<W> {
    pub fn new(out: W, verbosity: Verbosity) -> Self {
        Self { out, verbosity }
    }

    /// Per-item mark for input number `index` (0-based): `mark` in dots mode,
    /// `detail()` in full mode.
    pub fn item<F: FnOnce() -> String>(&mut self, index: usize, mark: char, detail: F) {
        match self.verbosity {
            Verbosity::Silent => {}
            Verbosity::Dots => {
                let _ = write!(self.out, "{}", mark);
                if (index + 1) % DOTS_PER_LINE == 0 {
                    let _ = writeln!(self.out);
                }
                let _ = self.out.flush();
            }
            Verbosity::Full => {
                let _ = writeln!(self.out, "{}", detail());
            }
        }
    }

    /// Line printed when verbosity is at least `min`.
    pub fn line<F: FnOnce() -> String>(&mut self, min: Verbosity, message: F) {
        if self.verbosity >= min {
            let _ = writeln!(self.out, "{}", message());
        }
    }

    pub fn finish(&mut self) {
        if self.verbosity == Verbosity::Dots {
            let _ = writeln!(self.out);
        }
        let _ = self.out.flush();
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
