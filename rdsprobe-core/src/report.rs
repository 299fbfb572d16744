//! Console report.
//!
//! All user-facing output goes through [`Reporter`], which writes plain
//! lines to any `Write` sink (stdout in the binary, a buffer in tests).

use crate::{ProbeError, Result};
use std::fmt::Display;
use std::io::{self, Stdout, Write};

/// Marker printed in front of the final success line
pub const SUCCESS_MARKER: &str = "\u{2705}";
/// Marker printed in front of the final failure line
pub const FAILURE_MARKER: &str = "\u{274c}";

/// Line-oriented writer for the probe report.
#[derive(Debug)]
pub struct Reporter<W: Write> {
    out: W,
}

impl Reporter<Stdout> {
    /// Reporter writing to the process stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Reporter<W> {
    /// Wraps a sink.
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    /// Writes one line.
    ///
    /// # Errors
    /// Returns an I/O error if the sink rejects the write.
    pub fn line(&mut self, text: impl Display) -> Result<()> {
        writeln!(self.out, "{text}").map_err(|e| ProbeError::io("Failed to write report", e))
    }

    /// Writes a line preceded by an empty line.
    ///
    /// # Errors
    /// Returns an I/O error if the sink rejects the write.
    pub fn section(&mut self, text: impl Display) -> Result<()> {
        self.line(format_args!("\n{text}"))
    }

    /// Writes an indented list entry.
    ///
    /// # Errors
    /// Returns an I/O error if the sink rejects the write.
    pub fn item(&mut self, text: impl Display) -> Result<()> {
        self.line(format_args!("  - {text}"))
    }

    /// Writes a numbered list starting at 1.
    ///
    /// # Errors
    /// Returns an I/O error if the sink rejects the write.
    pub fn numbered(&mut self, steps: &[&str]) -> Result<()> {
        for (number, step) in (1..).zip(steps) {
            self.line(format_args!("{number}. {step}"))?;
        }
        Ok(())
    }

    /// Writes the success banner.
    ///
    /// # Errors
    /// Returns an I/O error if the sink rejects the write.
    pub fn success(&mut self, text: impl Display) -> Result<()> {
        self.section(format_args!("{SUCCESS_MARKER} {text}"))
    }

    /// Writes the failure banner.
    ///
    /// # Errors
    /// Returns an I/O error if the sink rejects the write.
    pub fn failure(&mut self, text: impl Display) -> Result<()> {
        self.section(format_args!("{FAILURE_MARKER} {text}"))
    }

    /// Writes each hint on its own line.
    ///
    /// # Errors
    /// Returns an I/O error if the sink rejects the write.
    pub fn hints(&mut self, hints: &[&str]) -> Result<()> {
        for hint in hints {
            self.line(hint)?;
        }
        Ok(())
    }

    /// Flushes and returns the sink.
    ///
    /// # Errors
    /// Returns an I/O error if the flush fails.
    pub fn into_inner(mut self) -> Result<W> {
        self.out
            .flush()
            .map_err(|e| ProbeError::io("Failed to flush report", e))?;
        Ok(self.out)
    }
}
