//! # Operator script interpreter module
//!
//! This module provides an interpreter for operator scripts, allowing the operator events
//! (selections, destinations, quit) of a tracking run to be replayed from a file.
//!
//! A script is a list of lines of the form `<time_s>: <telecommand json>;`, for example
//!
//! ```text
//! 0.5: {"type": "SelectionCommit", "payload": {"x0": 10, "y0": 20, "x1": 60, "y1": 80}};
//! 2.0: {"type": "Destination", "payload": {"x": 320, "y": 400}};
//! 60.0: {"type": "Quit"};
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use regex::{Regex, RegexBuilder};
use std::{collections::VecDeque, fs, path::Path};
use thiserror::Error;

use crate::session::get_elapsed_seconds;
use comms_if::tc::{Tc, TcParseError};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// One scripted entry: a decimal time, a colon, then the JSON up to the terminating `;`.
const ENTRY_PATTERN: &str = r"^\s*(\d+(?:\.\d+)?)\s*:\s*([^;]*);";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct TimedTc {
    at_s: f64,
    tc: Tc
}

/// Replays a script of timed telecommands against the session clock.
///
/// Poll [`ScriptInterpreter::get_pending_tcs`] once per cycle.
#[derive(Debug)]
pub struct ScriptInterpreter {
    queue: VecDeque<TimedTc>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("No script at {0:?}")]
    ScriptNotFound(std::path::PathBuf),

    #[error("Could not read the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("The script contains no telecommands")]
    ScriptEmpty,

    #[error("Invalid script time {0:?}, expected seconds such as 1.5")]
    InvalidTimestamp(String),

    #[error("Invalid TC at {0} s: {1}")]
    InvalidTc(f64, TcParseError),

    #[error("Script pattern failed to compile: {0}")]
    PatternError(regex::Error)
}

/// What the script has for the current cycle.
#[derive(Debug)]
pub enum PendingTcs {
    None,
    Some(Vec<Tc>),
    EndOfScript
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ScriptInterpreter {
    /// Load and parse the script at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ScriptError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ScriptError::ScriptNotFound(path.to_path_buf()));
        }

        let text = fs::read_to_string(path).map_err(ScriptError::ScriptLoadError)?;

        Ok(Self {
            queue: Self::parse(&text)?
        })
    }

    /// Parse script text into a queue ordered by execution time.
    ///
    /// Entries with equal times keep their order in the script.
    fn parse(text: &str) -> Result<VecDeque<TimedTc>, ScriptError> {
        let re: Regex = RegexBuilder::new(ENTRY_PATTERN)
            .multi_line(true)
            .build()
            .map_err(ScriptError::PatternError)?;

        let mut entries = re
            .captures_iter(text)
            .map(|cap| {
                let at_s: f64 = cap[1]
                    .parse()
                    .map_err(|_| ScriptError::InvalidTimestamp(cap[1].to_string()))?;
                let tc = Tc::from_json(&cap[2]).map_err(|e| ScriptError::InvalidTc(at_s, e))?;

                Ok(TimedTc { at_s, tc })
            })
            .collect::<Result<Vec<_>, ScriptError>>()?;

        if entries.is_empty() {
            return Err(ScriptError::ScriptEmpty);
        }

        entries.sort_by(|a, b| a.at_s.partial_cmp(&b.at_s).unwrap_or(std::cmp::Ordering::Equal));

        Ok(entries.into())
    }

    /// TCs due at the current session time.
    pub fn get_pending_tcs(&mut self) -> PendingTcs {
        self.get_pending_tcs_at(get_elapsed_seconds())
    }

    /// Pop every TC scheduled strictly before `now_s`.
    pub fn get_pending_tcs_at(&mut self, now_s: f64) -> PendingTcs {
        if self.queue.is_empty() {
            return PendingTcs::EndOfScript;
        }

        let due = self.queue.iter().take_while(|t| t.at_s < now_s).count();

        match due {
            0 => PendingTcs::None,
            n => PendingTcs::Some(self.queue.drain(..n).map(|t| t.tc).collect())
        }
    }

    /// Number of TCs not yet handed out.
    pub fn get_num_tcs(&self) -> usize {
        self.queue.len()
    }

    /// Time of the last TC in the script.
    pub fn get_duration(&self) -> f64 {
        self.queue.back().map(|t| t.at_s).unwrap_or(0.0)
    }
}
