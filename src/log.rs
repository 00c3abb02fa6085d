//! Leveled diagnostic sink with per-level counters.
//!
//! The patch engine reports every recoverable condition through a [`Logger`]
//! rather than failing the merge. Counters let the caller decide afterwards
//! whether the merged output is trustworthy ([`Logger::has_errors`]).
//!
//! Messages carry a [`LogContext`] prefix naming the item kind, its
//! identifier, and (when retargeted) the resolved target, so every message is
//! self-locating without extra plumbing at the call sites. Emission goes
//! through the `tracing` macros; install a subscriber (see `main`) to get
//! them on stderr.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

// ---------------------------------------------------------------------------
// Level
// ---------------------------------------------------------------------------

/// Diagnostic severity, ordered from least to most severe.
///
/// `None` is a threshold-only value meaning "emit nothing"; messages are
/// never logged at `None`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    None,
}

impl Level {
    const COUNTED: usize = 5;

    fn index(self) -> Option<usize> {
        match self {
            Self::Debug => Some(0),
            Self::Info => Some(1),
            Self::Warn => Some(2),
            Self::Error => Some(3),
            Self::Fatal => Some(4),
            Self::None => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
            Self::None => "none",
        };
        f.write_str(s)
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "fatal" => Ok(Self::Fatal),
            "none" | "quiet" => Ok(Self::None),
            other => Err(format!("unknown log level `{other}`")),
        }
    }
}

// ---------------------------------------------------------------------------
// LogContext
// ---------------------------------------------------------------------------

/// Self-locating message prefix, built up as the engine descends from the
/// container into classes and their members.
///
/// Contexts are explicit values passed down the call tree — never shared
/// mutable state. Each nesting level appends one `kind 'identifier'` segment;
/// a retargeted item additionally names its resolved target.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogContext {
    segments: Vec<String>,
}

impl LogContext {
    /// The empty root context.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Child context for an item of the given kind.
    #[must_use]
    pub fn item(&self, kind: &str, id: impl fmt::Display) -> Self {
        let mut segments = self.segments.clone();
        segments.push(format!("{kind} '{id}'"));
        Self { segments }
    }

    /// Same context with the resolved target appended to the last segment.
    #[must_use]
    pub fn with_target(&self, target: impl fmt::Display) -> Self {
        let mut segments = self.segments.clone();
        if let Some(last) = segments.last_mut() {
            last.push_str(&format!(" (target '{target}')"));
        }
        Self { segments }
    }

    /// Render the prefix, ending with `": "` when non-empty.
    #[must_use]
    pub fn prefix(&self) -> String {
        if self.segments.is_empty() {
            String::new()
        } else {
            let mut s = self.segments.join(": ");
            s.push_str(": ");
            s
        }
    }
}

// ---------------------------------------------------------------------------
// Logger
// ---------------------------------------------------------------------------

/// Message sink with per-level counters and an emission threshold.
///
/// Counting is unconditional — a message below the threshold is still
/// counted, so `error_count` reflects every problem the merge encountered
/// even in quiet mode.
#[derive(Debug)]
pub struct Logger {
    threshold: Level,
    counts: [usize; Level::COUNTED],
}

impl Logger {
    /// Create a logger that emits messages at `threshold` and above.
    #[must_use]
    pub fn new(threshold: Level) -> Self {
        Self {
            threshold,
            counts: [0; Level::COUNTED],
        }
    }

    /// Log one message. Counts always; emits via `tracing` when at or above
    /// the threshold.
    pub fn log(&mut self, level: Level, ctx: &LogContext, message: &str) {
        let Some(idx) = level.index() else {
            return;
        };
        self.counts[idx] += 1;
        if level < self.threshold {
            return;
        }
        let text = format!("{}{message}", ctx.prefix());
        match level {
            Level::Debug => tracing::debug!("{text}"),
            Level::Info => tracing::info!("{text}"),
            Level::Warn => tracing::warn!("{text}"),
            Level::Error => tracing::error!("{text}"),
            Level::Fatal => tracing::error!("fatal: {text}"),
            Level::None => {}
        }
    }

    /// Messages logged at exactly `level`.
    #[must_use]
    pub fn count(&self, level: Level) -> usize {
        level.index().map_or(0, |i| self.counts[i])
    }

    /// Total error + fatal messages.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.count(Level::Error) + self.count(Level::Fatal)
    }

    /// Returns `true` if any error or fatal message was logged.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(Level::Info)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
