//! Command-line front end.
//!
//! One source container, one or more patch containers, applied in order:
//! each merge's output is the next merge's source. Without `--output` the
//! run is a dry run — the merge executes fully and all diagnostics are
//! produced, but nothing is written.
//!
//! Exit codes: `0` clean merge, `1` merge completed with per-item errors
//! (nothing written), `2` fatal error.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;

use crate::config::BytepatchConfig;
use crate::container::{read_container, write_container, Container};
use crate::log::{Level, Logger};
use crate::patch::patch_classes;

/// Declarative class-container patcher
///
/// Merges patch containers into a source container. Each class in a patch
/// carries an annotation directive describing how it relates to the source:
/// add, edit, replace, remove, ignore, or splice into a method. Untagged
/// classes are added.
#[derive(Parser)]
#[command(name = "bytepatch")]
#[command(version, about)]
pub struct Cli {
    /// Source container file
    pub source: PathBuf,

    /// Patch container files, applied in order
    #[arg(required = true)]
    pub patches: Vec<PathBuf>,

    /// Write the merged container here; omit for a dry run
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Increase diagnostic verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Decrease diagnostic verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Keep directive annotations in the output
    #[arg(long)]
    pub keep_directives: bool,

    /// Configuration file
    #[arg(long, env = "BYTEPATCH_CONFIG", default_value = "bytepatch.toml")]
    pub config: PathBuf,
}

impl Cli {
    /// Effective diagnostic threshold: the config baseline shifted by the
    /// verbosity flags.
    #[must_use]
    pub fn threshold(&self, base: Level) -> Level {
        const LADDER: [Level; 6] = [
            Level::Debug,
            Level::Info,
            Level::Warn,
            Level::Error,
            Level::Fatal,
            Level::None,
        ];
        let start = LADDER.iter().position(|l| *l == base).unwrap_or(2);
        let idx = start
            .saturating_sub(self.verbose as usize)
            .saturating_add(self.quiet as usize)
            .min(LADDER.len() - 1);
        LADDER[idx]
    }
}

/// Run a parsed invocation, returning the process exit code.
///
/// # Errors
/// Fails on configuration, container I/O, or fatal merge errors; per-item
/// merge errors are reported through the logger and reflected in the exit
/// code instead.
pub fn run(cli: &Cli) -> Result<u8> {
    let config = BytepatchConfig::load(&cli.config)?;
    let threshold = cli.threshold(config.log.level);
    let strip = config.output.strip_directives && !cli.keep_directives;

    let mut logger = Logger::new(threshold);
    let mut classes = read_container(&cli.source)
        .with_context(|| format!("reading source container {}", cli.source.display()))?
        .classes;

    for patch_path in &cli.patches {
        let patch = read_container(patch_path)
            .with_context(|| format!("reading patch container {}", patch_path.display()))?;
        classes = patch_classes(&mut logger, classes, &patch.classes, strip)
            .context("merge aborted")?;
    }

    if logger.has_errors() {
        tracing::error!(
            "merge completed with {} error(s); output not written",
            logger.error_count()
        );
        return Ok(1);
    }

    match &cli.output {
        Some(path) => {
            write_container(path, &Container::new(classes))
                .with_context(|| format!("writing output container {}", path.display()))?;
        }
        None => tracing::info!("dry run: no output path given, nothing written"),
    }
    Ok(0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
