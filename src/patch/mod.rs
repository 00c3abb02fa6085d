//! Declarative patch merging.
//!
//! A patch is an ordinary class collection whose items carry directive
//! annotations describing how each item relates to the source collection:
//! add it, edit a source item, replace it wholesale, remove it, splice into
//! a method's instruction stream, or ignore it. [`patch_classes`] merges one
//! patch collection into one source collection and returns the result.
//!
//! The heavy lifting lives in [`engine`], which is generic over an item
//! kind; [`class`], [`field`], and [`method`] specialize it, with [`member`]
//! holding the logic the two member kinds share. [`action`] owns the
//! directive vocabulary and parser, [`pool`] the ordering-preserving item
//! container.

pub mod action;
pub mod class;
pub mod engine;
pub mod field;
pub mod member;
pub mod method;
pub mod pool;

pub use action::{Action, PatchDirective};
pub use class::ClassPatcher;
pub use engine::{Patcher, PatchKind};

use crate::error::PatchError;
use crate::log::{Level, LogContext, Logger};
use crate::model::DexClass;

/// Merge one patch class collection into one source class collection.
///
/// Recoverable patch-authoring errors are logged through `logger` and the
/// affected items skipped; callers decide afterwards (via
/// [`Logger::has_errors`]) whether the merged output is usable. `strip`
/// removes the recognized directive annotations from every produced item.
///
/// # Errors
/// Only fatal invariant breaches abort with `Err`.
pub fn patch_classes(
    logger: &mut Logger,
    sources: Vec<DexClass>,
    patches: &[DexClass],
    strip: bool,
) -> Result<Vec<DexClass>, PatchError> {
    let source_count = sources.len();
    let patch_count = patches.len();
    let merged = Patcher::new(ClassPatcher::new(strip)).process(
        logger,
        &LogContext::root(),
        sources,
        patches,
    )?;
    logger.log(
        Level::Info,
        &LogContext::root(),
        &format!(
            "merged {patch_count} patch types into {source_count} source types, producing {}",
            merged.len()
        ),
    );
    Ok(merged)
}
