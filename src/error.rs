//! Unified error type for the patch engine.
//!
//! Two disjoint failure classes flow through [`PatchError`]:
//!
//! - **Patch-authoring errors** (everything except `Invariant`): recoverable
//!   at single-item granularity. The engine logs them at `error` severity and
//!   moves on to the next patch item; the merge still completes.
//! - **Handler-contract breaches** ([`PatchError::Invariant`]): a kind
//!   specialization violated the engine's contract. These abort the merge —
//!   no partial output is produced.

use thiserror::Error;

use crate::model::ItemId;
use crate::patch::action::Action;

/// Errors raised while applying a single patch item, plus the fatal
/// invariant-breach variant.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PatchError {
    /// Two source items carry the same identifier.
    #[error("duplicate item `{id}`")]
    DuplicateItem {
        /// The colliding identifier.
        id: ItemId,
    },

    /// An item carries more than one recognized directive annotation.
    #[error("conflicting directives `{first}` and `{second}`")]
    ConflictingDirectives {
        /// Simple name of the first directive found.
        first: String,
        /// Simple name of the second directive found.
        second: String,
    },

    /// A directive carries an element the parser does not recognize.
    #[error("unknown element `{element}` on directive `{directive}`")]
    UnknownElement {
        /// Simple name of the directive.
        directive: String,
        /// The unrecognized element name.
        element: String,
    },

    /// A directive element holds a value of the wrong type.
    #[error("element `{element}` on directive `{directive}`: expected {expected}, found {found}")]
    ElementType {
        directive: String,
        element: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Two directive elements cannot be combined.
    #[error("elements `{first}` and `{second}` are mutually exclusive")]
    ExclusiveElements {
        first: &'static str,
        second: &'static str,
    },

    /// A directive element is not applicable to this item kind.
    #[error("element `{element}` is not applicable to {kind} items")]
    InapplicableElement {
        element: &'static str,
        kind: &'static str,
    },

    /// A directive element holds a value that failed validation.
    #[error("element `{element}`: {detail}")]
    InvalidElement { element: &'static str, detail: String },

    /// The resolved target identifier is absent from the source set.
    #[error("target `{id}` not found")]
    TargetNotFound {
        /// The identifier that could not be resolved.
        id: ItemId,
    },

    /// A second patch item claimed an already-claimed target.
    #[error("target `{id}` already targeted")]
    AlreadyTargeted { id: ItemId },

    /// Two produced items resolved to the same output identifier.
    #[error("item `{id}` already injected")]
    AlreadyInjected { id: ItemId },

    /// A produced item's identifier collides with an untargeted source item.
    #[error("item `{id}` already exists")]
    AlreadyExists { id: ItemId },

    /// The resolved action is not valid for this item kind.
    #[error("invalid action `{action}` for {kind} items")]
    UnsupportedAction { action: Action, kind: &'static str },

    /// No explicit action and no resolvable default for this item.
    #[error("no action defined for {kind} `{id}`")]
    NoActionDefined { kind: &'static str, id: ItemId },

    /// A kind-specific per-item rejection (e.g. replacing a field, splicing
    /// into a constructor).
    #[error("{detail}")]
    Rejected { detail: String },

    /// A handler breached the engine's contract. Fatal: the merge aborts.
    #[error("invariant violated: {detail}")]
    Invariant { detail: String },
}

impl PatchError {
    /// Convenience constructor for [`PatchError::Rejected`].
    #[must_use]
    pub fn rejected(detail: impl Into<String>) -> Self {
        Self::Rejected {
            detail: detail.into(),
        }
    }

    /// Convenience constructor for [`PatchError::Invariant`].
    #[must_use]
    pub fn invariant(detail: impl Into<String>) -> Self {
        Self::Invariant {
            detail: detail.into(),
        }
    }

    /// Returns `true` if this error must abort the whole merge invocation.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Invariant { .. })
    }
}
