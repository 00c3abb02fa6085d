//! Patch actions and the directive annotation parser.
//!
//! A directive is one recognized annotation on a patch item, naming the
//! action to perform plus per-kind options. The parser extracts at most one
//! directive from an item's annotation set, validates its element
//! combination, and returns a resolved [`PatchDirective`]. Element
//! *applicability* (e.g. `contentOnly` only on class edits) is checked later
//! by the kind specializations, which know what kind of item they are
//! patching.

use std::fmt;

use serde::Deserialize;

use crate::error::PatchError;
use crate::model::{Annotation, AnnotationValue, TypeId};

/// Annotation-type prefix all directive tags live under.
pub const DIRECTIVE_PREFIX: &str = "Ldexpatcher/annotation/";

/// Marker parameter type for target-by-name method edits.
pub const TARGET_TAG: &str = "Ldexpatcher/tag/Target;";

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// The operation a directive requests.
///
/// `None` is a sentinel meaning "no explicit action configured" — it only
/// appears as the value of a `staticConstructorAction` element (to opt out of
/// the implicit static-constructor policy) and is distinct from `Ignore`,
/// which is a real no-op action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Add,
    Edit,
    Replace,
    Remove,
    Ignore,
    Wrap,
    Prepend,
    Append,
    None,
}

impl Action {
    /// All actions that have a directive annotation (everything but `None`).
    pub const DIRECTIVES: [Self; 8] = [
        Self::Add,
        Self::Edit,
        Self::Replace,
        Self::Remove,
        Self::Ignore,
        Self::Wrap,
        Self::Prepend,
        Self::Append,
    ];

    /// The annotation type descriptor of this action's directive tag.
    #[must_use]
    pub fn directive_type(self) -> Option<&'static str> {
        match self {
            Self::Add => Some("Ldexpatcher/annotation/DexAdd;"),
            Self::Edit => Some("Ldexpatcher/annotation/DexEdit;"),
            Self::Replace => Some("Ldexpatcher/annotation/DexReplace;"),
            Self::Remove => Some("Ldexpatcher/annotation/DexRemove;"),
            Self::Ignore => Some("Ldexpatcher/annotation/DexIgnore;"),
            Self::Wrap => Some("Ldexpatcher/annotation/DexWrap;"),
            Self::Prepend => Some("Ldexpatcher/annotation/DexPrepend;"),
            Self::Append => Some("Ldexpatcher/annotation/DexAppend;"),
            Self::None => None,
        }
    }

    /// Map an annotation type descriptor to its action.
    #[must_use]
    pub fn from_directive_type(type_desc: &str) -> Option<Self> {
        Self::DIRECTIVES
            .into_iter()
            .find(|a| a.directive_type() == Some(type_desc))
    }

    /// Map an enum-constant name (as used in directive elements) to an
    /// action. Accepts `NONE` for the sentinel.
    #[must_use]
    pub fn from_constant(name: &str) -> Option<Self> {
        match name {
            "ADD" => Some(Self::Add),
            "EDIT" => Some(Self::Edit),
            "REPLACE" => Some(Self::Replace),
            "REMOVE" => Some(Self::Remove),
            "IGNORE" => Some(Self::Ignore),
            "WRAP" => Some(Self::Wrap),
            "PREPEND" => Some(Self::Prepend),
            "APPEND" => Some(Self::Append),
            "NONE" => Some(Self::None),
            _ => None,
        }
    }

    /// Returns `true` for the splice variants that compose with a target
    /// method's existing instruction stream.
    #[must_use]
    pub fn is_splice(self) -> bool {
        matches!(self, Self::Wrap | Self::Prepend | Self::Append)
    }

    /// Returns `true` for actions that claim a target identifier.
    #[must_use]
    pub fn claims_target(self) -> bool {
        matches!(self, Self::Edit | Self::Replace | Self::Remove) || self.is_splice()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Add => "add",
            Self::Edit => "edit",
            Self::Replace => "replace",
            Self::Remove => "remove",
            Self::Ignore => "ignore",
            Self::Wrap => "wrap",
            Self::Prepend => "prepend",
            Self::Append => "append",
            Self::None => "none",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// PatchDirective
// ---------------------------------------------------------------------------

/// A parsed directive: the action plus every recognized option.
///
/// Options that do not apply to the directive's item kind are rejected by the
/// kind specialization, not here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatchDirective {
    pub action: Action,
    /// Explicit retarget: an identifier, bare member name, or dotted class
    /// name. Mutually exclusive with `target_class`.
    pub target: Option<String>,
    /// Explicit retarget by type reference (class directives only).
    pub target_class: Option<TypeId>,
    /// Class-level: action for the static constructor member.
    pub static_ctor_action: Option<Action>,
    /// Class-level: default action for untagged members.
    pub default_action: Option<Action>,
    /// Class-level: keep the target's header, merge only members.
    pub content_only: bool,
    /// Package markers only: bulk-claim all descendants, not just direct
    /// children.
    pub recursive: bool,
}

impl PatchDirective {
    /// A bare directive for `action` with no options set.
    #[must_use]
    pub fn bare(action: Action) -> Self {
        Self {
            action,
            target: None,
            target_class: None,
            static_ctor_action: None,
            default_action: None,
            content_only: false,
            recursive: false,
        }
    }

    /// Returns `true` if any explicit retarget element is present.
    #[must_use]
    pub fn has_explicit_target(&self) -> bool {
        self.target.is_some() || self.target_class.is_some()
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Simple name of a directive annotation type (`DexEdit` for
/// `Ldexpatcher/annotation/DexEdit;`), for error messages.
fn simple_name(type_desc: &str) -> &str {
    type_desc
        .trim_end_matches(';')
        .rsplit('/')
        .next()
        .unwrap_or(type_desc)
}

/// Returns `true` if the annotation is a recognized directive tag.
#[must_use]
pub fn is_directive(annotation: &Annotation) -> bool {
    Action::from_directive_type(&annotation.type_desc).is_some()
}

/// Remove all recognized directive tags from an annotation set.
#[must_use]
pub fn strip_directives(annotations: &[Annotation]) -> Vec<Annotation> {
    annotations
        .iter()
        .filter(|a| !is_directive(a))
        .cloned()
        .collect()
}

/// Extract at most one directive from an item's annotation set.
///
/// Returns `Ok(None)` when no recognized tag is present. More than one
/// recognized tag is a parse conflict naming both directive kinds.
///
/// # Errors
/// All errors are patch-authoring errors, recoverable per item.
pub fn parse_directive(annotations: &[Annotation]) -> Result<Option<PatchDirective>, PatchError> {
    let mut found: Option<(&Annotation, Action)> = None;
    for annotation in annotations {
        let Some(action) = Action::from_directive_type(&annotation.type_desc) else {
            continue;
        };
        if let Some((first, _)) = found {
            return Err(PatchError::ConflictingDirectives {
                first: simple_name(&first.type_desc).to_owned(),
                second: simple_name(&annotation.type_desc).to_owned(),
            });
        }
        found = Some((annotation, action));
    }
    let Some((annotation, action)) = found else {
        return Ok(None);
    };
    parse_elements(annotation, action).map(Some)
}

fn parse_elements(annotation: &Annotation, action: Action) -> Result<PatchDirective, PatchError> {
    let directive = simple_name(&annotation.type_desc);
    let mut parsed = PatchDirective::bare(action);

    for (name, value) in &annotation.elements {
        match name.as_str() {
            "target" => parsed.target = Some(expect_str(directive, "target", value)?),
            "targetClass" => {
                let desc = expect_type(directive, "targetClass", value)?;
                let id = TypeId::new(&desc).map_err(|e| PatchError::InvalidElement {
                    element: "targetClass",
                    detail: e.to_string(),
                })?;
                parsed.target_class = Some(id);
            }
            "staticConstructorAction" => {
                parsed.static_ctor_action =
                    Some(expect_action(directive, "staticConstructorAction", value)?);
            }
            "defaultAction" => {
                parsed.default_action = Some(expect_action(directive, "defaultAction", value)?);
            }
            "contentOnly" => parsed.content_only = expect_bool(directive, "contentOnly", value)?,
            "recursive" => parsed.recursive = expect_bool(directive, "recursive", value)?,
            other => {
                return Err(PatchError::UnknownElement {
                    directive: directive.to_owned(),
                    element: other.to_owned(),
                })
            }
        }
    }

    if parsed.target.is_some() && parsed.target_class.is_some() {
        return Err(PatchError::ExclusiveElements {
            first: "target",
            second: "targetClass",
        });
    }
    Ok(parsed)
}

fn type_mismatch(
    directive: &str,
    element: &str,
    expected: &'static str,
    value: &AnnotationValue,
) -> PatchError {
    PatchError::ElementType {
        directive: directive.to_owned(),
        element: element.to_owned(),
        expected,
        found: value.kind_label(),
    }
}

fn expect_str(directive: &str, element: &str, value: &AnnotationValue) -> Result<String, PatchError> {
    match value {
        AnnotationValue::Str(s) => Ok(s.clone()),
        other => Err(type_mismatch(directive, element, "string", other)),
    }
}

fn expect_type(
    directive: &str,
    element: &str,
    value: &AnnotationValue,
) -> Result<String, PatchError> {
    match value {
        AnnotationValue::Type(t) => Ok(t.clone()),
        other => Err(type_mismatch(directive, element, "type", other)),
    }
}

fn expect_bool(directive: &str, element: &str, value: &AnnotationValue) -> Result<bool, PatchError> {
    match value {
        AnnotationValue::Bool(b) => Ok(*b),
        other => Err(type_mismatch(directive, element, "bool", other)),
    }
}

fn expect_action(
    directive: &str,
    element: &'static str,
    value: &AnnotationValue,
) -> Result<Action, PatchError> {
    match value {
        AnnotationValue::Enum { variant, .. } => {
            Action::from_constant(variant).ok_or_else(|| PatchError::InvalidElement {
                element,
                detail: format!("unknown action constant `{variant}`"),
            })
        }
        other => Err(type_mismatch(directive, element, "enum", other)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
