//! Logic shared by the field and method specializations.
//!
//! Covers the two concerns every member kind needs: resolving the action for
//! an untagged member (class-level defaults plus the static-constructor
//! safety net) and grading modifier-mismatch diagnostics between a target
//! and its replacement.

use crate::error::PatchError;
use crate::log::{Level, LogContext, Logger};
use crate::model::{ItemId, Modifiers};

use super::action::Action;

// ---------------------------------------------------------------------------
// MemberDefaults
// ---------------------------------------------------------------------------

/// Action defaults resolved once per enclosing class edit and reused for
/// every member of that class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemberDefaults {
    /// `staticConstructorAction` from the class directive.
    /// `Some(Action::None)` opts the static constructor back into ordinary
    /// default-action resolution, disabling the implicit safety net.
    pub static_ctor_action: Option<Action>,
    /// `defaultAction` from the class directive.
    pub default_action: Option<Action>,
}

/// Resolve the action for a member that carries no directive of its own.
///
/// Resolution order, most specific first: the class-level static-constructor
/// action (static constructors only, and only when not the `None` sentinel),
/// then the class-level default action, then — for the static constructor
/// specifically — the implicit policy: `Append` when the target class already
/// declares one, else `Add`. Static-initialization code is never silently
/// discarded unless explicitly opted out.
///
/// # Errors
/// [`PatchError::NoActionDefined`] when nothing resolves.
pub fn resolve_untagged_action(
    logger: &mut Logger,
    ctx: &LogContext,
    kind: &'static str,
    id: &ItemId,
    is_static_ctor: bool,
    defaults: &MemberDefaults,
    source_has_static_ctor: bool,
) -> Result<Action, PatchError> {
    if is_static_ctor {
        match defaults.static_ctor_action {
            Some(Action::None) => {}
            Some(action) => return Ok(action),
            None => {
                if defaults.default_action.is_none() {
                    let action = if source_has_static_ctor {
                        Action::Append
                    } else {
                        Action::Add
                    };
                    logger.log(
                        Level::Info,
                        ctx,
                        &format!("implicit {action} of static constructor"),
                    );
                    return Ok(action);
                }
            }
        }
    }
    defaults
        .default_action
        .ok_or_else(|| PatchError::NoActionDefined {
            kind,
            id: id.clone(),
        })
}

// ---------------------------------------------------------------------------
// Modifier diagnostics
// ---------------------------------------------------------------------------

/// How the modifier change came about; drives diagnostic severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeStyle {
    /// Edit whose produced identifier equals the target identifier.
    EditInPlace,
    /// Edit producing a different identifier.
    Rename,
    /// Full replacement (always, even when identifiers coincide).
    Replacement,
}

/// Compare pre/post modifier bitsets and emit graded diagnostics.
///
/// Call-site-visible changes matter most on in-place edits (other code still
/// referencing the item sees a different contract) and least on replacements
/// (the author explicitly supplied the whole item).
pub fn diagnose_modifiers(
    logger: &mut Logger,
    ctx: &LogContext,
    old: Modifiers,
    new: Modifiers,
    style: ChangeStyle,
) {
    let changed = old.symmetric_difference(new);

    let interface = changed.intersection(Modifiers::INTERFACE_RELEVANT);
    if !interface.is_empty() {
        let level = match style {
            ChangeStyle::EditInPlace => Level::Warn,
            ChangeStyle::Rename => Level::Info,
            ChangeStyle::Replacement => Level::Debug,
        };
        logger.log(
            level,
            ctx,
            &format!("call-site-visible modifiers changed: {interface:?}"),
        );
    }

    let implementation = changed.intersection(Modifiers::IMPLEMENTATION_RELEVANT);
    if !implementation.is_empty() {
        let level = match style {
            ChangeStyle::EditInPlace => Level::Info,
            ChangeStyle::Rename | ChangeStyle::Replacement => Level::Debug,
        };
        logger.log(
            level,
            ctx,
            &format!("implementation modifiers changed: {implementation:?}"),
        );
    }
}

/// Hard check for operations that retain the target's executable body: a
/// member cannot change staticness while its code is kept, because the body's
/// register layout assumes the original receiver.
///
/// # Errors
/// [`PatchError::Rejected`] when the `static` bit differs.
pub fn check_static_retained(old: Modifiers, new: Modifiers) -> Result<(), PatchError> {
    if old.contains(Modifiers::STATIC) != new.contains(Modifiers::STATIC) {
        return Err(PatchError::rejected(
            "cannot change staticness while retaining the target's code",
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
