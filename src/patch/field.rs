//! Field specialization of the patch engine.
//!
//! One `FieldPatcher` instance handles one member collection (static or
//! instance fields) of one class edit. `Replace` is forbidden for fields:
//! replacing a field's storage has no safe semantics distinct from `Edit` in
//! this model.
//!
//! Static field initial values are patch-originated state tied to the static
//! constructor: a value from the patch is only kept when the enclosing
//! class's resolved static-constructor action will actually retain
//! patch-originated code, otherwise it is dropped with a warning.

use crate::error::PatchError;
use crate::log::{Level, LogContext, Logger};
use crate::model::{Annotation, DexField, ItemId};

use super::action::{strip_directives, Action, PatchDirective};
use super::engine::PatchKind;
use super::member::{
    diagnose_modifiers, resolve_untagged_action, ChangeStyle, MemberDefaults,
};
use super::pool::ItemPool;

/// Field-kind strategy for the generic engine.
pub struct FieldPatcher {
    statics: bool,
    defaults: MemberDefaults,
    strip: bool,
    /// Whether the resolved static-constructor action keeps patch code.
    /// Always `true` for the instance collection.
    static_ctor_retains_patch_code: bool,
}

impl FieldPatcher {
    /// Patcher for the static field collection.
    #[must_use]
    pub fn statics(
        defaults: MemberDefaults,
        strip: bool,
        static_ctor_retains_patch_code: bool,
    ) -> Self {
        Self {
            statics: true,
            defaults,
            strip,
            static_ctor_retains_patch_code,
        }
    }

    /// Patcher for the instance field collection.
    #[must_use]
    pub fn instance(defaults: MemberDefaults, strip: bool) -> Self {
        Self {
            statics: false,
            defaults,
            strip,
            static_ctor_retains_patch_code: true,
        }
    }

    fn stripped(&self, field: &DexField) -> DexField {
        let mut produced = field.clone();
        if self.strip {
            produced.annotations = strip_directives(&produced.annotations);
        }
        produced
    }

    /// Drop a patch-originated initial value that the static constructor
    /// resolution will not back up.
    fn check_initial_value(
        &self,
        logger: &mut Logger,
        ctx: &LogContext,
        produced: &mut DexField,
    ) {
        if self.statics
            && produced.initial_value.is_some()
            && !self.static_ctor_retains_patch_code
        {
            logger.log(
                Level::Warn,
                ctx,
                "initial value discarded: static constructor code from the patch is not retained",
            );
            produced.initial_value = None;
        }
    }
}

impl PatchKind for FieldPatcher {
    type Item = DexField;

    fn kind(&self) -> &'static str {
        if self.statics {
            "static field"
        } else {
            "instance field"
        }
    }

    fn item_id(&self, item: &DexField) -> ItemId {
        item.id()
    }

    fn annotations<'i>(&self, item: &'i DexField) -> &'i [Annotation] {
        &item.annotations
    }

    fn check_directive(
        &self,
        _item: &DexField,
        directive: &PatchDirective,
    ) -> Result<(), PatchError> {
        let kind = self.kind();
        if directive.target_class.is_some() {
            return Err(PatchError::InapplicableElement {
                element: "targetClass",
                kind,
            });
        }
        if directive.static_ctor_action.is_some() {
            return Err(PatchError::InapplicableElement {
                element: "staticConstructorAction",
                kind,
            });
        }
        if directive.default_action.is_some() {
            return Err(PatchError::InapplicableElement {
                element: "defaultAction",
                kind,
            });
        }
        if directive.content_only {
            return Err(PatchError::InapplicableElement {
                element: "contentOnly",
                kind,
            });
        }
        if directive.recursive {
            return Err(PatchError::InapplicableElement {
                element: "recursive",
                kind,
            });
        }
        if directive.has_explicit_target() && !directive.action.claims_target() {
            return Err(PatchError::rejected(format!(
                "element `target` is not allowed with action `{}`",
                directive.action
            )));
        }
        Ok(())
    }

    fn explicit_target_id(
        &self,
        item: &DexField,
        directive: &PatchDirective,
    ) -> Result<Option<ItemId>, PatchError> {
        // A field retarget is a bare member name; the type comes from the
        // patch field's own declaration.
        Ok(directive
            .target
            .as_ref()
            .map(|name| ItemId::new(format!("{name}:{}", item.type_desc))))
    }

    fn implicit_action(
        &self,
        logger: &mut Logger,
        ctx: &LogContext,
        item: &DexField,
        _source: &ItemPool<DexField>,
    ) -> Result<Action, PatchError> {
        resolve_untagged_action(
            logger,
            ctx,
            self.kind(),
            &item.id(),
            false,
            &self.defaults,
            false,
        )
    }

    fn on_add(
        &self,
        logger: &mut Logger,
        ctx: &LogContext,
        item: &DexField,
        _directive: &PatchDirective,
    ) -> Result<DexField, PatchError> {
        let mut produced = self.stripped(item);
        self.check_initial_value(logger, ctx, &mut produced);
        Ok(produced)
    }

    fn on_edit(
        &self,
        logger: &mut Logger,
        ctx: &LogContext,
        item: &DexField,
        target: &DexField,
        _directive: &PatchDirective,
        in_place: bool,
    ) -> Result<DexField, PatchError> {
        let patch_had_value = item.initial_value.is_some();
        let mut produced = self.stripped(item);
        self.check_initial_value(logger, ctx, &mut produced);
        // A field edit without its own initializer inherits the target's
        // value only when editing in place, never when renaming.
        if !patch_had_value && in_place {
            produced.initial_value.clone_from(&target.initial_value);
        }
        if !in_place {
            diagnose_modifiers(
                logger,
                ctx,
                target.modifiers,
                produced.modifiers,
                ChangeStyle::Rename,
            );
        }
        Ok(produced)
    }

    fn on_replace(
        &self,
        _logger: &mut Logger,
        _ctx: &LogContext,
        _item: &DexField,
        _target: &DexField,
        _directive: &PatchDirective,
    ) -> Result<DexField, PatchError> {
        Err(PatchError::rejected(
            "cannot replace fields; edit them instead",
        ))
    }

    fn on_effective_replacement(
        &self,
        logger: &mut Logger,
        ctx: &LogContext,
        produced: &DexField,
        original: &DexField,
        in_place_edit: bool,
    ) {
        let style = if in_place_edit {
            ChangeStyle::EditInPlace
        } else {
            ChangeStyle::Replacement
        };
        diagnose_modifiers(logger, ctx, original.modifiers, produced.modifiers, style);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnnotationValue, Modifiers};
    use crate::patch::engine::Patcher;

    fn field(name: &str) -> DexField {
        DexField {
            name: name.to_owned(),
            type_desc: "I".to_owned(),
            modifiers: Modifiers::PUBLIC | Modifiers::STATIC,
            annotations: vec![],
            initial_value: None,
        }
    }

    fn tagged(name: &str, action: Action) -> DexField {
        let mut f = field(name);
        f.annotations
            .push(Annotation::marker(action.directive_type().unwrap()));
        f
    }

    fn retarget(mut f: DexField, target: &str) -> DexField {
        f.annotations[0]
            .elements
            .insert("target".to_owned(), AnnotationValue::Str(target.to_owned()));
        f
    }

    fn run_statics(
        retains: bool,
        sources: Vec<DexField>,
        patches: Vec<DexField>,
    ) -> (Vec<DexField>, Logger) {
        let mut logger = Logger::new(Level::None);
        let kind = FieldPatcher::statics(MemberDefaults::default(), true, retains);
        let out = Patcher::new(kind)
            .process(&mut logger, &LogContext::root(), sources, &patches)
            .unwrap();
        (out, logger)
    }

    #[test]
    fn add_strips_directive_tag() {
        let (out, logger) = run_statics(true, vec![], vec![tagged("x", Action::Add)]);
        assert_eq!(out.len(), 1);
        assert!(out[0].annotations.is_empty());
        assert!(!logger.has_errors());
    }

    #[test]
    fn replace_is_forbidden() {
        let (out, logger) = run_statics(
            true,
            vec![field("x")],
            vec![tagged("x", Action::Replace)],
        );
        assert_eq!(out.len(), 1);
        assert_eq!(logger.error_count(), 1);
    }

    #[test]
    fn in_place_edit_inherits_initial_value() {
        let mut source = field("x");
        source.initial_value = Some(AnnotationValue::Int(7));
        let (out, logger) = run_statics(true, vec![source], vec![tagged("x", Action::Edit)]);
        assert_eq!(out[0].initial_value, Some(AnnotationValue::Int(7)));
        assert!(!logger.has_errors());
    }

    #[test]
    fn renaming_edit_does_not_inherit_initial_value() {
        let mut source = field("x");
        source.initial_value = Some(AnnotationValue::Int(7));
        let patch = retarget(tagged("y", Action::Edit), "x");
        let (out, logger) = run_statics(true, vec![source], vec![patch]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "y");
        assert_eq!(out[0].initial_value, None);
        assert!(!logger.has_errors());
    }

    #[test]
    fn patch_value_dropped_when_static_ctor_not_retained() {
        let mut patch = tagged("x", Action::Add);
        patch.initial_value = Some(AnnotationValue::Int(3));
        let (out, logger) = run_statics(false, vec![], vec![patch]);
        assert_eq!(out[0].initial_value, None);
        assert_eq!(logger.count(Level::Warn), 1);
    }

    #[test]
    fn patch_value_kept_when_static_ctor_retained() {
        let mut patch = tagged("x", Action::Add);
        patch.initial_value = Some(AnnotationValue::Int(3));
        let (out, logger) = run_statics(true, vec![], vec![patch]);
        assert_eq!(out[0].initial_value, Some(AnnotationValue::Int(3)));
        assert_eq!(logger.count(Level::Warn), 0);
    }

    #[test]
    fn class_level_elements_rejected_on_fields() {
        let mut patch = tagged("x", Action::Edit);
        patch.annotations[0]
            .elements
            .insert("contentOnly".to_owned(), AnnotationValue::Bool(true));
        let (_, logger) = run_statics(true, vec![field("x")], vec![patch]);
        assert_eq!(logger.error_count(), 1);
    }

    #[test]
    fn retarget_on_non_claiming_action_is_rejected() {
        let patch = retarget(tagged("x", Action::Add), "y");
        let (out, logger) = run_statics(true, vec![], vec![patch]);
        assert!(out.is_empty());
        assert_eq!(logger.error_count(), 1);
    }

    #[test]
    fn untagged_field_without_default_fails() {
        let (out, logger) = run_statics(true, vec![field("x")], vec![field("y")]);
        assert_eq!(out.len(), 1);
        assert_eq!(logger.error_count(), 1);
    }

    #[test]
    fn untagged_field_with_default_add() {
        let mut logger = Logger::new(Level::None);
        let defaults = MemberDefaults {
            static_ctor_action: None,
            default_action: Some(Action::Add),
        };
        let kind = FieldPatcher::statics(defaults, true, true);
        let out = Patcher::new(kind)
            .process(
                &mut logger,
                &LogContext::root(),
                vec![field("x")],
                &[field("y")],
            )
            .unwrap();
        assert_eq!(out.len(), 2);
        assert!(!logger.has_errors());
    }
}
