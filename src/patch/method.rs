//! Method specialization of the patch engine.
//!
//! Beyond the shared member logic this adds two method-only mechanisms:
//!
//! - **Marker-parameter targeting**: a trailing parameter of the marker type
//!   [`TARGET_TAG`](super::action::TARGET_TAG) on an `edit` means "target by
//!   name, ignoring this parameter". This lets a patch declare a
//!   constructor-like overload that disambiguates an edit without renaming.
//!   The produced method drops the marker parameter and its body gains one
//!   register slot to absorb the missing argument.
//! - **Splice actions** (`wrap`/`prepend`/`append`): compose the patch body
//!   with the target's existing instruction stream instead of discarding it.
//!   Never valid on instance constructors; both sides need a body, and
//!   staticness cannot change while the target's code is retained. A `wrap`
//!   body marks the splice point with a single [`WRAP_ANCHOR`] instruction.

use crate::error::PatchError;
use crate::log::{LogContext, Logger};
use crate::model::{Annotation, DexMethod, ItemId, MethodBody, STATIC_CONSTRUCTOR};

use super::action::{strip_directives, Action, PatchDirective, TARGET_TAG};
use super::engine::PatchKind;
use super::member::{
    check_static_retained, diagnose_modifiers, resolve_untagged_action, ChangeStyle,
    MemberDefaults,
};
use super::pool::ItemPool;

/// Opcode of the pseudo-instruction marking where a `wrap` splices in the
/// target's instructions.
pub const WRAP_ANCHOR: &str = "invoke-original";

/// Method-kind strategy for the generic engine.
pub struct MethodPatcher {
    virtuals: bool,
    defaults: MemberDefaults,
    strip: bool,
}

impl MethodPatcher {
    /// Patcher for the direct (non-virtual) method collection.
    #[must_use]
    pub fn direct(defaults: MemberDefaults, strip: bool) -> Self {
        Self {
            virtuals: false,
            defaults,
            strip,
        }
    }

    /// Patcher for the virtual method collection.
    #[must_use]
    pub fn virtuals(defaults: MemberDefaults, strip: bool) -> Self {
        Self {
            virtuals: true,
            defaults,
            strip,
        }
    }

    fn stripped(&self, method: &DexMethod) -> DexMethod {
        let mut produced = method.clone();
        if self.strip {
            produced.annotations = strip_directives(&produced.annotations);
        }
        produced
    }

    fn has_marker_param(method: &DexMethod) -> bool {
        method.parameters.last().map(String::as_str) == Some(TARGET_TAG)
    }

    /// Parameter list with a trailing marker stripped, when present.
    fn effective_parameters(method: &DexMethod, action: Action) -> &[String] {
        if action == Action::Edit && Self::has_marker_param(method) {
            &method.parameters[..method.parameters.len() - 1]
        } else {
            &method.parameters
        }
    }
}

impl PatchKind for MethodPatcher {
    type Item = DexMethod;

    fn kind(&self) -> &'static str {
        if self.virtuals {
            "virtual method"
        } else {
            "direct method"
        }
    }

    fn item_id(&self, item: &DexMethod) -> ItemId {
        item.id()
    }

    fn annotations<'i>(&self, item: &'i DexMethod) -> &'i [Annotation] {
        &item.annotations
    }

    fn patched_id(&self, item: &DexMethod, action: Action) -> ItemId {
        ItemId::new(DexMethod::format_id(
            &item.name,
            Self::effective_parameters(item, action),
            &item.return_type,
        ))
    }

    fn check_directive(
        &self,
        _item: &DexMethod,
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
        item: &DexMethod,
        directive: &PatchDirective,
    ) -> Result<Option<ItemId>, PatchError> {
        // A method retarget is a bare name; the signature comes from the
        // patch method's own declaration (marker stripped for edits).
        Ok(directive.target.as_ref().map(|name| {
            ItemId::new(DexMethod::format_id(
                name,
                Self::effective_parameters(item, directive.action),
                &item.return_type,
            ))
        }))
    }

    fn implicit_action(
        &self,
        logger: &mut Logger,
        ctx: &LogContext,
        item: &DexMethod,
        source: &ItemPool<DexMethod>,
    ) -> Result<Action, PatchError> {
        let static_ctor_id = ItemId::new(format!("{STATIC_CONSTRUCTOR}()V"));
        resolve_untagged_action(
            logger,
            ctx,
            self.kind(),
            &item.id(),
            item.is_static_constructor(),
            &self.defaults,
            source.contains(&static_ctor_id),
        )
    }

    fn on_add(
        &self,
        _logger: &mut Logger,
        _ctx: &LogContext,
        item: &DexMethod,
        _directive: &PatchDirective,
    ) -> Result<DexMethod, PatchError> {
        Ok(self.stripped(item))
    }

    fn on_edit(
        &self,
        logger: &mut Logger,
        ctx: &LogContext,
        item: &DexMethod,
        target: &DexMethod,
        _directive: &PatchDirective,
        in_place: bool,
    ) -> Result<DexMethod, PatchError> {
        let mut produced = self.stripped(item);
        if Self::has_marker_param(item) {
            produced.parameters.pop();
            // The body was compiled expecting the marker argument; one extra
            // local slot absorbs it.
            if let Some(body) = &mut produced.body {
                body.registers += 1;
            }
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
        item: &DexMethod,
        _target: &DexMethod,
        _directive: &PatchDirective,
    ) -> Result<DexMethod, PatchError> {
        Ok(self.stripped(item))
    }

    fn on_splice(
        &self,
        _logger: &mut Logger,
        _ctx: &LogContext,
        action: Action,
        item: &DexMethod,
        target: &DexMethod,
        _directive: &PatchDirective,
    ) -> Result<DexMethod, PatchError> {
        if item.is_constructor() {
            return Err(PatchError::rejected(format!(
                "cannot {action} constructors"
            )));
        }
        let Some(target_body) = &target.body else {
            return Err(PatchError::rejected(
                "target has no executable body (abstract or native)",
            ));
        };
        let Some(patch_body) = &item.body else {
            return Err(PatchError::rejected("patch method has no executable body"));
        };
        check_static_retained(target.modifiers, item.modifiers)?;

        let instructions = match action {
            Action::Prepend => {
                let mut v = patch_body.instructions.clone();
                v.extend(target_body.instructions.iter().cloned());
                v
            }
            Action::Append => {
                let mut v = target_body.instructions.clone();
                v.extend(patch_body.instructions.iter().cloned());
                v
            }
            Action::Wrap => {
                let anchors = patch_body
                    .instructions
                    .iter()
                    .filter(|i| i.opcode == WRAP_ANCHOR)
                    .count();
                if anchors != 1 {
                    return Err(PatchError::rejected(format!(
                        "wrap body must contain exactly one `{WRAP_ANCHOR}` instruction, found {anchors}"
                    )));
                }
                let mut v = Vec::with_capacity(
                    patch_body.instructions.len() + target_body.instructions.len(),
                );
                for instruction in &patch_body.instructions {
                    if instruction.opcode == WRAP_ANCHOR {
                        v.extend(target_body.instructions.iter().cloned());
                    } else {
                        v.push(instruction.clone());
                    }
                }
                v
            }
            other => {
                return Err(PatchError::invariant(format!(
                    "non-splice action `{other}` reached on_splice"
                )))
            }
        };

        let mut produced = self.stripped(item);
        produced.body = Some(MethodBody {
            registers: patch_body.registers.max(target_body.registers),
            instructions,
        });
        Ok(produced)
    }

    fn on_effective_replacement(
        &self,
        logger: &mut Logger,
        ctx: &LogContext,
        produced: &DexMethod,
        original: &DexMethod,
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
    use crate::log::Level;
    use crate::model::{AnnotationValue, Instruction, Modifiers};
    use crate::patch::engine::Patcher;

    use super::*;

    fn body(registers: u32, opcodes: &[&str]) -> MethodBody {
        MethodBody {
            registers,
            instructions: opcodes
                .iter()
                .map(|op| Instruction::new(*op, vec![]))
                .collect(),
        }
    }

    fn method(name: &str, params: &[&str], opcodes: &[&str]) -> DexMethod {
        DexMethod {
            name: name.to_owned(),
            parameters: params.iter().map(|s| (*s).to_owned()).collect(),
            return_type: "V".to_owned(),
            modifiers: Modifiers::PUBLIC,
            annotations: vec![],
            body: Some(body(2, opcodes)),
        }
    }

    fn tagged(mut m: DexMethod, action: Action) -> DexMethod {
        m.annotations
            .push(Annotation::marker(action.directive_type().unwrap()));
        m
    }

    fn run(
        defaults: MemberDefaults,
        sources: Vec<DexMethod>,
        patches: Vec<DexMethod>,
    ) -> (Vec<DexMethod>, Logger) {
        let mut logger = Logger::new(Level::None);
        let out = Patcher::new(MethodPatcher::direct(defaults, true))
            .process(&mut logger, &LogContext::root(), sources, &patches)
            .unwrap();
        (out, logger)
    }

    fn opcodes(m: &DexMethod) -> Vec<&str> {
        m.body
            .as_ref()
            .unwrap()
            .instructions
            .iter()
            .map(|i| i.opcode.as_str())
            .collect()
    }

    #[test]
    fn marker_param_edit_targets_by_name() {
        let source = method("run", &["I"], &["old-a", "old-b"]);
        let patch = tagged(
            method("run", &["I", TARGET_TAG], &["new-a"]),
            Action::Edit,
        );
        let (out, logger) = run(MemberDefaults::default(), vec![source], vec![patch]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id().as_str(), "run(I)V");
        assert_eq!(out[0].parameters, vec!["I".to_owned()]);
        // One extra register absorbs the dropped marker argument.
        assert_eq!(out[0].body.as_ref().unwrap().registers, 3);
        assert_eq!(opcodes(&out[0]), vec!["new-a"]);
        assert!(!logger.has_errors());
    }

    #[test]
    fn marker_edit_is_in_place_for_ordering() {
        let sources = vec![
            method("first", &[], &["f"]),
            method("run", &["I"], &["old"]),
            method("last", &[], &["l"]),
        ];
        let patch = tagged(method("run", &["I", TARGET_TAG], &["new"]), Action::Edit);
        let (out, _) = run(MemberDefaults::default(), sources, vec![patch]);
        let names: Vec<_> = out.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["first", "run", "last"]);
    }

    #[test]
    fn prepend_splices_patch_code_first() {
        let source = method("run", &[], &["t1", "t2"]);
        let patch = tagged(method("run", &[], &["p1"]), Action::Prepend);
        let (out, logger) = run(MemberDefaults::default(), vec![source], vec![patch]);
        assert_eq!(opcodes(&out[0]), vec!["p1", "t1", "t2"]);
        assert!(!logger.has_errors());
    }

    #[test]
    fn append_splices_patch_code_last() {
        let source = method("run", &[], &["t1"]);
        let patch = tagged(method("run", &[], &["p1", "p2"]), Action::Append);
        let (out, logger) = run(MemberDefaults::default(), vec![source], vec![patch]);
        assert_eq!(opcodes(&out[0]), vec!["t1", "p1", "p2"]);
        assert!(!logger.has_errors());
    }

    #[test]
    fn wrap_splices_at_anchor() {
        let source = method("run", &[], &["t1", "t2"]);
        let patch = tagged(
            method("run", &[], &["before", WRAP_ANCHOR, "after"]),
            Action::Wrap,
        );
        let (out, logger) = run(MemberDefaults::default(), vec![source], vec![patch]);
        assert_eq!(opcodes(&out[0]), vec!["before", "t1", "t2", "after"]);
        assert!(!logger.has_errors());
    }

    #[test]
    fn wrap_without_anchor_is_rejected() {
        let source = method("run", &[], &["t1"]);
        let patch = tagged(method("run", &[], &["p1"]), Action::Wrap);
        let (out, logger) = run(MemberDefaults::default(), vec![source], vec![patch]);
        assert_eq!(opcodes(&out[0]), vec!["t1"]);
        assert_eq!(logger.error_count(), 1);
    }

    #[test]
    fn splice_into_constructor_is_rejected() {
        let source = method("<init>", &[], &["t1"]);
        let patch = tagged(method("<init>", &[], &["p1"]), Action::Append);
        let (_, logger) = run(MemberDefaults::default(), vec![source], vec![patch]);
        assert_eq!(logger.error_count(), 1);
    }

    #[test]
    fn splice_requires_target_body() {
        let mut source = method("run", &[], &[]);
        source.body = None;
        source.modifiers |= Modifiers::ABSTRACT;
        let patch = tagged(method("run", &[], &["p1"]), Action::Append);
        let (_, logger) = run(MemberDefaults::default(), vec![source], vec![patch]);
        assert_eq!(logger.error_count(), 1);
    }

    #[test]
    fn splice_rejects_staticness_change() {
        let source = method("run", &[], &["t1"]);
        let mut patched = method("run", &[], &["p1"]);
        patched.modifiers |= Modifiers::STATIC;
        let patch = tagged(patched, Action::Append);
        let (_, logger) = run(MemberDefaults::default(), vec![source], vec![patch]);
        assert_eq!(logger.error_count(), 1);
    }

    #[test]
    fn splice_registers_take_max() {
        let mut source = method("run", &[], &["t1"]);
        source.body.as_mut().unwrap().registers = 7;
        let patch = tagged(method("run", &[], &["p1"]), Action::Append);
        let (out, _) = run(MemberDefaults::default(), vec![source], vec![patch]);
        assert_eq!(out[0].body.as_ref().unwrap().registers, 7);
    }

    #[test]
    fn untagged_static_ctor_appends_implicitly() {
        let source = method(STATIC_CONSTRUCTOR, &[], &["t-init"]);
        let patch = method(STATIC_CONSTRUCTOR, &[], &["p-init"]);
        let (out, logger) = run(MemberDefaults::default(), vec![source], vec![patch]);
        assert_eq!(out.len(), 1);
        assert_eq!(opcodes(&out[0]), vec!["t-init", "p-init"]);
        assert!(!logger.has_errors());
    }

    #[test]
    fn untagged_static_ctor_added_when_source_has_none() {
        let source = method("other", &[], &["x"]);
        let patch = method(STATIC_CONSTRUCTOR, &[], &["p-init"]);
        let (out, logger) = run(MemberDefaults::default(), vec![source], vec![patch]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].name, STATIC_CONSTRUCTOR);
        assert!(!logger.has_errors());
    }

    #[test]
    fn explicit_target_by_name() {
        let source = method("original", &["I"], &["t"]);
        let mut patched = method("renamed", &["I"], &["p"]);
        patched
            .annotations
            .push(Annotation::marker(Action::Edit.directive_type().unwrap()));
        patched.annotations[0].elements.insert(
            "target".to_owned(),
            AnnotationValue::Str("original".to_owned()),
        );
        let (out, logger) = run(MemberDefaults::default(), vec![source], vec![patched]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "renamed");
        assert!(!logger.has_errors());
    }

    #[test]
    fn retarget_on_non_claiming_action_is_rejected() {
        let mut patch = tagged(method("added", &[], &["p1"]), Action::Add);
        patch.annotations[0]
            .elements
            .insert("target".to_owned(), AnnotationValue::Str("run".to_owned()));
        let (out, logger) = run(MemberDefaults::default(), vec![], vec![patch]);
        assert!(out.is_empty());
        assert_eq!(logger.error_count(), 1);
    }
}
