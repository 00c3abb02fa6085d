//! Class specialization of the patch engine.
//!
//! Wraps the generic engine with identifier = fully-qualified type
//! descriptor. An untagged class defaults to `add`, so off-the-shelf types
//! can be included in a patch without annotation. A class `edit` recurses
//! into four freshly-constructed member engines (static fields, instance
//! fields, direct methods, virtual methods), passing down the resolved
//! static-constructor and default-action configuration.
//!
//! Package markers (`package-info` classes) are recognized by identifier
//! shape and diverted before standard dispatch: `remove` and `replace`
//! resolve a package prefix and bulk-claim every matching source identifier
//! through the same claim mechanism as ordinary targets, so duplicate claims
//! surface as ordinary conflicts.

use crate::error::PatchError;
use crate::log::{Level, LogContext, Logger};
use crate::model::{Annotation, DexClass, ItemId, TypeId};
use crate::rewrite::rename_class;

use super::action::{parse_directive, strip_directives, Action, PatchDirective};
use super::engine::{MergeState, Patcher, PatchKind};
use super::field::FieldPatcher;
use super::member::{diagnose_modifiers, resolve_untagged_action, ChangeStyle, MemberDefaults};
use super::method::MethodPatcher;
use super::pool::ItemPool;

/// Class-kind strategy for the generic engine.
pub struct ClassPatcher {
    strip: bool,
}

impl ClassPatcher {
    /// Create a class patcher. `strip` removes recognized directive tags
    /// from all produced items.
    #[must_use]
    pub fn new(strip: bool) -> Self {
        Self { strip }
    }

    fn stripped(&self, class: &DexClass) -> DexClass {
        if !self.strip {
            return class.clone();
        }
        let mut produced = class.clone();
        produced.annotations = strip_directives(&produced.annotations);
        for field in produced
            .static_fields
            .iter_mut()
            .chain(produced.instance_fields.iter_mut())
        {
            field.annotations = strip_directives(&field.annotations);
        }
        for method in produced
            .direct_methods
            .iter_mut()
            .chain(produced.virtual_methods.iter_mut())
        {
            method.annotations = strip_directives(&method.annotations);
        }
        produced
    }

    /// Whether the patch's static-constructor code will survive member
    /// merging under `defaults`. Pre-resolved once per class edit and handed
    /// to the static field engine, which drops patch-originated initial
    /// values that would lose their backing initialization.
    fn static_ctor_retains_patch_code(
        patch: &DexClass,
        target: &DexClass,
        defaults: MemberDefaults,
    ) -> bool {
        let Some(static_ctor) = patch.static_constructor() else {
            // No patch <clinit>: values are standalone encoded literals.
            return true;
        };
        let action = match parse_directive(&static_ctor.annotations) {
            Ok(Some(directive)) => directive.action,
            Ok(None) => {
                // Probe resolution quietly; the method engine re-resolves
                // (and reports) when it actually merges the member.
                let mut probe = Logger::new(Level::None);
                match resolve_untagged_action(
                    &mut probe,
                    &LogContext::root(),
                    "direct method",
                    &static_ctor.id(),
                    true,
                    &defaults,
                    target.static_constructor().is_some(),
                ) {
                    Ok(action) => action,
                    Err(_) => return false,
                }
            }
            // Parse failure is reported by the method engine; assume the
            // author meant to keep the code.
            Err(_) => return true,
        };
        !matches!(action, Action::Remove | Action::Ignore | Action::None)
    }

    fn resolve_class_target(
        patch: &DexClass,
        directive: &PatchDirective,
    ) -> Result<Option<ItemId>, PatchError> {
        if let Some(type_ref) = &directive.target_class {
            return Ok(Some(ItemId::from(type_ref)));
        }
        let Some(name) = &directive.target else {
            return Ok(None);
        };
        let invalid = |detail: String| PatchError::InvalidElement {
            element: "target",
            detail,
        };
        let type_id = if name.starts_with('L') && name.ends_with(';') {
            TypeId::new(name).map_err(|e| invalid(e.to_string()))?
        } else if name.contains('.') {
            TypeId::from_dotted(name).map_err(|e| invalid(e.to_string()))?
        } else {
            // Bare simple name: same package as the patch class.
            let descriptor = format!("{}{};", patch.descriptor.package_prefix(), name);
            TypeId::new(&descriptor).map_err(|e| invalid(e.to_string()))?
        };
        Ok(Some(ItemId::from(type_id)))
    }

    /// Resolve the package prefix a package-marker directive targets.
    fn resolve_package_prefix(
        patch: &DexClass,
        directive: &PatchDirective,
    ) -> Result<String, PatchError> {
        if let Some(type_ref) = &directive.target_class {
            return Ok(type_ref.package_prefix().to_owned());
        }
        if let Some(name) = &directive.target {
            // Validate the dotted package name by forming its marker class.
            let marker = TypeId::from_dotted(&format!("{name}.package-info")).map_err(|e| {
                PatchError::InvalidElement {
                    element: "target",
                    detail: e.to_string(),
                }
            })?;
            return Ok(marker.package_prefix().to_owned());
        }
        Ok(patch.descriptor.package_prefix().to_owned())
    }
}

impl PatchKind for ClassPatcher {
    type Item = DexClass;

    fn kind(&self) -> &'static str {
        "type"
    }

    fn item_id(&self, item: &DexClass) -> ItemId {
        item.id()
    }

    fn annotations<'i>(&self, item: &'i DexClass) -> &'i [Annotation] {
        &item.annotations
    }

    fn check_directive(
        &self,
        item: &DexClass,
        directive: &PatchDirective,
    ) -> Result<(), PatchError> {
        let action = directive.action;
        if directive.recursive && !(item.is_package_marker() && action.claims_target()) {
            return Err(PatchError::InapplicableElement {
                element: "recursive",
                kind: "non-package type",
            });
        }
        if directive.content_only && action != Action::Edit {
            return Err(PatchError::rejected(format!(
                "element `contentOnly` is not allowed with action `{action}`"
            )));
        }
        if (directive.static_ctor_action.is_some() || directive.default_action.is_some())
            && action != Action::Edit
        {
            return Err(PatchError::rejected(format!(
                "member action defaults are not allowed with action `{action}`"
            )));
        }
        if directive.has_explicit_target()
            && !matches!(action, Action::Edit | Action::Replace | Action::Remove)
        {
            return Err(PatchError::rejected(format!(
                "element `target` is not allowed with action `{action}`"
            )));
        }
        if action.is_splice() {
            return Err(PatchError::UnsupportedAction {
                action,
                kind: "type",
            });
        }
        Ok(())
    }

    fn explicit_target_id(
        &self,
        item: &DexClass,
        directive: &PatchDirective,
    ) -> Result<Option<ItemId>, PatchError> {
        Self::resolve_class_target(item, directive)
    }

    fn implicit_action(
        &self,
        _logger: &mut Logger,
        _ctx: &LogContext,
        _item: &DexClass,
        _source: &ItemPool<DexClass>,
    ) -> Result<Action, PatchError> {
        // Untagged types default to add: a patch may carry off-the-shelf
        // helper classes without annotating each one.
        Ok(Action::Add)
    }

    fn on_add(
        &self,
        _logger: &mut Logger,
        _ctx: &LogContext,
        item: &DexClass,
        _directive: &PatchDirective,
    ) -> Result<DexClass, PatchError> {
        Ok(self.stripped(item))
    }

    fn on_edit(
        &self,
        logger: &mut Logger,
        ctx: &LogContext,
        item: &DexClass,
        target: &DexClass,
        directive: &PatchDirective,
        in_place: bool,
    ) -> Result<DexClass, PatchError> {
        if directive.content_only && !in_place {
            return Err(PatchError::rejected("content-only edit cannot retarget"));
        }

        // A cross-identifier edit moves the target's contents under the new
        // name; references to the old name on either side follow it.
        let (target_eff, patch_eff) = if in_place {
            (target.clone(), item.clone())
        } else {
            (
                rename_class(target, &target.descriptor, &item.descriptor),
                rename_class(item, &target.descriptor, &item.descriptor),
            )
        };

        let defaults = MemberDefaults {
            static_ctor_action: directive.static_ctor_action,
            default_action: directive.default_action,
        };
        let retains = Self::static_ctor_retains_patch_code(&patch_eff, &target_eff, defaults);

        let static_fields = Patcher::new(FieldPatcher::statics(defaults, self.strip, retains))
            .process(
                logger,
                ctx,
                target_eff.static_fields.clone(),
                &patch_eff.static_fields,
            )?;
        let instance_fields = Patcher::new(FieldPatcher::instance(defaults, self.strip)).process(
            logger,
            ctx,
            target_eff.instance_fields.clone(),
            &patch_eff.instance_fields,
        )?;
        let direct_methods = Patcher::new(MethodPatcher::direct(defaults, self.strip)).process(
            logger,
            ctx,
            target_eff.direct_methods.clone(),
            &patch_eff.direct_methods,
        )?;
        let virtual_methods = Patcher::new(MethodPatcher::virtuals(defaults, self.strip)).process(
            logger,
            ctx,
            target_eff.virtual_methods.clone(),
            &patch_eff.virtual_methods,
        )?;

        // Header: the target's when content-only, the patch's otherwise.
        let header = if directive.content_only {
            &target_eff
        } else {
            &patch_eff
        };
        let annotations = if directive.content_only {
            header.annotations.clone()
        } else if self.strip {
            strip_directives(&header.annotations)
        } else {
            header.annotations.clone()
        };

        let produced = DexClass {
            descriptor: item.descriptor.clone(),
            modifiers: header.modifiers,
            superclass: header.superclass.clone(),
            interfaces: header.interfaces.clone(),
            source_file: header.source_file.clone(),
            annotations,
            static_fields,
            instance_fields,
            direct_methods,
            virtual_methods,
        };

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
        item: &DexClass,
        _target: &DexClass,
        _directive: &PatchDirective,
    ) -> Result<DexClass, PatchError> {
        Ok(self.stripped(item))
    }

    fn on_effective_replacement(
        &self,
        logger: &mut Logger,
        ctx: &LogContext,
        produced: &DexClass,
        original: &DexClass,
        in_place_edit: bool,
    ) {
        let style = if in_place_edit {
            ChangeStyle::EditInPlace
        } else {
            ChangeStyle::Replacement
        };
        diagnose_modifiers(logger, ctx, original.modifiers, produced.modifiers, style);
    }

    fn patch_special(
        &self,
        logger: &mut Logger,
        ctx: &LogContext,
        state: &mut MergeState<DexClass>,
        item: &DexClass,
        action: Action,
        directive: &PatchDirective,
    ) -> Result<bool, PatchError> {
        if !item.is_package_marker() {
            return Ok(false);
        }
        // Add/edit/ignore of the marker itself behaves as an ordinary class.
        if !matches!(action, Action::Remove | Action::Replace) {
            return Ok(false);
        }

        let prefix = Self::resolve_package_prefix(item, directive)?;
        let matches: Vec<ItemId> = state
            .source()
            .ids()
            .filter(|id| {
                let Some(rest) = id.as_str().strip_prefix(prefix.as_str()) else {
                    return false;
                };
                directive.recursive || !rest.contains('/')
            })
            .cloned()
            .collect();

        if matches.is_empty() {
            return Err(PatchError::TargetNotFound {
                id: ItemId::new(format!("{prefix}*")),
            });
        }

        logger.log(
            Level::Info,
            ctx,
            &format!("{action} claims {} types under `{prefix}`", matches.len()),
        );
        for id in matches {
            if let Err(e) = state.claim(id, false) {
                // A bulk claim colliding with an earlier claim is an
                // ordinary conflict, reported per identifier.
                logger.log(Level::Error, ctx, &e.to_string());
            }
        }

        if action == Action::Replace {
            state.register(item.id(), self.stripped(item))?;
        }
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
