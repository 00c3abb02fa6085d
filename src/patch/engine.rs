//! Generic three-phase patch-merge engine.
//!
//! Implements the index → apply → reconcile pipeline shared by every item
//! kind. [`Patcher`] is generic over a [`PatchKind`] strategy that supplies
//! identifiers, directive applicability checks, and the item-construction
//! handlers; the engine owns the per-invocation state and the ordering
//! invariant.
//!
//! # Phases
//!
//! 1. **Index**: build the source pool in input order; a duplicate identifier
//!    is reported and the later item dropped.
//! 2. **Apply**: for each patch item in patch order, parse its directive,
//!    resolve the action (explicit, or the kind's implicit policy), and
//!    dispatch. Claiming actions (edit/replace/remove/splices) mark their
//!    target in the targeted map; producing actions register the built item
//!    in the patched map under its own identifier. Any recoverable failure is
//!    logged against that item and iteration continues.
//! 3. **Reconcile**: claimed targets without an in-place replacement are
//!    deleted; claimed targets with one keep their slot as a tombstone so the
//!    replacement lands at the same ordinal position. Finally every produced
//!    item is placed — filling its tombstoned slot or appending at the end in
//!    registration order.
//!
//! # Determinism
//!
//! The output order is a function of source order and patch order alone:
//! all maps are insertion-ordered, and no step consults hashes or timestamps.

use indexmap::IndexMap;

use crate::error::PatchError;
use crate::log::{Level, LogContext, Logger};
use crate::model::ItemId;

use super::action::{parse_directive, Action, PatchDirective};
use super::pool::{ItemPool, Placement};

// ---------------------------------------------------------------------------
// PatchKind
// ---------------------------------------------------------------------------

/// Kind-specific capabilities the generic engine is parameterized over.
///
/// Implementations construct new items; they never mutate their inputs.
/// Handler contract: `on_add`/`on_edit`/`on_replace`/`on_splice` must return
/// an item whose identifier equals `patched_id(patch, action)`. A mismatch is
/// an engine-level invariant breach and aborts the merge.
pub trait PatchKind {
    /// The item type this kind patches.
    type Item: Clone;

    /// Human-readable kind label for diagnostics ("type", "static field", ...).
    fn kind(&self) -> &'static str;

    /// The item's shape-derived identifier.
    fn item_id(&self, item: &Self::Item) -> ItemId;

    /// The item's annotation set, scanned for a directive tag.
    fn annotations<'i>(&self, item: &'i Self::Item) -> &'i [crate::model::Annotation];

    /// Identifier the produced item must carry. Defaults to [`Self::item_id`];
    /// the method kind overrides this for marker-parameter edits.
    fn patched_id(&self, item: &Self::Item, _action: Action) -> ItemId {
        self.item_id(item)
    }

    /// Reject directive elements that do not apply to this kind or action.
    fn check_directive(
        &self,
        item: &Self::Item,
        directive: &PatchDirective,
    ) -> Result<(), PatchError>;

    /// Resolve an explicit retarget element to a target identifier.
    /// `Ok(None)` when the directive carries no explicit target.
    fn explicit_target_id(
        &self,
        item: &Self::Item,
        directive: &PatchDirective,
    ) -> Result<Option<ItemId>, PatchError>;

    /// Action for a patch item that carries no directive.
    fn implicit_action(
        &self,
        logger: &mut Logger,
        ctx: &LogContext,
        item: &Self::Item,
        source: &ItemPool<Self::Item>,
    ) -> Result<Action, PatchError>;

    /// Build a new item from an `add` patch item.
    fn on_add(
        &self,
        logger: &mut Logger,
        ctx: &LogContext,
        item: &Self::Item,
        directive: &PatchDirective,
    ) -> Result<Self::Item, PatchError>;

    /// Build the produced item for an `edit`, splicing in target-derived
    /// state where the kind requires it.
    fn on_edit(
        &self,
        logger: &mut Logger,
        ctx: &LogContext,
        item: &Self::Item,
        target: &Self::Item,
        directive: &PatchDirective,
        in_place: bool,
    ) -> Result<Self::Item, PatchError>;

    /// Build the produced item for a `replace` (wholesale from the patch).
    fn on_replace(
        &self,
        logger: &mut Logger,
        ctx: &LogContext,
        item: &Self::Item,
        target: &Self::Item,
        directive: &PatchDirective,
    ) -> Result<Self::Item, PatchError>;

    /// Build the produced item for a splice action (wrap/prepend/append).
    /// Only the method kind supports these.
    fn on_splice(
        &self,
        _logger: &mut Logger,
        _ctx: &LogContext,
        action: Action,
        _item: &Self::Item,
        _target: &Self::Item,
        _directive: &PatchDirective,
    ) -> Result<Self::Item, PatchError> {
        Err(PatchError::UnsupportedAction {
            action,
            kind: self.kind(),
        })
    }

    /// Diagnostic hook for an in-place effective replacement: the original
    /// item's slot is about to be overwritten by `produced`.
    fn on_effective_replacement(
        &self,
        logger: &mut Logger,
        ctx: &LogContext,
        produced: &Self::Item,
        original: &Self::Item,
        in_place_edit: bool,
    );

    /// Interception point for pseudo-items handled outside the standard
    /// dispatch (package markers). Return `Ok(true)` when fully handled.
    fn patch_special(
        &self,
        _logger: &mut Logger,
        _ctx: &LogContext,
        _state: &mut MergeState<Self::Item>,
        _item: &Self::Item,
        _action: Action,
        _directive: &PatchDirective,
    ) -> Result<bool, PatchError> {
        Ok(false)
    }
}

// ---------------------------------------------------------------------------
// MergeState
// ---------------------------------------------------------------------------

/// Per-invocation engine state: the source pool plus the claim and
/// production maps. Created fresh for every merge, discarded at its end.
#[derive(Debug)]
pub struct MergeState<T> {
    source: ItemPool<T>,
    /// Claimed target id → whether the claim is an in-place edit.
    targeted: IndexMap<ItemId, bool>,
    /// Produced item id → produced item, in registration order.
    patched: IndexMap<ItemId, T>,
}

impl<T> MergeState<T> {
    fn new() -> Self {
        Self {
            source: ItemPool::new(),
            targeted: IndexMap::new(),
            patched: IndexMap::new(),
        }
    }

    /// The indexed source pool.
    #[must_use]
    pub fn source(&self) -> &ItemPool<T> {
        &self.source
    }

    /// Look up a claimable target item.
    ///
    /// # Errors
    /// [`PatchError::TargetNotFound`] when no live item has this identifier.
    pub fn find_target(&self, id: &ItemId) -> Result<&T, PatchError> {
        self.source
            .get(id)
            .ok_or_else(|| PatchError::TargetNotFound { id: id.clone() })
    }

    /// Claim a target identifier for exactly one patch item.
    ///
    /// # Errors
    /// [`PatchError::AlreadyTargeted`] on a second claim; the first claim is
    /// unaffected.
    pub fn claim(&mut self, id: ItemId, in_place: bool) -> Result<(), PatchError> {
        if self.targeted.contains_key(&id) {
            return Err(PatchError::AlreadyTargeted { id });
        }
        self.targeted.insert(id, in_place);
        Ok(())
    }

    /// Register a produced item under its resolved output identifier.
    ///
    /// # Errors
    /// [`PatchError::AlreadyInjected`] when another produced item already
    /// holds this identifier; the registration is discarded.
    pub fn register(&mut self, id: ItemId, item: T) -> Result<(), PatchError> {
        if self.patched.contains_key(&id) {
            return Err(PatchError::AlreadyInjected { id });
        }
        self.patched.insert(id, item);
        Ok(())
    }

    /// Drop a claim again. Used when the handler behind a claim fails: a
    /// skipped patch item must leave its target untouched.
    fn release(&mut self, id: &ItemId) {
        self.targeted.shift_remove(id);
    }
}

// ---------------------------------------------------------------------------
// Patcher
// ---------------------------------------------------------------------------

/// The generic engine: a [`PatchKind`] strategy plus fresh [`MergeState`].
pub struct Patcher<K: PatchKind> {
    kind: K,
    state: MergeState<K::Item>,
}

impl<K: PatchKind> Patcher<K> {
    /// Create an engine for one merge invocation.
    pub fn new(kind: K) -> Self {
        Self {
            kind,
            state: MergeState::new(),
        }
    }

    /// Run the three phases over `(sources, patches)` and return the merged,
    /// identifier-unique, ordered item collection.
    ///
    /// Recoverable patch errors are logged and skipped; the caller inspects
    /// the logger's error counters to judge the result.
    ///
    /// # Errors
    /// Only fatal invariant breaches abort with `Err`.
    pub fn process(
        mut self,
        logger: &mut Logger,
        ctx: &LogContext,
        sources: Vec<K::Item>,
        patches: &[K::Item],
    ) -> Result<Vec<K::Item>, PatchError> {
        self.index_sources(logger, ctx, sources);

        for patch in patches {
            let item_ctx = ctx.item(self.kind.kind(), self.kind.item_id(patch));
            match self.apply(logger, &item_ctx, patch) {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => logger.log(Level::Error, &item_ctx, &e.to_string()),
            }
        }

        self.reconcile(logger, ctx)
    }

    fn index_sources(&mut self, logger: &mut Logger, ctx: &LogContext, sources: Vec<K::Item>) {
        for item in sources {
            let id = self.kind.item_id(&item);
            if self.state.source.insert(id.clone(), item).is_err() {
                let item_ctx = ctx.item(self.kind.kind(), &id);
                let e = PatchError::DuplicateItem { id };
                logger.log(Level::Error, &item_ctx, &e.to_string());
            }
        }
    }

    fn apply(
        &mut self,
        logger: &mut Logger,
        ctx: &LogContext,
        patch: &K::Item,
    ) -> Result<(), PatchError> {
        let parsed = parse_directive(self.kind.annotations(patch))?;
        if let Some(d) = &parsed {
            self.kind.check_directive(patch, d)?;
        }
        let action = match &parsed {
            Some(d) => d.action,
            None => self
                .kind
                .implicit_action(logger, ctx, patch, &self.state.source)?,
        };
        let directive = match parsed {
            Some(mut d) => {
                d.action = action;
                d
            }
            None => PatchDirective::bare(action),
        };
        logger.log(Level::Debug, ctx, &format!("applying {action}"));

        if self
            .kind
            .patch_special(logger, ctx, &mut self.state, patch, action, &directive)?
        {
            return Ok(());
        }

        let base_id = self.kind.patched_id(patch, action);
        match action {
            Action::Add => {
                let produced = self.kind.on_add(logger, ctx, patch, &directive)?;
                self.register(&base_id, produced)
            }
            Action::Ignore => Ok(()),
            Action::Remove => {
                let target_id = self.resolve_target(patch, &directive, &base_id)?;
                self.state.find_target(&target_id)?;
                let in_place = target_id == base_id;
                self.state.claim(target_id, in_place)
            }
            Action::Edit => {
                let target_id = self.resolve_target(patch, &directive, &base_id)?;
                let in_place = target_id == base_id;
                let item_ctx = if in_place {
                    ctx.clone()
                } else {
                    ctx.with_target(&target_id)
                };
                let target = self.state.find_target(&target_id)?.clone();
                self.state.claim(target_id.clone(), in_place)?;
                let outcome = self
                    .kind
                    .on_edit(logger, &item_ctx, patch, &target, &directive, in_place)
                    .and_then(|produced| self.register(&base_id, produced));
                if outcome.is_err() {
                    // A skipped patch item must leave its target untouched.
                    self.state.release(&target_id);
                }
                outcome
            }
            Action::Replace => {
                let target_id = self.resolve_target(patch, &directive, &base_id)?;
                let item_ctx = if target_id == base_id {
                    ctx.clone()
                } else {
                    ctx.with_target(&target_id)
                };
                let target = self.state.find_target(&target_id)?.clone();
                // A replace is never an in-place edit for diagnostic purposes.
                self.state.claim(target_id.clone(), false)?;
                let outcome = self
                    .kind
                    .on_replace(logger, &item_ctx, patch, &target, &directive)
                    .and_then(|produced| self.register(&base_id, produced));
                if outcome.is_err() {
                    self.state.release(&target_id);
                }
                outcome
            }
            Action::Wrap | Action::Prepend | Action::Append => {
                let target_id = self.resolve_target(patch, &directive, &base_id)?;
                let in_place = target_id == base_id;
                let item_ctx = if in_place {
                    ctx.clone()
                } else {
                    ctx.with_target(&target_id)
                };
                let target = self.state.find_target(&target_id)?.clone();
                self.state.claim(target_id.clone(), in_place)?;
                let outcome = self
                    .kind
                    .on_splice(logger, &item_ctx, action, patch, &target, &directive)
                    .and_then(|produced| self.register(&base_id, produced));
                if outcome.is_err() {
                    self.state.release(&target_id);
                }
                outcome
            }
            Action::None => Err(PatchError::invariant(
                "sentinel action `none` reached dispatch",
            )),
        }
    }

    fn resolve_target(
        &self,
        patch: &K::Item,
        directive: &PatchDirective,
        base_id: &ItemId,
    ) -> Result<ItemId, PatchError> {
        Ok(self
            .kind
            .explicit_target_id(patch, directive)?
            .unwrap_or_else(|| base_id.clone()))
    }

    fn register(&mut self, expected: &ItemId, produced: K::Item) -> Result<(), PatchError> {
        let id = self.kind.item_id(&produced);
        if id != *expected {
            return Err(PatchError::invariant(format!(
                "{} handler produced `{id}`, expected `{expected}`",
                self.kind.kind()
            )));
        }
        self.state.register(id, produced)
    }

    fn reconcile(
        mut self,
        logger: &mut Logger,
        ctx: &LogContext,
    ) -> Result<Vec<K::Item>, PatchError> {
        // Pass A: resolve claims against productions, in claim order.
        let claims: Vec<(ItemId, bool)> = self
            .state
            .targeted
            .iter()
            .map(|(id, in_place)| (id.clone(), *in_place))
            .collect();
        for (target_id, in_place) in claims {
            if let Some(produced) = self.state.patched.get(&target_id) {
                // Only in-place edits/replacements reach here: target id and
                // produced id coincide. Keep the slot so the replacement
                // lands at the original position.
                let original = self.state.source.clear_slot(&target_id).ok_or_else(|| {
                    PatchError::invariant(format!("claimed target `{target_id}` vanished"))
                })?;
                let item_ctx = ctx.item(self.kind.kind(), &target_id);
                self.kind
                    .on_effective_replacement(logger, &item_ctx, produced, &original, in_place);
            } else {
                // Removed outright, or edited/replaced under a new identifier.
                self.state.source.remove(&target_id);
            }
        }

        // Pass B: place every produced item, in registration order.
        for (id, produced) in std::mem::take(&mut self.state.patched) {
            match self.state.source.place(id.clone(), produced) {
                Placement::FilledSlot | Placement::Appended => {}
                Placement::Occupied => {
                    let item_ctx = ctx.item(self.kind.kind(), &id);
                    let e = PatchError::AlreadyExists { id };
                    logger.log(Level::Error, &item_ctx, &e.to_string());
                }
            }
        }

        Ok(self.state.source.into_items())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
