//! End-to-end merge scenarios over whole class containers.

mod common;

use bytepatch::log::{Level, Logger};
use bytepatch::model::{Annotation, AnnotationValue, Modifiers};
use bytepatch::patch::{patch_classes, Action};

use common::{
    action_value, class, descriptors, field, merge, method, opcodes, str_value, tagged,
    tagged_field, tagged_method, with_element,
};

#[test]
fn empty_patch_preserves_sources_exactly() {
    let sources = vec![class("La/A;"), class("Lb/B;"), class("Lc/C;")];
    let (out, logger) = merge(sources.clone(), vec![]);
    assert_eq!(out, sources);
    assert!(!logger.has_errors());
}

#[test]
fn untagged_patch_classes_are_added_in_patch_order() {
    let (out, logger) = merge(
        vec![class("La/A;")],
        vec![class("Lz/Z;"), class("Lm/M;")],
    );
    assert_eq!(descriptors(&out), vec!["La/A;", "Lz/Z;", "Lm/M;"]);
    assert!(!logger.has_errors());
}

#[test]
fn in_place_edit_keeps_ordinal_position() {
    let mut target = class("Lb/B;");
    target.instance_fields.push(field("kept", "I"));

    let mut patch = tagged(class("Lb/B;"), Action::Edit);
    patch = with_element(patch, "defaultAction", action_value("ADD"));
    patch.instance_fields.push(field("added", "J"));

    let (out, logger) = merge(
        vec![class("La/A;"), target, class("Lc/C;")],
        vec![patch],
    );
    assert_eq!(descriptors(&out), vec!["La/A;", "Lb/B;", "Lc/C;"]);
    let names: Vec<_> = out[1].instance_fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["kept", "added"]);
    assert!(!logger.has_errors());
}

#[test]
fn renaming_edit_appends_under_new_name() {
    let patch = with_element(
        tagged(class("La/Renamed;"), Action::Edit),
        "target",
        str_value("Old"),
    );
    let (out, logger) = merge(vec![class("La/Old;"), class("La/Keep;")], vec![patch]);
    assert_eq!(descriptors(&out), vec!["La/Keep;", "La/Renamed;"]);
    assert!(!logger.has_errors());
}

#[test]
fn second_claim_on_same_target_fails_and_first_wins() {
    let mut edit = tagged(class("La/B;"), Action::Edit);
    edit.source_file = Some("patched.java".to_owned());
    let remove = tagged(class("La/B;"), Action::Remove);

    let (out, logger) = merge(vec![class("La/B;")], vec![edit, remove]);
    assert_eq!(descriptors(&out), vec!["La/B;"]);
    assert_eq!(out[0].source_file.as_deref(), Some("patched.java"));
    assert_eq!(logger.error_count(), 1);
}

#[test]
fn ignore_round_trips_sources_unchanged() {
    let mut source = class("La/B;");
    source.instance_fields.push(field("x", "I"));

    let mut ignored = tagged(class("La/B;"), Action::Ignore);
    ignored.instance_fields.push(field("never_lands", "I"));

    let (out, logger) = merge(vec![source.clone()], vec![ignored]);
    assert_eq!(out, vec![source]);
    assert!(!logger.has_errors());
}

#[test]
fn output_carries_no_directive_annotations() {
    let mut patch = tagged(class("La/B;"), Action::Edit);
    patch = with_element(patch, "defaultAction", action_value("ADD"));
    patch
        .instance_fields
        .push(tagged_field("x", "I", Action::Add));
    patch
        .virtual_methods
        .push(tagged_method("run", &[], "V", &["nop"], Action::Add));

    let (out, logger) = merge(vec![class("La/B;"), class("Lc/C;")], vec![patch]);
    assert!(!logger.has_errors());
    for c in &out {
        assert!(c.annotations.iter().all(|a| !a.type_desc.starts_with("Ldexpatcher/")));
        for f in c.static_fields.iter().chain(&c.instance_fields) {
            assert!(f.annotations.is_empty());
        }
        for m in c.direct_methods.iter().chain(&c.virtual_methods) {
            assert!(m.annotations.is_empty());
        }
    }
}

#[test]
fn default_action_governs_all_untagged_members() {
    let mut target = class("La/B;");
    target.virtual_methods.push(method("a", &[], "V", &["old"]));
    target.virtual_methods.push(method("b", &[], "V", &["old"]));

    let mut patch = tagged(class("La/B;"), Action::Edit);
    patch = with_element(patch, "defaultAction", action_value("REPLACE"));
    patch.virtual_methods.push(method("a", &[], "V", &["new"]));
    patch.virtual_methods.push(method("b", &[], "V", &["new"]));

    let (out, logger) = merge(vec![target], vec![patch]);
    assert!(!logger.has_errors());
    for m in &out[0].virtual_methods {
        assert_eq!(opcodes(m), vec!["new"]);
    }
}

// -- static constructor handling --

fn clinit(ops: &[&str]) -> bytepatch::model::DexMethod {
    let mut m = method("<clinit>", &[], "V", ops);
    m.modifiers = Modifiers::STATIC | Modifiers::CONSTRUCTOR;
    m
}

#[test]
fn untagged_static_constructor_appends_to_existing_one() {
    let mut target = class("La/B;");
    target.direct_methods.push(clinit(&["old-init"]));

    let mut patch = tagged(class("La/B;"), Action::Edit);
    patch.direct_methods.push(clinit(&["new-init"]));

    let (out, logger) = merge(vec![target], vec![patch]);
    assert!(!logger.has_errors());
    assert_eq!(out[0].direct_methods.len(), 1);
    assert_eq!(opcodes(&out[0].direct_methods[0]), vec!["old-init", "new-init"]);
}

#[test]
fn untagged_static_constructor_added_when_source_has_none() {
    let mut patch = tagged(class("La/B;"), Action::Edit);
    patch.direct_methods.push(clinit(&["init"]));

    let (out, logger) = merge(vec![class("La/B;")], vec![patch]);
    assert!(!logger.has_errors());
    assert_eq!(opcodes(&out[0].direct_methods[0]), vec!["init"]);
}

#[test]
fn static_constructor_action_none_disables_safety_net() {
    let mut target = class("La/B;");
    target.direct_methods.push(clinit(&["old-init"]));

    let mut patch = tagged(class("La/B;"), Action::Edit);
    patch = with_element(patch, "staticConstructorAction", action_value("NONE"));
    patch.direct_methods.push(clinit(&["new-init"]));

    let (out, logger) = merge(vec![target], vec![patch]);
    // With the net disabled and no default action, the member fails.
    assert_eq!(logger.error_count(), 1);
    assert_eq!(opcodes(&out[0].direct_methods[0]), vec!["old-init"]);
}

#[test]
fn static_constructor_action_replace_overrides_append() {
    let mut target = class("La/B;");
    target.direct_methods.push(clinit(&["old-init"]));

    let mut patch = tagged(class("La/B;"), Action::Edit);
    patch = with_element(patch, "staticConstructorAction", action_value("REPLACE"));
    patch.direct_methods.push(clinit(&["new-init"]));

    let (out, logger) = merge(vec![target], vec![patch]);
    assert!(!logger.has_errors());
    assert_eq!(opcodes(&out[0].direct_methods[0]), vec!["new-init"]);
}

// -- method splices --

#[test]
fn wrap_splices_target_body_at_anchor() {
    let mut target = class("La/B;");
    target
        .virtual_methods
        .push(method("run", &[], "V", &["original-a", "original-b"]));

    let mut patch = tagged(class("La/B;"), Action::Edit);
    patch.virtual_methods.push(tagged_method(
        "run",
        &[],
        "V",
        &["before", "invoke-original", "after"],
        Action::Wrap,
    ));

    let (out, logger) = merge(vec![target], vec![patch]);
    assert!(!logger.has_errors());
    assert_eq!(
        opcodes(&out[0].virtual_methods[0]),
        vec!["before", "original-a", "original-b", "after"]
    );
}

#[test]
fn wrap_without_anchor_is_rejected() {
    let mut target = class("La/B;");
    target.virtual_methods.push(method("run", &[], "V", &["op"]));

    let mut patch = tagged(class("La/B;"), Action::Edit);
    patch
        .virtual_methods
        .push(tagged_method("run", &[], "V", &["no-anchor"], Action::Wrap));

    let (out, logger) = merge(vec![target], vec![patch]);
    assert_eq!(logger.error_count(), 1);
    assert_eq!(opcodes(&out[0].virtual_methods[0]), vec!["op"]);
}

#[test]
fn prepend_and_append_concatenate_bodies() {
    let mut target = class("La/B;");
    target.virtual_methods.push(method("pre", &[], "V", &["mid"]));
    target.virtual_methods.push(method("post", &[], "V", &["mid"]));

    let mut patch = tagged(class("La/B;"), Action::Edit);
    patch
        .virtual_methods
        .push(tagged_method("pre", &[], "V", &["first"], Action::Prepend));
    patch
        .virtual_methods
        .push(tagged_method("post", &[], "V", &["last"], Action::Append));

    let (out, logger) = merge(vec![target], vec![patch]);
    assert!(!logger.has_errors());
    assert_eq!(opcodes(&out[0].virtual_methods[0]), vec!["first", "mid"]);
    assert_eq!(opcodes(&out[0].virtual_methods[1]), vec!["mid", "last"]);
}

#[test]
fn marker_parameter_edit_targets_unmarked_method_in_place() {
    let mut target = class("La/B;");
    target.virtual_methods.push(method("run", &["I"], "V", &["old"]));
    target.virtual_methods.push(method("zzz", &[], "V", &["keep"]));

    let mut patch = tagged(class("La/B;"), Action::Edit);
    patch.virtual_methods.push(tagged_method(
        "run",
        &["I", "Ldexpatcher/tag/Target;"],
        "V",
        &["new"],
        Action::Edit,
    ));

    let (out, logger) = merge(vec![target], vec![patch]);
    assert!(!logger.has_errors());
    // Position preserved, marker parameter gone, register reserved.
    let edited = &out[0].virtual_methods[0];
    assert_eq!(edited.name, "run");
    assert_eq!(edited.parameters, vec!["I".to_owned()]);
    assert_eq!(opcodes(edited), vec!["new"]);
    assert_eq!(edited.body.as_ref().unwrap().registers, 3);
    assert_eq!(out[0].virtual_methods[1].name, "zzz");
}

// -- package markers --

#[test]
fn recursive_package_replace_swaps_subtree_for_marker() {
    let marker = with_element(
        tagged(class("Lx/package-info;"), Action::Replace),
        "recursive",
        AnnotationValue::Bool(true),
    );
    let (out, logger) = merge(
        vec![
            class("Lx/A;"),
            class("Lx/deep/B;"),
            class("Lkeep/C;"),
        ],
        vec![with_element(marker, "target", str_value("x"))],
    );
    assert!(!logger.has_errors());
    assert_eq!(descriptors(&out), vec!["Lkeep/C;", "Lx/package-info;"]);
}

#[test]
fn package_remove_spares_other_packages() {
    let patch = tagged(class("Lgone/package-info;"), Action::Remove);
    let (out, logger) = merge(
        vec![class("Lgone/A;"), class("Lgone/B;"), class("Lstay/C;")],
        vec![patch],
    );
    assert!(!logger.has_errors());
    assert_eq!(descriptors(&out), vec!["Lstay/C;"]);
}

// -- cross-class reference rewriting --

#[test]
fn renaming_edit_rewrites_internal_references() {
    let mut target = class("La/Old;");
    target.instance_fields.push(field("self_ref", "La/Old;"));
    target
        .virtual_methods
        .push(method("make", &["La/Old;"], "La/Old;", &["nop"]));

    let patch = with_element(
        tagged(class("La/New;"), Action::Edit),
        "target",
        str_value("Old"),
    );

    let (out, logger) = merge(vec![target], vec![patch]);
    assert!(!logger.has_errors());
    let renamed = &out[0];
    assert_eq!(renamed.descriptor.as_str(), "La/New;");
    assert_eq!(renamed.instance_fields[0].type_desc, "La/New;");
    assert_eq!(renamed.virtual_methods[0].parameters, vec!["La/New;".to_owned()]);
    assert_eq!(renamed.virtual_methods[0].return_type, "La/New;");
}

// -- multi-round merging --

#[test]
fn sequential_patches_feed_forward() {
    let mut logger = Logger::new(Level::None);

    let round1 = vec![class("Lnew/First;")];
    let round2 = vec![tagged(class("Lnew/First;"), Action::Remove), class("Lnew/Second;")];

    let classes = patch_classes(&mut logger, vec![class("La/A;")], &round1, true).unwrap();
    let classes = patch_classes(&mut logger, classes, &round2, true).unwrap();

    assert!(!logger.has_errors());
    assert_eq!(descriptors(&classes), vec!["La/A;", "Lnew/Second;"]);
}

#[test]
fn duplicate_source_ids_reported_and_later_dropped() {
    let mut a1 = class("La/A;");
    a1.source_file = Some("first.java".to_owned());
    let mut a2 = class("La/A;");
    a2.source_file = Some("second.java".to_owned());

    let (out, logger) = merge(vec![a1, a2], vec![]);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].source_file.as_deref(), Some("first.java"));
    assert_eq!(logger.error_count(), 1);
}

#[test]
fn conflicting_directives_on_one_class_fail_that_class_only() {
    let mut bad = tagged(class("La/B;"), Action::Edit);
    bad.annotations
        .push(Annotation::marker(Action::Remove.directive_type().unwrap()));

    let (out, logger) = merge(
        vec![class("La/B;")],
        vec![bad, class("Lc/Added;")],
    );
    assert_eq!(descriptors(&out), vec!["La/B;", "Lc/Added;"]);
    assert_eq!(logger.error_count(), 1);
}
