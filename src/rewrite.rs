//! Reference rewriter: substitute one type identifier for another throughout
//! a class's internal structure.
//!
//! Used by the class specialization when an edit crosses identifiers: the
//! target's members must refer to the new name before they are merged, and
//! the patch's references to the old name must be redirected too.
//!
//! Substitution is textual over descriptor occurrences. The trailing `;` of a
//! descriptor makes embedded matches unambiguous: `La/Foo;` never matches
//! inside `La/Foo2;`.

use crate::model::{Annotation, AnnotationValue, DexClass, DexField, DexMethod, TypeId};

/// Replace every internal reference to `from` with `to`, returning a new
/// class. The input is left untouched.
#[must_use]
pub fn rename_class(class: &DexClass, from: &TypeId, to: &TypeId) -> DexClass {
    let subst = |s: &str| substitute(s, from, to);

    let descriptor = if class.descriptor == *from {
        to.clone()
    } else {
        class.descriptor.clone()
    };

    DexClass {
        descriptor,
        modifiers: class.modifiers,
        superclass: class.superclass.as_deref().map(subst),
        interfaces: class.interfaces.iter().map(|i| subst(i)).collect(),
        source_file: class.source_file.clone(),
        annotations: class
            .annotations
            .iter()
            .map(|a| rename_annotation(a, from, to))
            .collect(),
        static_fields: class
            .static_fields
            .iter()
            .map(|f| rename_field(f, from, to))
            .collect(),
        instance_fields: class
            .instance_fields
            .iter()
            .map(|f| rename_field(f, from, to))
            .collect(),
        direct_methods: class
            .direct_methods
            .iter()
            .map(|m| rename_method(m, from, to))
            .collect(),
        virtual_methods: class
            .virtual_methods
            .iter()
            .map(|m| rename_method(m, from, to))
            .collect(),
    }
}

fn rename_field(field: &DexField, from: &TypeId, to: &TypeId) -> DexField {
    DexField {
        name: field.name.clone(),
        type_desc: substitute(&field.type_desc, from, to),
        modifiers: field.modifiers,
        annotations: field
            .annotations
            .iter()
            .map(|a| rename_annotation(a, from, to))
            .collect(),
        initial_value: field.initial_value.clone(),
    }
}

fn rename_method(method: &DexMethod, from: &TypeId, to: &TypeId) -> DexMethod {
    let mut renamed = method.clone();
    for parameter in &mut renamed.parameters {
        *parameter = substitute(parameter, from, to);
    }
    renamed.return_type = substitute(&renamed.return_type, from, to);
    renamed.annotations = method
        .annotations
        .iter()
        .map(|a| rename_annotation(a, from, to))
        .collect();
    if let Some(body) = &mut renamed.body {
        for instruction in &mut body.instructions {
            for operand in &mut instruction.operands {
                *operand = substitute(operand, from, to);
            }
        }
    }
    renamed
}

fn rename_annotation(annotation: &Annotation, from: &TypeId, to: &TypeId) -> Annotation {
    let mut renamed = annotation.clone();
    for value in renamed.elements.values_mut() {
        if let AnnotationValue::Type(t) = value {
            *t = substitute(t, from, to);
        }
    }
    renamed
}

fn substitute(s: &str, from: &TypeId, to: &TypeId) -> String {
    if s.contains(from.as_str()) {
        s.replace(from.as_str(), to.as_str())
    } else {
        s.to_owned()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
