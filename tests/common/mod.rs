//! Shared builders for the integration suites.
#![allow(dead_code)] // not every suite uses every builder

use bytepatch::log::{Level, Logger};
use bytepatch::model::{
    Annotation, AnnotationValue, DexClass, DexField, DexMethod, Instruction, MethodBody, Modifiers,
    TypeId,
};
use bytepatch::patch::{patch_classes, Action};

pub fn class(descriptor: &str) -> DexClass {
    DexClass {
        descriptor: TypeId::new(descriptor).unwrap(),
        modifiers: Modifiers::PUBLIC,
        superclass: Some("Ljava/lang/Object;".to_owned()),
        interfaces: vec![],
        source_file: None,
        annotations: vec![],
        static_fields: vec![],
        instance_fields: vec![],
        direct_methods: vec![],
        virtual_methods: vec![],
    }
}

/// Attach a directive tag for `action` to the class.
pub fn tagged(mut c: DexClass, action: Action) -> DexClass {
    c.annotations
        .push(Annotation::marker(action.directive_type().unwrap()));
    c
}

/// Set an element on the last (directive) annotation.
pub fn with_element(mut c: DexClass, name: &str, value: AnnotationValue) -> DexClass {
    c.annotations
        .last_mut()
        .unwrap()
        .elements
        .insert(name.to_owned(), value);
    c
}

pub fn str_value(s: &str) -> AnnotationValue {
    AnnotationValue::Str(s.to_owned())
}

pub fn action_value(constant: &str) -> AnnotationValue {
    AnnotationValue::Enum {
        type_desc: "Ldexpatcher/annotation/DexAction;".to_owned(),
        variant: constant.to_owned(),
    }
}

pub fn field(name: &str, type_desc: &str) -> DexField {
    DexField {
        name: name.to_owned(),
        type_desc: type_desc.to_owned(),
        modifiers: Modifiers::PRIVATE,
        annotations: vec![],
        initial_value: None,
    }
}

pub fn tagged_field(name: &str, type_desc: &str, action: Action) -> DexField {
    let mut f = field(name, type_desc);
    f.annotations
        .push(Annotation::marker(action.directive_type().unwrap()));
    f
}

pub fn method(name: &str, parameters: &[&str], return_type: &str, ops: &[&str]) -> DexMethod {
    DexMethod {
        name: name.to_owned(),
        parameters: parameters.iter().map(|p| (*p).to_owned()).collect(),
        return_type: return_type.to_owned(),
        modifiers: Modifiers::PUBLIC,
        annotations: vec![],
        body: Some(MethodBody {
            registers: 2,
            instructions: ops.iter().map(|op| Instruction::new(*op, vec![])).collect(),
        }),
    }
}

pub fn tagged_method(
    name: &str,
    parameters: &[&str],
    return_type: &str,
    ops: &[&str],
    action: Action,
) -> DexMethod {
    let mut m = method(name, parameters, return_type, ops);
    m.annotations
        .push(Annotation::marker(action.directive_type().unwrap()));
    m
}

/// Run a merge with directive stripping on, collecting all diagnostics.
pub fn merge(sources: Vec<DexClass>, patches: Vec<DexClass>) -> (Vec<DexClass>, Logger) {
    let mut logger = Logger::new(Level::None);
    let merged = patch_classes(&mut logger, sources, &patches, true).unwrap();
    (merged, logger)
}

pub fn descriptors(classes: &[DexClass]) -> Vec<&str> {
    classes.iter().map(|c| c.descriptor.as_str()).collect()
}

pub fn opcodes(m: &DexMethod) -> Vec<&str> {
    m.body
        .as_ref()
        .map(|b| b.instructions.iter().map(|i| i.opcode.as_str()).collect())
        .unwrap_or_default()
}
