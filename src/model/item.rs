//! The patchable item model: classes, fields, methods, and their metadata.
//!
//! Items are plain immutable value types. The patch engine never mutates an
//! item in place: every handler builds a new value from a template. Each item
//! kind derives its [`ItemId`] merge key deterministically from its shape, so
//! an unedited item always keys to the same slot.
//!
//! Package markers are ordinary classes whose simple name is
//! [`PACKAGE_INFO`]; the class specialization recognizes them by identifier
//! shape and diverts bulk package actions.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::types::{ItemId, Modifiers, TypeId};

/// Simple name reserved for package marker classes.
pub const PACKAGE_INFO: &str = "package-info";

/// Method name of instance constructors.
pub const CONSTRUCTOR: &str = "<init>";

/// Method name of the static constructor (class initializer).
pub const STATIC_CONSTRUCTOR: &str = "<clinit>";

// ---------------------------------------------------------------------------
// Annotation
// ---------------------------------------------------------------------------

/// A value carried by an annotation element or a static field initializer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationValue {
    Bool(bool),
    Int(i64),
    Str(String),
    /// A type reference, stored in descriptor form.
    Type(String),
    /// An enum constant reference.
    Enum { type_desc: String, variant: String },
}

impl AnnotationValue {
    /// Short label for error messages ("bool", "string", ...).
    #[must_use]
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Str(_) => "string",
            Self::Type(_) => "type",
            Self::Enum { .. } => "enum",
        }
    }
}

/// A metadata tag attached to an item: a named annotation type plus its
/// element values. At most one annotation per item is a recognized patch
/// directive; all others pass through the merge unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Annotation type in descriptor form, e.g. `Ldexpatcher/annotation/DexEdit;`.
    pub type_desc: String,
    /// Named element values. A `BTreeMap` keeps serialized output stable.
    #[serde(default)]
    pub elements: BTreeMap<String, AnnotationValue>,
}

impl Annotation {
    /// Create an annotation with no elements.
    #[must_use]
    pub fn marker(type_desc: impl Into<String>) -> Self {
        Self {
            type_desc: type_desc.into(),
            elements: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// DexField
// ---------------------------------------------------------------------------

/// A field item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DexField {
    pub name: String,
    /// Field type in descriptor form (`I`, `Ljava/lang/String;`, ...).
    pub type_desc: String,
    pub modifiers: Modifiers,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    /// Encoded initial value for static fields (`None` when absent).
    #[serde(default)]
    pub initial_value: Option<AnnotationValue>,
}

impl DexField {
    /// The field's merge key: `name:type`.
    #[must_use]
    pub fn id(&self) -> ItemId {
        ItemId::new(format!("{}:{}", self.name, self.type_desc))
    }
}

// ---------------------------------------------------------------------------
// DexMethod
// ---------------------------------------------------------------------------

/// One instruction of a method body.
///
/// Instructions are opaque to the merge core: an opcode mnemonic plus operand
/// strings. Type references inside operands appear in descriptor form so the
/// reference rewriter can substitute them textually.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: String,
    #[serde(default)]
    pub operands: Vec<String>,
}

impl Instruction {
    /// Build an instruction from an opcode and operand list.
    #[must_use]
    pub fn new(opcode: impl Into<String>, operands: Vec<String>) -> Self {
        Self {
            opcode: opcode.into(),
            operands,
        }
    }
}

/// Executable body of a non-abstract, non-native method.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodBody {
    /// Number of register slots the body uses.
    pub registers: u32,
    pub instructions: Vec<Instruction>,
}

/// A method item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DexMethod {
    pub name: String,
    /// Parameter types in descriptor form, in declaration order.
    #[serde(default)]
    pub parameters: Vec<String>,
    /// Return type in descriptor form (`V` for void).
    pub return_type: String,
    pub modifiers: Modifiers,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    /// `None` for abstract and native methods.
    #[serde(default)]
    pub body: Option<MethodBody>,
}

impl DexMethod {
    /// The method's merge key: `name(paramTypes)returnType`.
    #[must_use]
    pub fn id(&self) -> ItemId {
        ItemId::new(Self::format_id(&self.name, &self.parameters, &self.return_type))
    }

    /// Format a method id from its parts.
    #[must_use]
    pub fn format_id(name: &str, parameters: &[String], return_type: &str) -> String {
        let mut s = String::with_capacity(name.len() + 16);
        s.push_str(name);
        s.push('(');
        for p in parameters {
            let _ = write!(s, "{p}");
        }
        s.push(')');
        s.push_str(return_type);
        s
    }

    /// Returns `true` for instance constructors (`<init>`).
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR
    }

    /// Returns `true` for the static constructor (`<clinit>`).
    #[must_use]
    pub fn is_static_constructor(&self) -> bool {
        self.name == STATIC_CONSTRUCTOR
    }
}

// ---------------------------------------------------------------------------
// DexClass
// ---------------------------------------------------------------------------

/// A class item: header plus four member collections.
///
/// The member collections are kept separate (static/instance fields,
/// direct/virtual methods) because each is merged by its own member engine —
/// a patch member only ever targets the collection it is declared in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DexClass {
    pub descriptor: TypeId,
    pub modifiers: Modifiers,
    #[serde(default)]
    pub superclass: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub source_file: Option<String>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub static_fields: Vec<DexField>,
    #[serde(default)]
    pub instance_fields: Vec<DexField>,
    #[serde(default)]
    pub direct_methods: Vec<DexMethod>,
    #[serde(default)]
    pub virtual_methods: Vec<DexMethod>,
}

impl DexClass {
    /// The class's merge key: its full type descriptor.
    #[must_use]
    pub fn id(&self) -> ItemId {
        ItemId::from(&self.descriptor)
    }

    /// Returns `true` if this class is a package marker (`package-info`).
    #[must_use]
    pub fn is_package_marker(&self) -> bool {
        self.descriptor.simple_name() == PACKAGE_INFO
    }

    /// The static constructor declared by this class, if any.
    #[must_use]
    pub fn static_constructor(&self) -> Option<&DexMethod> {
        self.direct_methods.iter().find(|m| m.is_static_constructor())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
