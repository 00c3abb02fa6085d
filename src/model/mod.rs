//! Item model: identifiers, modifiers, and the class/field/method value types.

pub mod item;
pub mod types;

pub use item::{
    Annotation, AnnotationValue, DexClass, DexField, DexMethod, Instruction, MethodBody,
    CONSTRUCTOR, PACKAGE_INFO, STATIC_CONSTRUCTOR,
};
pub use types::{ItemId, Modifiers, TypeId, ValidationError};
