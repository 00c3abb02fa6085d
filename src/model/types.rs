//! Foundation types for the item model.
//!
//! Validated identifiers ([`TypeId`], [`ItemId`]), the access-flag bitset
//! ([`Modifiers`]), and the validation error they share. Identifiers are the
//! merge keys of the patch engine: they are derived deterministically from an
//! item's shape and are stable under non-renaming edits.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// Error returned when an identifier string fails validation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} `{value}`: {reason}")]
pub struct ValidationError {
    /// What kind of identifier was being validated (e.g. `"type descriptor"`).
    pub kind: &'static str,
    /// The raw value that failed.
    pub value: String,
    /// Why validation failed.
    pub reason: String,
}

// ---------------------------------------------------------------------------
// TypeId
// ---------------------------------------------------------------------------

/// A validated fully-qualified binary type descriptor, e.g. `Lcom/example/Foo;`.
///
/// This is the merge key for class items. The descriptor form (leading `L`,
/// `/`-separated package segments, trailing `;`) is used verbatim so that
/// instruction operands and member type references can be compared by plain
/// string equality.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeId(String);

impl TypeId {
    /// Create a new `TypeId` from a descriptor string, validating format.
    ///
    /// # Errors
    /// Returns an error if the string is not of the form `L<segments>;` with
    /// non-empty `/`-separated segments.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Build a `TypeId` from a dotted class name, e.g. `com.example.Foo`.
    ///
    /// # Errors
    /// Returns an error if the dotted name is empty or has empty segments.
    pub fn from_dotted(name: &str) -> Result<Self, ValidationError> {
        let descriptor = format!("L{};", name.replace('.', "/"));
        Self::new(&descriptor)
    }

    /// Return the inner descriptor string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The simple (unqualified) class name, e.g. `Foo` for `Lcom/example/Foo;`.
    #[must_use]
    pub fn simple_name(&self) -> &str {
        let inner = &self.0[1..self.0.len() - 1];
        inner.rsplit('/').next().unwrap_or(inner)
    }

    /// The package prefix including the leading `L` and trailing `/`,
    /// e.g. `Lcom/example/` for `Lcom/example/Foo;`. Empty-package types
    /// yield just `L`.
    #[must_use]
    pub fn package_prefix(&self) -> &str {
        match self.0.rfind('/') {
            Some(i) => &self.0[..=i],
            None => &self.0[..1],
        }
    }

    fn validate(s: &str) -> Result<(), ValidationError> {
        let err = |reason: &str| ValidationError {
            kind: "type descriptor",
            value: s.to_owned(),
            reason: reason.to_owned(),
        };
        if !s.starts_with('L') || !s.ends_with(';') || s.len() < 3 {
            return Err(err("expected `L<name>;` descriptor form"));
        }
        let inner = &s[1..s.len() - 1];
        if inner.split('/').any(str::is_empty) {
            return Err(err("empty package or class segment"));
        }
        if inner.contains(|c: char| c == ';' || c == '.' || c.is_whitespace()) {
            return Err(err("segment contains `;`, `.`, or whitespace"));
        }
        Ok(())
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TypeId {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TypeId {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<TypeId> for String {
    fn from(id: TypeId) -> Self {
        id.0
    }
}

// ---------------------------------------------------------------------------
// ItemId
// ---------------------------------------------------------------------------

/// A shape-derived merge key for any patchable item.
///
/// Formats by item kind:
/// - class: the full type descriptor (`Lcom/example/Foo;`)
/// - field: `name:type` (`count:I`)
/// - method: `name(paramTypes)returnType` (`run(ILjava/lang/String;)V`)
///
/// `ItemId` is deliberately unvalidated: it is always constructed by the
/// item model from already-validated parts.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(String);

impl ItemId {
    /// Wrap a pre-formatted identifier string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Return the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<TypeId> for ItemId {
    fn from(id: TypeId) -> Self {
        Self(id.0)
    }
}

impl From<&TypeId> for ItemId {
    fn from(id: &TypeId) -> Self {
        Self(id.as_str().to_owned())
    }
}

// ---------------------------------------------------------------------------
// Modifiers
// ---------------------------------------------------------------------------

bitflags::bitflags! {
    /// Access-flag bitset shared by classes, fields, and methods.
    ///
    /// Mirrors the DEX access-flag encoding. Modifiers are used only for
    /// diagnostic comparison between a target item and its replacement —
    /// never for identity.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u32 {
        const PUBLIC = 0x1;
        const PRIVATE = 0x2;
        const PROTECTED = 0x4;
        const STATIC = 0x8;
        const FINAL = 0x10;
        const SYNCHRONIZED = 0x20;
        /// `VOLATILE` for fields, `BRIDGE` for methods.
        const VOLATILE = 0x40;
        /// `TRANSIENT` for fields, `VARARGS` for methods.
        const TRANSIENT = 0x80;
        const NATIVE = 0x100;
        const INTERFACE = 0x200;
        const ABSTRACT = 0x400;
        const STRICT = 0x800;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const CONSTRUCTOR = 0x1_0000;
        const DECLARED_SYNCHRONIZED = 0x2_0000;
    }
}

impl Modifiers {
    /// Modifiers visible at call sites: changing these alters the item's
    /// contract as seen by other code.
    pub const INTERFACE_RELEVANT: Self = Self::PUBLIC
        .union(Self::PRIVATE)
        .union(Self::PROTECTED)
        .union(Self::STATIC)
        .union(Self::FINAL)
        .union(Self::VOLATILE)
        .union(Self::TRANSIENT)
        .union(Self::INTERFACE)
        .union(Self::ABSTRACT)
        .union(Self::ANNOTATION)
        .union(Self::ENUM)
        .union(Self::CONSTRUCTOR);

    /// Modifiers that only affect the item's own implementation.
    pub const IMPLEMENTATION_RELEVANT: Self = Self::SYNCHRONIZED
        .union(Self::NATIVE)
        .union(Self::STRICT)
        .union(Self::SYNTHETIC)
        .union(Self::DECLARED_SYNCHRONIZED);
}

impl Serialize for Modifiers {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Modifiers {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = u32::deserialize(deserializer)?;
        Self::from_bits(bits)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid modifier bits: {bits:#x}")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_id_valid_descriptor() {
        let id = TypeId::new("Lcom/example/Foo;").unwrap();
        assert_eq!(id.as_str(), "Lcom/example/Foo;");
        assert_eq!(id.simple_name(), "Foo");
        assert_eq!(id.package_prefix(), "Lcom/example/");
    }

    #[test]
    fn type_id_default_package() {
        let id = TypeId::new("LFoo;").unwrap();
        assert_eq!(id.simple_name(), "Foo");
        assert_eq!(id.package_prefix(), "L");
    }

    #[test]
    fn type_id_from_dotted() {
        let id = TypeId::from_dotted("com.example.Foo").unwrap();
        assert_eq!(id.as_str(), "Lcom/example/Foo;");
    }

    #[test]
    fn type_id_rejects_malformed() {
        assert!(TypeId::new("com/example/Foo").is_err());
        assert!(TypeId::new("L;").is_err());
        assert!(TypeId::new("Lcom//Foo;").is_err());
        assert!(TypeId::new("Lcom.example.Foo;").is_err());
    }

    #[test]
    fn item_id_from_type_id() {
        let id: ItemId = TypeId::new("La/B;").unwrap().into();
        assert_eq!(id.as_str(), "La/B;");
    }

    #[test]
    fn modifier_masks_are_disjoint() {
        assert!((Modifiers::INTERFACE_RELEVANT & Modifiers::IMPLEMENTATION_RELEVANT).is_empty());
    }

    #[test]
    fn modifiers_serde_round_trip() {
        let m = Modifiers::PUBLIC | Modifiers::STATIC | Modifiers::FINAL;
        let json = serde_json::to_string(&m).unwrap();
        let back: Modifiers = serde_json::from_str(&json).unwrap();
        assert_eq!(m, back);
    }

    #[test]
    fn modifiers_reject_unknown_bits() {
        assert!(serde_json::from_str::<Modifiers>("1048576").is_err());
    }
}
