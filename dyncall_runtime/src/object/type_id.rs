//! Runtime type identifiers.
//!
//! Every value carries a `TypeId` that guards compare against. Builtin
//! value kinds occupy the low range; user classes and host (foreign) types
//! are allocated from `FIRST_USER_TYPE` upward by the type registry.

use std::fmt;

/// Compact runtime type identifier.
///
/// Equality is the only operation guards perform on it, so it is kept
/// as a plain `u32` newtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeId(pub u32);

impl TypeId {
    /// The `None` value.
    pub const NONE: Self = Self(0);
    /// Booleans.
    pub const BOOL: Self = Self(1);
    /// 64-bit signed integers.
    pub const INT: Self = Self(2);
    /// 64-bit floats.
    pub const FLOAT: Self = Self(3);
    /// Immutable strings.
    pub const STR: Self = Self(4);
    /// Immutable byte sequences.
    pub const BYTES: Self = Self(5);
    /// Class values used as receivers of static and constructor calls.
    pub const CLASS: Self = Self(6);

    /// First id handed out to user-defined classes and foreign types.
    pub const FIRST_USER_TYPE: u32 = 256;

    /// Create a type id from its raw value.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw numeric value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Check whether this id belongs to a builtin value kind.
    #[inline]
    pub const fn is_builtin(self) -> bool {
        self.0 < Self::FIRST_USER_TYPE
    }

    /// Name of a builtin value kind, if this is one.
    pub const fn builtin_name(self) -> Option<&'static str> {
        match self {
            Self::NONE => Some("None"),
            Self::BOOL => Some("bool"),
            Self::INT => Some("int"),
            Self::FLOAT => Some("float"),
            Self::STR => Some("str"),
            Self::BYTES => Some("bytes"),
            Self::CLASS => Some("class"),
            _ => None,
        }
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.builtin_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "type#{}", self.0),
        }
    }
}
