//! Guest-side values.
//!
//! [`GuestValue`] is the representation compiled guest code receives and
//! returns. It distinguishes integer widths, strongly typed dictionaries and
//! structural [`DynamicObject`]s, which the host side does not.

use std::collections::BTreeMap;

/// A value on the guest side of the bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum GuestValue {
    /// Null reference.
    Null,
    /// Boolean.
    Bool(bool),
    /// 32-bit integer.
    Int(i32),
    /// 64-bit integer.
    Long(i64),
    /// Double precision float.
    Double(f64),
    /// Single character.
    Char(char),
    /// String.
    String(String),
    /// Byte array.
    Bytes(Vec<u8>),
    /// GUID, returned to the host as its hyphenated string form.
    Guid(uuid::Uuid),
    /// Enum member, returned to the host as the member name.
    Enum {
        /// Enum type name.
        type_name: String,
        /// Member name.
        member: String,
    },
    /// Ordered collection.
    List(Vec<GuestValue>),
    /// Keyed collection of string to value.
    Dictionary(BTreeMap<String, GuestValue>),
    /// Structural object with duck-typed member access.
    Dynamic(DynamicObject),
    /// A guest object the bridge has no mapping for, by type name.
    Opaque(String),
}

impl GuestValue {
    /// Borrow the string payload, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Name of the guest type, for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "Boolean",
            Self::Int(_) => "Int32",
            Self::Long(_) => "Int64",
            Self::Double(_) => "Double",
            Self::Char(_) => "Char",
            Self::String(_) => "String",
            Self::Bytes(_) => "Byte[]",
            Self::Guid(_) => "Guid",
            Self::Enum { type_name, .. } | Self::Opaque(type_name) => type_name,
            Self::List(_) => "List",
            Self::Dictionary(_) => "Dictionary",
            Self::Dynamic(_) => "DynamicObject",
        }
    }

    /// Member access with the guest's `ToString()` semantics for keyed values:
    /// works on both dictionaries and dynamic objects.
    #[must_use]
    pub fn member(&self, name: &str) -> Option<&GuestValue> {
        match self {
            Self::Dictionary(map) => map.get(name),
            Self::Dynamic(object) => object.get(name),
            _ => None,
        }
    }
}

impl std::fmt::Display for GuestValue {
    /// The guest's `ToString()` rendering.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Long(n) => write!(f, "{n}"),
            Self::Double(n) => write!(f, "{n}"),
            Self::Char(c) => write!(f, "{c}"),
            Self::String(s) => f.write_str(s),
            Self::Bytes(_) => f.write_str("System.Byte[]"),
            Self::Guid(g) => write!(f, "{}", g.hyphenated()),
            Self::Enum { member, .. } => f.write_str(member),
            Self::List(_) | Self::Dictionary(_) | Self::Dynamic(_) | Self::Opaque(_) => {
                f.write_str(self.type_name())
            },
        }
    }
}

impl From<&str> for GuestValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for GuestValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// A structural object: members are read and written by name without a
/// predeclared schema. Nested objects are themselves dynamic, so member
/// paths like `a.b.c` mirror the nesting the caller supplied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicObject {
    members: BTreeMap<String, GuestValue>,
}

impl DynamicObject {
    /// Create an empty object.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a member.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&GuestValue> {
        self.members.get(name)
    }

    /// Read a dotted member path such as `nested.text`.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&GuestValue> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.members.get(first)?;
        for segment in segments {
            current = current.member(segment)?;
        }
        Some(current)
    }

    /// Write a member, returning the previous value.
    pub fn set(&mut self, name: impl Into<String>, value: GuestValue) -> Option<GuestValue> {
        self.members.insert(name.into(), value)
    }

    /// Member names in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the object has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Consume the object, yielding its members.
    #[must_use]
    pub fn into_members(self) -> BTreeMap<String, GuestValue> {
        self.members
    }
}

impl FromIterator<(String, GuestValue)> for DynamicObject {
    fn from_iter<T: IntoIterator<Item = (String, GuestValue)>>(iter: T) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}

/// How a guest method declares its single parameter. Drives the shape the
/// marshaler produces for host objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Untyped object: host objects arrive as dictionaries.
    #[default]
    Object,
    /// Strongly typed string-keyed dictionary.
    Dictionary,
    /// Dynamic/structural: host objects arrive as [`DynamicObject`]s.
    Dynamic,
}
