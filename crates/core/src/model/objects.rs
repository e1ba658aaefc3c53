//! Core PDF object types.

use crate::error::{Error, Result};
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use super::stream::Stream;

/// Indirect object identity: object number and generation number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    /// Object number
    pub num: u32,
    /// Generation number
    pub r#gen: u16,
}

impl Reference {
    pub const fn new(num: u32, r#gen: u16) -> Self {
        Self { num, r#gen }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.num, self.r#gen)
    }
}

/// Name object (e.g. /Type, /Font). Cheap to clone and compare; short
/// names are stored inline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(SmolStr);

impl Name {
    pub fn new(s: impl AsRef<str>) -> Self {
        Self(SmolStr::new(s.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Borrow<str> for Name {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        self.0.as_str() == other
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

/// Whether a string was written in literal `(...)` or hex `<...>` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringKind {
    Literal,
    Hex,
}

/// String object: raw bytes plus the indirect object that contains it.
///
/// The owner reference is stamped by the parser while the enclosing
/// object is still open; it is the decryption context handed to the
/// security manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfString {
    pub data: Vec<u8>,
    pub kind: StringKind,
    pub owner: Option<Reference>,
}

impl PdfString {
    pub fn literal(data: Vec<u8>, owner: Option<Reference>) -> Self {
        Self {
            data,
            kind: StringKind::Literal,
            owner,
        }
    }

    pub fn hex(data: Vec<u8>, owner: Option<Reference>) -> Self {
        Self {
            data,
            kind: StringKind::Hex,
            owner,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Dictionary: unordered Name -> Object map.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dictionary {
    entries: FxHashMap<Name, Object>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Object> {
        self.entries.get(key)
    }

    /// Look up the first present key from a list of alternatives.
    pub fn get_any(&self, keys: &[&str]) -> Option<&Object> {
        keys.iter().find_map(|k| self.entries.get(*k))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<Name>, value: Object) -> Option<Object> {
        self.entries.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Object> {
        self.entries.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Object)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Name> {
        self.entries.keys()
    }
}

impl FromIterator<(Name, Object)> for Dictionary {
    fn from_iter<T: IntoIterator<Item = (Name, Object)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Rectangle with normalized corners: (x0, y0) is the lower-left,
/// (x1, y1) the upper-right, regardless of the order written in the file.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }
}

/// The fundamental PDF value type.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating point) value
    Real(f64),
    /// Name object
    Name(Name),
    /// String (byte array with owner context)
    String(PdfString),
    /// Array of objects
    Array(Vec<Self>),
    /// Dictionary
    Dict(Dictionary),
    /// Stream (dictionary + lazily read payload)
    Stream(Arc<Stream>),
    /// Indirect object reference
    Reference(Reference),
}

impl Object {
    /// Check if this is the null object.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get as boolean.
    pub const fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            _ => Err(Error::Type {
                expected: "bool",
                got: self.type_name(),
            }),
        }
    }

    /// Get as integer.
    pub const fn as_int(&self) -> Result<i64> {
        match self {
            Self::Integer(n) => Ok(*n),
            _ => Err(Error::Type {
                expected: "integer",
                got: self.type_name(),
            }),
        }
    }

    /// Get numeric value (integer or real coerced to f64).
    pub const fn as_number(&self) -> Result<f64> {
        match self {
            Self::Integer(n) => Ok(*n as f64),
            Self::Real(n) => Ok(*n),
            _ => Err(Error::Type {
                expected: "number",
                got: self.type_name(),
            }),
        }
    }

    /// Get as name.
    pub fn as_name(&self) -> Result<&Name> {
        match self {
            Self::Name(n) => Ok(n),
            _ => Err(Error::Type {
                expected: "name",
                got: self.type_name(),
            }),
        }
    }

    /// Get as string.
    pub fn as_string(&self) -> Result<&PdfString> {
        match self {
            Self::String(s) => Ok(s),
            _ => Err(Error::Type {
                expected: "string",
                got: self.type_name(),
            }),
        }
    }

    /// Get as array.
    pub const fn as_array(&self) -> Result<&Vec<Self>> {
        match self {
            Self::Array(a) => Ok(a),
            _ => Err(Error::Type {
                expected: "array",
                got: self.type_name(),
            }),
        }
    }

    /// Get as dictionary. A stream answers with its dictionary.
    pub fn as_dict(&self) -> Result<&Dictionary> {
        match self {
            Self::Dict(d) => Ok(d),
            Self::Stream(s) => Ok(&s.dict),
            _ => Err(Error::Type {
                expected: "dict",
                got: self.type_name(),
            }),
        }
    }

    /// Get as stream.
    pub fn as_stream(&self) -> Result<&Arc<Stream>> {
        match self {
            Self::Stream(s) => Ok(s),
            _ => Err(Error::Type {
                expected: "stream",
                got: self.type_name(),
            }),
        }
    }

    /// Get as indirect reference.
    pub const fn as_reference(&self) -> Result<Reference> {
        match self {
            Self::Reference(r) => Ok(*r),
            _ => Err(Error::Type {
                expected: "reference",
                got: self.type_name(),
            }),
        }
    }

    /// Type name for diagnostics.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Name(_) => "name",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Dict(_) => "dict",
            Self::Stream(_) => "stream",
            Self::Reference(_) => "reference",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_display() {
        assert_eq!(Reference::new(12, 0).to_string(), "12 0 R");
        assert_eq!(Reference::new(3, 65535).to_string(), "3 65535 R");
    }

    #[test]
    fn test_name_str_lookup() {
        let mut dict = Dictionary::new();
        dict.insert(Name::new("Type"), Object::Name(Name::new("Page")));
        assert!(dict.contains("Type"));
        assert_eq!(
            dict.get("Type").and_then(|o| o.as_name().ok()),
            Some(&Name::new("Page"))
        );
        assert!(dict.get("type").is_none());
    }

    #[test]
    fn test_get_any_alias_order() {
        let mut dict = Dictionary::new();
        dict.insert("F", Object::Integer(1));
        dict.insert("Filter", Object::Integer(2));
        let got = dict.get_any(&["Filter", "F"]);
        assert_eq!(got.and_then(|o| o.as_int().ok()), Some(2));
    }

    #[test]
    fn test_accessor_type_errors() {
        let obj = Object::Integer(5);
        assert_eq!(obj.as_int().ok(), Some(5));
        assert_eq!(obj.as_number().ok(), Some(5.0));
        let err = obj.as_name().unwrap_err();
        assert_eq!(err.to_string(), "type error: expected name, got integer");
    }

    #[test]
    fn test_rect_normalizes_corners() {
        let r = Rect::new(10.0, 20.0, 2.0, 4.0);
        assert_eq!((r.x0, r.y0, r.x1, r.y1), (2.0, 4.0, 10.0, 20.0));
        assert_eq!(r.width(), 8.0);
        assert_eq!(r.height(), 16.0);
    }
}
