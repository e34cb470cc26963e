//! Typed cell values and the closed set of data types a column may declare.
//!
//! Header tokens name types with the short forms used by flat-file exports
//! (`int`, `long`, `float`, `double`, `boolean`, `byte`, `short`, `char`,
//! `datetime`, `uuid`); anything else resolves to [`Kind::Str`] when the
//! column is built, never at conversion time. Conversion itself is total:
//! a field that does not parse as its declared type yields `None`, it never
//! raises.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The data types a column header may declare.
///
/// `from_type_name` is deliberately total: unknown or unsupported type names
/// (`date`, `time`, `localdatetime`, `duration`, typos) silently become
/// [`Kind::Str`], so a malformed type token degrades to string data instead
/// of failing the whole file set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Str,
    I32,
    I64,
    F32,
    F64,
    Bool,
    I8,
    I16,
    Char,
    Timestamp,
    Uuid,
}

impl Kind {
    /// Resolve a header type token. Total; unknown names map to `Str`.
    pub fn from_type_name(name: &str) -> Kind {
        match name {
            "int" => Kind::I32,
            "long" => Kind::I64,
            "float" => Kind::F32,
            "double" => Kind::F64,
            "boolean" => Kind::Bool,
            "byte" => Kind::I8,
            "short" => Kind::I16,
            "char" => Kind::Char,
            "datetime" => Kind::Timestamp,
            "uuid" => Kind::Uuid,
            _ => Kind::Str,
        }
    }

    /// Convert one raw field into a typed value.
    ///
    /// Returns `None` when the text does not parse as this kind. Booleans
    /// follow the lenient convention of the exports this tool reads: any
    /// case-insensitive `true` is true, everything else is false. `Char`
    /// takes the first character of the field. Timestamps are ISO-8601 with
    /// an offset (RFC 3339) and are normalized to UTC.
    pub fn parse(&self, raw: &str) -> Option<Value> {
        match self {
            Kind::Str => Some(Value::Str(raw.to_string())),
            Kind::I32 => raw.parse::<i32>().ok().map(Value::I32),
            Kind::I64 => raw.parse::<i64>().ok().map(Value::I64),
            Kind::F32 => raw.parse::<f32>().ok().map(Value::F32),
            Kind::F64 => raw.parse::<f64>().ok().map(Value::F64),
            Kind::Bool => Some(Value::Bool(raw.eq_ignore_ascii_case("true"))),
            Kind::I8 => raw.parse::<i8>().ok().map(Value::I8),
            Kind::I16 => raw.parse::<i16>().ok().map(Value::I16),
            Kind::Char => raw.chars().next().map(Value::Char),
            Kind::Timestamp => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|ts| Value::Timestamp(ts.with_timezone(&Utc))),
            Kind::Uuid => Uuid::parse_str(raw).ok().map(Value::Uuid),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Str => "string",
            Kind::I32 => "int",
            Kind::I64 => "long",
            Kind::F32 => "float",
            Kind::F64 => "double",
            Kind::Bool => "boolean",
            Kind::I8 => "byte",
            Kind::I16 => "short",
            Kind::Char => "char",
            Kind::Timestamp => "datetime",
            Kind::Uuid => "uuid",
        };
        f.write_str(name)
    }
}

/// One converted cell.
///
/// Values key the identifier map, so equality and hashing must be total:
/// floats compare and hash by bit pattern. The same business id written as
/// `1` in an `int` column and a `long` column produces two distinct keys;
/// the declared type is part of the identity, exactly as it is part of the
/// stored property.
#[derive(Debug, Clone)]
pub enum Value {
    Str(String),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Bool(bool),
    I8(i8),
    I16(i16),
    Char(char),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
}

impl Value {
    /// The kind this value was converted as.
    pub fn kind(&self) -> Kind {
        match self {
            Value::Str(_) => Kind::Str,
            Value::I32(_) => Kind::I32,
            Value::I64(_) => Kind::I64,
            Value::F32(_) => Kind::F32,
            Value::F64(_) => Kind::F64,
            Value::Bool(_) => Kind::Bool,
            Value::I8(_) => Kind::I8,
            Value::I16(_) => Kind::I16,
            Value::Char(_) => Kind::Char,
            Value::Timestamp(_) => Kind::Timestamp,
            Value::Uuid(_) => Kind::Uuid,
        }
    }

    /// Borrow the string payload, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a.to_bits() == b.to_bits(),
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Uuid(a), Value::Uuid(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        mem::discriminant(self).hash(state);
        match self {
            Value::Str(v) => v.hash(state),
            Value::I32(v) => v.hash(state),
            Value::I64(v) => v.hash(state),
            Value::F32(v) => v.to_bits().hash(state),
            Value::F64(v) => v.to_bits().hash(state),
            Value::Bool(v) => v.hash(state),
            Value::I8(v) => v.hash(state),
            Value::I16(v) => v.hash(state),
            Value::Char(v) => v.hash(state),
            Value::Timestamp(v) => v.hash(state),
            Value::Uuid(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(v) => f.write_str(v),
            Value::I32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::F32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::I8(v) => write!(f, "{}", v),
            Value::I16(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "{}", v),
            Value::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Uuid(v) => write!(f, "{}", v),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
