//! Header mini-language: `name[:type][:role]`.
//!
//! One header field declares one column: the property it feeds, the declared
//! data type, and the structural role the column plays during ingestion.
//! Parsing is deterministic and almost total; the only fatal form is a
//! three-part header whose role token names no known role, because at that
//! point the author unambiguously meant a role and got it wrong.

use anyhow::{bail, Result};

use crate::value::{Kind, Value};

/// The structural role a column plays.
///
/// `Data` is the default: a plain property column. `Ignore` columns are
/// parsed but never stored. The remaining roles drive identifier
/// registration (`Id`), index creation (`Id`, `Unique`, `Index`), and edge
/// endpoint/label resolution (`StartId`, `EndId`, `Type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Id,
    Unique,
    Index,
    Data,
    StartId,
    EndId,
    Type,
    Ignore,
}

impl Role {
    /// Resolve a header role token. `None` when the token is not a role.
    pub fn from_token(token: &str) -> Option<Role> {
        match token {
            "ID" => Some(Role::Id),
            "UNIQUE" => Some(Role::Unique),
            "INDEX" => Some(Role::Index),
            "DATA" => Some(Role::Data),
            "START_ID" => Some(Role::StartId),
            "END_ID" => Some(Role::EndId),
            "TYPE" => Some(Role::Type),
            "IGNORE" => Some(Role::Ignore),
            _ => None,
        }
    }
}

/// One parsed header column: immutable, shared read-only across every row
/// of the file set.
#[derive(Debug, Clone)]
pub struct Column {
    /// Property name this column feeds. Empty means "no stored property".
    pub property: String,
    pub role: Role,
    pub kind: Kind,
}

impl Column {
    /// Parse one header field.
    ///
    /// - `name` → string-typed `Data` column.
    /// - `name:tok` → `tok` is tried as a role first; a non-role token is a
    ///   type name (and an unknown type name degrades to string).
    /// - `name:type:role` → no ambiguity resolution; an unknown role token
    ///   is fatal. Parts beyond the third are ignored.
    ///
    /// A column literally named `uuid` is forced to UUID type regardless of
    /// what the header declares.
    pub fn parse(header: &str) -> Result<Column> {
        let parts: Vec<&str> = header.split(':').collect();
        let name = parts[0];

        let (mut kind, role) = match parts.len() {
            1 => (Kind::Str, Role::Data),
            2 => match Role::from_token(parts[1]) {
                Some(role) => (Kind::Str, role),
                None => (Kind::from_type_name(parts[1]), Role::Data),
            },
            _ => match Role::from_token(parts[2]) {
                Some(role) => (Kind::from_type_name(parts[1]), role),
                None => bail!(
                    "unknown column role {:?} in header field {:?}",
                    parts[2],
                    header
                ),
            },
        };
        if name == "uuid" {
            kind = Kind::Uuid;
        }

        Ok(Column {
            property: name.to_string(),
            role,
            kind,
        })
    }

    /// Parse every field of a header row, in positional order.
    pub fn parse_headers(headers: &[String]) -> Result<Vec<Column>> {
        headers.iter().map(|h| Column::parse(h)).collect()
    }

    /// Convert one raw field for this column.
    ///
    /// `None` input (field absent from a short row) and empty fields both
    /// yield `None`; so does text that does not parse as the declared type.
    pub fn convert(&self, raw: Option<&str>) -> Option<Value> {
        let raw = raw?;
        if raw.is_empty() {
            return None;
        }
        self.kind.parse(raw)
    }
}

// ============================================================================
// Tests
// ============================================================================
