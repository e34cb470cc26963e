//! Store contract consumed by the import pipeline.
//!
//! The pipeline never talks to a concrete database; it drives the three
//! traits here. [`GraphStore`] hands out two kinds of session:
//!
//! - [`MutationSession`]: a transaction scope for data writes. Writes are
//!   buffered until [`MutationSession::commit`]; dropping a session without
//!   committing discards its writes. Ingestors open one session at a time and
//!   roll it over at every checkpoint.
//! - [`SchemaSession`]: a transaction scope for catalog changes (property
//!   keys, labels, indexes) with the same commit-or-discard lifecycle, plus
//!   read-your-writes so one synchronization pass can create a property for
//!   one label and verify it for the next.
//!
//! Internal ids are opaque [`ElementId`]s issued by the store. Lookup by id
//! reports every match, so callers can implement their own policy for the
//! zero and many cases.
//!
//! [`store::memory`](memory) provides the in-process reference
//! implementation.

pub mod memory;

use std::fmt;

use anyhow::Result;

use crate::value::{Kind, Value};

// ============================================================================
// Identifiers and schema types
// ============================================================================

/// Store-internal element identifier.
///
/// Issued by the store when an element is created; never derived from row
/// data. Business identifiers map to these through the identifier map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

impl ElementId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ElementId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// How many values one property may hold per element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Single,
    List,
    Set,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Cardinality::Single => "SINGLE",
            Cardinality::List => "LIST",
            Cardinality::Set => "SET",
        };
        write!(f, "{}", s)
    }
}

/// Catalog entry for one property key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDef {
    pub name: String,
    pub kind: Kind,
    pub cardinality: Cardinality,
}

impl PropertyDef {
    /// A single-valued property of the given type, the only shape the
    /// importer ever creates.
    pub fn single(name: impl Into<String>, kind: Kind) -> Self {
        Self {
            name: name.into(),
            kind,
            cardinality: Cardinality::Single,
        }
    }
}

/// Catalog entry for one composite vertex index.
///
/// `label` scopes the index to vertices of one label; `None` is a global
/// index over every vertex carrying the property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub name: String,
    pub properties: Vec<String>,
    pub unique: bool,
    pub label: Option<String>,
}

// ============================================================================
// Session traits
// ============================================================================

/// A graph database the importer can load into.
///
/// Implementations are shared across worker threads; sessions must carry
/// their own handle to the underlying storage so they can outlive the
/// borrow that created them.
pub trait GraphStore: Send + Sync {
    /// Open a schema-management session.
    fn schema(&self) -> Result<Box<dyn SchemaSession>>;

    /// Open a data-mutation session.
    fn mutation(&self) -> Result<Box<dyn MutationSession>>;

    /// Discard all data and schema. Backs the drop-before-import option.
    fn wipe(&self) -> Result<()>;
}

/// Transaction scope for data writes.
///
/// Writes are visible to reads within the same session before commit.
/// Dropping the session without calling [`commit`](MutationSession::commit)
/// discards everything written through it.
pub trait MutationSession: Send {
    /// Create a vertex with the given label, returning its internal id.
    fn add_vertex(&mut self, label: &str) -> Result<ElementId>;

    /// Set a single-valued property on a vertex created or visible in this
    /// session.
    fn set_vertex_property(&mut self, id: ElementId, name: &str, value: Value) -> Result<()>;

    /// Create a directed edge between two vertices, returning its internal
    /// id.
    fn add_edge(&mut self, label: &str, start: ElementId, end: ElementId) -> Result<ElementId>;

    /// Set a single-valued property on an edge created in this session.
    fn set_edge_property(&mut self, id: ElementId, name: &str, value: Value) -> Result<()>;

    /// Look up vertices by internal id.
    ///
    /// Returns one entry per match, so an id may yield zero entries (no such
    /// vertex), one, or more than one (a store whose id space admits
    /// duplicates). Callers decide what the zero and many cases mean.
    fn vertices_by_id(&self, ids: &[ElementId]) -> Result<Vec<ElementId>>;

    /// Commit all buffered writes atomically.
    fn commit(self: Box<Self>) -> Result<()>;

    /// Discard all buffered writes.
    fn rollback(self: Box<Self>) -> Result<()>;
}

/// Transaction scope for catalog changes.
///
/// Creations are staged in the session and visible to its own reads, so a
/// synchronization pass over many labels sees what earlier labels staged.
/// Nothing reaches the shared catalog until [`commit`](SchemaSession::commit).
pub trait SchemaSession: Send {
    /// Fetch a property key by name, if present.
    fn property(&self, name: &str) -> Result<Option<PropertyDef>>;

    /// Stage creation of a property key.
    fn make_property(&mut self, def: PropertyDef) -> Result<()>;

    /// Whether a vertex label exists.
    fn vertex_label_exists(&self, label: &str) -> Result<bool>;

    /// Stage creation of a vertex label.
    fn make_vertex_label(&mut self, label: &str) -> Result<()>;

    /// Whether an edge label exists.
    fn edge_label_exists(&self, label: &str) -> Result<bool>;

    /// Stage creation of a directed edge label.
    fn make_edge_label(&mut self, label: &str) -> Result<()>;

    /// Fetch an index by name, if present.
    fn index(&self, name: &str) -> Result<Option<IndexDef>>;

    /// Stage creation of a composite index.
    fn make_index(&mut self, def: IndexDef) -> Result<()>;

    /// Commit all staged catalog changes atomically.
    fn commit(self: Box<Self>) -> Result<()>;

    /// Discard all staged catalog changes.
    fn rollback(self: Box<Self>) -> Result<()>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_id_roundtrip_and_order() {
        let a = ElementId::new(7);
        let b = ElementId::from(9u64);
        assert_eq!(a.as_u64(), 7);
        assert!(a < b);
        assert_eq!(format!("{}", b), "9");
    }

    #[test]
    fn test_cardinality_display() {
        assert_eq!(Cardinality::Single.to_string(), "SINGLE");
        assert_eq!(Cardinality::List.to_string(), "LIST");
        assert_eq!(Cardinality::Set.to_string(), "SET");
    }

    #[test]
    fn test_property_def_single_shape() {
        let def = PropertyDef::single("age", Kind::I32);
        assert_eq!(def.name, "age");
        assert_eq!(def.kind, Kind::I32);
        assert_eq!(def.cardinality, Cardinality::Single);
    }

    #[test]
    fn test_index_def_equality_covers_scope() {
        let scoped = IndexDef {
            name: "IX_V_Person_name".into(),
            properties: vec!["name".into()],
            unique: false,
            label: Some("Person".into()),
        };
        let global = IndexDef {
            label: None,
            ..scoped.clone()
        };
        assert_ne!(scoped, global);
    }
}
