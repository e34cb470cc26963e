//! Idempotent schema synchronization.
//!
//! [`SchemaSync`] makes the store catalog match a set of declared columns:
//! every element is either created (when absent) or verified compatible
//! (when present), never silently overwritten. All changes ride on one
//! [`SchemaSession`], so a run either commits everything through
//! [`SchemaSync::done`] or leaves the catalog untouched.
//!
//! Per-label index creation is deferred: [`VertexLabelSync::key`] and
//! [`VertexLabelSync::indexed_property`] verify existing indexes
//! immediately but only queue creations, which
//! [`VertexLabelSync::build`] issues once the owning label is confirmed to
//! exist. Verification failures carry the exact incompatibility.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut sync = SchemaSync::new(store.schema()?);
//! let mut person = sync.vertex("Person")?;
//! person.key("id", Kind::I32)?;
//! person.property("name", Kind::Str)?;
//! person.build()?;
//! sync.edge_label("KNOWS")?;
//! sync.global_vertex_index(LABEL_PROPERTY, Kind::Str)?;
//! sync.done()?;
//! ```

use anyhow::{bail, Result};
use tracing::{debug, info};

use crate::store::{Cardinality, IndexDef, PropertyDef, SchemaSession};
use crate::value::Kind;

/// Discriminator property carrying the label name on every element,
/// backing cross-label queries through the global index.
pub const LABEL_PROPERTY: &str = "_label";

/// Name of the unique per-label vertex index for one property.
pub fn unique_index_name(label: &str, property: &str) -> String {
    format!("IXU_V_{}_{}", label, property)
}

/// Name of the non-unique per-label vertex index for one property.
pub fn label_index_name(label: &str, property: &str) -> String {
    format!("IX_V_{}_{}", label, property)
}

/// Name of the global non-unique vertex index for one property.
pub fn global_index_name(property: &str) -> String {
    format!("IXG_V_{}", property)
}

/// One synchronization pass over a schema session.
pub struct SchemaSync {
    session: Box<dyn SchemaSession>,
}

impl SchemaSync {
    pub fn new(session: Box<dyn SchemaSession>) -> Self {
        Self { session }
    }

    /// Start synchronizing one vertex label. Declare its columns on the
    /// returned builder, then call [`VertexLabelSync::build`].
    pub fn vertex(&mut self, label: &str) -> Result<VertexLabelSync<'_>> {
        let existed = self.session.vertex_label_exists(label)?;
        info!(
            label,
            action = if existed { "verifying" } else { "creating" },
            "synchronizing vertex label"
        );
        Ok(VertexLabelSync {
            sync: self,
            label: label.to_string(),
            existed,
            pending: Vec::new(),
        })
    }

    /// Ensure a directed edge label exists.
    pub fn edge_label(&mut self, label: &str) -> Result<()> {
        if self.session.edge_label_exists(label)? {
            debug!(label, "verified edge label");
        } else {
            info!(label, "creating edge label");
            self.session.make_edge_label(label)?;
        }
        Ok(())
    }

    /// Ensure a top-level property key, without any label scoping.
    pub fn property(&mut self, name: &str, kind: Kind) -> Result<()> {
        self.ensure_property(name, kind)
    }

    /// Ensure the global non-unique vertex index on `property`.
    ///
    /// Unlike the per-label indexes this is not deferred; a global index
    /// references no label.
    pub fn global_vertex_index(&mut self, property: &str, kind: Kind) -> Result<()> {
        self.ensure_property(property, kind)?;
        let name = global_index_name(property);
        match self.session.index(&name)? {
            Some(existing) => {
                info!(index = %name, keys = ?existing.properties, "found existing index");
                if existing.properties != [property] {
                    bail!("index {} does not index just {}", name, property);
                }
                if existing.unique {
                    bail!("index {} is unique", name);
                }
            }
            None => {
                info!(index = %name, "creating non-unique global index");
                self.session.make_index(IndexDef {
                    name,
                    properties: vec![property.to_string()],
                    unique: false,
                    label: None,
                })?;
            }
        }
        Ok(())
    }

    /// Commit every staged change.
    pub fn done(self) -> Result<()> {
        self.session.commit()
    }

    /// Discard every staged change.
    pub fn abort(self) -> Result<()> {
        self.session.rollback()
    }

    fn ensure_property(&mut self, name: &str, kind: Kind) -> Result<()> {
        match self.session.property(name)? {
            Some(existing) => {
                debug!(property = name, kind = %existing.kind, "property already exists");
                if existing.kind != kind {
                    bail!(
                        "property {}: declared type {} mismatches existing type {}",
                        name,
                        kind,
                        existing.kind
                    );
                }
                if existing.cardinality != Cardinality::Single {
                    bail!(
                        "property {} isn't SINGLE cardinality (found {})",
                        name,
                        existing.cardinality
                    );
                }
            }
            None => {
                info!(property = name, kind = %kind, "creating property");
                self.session.make_property(PropertyDef::single(name, kind))?;
            }
        }
        Ok(())
    }
}

/// A queued per-label index creation, applied by [`VertexLabelSync::build`].
struct IndexAction {
    name: String,
    property: String,
    unique: bool,
}

/// Builder for one vertex label's schema.
pub struct VertexLabelSync<'a> {
    sync: &'a mut SchemaSync,
    label: String,
    existed: bool,
    pending: Vec<IndexAction>,
}

impl VertexLabelSync<'_> {
    /// Ensure a plain, unindexed property.
    pub fn property(&mut self, name: &str, kind: Kind) -> Result<()> {
        self.sync.ensure_property(name, kind)
    }

    /// Ensure a property with a unique per-label index.
    pub fn key(&mut self, name: &str, kind: Kind) -> Result<()> {
        self.sync.ensure_property(name, kind)?;
        let index_name = unique_index_name(&self.label, name);
        match self.sync.session.index(&index_name)? {
            Some(existing) => {
                info!(index = %index_name, keys = ?existing.properties, "found existing index");
                if existing.properties != [name] {
                    bail!("index {} does not index just {}", index_name, name);
                }
                if !existing.unique {
                    bail!("index {} isn't unique", index_name);
                }
            }
            None => {
                info!(index = %index_name, "queueing unique index");
                self.pending.push(IndexAction {
                    name: index_name,
                    property: name.to_string(),
                    unique: true,
                });
            }
        }
        Ok(())
    }

    /// Ensure a property with a non-unique per-label index.
    pub fn indexed_property(&mut self, name: &str, kind: Kind) -> Result<()> {
        self.sync.ensure_property(name, kind)?;
        let index_name = label_index_name(&self.label, name);
        match self.sync.session.index(&index_name)? {
            Some(existing) => {
                info!(index = %index_name, keys = ?existing.properties, "found existing index");
                if existing.properties != [name] {
                    bail!("index {} does not index just {}", index_name, name);
                }
                if existing.unique {
                    bail!("index {} is unique", index_name);
                }
            }
            None => {
                info!(index = %index_name, "queueing non-unique index");
                self.pending.push(IndexAction {
                    name: index_name,
                    property: name.to_string(),
                    unique: false,
                });
            }
        }
        Ok(())
    }

    /// Confirm the label exists, then apply queued index creations.
    pub fn build(self) -> Result<()> {
        if self.existed {
            info!(label = %self.label, "verified vertex label");
        } else {
            info!(label = %self.label, "creating vertex label");
            self.sync.session.make_vertex_label(&self.label)?;
        }
        for action in self.pending {
            self.sync.session.make_index(IndexDef {
                name: action.name,
                properties: vec![action.property],
                unique: action.unique,
                label: Some(self.label.clone()),
            })?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryGraph;
    use crate::store::GraphStore;

    fn person_schema(sync: &mut SchemaSync) -> Result<()> {
        let mut person = sync.vertex("Person")?;
        person.key("id", Kind::I32)?;
        person.indexed_property("name", Kind::Str)?;
        person.property("age", Kind::I32)?;
        person.build()?;
        sync.edge_label("KNOWS")?;
        sync.global_vertex_index(LABEL_PROPERTY, Kind::Str)?;
        Ok(())
    }

    #[test]
    fn test_fresh_run_creates_everything() {
        let graph = MemoryGraph::new();
        let mut sync = SchemaSync::new(graph.schema().unwrap());
        person_schema(&mut sync).unwrap();
        sync.done().unwrap();

        assert_eq!(graph.vertex_labels().unwrap(), vec!["Person".to_string()]);
        assert_eq!(graph.edge_labels().unwrap(), vec!["KNOWS".to_string()]);
        assert!(graph.property_def("id").unwrap().is_some());
        assert!(graph.property_def("name").unwrap().is_some());
        assert!(graph.property_def("age").unwrap().is_some());
        assert!(graph.property_def(LABEL_PROPERTY).unwrap().is_some());

        let unique = graph.index("IXU_V_Person_id").unwrap().unwrap();
        assert!(unique.unique);
        assert_eq!(unique.properties, vec!["id".to_string()]);
        assert_eq!(unique.label.as_deref(), Some("Person"));

        let indexed = graph.index("IX_V_Person_name").unwrap().unwrap();
        assert!(!indexed.unique);

        let global = graph.index("IXG_V__label").unwrap().unwrap();
        assert!(!global.unique);
        assert!(global.label.is_none());
    }

    #[test]
    fn test_second_run_verifies_without_duplicates() {
        let graph = MemoryGraph::new();
        let mut sync = SchemaSync::new(graph.schema().unwrap());
        person_schema(&mut sync).unwrap();
        sync.done().unwrap();

        let before = graph.index_names().unwrap();

        let mut sync = SchemaSync::new(graph.schema().unwrap());
        person_schema(&mut sync).unwrap();
        sync.done().unwrap();

        assert_eq!(graph.index_names().unwrap(), before);
        assert_eq!(graph.vertex_labels().unwrap().len(), 1);
    }

    #[test]
    fn test_type_mismatch_is_fatal() {
        let graph = MemoryGraph::new();
        let mut sync = SchemaSync::new(graph.schema().unwrap());
        sync.property("age", Kind::I32).unwrap();
        sync.done().unwrap();

        let mut sync = SchemaSync::new(graph.schema().unwrap());
        let err = sync.property("age", Kind::I64).unwrap_err();
        assert!(err.to_string().contains("mismatches existing type"), "{}", err);
    }

    #[test]
    fn test_non_single_cardinality_is_fatal() {
        let graph = MemoryGraph::new();
        let mut session = graph.schema().unwrap();
        session
            .make_property(crate::store::PropertyDef {
                name: "tags".into(),
                kind: Kind::Str,
                cardinality: Cardinality::Set,
            })
            .unwrap();
        session.commit().unwrap();

        let mut sync = SchemaSync::new(graph.schema().unwrap());
        let err = sync.property("tags", Kind::Str).unwrap_err();
        assert!(err.to_string().contains("SINGLE"), "{}", err);
    }

    #[test]
    fn test_existing_non_unique_index_fails_key() {
        let graph = MemoryGraph::new();
        let mut session = graph.schema().unwrap();
        session
            .make_property(PropertyDef::single("id", Kind::I32))
            .unwrap();
        session.make_vertex_label("Person").unwrap();
        session
            .make_index(IndexDef {
                name: unique_index_name("Person", "id"),
                properties: vec!["id".into()],
                unique: false,
                label: Some("Person".into()),
            })
            .unwrap();
        session.commit().unwrap();

        let mut sync = SchemaSync::new(graph.schema().unwrap());
        let mut person = sync.vertex("Person").unwrap();
        let err = person.key("id", Kind::I32).unwrap_err();
        assert!(err.to_string().contains("isn't unique"), "{}", err);
    }

    #[test]
    fn test_existing_unique_index_fails_indexed_property() {
        let graph = MemoryGraph::new();
        let mut session = graph.schema().unwrap();
        session
            .make_property(PropertyDef::single("name", Kind::Str))
            .unwrap();
        session.make_vertex_label("Person").unwrap();
        session
            .make_index(IndexDef {
                name: label_index_name("Person", "name"),
                properties: vec!["name".into()],
                unique: true,
                label: Some("Person".into()),
            })
            .unwrap();
        session.commit().unwrap();

        let mut sync = SchemaSync::new(graph.schema().unwrap());
        let mut person = sync.vertex("Person").unwrap();
        let err = person.indexed_property("name", Kind::Str).unwrap_err();
        assert!(err.to_string().contains("is unique"), "{}", err);
    }

    #[test]
    fn test_index_covering_wrong_property_is_fatal() {
        let graph = MemoryGraph::new();
        let mut session = graph.schema().unwrap();
        session
            .make_property(PropertyDef::single("id", Kind::I32))
            .unwrap();
        session
            .make_property(PropertyDef::single("other", Kind::I32))
            .unwrap();
        session.make_vertex_label("Person").unwrap();
        session
            .make_index(IndexDef {
                name: unique_index_name("Person", "id"),
                properties: vec!["other".into()],
                unique: true,
                label: Some("Person".into()),
            })
            .unwrap();
        session.commit().unwrap();

        let mut sync = SchemaSync::new(graph.schema().unwrap());
        let mut person = sync.vertex("Person").unwrap();
        let err = person.key("id", Kind::I32).unwrap_err();
        assert!(err.to_string().contains("does not index just"), "{}", err);
    }

    #[test]
    fn test_index_creation_waits_for_build() {
        let graph = MemoryGraph::new();
        let mut sync = SchemaSync::new(graph.schema().unwrap());
        let mut person = sync.vertex("Person").unwrap();
        person.key("id", Kind::I32).unwrap();
        person.build().unwrap();
        // Staged but not committed.
        assert!(graph.index("IXU_V_Person_id").unwrap().is_none());
        sync.done().unwrap();
        assert!(graph.index("IXU_V_Person_id").unwrap().is_some());
    }

    #[test]
    fn test_abort_leaves_catalog_untouched() {
        let graph = MemoryGraph::new();
        let mut sync = SchemaSync::new(graph.schema().unwrap());
        person_schema(&mut sync).unwrap();
        sync.abort().unwrap();

        assert!(graph.vertex_labels().unwrap().is_empty());
        assert!(graph.index_names().unwrap().is_empty());
        assert!(graph.property_def("id").unwrap().is_none());
    }
}
