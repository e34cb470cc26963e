//! In-process reference store.
//!
//! [`MemoryGraph`] implements the full store contract against process
//! memory: a shared catalog plus vertex/edge tables behind one mutex, with
//! internal ids minted from a shared counter. Sessions buffer their writes
//! locally and merge them into the shared state on commit, so a dropped
//! session leaves no trace, matching the commit-or-discard contract.
//!
//! Data sessions do not validate writes against the catalog; keeping the
//! catalog and the data compatible is the schema synchronizer's job. The
//! inspection methods on [`MemoryGraph`] exist for tests and for reporting
//! after an import, not for the pipeline itself.
//!
//! # Example
//!
//! ```rust,ignore
//! let graph = MemoryGraph::new();
//! let mut session = graph.mutation()?;
//! let id = session.add_vertex("Person")?;
//! session.set_vertex_property(id, "name", Value::Str("Alice".into()))?;
//! session.commit()?;
//! assert_eq!(graph.vertex_count()?, 1);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};

use super::{ElementId, GraphStore, IndexDef, MutationSession, PropertyDef, SchemaSession};
use crate::value::Value;

/// First id handed out by a fresh (or wiped) store.
const FIRST_ID: u64 = 1;

// ============================================================================
// Shared state
// ============================================================================

#[derive(Default)]
struct Catalog {
    properties: BTreeMap<String, PropertyDef>,
    vertex_labels: BTreeSet<String>,
    edge_labels: BTreeSet<String>,
    indexes: BTreeMap<String, IndexDef>,
}

#[derive(Clone)]
struct VertexRecord {
    label: String,
    properties: HashMap<String, Value>,
}

#[derive(Clone)]
struct EdgeRecord {
    label: String,
    start: ElementId,
    end: ElementId,
    properties: HashMap<String, Value>,
}

#[derive(Default)]
struct GraphState {
    catalog: Catalog,
    vertices: HashMap<ElementId, VertexRecord>,
    edges: HashMap<ElementId, EdgeRecord>,
}

struct Shared {
    next_id: AtomicU64,
    state: Mutex<GraphState>,
}

impl Shared {
    fn state(&self) -> Result<MutexGuard<'_, GraphState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("store state lock poisoned"))
    }

    fn mint_id(&self) -> ElementId {
        ElementId::new(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

/// One committed edge, as reported by [`MemoryGraph::edges`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeInfo {
    pub id: ElementId,
    pub label: String,
    pub start: ElementId,
    pub end: ElementId,
}

// ============================================================================
// MemoryGraph
// ============================================================================

/// The in-process store. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct MemoryGraph {
    inner: Arc<Shared>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Shared {
                next_id: AtomicU64::new(FIRST_ID),
                state: Mutex::new(GraphState::default()),
            }),
        }
    }

    pub fn vertex_count(&self) -> Result<usize> {
        Ok(self.inner.state()?.vertices.len())
    }

    pub fn edge_count(&self) -> Result<usize> {
        Ok(self.inner.state()?.edges.len())
    }

    /// Internal ids of every committed vertex with the given label, in id
    /// order.
    pub fn vertices_with_label(&self, label: &str) -> Result<Vec<ElementId>> {
        let state = self.inner.state()?;
        let mut ids: Vec<ElementId> = state
            .vertices
            .iter()
            .filter(|(_, v)| v.label == label)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    pub fn vertex_property(&self, id: ElementId, name: &str) -> Result<Option<Value>> {
        let state = self.inner.state()?;
        Ok(state
            .vertices
            .get(&id)
            .and_then(|v| v.properties.get(name).cloned()))
    }

    pub fn edge_property(&self, id: ElementId, name: &str) -> Result<Option<Value>> {
        let state = self.inner.state()?;
        Ok(state
            .edges
            .get(&id)
            .and_then(|e| e.properties.get(name).cloned()))
    }

    /// Every committed edge, in id order.
    pub fn edges(&self) -> Result<Vec<EdgeInfo>> {
        let state = self.inner.state()?;
        let mut edges: Vec<EdgeInfo> = state
            .edges
            .iter()
            .map(|(id, e)| EdgeInfo {
                id: *id,
                label: e.label.clone(),
                start: e.start,
                end: e.end,
            })
            .collect();
        edges.sort_by_key(|e| e.id);
        Ok(edges)
    }

    pub fn property_def(&self, name: &str) -> Result<Option<PropertyDef>> {
        Ok(self.inner.state()?.catalog.properties.get(name).cloned())
    }

    pub fn index(&self, name: &str) -> Result<Option<IndexDef>> {
        Ok(self.inner.state()?.catalog.indexes.get(name).cloned())
    }

    pub fn index_names(&self) -> Result<Vec<String>> {
        Ok(self.inner.state()?.catalog.indexes.keys().cloned().collect())
    }

    pub fn vertex_labels(&self) -> Result<Vec<String>> {
        Ok(self
            .inner
            .state()?
            .catalog
            .vertex_labels
            .iter()
            .cloned()
            .collect())
    }

    pub fn edge_labels(&self) -> Result<Vec<String>> {
        Ok(self
            .inner
            .state()?
            .catalog
            .edge_labels
            .iter()
            .cloned()
            .collect())
    }
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore for MemoryGraph {
    fn schema(&self) -> Result<Box<dyn SchemaSession>> {
        Ok(Box::new(MemorySchemaSession::new(self.inner.clone())))
    }

    fn mutation(&self) -> Result<Box<dyn MutationSession>> {
        Ok(Box::new(MemoryMutationSession::new(self.inner.clone())))
    }

    fn wipe(&self) -> Result<()> {
        let mut state = self.inner.state()?;
        *state = GraphState::default();
        self.inner.next_id.store(FIRST_ID, Ordering::SeqCst);
        tracing::info!("dropped all data and schema");
        Ok(())
    }
}

// ============================================================================
// Mutation session
// ============================================================================

struct MemoryMutationSession {
    shared: Arc<Shared>,
    new_vertices: HashMap<ElementId, VertexRecord>,
    new_edges: HashMap<ElementId, EdgeRecord>,
    /// Property updates against vertices committed before this session.
    vertex_updates: HashMap<ElementId, HashMap<String, Value>>,
    finished: bool,
}

impl MemoryMutationSession {
    fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            new_vertices: HashMap::new(),
            new_edges: HashMap::new(),
            vertex_updates: HashMap::new(),
            finished: false,
        }
    }

    fn buffered_writes(&self) -> usize {
        self.new_vertices.len() + self.new_edges.len() + self.vertex_updates.len()
    }
}

impl MutationSession for MemoryMutationSession {
    fn add_vertex(&mut self, label: &str) -> Result<ElementId> {
        let id = self.shared.mint_id();
        self.new_vertices.insert(
            id,
            VertexRecord {
                label: label.to_string(),
                properties: HashMap::new(),
            },
        );
        Ok(id)
    }

    fn set_vertex_property(&mut self, id: ElementId, name: &str, value: Value) -> Result<()> {
        if let Some(vertex) = self.new_vertices.get_mut(&id) {
            vertex.properties.insert(name.to_string(), value);
            return Ok(());
        }
        if self.shared.state()?.vertices.contains_key(&id) {
            self.vertex_updates
                .entry(id)
                .or_default()
                .insert(name.to_string(), value);
            return Ok(());
        }
        bail!("no vertex with id {} visible in this session", id);
    }

    fn add_edge(&mut self, label: &str, start: ElementId, end: ElementId) -> Result<ElementId> {
        let id = self.shared.mint_id();
        self.new_edges.insert(
            id,
            EdgeRecord {
                label: label.to_string(),
                start,
                end,
                properties: HashMap::new(),
            },
        );
        Ok(id)
    }

    fn set_edge_property(&mut self, id: ElementId, name: &str, value: Value) -> Result<()> {
        let edge = self
            .new_edges
            .get_mut(&id)
            .ok_or_else(|| anyhow!("no edge with id {} in this session", id))?;
        edge.properties.insert(name.to_string(), value);
        Ok(())
    }

    fn vertices_by_id(&self, ids: &[ElementId]) -> Result<Vec<ElementId>> {
        let state = self.shared.state()?;
        let mut found = Vec::new();
        for id in ids {
            if self.new_vertices.contains_key(id) || state.vertices.contains_key(id) {
                found.push(*id);
            }
        }
        Ok(found)
    }

    fn commit(mut self: Box<Self>) -> Result<()> {
        let mut state = self.shared.state()?;
        state.vertices.extend(self.new_vertices.drain());
        state.edges.extend(self.new_edges.drain());
        for (id, updates) in self.vertex_updates.drain() {
            if let Some(vertex) = state.vertices.get_mut(&id) {
                vertex.properties.extend(updates);
            }
        }
        self.finished = true;
        Ok(())
    }

    fn rollback(mut self: Box<Self>) -> Result<()> {
        self.new_vertices.clear();
        self.new_edges.clear();
        self.vertex_updates.clear();
        self.finished = true;
        Ok(())
    }
}

impl Drop for MemoryMutationSession {
    fn drop(&mut self) {
        if !self.finished && self.buffered_writes() > 0 {
            tracing::debug!(
                buffered = self.buffered_writes(),
                "mutation session dropped without commit - discarding writes"
            );
        }
    }
}

// ============================================================================
// Schema session
// ============================================================================

struct MemorySchemaSession {
    shared: Arc<Shared>,
    new_properties: BTreeMap<String, PropertyDef>,
    new_vertex_labels: BTreeSet<String>,
    new_edge_labels: BTreeSet<String>,
    new_indexes: BTreeMap<String, IndexDef>,
    finished: bool,
}

impl MemorySchemaSession {
    fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            new_properties: BTreeMap::new(),
            new_vertex_labels: BTreeSet::new(),
            new_edge_labels: BTreeSet::new(),
            new_indexes: BTreeMap::new(),
            finished: false,
        }
    }

    fn staged_changes(&self) -> usize {
        self.new_properties.len()
            + self.new_vertex_labels.len()
            + self.new_edge_labels.len()
            + self.new_indexes.len()
    }
}

impl SchemaSession for MemorySchemaSession {
    fn property(&self, name: &str) -> Result<Option<PropertyDef>> {
        if let Some(def) = self.new_properties.get(name) {
            return Ok(Some(def.clone()));
        }
        Ok(self.shared.state()?.catalog.properties.get(name).cloned())
    }

    fn make_property(&mut self, def: PropertyDef) -> Result<()> {
        if self.property(&def.name)?.is_some() {
            bail!("property key {:?} already exists", def.name);
        }
        self.new_properties.insert(def.name.clone(), def);
        Ok(())
    }

    fn vertex_label_exists(&self, label: &str) -> Result<bool> {
        if self.new_vertex_labels.contains(label) {
            return Ok(true);
        }
        Ok(self.shared.state()?.catalog.vertex_labels.contains(label))
    }

    fn make_vertex_label(&mut self, label: &str) -> Result<()> {
        if self.vertex_label_exists(label)? {
            bail!("vertex label {:?} already exists", label);
        }
        self.new_vertex_labels.insert(label.to_string());
        Ok(())
    }

    fn edge_label_exists(&self, label: &str) -> Result<bool> {
        if self.new_edge_labels.contains(label) {
            return Ok(true);
        }
        Ok(self.shared.state()?.catalog.edge_labels.contains(label))
    }

    fn make_edge_label(&mut self, label: &str) -> Result<()> {
        if self.edge_label_exists(label)? {
            bail!("edge label {:?} already exists", label);
        }
        self.new_edge_labels.insert(label.to_string());
        Ok(())
    }

    fn index(&self, name: &str) -> Result<Option<IndexDef>> {
        if let Some(def) = self.new_indexes.get(name) {
            return Ok(Some(def.clone()));
        }
        Ok(self.shared.state()?.catalog.indexes.get(name).cloned())
    }

    fn make_index(&mut self, def: IndexDef) -> Result<()> {
        if self.index(&def.name)?.is_some() {
            bail!("index {:?} already exists", def.name);
        }
        self.new_indexes.insert(def.name.clone(), def);
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> Result<()> {
        let mut state = self.shared.state()?;
        let catalog = &mut state.catalog;
        catalog.properties.append(&mut self.new_properties);
        catalog.vertex_labels.append(&mut self.new_vertex_labels);
        catalog.edge_labels.append(&mut self.new_edge_labels);
        catalog.indexes.append(&mut self.new_indexes);
        self.finished = true;
        Ok(())
    }

    fn rollback(mut self: Box<Self>) -> Result<()> {
        self.new_properties.clear();
        self.new_vertex_labels.clear();
        self.new_edge_labels.clear();
        self.new_indexes.clear();
        self.finished = true;
        Ok(())
    }
}

impl Drop for MemorySchemaSession {
    fn drop(&mut self) {
        if !self.finished && self.staged_changes() > 0 {
            tracing::debug!(
                staged = self.staged_changes(),
                "schema session dropped without commit - discarding changes"
            );
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
