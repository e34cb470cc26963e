//! Business-identifier to internal-id map.
//!
//! Vertex ingestion registers the converted value of each row's `ID` column
//! against the internal id the store issued for that row. Edge ingestion
//! later resolves `START_ID`/`END_ID` values through the same map. Many
//! vertex ingestors write concurrently; the phase barrier between vertex and
//! edge ingestion guarantees no writes are outstanding once readers start.
//!
//! Registration is insert-once: the same business identifier seen twice is a
//! data-integrity violation in the source files and fails the registering
//! ingestor.

use anyhow::{bail, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::store::ElementId;
use crate::value::Value;

/// Concurrent map from business identifier to store-internal id.
#[derive(Debug, Default)]
pub struct IdentifierMap {
    entries: DashMap<Value, ElementId>,
}

impl IdentifierMap {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Register a business identifier, failing if it is already present.
    pub fn register(&self, business: Value, internal: ElementId) -> Result<()> {
        match self.entries.entry(business) {
            Entry::Occupied(occupied) => {
                bail!(
                    "duplicate business identifier {} (already mapped to internal id {})",
                    occupied.key(),
                    occupied.get()
                );
            }
            Entry::Vacant(vacant) => {
                vacant.insert(internal);
                Ok(())
            }
        }
    }

    /// Resolve a business identifier to the internal id it was registered
    /// with, if any.
    pub fn resolve(&self, business: &Value) -> Option<ElementId> {
        self.entries.get(business).map(|entry| *entry.value())
    }

    /// Number of registered identifiers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
