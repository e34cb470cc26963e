//! Bulk CSV to property-graph import pipeline.
//!
//! Loads typed CSV files into any [`GraphStore`] in two strictly ordered
//! phases: vertices first, then edges. Column types and roles come from a
//! header mini-language (`name[:type][:role]`); business identifiers found
//! in `ID` columns are correlated to store-internal ids through a shared
//! [`IdentifierMap`], which the edge phase reads to resolve
//! `START_ID`/`END_ID` references. Before any data is written, a
//! [`SchemaSync`] session makes the store's catalog match the declared
//! columns, creating what is missing and verifying what exists.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gantry_ingest::{ImportConfig, Importer, MemoryGraph};
//!
//! let store = Arc::new(MemoryGraph::new());
//! let config = ImportConfig {
//!     nodes: vec!["Person=people.csv".parse()?],
//!     relationships: vec!["knows.csv".to_string()],
//!     ..ImportConfig::default()
//! };
//! let report = Importer::new(store, config).run().await?;
//! println!("{}", report);
//! ```

pub mod column;
pub mod edge;
pub mod idmap;
pub mod runner;
pub mod schema;
pub mod source;
pub mod store;
pub mod value;
pub mod vertex;

pub use column::{Column, Role};
pub use edge::EdgeLoader;
pub use idmap::IdentifierMap;
pub use runner::{ImportConfig, ImportReport, Importer, LoadOutcome, LoadStats, NodeDeclaration};
pub use schema::{SchemaSync, LABEL_PROPERTY};
pub use source::RecordSource;
pub use store::memory::{EdgeInfo, MemoryGraph};
pub use store::{ElementId, GraphStore, MutationSession, SchemaSession};
pub use value::{Kind, Value};
