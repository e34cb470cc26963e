//! Vertex ingestion.
//!
//! A [`VertexLoader`] owns one vertex label and its ordered file set. It
//! runs in two steps: [`declare_schema`](VertexLoader::declare_schema)
//! parses the first file's header into columns and declares them on the
//! schema synchronizer, leaving that file open; [`run`](VertexLoader::run)
//! then streams every data row of every file into the store, creating one
//! vertex per row and registering the `ID` column's converted value in the
//! identifier map.
//!
//! Writes ride on one mutation session at a time, committed and reopened
//! every `batch_size` created vertices with a rate report. The final
//! partial batch is committed on completion. The stop flag is honored only
//! at those checkpoint boundaries, so a cancelled run always ends with a
//! fully committed batch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::column::{Column, Role};
use crate::idmap::IdentifierMap;
use crate::runner::LoadStats;
use crate::schema::{SchemaSync, LABEL_PROPERTY};
use crate::source::RecordSource;
use crate::store::GraphStore;
use crate::value::Value;

/// Loads one vertex label from one ordered file set.
pub struct VertexLoader {
    label: String,
    source: RecordSource,
    columns: Vec<Column>,
    limit_rows: u64,
    batch_size: u64,
}

impl VertexLoader {
    /// Build a loader over a comma-separated file list. Fails fast if any
    /// path is missing or not a regular file.
    pub fn new(
        label: impl Into<String>,
        files: &str,
        limit_rows: u64,
        batch_size: u64,
    ) -> Result<Self> {
        let label = label.into();
        let source = RecordSource::from_list(files)
            .with_context(|| format!("vertex label {:?}", label))?;
        Ok(Self {
            label,
            source,
            columns: Vec::new(),
            limit_rows,
            batch_size: batch_size.max(1),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Comma-joined file list, for log context.
    pub fn description(&self) -> &str {
        self.source.description()
    }

    /// Parse the first file's header and declare this label's schema.
    ///
    /// The first file stays open afterwards; [`run`](VertexLoader::run)
    /// continues reading it from the first data row.
    #[tracing::instrument(skip_all, fields(label = %self.label))]
    pub fn declare_schema(&mut self, sync: &mut SchemaSync) -> Result<()> {
        self.source
            .open_next(true)
            .with_context(|| format!("vertex label {:?}", self.label))?;
        self.columns = Column::parse_headers(self.source.headers())
            .with_context(|| format!("vertex label {:?}", self.label))?;

        let mut builder = sync.vertex(&self.label)?;
        for column in &self.columns {
            if column.property.is_empty() {
                continue;
            }
            match column.role {
                Role::Id | Role::Unique => builder.key(&column.property, column.kind)?,
                Role::Index => builder.indexed_property(&column.property, column.kind)?,
                Role::Data => builder.property(&column.property, column.kind)?,
                _ => {}
            }
        }
        builder.build()?;
        Ok(())
    }

    /// Stream every data row into the store.
    ///
    /// Consumes the loader; open files are closed when it is dropped.
    #[tracing::instrument(skip_all, fields(label = %self.label, files = %self.source.description()))]
    pub fn run(
        mut self,
        store: &dyn GraphStore,
        ids: &IdentifierMap,
        stop: &AtomicBool,
    ) -> Result<LoadStats> {
        let started = Instant::now();
        let mut created: u64 = 0;
        let mut session = store.mutation()?;

        'ingest: loop {
            if !self.source.is_open() {
                self.source.open_next(false)?;
            }
            while let Some(row) = self.source.next_row()? {
                if created >= self.limit_rows {
                    debug!(label = %self.label, limit = self.limit_rows, "row limit reached");
                    break 'ingest;
                }

                let count = row.len().min(self.columns.len());
                let vertex = session.add_vertex(&self.label)?;
                session.set_vertex_property(
                    vertex,
                    LABEL_PROPERTY,
                    Value::Str(self.label.clone()),
                )?;

                for c in 0..count {
                    let column = &self.columns[c];
                    if column.role == Role::Ignore {
                        continue;
                    }
                    let value = column.convert(row.get(c));
                    if let Some(value) = value.as_ref() {
                        if !column.property.is_empty() {
                            session.set_vertex_property(vertex, &column.property, value.clone())?;
                        }
                    }
                    if column.role == Role::Id {
                        let line = row.position().map_or(0, |p| p.line());
                        let business = match value {
                            Some(business) => business,
                            None => bail!(
                                "empty or unconvertible id value at line {} of {}",
                                line,
                                self.source.current_file()
                            ),
                        };
                        ids.register(business, vertex).with_context(|| {
                            format!("line {} of {}", line, self.source.current_file())
                        })?;
                    }
                }

                created += 1;
                if created % self.batch_size == 0 {
                    session.commit()?;
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    info!(
                        created,
                        label = %self.label,
                        elapsed_ms,
                        ms_per_vertex = elapsed_ms as f64 / created as f64,
                        "created vertices"
                    );
                    if stop.load(Ordering::Relaxed) {
                        info!(label = %self.label, created, "stop requested - ending at checkpoint");
                        return Ok(LoadStats {
                            created,
                            skipped: 0,
                            elapsed_ms: started.elapsed().as_millis() as u64,
                        });
                    }
                    session = store.mutation()?;
                }
            }
            self.source.close_current();
            if self.source.pending_files() == 0 {
                break;
            }
        }

        session.commit()?;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let ms_per_vertex = if created > 0 {
            elapsed_ms as f64 / created as f64
        } else {
            f64::NAN
        };
        info!(
            created,
            label = %self.label,
            elapsed_ms,
            ms_per_vertex,
            "created vertices"
        );
        Ok(LoadStats {
            created,
            skipped: 0,
            elapsed_ms,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
