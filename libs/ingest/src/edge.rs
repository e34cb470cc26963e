//! Edge ingestion.
//!
//! An [`EdgeLoader`] owns one relationship file set. Each row names its
//! endpoints by business identifier (`START_ID`/`END_ID` columns) and its
//! edge label by the `TYPE` column; endpoints are resolved through the
//! identifier map populated during vertex ingestion, then verified against
//! the store before the edge is created.
//!
//! Row errors are absorbed, not propagated: a missing or unconvertible
//! structural value skips the row, as does an endpoint whose internal id
//! matches zero or more than one stored vertex. An endpoint whose business
//! id was never registered is the one configurable case: with
//! `ignore_missing_nodes` the row is skipped, without it the rest of the
//! current file is abandoned (a hard stop) while later files in the set
//! still run.
//!
//! Checkpointing and row-limit behavior match vertex ingestion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, error, info, warn};

use crate::column::{Column, Role};
use crate::idmap::IdentifierMap;
use crate::runner::LoadStats;
use crate::schema::{SchemaSync, LABEL_PROPERTY};
use crate::source::RecordSource;
use crate::store::{ElementId, GraphStore, MutationSession};
use crate::value::Value;

/// Loads one relationship file set.
pub struct EdgeLoader {
    source: RecordSource,
    columns: Vec<Column>,
    limit_rows: u64,
    batch_size: u64,
    ignore_missing_nodes: bool,
}

impl EdgeLoader {
    /// Build a loader over a comma-separated file list. Fails fast if any
    /// path is missing or not a regular file.
    pub fn new(
        files: &str,
        limit_rows: u64,
        batch_size: u64,
        ignore_missing_nodes: bool,
    ) -> Result<Self> {
        let source = RecordSource::from_list(files)
            .with_context(|| format!("relationship files {:?}", files))?;
        Ok(Self {
            source,
            columns: Vec::new(),
            limit_rows,
            batch_size: batch_size.max(1),
            ignore_missing_nodes,
        })
    }

    /// Comma-joined file list, for log context.
    pub fn description(&self) -> &str {
        self.source.description()
    }

    /// Parse the first file's header and declare edge properties.
    ///
    /// Structural columns carry no stored property; everything else with a
    /// name becomes a plain property key. Edge labels themselves are only
    /// known per row, so none are declared here.
    #[tracing::instrument(skip_all, fields(files = %self.source.description()))]
    pub fn declare_schema(&mut self, sync: &mut SchemaSync) -> Result<()> {
        self.source
            .open_next(true)
            .with_context(|| format!("relationship files {}", self.source.description()))?;
        self.columns = Column::parse_headers(self.source.headers())
            .with_context(|| format!("relationship files {}", self.source.description()))?;
        for column in &self.columns {
            if column.property.is_empty() {
                continue;
            }
            match column.role {
                Role::StartId | Role::EndId | Role::Type | Role::Ignore => {}
                _ => sync.property(&column.property, column.kind)?,
            }
        }
        Ok(())
    }

    fn column_with_role(&self, role: Role) -> Option<usize> {
        self.columns.iter().position(|c| c.role == role)
    }

    /// How many stored vertices the internal id resolves to.
    fn matches(session: &dyn MutationSession, id: ElementId) -> Result<usize> {
        Ok(session.vertices_by_id(&[id])?.len())
    }

    /// Stream every data row into the store.
    ///
    /// Consumes the loader; open files are closed when it is dropped.
    #[tracing::instrument(skip_all, fields(files = %self.source.description()))]
    pub fn run(
        mut self,
        store: &dyn GraphStore,
        ids: &IdentifierMap,
        stop: &AtomicBool,
    ) -> Result<LoadStats> {
        let start_column = self
            .column_with_role(Role::StartId)
            .ok_or_else(|| anyhow!("no start-id column for relationship {}", self.description()))?;
        let end_column = self
            .column_with_role(Role::EndId)
            .ok_or_else(|| anyhow!("no end-id column for relationship {}", self.description()))?;
        let type_column = self
            .column_with_role(Role::Type)
            .ok_or_else(|| anyhow!("no type column for relationship {}", self.description()))?;

        let started = Instant::now();
        let mut created: u64 = 0;
        let mut skipped: u64 = 0;
        let mut session = store.mutation()?;

        'ingest: loop {
            if !self.source.is_open() {
                self.source.open_next(false)?;
            }
            while let Some(row) = self.source.next_row()? {
                if created >= self.limit_rows {
                    debug!(limit = self.limit_rows, "row limit reached");
                    break 'ingest;
                }
                let line = row.position().map_or(0, |p| p.line());

                let start_value = match self.columns[start_column].convert(row.get(start_column)) {
                    Some(value) => value,
                    None => {
                        debug!(line, file = %self.source.current_file(), "start-id field missing - skipping");
                        skipped += 1;
                        continue;
                    }
                };
                let end_value = match self.columns[end_column].convert(row.get(end_column)) {
                    Some(value) => value,
                    None => {
                        debug!(line, file = %self.source.current_file(), "end-id field missing - skipping");
                        skipped += 1;
                        continue;
                    }
                };

                let start_internal = match ids.resolve(&start_value) {
                    Some(id) => id,
                    None => {
                        debug!(start = %start_value, "edge start vertex was never created");
                        if !self.ignore_missing_nodes {
                            error!(
                                start = %start_value,
                                file = %self.source.current_file(),
                                "edge start vertex was never created - aborting file"
                            );
                            break;
                        }
                        skipped += 1;
                        continue;
                    }
                };
                let end_internal = match ids.resolve(&end_value) {
                    Some(id) => id,
                    None => {
                        debug!(end = %end_value, "edge end vertex was never created");
                        if !self.ignore_missing_nodes {
                            error!(
                                end = %end_value,
                                file = %self.source.current_file(),
                                "edge end vertex was never created - aborting file"
                            );
                            break;
                        }
                        skipped += 1;
                        continue;
                    }
                };

                let start_matches = Self::matches(session.as_ref(), start_internal)?;
                if start_matches != 1 {
                    warn!(
                        business = %start_value,
                        internal = %start_internal,
                        matches = start_matches,
                        "start vertex couldn't be resolved to one element - skipping"
                    );
                    skipped += 1;
                    continue;
                }
                let end_matches = Self::matches(session.as_ref(), end_internal)?;
                if end_matches != 1 {
                    warn!(
                        business = %end_value,
                        internal = %end_internal,
                        matches = end_matches,
                        "end vertex couldn't be resolved to one element - skipping"
                    );
                    skipped += 1;
                    continue;
                }

                let edge_label = match self.columns[type_column].convert(row.get(type_column)) {
                    Some(value) => value.to_string(),
                    None => {
                        warn!(line, file = %self.source.current_file(), "type field missing - skipping");
                        skipped += 1;
                        continue;
                    }
                };

                let edge = session.add_edge(&edge_label, start_internal, end_internal)?;
                session.set_edge_property(edge, LABEL_PROPERTY, Value::Str(edge_label.clone()))?;

                let count = row.len().min(self.columns.len());
                for c in 0..count {
                    let column = &self.columns[c];
                    match column.role {
                        Role::Ignore | Role::StartId | Role::EndId | Role::Type => continue,
                        _ => {}
                    }
                    if column.property.is_empty() {
                        continue;
                    }
                    if let Some(value) = column.convert(row.get(c)) {
                        session.set_edge_property(edge, &column.property, value)?;
                    }
                }

                created += 1;
                if created % self.batch_size == 0 {
                    session.commit()?;
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    info!(
                        created,
                        elapsed_ms,
                        ms_per_edge = elapsed_ms as f64 / created as f64,
                        "created edges"
                    );
                    if stop.load(Ordering::Relaxed) {
                        info!(created, "stop requested - ending at checkpoint");
                        return Ok(LoadStats {
                            created,
                            skipped,
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
        let ms_per_edge = if created > 0 {
            elapsed_ms as f64 / created as f64
        } else {
            f64::NAN
        };
        info!(created, elapsed_ms, ms_per_edge, "created edges");
        Ok(LoadStats {
            created,
            skipped,
            elapsed_ms,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
