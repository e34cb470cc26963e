//! Import orchestration.
//!
//! [`Importer`] drives one whole run against a [`GraphStore`], in strictly
//! ordered phases:
//!
//! 1. Construct every loader up front, so a missing input file fails the
//!    run before anything is written.
//! 2. Schema phase: one [`SchemaSync`] session covers all vertex and edge
//!    declarations plus the pre-declared edge labels and the global
//!    discriminator index; any mismatch rolls the session back and aborts
//!    the import.
//! 3. Vertex phase: every vertex loader runs on a bounded blocking pool.
//!    A loader's failure is logged and recorded, not propagated, so one
//!    label cannot cancel its siblings.
//! 4. Edge phase: same execution model, started only after the vertex
//!    phase fully completes and the identifier map is stable.
//!
//! Each phase waits a long bound for its tasks, then raises the shared
//! stop flag (honored by loaders at checkpoint boundaries) and grants a
//! short grace period before abandoning stragglers.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::edge::EdgeLoader;
use crate::idmap::IdentifierMap;
use crate::schema::{SchemaSync, LABEL_PROPERTY};
use crate::store::GraphStore;
use crate::value::Kind;
use crate::vertex::VertexLoader;

/// How long one phase may run before cooperative cancellation is requested.
const PHASE_WAIT: Duration = Duration::from_secs(48 * 60 * 60);

/// Extra time granted after the stop flag is raised.
const STOP_GRACE: Duration = Duration::from_secs(120);

// ============================================================================
// Configuration
// ============================================================================

/// One vertex declaration: a label and its comma-separated file paths.
#[derive(Debug, Clone)]
pub struct NodeDeclaration {
    pub label: String,
    pub files: String,
}

impl std::str::FromStr for NodeDeclaration {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (label, files) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected <label>=<file,...>, got {:?}", s))?;
        if label.is_empty() || files.is_empty() {
            bail!("expected <label>=<file,...>, got {:?}", s);
        }
        Ok(Self {
            label: label.to_string(),
            files: files.to_string(),
        })
    }
}

/// Declarative surface of one import run.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Vertex declarations, one loader each.
    pub nodes: Vec<NodeDeclaration>,
    /// Relationship file sets, each a comma-separated path group.
    pub relationships: Vec<String>,
    /// Edge labels ensured during the schema phase, ahead of the per-row
    /// labels the `TYPE` column produces.
    pub edge_labels: Vec<String>,
    /// Maximum elements created per loader; `None` is unlimited.
    pub limit_rows: Option<u64>,
    /// Skip edges referencing unregistered ids instead of hard-stopping
    /// the file.
    pub ignore_missing_nodes: bool,
    /// Worker-pool size for the vertex and edge phases.
    pub workers: usize,
    /// Wipe the store before the schema phase.
    pub drop_existing: bool,
    /// Elements per transaction between checkpoints.
    pub batch_size: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            relationships: Vec::new(),
            edge_labels: Vec::new(),
            limit_rows: None,
            ignore_missing_nodes: true,
            workers: 2,
            drop_existing: false,
            batch_size: 10_000,
        }
    }
}

// ============================================================================
// Report
// ============================================================================

/// Counters from one ingestor run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct LoadStats {
    pub created: u64,
    pub skipped: u64,
    pub elapsed_ms: u64,
}

/// Outcome of one ingestor: its counters, or the error that ended it.
#[derive(Debug, Clone, Serialize)]
pub struct LoadOutcome {
    /// Vertex label, or the relationship file list.
    pub name: String,
    pub stats: LoadStats,
    pub error: Option<String>,
}

/// Aggregated result of a whole import run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub vertices: Vec<LoadOutcome>,
    pub edges: Vec<LoadOutcome>,
    pub total_vertices: u64,
    pub total_edges: u64,
    pub registered_ids: u64,
    pub elapsed_ms: u64,
}

impl ImportReport {
    /// Number of ingestors that ended in an error.
    pub fn failures(&self) -> usize {
        self.vertices
            .iter()
            .chain(self.edges.iter())
            .filter(|outcome| outcome.error.is_some())
            .count()
    }
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "vertices:")?;
        for outcome in &self.vertices {
            write_outcome(f, outcome)?;
        }
        writeln!(f, "edges:")?;
        for outcome in &self.edges {
            write_outcome(f, outcome)?;
        }
        write!(
            f,
            "total: {} vertices, {} edges, {} identifiers, {} ms",
            self.total_vertices, self.total_edges, self.registered_ids, self.elapsed_ms
        )
    }
}

fn write_outcome(f: &mut fmt::Formatter<'_>, outcome: &LoadOutcome) -> fmt::Result {
    match &outcome.error {
        Some(error) => writeln!(f, "  {}: FAILED: {}", outcome.name, error),
        None => writeln!(
            f,
            "  {}: created {}, skipped {}, {} ms",
            outcome.name, outcome.stats.created, outcome.stats.skipped, outcome.stats.elapsed_ms
        ),
    }
}

// ============================================================================
// Importer
// ============================================================================

type Job = Box<dyn FnOnce() -> Result<LoadStats> + Send + 'static>;

/// Orchestrates one import run.
pub struct Importer {
    store: Arc<dyn GraphStore>,
    config: ImportConfig,
}

impl Importer {
    pub fn new(store: Arc<dyn GraphStore>, config: ImportConfig) -> Self {
        Self { store, config }
    }

    /// Run the whole import: schema, vertices, then edges.
    #[tracing::instrument(skip_all)]
    pub async fn run(self) -> Result<ImportReport> {
        if self.config.nodes.is_empty() {
            bail!("at least one vertex declaration is required");
        }
        let started = Instant::now();

        if self.config.drop_existing {
            self.store.wipe().context("failed to drop existing data")?;
        }

        let limit = self.config.limit_rows.unwrap_or(u64::MAX);
        let batch = self.config.batch_size.max(1);

        let mut vertex_loaders = Vec::with_capacity(self.config.nodes.len());
        for decl in &self.config.nodes {
            vertex_loaders.push(VertexLoader::new(&decl.label, &decl.files, limit, batch)?);
        }
        let mut edge_loaders = Vec::with_capacity(self.config.relationships.len());
        for files in &self.config.relationships {
            edge_loaders.push(EdgeLoader::new(
                files,
                limit,
                batch,
                self.config.ignore_missing_nodes,
            )?);
        }

        info!(
            vertex_sets = vertex_loaders.len(),
            edge_sets = edge_loaders.len(),
            "synchronizing schema"
        );
        let mut sync = SchemaSync::new(self.store.schema()?);
        if let Err(err) = declare_all(
            &mut sync,
            &mut vertex_loaders,
            &mut edge_loaders,
            &self.config.edge_labels,
        ) {
            if let Err(abort_err) = sync.abort() {
                warn!(error = %abort_err, "schema session rollback failed");
            }
            return Err(err.context("schema synchronization failed"));
        }
        sync.done().context("schema commit failed")?;

        let ids = Arc::new(IdentifierMap::new());
        let stop = Arc::new(AtomicBool::new(false));
        let workers = self.config.workers.max(1);

        info!(loaders = vertex_loaders.len(), workers, "starting vertex phase");
        let mut jobs: Vec<(String, Job)> = Vec::with_capacity(vertex_loaders.len());
        for loader in vertex_loaders {
            let store = Arc::clone(&self.store);
            let ids = Arc::clone(&ids);
            let stop = Arc::clone(&stop);
            let name = loader.label().to_string();
            jobs.push((
                name,
                Box::new(move || loader.run(store.as_ref(), &ids, &stop)),
            ));
        }
        let vertices = run_phase("vertices", jobs, workers, Arc::clone(&stop)).await;
        info!(registered_ids = ids.len(), "vertex phase complete");

        info!(loaders = edge_loaders.len(), workers, "starting edge phase");
        let mut jobs: Vec<(String, Job)> = Vec::with_capacity(edge_loaders.len());
        for loader in edge_loaders {
            let store = Arc::clone(&self.store);
            let ids = Arc::clone(&ids);
            let stop = Arc::clone(&stop);
            let name = loader.description().to_string();
            jobs.push((
                name,
                Box::new(move || loader.run(store.as_ref(), &ids, &stop)),
            ));
        }
        let edges = run_phase("edges", jobs, workers, Arc::clone(&stop)).await;

        let report = ImportReport {
            total_vertices: vertices.iter().map(|o| o.stats.created).sum(),
            total_edges: edges.iter().map(|o| o.stats.created).sum(),
            registered_ids: ids.len() as u64,
            vertices,
            edges,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            total_vertices = report.total_vertices,
            total_edges = report.total_edges,
            failures = report.failures(),
            elapsed_ms = report.elapsed_ms,
            "done importing"
        );
        Ok(report)
    }
}

/// Declare every loader's schema plus the run-level extras on one session.
fn declare_all(
    sync: &mut SchemaSync,
    vertex_loaders: &mut [VertexLoader],
    edge_loaders: &mut [EdgeLoader],
    edge_labels: &[String],
) -> Result<()> {
    for loader in vertex_loaders {
        loader.declare_schema(sync)?;
    }
    for loader in edge_loaders {
        loader.declare_schema(sync)?;
    }
    for label in edge_labels {
        let label = label.trim();
        if label.is_empty() {
            continue;
        }
        sync.edge_label(label)?;
    }
    sync.global_vertex_index(LABEL_PROPERTY, Kind::Str)?;
    Ok(())
}

/// Run one phase's jobs on a bounded blocking pool, collecting per-job
/// outcomes. Failures are recorded, never propagated.
async fn run_phase(
    phase: &'static str,
    jobs: Vec<(String, Job)>,
    workers: usize,
    stop: Arc<AtomicBool>,
) -> Vec<LoadOutcome> {
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut tasks: JoinSet<(String, Result<LoadStats>)> = JoinSet::new();
    for (name, job) in jobs {
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return (name, Err(anyhow!("worker pool closed"))),
            };
            let result = match tokio::task::spawn_blocking(job).await {
                Ok(result) => result,
                Err(err) => Err(anyhow!("ingestion task died: {}", err)),
            };
            (name, result)
        });
    }

    let mut outcomes = Vec::new();
    let mut deadline = Instant::now() + PHASE_WAIT;
    let mut stop_requested = false;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, tasks.join_next()).await {
            Ok(Some(Ok((name, Ok(stats))))) => {
                info!(
                    phase,
                    name = %name,
                    created = stats.created,
                    skipped = stats.skipped,
                    elapsed_ms = stats.elapsed_ms,
                    "ingestion finished"
                );
                outcomes.push(LoadOutcome {
                    name,
                    stats,
                    error: None,
                });
            }
            Ok(Some(Ok((name, Err(err))))) => {
                let error = format!("{:#}", err);
                error!(phase, name = %name, error = %error, "ingestion failed");
                outcomes.push(LoadOutcome {
                    name,
                    stats: LoadStats::default(),
                    error: Some(error),
                });
            }
            Ok(Some(Err(join_err))) => {
                error!(phase, error = %join_err, "ingestion task aborted");
                outcomes.push(LoadOutcome {
                    name: format!("{} task", phase),
                    stats: LoadStats::default(),
                    error: Some(join_err.to_string()),
                });
            }
            Ok(None) => break,
            Err(_elapsed) if !stop_requested => {
                warn!(
                    phase,
                    running = tasks.len(),
                    "phase wait elapsed - requesting stop at next checkpoint"
                );
                stop.store(true, Ordering::Relaxed);
                stop_requested = true;
                deadline = Instant::now() + STOP_GRACE;
            }
            Err(_elapsed) => {
                warn!(
                    phase,
                    abandoned = tasks.len(),
                    "grace period elapsed - abandoning remaining tasks"
                );
                tasks.abort_all();
                break;
            }
        }
    }
    outcomes
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryGraph;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{}", contents).unwrap();
        path
    }

    fn node(label: &str, path: &std::path::Path) -> NodeDeclaration {
        NodeDeclaration {
            label: label.to_string(),
            files: path.display().to_string(),
        }
    }

    #[test]
    fn test_node_declaration_parsing() {
        let decl: NodeDeclaration = "Person=a.csv,b.csv".parse().unwrap();
        assert_eq!(decl.label, "Person");
        assert_eq!(decl.files, "a.csv,b.csv");

        assert!("Person".parse::<NodeDeclaration>().is_err());
        assert!("=a.csv".parse::<NodeDeclaration>().is_err());
        assert!("Person=".parse::<NodeDeclaration>().is_err());
    }

    #[tokio::test]
    async fn test_two_phase_import_produces_report() {
        let dir = TempDir::new().unwrap();
        let people = write_file(&dir, "people.csv", "id:int:ID,name\n1,Alice\n2,Bob\n");
        let knows = write_file(
            &dir,
            "knows.csv",
            "from:int:START_ID,to:int:END_ID,kind:TYPE\n1,2,KNOWS\n",
        );

        let graph = MemoryGraph::new();
        let config = ImportConfig {
            nodes: vec![node("Person", &people)],
            relationships: vec![knows.display().to_string()],
            edge_labels: vec!["KNOWS".to_string()],
            ..ImportConfig::default()
        };
        let report = Importer::new(Arc::new(graph.clone()), config)
            .run()
            .await
            .unwrap();

        assert_eq!(report.total_vertices, 2);
        assert_eq!(report.total_edges, 1);
        assert_eq!(report.registered_ids, 2);
        assert_eq!(report.failures(), 0);
        assert_eq!(graph.vertex_count().unwrap(), 2);
        assert_eq!(graph.edge_count().unwrap(), 1);
        assert_eq!(graph.edge_labels().unwrap(), vec!["KNOWS".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_loader_does_not_cancel_siblings() {
        let dir = TempDir::new().unwrap();
        let good = write_file(&dir, "good.csv", "id:int:ID\n1\n2\n");
        let bad = write_file(&dir, "bad.csv", "id:int:ID\n7\n7\n");
        let knows = write_file(
            &dir,
            "knows.csv",
            "from:int:START_ID,to:int:END_ID,kind:TYPE\n1,2,KNOWS\n",
        );

        let graph = MemoryGraph::new();
        let config = ImportConfig {
            nodes: vec![node("Good", &good), node("Bad", &bad)],
            relationships: vec![knows.display().to_string()],
            ..ImportConfig::default()
        };
        let report = Importer::new(Arc::new(graph.clone()), config)
            .run()
            .await
            .unwrap();

        assert_eq!(report.failures(), 1);
        let failed = report
            .vertices
            .iter()
            .find(|o| o.name == "Bad")
            .unwrap();
        assert!(failed.error.as_deref().unwrap().contains("duplicate"));
        let good_outcome = report.vertices.iter().find(|o| o.name == "Good").unwrap();
        assert_eq!(good_outcome.stats.created, 2);
        // The edge phase still ran against the surviving label's ids.
        assert_eq!(report.total_edges, 1);
    }

    #[tokio::test]
    async fn test_schema_mismatch_aborts_before_data() {
        let dir = TempDir::new().unwrap();
        // Same property declared with two different types across labels.
        let a = write_file(&dir, "a.csv", "id:int:ID,score:int\n1,5\n");
        let b = write_file(&dir, "b.csv", "id:int:ID,score:long\n2,6\n");

        let graph = MemoryGraph::new();
        let config = ImportConfig {
            nodes: vec![node("A", &a), node("B", &b)],
            ..ImportConfig::default()
        };
        let err = Importer::new(Arc::new(graph.clone()), config)
            .run()
            .await
            .unwrap_err();
        assert!(
            format!("{:#}", err).contains("mismatches existing type"),
            "{:#}",
            err
        );
        // Rolled back: no data, no schema.
        assert_eq!(graph.vertex_count().unwrap(), 0);
        assert!(graph.property_def("score").unwrap().is_none());
        assert!(graph.vertex_labels().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_drop_existing_wipes_store_first() {
        let dir = TempDir::new().unwrap();
        let people = write_file(&dir, "people.csv", "id:int:ID\n1\n");

        let graph = MemoryGraph::new();
        {
            let mut session = graph.mutation().unwrap();
            session.add_vertex("Stale").unwrap();
            session.commit().unwrap();
        }

        let config = ImportConfig {
            nodes: vec![node("Person", &people)],
            drop_existing: true,
            ..ImportConfig::default()
        };
        Importer::new(Arc::new(graph.clone()), config)
            .run()
            .await
            .unwrap();

        assert!(graph.vertices_with_label("Stale").unwrap().is_empty());
        assert_eq!(graph.vertex_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_import_without_nodes_is_rejected() {
        let graph = MemoryGraph::new();
        let err = Importer::new(Arc::new(graph), ImportConfig::default())
            .run()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("vertex declaration"), "{}", err);
    }

    #[tokio::test]
    async fn test_report_renders_outcomes() {
        let dir = TempDir::new().unwrap();
        let people = write_file(&dir, "people.csv", "id:int:ID\n1\n");

        let graph = MemoryGraph::new();
        let config = ImportConfig {
            nodes: vec![node("Person", &people)],
            ..ImportConfig::default()
        };
        let report = Importer::new(Arc::new(graph), config).run().await.unwrap();

        let text = report.to_string();
        assert!(text.contains("Person: created 1"), "{}", text);
        assert!(text.contains("total: 1 vertices"), "{}", text);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["total_vertices"], 1);
        assert_eq!(json["vertices"][0]["name"], "Person");
    }
}
