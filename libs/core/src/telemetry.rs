//! Tracing subscriber initialization for the gantry binaries.
//!
//! Two entry points:
//! - `init_subscriber()` - fixed INFO-level stderr logging
//! - `init_subscriber_with_env_filter()` - stderr logging filtered by `RUST_LOG`
//!
//! Call one of them once at process startup, from the binary, never from a
//! library crate. Import progress (checkpoint rates, skipped rows, per-label
//! outcomes) is reported through `tracing` events, so without a subscriber an
//! import runs silently.
//!
//! # Usage
//!
//! ```no_run
//! use gantry_core::telemetry;
//!
//! fn main() {
//!     telemetry::init_subscriber_with_env_filter();
//!     tracing::info!("starting import");
//! }
//! ```

use tracing::Level;
use tracing_subscriber::fmt;

/// Initialize a stderr subscriber at INFO level.
///
/// Output goes to stderr so the report printed on stdout stays parseable.
/// Includes target (module path), file, and line number.
///
/// # Panics
/// Panics if a global subscriber has already been set.
pub fn init_subscriber() {
    let subscriber = fmt::Subscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

/// Initialize a stderr subscriber honoring the `RUST_LOG` environment variable.
///
/// Falls back to INFO when `RUST_LOG` is unset or unparseable. Use
/// `RUST_LOG=gantry_ingest=debug,info` to see per-row skip decisions for the
/// pipeline while keeping everything else at INFO.
///
/// # Panics
/// Panics if a global subscriber has already been set.
pub fn init_subscriber_with_env_filter() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}
