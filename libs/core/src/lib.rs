//! Shared infrastructure for the gantry workspace.
//!
//! Currently this is just [`telemetry`], the tracing subscriber setup used by
//! the binaries. Library crates emit `tracing` events but never install a
//! subscriber themselves.

pub mod telemetry;
