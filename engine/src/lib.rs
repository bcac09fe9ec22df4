//! Territory engine: turns weighted, faction-owned map points into smoothed
//! per-faction polygons, first for the points near a focus location and then
//! for the whole dataset.

pub mod assemble;
pub mod config;
pub mod force;
pub mod geo;
pub mod grid;
pub mod lattice;
pub mod orchestrator;
pub mod regions;
pub mod smooth;
pub mod worker;

pub use config::EngineConfig;
pub use orchestrator::{Orchestrator, RunState, RunSummary};
pub use worker::{WorkerCountersSnapshot, WorkerHandle};
