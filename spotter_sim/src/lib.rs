//! Spotter Deterministic Simulation Harness
//!
//! This crate runs the reporting engine against a controlled environment
//! where every run is reproducible from one seed:
//! - **Time**: virtual clock, advanced explicitly by scenarios
//! - **Store**: in-memory `inspector_reports` table with injectable faults
//! - **Identity**: per-client sessions that can sign in and out
//! - **Randomness**: sighting positions and client choices from a seeded RNG
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        SimWorld                          │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │ SimContext (virtual clock + seeded RNG)            │  │
//! │  └────────────────────────────────────────────────────┘  │
//! │       │                         │                        │
//! │  ┌────▼─────┐              ┌────▼─────┐                  │
//! │  │ Client 0 │              │ Client 1 │     ...          │
//! │  │ Service  │              │ Service  │                  │
//! │  └────┬─────┘              └────┬─────┘                  │
//! │       │ SessionStore            │ SessionStore           │
//! │  ┌────▼─────────────────────────▼────┐                   │
//! │  │   MemoryStore + fault controller  │                   │
//! │  └───────────────────────────────────┘                   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use spotter_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42, 4).run(ScenarioId::Crowd).await;
//! assert!(result.passed);
//! ```

mod context;
mod identity;
mod runner;
mod store;
mod world;
pub mod scenarios;

pub use context::SimContext;
pub use identity::SimIdentity;
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use store::{MemoryStore, SessionStore, StoreFaultController, StoreOp};
pub use world::{SimClient, SimConfig, SimService, SimWorld};
