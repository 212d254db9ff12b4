//! Shared test utilities for songloom integration tests.
//!
//! - `TestHarness` wires an orchestrator to an in-memory database, a
//!   temporary storage root and a scripted generation service
//! - builders for request parameters and remote results

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{FailingStorage, ScriptedClient, TestHarness};
