//! Orchestrator module: the operations exposed by the binary

pub mod runner;

pub use runner::{check, CheckReport, CleanReport, Orchestrator, SyncReport};
