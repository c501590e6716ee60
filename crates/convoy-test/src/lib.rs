//! Convoy Test Harness - Multi-peer tables and end-to-end scenarios
//!
//! This crate provides:
//! - Table: several peers sharing one document store over an in-process hub
//! - RecordingNotifier: captures user-facing feedback per peer
//! - Scenario tests covering joins, leader moves, walls and ownership

pub mod recorder;
pub mod table;
pub mod scenarios;

pub use recorder::*;
pub use table::*;
