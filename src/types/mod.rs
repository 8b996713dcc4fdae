//! Core domain types for the tracking engine.
//!
//! This module contains the fundamental value types used throughout the
//! application, designed to encode invariants via the type system.

pub mod ids;
pub mod report;

// Re-export commonly used types at the module level
pub use ids::{ContractId, ContractType, TrainId};
pub use report::{BACKFILL_DELAY, Report, Stop};
