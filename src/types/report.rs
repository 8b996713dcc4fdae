//! The stop and report value types shared across the engine.
//!
//! A [`Stop`] is one entry in a train's history; a [`Report`] is the
//! `(train, location, delay)` triple that flows through the dedup window,
//! the aggregate indices, and the notification sink. Both are plain data:
//! all interpretation happens in the model and engine layers.

use serde::{Deserialize, Serialize};

use crate::types::TrainId;

/// Delay value marking a stop that was reconstructed from an established
/// route rather than reported by the train itself.
///
/// Only `Train::replace_route` writes this value. The duration parser can
/// never produce it (parsed delays are bounded by the `HH:MM:SS` fields),
/// so backfilled stops are always distinguishable from real reports.
pub const BACKFILL_DELAY: i64 = i64::MIN;

/// One entry in a train's stop history.
///
/// `delay_secs` is the schedule deviation at that location: positive = late,
/// negative = early.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stop {
    pub location: String,
    pub delay_secs: i64,
}

impl Stop {
    pub fn new(location: impl Into<String>, delay_secs: i64) -> Self {
        Stop {
            location: location.into(),
            delay_secs,
        }
    }

    /// True if this stop was written by route backfill, not a log line.
    pub fn is_backfilled(&self) -> bool {
        self.delay_secs == BACKFILL_DELAY
    }
}

/// A single train movement report: which train, where, how far off schedule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Report {
    pub train: TrainId,
    pub location: String,
    pub delay_secs: i64,
}

impl Report {
    pub fn new(train: impl Into<TrainId>, location: impl Into<String>, delay_secs: i64) -> Self {
        Report {
            train: train.into(),
            location: location.into(),
            delay_secs,
        }
    }
}
