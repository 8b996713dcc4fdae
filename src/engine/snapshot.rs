//! Point-in-time views of engine state for display layers.
//!
//! The engine does not push updates; a renderer pulls an [`EngineSnapshot`]
//! each refresh tick. Snapshots are fully owned (no borrows into engine
//! state) so a slow consumer can hold one across further ingestion.

use std::fmt;

use serde::Serialize;

use super::EngineCounters;
use crate::model::{Contract, Train};
use crate::types::{ContractId, Report, TrainId};

/// Everything a renderer needs for one frame.
///
/// Ordering is part of the contract: active and inactive contracts are
/// sorted by contract id, `delayed` by descending delay, `early` by
/// ascending delay, and `recent`, `removed` and `status` are
/// most-recent-first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineSnapshot {
    pub active_contracts: Vec<ContractView>,
    pub inactive_contracts: Vec<ContractView>,
    pub delayed: Vec<Report>,
    pub early: Vec<Report>,
    pub recent: Vec<Report>,
    pub removed: Vec<Report>,
    pub status: Vec<String>,
    pub counters: EngineCounters,
}

/// One contract's header line plus its active trains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractView {
    pub cid: ContractId,
    pub route_complete: bool,
    pub route_len: usize,
    pub start: Option<String>,
    pub end: Option<String>,
    pub trains: Vec<TrainView>,
}

impl ContractView {
    pub fn capture(contract: &Contract) -> Self {
        ContractView {
            cid: contract.cid().clone(),
            route_complete: contract.route_complete(),
            route_len: contract.length_of_route(),
            start: contract.start_of_route().map(str::to_string),
            end: contract.end_of_route().map(str::to_string),
            trains: contract.trains().iter().map(TrainView::capture).collect(),
        }
    }
}

/// An incomplete route is flagged with a leading `*`.
impl fmt::Display for ContractView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:>4}: {}--{}-->{}",
            if self.route_complete { ' ' } else { '*' },
            self.cid.as_str(),
            self.start.as_deref().unwrap_or("N/A"),
            self.route_len,
            self.end.as_deref().unwrap_or("N/A"),
        )
    }
}

/// One train's position for the contract listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrainView {
    pub tid: TrainId,
    pub stop_count: usize,
    pub first_location: String,
    pub previous_location: Option<String>,
    pub current_location: String,
    pub delay_secs: i64,
}

impl TrainView {
    pub fn capture(train: &Train) -> Self {
        TrainView {
            tid: train.tid().clone(),
            stop_count: train.stop_count(),
            first_location: train.first_location().unwrap_or_default().to_string(),
            previous_location: train.previous_location().map(str::to_string),
            current_location: train.current_location().unwrap_or_default().to_string(),
            delay_secs: train.current_delay().unwrap_or(0),
        }
    }
}

/// Renders the journey summary: origin, previous and current stop, with the
/// middle elided once the history is longer than two stops.
impl fmt::Display for TrainView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.previous_location {
            None => write!(f, "| {:>4} | {}->?", self.delay_secs, self.current_location),
            Some(prev) if self.stop_count == 2 => {
                write!(f, "| {:>4} | {}->{}", self.delay_secs, prev, self.current_location)
            }
            Some(prev) => write!(
                f,
                "| {:>4} | {}--->{}->{}",
                self.delay_secs, self.first_location, prev, self.current_location
            ),
        }
    }
}
