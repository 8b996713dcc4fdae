//! Per-train stop history.
//!
//! A [`Train`] records the ordered locations one physical run has reported,
//! together with the delay at each. It knows nothing about routes or other
//! trains; the [`Contract`](crate::model::Contract) state machine reads
//! these histories to reconstruct the shared route.

use crate::types::{BACKFILL_DELAY, Stop, TrainId};

/// One train's ordered stop history plus its completion flag.
///
/// The history is append-only except for [`Train::replace_route`], which the
/// line-leader repair path uses to retcon a train onto a newly discovered
/// route. `done` is derived: it only means something while the owning
/// contract's route is complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Train {
    tid: TrainId,
    stops: Vec<Stop>,
    done: bool,
}

impl Train {
    /// Creates a train seeded with its first reported stop.
    pub fn new(tid: TrainId, location: impl Into<String>, delay_secs: i64) -> Self {
        Train {
            tid,
            stops: vec![Stop::new(location, delay_secs)],
            done: false,
        }
    }

    pub fn tid(&self) -> &TrainId {
        &self.tid
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn stop_count(&self) -> usize {
        self.stops.len()
    }

    /// The ordered location sequence, the tuple compared between trains
    /// during route completion detection.
    pub fn locations(&self) -> Vec<&str> {
        self.stops.iter().map(|s| s.location.as_str()).collect()
    }

    pub fn first_location(&self) -> Option<&str> {
        self.stops.first().map(|s| s.location.as_str())
    }

    /// The stop before the current one, if the train has moved at least once.
    pub fn previous_location(&self) -> Option<&str> {
        let n = self.stops.len();
        if n >= 2 {
            Some(self.stops[n - 2].location.as_str())
        } else {
            None
        }
    }

    pub fn current_location(&self) -> Option<&str> {
        self.stops.last().map(|s| s.location.as_str())
    }

    pub fn current_delay(&self) -> Option<i64> {
        self.stops.last().map(|s| s.delay_secs)
    }

    /// Appends a reported stop.
    pub fn append(&mut self, location: impl Into<String>, delay_secs: i64) {
        self.stops.push(Stop::new(location, delay_secs));
    }

    /// Rewrites the entire history from a route's location list.
    ///
    /// Every rewritten stop carries [`BACKFILL_DELAY`]: the train did not
    /// report these stops, the route did. Used only by line-leader repair,
    /// which appends the genuinely reported stop right after.
    pub fn replace_route(&mut self, route: &[String]) {
        self.stops.clear();
        for location in route {
            self.stops.push(Stop::new(location.clone(), BACKFILL_DELAY));
        }
    }

    /// Marks the train done if it currently sits at `terminus`.
    ///
    /// A non-matching terminus leaves `done` untouched; clearing it is the
    /// contract's job when a route reopens.
    pub fn finalize(&mut self, terminus: &str) {
        if self.current_location() == Some(terminus) {
            self.done = true;
        }
    }

    pub fn clear_done(&mut self) {
        self.done = false;
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}
