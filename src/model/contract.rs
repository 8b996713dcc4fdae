//! The route reconstruction state machine.
//!
//! A contract groups the trains that run one service. No schedule is
//! consulted: the only signal that a route is fully known is that two
//! distinct trains eventually retrace an identical stop sequence. Until
//! then the route is the longest stop history seen so far, growing
//! monotonically.
//!
//! # States
//!
//! - **Open** (`route_complete == false`): the route is a best guess.
//! - **Closed** (`route_complete == true`): two trains agreed; the last
//!   route element is the authoritative terminus and trains reaching it are
//!   done.
//!
//! Both states are re-enterable. A train whose history outgrows the route
//! reopens a closed contract; a fresh agreement closes it again. There is
//! no terminal state.
//!
//! # Line leaders
//!
//! The two trains whose matching sequences closed the route are remembered
//! as its line leaders. If a leader later reports a location that is not on
//! the route, the agreed terminus was wrong: the leader is retconned onto
//! `route + new stop` so the normal longest-train rule reopens the contract
//! (see [`Contract::repair_line_leader`]).

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::model::Train;
use crate::types::{ContractId, ContractType, Report, TrainId};

/// Route reconstruction state for one group of trains.
///
/// The active train list preserves first-arrival order; tie-breaks in
/// [`Contract::update_route`] and [`Contract::check_for_complete_route`]
/// are defined as "first train by arrival order".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    cid: ContractId,
    ctype: ContractType,
    route: Vec<String>,
    route_complete: bool,
    line_leaders: Option<(TrainId, TrainId)>,
    trains: Vec<Train>,
    completed_trains: Vec<Train>,
}

impl Contract {
    pub fn new(cid: ContractId, ctype: ContractType) -> Self {
        Contract {
            cid,
            ctype,
            route: Vec::new(),
            route_complete: false,
            line_leaders: None,
            trains: Vec::new(),
            completed_trains: Vec::new(),
        }
    }

    pub fn cid(&self) -> &ContractId {
        &self.cid
    }

    pub fn ctype(&self) -> &ContractType {
        &self.ctype
    }

    pub fn route(&self) -> &[String] {
        &self.route
    }

    pub fn route_complete(&self) -> bool {
        self.route_complete
    }

    pub fn line_leaders(&self) -> Option<&(TrainId, TrainId)> {
        self.line_leaders.as_ref()
    }

    pub fn length_of_route(&self) -> usize {
        self.route.len()
    }

    pub fn start_of_route(&self) -> Option<&str> {
        self.route.first().map(String::as_str)
    }

    pub fn end_of_route(&self) -> Option<&str> {
        self.route.last().map(String::as_str)
    }

    pub fn number_of_trains(&self) -> usize {
        self.trains.len()
    }

    /// True while any train is still active on this contract.
    pub fn is_active(&self) -> bool {
        !self.trains.is_empty()
    }

    pub fn trains(&self) -> &[Train] {
        &self.trains
    }

    pub fn completed_trains(&self) -> &[Train] {
        &self.completed_trains
    }

    fn train_mut(&mut self, tid: &TrainId) -> Option<&mut Train> {
        self.trains.iter_mut().find(|t| t.tid() == tid)
    }

    fn is_line_leader(&self, tid: &TrainId) -> bool {
        self.line_leaders
            .as_ref()
            .is_some_and(|(a, b)| a == tid || b == tid)
    }

    /// Records a reported stop for `tid`.
    ///
    /// Creates the train on first sight, routes line leaders that
    /// contradict a closed route through [`Contract::repair_line_leader`],
    /// then re-evaluates the route. While the contract is closed, the
    /// arriving train is finalized against the current terminus.
    ///
    /// Returns true exactly when this arrival transitioned the contract
    /// from Open to Closed.
    pub fn arrive(&mut self, tid: &TrainId, location: &str, delay_secs: i64) -> bool {
        let was_complete = self.route_complete;

        let needs_repair = self.route_complete
            && self.is_line_leader(tid)
            && !self.route.iter().any(|loc| loc == location);

        if needs_repair {
            self.repair_line_leader(tid, location, delay_secs);
        } else if let Some(train) = self.train_mut(tid) {
            trace!(%tid, %location, delay_secs, "new location for train");
            train.append(location, delay_secs);
        } else {
            debug!(%tid, %location, cid = %self.cid, "new train");
            self.trains
                .push(Train::new(tid.clone(), location, delay_secs));
        }

        self.update_route(tid);

        if self.route_complete {
            if let Some(terminus) = self.route.last().cloned() {
                if let Some(train) = self.train_mut(tid) {
                    train.finalize(&terminus);
                }
            }
        }

        self.route_complete && !was_complete
    }

    /// Re-evaluates the route against the current train histories.
    ///
    /// If any train's stop history is longer than the route, the contract
    /// reopens: the route becomes the history of the first such train (by
    /// arrival order) and every train's `done` flag is cleared. While open,
    /// completion detection runs with the new longest length as threshold.
    pub fn update_route(&mut self, tid: &TrainId) {
        let mut longest_len = self.route.len();
        let mut longest_idx = None;
        for (idx, train) in self.trains.iter().enumerate() {
            if train.stop_count() > longest_len {
                longest_len = train.stop_count();
                longest_idx = Some(idx);
            }
        }

        if let Some(idx) = longest_idx {
            self.route_complete = false;
            self.route = self.trains[idx]
                .locations()
                .into_iter()
                .map(str::to_string)
                .collect();
            for train in &mut self.trains {
                train.clear_done();
            }
            debug!(
                %tid,
                cid = %self.cid,
                route_len = self.route.len(),
                source = %self.trains[idx].tid(),
                "route grew, contract reopened"
            );
        }

        if !self.route_complete {
            self.check_for_complete_route(longest_len);
        }
    }

    /// Closes the route if two distinct trains have produced an identical
    /// location sequence of at least `threshold` stops.
    ///
    /// Trains shorter than `threshold` cannot yet prove a cycle and are
    /// skipped. The scan walks trains in arrival order and stops at the
    /// first collision: that train and the earlier producer of the same
    /// sequence become the line leaders, the sequence becomes the route,
    /// and every active train is finalized against the new terminus.
    pub fn check_for_complete_route(&mut self, threshold: usize) {
        let mut matched: Option<(TrainId, TrainId, Vec<String>)> = None;
        {
            let mut seen: HashMap<Vec<&str>, &TrainId> = HashMap::new();
            for train in &self.trains {
                if train.stop_count() < threshold {
                    continue;
                }
                let tuple = train.locations();
                if let Some(first_producer) = seen.get(&tuple) {
                    matched = Some((
                        train.tid().clone(),
                        (*first_producer).clone(),
                        tuple.into_iter().map(str::to_string).collect(),
                    ));
                    break;
                }
                seen.insert(tuple, train.tid());
            }
        }

        let Some((this_tid, prev_tid, route)) = matched else {
            return;
        };

        debug!(
            cid = %self.cid,
            route_len = route.len(),
            leader = %this_tid,
            confirmed_by = %prev_tid,
            "route closed"
        );

        self.route = route;
        self.line_leaders = Some((this_tid, prev_tid));
        self.route_complete = true;

        if let Some(terminus) = self.route.last().cloned() {
            for train in &mut self.trains {
                train.finalize(&terminus);
            }
        }
    }

    /// Retcons a line leader onto the closed route plus its new location.
    ///
    /// Called when a leader reports a stop beyond the agreed terminus: the
    /// route evidently continues. The leaders reset to a self-pair
    /// (unconfirmed again) and the train's history becomes
    /// `route + new stop`, making it the longest candidate so the following
    /// `update_route` reopens the contract. A leader that was already
    /// purged is revived into the active set.
    pub fn repair_line_leader(&mut self, tid: &TrainId, location: &str, delay_secs: i64) {
        debug!(
            %tid,
            %location,
            cid = %self.cid,
            "line leader passed the agreed terminus, retconning"
        );

        self.line_leaders = Some((tid.clone(), tid.clone()));
        let route = self.route.clone();

        if let Some(train) = self.train_mut(tid) {
            train.replace_route(&route);
            train.append(location, delay_secs);
            return;
        }

        let mut train = match self.completed_trains.iter().position(|t| t.tid() == tid) {
            Some(pos) => self.completed_trains.remove(pos),
            None => Train::new(tid.clone(), location, delay_secs),
        };
        train.replace_route(&route);
        train.append(location, delay_secs);
        self.trains.push(train);
    }

    /// Migrates every done train into the completed set.
    ///
    /// Returns one report per purged train (its final stop) so the caller
    /// can maintain the aggregate indices. A re-purged train id replaces
    /// its previous completed entry.
    pub fn purge_trains(&mut self) -> Vec<Report> {
        let mut purged = Vec::new();
        let mut idx = 0;
        while idx < self.trains.len() {
            if !self.trains[idx].is_done() {
                idx += 1;
                continue;
            }
            let train = self.trains.remove(idx);
            if let Some(stop) = train.stops().last() {
                purged.push(Report::new(
                    train.tid().clone(),
                    stop.location.clone(),
                    stop.delay_secs,
                ));
            }
            match self
                .completed_trains
                .iter()
                .position(|t| t.tid() == train.tid())
            {
                Some(pos) => self.completed_trains[pos] = train,
                None => self.completed_trains.push(train),
            }
        }
        purged
    }
}
