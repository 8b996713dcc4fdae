//! The tracking engine.
//!
//! Owns the contract table and the aggregate indices, and applies raw log
//! lines to them one at a time. Lines arrive from two sources with
//! different side-effect rules:
//!
//! - **Replay** (the history journal read at startup): rebuilds state,
//!   never notifies.
//! - **Live** (the tailed log file): full processing, including
//!   notification requests for severe delays.
//!
//! Both sources share one duplicate-suppression window, because the replay
//! window and the start of the live window can overlap after a restart.
//!
//! Consumers do not observe individual events; they pull an
//! [`EngineSnapshot`] whenever they want to render.

pub mod snapshot;

pub use snapshot::{ContractView, EngineSnapshot, TrainView};

use std::collections::{BTreeMap, HashMap, VecDeque};

use serde::Serialize;
use tracing::{debug, instrument, trace, warn};

use crate::dedup::UniqueWindow;
use crate::model::Contract;
use crate::parse::{self, LineEvent};
use crate::types::{ContractId, Report, TrainId};

/// Tunables for classification and the bounded histories.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// A delay strictly above this many seconds counts as delayed.
    pub delayed_threshold_secs: i64,
    /// A delay at or below this many seconds counts as early.
    pub early_threshold_secs: i64,
    /// A live delay strictly above this many seconds requests a notification.
    pub notify_threshold_secs: i64,
    /// Size of the duplicate-line suppression window.
    pub dedup_capacity: usize,
    /// Entries kept in the recent-delays history.
    pub recent_capacity: usize,
    /// Entries kept in the finished-trains history.
    pub removed_capacity: usize,
    /// Lines kept in the status buffer.
    pub status_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            delayed_threshold_secs: 60,
            early_threshold_secs: -120,
            notify_threshold_secs: 120,
            dedup_capacity: 200,
            recent_capacity: 12,
            removed_capacity: 12,
            status_capacity: 5000,
        }
    }
}

impl EngineConfig {
    /// Sets the delayed classification threshold (exclusive, seconds).
    pub fn with_delayed_threshold_secs(mut self, secs: i64) -> Self {
        self.delayed_threshold_secs = secs;
        self
    }

    /// Sets the early classification threshold (inclusive, seconds).
    pub fn with_early_threshold_secs(mut self, secs: i64) -> Self {
        self.early_threshold_secs = secs;
        self
    }

    /// Sets the notification threshold (exclusive, seconds).
    pub fn with_notify_threshold_secs(mut self, secs: i64) -> Self {
        self.notify_threshold_secs = secs;
        self
    }

    /// Sets the duplicate-suppression window size.
    pub fn with_dedup_capacity(mut self, capacity: usize) -> Self {
        self.dedup_capacity = capacity;
        self
    }

    /// Sets the recent-delays history size.
    pub fn with_recent_capacity(mut self, capacity: usize) -> Self {
        self.recent_capacity = capacity;
        self
    }

    /// Sets the finished-trains history size.
    pub fn with_removed_capacity(mut self, capacity: usize) -> Self {
        self.removed_capacity = capacity;
        self
    }

    /// Sets the status buffer size.
    pub fn with_status_capacity(mut self, capacity: usize) -> Self {
        self.status_capacity = capacity;
        self
    }
}

/// Whether a line comes from the history journal or the live file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestMode {
    /// Rebuilding state from the journal; side effects reserved for live
    /// events are suppressed.
    Replay,
    /// Tailing the live file.
    Live,
}

/// Receives notification requests for severely delayed live arrivals.
///
/// The engine guarantees at most one call per qualifying arrival and no
/// calls at all during replay. Implementations decide the transport; tests
/// typically record the reports in a `Vec`.
pub trait Notifier {
    fn notify(&mut self, report: &Report);
}

/// Discards every notification request.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&mut self, _report: &Report) {}
}

/// Running totals exposed for observability. Recoverable conditions
/// (duplicates, unrecognized lines, malformed ids) are visible here rather
/// than as errors.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineCounters {
    pub lines: u64,
    pub arrivals: u64,
    pub duplicates: u64,
    pub ignored: u64,
    pub bad_platforms: u64,
    pub malformed_ids: u64,
    pub routes_closed: u64,
    pub trains_finished: u64,
    pub notifications: u64,
}

/// Applies parsed log events to contract state and maintains the derived
/// delayed/early/recent/removed indices.
#[derive(Debug)]
pub struct TrackingEngine {
    config: EngineConfig,
    contracts: BTreeMap<ContractId, Contract>,
    seen: UniqueWindow<Report>,
    delayed: HashMap<TrainId, Report>,
    early: HashMap<TrainId, Report>,
    recent: UniqueWindow<Report>,
    removed: UniqueWindow<Report>,
    status: VecDeque<String>,
    counters: EngineCounters,
}

impl TrackingEngine {
    pub fn new(config: EngineConfig) -> Self {
        TrackingEngine {
            contracts: BTreeMap::new(),
            seen: UniqueWindow::new(config.dedup_capacity),
            delayed: HashMap::new(),
            early: HashMap::new(),
            recent: UniqueWindow::new(config.recent_capacity),
            removed: UniqueWindow::new(config.removed_capacity),
            status: VecDeque::new(),
            counters: EngineCounters::default(),
            config,
        }
    }

    /// Applies one raw log line.
    ///
    /// Processing steps for an arrival:
    ///
    /// 1. Derive the contract key from the train id; a malformed id drops
    ///    this one event.
    /// 2. Offer the report to the duplicate window; duplicates are ignored.
    /// 3. Apply the arrival to its contract (created on first sight).
    /// 4. Reclassify the train in the delayed/early indices, last write
    ///    wins per train.
    /// 5. Record qualifying delays in the recent history; severe live
    ///    delays request a notification.
    /// 6. Purge finished trains into the removed history and clear them
    ///    from delayed/early.
    ///
    /// Bad-platform events only produce a status line. Unrecognized lines
    /// are counted and dropped.
    #[instrument(skip(self, raw, notifier))]
    pub fn apply_line<N: Notifier>(&mut self, raw: &str, mode: IngestMode, notifier: &mut N) {
        self.counters.lines += 1;
        match parse::parse_line(raw) {
            Some(LineEvent::Arrival(report)) => self.apply_arrival(report, mode, notifier),
            Some(LineEvent::BadPlatform(tid)) => {
                self.counters.bad_platforms += 1;
                self.push_status(format!("Bad platform for train {tid}"));
            }
            None => {
                self.counters.ignored += 1;
                trace!(raw, "unrecognized line, ignored");
            }
        }
    }

    fn apply_arrival<N: Notifier>(&mut self, report: Report, mode: IngestMode, notifier: &mut N) {
        let (ctype, cid) = match parse::contract_key(&report.train) {
            Ok(key) => key,
            Err(err) => {
                self.counters.malformed_ids += 1;
                warn!(%err, "dropping arrival");
                return;
            }
        };

        if !self.seen.offer(report.clone()) {
            self.counters.duplicates += 1;
            trace!(train = %report.train, "duplicate within window, ignored");
            return;
        }
        self.counters.arrivals += 1;

        let contract = self
            .contracts
            .entry(cid.clone())
            .or_insert_with(|| Contract::new(cid.clone(), ctype));
        let closed_now = contract.arrive(&report.train, &report.location, report.delay_secs);
        let finished = contract.purge_trains();

        if closed_now {
            self.counters.routes_closed += 1;
            debug!(%cid, train = %report.train, "route closed");
            self.push_status(format!("Closing route {cid}"));
        }

        self.classify(&report);

        if report.delay_secs > self.config.delayed_threshold_secs {
            self.recent.offer(report.clone());
            if mode == IngestMode::Live && report.delay_secs > self.config.notify_threshold_secs {
                self.counters.notifications += 1;
                notifier.notify(&report);
            }
        }

        for report in finished {
            self.record_finished(report);
        }
    }

    /// Last-write-wins membership in the delayed/early indices.
    fn classify(&mut self, report: &Report) {
        if report.delay_secs > self.config.delayed_threshold_secs {
            self.delayed.insert(report.train.clone(), report.clone());
            self.early.remove(&report.train);
        } else if report.delay_secs <= self.config.early_threshold_secs {
            self.early.insert(report.train.clone(), report.clone());
            self.delayed.remove(&report.train);
        } else {
            self.delayed.remove(&report.train);
            self.early.remove(&report.train);
        }
    }

    fn record_finished(&mut self, report: Report) {
        trace!(train = %report.train, location = %report.location, "train finished");
        self.counters.trains_finished += 1;
        self.delayed.remove(&report.train);
        self.early.remove(&report.train);
        self.removed.offer(report);
    }

    /// Prepends a status line, dropping the oldest beyond capacity.
    pub fn push_status(&mut self, message: String) {
        self.status.push_front(message);
        self.status.truncate(self.config.status_capacity);
    }

    pub fn counters(&self) -> EngineCounters {
        self.counters
    }

    pub fn contract(&self, cid: &ContractId) -> Option<&Contract> {
        self.contracts.get(cid)
    }

    /// Captures a point-in-time view of every index and contract.
    pub fn snapshot(&self) -> EngineSnapshot {
        let mut active_contracts = Vec::new();
        let mut inactive_contracts = Vec::new();
        for contract in self.contracts.values() {
            let view = ContractView::capture(contract);
            if contract.is_active() {
                active_contracts.push(view);
            } else {
                inactive_contracts.push(view);
            }
        }

        let mut delayed: Vec<Report> = self.delayed.values().cloned().collect();
        delayed.sort_by(|a, b| {
            b.delay_secs
                .cmp(&a.delay_secs)
                .then_with(|| a.train.cmp(&b.train))
        });
        let mut early: Vec<Report> = self.early.values().cloned().collect();
        early.sort_by(|a, b| {
            a.delay_secs
                .cmp(&b.delay_secs)
                .then_with(|| a.train.cmp(&b.train))
        });

        EngineSnapshot {
            active_contracts,
            inactive_contracts,
            delayed,
            early,
            recent: self.recent.iter().cloned().collect(),
            removed: self.removed.iter().cloned().collect(),
            status: self.status.iter().cloned().collect(),
            counters: self.counters,
        }
    }
}

impl Default for TrackingEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Train;

    /// Records every notification for assertion.
    #[derive(Default)]
    struct RecordingNotifier {
        reports: Vec<Report>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&mut self, report: &Report) {
            self.reports.push(report.clone());
        }
    }

    fn apply_all(engine: &mut TrackingEngine, lines: &[&str], mode: IngestMode) {
        let mut notifier = NullNotifier;
        for line in lines {
            engine.apply_line(line, mode, &mut notifier);
        }
    }

    const SHARED_ROUTE: [&str; 4] = [
        "Delay for train A123[Springfield]: 00:02:00",
        "Delay for train A123[Shelbyville]: 00:00:30",
        "Delay for train B123[Springfield]: 00:02:10",
        "Delay for train B123[Shelbyville]: 00:00:10",
    ];

    // ========================================================================
    // End to end
    // ========================================================================

    #[test]
    fn two_trains_reconstruct_and_finish_a_shared_route() {
        let mut engine = TrackingEngine::default();
        let mut notifier = RecordingNotifier::default();
        for line in SHARED_ROUTE {
            engine.apply_line(line, IngestMode::Live, &mut notifier);
        }

        let contract = engine.contract(&ContractId::new("123")).expect("contract exists");
        assert_eq!(contract.route(), ["Springfield", "Shelbyville"]);
        assert!(contract.route_complete());
        assert_eq!(
            contract.line_leaders(),
            Some(&(TrainId::new("B123"), TrainId::new("A123")))
        );

        // Both trains reached the terminus: finished, purged, still done.
        assert!(!contract.is_active());
        assert_eq!(contract.completed_trains().len(), 2);
        assert!(contract.completed_trains().iter().all(Train::is_done));

        let snap = engine.snapshot();
        assert_eq!(
            snap.removed,
            vec![
                Report::new("B123", "Shelbyville", 10),
                Report::new("A123", "Shelbyville", 30),
            ]
        );
        assert_eq!(
            snap.recent,
            vec![
                Report::new("B123", "Springfield", 130),
                Report::new("A123", "Springfield", 120),
            ]
        );
        // Finished trains leave the delay board.
        assert!(snap.delayed.is_empty());
        assert!(snap.early.is_empty());
        assert_eq!(snap.active_contracts.len(), 0);
        assert_eq!(snap.inactive_contracts.len(), 1);

        // 130s is above the notification threshold, 120s is not.
        assert_eq!(notifier.reports, vec![Report::new("B123", "Springfield", 130)]);
        assert_eq!(snap.status, vec!["Closing route 123".to_string()]);

        let counters = engine.counters();
        assert_eq!(counters.arrivals, 4);
        assert_eq!(counters.routes_closed, 1);
        assert_eq!(counters.trains_finished, 2);
        assert_eq!(counters.notifications, 1);
    }

    #[test]
    fn replaying_the_same_lines_twice_converges_to_the_same_state() {
        let lines = [
            "Delay for train A123[a]: 00:01:30",
            "Delay for train B123[a]: 00:00:05",
            "Delay for train A123[b]: -00:02:30",
            "Delay for train C456[x]: 00:03:00",
            "Delay for train B123[b]: 00:00:45",
        ];

        let mut first = TrackingEngine::default();
        apply_all(&mut first, &lines, IngestMode::Replay);
        let mut second = TrackingEngine::default();
        apply_all(&mut second, &lines, IngestMode::Replay);

        assert_eq!(first.snapshot(), second.snapshot());
        assert_eq!(
            first.contract(&ContractId::new("123")),
            second.contract(&ContractId::new("123"))
        );
        assert_eq!(first.counters(), second.counters());
    }

    // ========================================================================
    // Classification
    // ========================================================================

    #[test]
    fn classification_thresholds_are_exclusive_and_inclusive_as_specified() {
        let mut engine = TrackingEngine::default();
        let lines = [
            "Delay for train A111[a]: 00:01:01",
            "Delay for train B222[a]: 00:01:00",
            "Delay for train C333[a]: -00:02:00",
            "Delay for train D444[a]: -00:01:59",
        ];
        apply_all(&mut engine, &lines, IngestMode::Live);

        let snap = engine.snapshot();
        assert_eq!(snap.delayed, vec![Report::new("A111", "a", 61)]);
        assert_eq!(snap.early, vec![Report::new("C333", "a", -120)]);
    }

    #[test]
    fn classification_is_last_write_wins_per_train() {
        let mut engine = TrackingEngine::default();
        apply_all(
            &mut engine,
            &["Delay for train A111[a]: 00:02:00"],
            IngestMode::Live,
        );
        assert_eq!(engine.snapshot().delayed.len(), 1);

        // The same train turns early: it must move, not co-exist.
        apply_all(
            &mut engine,
            &["Delay for train A111[b]: -00:03:00"],
            IngestMode::Live,
        );
        let snap = engine.snapshot();
        assert!(snap.delayed.is_empty());
        assert_eq!(snap.early, vec![Report::new("A111", "b", -180)]);

        // And back to neither.
        apply_all(
            &mut engine,
            &["Delay for train A111[c]: 00:00:10"],
            IngestMode::Live,
        );
        let snap = engine.snapshot();
        assert!(snap.delayed.is_empty());
        assert!(snap.early.is_empty());
    }

    #[test]
    fn delayed_sorts_descending_and_early_ascending() {
        let mut engine = TrackingEngine::default();
        let lines = [
            "Delay for train A111[a]: 00:02:00",
            "Delay for train B222[a]: 00:05:00",
            "Delay for train C333[a]: 00:03:00",
            "Delay for train D444[a]: -00:04:00",
            "Delay for train E555[a]: -00:02:00",
        ];
        apply_all(&mut engine, &lines, IngestMode::Live);

        let snap = engine.snapshot();
        let delayed: Vec<i64> = snap.delayed.iter().map(|r| r.delay_secs).collect();
        assert_eq!(delayed, vec![300, 180, 120]);
        let early: Vec<i64> = snap.early.iter().map(|r| r.delay_secs).collect();
        assert_eq!(early, vec![-240, -120]);
    }

    // ========================================================================
    // Duplicates and replay
    // ========================================================================

    #[test]
    fn duplicate_lines_within_the_window_are_applied_once() {
        let mut engine = TrackingEngine::default();
        let line = "Delay for train A123[Springfield]: 00:02:00";
        apply_all(&mut engine, &[line, line], IngestMode::Live);

        assert_eq!(engine.counters().arrivals, 1);
        assert_eq!(engine.counters().duplicates, 1);
        let contract = engine.contract(&ContractId::new("123")).expect("contract exists");
        assert_eq!(contract.trains()[0].stop_count(), 1);
    }

    #[test]
    fn replay_then_live_overlap_is_suppressed_by_the_shared_window() {
        let mut engine = TrackingEngine::default();
        let line = "Delay for train A123[Springfield]: 00:02:00";
        apply_all(&mut engine, &[line], IngestMode::Replay);
        apply_all(&mut engine, &[line], IngestMode::Live);

        assert_eq!(engine.counters().arrivals, 1);
        assert_eq!(engine.counters().duplicates, 1);
    }

    #[test]
    fn replay_never_notifies_but_still_populates_the_histories() {
        let mut engine = TrackingEngine::default();
        let mut notifier = RecordingNotifier::default();
        engine.apply_line(
            "Delay for train A123[Springfield]: 00:05:00",
            IngestMode::Replay,
            &mut notifier,
        );

        assert!(notifier.reports.is_empty());
        assert_eq!(engine.counters().notifications, 0);
        let snap = engine.snapshot();
        assert_eq!(snap.recent, vec![Report::new("A123", "Springfield", 300)]);
        assert_eq!(snap.delayed.len(), 1);
    }

    #[test]
    fn notification_threshold_is_strictly_above_two_minutes() {
        let mut engine = TrackingEngine::default();
        let mut notifier = RecordingNotifier::default();
        engine.apply_line(
            "Delay for train A123[a]: 00:02:00",
            IngestMode::Live,
            &mut notifier,
        );
        engine.apply_line(
            "Delay for train B456[a]: 00:02:01",
            IngestMode::Live,
            &mut notifier,
        );

        assert_eq!(notifier.reports, vec![Report::new("B456", "a", 121)]);
    }

    // ========================================================================
    // Other line shapes
    // ========================================================================

    #[test]
    fn bad_platform_lines_only_touch_the_status_buffer() {
        let mut engine = TrackingEngine::default();
        apply_all(
            &mut engine,
            &["WARN Bad platform for train A123 at depot"],
            IngestMode::Live,
        );

        assert_eq!(engine.counters().bad_platforms, 1);
        assert_eq!(engine.counters().arrivals, 0);
        let snap = engine.snapshot();
        assert_eq!(snap.status, vec!["Bad platform for train A123".to_string()]);
        assert!(snap.active_contracts.is_empty());
    }

    #[test]
    fn malformed_train_ids_drop_only_that_event() {
        let mut engine = TrackingEngine::default();
        let lines = [
            "Delay for train X[a]: 00:00:10",
            "Delay for train A123[a]: 00:00:10",
        ];
        apply_all(&mut engine, &lines, IngestMode::Live);

        assert_eq!(engine.counters().malformed_ids, 1);
        assert_eq!(engine.counters().arrivals, 1);
        assert!(engine.contract(&ContractId::new("123")).is_some());
    }

    #[test]
    fn unrecognized_lines_are_counted_and_ignored() {
        let mut engine = TrackingEngine::default();
        apply_all(
            &mut engine,
            &["completely unrelated log chatter", ""],
            IngestMode::Live,
        );

        assert_eq!(engine.counters().ignored, 2);
        assert_eq!(engine.counters().arrivals, 0);
    }

    // ========================================================================
    // Bounded histories
    // ========================================================================

    #[test]
    fn recent_history_is_bounded_and_most_recent_first() {
        let config = EngineConfig::default().with_recent_capacity(2);
        let mut engine = TrackingEngine::new(config);
        let lines = [
            "Delay for train A111[a]: 00:02:00",
            "Delay for train B222[b]: 00:03:00",
            "Delay for train C333[c]: 00:04:00",
        ];
        apply_all(&mut engine, &lines, IngestMode::Live);

        assert_eq!(
            engine.snapshot().recent,
            vec![
                Report::new("C333", "c", 240),
                Report::new("B222", "b", 180),
            ]
        );
    }

    #[test]
    fn removed_history_is_bounded() {
        let config = EngineConfig::default().with_removed_capacity(1);
        let mut engine = TrackingEngine::new(config);
        apply_all(&mut engine, &SHARED_ROUTE, IngestMode::Live);

        // Both trains finished; only the most recent survives the bound.
        assert_eq!(engine.counters().trains_finished, 2);
        assert_eq!(
            engine.snapshot().removed,
            vec![Report::new("B123", "Shelbyville", 10)]
        );
    }

    #[test]
    fn status_buffer_is_bounded() {
        let config = EngineConfig::default().with_status_capacity(2);
        let mut engine = TrackingEngine::new(config);
        for tid in ["A123", "B123", "C123"] {
            engine.push_status(format!("Bad platform for train {tid}"));
        }

        assert_eq!(
            engine.snapshot().status,
            vec![
                "Bad platform for train C123".to_string(),
                "Bad platform for train B123".to_string(),
            ]
        );
    }

    #[test]
    fn a_line_evicted_from_the_dedup_window_is_reprocessed() {
        let config = EngineConfig::default().with_dedup_capacity(1);
        let mut engine = TrackingEngine::new(config);
        let first = "Delay for train A123[a]: 00:00:10";
        let second = "Delay for train B456[b]: 00:00:10";
        apply_all(&mut engine, &[first, second, first], IngestMode::Live);

        // The window held only `second` when `first` came back around.
        assert_eq!(engine.counters().arrivals, 3);
        assert_eq!(engine.counters().duplicates, 0);
    }

    #[test]
    fn classification_thresholds_are_configurable() {
        let config = EngineConfig::default()
            .with_delayed_threshold_secs(20)
            .with_early_threshold_secs(-30)
            .with_notify_threshold_secs(40);
        let mut engine = TrackingEngine::new(config);
        let mut notifier = RecordingNotifier::default();
        engine.apply_line("Delay for train A111[a]: 00:00:21", IngestMode::Live, &mut notifier);
        engine.apply_line("Delay for train B222[a]: -00:00:30", IngestMode::Live, &mut notifier);
        engine.apply_line("Delay for train C333[a]: 00:00:41", IngestMode::Live, &mut notifier);

        let snap = engine.snapshot();
        assert_eq!(snap.delayed.len(), 2);
        assert_eq!(snap.early, vec![Report::new("B222", "a", -30)]);
        assert_eq!(notifier.reports, vec![Report::new("C333", "a", 41)]);
    }

    #[test]
    fn contracts_snapshot_in_cid_order() {
        let mut engine = TrackingEngine::default();
        let lines = [
            "Delay for train A900[x]: 00:00:01",
            "Delay for train A100[y]: 00:00:01",
            "Delay for train A500[z]: 00:00:01",
        ];
        apply_all(&mut engine, &lines, IngestMode::Live);

        let snap = engine.snapshot();
        let cids: Vec<&str> = snap
            .active_contracts
            .iter()
            .map(|c| c.cid.as_str())
            .collect();
        assert_eq!(cids, vec!["100", "500", "900"]);
    }
}
