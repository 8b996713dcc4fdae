//! Resumable tailing of the live log file.
//!
//! The tailer owns both file roles: the **live** file some other process
//! appends to, and the optional **history journal** this process writes.
//! Startup replays the journal through the engine (rebuilding state), then
//! resumes the live file at the journal's checkpoint when the file identity
//! still matches; a rotated or truncated live file is read from the start
//! instead, with the engine's duplicate window absorbing any overlap.
//!
//! Steady state is a cooperative polling loop: consume at most one complete
//! line per iteration, mirror it into the journal, apply it to the engine,
//! and sleep briefly when the live file is drained. I/O errors are fatal
//! and propagate; the loop never retries, since the position bookkeeping
//! cannot be trusted after a partial failure. A checkpoint is written on
//! the way out even when the loop ends in an error.

pub mod checkpoint;
pub mod journal;

pub use checkpoint::{Checkpoint, FileId};
pub use journal::{HistoryJournal, JournalReplay};

use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::engine::{IngestMode, Notifier, NullNotifier, TrackingEngine};

/// Default pause between polls of a drained live file (10 milliseconds).
const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Errors from the tailing loop. All of them are fatal to the process.
#[derive(Debug, Error)]
pub enum TailError {
    #[error("live log file: {0}")]
    Live(#[source] io::Error),

    #[error("history journal: {0}")]
    Journal(#[source] io::Error),
}

/// Configuration for the polling loop.
#[derive(Debug, Clone)]
pub struct TailConfig {
    /// Pause between polls when the live file has no complete line ready.
    ///
    /// Default: 10ms. Configure via `TRAINTRACK_POLL_INTERVAL_MS`.
    pub poll_interval: Duration,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TailConfig {
    /// Creates a `TailConfig` with default values.
    pub fn new() -> Self {
        TailConfig {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    /// Creates a `TailConfig` from environment variables.
    ///
    /// Reads `TRAINTRACK_POLL_INTERVAL_MS` for the poll interval.
    pub fn from_env() -> Self {
        let poll_ms = std::env::var("TRAINTRACK_POLL_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS);

        TailConfig {
            poll_interval: Duration::from_millis(poll_ms),
        }
    }
}

/// Reader over the live file that only ever consumes complete lines.
///
/// The upstream producer may be mid-append when we poll. A trailing
/// fragment without a newline is left unconsumed (the tracked position does
/// not advance), so it is re-read whole on a later poll.
#[derive(Debug)]
struct LiveSource {
    reader: BufReader<File>,
    position: u64,
    id: FileId,
}

impl LiveSource {
    fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let id = FileId::of(&file)?;
        Ok(LiveSource {
            reader: BufReader::new(file),
            position: 0,
            id,
        })
    }

    fn id(&self) -> FileId {
        self.id
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.reader.get_ref().metadata()?.len())
    }

    fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        self.reader.seek(SeekFrom::Start(offset))?;
        self.position = offset;
        Ok(())
    }

    /// Returns the next complete line (trailing newline included), or
    /// `None` when the file is drained or ends in an unfinished line.
    fn next_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line)?;
        if read == 0 {
            return Ok(None);
        }
        if !line.ends_with('\n') {
            self.reader.seek(SeekFrom::Start(self.position))?;
            return Ok(None);
        }
        self.position += read as u64;
        Ok(Some(line))
    }
}

/// Feeds the live file (and, across restarts, the history journal) into a
/// [`TrackingEngine`].
#[derive(Debug)]
pub struct Tailer {
    live: LiveSource,
    journal: Option<HistoryJournal>,
    config: TailConfig,
}

impl Tailer {
    /// Opens the file sources and brings the engine up to date.
    ///
    /// 1. If a journal is configured, replay its mirrored lines through the
    ///    engine and note its last checkpoint, then reopen it for append.
    /// 2. Open the live file; failure here is fatal.
    /// 3. If the checkpoint's identity matches the live file, resume at the
    ///    recorded offset. A mismatched identity (rotation) or an offset
    ///    beyond the current end (truncation) restarts from the beginning.
    pub fn open(
        live_path: impl AsRef<Path>,
        journal_path: Option<&Path>,
        config: TailConfig,
        engine: &mut TrackingEngine,
    ) -> Result<Self, TailError> {
        let mut checkpoint = None;
        let journal = match journal_path {
            Some(path) => {
                let replay = HistoryJournal::replay(path).map_err(TailError::Journal)?;
                let mut sink = NullNotifier;
                for line in &replay.lines {
                    engine.apply_line(line, IngestMode::Replay, &mut sink);
                }
                info!(
                    path = %path.display(),
                    lines = replay.lines.len(),
                    "history journal replayed"
                );
                checkpoint = replay.checkpoint;
                Some(HistoryJournal::open(path).map_err(TailError::Journal)?)
            }
            None => None,
        };

        let live_path = live_path.as_ref();
        let mut live = LiveSource::open(live_path).map_err(TailError::Live)?;
        info!(path = %live_path.display(), identity = %live.id(), "live file opened");

        match checkpoint {
            Some(found) if found.file == live.id() => {
                let len = live.len().map_err(TailError::Live)?;
                if found.offset <= len {
                    live.seek_to(found.offset).map_err(TailError::Live)?;
                    info!(offset = found.offset, "resuming at checkpoint");
                } else {
                    warn!(
                        offset = found.offset,
                        len, "checkpoint lies beyond the live file, reading from the start"
                    );
                }
            }
            Some(found) => {
                info!(
                    recorded = %found.file,
                    current = %live.id(),
                    "live file rotated since checkpoint, reading from the start"
                );
            }
            None => {}
        }

        Ok(Tailer {
            live,
            journal,
            config,
        })
    }

    /// Byte offset of the next unread live byte.
    pub fn position(&self) -> u64 {
        self.live.position()
    }

    /// Consumes at most one live line: mirror it into the journal, then
    /// apply it to the engine.
    ///
    /// Returns `true` when a line was consumed, `false` when the live file
    /// is drained (or ends in a line still being written).
    pub fn step<N: Notifier>(
        &mut self,
        engine: &mut TrackingEngine,
        notifier: &mut N,
    ) -> Result<bool, TailError> {
        let Some(line) = self.live.next_line().map_err(TailError::Live)? else {
            return Ok(false);
        };

        if let Some(journal) = &mut self.journal {
            journal.append_raw(&line).map_err(TailError::Journal)?;
        }
        engine.apply_line(line.trim_end_matches(['\r', '\n']), IngestMode::Live, notifier);
        Ok(true)
    }

    /// Records the current live position in the journal so the next process
    /// resumes exactly here. A no-op without a journal.
    pub fn write_checkpoint(&mut self) -> Result<(), TailError> {
        let Some(journal) = &mut self.journal else {
            return Ok(());
        };
        let checkpoint = Checkpoint {
            offset: self.live.position(),
            file: self.live.id(),
        };
        journal
            .write_checkpoint(checkpoint)
            .map_err(TailError::Journal)?;
        info!(%checkpoint, "checkpoint written");
        Ok(())
    }

    /// Drives the polling loop until `shutdown` is cancelled or an I/O
    /// error ends it. Either way, a final checkpoint is attempted before
    /// returning so restart never reprocesses what this run consumed.
    pub async fn run<N: Notifier>(
        mut self,
        engine: &mut TrackingEngine,
        notifier: &mut N,
        shutdown: CancellationToken,
    ) -> Result<(), TailError> {
        let result = self.run_loop(engine, notifier, &shutdown).await;

        if let Err(err) = self.write_checkpoint() {
            error!(%err, "failed to write shutdown checkpoint");
        }

        result
    }

    async fn run_loop<N: Notifier>(
        &mut self,
        engine: &mut TrackingEngine,
        notifier: &mut N,
        shutdown: &CancellationToken,
    ) -> Result<(), TailError> {
        loop {
            if shutdown.is_cancelled() {
                info!("shutdown requested, stopping tailer");
                return Ok(());
            }

            if self.step(engine, notifier)? {
                continue;
            }

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutdown requested, stopping tailer");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }
}
