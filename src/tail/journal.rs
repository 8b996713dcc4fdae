//! The history journal: a verbatim mirror of every consumed live line.
//!
//! Replaying the journal at startup rebuilds engine state without touching
//! the live file. Checkpoint records (see [`super::checkpoint`]) are
//! interleaved with the mirrored lines; they are filtered out of the replay
//! stream and only the last one is authoritative.
//!
//! The format is crash-safe in the same way a line-oriented log is: a crash
//! mid-append leaves at most one partial trailing line, which replay
//! detects (no terminating newline) and truncates away.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::checkpoint::Checkpoint;

/// Everything learned from reading a journal back.
#[derive(Debug, PartialEq, Eq)]
pub struct JournalReplay {
    /// Mirrored log lines in arrival order, without trailing newlines.
    pub lines: Vec<String>,
    /// The last checkpoint record found, if any.
    pub checkpoint: Option<Checkpoint>,
}

/// An append-only journal of consumed live lines plus checkpoint records.
#[derive(Debug)]
pub struct HistoryJournal {
    file: File,
    path: PathBuf,
}

impl HistoryJournal {
    /// Opens the journal for appending, creating it if absent.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(HistoryJournal { file, path })
    }

    /// Mirrors one consumed live line, byte for byte (the caller passes the
    /// line exactly as read, trailing newline included).
    pub fn append_raw(&mut self, line: &str) -> io::Result<()> {
        self.file.write_all(line.as_bytes())
    }

    /// Appends a checkpoint record and forces it to disk. Checkpoints are
    /// the resume point for the next process, so they are never left in the
    /// OS cache.
    pub fn write_checkpoint(&mut self, checkpoint: Checkpoint) -> io::Result<()> {
        writeln!(self.file, "{}", checkpoint.to_line())?;
        self.file.sync_all()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads a journal back: mirrored lines for replay, plus the last
    /// checkpoint. A missing journal is an empty one.
    ///
    /// A partial trailing line (crash mid-append) is dropped from the
    /// replay and truncated from the file, so the next append continues
    /// from a clean line boundary.
    pub fn replay(path: impl AsRef<Path>) -> io::Result<JournalReplay> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(JournalReplay {
                lines: Vec::new(),
                checkpoint: None,
            });
        }

        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let mut lines = Vec::new();
        let mut checkpoint = None;
        let mut consumed: u64 = 0;

        loop {
            let mut line = String::new();
            let read = reader.read_line(&mut line)?;
            if read == 0 {
                break;
            }
            if !line.ends_with('\n') {
                warn!(path = %path.display(), at = consumed, "partial trailing line in journal, truncating");
                break;
            }
            consumed += read as u64;

            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }

            match Checkpoint::parse_line(&line) {
                Some(found) => checkpoint = Some(found),
                None => lines.push(line),
            }
        }

        if consumed < file_len {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(consumed)?;
            file.sync_all()?;
        }

        debug!(
            path = %path.display(),
            lines = lines.len(),
            checkpoint = checkpoint.is_some(),
            "journal replayed"
        );
        Ok(JournalReplay { lines, checkpoint })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tail::checkpoint::FileId;
    use tempfile::tempdir;

    #[test]
    fn open_creates_the_journal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.log");

        assert!(!path.exists());
        let _journal = HistoryJournal::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn replay_of_a_missing_journal_is_empty() {
        let dir = tempdir().unwrap();
        let replay = HistoryJournal::replay(dir.path().join("absent.log")).unwrap();
        assert_eq!(replay.lines, Vec::<String>::new());
        assert_eq!(replay.checkpoint, None);
    }

    #[test]
    fn mirrored_lines_replay_in_arrival_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.log");

        let mut journal = HistoryJournal::open(&path).unwrap();
        journal.append_raw("first line\n").unwrap();
        journal.append_raw("second line\n").unwrap();
        drop(journal);

        let replay = HistoryJournal::replay(&path).unwrap();
        assert_eq!(replay.lines, vec!["first line", "second line"]);
        assert_eq!(replay.checkpoint, None);
    }

    #[test]
    fn journal_content_is_byte_identical_to_what_was_appended() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.log");

        let mut journal = HistoryJournal::open(&path).unwrap();
        journal
            .append_raw("Delay for train A123[Springfield]: 00:02:00\n")
            .unwrap();
        drop(journal);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Delay for train A123[Springfield]: 00:02:00\n");
    }

    #[test]
    fn the_last_checkpoint_wins() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.log");

        let mut journal = HistoryJournal::open(&path).unwrap();
        journal.append_raw("line one\n").unwrap();
        journal
            .write_checkpoint(Checkpoint {
                offset: 10,
                file: FileId(1),
            })
            .unwrap();
        journal.append_raw("line two\n").unwrap();
        journal
            .write_checkpoint(Checkpoint {
                offset: 20,
                file: FileId(1),
            })
            .unwrap();
        drop(journal);

        let replay = HistoryJournal::replay(&path).unwrap();
        assert_eq!(replay.lines, vec!["line one", "line two"]);
        assert_eq!(
            replay.checkpoint,
            Some(Checkpoint {
                offset: 20,
                file: FileId(1)
            })
        );
    }

    #[test]
    fn partial_trailing_line_is_dropped_and_truncated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.log");

        let mut journal = HistoryJournal::open(&path).unwrap();
        journal.append_raw("complete line\n").unwrap();
        journal.append_raw("partial without newline").unwrap();
        drop(journal);

        let replay = HistoryJournal::replay(&path).unwrap();
        assert_eq!(replay.lines, vec!["complete line"]);

        // The file was cut back to the last complete line, so appends
        // resume on a clean boundary.
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "complete line\n");

        let mut journal = HistoryJournal::open(&path).unwrap();
        journal.append_raw("next session\n").unwrap();
        drop(journal);

        let replay = HistoryJournal::replay(&path).unwrap();
        assert_eq!(replay.lines, vec!["complete line", "next session"]);
    }

    #[test]
    fn crlf_lines_replay_without_line_endings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.log");

        let mut journal = HistoryJournal::open(&path).unwrap();
        journal.append_raw("windows line\r\n").unwrap();
        drop(journal);

        let replay = HistoryJournal::replay(&path).unwrap();
        assert_eq!(replay.lines, vec!["windows line"]);
    }
}
