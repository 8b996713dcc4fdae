//! Checkpoint records for resumable tailing.
//!
//! A checkpoint is one plain-text line in the history journal:
//!
//! ```text
//! last_read_position: 500 of 42
//! ```
//!
//! It records a byte offset into the live file together with that file's
//! identity at the time. The identity is the inode number, which is stable
//! across renames of the same file but changes when the path is recreated,
//! so a rotated log is never resumed mid-file.

use std::fmt;
use std::fs::File;
use std::io;
use std::os::unix::fs::MetadataExt;

/// The marker that begins a checkpoint line.
pub const CHECKPOINT_PREFIX: &str = "last_read_position: ";

/// Stable identity of a file on disk (its inode number).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(pub u64);

impl FileId {
    /// Reads the identity of an open file.
    pub fn of(file: &File) -> io::Result<FileId> {
        Ok(FileId(file.metadata()?.ino()))
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A resume position: byte offset within a specific live-file identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub offset: u64,
    pub file: FileId,
}

impl Checkpoint {
    /// Renders the journal line, without a trailing newline.
    pub fn to_line(&self) -> String {
        format!("{CHECKPOINT_PREFIX}{} of {}", self.offset, self.file)
    }

    /// Parses a journal line. Returns `None` for anything that is not a
    /// well-formed checkpoint record; such lines belong to the mirrored
    /// log stream instead.
    pub fn parse_line(line: &str) -> Option<Checkpoint> {
        let rest = line.trim().strip_prefix(CHECKPOINT_PREFIX)?;
        let (offset, identity) = rest.split_once(" of ")?;
        Some(Checkpoint {
            offset: offset.trim().parse().ok()?,
            file: FileId(identity.trim().parse().ok()?),
        })
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offset {} of file {}", self.offset, self.file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn renders_the_documented_format() {
        let checkpoint = Checkpoint {
            offset: 500,
            file: FileId(42),
        };
        assert_eq!(checkpoint.to_line(), "last_read_position: 500 of 42");
    }

    #[test]
    fn parses_with_surrounding_whitespace() {
        let parsed = Checkpoint::parse_line("  last_read_position: 500 of 42\n");
        assert_eq!(
            parsed,
            Some(Checkpoint {
                offset: 500,
                file: FileId(42)
            })
        );
    }

    #[test]
    fn rejects_ordinary_log_lines() {
        assert_eq!(Checkpoint::parse_line("Delay for train A123[x]: 00:00:10"), None);
        assert_eq!(Checkpoint::parse_line("last_read_position: pending"), None);
        assert_eq!(Checkpoint::parse_line("last_read_position: x of y"), None);
        assert_eq!(Checkpoint::parse_line(""), None);
    }

    proptest! {
        #[test]
        fn line_roundtrip(offset in any::<u64>(), identity in any::<u64>()) {
            let checkpoint = Checkpoint { offset, file: FileId(identity) };
            prop_assert_eq!(Checkpoint::parse_line(&checkpoint.to_line()), Some(checkpoint));
        }
    }
}
