//! Append-only journal file.
//!
//! One log file per channel, living in the channel's directory. Each record
//! is framed as a 4-byte big-endian length followed by the payload bytes.
//! The runtime relies on exactly three properties: appends are durable (when
//! asked), a tailer's position is monotonic, and tail reads observe writes
//! in append order.
//!
//! Appends go through a single `write` syscall on a file opened in append
//! mode, so concurrent appenders (the owning system plus peers appending
//! through a gate) interleave at record granularity.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Upper bound on a single record; a length prefix beyond this means the
/// journal is corrupt, not that a huge record is in flight.
const MAX_RECORD_LEN: u32 = 1 << 26;

/// Journal I/O errors.
#[derive(Debug, Error)]
pub enum JournalError {
    /// Underlying filesystem error.
    #[error("journal i/o error")]
    Io(#[from] std::io::Error),
    /// The record framing at `position` is not believable.
    #[error("corrupt journal record at position {position}")]
    Corrupt {
        /// Byte offset of the bad frame.
        position: u64,
    },
}

/// Path of the log file for a channel inside its directory.
pub fn journal_path(dir: &Path, channel_name: &str) -> PathBuf {
    dir.join(format!("{channel_name}.rlog"))
}

/// Writes framed records to the end of a journal file.
pub struct Appender {
    file: Mutex<File>,
    durable: bool,
}

impl Appender {
    /// Opens (creating if needed) the journal file for appending.
    ///
    /// With `durable` set, every append is followed by a data sync.
    pub fn open(path: &Path, durable: bool) -> Result<Self, JournalError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
            durable,
        })
    }

    /// Appends one framed record.
    pub fn append(&self, record: &[u8]) -> Result<(), JournalError> {
        let mut frame = Vec::with_capacity(4 + record.len());
        frame.extend_from_slice(&(record.len() as u32).to_be_bytes());
        frame.extend_from_slice(record);

        let mut file = self.file.lock();
        file.write_all(&frame)?;
        file.flush()?;
        if self.durable {
            file.sync_data()?;
        }
        Ok(())
    }
}

/// Positional reader over a journal file.
///
/// The position only moves forward. A partially written trailing record is
/// left in place for the next poll; a malformed length prefix is reported as
/// corruption.
pub struct Tailer {
    file: File,
    position: u64,
}

impl Tailer {
    /// Opens a tailer at the current end of the journal; records already
    /// present are never replayed.
    pub fn open_at_end(path: &Path) -> Result<Self, JournalError> {
        let file = OpenOptions::new().read(true).open(path)?;
        let position = file.metadata()?.len();
        Ok(Self { file, position })
    }

    /// Opens a tailer at the beginning of the journal.
    pub fn open_at_start(path: &Path) -> Result<Self, JournalError> {
        let file = OpenOptions::new().read(true).open(path)?;
        Ok(Self { file, position: 0 })
    }

    /// Current byte offset into the journal.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Reads the next complete record, if one has been appended.
    ///
    /// Returns `Ok(None)` when no complete record is available yet.
    pub fn read_next(&mut self) -> Result<Option<Vec<u8>>, JournalError> {
        let end = self.file.metadata()?.len();
        if self.position + 4 > end {
            return Ok(None);
        }

        self.file.seek(SeekFrom::Start(self.position))?;
        let mut len_buf = [0u8; 4];
        self.file.read_exact(&mut len_buf)?;
        let record_len = u32::from_be_bytes(len_buf);
        if record_len > MAX_RECORD_LEN {
            return Err(JournalError::Corrupt {
                position: self.position,
            });
        }

        let record_end = self.position + 4 + u64::from(record_len);
        if record_end > end {
            // Mid-append; the rest of the record will show up shortly.
            return Ok(None);
        }

        let mut record = vec![0u8; record_len as usize];
        self.file.read_exact(&mut record)?;
        self.position = record_end;
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_append_then_tail_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = journal_path(dir.path(), "main");
        let appender = Appender::open(&path, false).unwrap();

        let mut tailer = Tailer::open_at_start(&path).unwrap();
        for i in 0..10u8 {
            appender.append(&[i, i, i]).unwrap();
        }
        for i in 0..10u8 {
            assert_eq!(tailer.read_next().unwrap(), Some(vec![i, i, i]));
        }
        assert_eq!(tailer.read_next().unwrap(), None);
    }

    #[test]
    fn test_open_at_end_skips_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = journal_path(dir.path(), "main");
        let appender = Appender::open(&path, false).unwrap();
        appender.append(b"old").unwrap();

        let mut tailer = Tailer::open_at_end(&path).unwrap();
        assert_eq!(tailer.read_next().unwrap(), None);

        appender.append(b"new").unwrap();
        assert_eq!(tailer.read_next().unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn test_partial_record_waits() {
        let dir = tempfile::tempdir().unwrap();
        let path = journal_path(dir.path(), "main");
        // Write a frame header promising more bytes than are present.
        std::fs::write(&path, 5u32.to_be_bytes()).unwrap();

        let mut tailer = Tailer::open_at_start(&path).unwrap();
        assert_eq!(tailer.read_next().unwrap(), None);
        assert_eq!(tailer.position(), 0);

        // Complete the record; it becomes readable without reopening.
        let mut frame = 5u32.to_be_bytes().to_vec();
        frame.extend_from_slice(b"hello");
        std::fs::write(&path, frame).unwrap();
        assert_eq!(tailer.read_next().unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn test_corrupt_length_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = journal_path(dir.path(), "main");
        std::fs::write(&path, u32::MAX.to_be_bytes()).unwrap();

        let mut tailer = Tailer::open_at_start(&path).unwrap();
        assert!(matches!(
            tailer.read_next(),
            Err(JournalError::Corrupt { position: 0 })
        ));
    }

    #[test]
    fn test_durable_append_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = journal_path(dir.path(), "main");
        {
            let appender = Appender::open(&path, true).unwrap();
            appender.append(b"kept").unwrap();
        }
        let mut tailer = Tailer::open_at_start(&path).unwrap();
        assert_eq!(tailer.read_next().unwrap(), Some(b"kept".to_vec()));
    }

    proptest! {
        #[test]
        fn prop_framing_roundtrip(records in proptest::collection::vec(
            proptest::collection::vec(any::<u8>(), 0..256),
            1..32,
        )) {
            let dir = tempfile::tempdir().unwrap();
            let path = journal_path(dir.path(), "prop");
            let appender = Appender::open(&path, false).unwrap();
            for record in &records {
                appender.append(record).unwrap();
            }

            let mut tailer = Tailer::open_at_start(&path).unwrap();
            for record in &records {
                prop_assert_eq!(tailer.read_next().unwrap(), Some(record.clone()));
            }
            prop_assert_eq!(tailer.read_next().unwrap(), None);
        }
    }
}
