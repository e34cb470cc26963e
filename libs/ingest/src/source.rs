//! Multi-file record stream.
//!
//! A [`RecordSource`] presents an ordered group of CSV files as one
//! forward-only row stream. Only the first file carries a header row; it is
//! consumed when that file is opened in "first" mode and never re-derived
//! from later files. Exhausting one file signals end-of-file to the caller,
//! who decides whether to advance to the next pending file; that keeps the
//! open/stream/advance state machine in the ingestor where the transaction
//! lifecycle lives.

use std::collections::VecDeque;
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use csv::{Reader, ReaderBuilder, StringRecord};

/// One ordered file set, streamed a row at a time.
#[derive(Debug)]
pub struct RecordSource {
    pending: VecDeque<PathBuf>,
    current: Option<Reader<File>>,
    current_path: Option<PathBuf>,
    headers: Vec<String>,
    description: String,
}

impl RecordSource {
    /// Build a source over the given paths, in order.
    ///
    /// Every path is validated up front: a missing or non-regular file is
    /// fatal here, before any ingestion starts, not at the row where the
    /// file would first be opened.
    pub fn new<I, P>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut pending = VecDeque::new();
        for path in paths {
            let path: PathBuf = path.into();
            if !path.is_file() {
                bail!(
                    "input file {} does not exist or is not a regular file",
                    path.display()
                );
            }
            pending.push_back(path);
        }
        if pending.is_empty() {
            bail!("no input files given");
        }
        let description = pending
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Ok(Self {
            pending,
            current: None,
            current_path: None,
            headers: Vec::new(),
            description,
        })
    }

    /// Split a comma-separated path list and build a source from it.
    pub fn from_list(list: &str) -> Result<Self> {
        Self::new(list.split(','))
    }

    /// Close whatever is open and open the next pending file.
    ///
    /// When `first` is set the file's first row is read as headers and
    /// removed from the data stream; rows of every later file are all data.
    pub fn open_next(&mut self, first: bool) -> Result<()> {
        self.current = None;
        let path = self
            .pending
            .pop_front()
            .context("no pending input files")?;
        let mut reader = ReaderBuilder::new()
            .has_headers(first)
            .flexible(true)
            .from_path(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        if first {
            let headers = reader
                .headers()
                .with_context(|| format!("failed to read header row of {}", path.display()))?;
            self.headers = headers.iter().map(|h| h.to_string()).collect();
        }
        self.current_path = Some(path);
        self.current = Some(reader);
        Ok(())
    }

    /// Next data row of the currently open file, or `None` at end-of-file.
    ///
    /// End-of-file is not end-of-set; check [`pending_files`] and call
    /// [`open_next`] to continue with the next file.
    ///
    /// [`pending_files`]: RecordSource::pending_files
    /// [`open_next`]: RecordSource::open_next
    pub fn next_row(&mut self) -> Result<Option<StringRecord>> {
        let reader = match self.current.as_mut() {
            Some(reader) => reader,
            None => return Ok(None),
        };
        let path = self
            .current_path
            .as_deref()
            .unwrap_or_else(|| Path::new("?"));
        let mut row = StringRecord::new();
        let more = reader
            .read_record(&mut row)
            .with_context(|| format!("read error in {}", path.display()))?;
        if more {
            Ok(Some(row))
        } else {
            Ok(None)
        }
    }

    /// Close the currently open file, if any.
    pub fn close_current(&mut self) {
        self.current = None;
        self.current_path = None;
    }

    /// Whether a file is currently open for reading.
    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    /// Number of files not yet opened.
    pub fn pending_files(&self) -> usize {
        self.pending.len()
    }

    /// Header fields of the first file, in positional order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Path of the currently open file, for log context.
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// Display name of the currently open file, for log context.
    pub fn current_file(&self) -> String {
        self.current_path
            .as_deref()
            .unwrap_or_else(|| Path::new("?"))
            .display()
            .to_string()
    }

    /// Comma-joined list of every file in the set, for log context.
    pub fn description(&self) -> &str {
        &self.description
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{}", contents).unwrap();
        path
    }

    #[test]
    fn test_missing_file_is_fatal_at_construction() {
        let err = RecordSource::new(["/definitely/not/here.csv"]).unwrap_err();
        assert!(err.to_string().contains("not/here.csv"), "{}", err);
    }

    #[test]
    fn test_directory_is_not_a_regular_file() {
        let dir = TempDir::new().unwrap();
        assert!(RecordSource::new([dir.path().to_path_buf()]).is_err());
    }

    #[test]
    fn test_empty_path_list_is_fatal() {
        assert!(RecordSource::new(Vec::<PathBuf>::new()).is_err());
    }

    #[test]
    fn test_headers_come_from_first_file_only() {
        let dir = TempDir::new().unwrap();
        let first = write_file(&dir, "a.csv", "id,name\n1,Alice\n");
        let second = write_file(&dir, "b.csv", "2,Bob\n3,Carol\n");

        let mut source = RecordSource::new([first, second]).unwrap();
        source.open_next(true).unwrap();
        assert_eq!(source.headers(), &["id".to_string(), "name".to_string()]);

        let row = source.next_row().unwrap().unwrap();
        assert_eq!(row.get(0), Some("1"));
        assert_eq!(row.get(1), Some("Alice"));
        assert!(source.next_row().unwrap().is_none());

        source.close_current();
        assert_eq!(source.pending_files(), 1);
        source.open_next(false).unwrap();

        // Every row of the second file is data, including its first line.
        let row = source.next_row().unwrap().unwrap();
        assert_eq!(row.get(0), Some("2"));
        let row = source.next_row().unwrap().unwrap();
        assert_eq!(row.get(0), Some("3"));
        assert!(source.next_row().unwrap().is_none());
        assert_eq!(source.pending_files(), 0);
    }

    #[test]
    fn test_short_rows_surface_absent_fields() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "short.csv", "id,name,age\n1,Alice\n");

        let mut source = RecordSource::new([path]).unwrap();
        source.open_next(true).unwrap();
        let row = source.next_row().unwrap().unwrap();
        assert_eq!(row.get(0), Some("1"));
        assert_eq!(row.get(1), Some("Alice"));
        assert_eq!(row.get(2), None);
    }

    #[test]
    fn test_long_rows_are_tolerated() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "long.csv", "id,name\n1,Alice,extra,fields\n");

        let mut source = RecordSource::new([path]).unwrap();
        source.open_next(true).unwrap();
        let row = source.next_row().unwrap().unwrap();
        assert_eq!(row.get(0), Some("1"));
        assert_eq!(row.get(3), Some("fields"));
    }

    #[test]
    fn test_next_row_without_open_file_is_end_of_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.csv", "id\n1\n");
        let mut source = RecordSource::new([path]).unwrap();
        assert!(!source.is_open());
        assert!(source.next_row().unwrap().is_none());
    }

    #[test]
    fn test_open_next_with_nothing_pending_fails() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.csv", "id\n1\n");
        let mut source = RecordSource::new([path]).unwrap();
        source.open_next(true).unwrap();
        assert!(source.open_next(false).is_err());
    }

    #[test]
    fn test_from_list_splits_on_commas() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.csv", "id\n1\n");
        let b = write_file(&dir, "b.csv", "2\n");
        let list = format!("{},{}", a.display(), b.display());

        let source = RecordSource::from_list(&list).unwrap();
        assert_eq!(source.pending_files(), 2);
        assert!(source.description().contains("a.csv"));
        assert!(source.description().contains("b.csv"));
    }
}
