//! Durable store: one record table per delimited text file.
//!
//! Saves use the write-to-temp-then-rename pattern:
//!
//! ```text
//! customers.csv.tmp  <- header + all rows, flushed, fsynced
//!        │ rename (atomic on one filesystem)
//!        ↓
//! customers.csv      <- readers only ever see the old or the new file
//! ```
//!
//! The target is never opened for writing, so a crash at any point before
//! the rename leaves the previous file intact.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::codec::{self, LogicalRow, RawLine};
use crate::error::{DecodeError, StoreError, StoreResult};
use crate::record::Record;
use crate::table::RecordTable;

use super::sibling_path;

/// A row that was dropped during load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// First physical line of the row, counting the header as line 1.
    pub line: usize,
    /// Why the row was dropped.
    pub error: DecodeError,
}

/// Result of a load: everything that decoded, plus what did not.
#[derive(Debug)]
pub struct LoadReport<R: Record> {
    /// Every row that decoded.
    pub table: RecordTable<R>,
    /// Rows that did not, in file order.
    pub skipped: Vec<SkippedRow>,
    /// Set if reading stopped early because of an I/O error. The table then
    /// holds only the rows before the failure.
    pub read_error: Option<std::io::Error>,
}

impl<R: Record> LoadReport<R> {
    fn empty() -> Self {
        Self {
            table: RecordTable::new(),
            skipped: Vec::new(),
            read_error: None,
        }
    }

    /// Returns true if every row in the file made it into the table.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.read_error.is_none()
    }
}

/// Loads a record file. A missing file is an empty table.
///
/// # Errors
/// [`StoreError::Io`] only if the file exists but cannot be opened.
/// Row-level problems end up in [`LoadReport::skipped`].
pub fn load<R: Record>(path: &Path) -> StoreResult<LoadReport<R>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LoadReport::empty()),
        Err(e) => return Err(StoreError::io(format!("opening {}", path.display()), e)),
    };

    let (lines, read_error) = read_raw_lines(BufReader::new(file));
    if let Some(e) = &read_error {
        warn!(path = %path.display(), error = %e, "read stopped early, keeping rows read so far");
    }

    let mut report = decode_rows::<R>(&codec::logical_rows(&lines));
    report.read_error = read_error;

    for skipped in &report.skipped {
        warn!(
            kind = R::kind().name,
            path = %path.display(),
            line = skipped.line,
            error = %skipped.error,
            "skipping unreadable row"
        );
    }
    debug!(kind = R::kind().name, rows = report.table.len(), "loaded table");
    Ok(report)
}

fn read_raw_lines(mut reader: impl BufRead) -> (Vec<RawLine>, Option<std::io::Error>) {
    let mut lines = Vec::new();
    let mut buf = Vec::new();
    let mut number = 0;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => return (lines, None),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return (lines, Some(e)),
        }
        number += 1;

        // A trailing '\r' stays: inside a quoted field it is data.
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        let mut bytes = buf.as_slice();
        if number == 1 {
            bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        }

        let text = std::str::from_utf8(bytes)
            .map(ToString::to_string)
            .map_err(|_| DecodeError::InvalidUtf8);
        lines.push(RawLine { number, text });
    }
}

fn is_header<R: Record>(row: &LogicalRow) -> bool {
    let identity = R::kind().schema.identity;
    row.text.as_ref().is_ok_and(|text| {
        text.split(',')
            .next()
            .is_some_and(|first| first.trim().trim_matches('"').eq_ignore_ascii_case(identity))
    })
}

fn decode_rows<R: Record>(rows: &[LogicalRow]) -> LoadReport<R> {
    let mut report = LoadReport::empty();

    let data = match rows.first() {
        Some(first) if is_header::<R>(first) => &rows[1..],
        _ => rows,
    };

    for row in data {
        let decoded = row
            .text
            .clone()
            .and_then(|text| codec::decode_line::<R>(&text));

        let result = decoded.and_then(|record| {
            let id = record.id();
            if report.table.contains(id) {
                return Err(DecodeError::DuplicateIdentity { id });
            }
            report
                .table
                .insert(record)
                .map_err(|_| DecodeError::DuplicateIdentity { id })
        });

        if let Err(error) = result {
            report.skipped.push(SkippedRow { line: row.number, error });
        }
    }

    report
}

/// Writes a table to a temp file and swaps it into place on commit.
///
/// Dropping a writer without committing removes the temp file.
#[derive(Debug)]
pub struct TableWriter {
    temp_path: Option<PathBuf>,
    final_path: PathBuf,
    writer: Option<BufWriter<File>>,
    sync_on_write: bool,
}

impl TableWriter {
    /// Opens (truncating) `<target>.tmp` next to `target`.
    ///
    /// # Errors
    /// [`StoreError::Io`] if the directory or temp file cannot be created.
    pub fn create(target: &Path, sync_on_write: bool) -> StoreResult<Self> {
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::io(format!("creating {}", parent.display()), e))?;
        }

        let temp_path = sibling_path(target, ".tmp");
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| StoreError::io(format!("creating {}", temp_path.display()), e))?;

        Ok(Self {
            temp_path: Some(temp_path),
            final_path: target.to_path_buf(),
            writer: Some(BufWriter::new(file)),
            sync_on_write,
        })
    }

    /// Path of the temp file.
    #[must_use]
    pub fn temp_path(&self) -> Option<&Path> {
        self.temp_path.as_deref()
    }

    /// Writes the header and every record, in identity order.
    ///
    /// # Errors
    /// [`StoreError::Encode`] or [`StoreError::Io`].
    pub fn write_table<R: Record>(&mut self, table: &RecordTable<R>) -> StoreResult<()> {
        self.write_line(&codec::header::<R>())?;
        for record in table.iter() {
            let line = codec::encode_line(record)?;
            self.write_line(&line)?;
        }
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> StoreResult<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| StoreError::encode("writer already consumed"))?;
        writer
            .write_all(line.as_bytes())
            .and_then(|()| writer.write_all(b"\n"))
            .map_err(|e| StoreError::io(format!("writing {}", self.final_path.display()), e))
    }

    /// Flushes, fsyncs and renames the temp file over the target.
    ///
    /// This is the commit point. After it returns successfully the new
    /// contents are what every subsequent reader sees.
    ///
    /// # Errors
    /// - [`StoreError::Io`] if flushing or syncing fails
    /// - [`StoreError::ReplaceFailed`] if the rename fails
    pub fn commit(mut self) -> StoreResult<()> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| StoreError::encode("writer already consumed"))?;
        let temp_path = self
            .temp_path
            .clone()
            .ok_or_else(|| StoreError::encode("temp path already consumed"))?;

        let file = writer.into_inner().map_err(|e| {
            StoreError::io(format!("flushing {}", temp_path.display()), e.into_error())
        })?;
        if self.sync_on_write {
            file.sync_all()
                .map_err(|e| StoreError::io(format!("syncing {}", temp_path.display()), e))?;
        }
        drop(file);

        fs::rename(&temp_path, &self.final_path).map_err(|source| StoreError::ReplaceFailed {
            path: self.final_path.clone(),
            source,
        })?;
        // The temp file is gone; nothing left for Drop to clean up.
        self.temp_path = None;

        if self.sync_on_write {
            sync_parent_dir(&self.final_path);
        }
        Ok(())
    }
}

impl Drop for TableWriter {
    fn drop(&mut self) {
        self.writer.take();
        if let Some(temp_path) = self.temp_path.take() {
            if let Err(e) = fs::remove_file(&temp_path) {
                if e.kind() != ErrorKind::NotFound {
                    warn!(path = %temp_path.display(), error = %e, "failed to remove temp file");
                }
            }
        }
    }
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = File::open(parent).and_then(|d| d.sync_all()) {
            debug!(path = %parent.display(), error = %e, "directory fsync failed");
        }
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}

/// Saves a table with the atomic replace protocol.
///
/// # Errors
/// - [`StoreError::Io`] for disk or permission failures
/// - [`StoreError::Encode`] for records that cannot be encoded
/// - [`StoreError::ReplaceFailed`] if the final rename fails
///
/// The target file is untouched in every error case.
pub fn save<R: Record>(path: &Path, table: &RecordTable<R>, sync_on_write: bool) -> StoreResult<()> {
    let mut writer = TableWriter::create(path, sync_on_write)?;
    writer.write_table(table)?;
    writer.commit()?;
    debug!(kind = R::kind().name, rows = table.len(), path = %path.display(), "saved table");
    Ok(())
}

/// One record file bound to one record kind.
#[derive(Debug, Clone)]
pub struct DurableStore<R: Record> {
    path: PathBuf,
    sync_on_write: bool,
    _kind: PhantomData<fn() -> R>,
}

impl<R: Record> DurableStore<R> {
    /// Binds a store to a file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, sync_on_write: bool) -> Self {
        Self {
            path: path.into(),
            sync_on_write,
            _kind: PhantomData,
        }
    }

    /// The record file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The temp file used during saves.
    #[must_use]
    pub fn temp_path(&self) -> PathBuf {
        sibling_path(&self.path, ".tmp")
    }

    /// Returns true if the record file exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// See [`load`].
    pub fn load(&self) -> StoreResult<LoadReport<R>> {
        load(&self.path)
    }

    /// See [`save`].
    pub fn save(&self, table: &RecordTable<R>) -> StoreResult<()> {
        save(&self.path, table, self.sync_on_write)
    }

    /// Starts a save that the caller commits explicitly.
    pub fn begin_write(&self) -> StoreResult<TableWriter> {
        TableWriter::create(&self.path, self.sync_on_write)
    }

    /// Removes a temp file left behind by an interrupted save. Returns true
    /// if one was found.
    pub fn remove_stale_temp(&self) -> StoreResult<bool> {
        let temp = self.temp_path();
        match fs::remove_file(&temp) {
            Ok(()) => {
                warn!(path = %temp.display(), "removed temp file from an interrupted save");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(format!("removing {}", temp.display()), e)),
        }
    }
}
