//! Destinations for extracted records.
//!
//! [`RecordSink`] is the hand-off point to whatever indexes the records
//! (an embedding uploader, a search index). Only a JSON Lines file sink and
//! an in-memory sink ship here.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use sitecrawl_shared::{PageRecord, Result, SiteCrawlError};

/// Consumes [`PageRecord`]s one at a time.
pub trait RecordSink {
    /// Accept one record.
    fn write(&mut self, record: &PageRecord) -> Result<()>;

    /// Flush anything buffered. Called once after the last record.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl RecordSink for Vec<PageRecord> {
    fn write(&mut self, record: &PageRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

/// Writes one JSON object per line.
pub struct JsonlSink {
    path: PathBuf,
    writer: BufWriter<File>,
    written: usize,
}

impl JsonlSink {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| SiteCrawlError::io(&path, e))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written so far.
    pub fn written(&self) -> usize {
        self.written
    }
}

impl RecordSink for JsonlSink {
    fn write(&mut self, record: &PageRecord) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer
            .write_all(b"\n")
            .map_err(|e| SiteCrawlError::io(&self.path, e))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| SiteCrawlError::io(&self.path, e))?;
        info!(path = ?self.path, records = self.written, "records written");
        Ok(())
    }
}

/// Send every record to `sink`, then finish it. Returns the record count.
pub fn write_records<'a, S, I>(sink: &mut S, records: I) -> Result<usize>
where
    S: RecordSink + ?Sized,
    I: IntoIterator<Item = &'a PageRecord>,
{
    let mut count = 0;
    for record in records {
        sink.write(record)?;
        count += 1;
    }
    sink.finish()?;
    Ok(count)
}
