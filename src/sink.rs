use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::record::Record;

/// On-disk encoding of a Sink, chosen once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkFormat {
    /// One JSON object per line.
    LineDelimited,
    /// One JSON array holding every Record.
    SingleArray,
}

impl SinkFormat {
    pub const ALL: [SinkFormat; 2] = [SinkFormat::LineDelimited, SinkFormat::SingleArray];

    pub fn extension(self) -> &'static str {
        match self {
            SinkFormat::LineDelimited => "jl",
            SinkFormat::SingleArray => "json",
        }
    }
}

pub enum SinkWriter {
    LineDelimited(LineDelimitedWriter),
    SingleArray(SingleArrayWriter),
}

impl SinkWriter {
    pub fn create(format: SinkFormat, path: &Path) -> Result<Self> {
        Ok(match format {
            SinkFormat::LineDelimited => SinkWriter::LineDelimited(LineDelimitedWriter::create(path)?),
            SinkFormat::SingleArray => SinkWriter::SingleArray(SingleArrayWriter::new(path)),
        })
    }

    pub fn format(&self) -> SinkFormat {
        match self {
            SinkWriter::LineDelimited(_) => SinkFormat::LineDelimited,
            SinkWriter::SingleArray(_) => SinkFormat::SingleArray,
        }
    }

    /// True when `emit` reaches disk immediately rather than buffering.
    pub fn is_streaming(&self) -> bool {
        matches!(self, SinkWriter::LineDelimited(_))
    }

    pub fn emit(&mut self, record: &Record) -> Result<()> {
        match self {
            SinkWriter::LineDelimited(w) => w.emit(record),
            SinkWriter::SingleArray(w) => {
                w.emit(record);
                Ok(())
            }
        }
    }

    /// Close the sink after the last Record. Returns the number written.
    pub fn finalize(self) -> Result<usize> {
        match self {
            SinkWriter::LineDelimited(w) => w.finalize(),
            SinkWriter::SingleArray(w) => w.finalize(),
        }
    }

    /// Give up after a fatal error. Lines already written stay valid; a
    /// buffered array is discarded and no sink file is produced.
    pub fn abandon(self) {
        match self {
            SinkWriter::LineDelimited(mut w) => {
                if let Err(e) = w.out.flush() {
                    warn!("Failed to flush {:?} on abort: {}", w.path, e);
                }
                warn!("Abandoned {:?} after {} lines", w.path, w.written);
            }
            SinkWriter::SingleArray(w) => {
                warn!(
                    "Abandoned {:?}: {} buffered records discarded, no sink written",
                    w.path,
                    w.records.len()
                );
            }
        }
    }
}

pub struct LineDelimitedWriter {
    path: PathBuf,
    out: BufWriter<File>,
    written: usize,
}

impl LineDelimitedWriter {
    /// Truncates any previous run's sink rather than appending to it, so each
    /// run's file holds exactly that run's Records. Lines are then appended
    /// and flushed one at a time.
    pub fn create(path: &Path) -> Result<Self> {
        ensure_parent(path)?;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(Error::io("failed to open sink", path))?;
        Ok(LineDelimitedWriter {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn emit(&mut self, record: &Record) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.out
            .write_all(&line)
            .and_then(|_| self.out.flush())
            .map_err(Error::io("failed to write sink", &self.path))?;
        self.written += 1;
        Ok(())
    }

    pub fn finalize(mut self) -> Result<usize> {
        self.out
            .flush()
            .and_then(|_| self.out.get_ref().sync_all())
            .map_err(Error::io("failed to close sink", &self.path))?;
        info!("Wrote {} lines to {:?}", self.written, self.path);
        Ok(self.written)
    }
}

pub struct SingleArrayWriter {
    path: PathBuf,
    records: Vec<Record>,
}

impl SingleArrayWriter {
    pub fn new(path: &Path) -> Self {
        SingleArrayWriter {
            path: path.to_path_buf(),
            records: Vec::new(),
        }
    }

    pub fn emit(&mut self, record: &Record) {
        self.records.push(record.clone());
    }

    /// Encode the whole array first, then write-and-rename so a reader never
    /// sees a partial array.
    pub fn finalize(self) -> Result<usize> {
        let bytes = serde_json::to_vec(&self.records)?;

        ensure_parent(&self.path)?;
        let tmp_path = tmp_path(&self.path);
        fs::write(&tmp_path, &bytes).map_err(Error::io("failed to write sink", &tmp_path))?;
        fs::rename(&tmp_path, &self.path).map_err(Error::io("failed to finalize sink", &self.path))?;

        info!(
            "Wrote array of {} records to {:?} ({} bytes)",
            self.records.len(),
            self.path,
            bytes.len()
        );
        Ok(self.records.len())
    }
}

pub(crate) fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).map_err(Error::io("failed to create directory", dir))
        }
        _ => Ok(()),
    }
}

pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
