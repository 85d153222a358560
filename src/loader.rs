use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::info;

use crate::error::{Error, Result};
use crate::record::Record;
use crate::sink::SinkFormat;
use crate::table::Table;

/// Read a finalized sink into a Table. A sink does not describe its own
/// encoding, so the caller names it. Any malformed input fails the whole load.
pub fn load(path: &Path, format: SinkFormat) -> Result<Table> {
    let file = File::open(path).map_err(Error::io("failed to open sink", path))?;
    let reader = BufReader::new(file);

    let records: Vec<Record> = match format {
        SinkFormat::LineDelimited => read_lines(path, reader)?,
        SinkFormat::SingleArray => serde_json::from_reader(reader).map_err(|source| Error::MalformedArray {
            path: path.to_path_buf(),
            source,
        })?,
    };

    info!("Loaded {} records from {:?}", records.len(), path);
    Ok(Table::from_records(records))
}

fn read_lines(path: &Path, reader: impl BufRead) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    // raw bytes, so invalid UTF-8 surfaces as a parse error on its line
    for (i, line) in reader.split(b'\n').enumerate() {
        let line = line.map_err(Error::io("failed to read sink", path))?;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let record = serde_json::from_slice(&line).map_err(|source| Error::MalformedLine {
            path: path.to_path_buf(),
            line: i + 1,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}
