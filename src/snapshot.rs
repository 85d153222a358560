//! Binary table snapshots.
//!
//! Layout: `[bincode payload][magic "QTB1"][u32 CRC32 BE]`, written to a temp
//! file and renamed into place.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::{Error, Result};
use crate::sink::{ensure_parent, tmp_path};
use crate::table::Table;

const SNAPSHOT_MAGIC: &[u8; 4] = b"QTB1";

/// Write `table` to `path`. Returns the number of bytes written.
pub fn save(table: &Table, path: &Path) -> Result<usize> {
    let payload = bincode::serialize(table).map_err(|e| Error::Snapshot {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let crc = crc32fast::hash(&payload);

    let mut output = Vec::with_capacity(payload.len() + 8);
    output.extend_from_slice(&payload);
    output.extend_from_slice(SNAPSHOT_MAGIC);
    output.extend_from_slice(&crc.to_be_bytes());

    ensure_parent(path)?;
    let tmp = tmp_path(path);
    fs::write(&tmp, &output).map_err(Error::io("failed to write snapshot", &tmp))?;
    fs::rename(&tmp, path).map_err(Error::io("failed to write snapshot", path))?;

    info!(
        "Saved snapshot {:?} ({} rows, {} bytes, CRC32={:#010x})",
        path,
        table.len(),
        output.len(),
        crc
    );
    Ok(output.len())
}

pub fn load(path: &Path) -> Result<Table> {
    let raw = fs::read(path).map_err(Error::io("failed to read snapshot", path))?;
    let corrupt = |reason: String| Error::Snapshot {
        path: path.to_path_buf(),
        reason,
    };

    if raw.len() < 8 || &raw[raw.len() - 8..raw.len() - 4] != SNAPSHOT_MAGIC {
        return Err(corrupt("missing snapshot footer".into()));
    }
    let payload = &raw[..raw.len() - 8];
    let mut stored = [0u8; 4];
    stored.copy_from_slice(&raw[raw.len() - 4..]);
    let stored = u32::from_be_bytes(stored);
    let computed = crc32fast::hash(payload);
    if stored != computed {
        return Err(corrupt(format!(
            "CRC32 mismatch: expected {:#010x}, got {:#010x}",
            stored, computed
        )));
    }

    bincode::deserialize(payload).map_err(|e| corrupt(e.to_string()))
}
