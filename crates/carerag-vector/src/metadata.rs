//! Ordered chunk records persisted beside the flat index as a JSON array of
//! `{file_path, chunk_text}` objects.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use carerag_core::error::{Error, Result};
use carerag_core::types::ChunkRecord;

use crate::flat::write_atomically;

pub fn save_records(records: &[ChunkRecord], path: &Path) -> Result<()> {
    write_atomically(path, |w| {
        serde_json::to_writer_pretty(w, records)
            .map_err(|e| Error::Operation(format!("writing {}: {e}", path.display())))
    })
}

pub fn load_records(path: &Path) -> Result<Vec<ChunkRecord>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(format!(
            "metadata file {} is missing; build the index first",
            path.display()
        )),
        _ => Error::io(path, e),
    })?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| Error::CorruptIndex { path: path.to_path_buf(), message: e.to_string() })
}
