use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use carerag_core::error::{Error, Result};

const MAGIC: &[u8; 8] = b"CRFLAT01";

/// Exact (brute-force) vector index: `len()` rows of `dim` floats stored
/// contiguously. Row `i` pairs with metadata record `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatIndex {
    dim: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dim: usize) -> Self {
        Self { dim, data: Vec::new() }
    }

    pub fn dim(&self) -> usize { self.dim }

    pub fn len(&self) -> usize {
        if self.dim == 0 { 0 } else { self.data.len() / self.dim }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn push(&mut self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dim {
            return Err(Error::Operation(format!(
                "vector has dimension {}, index expects {}",
                vector.len(),
                self.dim
            )));
        }
        self.data.extend_from_slice(vector);
        Ok(())
    }

    pub fn row(&self, i: usize) -> Option<&[f32]> {
        if i >= self.len() { return None; }
        Some(&self.data[i * self.dim..(i + 1) * self.dim])
    }

    /// Top `k` rows by inner product with `query`, best first.
    ///
    /// The sort is stable, so equal scores keep row order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        self.rank(query, k, |row| dot(row, query))
    }

    /// Like [`search`](Self::search) but divides by both norms, for rows that
    /// may not be normalized. Zero vectors score 0.
    pub fn search_cosine(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let qn = norm(query);
        self.rank(query, k, |row| {
            let denom = qn * norm(row);
            if denom > 0.0 { dot(row, query) / denom } else { 0.0 }
        })
    }

    fn rank(&self, query: &[f32], k: usize, score: impl Fn(&[f32]) -> f32) -> Vec<(usize, f32)> {
        if query.len() != self.dim || k == 0 {
            return Vec::new();
        }
        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dim)
            .map(&score)
            .enumerate()
            .filter(|(_, s)| !s.is_nan())
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        scored
    }

    /// Writes the index atomically (temp file in the target directory, then rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomically(path, |w| {
            w.write_all(MAGIC).map_err(|e| Error::io(path, e))?;
            bincode::serialize_into(w, self).map_err(|e| Error::Operation(format!("encoding {}: {e}", path.display())))
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(format!(
                "index file {} is missing; build the index first",
                path.display()
            )),
            _ => Error::io(path, e),
        })?;
        let mut reader = BufReader::new(file);
        let corrupt = |message: String| Error::CorruptIndex { path: path.to_path_buf(), message };

        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic).map_err(|_| corrupt("truncated header".into()))?;
        if &magic != MAGIC {
            return Err(corrupt("not a flat index file".into()));
        }
        let index: FlatIndex = bincode::deserialize_from(reader).map_err(|e| corrupt(e.to_string()))?;
        if index.dim == 0 {
            return Err(corrupt("dimension is 0".into()));
        }
        if index.data.len() % index.dim != 0 {
            return Err(corrupt(format!("{} floats do not divide into rows of {}", index.data.len(), index.dim)));
        }
        Ok(index)
    }
}

pub(crate) fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<()>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
    {
        let mut w = BufWriter::new(tmp.as_file_mut());
        write(&mut w)?;
        w.flush().map_err(|e| Error::io(path, e))?;
    }
    tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}
