//! Exact-content duplicate detection.
//!
//! The index lives for a single run. The first path seen with a given digest
//! is the original; every later path with the same digest is a duplicate.

use crate::error::{OrganizeError, OrganizeResult};
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Whole-file BLAKE3 digest, read in a streaming fashion.
pub fn content_digest(path: &Path) -> OrganizeResult<blake3::Hash> {
    let mut file = File::open(path).map_err(|e| OrganizeError::fs(path, e))?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut file, &mut hasher).map_err(|e| OrganizeError::fs(path, e))?;
    Ok(hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    First,
    Duplicate { original: PathBuf },
}

/// Digest to first-seen path.
#[derive(Debug, Default)]
pub struct HashIndex {
    seen: Mutex<HashMap<blake3::Hash, PathBuf>>,
}

impl HashIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hashes `path` and records it.
    pub fn observe(&self, path: &Path) -> OrganizeResult<Observation> {
        let digest = content_digest(path)?;
        Ok(self.observe_digest(digest, path))
    }

    /// Records a digest that was computed ahead of time.
    pub fn observe_digest(&self, digest: blake3::Hash, path: &Path) -> Observation {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        match seen.get(&digest) {
            Some(original) => Observation::Duplicate {
                original: original.clone(),
            },
            None => {
                seen.insert(digest, path.to_path_buf());
                Observation::First
            }
        }
    }

    pub fn len(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_first_then_duplicate() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        let c = dir.path().join("c.txt");
        fs::write(&a, "same bytes").unwrap();
        fs::write(&b, "same bytes").unwrap();
        fs::write(&c, "other bytes").unwrap();

        let index = HashIndex::new();
        assert_eq!(index.observe(&a).unwrap(), Observation::First);
        assert_eq!(
            index.observe(&b).unwrap(),
            Observation::Duplicate { original: a.clone() }
        );
        assert_eq!(index.observe(&c).unwrap(), Observation::First);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_duplicates_never_replace_the_original() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.bin");
        fs::write(&a, [1u8, 2, 3]).unwrap();
        let digest = content_digest(&a).unwrap();

        let index = HashIndex::new();
        index.observe_digest(digest, &a);
        for other in ["b.bin", "c.bin"] {
            assert_eq!(
                index.observe_digest(digest, &dir.path().join(other)),
                Observation::Duplicate { original: a.clone() }
            );
        }
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_digest_matches_one_shot_hash() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.dat");
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &data).unwrap();

        assert_eq!(content_digest(&path).unwrap(), blake3::hash(&data));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let index = HashIndex::new();
        assert!(index.observe(&dir.path().join("nope")).is_err());
        assert!(index.is_empty());
    }
}
