use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{CatalogError, CatalogResult};
use crate::model::{DuplicateFile, ReadFailure};
use crate::util::relative_path_string;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFingerprint {
    pub relative_path: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub hash: String,
}

#[derive(Debug, Default)]
pub struct FingerprintBatch {
    pub files: Vec<FileFingerprint>,
    pub failures: Vec<ReadFailure>,
}

#[derive(Debug, Default)]
pub struct ExactDedup {
    pub unique: Vec<FileFingerprint>,
    pub duplicates: Vec<DuplicateFile>,
}

#[cfg(test)]
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Streams the file through SHA-256; returns the hex digest and byte count.
pub fn fingerprint_file(path: &Path) -> Result<(String, u64)> {
    let mut file = File::open(path)
        .with_context(|| format!("failed to open file for hashing: {}", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buf = [0_u8; 8192];
    let mut total = 0_u64;

    loop {
        let count = file
            .read(&mut buf)
            .with_context(|| format!("failed to read file for hashing: {}", path.display()))?;
        if count == 0 {
            break;
        }
        hasher.update(&buf[..count]);
        total += count as u64;
    }

    Ok((format!("{:x}", hasher.finalize()), total))
}

/// Hashes every path on the rayon pool. Unreadable files land in `failures`;
/// both lists come back sorted by relative path.
pub fn fingerprint_all(root: &Path, paths: &[PathBuf]) -> FingerprintBatch {
    let results: Vec<std::result::Result<FileFingerprint, ReadFailure>> = paths
        .par_iter()
        .map(|path| {
            let relative_path = relative_path_string(root, path).ok_or_else(|| ReadFailure {
                relative_path: path.display().to_string(),
                reason: format!("path is outside library root {}", root.display()),
            })?;

            match fingerprint_file(path) {
                Ok((hash, size_bytes)) => Ok(FileFingerprint {
                    relative_path,
                    path: path.clone(),
                    size_bytes,
                    hash,
                }),
                Err(err) => Err(ReadFailure {
                    relative_path,
                    reason: format!("{err:#}"),
                }),
            }
        })
        .collect();

    let mut batch = FingerprintBatch::default();
    for result in results {
        match result {
            Ok(fingerprint) => batch.files.push(fingerprint),
            Err(failure) => {
                warn!(
                    path = %failure.relative_path,
                    reason = %failure.reason,
                    "skipping unreadable file"
                );
                batch.failures.push(failure);
            }
        }
    }

    batch
        .files
        .sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    batch
        .failures
        .sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    debug!(
        hashed = batch.files.len(),
        failed = batch.failures.len(),
        "fingerprinting complete"
    );

    batch
}

/// Keeps the first file (by relative path) of every hash. Equal hashes with
/// different sizes mean the hash-space assumption is broken.
pub fn collapse_exact_duplicates(files: Vec<FileFingerprint>) -> CatalogResult<ExactDedup> {
    let mut first_by_hash: HashMap<String, usize> = HashMap::new();
    let mut dedup = ExactDedup::default();

    for file in files {
        if let Some(&kept_idx) = first_by_hash.get(&file.hash) {
            let kept = &dedup.unique[kept_idx];
            if kept.size_bytes != file.size_bytes {
                return Err(CatalogError::HashCollision {
                    hash: file.hash,
                    first: kept.relative_path.clone(),
                    first_size: kept.size_bytes,
                    second: file.relative_path,
                    second_size: file.size_bytes,
                });
            }
            dedup.duplicates.push(DuplicateFile {
                relative_path: file.relative_path,
                duplicate_of: kept.relative_path.clone(),
                sha256: file.hash,
            });
            continue;
        }

        first_by_hash.insert(file.hash.clone(), dedup.unique.len());
        dedup.unique.push(file);
    }

    Ok(dedup)
}
