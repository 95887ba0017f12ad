use std::path::Path;

use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::cli::InventoryArgs;
use crate::fingerprint::{collapse_exact_duplicates, fingerprint_all};
use crate::model::{InventoryFile, InventoryManifest};
use crate::scan::discover_files;
use crate::util::{now_utc_string, write_json_pretty};

pub fn run(args: InventoryArgs) -> Result<()> {
    let acquired_dir = args.library.acquired_path();
    let manifest = build_manifest(&args.library.library_root, &acquired_dir, &args.extensions)?;

    if args.dry_run {
        info!(
            file_count = manifest.file_count,
            duplicates = manifest.duplicate_files.len(),
            unreadable = manifest.unreadable.len(),
            source = %manifest.source_directory,
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args
        .manifest_path
        .unwrap_or_else(|| args.library.catalog_dir().join("inventory.json"));

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote inventory manifest");
    info!(file_count = manifest.file_count, "inventory completed");

    Ok(())
}

/// Fingerprints the acquired set without touching the catalog.
pub fn build_manifest(
    library_root: &Path,
    acquired_dir: &Path,
    extensions: &[String],
) -> Result<InventoryManifest> {
    let paths = discover_files(acquired_dir, extensions)?;
    if paths.is_empty() {
        bail!("no matching files found in {}", acquired_dir.display());
    }

    let batch = fingerprint_all(library_root, &paths);
    let dedup = collapse_exact_duplicates(batch.files)?;

    for duplicate in &dedup.duplicates {
        warn!(
            path = %duplicate.relative_path,
            duplicate_of = %duplicate.duplicate_of,
            "exact duplicate file"
        );
    }

    let files: Vec<InventoryFile> = dedup
        .unique
        .into_iter()
        .map(|file| InventoryFile {
            relative_path: file.relative_path,
            size_bytes: file.size_bytes,
            sha256: file.hash,
        })
        .collect();

    Ok(InventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        source_directory: acquired_dir.display().to_string(),
        file_count: files.len(),
        files,
        duplicate_files: dedup.duplicates,
        unreadable: batch.failures,
    })
}
