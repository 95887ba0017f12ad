use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::catalog::CatalogStore;
use crate::cli::StatusArgs;
use crate::model::{ExtractionManifest, PassReport};
use crate::util::read_json;

pub fn run(args: StatusArgs) -> Result<()> {
    let catalog_path = args.library.catalog_file();
    let reports_dir = args.library.reports_dir();
    let extraction_path = args.library.extraction_manifest(None);

    info!(library_root = %args.library.library_root.display(), "status requested");

    if catalog_path.exists() {
        let store = CatalogStore::load(&catalog_path)?;
        let stats = store.stats();

        info!(
            path = %catalog_path.display(),
            entries = stats.total_entries,
            total_size_mb = stats.total_size_mb,
            essential = stats.tiers.essential,
            standard = stats.tiers.standard,
            comprehensive = stats.tiers.comprehensive,
            low_relevance = stats.low_relevance,
            flagged = stats.flagged,
            duplicates = stats.duplicates,
            "loaded catalog"
        );
        for (category, count) in &stats.categories {
            info!(category = %category, count, "category");
        }
    } else {
        warn!(path = %catalog_path.display(), "catalog missing");
    }

    if extraction_path.exists() {
        let manifest: ExtractionManifest = read_json(&extraction_path)?;
        let with_pages = manifest
            .files
            .values()
            .filter(|file| file.pages.is_some())
            .count();
        info!(
            path = %extraction_path.display(),
            files = manifest.files.len(),
            with_pages,
            "loaded extraction manifest"
        );
    } else {
        warn!(path = %extraction_path.display(), "extraction manifest missing");
    }

    match latest_report(&reports_dir)? {
        Some(path) => {
            let report: PassReport = read_json(&path)?;
            info!(
                path = %path.display(),
                run_id = %report.run_id,
                status = %report.status,
                started_at = %report.started_at,
                updated_at = %report.updated_at,
                dry_run = report.dry_run,
                catalog_written = report.catalog_written,
                added = report.counts.added,
                relocated = report.counts.relocated,
                reclassified = report.counts.reclassified,
                linked = report.counts.linked,
                removed = report.counts.removed,
                unreadable = report.counts.unreadable,
                failure_reason = %report.failure_reason.unwrap_or_default(),
                "latest pass report"
            );
        }
        None => warn!(path = %reports_dir.display(), "no pass reports found"),
    }

    Ok(())
}

/// Report names embed a compact UTC timestamp, so the lexicographically
/// greatest is the newest.
fn latest_report(reports_dir: &Path) -> Result<Option<PathBuf>> {
    if !reports_dir.is_dir() {
        return Ok(None);
    }

    let mut latest: Option<PathBuf> = None;
    let entries = fs::read_dir(reports_dir)
        .with_context(|| format!("failed to read {}", reports_dir.display()))?;
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", reports_dir.display()))?;
        let path = entry.path();
        let is_report = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("reconcile_") && name.ends_with(".json"));
        if is_report && latest.as_ref().is_none_or(|current| path > *current) {
            latest = Some(path);
        }
    }

    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_report_wins() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "reconcile_20260101T000000Z.json",
            "reconcile_20260301T000000Z.json",
            "validation_report.json",
        ] {
            fs::write(dir.path().join(name), "{}").unwrap();
        }

        let latest = latest_report(dir.path()).unwrap().unwrap();
        assert!(latest.ends_with("reconcile_20260301T000000Z.json"));
        assert_eq!(latest_report(&dir.path().join("absent")).unwrap(), None);
    }
}
