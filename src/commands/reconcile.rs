use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::catalog::CatalogStore;
use crate::classify::ClassifierConfig;
use crate::cli::ReconcileArgs;
use crate::linker::LinkerConfig;
use crate::model::{AcquisitionManifest, ExtractionManifest, Overrides, PassReport, ReportPaths};
use crate::reconcile::{PassInputs, PassSummary, ReconcileConfig, Reconciler};
use crate::util::{now_utc_string, read_json_or_default, utc_compact_string, write_json_pretty};

const REPORT_VERSION: u32 = 1;

pub fn run(args: ReconcileArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("reconcile-{}", utc_compact_string(started_ts));

    let library = &args.library;
    let acquired_dir = library.acquired_path();
    let catalog_path = library.catalog_file();
    let report_path = args.report_path.clone().unwrap_or_else(|| {
        library
            .reports_dir()
            .join(format!("reconcile_{}.json", utc_compact_string(started_ts)))
    });

    info!(
        library_root = %library.library_root.display(),
        acquired_dir = %acquired_dir.display(),
        run_id = %run_id,
        dry_run = args.dry_run,
        "starting reconciliation"
    );

    let mut report = PassReport {
        manifest_version: REPORT_VERSION,
        run_id,
        status: "running".to_string(),
        started_at,
        updated_at: String::new(),
        dry_run: args.dry_run,
        catalog_written: false,
        failure_reason: None,
        paths: ReportPaths {
            library_root: library.library_root.display().to_string(),
            acquired_dir: acquired_dir.display().to_string(),
            catalog_path: catalog_path.display().to_string(),
        },
        counts: Default::default(),
        added_ids: Vec::new(),
        relocated_ids: Vec::new(),
        removed_ids: Vec::new(),
        flagged_ids: Vec::new(),
        links: Vec::new(),
        unreadable: Vec::new(),
        duplicate_files: Vec::new(),
    };

    match execute_pass(&args, &acquired_dir, &catalog_path) {
        Ok((summary, catalog_written)) => {
            report.status = "completed".to_string();
            report.catalog_written = catalog_written;
            fill_report(&mut report, summary);
            report.updated_at = now_utc_string();

            if args.dry_run {
                info!(
                    added = report.counts.added,
                    removed = report.counts.removed,
                    total = report.counts.total_entries,
                    "reconcile dry-run complete"
                );
                return Ok(());
            }

            write_json_pretty(&report_path, &report)?;
            info!(path = %report_path.display(), "wrote pass report");
            Ok(())
        }
        Err(err) => {
            report.status = "failed".to_string();
            report.failure_reason = Some(format!("{err:#}"));
            report.updated_at = now_utc_string();

            if !args.dry_run {
                if let Err(write_err) = write_json_pretty(&report_path, &report) {
                    warn!(error = %write_err, "failed to write failed pass report");
                } else {
                    warn!(path = %report_path.display(), "wrote failed pass report");
                }
            }
            Err(err)
        }
    }
}

fn execute_pass(
    args: &ReconcileArgs,
    acquired_dir: &Path,
    catalog_path: &Path,
) -> Result<(PassSummary, bool)> {
    let mut store = CatalogStore::load(catalog_path)?;
    if store.is_empty() {
        info!(path = %catalog_path.display(), "starting from an empty catalog");
    } else {
        info!(path = %catalog_path.display(), entries = store.len(), "loaded catalog");
    }

    let inputs = load_inputs(args)?;
    let reconciler = Reconciler::new(reconcile_config(args))?;
    let summary = reconciler
        .run(&mut store, &args.library.library_root, acquired_dir, &inputs)
        .context("reconciliation pass aborted; catalog left untouched")?;

    if args.dry_run {
        return Ok((summary, false));
    }

    let written = store.persist(catalog_path)?;
    if written {
        info!(path = %catalog_path.display(), entries = store.len(), "wrote catalog");
    } else {
        info!(path = %catalog_path.display(), "catalog unchanged");
    }

    Ok((summary, written))
}

fn load_inputs(args: &ReconcileArgs) -> Result<PassInputs> {
    let catalog_dir = args.library.catalog_dir();
    let acquisition_path = args
        .acquisition_manifest
        .clone()
        .unwrap_or_else(|| catalog_dir.join("download_manifest.json"));
    let extraction_path = args
        .library
        .extraction_manifest(args.extraction_manifest.as_ref());
    let overrides_path = args
        .overrides_path
        .clone()
        .unwrap_or_else(|| catalog_dir.join("overrides.json"));

    let acquisition: AcquisitionManifest =
        read_optional(&acquisition_path, "acquisition manifest")?;
    let extraction: ExtractionManifest = read_optional(&extraction_path, "extraction manifest")?;
    let overrides: Overrides = read_optional(&overrides_path, "overrides")?;

    info!(
        acquisition_records = acquisition.items.len(),
        extracted_files = extraction.files.len(),
        summary_overrides = overrides.summaries.len(),
        tier_overrides = overrides.tiers.len(),
        "loaded pass inputs"
    );

    Ok(PassInputs {
        acquisition,
        extraction,
        overrides,
    })
}

fn read_optional<T>(path: &Path, label: &str) -> Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    if !path.exists() {
        info!(path = %path.display(), "{label} not present");
    }
    read_json_or_default(path)
}

fn reconcile_config(args: &ReconcileArgs) -> ReconcileConfig {
    ReconcileConfig {
        linker: LinkerConfig {
            title_threshold: args.title_threshold,
            page_tolerance: args.page_tolerance,
            size_tolerance: args.size_tolerance,
        },
        classifier: ClassifierConfig {
            large_size_mb: args.large_size_mb,
            ..ClassifierConfig::default()
        },
        extensions: args.extensions.clone(),
        reclassify_all: args.reclassify_all,
    }
}

fn fill_report(report: &mut PassReport, summary: PassSummary) {
    report.counts = summary.counts;
    report.added_ids = summary.added_ids;
    report.relocated_ids = summary.relocated_ids;
    report.removed_ids = summary.removed_ids;
    report.flagged_ids = summary.flagged_ids;
    report.links = summary.links;
    report.unreadable = summary.unreadable;
    report.duplicate_files = summary.duplicate_files;
}
