use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::CatalogStore;
use crate::cli::ValidateArgs;
use crate::fingerprint::fingerprint_all;
use crate::model::{CATALOG_VERSION, CatalogDocument};
use crate::util::{now_utc_string, read_json, write_json_pretty};

#[derive(Debug, Serialize, Deserialize)]
struct ValidationReport {
    manifest_version: u32,
    generated_at: String,
    status: String,
    catalog_path: String,
    entry_count: usize,
    checks: Vec<ValidationCheck>,
    issues: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ValidationCheck {
    check_id: String,
    name: String,
    result: String,
}

#[derive(Debug, Default)]
struct CheckOutcome {
    checks: Vec<ValidationCheck>,
    issues: Vec<String>,
}

impl CheckOutcome {
    fn record(&mut self, check_id: &str, name: &str, issues: Vec<String>) {
        let result = if issues.is_empty() { "pass" } else { "failed" };
        self.checks.push(ValidationCheck {
            check_id: check_id.to_string(),
            name: name.to_string(),
            result: result.to_string(),
        });
        self.issues.extend(issues);
    }

    fn failed(&self) -> usize {
        self.checks
            .iter()
            .filter(|check| check.result != "pass")
            .count()
    }
}

pub fn run(args: ValidateArgs) -> Result<()> {
    let catalog_path = args.library.catalog_file();
    let report_path = args
        .report_path
        .clone()
        .unwrap_or_else(|| args.library.reports_dir().join("validation_report.json"));

    if !catalog_path.exists() {
        bail!("catalog not found: {}", catalog_path.display());
    }
    let document: CatalogDocument = read_json(&catalog_path)?;
    let entry_count = document.items.len();

    let outcome = collect_checks(&args.library.library_root, document, args.verify_hashes);
    for issue in &outcome.issues {
        warn!(issue = %issue, "catalog violation");
    }

    let failed = outcome.failed();
    let report = ValidationReport {
        manifest_version: 1,
        generated_at: now_utc_string(),
        status: if failed == 0 { "passed" } else { "failed" }.to_string(),
        catalog_path: catalog_path.display().to_string(),
        entry_count,
        checks: outcome.checks,
        issues: outcome.issues,
    };
    write_json_pretty(&report_path, &report)?;
    info!(
        path = %report_path.display(),
        entries = entry_count,
        checks = report.checks.len(),
        failed,
        "wrote validation report"
    );

    if failed > 0 {
        bail!(
            "catalog validation failed: {failed} check(s), {} issue(s)",
            report.issues.len()
        );
    }

    Ok(())
}

fn collect_checks(
    library_root: &Path,
    document: CatalogDocument,
    verify_hashes: bool,
) -> CheckOutcome {
    let mut outcome = CheckOutcome::default();

    let version_issues = if document.catalog_version == CATALOG_VERSION {
        Vec::new()
    } else {
        vec![format!(
            "catalog version {} does not match supported version {}",
            document.catalog_version, CATALOG_VERSION
        )]
    };
    outcome.record("CAT-001", "catalog version supported", version_issues);

    let recorded_stats = document.stats.clone();
    let store = match CatalogStore::from_document(document) {
        Ok(store) => {
            outcome.record("CAT-002", "identity and duplicate-link invariants", Vec::new());
            store
        }
        Err(err) => {
            outcome.record(
                "CAT-002",
                "identity and duplicate-link invariants",
                vec![err.to_string()],
            );
            return outcome;
        }
    };

    let missing_files: Vec<String> = store
        .all()
        .filter(|entry| !library_root.join(&entry.relative_path).is_file())
        .map(|entry| format!("{}: file missing at {}", entry.id, entry.relative_path))
        .collect();
    outcome.record("CAT-003", "every entry resolves to a file", missing_files);

    let incomplete: Vec<String> = store
        .all()
        .filter(|entry| {
            entry.category.is_none() || entry.tier.is_none() || entry.summary.trim().is_empty()
        })
        .map(|entry| format!("{}: missing category, tier or summary", entry.id))
        .collect();
    outcome.record("CAT-004", "every entry is classified", incomplete);

    let stats_issues = if recorded_stats == store.stats() {
        Vec::new()
    } else {
        vec!["recorded stats do not match catalog contents".to_string()]
    };
    outcome.record("CAT-005", "stats match catalog contents", stats_issues);

    if verify_hashes {
        outcome.record(
            "CAT-006",
            "content hashes match files",
            hash_mismatches(library_root, &store),
        );
    }

    outcome
}

fn hash_mismatches(library_root: &Path, store: &CatalogStore) -> Vec<String> {
    let paths: Vec<PathBuf> = store
        .all()
        .map(|entry| library_root.join(&entry.relative_path))
        .filter(|path| path.is_file())
        .collect();
    let batch = fingerprint_all(library_root, &paths);

    let mut issues: Vec<String> = batch
        .failures
        .into_iter()
        .map(|failure| format!("{}: unreadable ({})", failure.relative_path, failure.reason))
        .collect();

    for file in batch.files {
        let expected = store
            .all()
            .find(|entry| entry.relative_path == file.relative_path);
        if let Some(entry) = expected
            && entry.content_hash != file.hash
        {
            issues.push(format!(
                "{}: content hash changed ({} on disk)",
                entry.id, file.hash
            ));
        }
    }

    issues
}
