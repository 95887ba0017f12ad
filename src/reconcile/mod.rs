//! One reconciliation pass: scan, fingerprint, link, classify, merge, prune.
//!
//! The pass works on a copy of the store and only swaps it in once every
//! integrity check has passed, so a failed pass leaves the caller's catalog
//! exactly as it was.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::catalog::CatalogStore;
use crate::classify::{Classifier, ClassifierConfig, useful_text};
use crate::error::CatalogError;
use crate::fingerprint::{
    FileFingerprint, FingerprintBatch, collapse_exact_duplicates, fingerprint_all,
};
use crate::linker::{DuplicateLink, LinkPlan, LinkerConfig, NearDuplicateLinker};
use crate::model::{
    AcquisitionManifest, AcquisitionRecord, CatalogEntry, DuplicateFile, ExtractionManifest,
    Origin, Overrides, PassCounts, ReadFailure, Relevance, ReviewFlag,
};
use crate::scan::discover_files;
use crate::text::title_from_filename;
use crate::util::size_mb;

#[cfg(test)]
mod tests;

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub linker: LinkerConfig,
    pub classifier: ClassifierConfig,
    pub extensions: Vec<String>,
    pub reclassify_all: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            linker: LinkerConfig::default(),
            classifier: ClassifierConfig::default(),
            extensions: vec!["pdf".to_string()],
            reclassify_all: false,
        }
    }
}

/// Optional side inputs read by the command layer before the pass starts.
#[derive(Debug, Clone, Default)]
pub struct PassInputs {
    pub acquisition: AcquisitionManifest,
    pub extraction: ExtractionManifest,
    pub overrides: Overrides,
}

#[derive(Debug, Clone, Default)]
pub struct PassSummary {
    pub counts: PassCounts,
    pub added_ids: Vec<String>,
    pub relocated_ids: Vec<String>,
    pub removed_ids: Vec<String>,
    pub flagged_ids: Vec<String>,
    pub links: Vec<DuplicateLink>,
    pub unreadable: Vec<ReadFailure>,
    pub duplicate_files: Vec<DuplicateFile>,
}

pub struct Reconciler {
    config: ReconcileConfig,
    linker: NearDuplicateLinker,
    classifier: Classifier,
}

impl Reconciler {
    pub fn new(config: ReconcileConfig) -> Result<Self> {
        Ok(Self {
            linker: NearDuplicateLinker::new(config.linker)?,
            classifier: Classifier::new(config.classifier)?,
            config,
        })
    }

    /// Brings `store` in line with the files under `acquired_dir`. Paths in
    /// the catalog are relative to `library_root`.
    pub fn run(
        &self,
        store: &mut CatalogStore,
        library_root: &Path,
        acquired_dir: &Path,
        inputs: &PassInputs,
    ) -> Result<PassSummary> {
        let paths = discover_files(acquired_dir, &self.config.extensions)?;
        let batch = fingerprint_all(library_root, &paths);
        self.reconcile_batch(store, library_root, batch, inputs)
    }

    /// Everything after hashing. `batch` holds one result per scanned file.
    fn reconcile_batch(
        &self,
        store: &mut CatalogStore,
        library_root: &Path,
        batch: FingerprintBatch,
        inputs: &PassInputs,
    ) -> Result<PassSummary> {
        let mut working = store.clone();
        let mut summary = PassSummary::default();
        summary.counts.files_scanned = batch.files.len() + batch.failures.len();

        let hashed_paths: HashSet<String> = batch
            .files
            .iter()
            .map(|file| file.relative_path.clone())
            .collect();
        let unreadable_paths: HashSet<String> = batch
            .failures
            .iter()
            .map(|failure| failure.relative_path.clone())
            .collect();
        summary.unreadable = batch.failures;

        let unique = self.collapse_on_disk_duplicates(&working, batch.files, &mut summary)?;

        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut fresh: Vec<FileFingerprint> = Vec::new();
        for file in unique {
            let known = working
                .find_by_hash(&file.hash)
                .map(|entry| (entry.id.clone(), entry.relative_path.clone(), entry.size_bytes));
            match known {
                Some((id, cataloged_path, cataloged_size)) => {
                    if cataloged_size != file.size_bytes {
                        return Err(CatalogError::HashCollision {
                            hash: file.hash,
                            first: cataloged_path,
                            first_size: cataloged_size,
                            second: file.relative_path,
                            second_size: file.size_bytes,
                        }
                        .into());
                    }
                    let relocated =
                        refresh_known_entry(&mut working, &id, &file, &inputs.extraction)?;
                    if relocated {
                        summary.relocated_ids.push(id.clone());
                    }
                    seen_ids.insert(id);
                }
                None => fresh.push(file),
            }
        }

        // An unseen entry is only gone when its file is absent or now holds
        // other content. Unreadable files keep their entry until a later pass.
        let mut gone_ids: Vec<String> = Vec::new();
        let mut present_ids = seen_ids.clone();
        for entry in working.all().filter(|entry| !seen_ids.contains(&entry.id)) {
            let replaced = hashed_paths.contains(&entry.relative_path);
            let absent = !library_root.join(&entry.relative_path).is_file();
            if !unreadable_paths.contains(&entry.relative_path) && (replaced || absent) {
                gone_ids.push(entry.id.clone());
            } else {
                warn!(
                    id = %entry.id,
                    path = %entry.relative_path,
                    "keeping entry whose file was not read"
                );
                present_ids.insert(entry.id.clone());
            }
        }

        let acquisition = AcquisitionIndex::new(&inputs.acquisition);
        let mut new_entries: Vec<CatalogEntry> = fresh
            .iter()
            .map(|file| build_entry(&mut working, file, &acquisition, &inputs.extraction))
            .collect();

        let plan = self.linker.plan(
            working
                .all()
                .filter(|entry| present_ids.contains(&entry.id))
                .chain(new_entries.iter()),
        );
        if !plan.is_empty() {
            debug!(links = plan.links.len(), "near-duplicate plan");
        }
        self.apply_links(&mut working, &present_ids, &mut new_entries, &plan, &mut summary)?;
        summary.links = plan.links;

        for entry in &mut new_entries {
            let extracted = inputs.extraction.files.get(&entry.relative_path);
            self.classifier.apply(entry, extracted);
        }
        self.classify_existing(&mut working, &seen_ids, &inputs.extraction, &mut summary)?;

        for entry in new_entries {
            summary.added_ids.push(entry.id.clone());
            working.upsert(entry)?;
        }
        let retiered = apply_overrides(&mut working, &inputs.overrides, &mut summary)?;
        self.refresh_auto_summaries(&mut working, &retiered, &inputs.extraction)?;

        for id in gone_ids {
            let detached = working.detach_references(&id);
            if !detached.is_empty() {
                debug!(id = %id, referrers = ?detached, "detached duplicate references");
            }
            let removed = working.remove(&id)?;
            info!(
                id = %removed.id,
                path = %removed.relative_path,
                "removed entry with missing file"
            );
            summary.removed_ids.push(removed.id);
        }

        working.check_integrity()?;

        summary.counts.added = summary.added_ids.len();
        summary.counts.relocated = summary.relocated_ids.len();
        summary.counts.removed = summary.removed_ids.len();
        summary.counts.unreadable = summary.unreadable.len();
        summary.counts.duplicate_files = summary.duplicate_files.len();
        summary.counts.unchanged = seen_ids
            .iter()
            .filter(|id| store.get(id) == working.get(id))
            .count();
        summary.flagged_ids = working
            .all()
            .filter(|entry| entry.is_flagged())
            .map(|entry| entry.id.clone())
            .collect();
        summary.counts.flagged = summary.flagged_ids.len();
        summary.counts.total_entries = working.len();

        info!(
            scanned = summary.counts.files_scanned,
            added = summary.counts.added,
            relocated = summary.counts.relocated,
            reclassified = summary.counts.reclassified,
            linked = summary.counts.linked,
            unlinked = summary.counts.unlinked,
            removed = summary.counts.removed,
            unchanged = summary.counts.unchanged,
            flagged = summary.counts.flagged,
            total = summary.counts.total_entries,
            "reconciliation pass complete"
        );

        *store = working;
        Ok(summary)
    }

    /// Exact on-disk copies are reported, not cataloged. For a hash the
    /// catalog already knows, the copy at the cataloged path is the one kept.
    fn collapse_on_disk_duplicates(
        &self,
        store: &CatalogStore,
        mut files: Vec<FileFingerprint>,
        summary: &mut PassSummary,
    ) -> Result<Vec<FileFingerprint>> {
        files.sort_by_cached_key(|file| {
            let at_cataloged_path = store
                .find_by_hash(&file.hash)
                .is_some_and(|entry| entry.relative_path == file.relative_path);
            (!at_cataloged_path, file.relative_path.clone())
        });

        let mut dedup = collapse_exact_duplicates(files)?;
        for duplicate in &dedup.duplicates {
            warn!(
                path = %duplicate.relative_path,
                duplicate_of = %duplicate.duplicate_of,
                "skipping exact duplicate file"
            );
        }

        dedup
            .unique
            .sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        dedup
            .duplicates
            .sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        summary.duplicate_files = dedup.duplicates;
        Ok(dedup.unique)
    }

    fn apply_links(
        &self,
        store: &mut CatalogStore,
        present_ids: &HashSet<String>,
        new_entries: &mut [CatalogEntry],
        plan: &LinkPlan,
        summary: &mut PassSummary,
    ) -> Result<()> {
        let existing: Vec<String> = store
            .all()
            .filter(|entry| present_ids.contains(&entry.id))
            .map(|entry| entry.id.clone())
            .collect();

        for id in existing {
            let target = plan.target_of(&id).map(str::to_string);
            let mut previous = None;
            let changed = store.update(&id, |entry| {
                previous = entry.content_duplicate_of.clone();
                entry.content_duplicate_of = target.clone();
            })?;
            if !changed {
                continue;
            }
            match &target {
                Some(canonical) => {
                    info!(alias = %id, canonical = %canonical, "linked near-duplicate");
                    summary.counts.linked += 1;
                }
                None => {
                    info!(alias = %id, previous = ?previous, "unlinked near-duplicate");
                    summary.counts.unlinked += 1;
                }
            }
        }

        for entry in new_entries.iter_mut() {
            entry.content_duplicate_of = plan.target_of(&entry.id).map(str::to_string);
            if let Some(canonical) = &entry.content_duplicate_of {
                info!(alias = %entry.id, canonical = %canonical, "linked near-duplicate");
                summary.counts.linked += 1;
            }
        }

        Ok(())
    }

    fn classify_existing(
        &self,
        store: &mut CatalogStore,
        seen_ids: &HashSet<String>,
        extraction: &ExtractionManifest,
        summary: &mut PassSummary,
    ) -> Result<()> {
        let pending: Vec<(String, String)> = store
            .all()
            .filter(|entry| seen_ids.contains(&entry.id))
            .filter(|entry| self.config.reclassify_all || entry.needs_classification())
            .map(|entry| (entry.id.clone(), entry.relative_path.clone()))
            .collect();

        for (id, relative_path) in pending {
            let extracted = extraction.files.get(&relative_path);
            let mut reclassified = false;
            store.update(&id, |entry| {
                reclassified = self.classifier.apply(entry, extracted);
            })?;
            if reclassified {
                debug!(id = %id, "reclassified entry");
                summary.counts.reclassified += 1;
            }
        }

        Ok(())
    }

    /// Automatic summaries mention the tier, so they are rebuilt when an
    /// override moved it.
    fn refresh_auto_summaries(
        &self,
        store: &mut CatalogStore,
        ids: &[String],
        extraction: &ExtractionManifest,
    ) -> Result<()> {
        for id in ids {
            let Some(entry) = store.get(id) else {
                continue;
            };
            if entry.summary_origin == Origin::Manual {
                continue;
            }
            let extracted = extraction.files.get(&entry.relative_path);
            store.update(id, |entry| {
                self.classifier.apply(entry, extracted);
            })?;
        }
        Ok(())
    }
}

/// Refreshes size, pages and location of an entry whose content was found
/// on disk. Returns true when the entry moved.
fn refresh_known_entry(
    store: &mut CatalogStore,
    id: &str,
    file: &FileFingerprint,
    extraction: &ExtractionManifest,
) -> Result<bool> {
    let extracted = extraction.files.get(&file.relative_path);
    let mut relocated = false;

    store.update(id, |entry| {
        if entry.relative_path != file.relative_path {
            info!(
                id = %entry.id,
                from = %entry.relative_path,
                to = %file.relative_path,
                "relocated entry"
            );
            entry.relative_path = file.relative_path.clone();
            entry.filename = file_name_of(&file.relative_path);
            relocated = true;
        }

        entry.size_bytes = file.size_bytes;
        entry.size_mb = size_mb(file.size_bytes);

        if let Some(pages) = extracted.and_then(|value| value.pages)
            && entry.pages != Some(pages)
        {
            entry.pages = Some(pages);
            entry.stale = true;
        }
        if entry.review_flags.contains(&ReviewFlag::MissingText)
            && useful_text(extracted).is_some()
        {
            entry.stale = true;
        }
    })?;

    Ok(relocated)
}

fn build_entry(
    store: &mut CatalogStore,
    file: &FileFingerprint,
    acquisition: &AcquisitionIndex<'_>,
    extraction: &ExtractionManifest,
) -> CatalogEntry {
    let filename = file_name_of(&file.relative_path);
    let record = acquisition.lookup(&file.hash, &filename);
    let title = record
        .map(|record| record.title.trim())
        .filter(|title| !title.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| title_from_filename(&filename));
    let id = store.allocate_id(&title);
    let pages = extraction
        .files
        .get(&file.relative_path)
        .and_then(|value| value.pages);

    debug!(id = %id, path = %file.relative_path, "new entry");

    CatalogEntry {
        id,
        title,
        filename,
        relative_path: file.relative_path.clone(),
        category: None,
        tier: None,
        relevance: Relevance::High,
        summary: String::new(),
        summary_origin: Origin::Auto,
        tier_origin: Origin::Auto,
        pages,
        size_bytes: file.size_bytes,
        size_mb: size_mb(file.size_bytes),
        content_hash: file.hash.clone(),
        content_duplicate_of: None,
        source: record.and_then(|record| record.source.clone()),
        original_url: record.and_then(|record| record.original_url.clone()),
        stale: false,
        review_flags: Vec::new(),
    }
}

/// Applies hand-authored summaries and tiers. Returns the ids whose tier
/// changed.
fn apply_overrides(
    store: &mut CatalogStore,
    overrides: &Overrides,
    summary: &mut PassSummary,
) -> Result<Vec<String>> {
    let mut retiered = Vec::new();

    for (id, text) in &overrides.summaries {
        if text.trim().is_empty() {
            continue;
        }
        if !store.contains_id(id) {
            warn!(id = %id, "summary override for unknown entry");
            continue;
        }
        if store.apply_summary_override(id, text)? {
            debug!(id = %id, "applied summary override");
            summary.counts.overrides_applied += 1;
        }
    }

    for (id, tier) in &overrides.tiers {
        if !store.contains_id(id) {
            warn!(id = %id, "tier override for unknown entry");
            continue;
        }
        if store.apply_tier_override(id, *tier)? {
            debug!(id = %id, tier = %tier, "applied tier override");
            summary.counts.overrides_applied += 1;
            retiered.push(id.clone());
        }
    }

    Ok(retiered)
}

fn file_name_of(relative_path: &str) -> String {
    relative_path
        .rsplit('/')
        .next()
        .unwrap_or(relative_path)
        .to_string()
}

/// Acquisition records by checksum first, file name second.
struct AcquisitionIndex<'a> {
    by_hash: HashMap<String, &'a AcquisitionRecord>,
    by_filename: HashMap<&'a str, &'a AcquisitionRecord>,
}

impl<'a> AcquisitionIndex<'a> {
    fn new(manifest: &'a AcquisitionManifest) -> Self {
        let mut by_hash = HashMap::new();
        let mut by_filename = HashMap::new();
        for record in &manifest.items {
            if let Some(sha256) = record.sha256.as_deref().filter(|value| !value.is_empty()) {
                by_hash.entry(sha256.to_lowercase()).or_insert(record);
            }
            by_filename.entry(record.filename.as_str()).or_insert(record);
        }
        Self {
            by_hash,
            by_filename,
        }
    }

    fn lookup(&self, hash: &str, filename: &str) -> Option<&'a AcquisitionRecord> {
        self.by_hash
            .get(hash)
            .or_else(|| self.by_filename.get(filename))
            .copied()
    }
}
