//! The catalog store: every entry keyed by id, kept in insertion order, with
//! a content-hash index for O(1) duplicate lookup.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::error::{CatalogError, CatalogResult};
use crate::model::{
    CATALOG_VERSION, CatalogDocument, CatalogEntry, CatalogStats, Category, Origin, Relevance,
    Tier, TierCounts,
};
use crate::text::slugify;
use crate::util::{read_json, size_mb, to_json_bytes, write_atomic};


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Merged,
    Unchanged,
}

#[derive(Debug, Clone, Default)]
pub struct CatalogStore {
    entries: Vec<CatalogEntry>,
    by_id: HashMap<String, usize>,
    by_hash: HashMap<String, usize>,
    retired: BTreeSet<String>,
    reserved: HashSet<String>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A missing file is an empty catalog; anything unparsable or internally
    /// inconsistent is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "catalog missing, starting empty");
            return Ok(Self::new());
        }

        let document: CatalogDocument = read_json(path)?;
        let store = Self::from_document(document)
            .with_context(|| format!("catalog failed integrity checks: {}", path.display()))?;
        Ok(store)
    }

    pub fn from_document(document: CatalogDocument) -> CatalogResult<Self> {
        let mut store = Self {
            retired: document.retired_ids.into_iter().collect(),
            ..Self::default()
        };

        for entry in document.items {
            if let Some(&idx) = store.by_id.get(&entry.id) {
                return Err(CatalogError::DuplicateId {
                    id: entry.id,
                    first_hash: store.entries[idx].content_hash.clone(),
                    second_hash: entry.content_hash,
                });
            }
            store.insert_new(entry)?;
        }

        store.check_integrity()?;
        Ok(store)
    }

    pub fn to_document(&self) -> CatalogDocument {
        CatalogDocument {
            catalog_version: CATALOG_VERSION,
            stats: self.stats(),
            retired_ids: self.retired.iter().cloned().collect(),
            items: self.entries.clone(),
        }
    }

    pub fn render(&self) -> Result<Vec<u8>> {
        to_json_bytes(&self.to_document())
    }

    /// Atomically replaces the catalog file. Returns false when the bytes on
    /// disk already match and nothing was written.
    pub fn persist(&self, path: &Path) -> Result<bool> {
        let data = self.render()?;
        if path.exists() {
            let current =
                fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
            if current == data {
                return Ok(false);
            }
        }
        write_atomic(path, &data)?;
        Ok(true)
    }

    pub fn all(&self) -> impl Iterator<Item = &CatalogEntry> + '_ {
        self.entries.iter()
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.by_id.get(id).map(|&idx| &self.entries[idx])
    }

    pub fn find_by_hash(&self, hash: &str) -> Option<&CatalogEntry> {
        self.by_hash.get(hash).map(|&idx| &self.entries[idx])
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn is_retired(&self, id: &str) -> bool {
        self.retired.contains(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fresh id for `title`, never one that is live, retired or already
    /// handed out in this session.
    pub fn allocate_id(&mut self, title: &str) -> String {
        let base = match slugify(title) {
            slug if slug.is_empty() => "entry".to_string(),
            slug => slug,
        };

        let mut candidate = base.clone();
        let mut suffix = 2_u32;
        while self.contains_id(&candidate)
            || self.is_retired(&candidate)
            || self.reserved.contains(&candidate)
        {
            candidate = format!("{base}-{suffix}");
            suffix += 1;
        }

        self.reserved.insert(candidate.clone());
        candidate
    }

    pub fn upsert(&mut self, entry: CatalogEntry) -> CatalogResult<UpsertOutcome> {
        let Some(&idx) = self.by_id.get(&entry.id) else {
            if self.retired.contains(&entry.id) {
                return Err(CatalogError::IdReused { id: entry.id });
            }
            self.insert_new(entry)?;
            return Ok(UpsertOutcome::Inserted);
        };

        let existing = &mut self.entries[idx];
        if existing.content_hash != entry.content_hash {
            return Err(CatalogError::DuplicateId {
                id: entry.id,
                first_hash: existing.content_hash.clone(),
                second_hash: entry.content_hash,
            });
        }

        let before = existing.clone();
        merge_entry(existing, entry);
        if *existing == before {
            Ok(UpsertOutcome::Unchanged)
        } else {
            Ok(UpsertOutcome::Merged)
        }
    }

    /// Mutates one entry in place. Id and content hash are part of the index
    /// and must not change.
    pub fn update<F>(&mut self, id: &str, apply: F) -> CatalogResult<bool>
    where
        F: FnOnce(&mut CatalogEntry),
    {
        let idx = *self
            .by_id
            .get(id)
            .ok_or_else(|| CatalogError::NotFound { id: id.to_string() })?;

        let entry = &mut self.entries[idx];
        let before = entry.clone();
        apply(entry);

        let field = if entry.id != before.id {
            Some("id")
        } else if entry.content_hash != before.content_hash {
            Some("content hash")
        } else {
            None
        };
        if let Some(field) = field {
            *entry = before;
            return Err(CatalogError::ImmutableField {
                id: id.to_string(),
                field,
            });
        }

        Ok(*entry != before)
    }

    pub fn apply_summary_override(&mut self, id: &str, summary: &str) -> CatalogResult<bool> {
        let summary = summary.trim().to_string();
        self.update(id, |entry| {
            entry.summary = summary;
            entry.summary_origin = Origin::Manual;
        })
    }

    pub fn apply_tier_override(&mut self, id: &str, tier: Tier) -> CatalogResult<bool> {
        self.update(id, |entry| {
            entry.tier = Some(tier);
            entry.tier_origin = Origin::Manual;
        })
    }

    /// Ids of entries whose `contentDuplicateOf` is `id`.
    pub fn referrers(&self, id: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| entry.content_duplicate_of.as_deref() == Some(id))
            .map(|entry| entry.id.clone())
            .collect()
    }

    /// Re-points references to `id` at `id`'s own canonical target, or clears
    /// them when there is none. Returns the ids that were touched.
    pub fn detach_references(&mut self, id: &str) -> Vec<String> {
        let target = self
            .get(id)
            .and_then(|entry| entry.content_duplicate_of.clone())
            .filter(|target| target != id && self.contains_id(target));
        let target_hash = target
            .as_deref()
            .and_then(|target| self.get(target))
            .map(|entry| entry.content_hash.clone());

        let mut touched = Vec::new();
        for entry in &mut self.entries {
            if entry.content_duplicate_of.as_deref() != Some(id) {
                continue;
            }
            let repoint = match (&target, &target_hash) {
                (Some(target), Some(hash))
                    if *target != entry.id && *hash != entry.content_hash =>
                {
                    Some(target.clone())
                }
                _ => None,
            };
            entry.content_duplicate_of = repoint;
            touched.push(entry.id.clone());
        }
        touched
    }

    /// Removes and retires `id`. Refused while other entries still name it
    /// as their canonical.
    pub fn remove(&mut self, id: &str) -> CatalogResult<CatalogEntry> {
        let idx = *self
            .by_id
            .get(id)
            .ok_or_else(|| CatalogError::NotFound { id: id.to_string() })?;

        let referrers = self.referrers(id);
        if !referrers.is_empty() {
            return Err(CatalogError::StillReferenced {
                id: id.to_string(),
                referrers,
            });
        }

        let removed = self.entries.remove(idx);
        self.rebuild_indexes();
        self.retired.insert(removed.id.clone());
        Ok(removed)
    }

    /// Every persisted invariant except on-disk file existence.
    pub fn check_integrity(&self) -> CatalogResult<()> {
        let mut seen_hashes: HashMap<&str, &str> = HashMap::new();
        for entry in &self.entries {
            if let Some(first_id) = seen_hashes.insert(&entry.content_hash, &entry.id) {
                return Err(CatalogError::DuplicateHash {
                    hash: entry.content_hash.clone(),
                    first_id: first_id.to_string(),
                    second_id: entry.id.clone(),
                });
            }
            if self.retired.contains(&entry.id) {
                return Err(CatalogError::IdReused {
                    id: entry.id.clone(),
                });
            }
        }

        for entry in &self.entries {
            let Some(target_id) = entry.content_duplicate_of.as_deref() else {
                continue;
            };
            if target_id == entry.id {
                return Err(CatalogError::SelfDuplicate {
                    id: entry.id.clone(),
                });
            }
            let target = self.get(target_id).ok_or_else(|| CatalogError::DanglingDuplicate {
                id: entry.id.clone(),
                target: target_id.to_string(),
            })?;
            if let Some(next) = target.content_duplicate_of.as_deref() {
                return Err(CatalogError::DuplicateChain {
                    id: entry.id.clone(),
                    target: target_id.to_string(),
                    next: next.to_string(),
                });
            }
            if target.content_hash == entry.content_hash {
                return Err(CatalogError::DuplicateSameHash {
                    id: entry.id.clone(),
                    target: target_id.to_string(),
                    hash: entry.content_hash.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn stats(&self) -> CatalogStats {
        let mut stats = CatalogStats {
            total_entries: self.entries.len(),
            categories: Category::ALL.iter().map(|category| (*category, 0)).collect(),
            tiers: TierCounts::default(),
            ..CatalogStats::default()
        };

        for entry in &self.entries {
            stats.total_size_bytes += entry.size_bytes;
            if let Some(category) = entry.category {
                *stats.categories.entry(category).or_insert(0) += 1;
            }
            match entry.tier {
                Some(Tier::Essential) => stats.tiers.essential += 1,
                Some(Tier::Standard) => stats.tiers.standard += 1,
                Some(Tier::Comprehensive) => stats.tiers.comprehensive += 1,
                None => {}
            }
            if entry.relevance == Relevance::Low {
                stats.low_relevance += 1;
            }
            if entry.is_flagged() {
                stats.flagged += 1;
            }
            if entry.content_duplicate_of.is_some() {
                stats.duplicates += 1;
            }
        }
        stats.total_size_mb = size_mb(stats.total_size_bytes);

        stats
    }

    fn insert_new(&mut self, entry: CatalogEntry) -> CatalogResult<()> {
        if let Some(&idx) = self.by_hash.get(&entry.content_hash) {
            return Err(CatalogError::DuplicateHash {
                hash: entry.content_hash,
                first_id: self.entries[idx].id.clone(),
                second_id: entry.id,
            });
        }

        let idx = self.entries.len();
        self.by_id.insert(entry.id.clone(), idx);
        self.by_hash.insert(entry.content_hash.clone(), idx);
        self.reserved.remove(&entry.id);
        self.entries.push(entry);
        Ok(())
    }

    fn rebuild_indexes(&mut self) {
        self.by_id.clear();
        self.by_hash.clear();
        for (idx, entry) in self.entries.iter().enumerate() {
            self.by_id.insert(entry.id.clone(), idx);
            self.by_hash.insert(entry.content_hash.clone(), idx);
        }
    }
}

/// Incoming derived data wins; provenance is write-once and manual
/// summaries/tiers are never replaced by automatic ones.
fn merge_entry(existing: &mut CatalogEntry, incoming: CatalogEntry) {
    let CatalogEntry {
        id: _,
        title,
        filename,
        relative_path,
        category,
        tier,
        relevance,
        summary,
        summary_origin,
        tier_origin,
        pages,
        size_bytes,
        size_mb,
        content_hash: _,
        content_duplicate_of,
        source,
        original_url,
        stale,
        review_flags,
    } = incoming;

    existing.title = title;
    existing.filename = filename;
    existing.relative_path = relative_path;
    if category.is_some() {
        existing.category = category;
    }
    existing.relevance = relevance;
    existing.pages = pages;
    existing.size_bytes = size_bytes;
    existing.size_mb = size_mb;
    existing.content_duplicate_of = content_duplicate_of;
    existing.stale = stale;
    existing.review_flags = review_flags;

    let keep_manual_summary = existing.summary_origin == Origin::Manual
        && summary_origin == Origin::Auto
        && !existing.summary.trim().is_empty();
    if !keep_manual_summary && !summary.trim().is_empty() {
        existing.summary = summary;
        existing.summary_origin = summary_origin;
    }

    let keep_manual_tier = existing.tier_origin == Origin::Manual
        && tier_origin == Origin::Auto
        && existing.tier.is_some();
    if !keep_manual_tier && tier.is_some() {
        existing.tier = tier;
        existing.tier_origin = tier_origin;
    }

    if existing.source.is_none() {
        existing.source = source;
    }
    if existing.original_url.is_none() {
        existing.original_url = original_url;
    }
}
