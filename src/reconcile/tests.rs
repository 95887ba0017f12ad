use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::*;
use crate::model::{AcquisitionRecord, Category, ExtractedText, Tier};

const MB: u64 = 1024 * 1024;

struct Library {
    dir: TempDir,
}

impl Library {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("pdfs")).unwrap();
        Self { dir }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn acquired(&self) -> PathBuf {
        self.root().join("pdfs")
    }

    fn catalog_path(&self) -> PathBuf {
        self.root().join("catalog").join("catalog.json")
    }

    fn add(&self, name: &str, body: &str) {
        let path = self.acquired().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, body).unwrap();
    }

    fn add_sized(&self, name: &str, size_bytes: u64) {
        let file = fs::File::create(self.acquired().join(name)).unwrap();
        file.set_len(size_bytes).unwrap();
    }

    fn delete(&self, name: &str) {
        fs::remove_file(self.acquired().join(name)).unwrap();
    }

    fn pass(&self, store: &mut CatalogStore, inputs: &PassInputs) -> PassSummary {
        self.pass_with(store, inputs, ReconcileConfig::default())
    }

    fn pass_with(
        &self,
        store: &mut CatalogStore,
        inputs: &PassInputs,
        config: ReconcileConfig,
    ) -> PassSummary {
        Reconciler::new(config)
            .unwrap()
            .run(store, self.root(), &self.acquired(), inputs)
            .unwrap()
    }
}

fn id_for_path<'a>(store: &'a CatalogStore, relative_path: &str) -> &'a str {
    store
        .all()
        .find(|entry| entry.relative_path == relative_path)
        .map(|entry| entry.id.as_str())
        .unwrap()
}

fn fm21_inputs() -> PassInputs {
    let mut inputs = PassInputs::default();
    inputs.extraction.files.insert(
        "pdfs/Army_Survival_FM21-76.pdf".to_string(),
        ExtractedText {
            pages: Some(233),
            text: String::new(),
        },
    );
    inputs.extraction.files.insert(
        "pdfs/fm-21-76-scan2.pdf".to_string(),
        ExtractedText {
            pages: Some(231),
            text: String::new(),
        },
    );
    inputs
}

#[test]
fn second_pass_over_unchanged_files_is_byte_identical() {
    let library = Library::new();
    library.add("Where_There_Is_No_Doctor.pdf", "doctor");
    library.add("Home Canning Basics.pdf", "canning");
    library.add("nested/Map Reading and Land Navigation.pdf", "maps");

    let mut store = CatalogStore::new();
    let first = library.pass(&mut store, &PassInputs::default());
    assert_eq!(first.counts.added, 3);
    assert!(store.persist(&library.catalog_path()).unwrap());
    let written = fs::read(library.catalog_path()).unwrap();

    let mut reloaded = CatalogStore::load(&library.catalog_path()).unwrap();
    let second = library.pass(&mut reloaded, &PassInputs::default());
    assert_eq!(second.counts.added, 0);
    assert_eq!(second.counts.reclassified, 0);
    assert_eq!(second.counts.unchanged, 3);
    assert!(!reloaded.persist(&library.catalog_path()).unwrap());
    assert_eq!(fs::read(library.catalog_path()).unwrap(), written);
}

#[test]
fn identical_bytes_collapse_to_one_entry() {
    let library = Library::new();
    library.add("survival-guide.pdf", "same bytes");
    library.add("copies/survival-guide-copy.pdf", "same bytes");

    let mut store = CatalogStore::new();
    let summary = library.pass(&mut store, &PassInputs::default());

    assert_eq!(store.len(), 1);
    assert_eq!(summary.duplicate_files.len(), 1);
    assert_eq!(
        summary.duplicate_files[0].relative_path,
        "pdfs/survival-guide.pdf"
    );
    assert_eq!(
        summary.duplicate_files[0].duplicate_of,
        "pdfs/copies/survival-guide-copy.pdf"
    );

    // the cataloged copy keeps its place on later passes
    library.pass(&mut store, &PassInputs::default());
    let entry = store.all().next().unwrap();
    assert_eq!(entry.relative_path, "pdfs/copies/survival-guide-copy.pdf");
}

#[test]
fn rescanned_field_manual_links_to_the_longer_rendition() {
    let library = Library::new();
    library.add("Army_Survival_FM21-76.pdf", "army survival original");
    library.add("fm-21-76-scan2.pdf", "army survival rescan");

    let mut store = CatalogStore::new();
    let summary = library.pass(&mut store, &fm21_inputs());

    let canonical = id_for_path(&store, "pdfs/Army_Survival_FM21-76.pdf").to_string();
    let alias = id_for_path(&store, "pdfs/fm-21-76-scan2.pdf").to_string();
    assert_eq!(summary.counts.linked, 1);
    assert_eq!(
        store.get(&alias).unwrap().content_duplicate_of.as_deref(),
        Some(canonical.as_str())
    );
    assert_eq!(store.get(&canonical).unwrap().content_duplicate_of, None);
    assert_eq!(store.get(&canonical).unwrap().pages, Some(233));
    assert_eq!(store.get(&canonical).unwrap().category, Some(Category::Military));
    assert_eq!(store.get(&canonical).unwrap().tier, Some(Tier::Essential));
}

#[test]
fn deleting_the_canonical_removes_it_and_clears_references() {
    let library = Library::new();
    library.add("Army_Survival_FM21-76.pdf", "army survival original");
    library.add("fm-21-76-scan2.pdf", "army survival rescan");

    let mut store = CatalogStore::new();
    library.pass(&mut store, &fm21_inputs());
    let canonical = id_for_path(&store, "pdfs/Army_Survival_FM21-76.pdf").to_string();
    let alias = id_for_path(&store, "pdfs/fm-21-76-scan2.pdf").to_string();

    library.delete("Army_Survival_FM21-76.pdf");
    let summary = library.pass(&mut store, &fm21_inputs());

    assert_eq!(summary.removed_ids, vec![canonical.clone()]);
    assert_eq!(summary.counts.unlinked, 1);
    assert!(store.get(&canonical).is_none());
    assert!(store.is_retired(&canonical));
    assert_eq!(store.get(&alias).unwrap().content_duplicate_of, None);
    store.check_integrity().unwrap();

    for entry in store.all() {
        assert!(library.root().join(&entry.relative_path).is_file());
    }
}

#[test]
fn readded_title_gets_a_fresh_id() {
    let library = Library::new();
    library.add("Field Guide.pdf", "first edition");

    let mut store = CatalogStore::new();
    library.pass(&mut store, &PassInputs::default());
    assert!(store.contains_id("field-guide"));

    library.delete("Field Guide.pdf");
    library.add("Field Guide.pdf", "second edition");
    library.pass(&mut store, &PassInputs::default());

    assert!(store.is_retired("field-guide"));
    assert!(store.contains_id("field-guide-2"));
    assert_eq!(store.len(), 1);
}

#[test]
fn large_report_without_urgency_is_comprehensive() {
    let library = Library::new();
    library.add_sized("EMP Satellite Damage Assessment Report.pdf", 40 * MB);

    let mut store = CatalogStore::new();
    library.pass(&mut store, &PassInputs::default());

    let entry = store.all().next().unwrap();
    assert_eq!(entry.title, "EMP Satellite Damage Assessment Report");
    assert_eq!(entry.tier, Some(Tier::Comprehensive));
    assert_eq!(entry.size_mb, 40.0);
    assert!(entry.summary.contains("comprehensive"));
}

#[test]
fn every_entry_is_fully_classified_after_a_pass() {
    let library = Library::new();
    library.add("Quarterly Ledger.pdf", "ledger");
    library.add("Wilderness Medicine.pdf", "medicine");
    library.add("The Truth About Chemtrails.pdf", "chemtrails");

    let mut store = CatalogStore::new();
    let summary = library.pass(&mut store, &PassInputs::default());

    for entry in store.all() {
        assert!(entry.category.is_some());
        assert!(entry.tier.is_some());
        assert!(!entry.summary.is_empty());
    }
    // no extracted text for any of them
    assert_eq!(summary.counts.flagged, 3);
}

#[test]
fn manual_summaries_survive_later_passes() {
    let library = Library::new();
    library.add("Home Canning Basics.pdf", "canning");

    let mut store = CatalogStore::new();
    library.pass(&mut store, &PassInputs::default());
    let id = store.all().next().unwrap().id.clone();

    let mut inputs = PassInputs::default();
    inputs
        .overrides
        .summaries
        .insert(id.clone(), "Water bath and pressure canning.".to_string());
    let summary = library.pass(&mut store, &inputs);
    assert_eq!(summary.counts.overrides_applied, 1);

    let config = ReconcileConfig {
        reclassify_all: true,
        ..ReconcileConfig::default()
    };
    library.pass_with(&mut store, &PassInputs::default(), config);

    let entry = store.get(&id).unwrap();
    assert_eq!(entry.summary, "Water bath and pressure canning.");
    assert_eq!(entry.summary_origin, Origin::Manual);
}

#[test]
fn tier_override_rewrites_the_automatic_summary() {
    let library = Library::new();
    library.add_sized("EMP Satellite Damage Assessment Report.pdf", 40 * MB);

    let mut store = CatalogStore::new();
    library.pass(&mut store, &PassInputs::default());
    let id = store.all().next().unwrap().id.clone();

    let mut inputs = PassInputs::default();
    inputs.overrides.tiers.insert(id.clone(), Tier::Essential);
    library.pass(&mut store, &inputs);

    let entry = store.get(&id).unwrap();
    assert_eq!(entry.tier, Some(Tier::Essential));
    assert_eq!(entry.tier_origin, Origin::Manual);
    assert!(entry.summary.contains("essential"));

    let again = library.pass(&mut store, &inputs);
    assert_eq!(again.counts.overrides_applied, 0);
    assert_eq!(again.counts.unchanged, 1);
}

#[test]
fn moved_files_keep_their_entry() {
    let library = Library::new();
    library.add("Knots Checklist.pdf", "knots");

    let mut store = CatalogStore::new();
    library.pass(&mut store, &PassInputs::default());
    let id = store.all().next().unwrap().id.clone();

    fs::create_dir_all(library.acquired().join("reference")).unwrap();
    fs::rename(
        library.acquired().join("Knots Checklist.pdf"),
        library.acquired().join("reference").join("Knots Checklist.pdf"),
    )
    .unwrap();

    let summary = library.pass(&mut store, &PassInputs::default());
    assert_eq!(summary.relocated_ids, vec![id.clone()]);
    assert!(summary.removed_ids.is_empty());
    assert_eq!(
        store.get(&id).unwrap().relative_path,
        "pdfs/reference/Knots Checklist.pdf"
    );
}

#[test]
fn acquisition_manifest_supplies_title_and_provenance() {
    let library = Library::new();
    library.add("nwss.pdf", "nuclear war survival skills");

    let mut inputs = PassInputs::default();
    inputs.acquisition.items.push(AcquisitionRecord {
        filename: "nwss.pdf".to_string(),
        title: "Nuclear War Survival Skills".to_string(),
        source: Some("ORNL".to_string()),
        original_url: Some("https://example.org/nwss.pdf".to_string()),
        sha256: None,
    });

    let mut store = CatalogStore::new();
    library.pass(&mut store, &inputs);

    let entry = store.get("nuclear-war-survival-skills").unwrap();
    assert_eq!(entry.source.as_deref(), Some("ORNL"));
    assert_eq!(entry.category, Some(Category::NuclearCbrn));
    assert_eq!(entry.tier, Some(Tier::Essential));
}

#[test]
fn new_extraction_text_refreshes_the_summary_once() {
    let library = Library::new();
    library.add("Army_Survival_FM21-76.pdf", "army survival original");

    let mut store = CatalogStore::new();
    library.pass(&mut store, &PassInputs::default());
    let id = store.all().next().unwrap().id.clone();
    assert!(store.get(&id).unwrap().is_flagged());

    let mut inputs = PassInputs::default();
    inputs.extraction.files.insert(
        "pdfs/Army_Survival_FM21-76.pdf".to_string(),
        ExtractedText {
            pages: Some(233),
            text: "Department of the Army field manual covering water, fire and shelter."
                .to_string(),
        },
    );
    let refreshed = library.pass(&mut store, &inputs);
    assert_eq!(refreshed.counts.reclassified, 1);
    let entry = store.get(&id).unwrap();
    assert_eq!(entry.pages, Some(233));
    assert!(entry.summary.contains("233 pages"));
    assert!(!entry.is_flagged());

    let settled = library.pass(&mut store, &inputs);
    assert_eq!(settled.counts.reclassified, 0);
    assert_eq!(settled.counts.unchanged, 1);
}

#[test]
fn files_outside_the_extension_filter_are_ignored() {
    let library = Library::new();
    library.add("notes.txt", "notes");
    library.add("partial.pdf.part", "partial");
    library.add(".hidden.pdf", "hidden");
    library.add("Compass Use.PDF", "compass");

    let mut store = CatalogStore::new();
    let summary = library.pass(&mut store, &PassInputs::default());
    assert_eq!(summary.counts.files_scanned, 1);
    assert_eq!(store.len(), 1);
}

fn batch_with_unreadable(library: &Library, relative_path: &str) -> FingerprintBatch {
    let paths = discover_files(&library.acquired(), &["pdf".to_string()]).unwrap();
    let mut batch = fingerprint_all(library.root(), &paths);
    batch.files.retain(|file| file.relative_path != relative_path);
    batch.failures.push(ReadFailure {
        relative_path: relative_path.to_string(),
        reason: "Permission denied (os error 13)".to_string(),
    });
    batch
}

#[test]
fn unreadable_file_keeps_its_entry_until_a_later_pass() {
    let library = Library::new();
    library.add("Field Hygiene and Sanitation.pdf", "hygiene");
    library.add("Knots and Lashings.pdf", "knots");

    let mut store = CatalogStore::new();
    library.pass(&mut store, &PassInputs::default());
    let id = id_for_path(&store, "pdfs/Field Hygiene and Sanitation.pdf").to_string();
    store
        .apply_summary_override(&id, "Hand-written notes on camp hygiene.")
        .unwrap();

    let batch = batch_with_unreadable(&library, "pdfs/Field Hygiene and Sanitation.pdf");
    let summary = Reconciler::new(ReconcileConfig::default())
        .unwrap()
        .reconcile_batch(&mut store, library.root(), batch, &PassInputs::default())
        .unwrap();

    assert_eq!(summary.counts.unreadable, 1);
    assert_eq!(
        summary.unreadable[0].relative_path,
        "pdfs/Field Hygiene and Sanitation.pdf"
    );
    assert!(summary.removed_ids.is_empty());
    assert!(store.contains_id(&id));
    assert!(!store.is_retired(&id));

    let next = library.pass(&mut store, &PassInputs::default());
    assert_eq!(next.counts.added, 0);
    assert_eq!(next.counts.removed, 0);
    assert_eq!(
        store.get(&id).unwrap().summary,
        "Hand-written notes on camp hygiene."
    );
}

#[test]
fn rewritten_file_replaces_its_old_entry() {
    let library = Library::new();
    library.add("Water Purification.pdf", "first edition");

    let mut store = CatalogStore::new();
    library.pass(&mut store, &PassInputs::default());
    let old_id = id_for_path(&store, "pdfs/Water Purification.pdf").to_string();

    library.add("Water Purification.pdf", "second edition, revised");
    let summary = library.pass(&mut store, &PassInputs::default());

    assert_eq!(summary.removed_ids, vec![old_id.clone()]);
    assert_eq!(summary.counts.added, 1);
    assert_eq!(store.len(), 1);
    assert_ne!(id_for_path(&store, "pdfs/Water Purification.pdf"), old_id);
}

#[test]
fn hash_collision_with_cataloged_entry_aborts_and_keeps_the_store() {
    let library = Library::new();
    library.add("Ham Radio Primer.pdf", "radio primer");

    let mut store = CatalogStore::new();
    library.pass(&mut store, &PassInputs::default());
    let id = id_for_path(&store, "pdfs/Ham Radio Primer.pdf").to_string();
    store
        .update(&id, |entry| entry.size_bytes = 999_999)
        .unwrap();
    let before = store.render().unwrap();

    let err = Reconciler::new(ReconcileConfig::default())
        .unwrap()
        .run(
            &mut store,
            library.root(),
            &library.acquired(),
            &PassInputs::default(),
        )
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<CatalogError>(),
        Some(CatalogError::HashCollision {
            first_size: 999_999,
            second_size: 12,
            ..
        })
    ));
    assert_eq!(store.render().unwrap(), before);
    assert_eq!(store.get(&id).unwrap().size_bytes, 999_999);
}
