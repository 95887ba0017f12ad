use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::linker::DuplicateLink;

pub const CATALOG_VERSION: u32 = 1;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Medicine,
    NuclearCbrn,
    Survival,
    WaterSanitation,
    Preparedness,
    Navigation,
    Military,
    FoodAgriculture,
    ShelterConstruction,
    DiyRepair,
    Reference,
    Education,
}

impl Category {
    pub const ALL: [Category; 12] = [
        Self::Medicine,
        Self::NuclearCbrn,
        Self::Survival,
        Self::WaterSanitation,
        Self::Preparedness,
        Self::Navigation,
        Self::Military,
        Self::FoodAgriculture,
        Self::ShelterConstruction,
        Self::DiyRepair,
        Self::Reference,
        Self::Education,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Medicine => "medicine",
            Self::NuclearCbrn => "nuclear-cbrn",
            Self::Survival => "survival",
            Self::WaterSanitation => "water-sanitation",
            Self::Preparedness => "preparedness",
            Self::Navigation => "navigation",
            Self::Military => "military",
            Self::FoodAgriculture => "food-agriculture",
            Self::ShelterConstruction => "shelter-construction",
            Self::DiyRepair => "diy-repair",
            Self::Reference => "reference",
            Self::Education => "education",
        }
    }

    /// Phrase used inside generated summaries.
    pub fn topic_phrase(self) -> &'static str {
        match self {
            Self::Medicine => "medical and first aid",
            Self::NuclearCbrn => "nuclear/CBRN preparedness",
            Self::Survival => "survival",
            Self::WaterSanitation => "water and sanitation",
            Self::Preparedness => "emergency preparedness",
            Self::Navigation => "navigation and communication",
            Self::Military => "military field operations",
            Self::FoodAgriculture => "food procurement and preservation",
            Self::ShelterConstruction => "shelter construction",
            Self::DiyRepair => "DIY construction and repair",
            Self::Reference => "quick reference",
            Self::Education => "general education",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Essential,
    Standard,
    Comprehensive,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Essential => "essential",
            Self::Standard => "standard",
            Self::Comprehensive => "comprehensive",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relevance {
    #[default]
    High,
    Low,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    #[default]
    Auto,
    Manual,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewFlag {
    Unclassified,
    ExcludedContent,
    MissingText,
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: String,
    pub title: String,
    pub filename: String,
    pub relative_path: String,
    pub category: Option<Category>,
    pub tier: Option<Tier>,
    #[serde(default)]
    pub relevance: Relevance,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub summary_origin: Origin,
    #[serde(default)]
    pub tier_origin: Origin,
    #[serde(default)]
    pub pages: Option<u32>,
    pub size_bytes: u64,
    pub size_mb: f64,
    pub content_hash: String,
    #[serde(default)]
    pub content_duplicate_of: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub original_url: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub stale: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub review_flags: Vec<ReviewFlag>,
}

impl CatalogEntry {
    pub fn needs_classification(&self) -> bool {
        self.stale || self.category.is_none() || self.tier.is_none()
    }

    pub fn is_flagged(&self) -> bool {
        !self.review_flags.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierCounts {
    pub essential: usize,
    pub standard: usize,
    pub comprehensive: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub total_entries: usize,
    pub total_size_bytes: u64,
    pub total_size_mb: f64,
    pub categories: BTreeMap<Category, usize>,
    pub tiers: TierCounts,
    pub low_relevance: usize,
    pub flagged: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDocument {
    pub catalog_version: u32,
    #[serde(default)]
    pub stats: CatalogStats,
    #[serde(default)]
    pub retired_ids: Vec<String>,
    #[serde(default)]
    pub items: Vec<CatalogEntry>,
}

/// Written by the acquisition layer; only the fields the catalog needs are read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AcquisitionManifest {
    #[serde(default)]
    pub items: Vec<AcquisitionRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AcquisitionRecord {
    pub filename: String,
    pub title: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub original_url: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionManifest {
    #[serde(default)]
    pub manifest_version: u32,
    #[serde(default)]
    pub files: BTreeMap<String, ExtractedText>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedText {
    #[serde(default)]
    pub pages: Option<u32>,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Overrides {
    #[serde(default)]
    pub summaries: BTreeMap<String, String>,
    #[serde(default)]
    pub tiers: BTreeMap<String, Tier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadFailure {
    pub relative_path: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateFile {
    pub relative_path: String,
    pub duplicate_of: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryFile {
    pub relative_path: String,
    pub size_bytes: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source_directory: String,
    pub file_count: usize,
    pub files: Vec<InventoryFile>,
    pub duplicate_files: Vec<DuplicateFile>,
    pub unreadable: Vec<ReadFailure>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassCounts {
    pub files_scanned: usize,
    pub added: usize,
    pub relocated: usize,
    pub reclassified: usize,
    pub linked: usize,
    pub unlinked: usize,
    pub removed: usize,
    pub unchanged: usize,
    pub flagged: usize,
    pub overrides_applied: usize,
    pub unreadable: usize,
    pub duplicate_files: usize,
    pub total_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPaths {
    pub library_root: String,
    pub acquired_dir: String,
    pub catalog_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassReport {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub dry_run: bool,
    pub catalog_written: bool,
    pub failure_reason: Option<String>,
    pub paths: ReportPaths,
    pub counts: PassCounts,
    pub added_ids: Vec<String>,
    pub relocated_ids: Vec<String>,
    pub removed_ids: Vec<String>,
    pub flagged_ids: Vec<String>,
    pub links: Vec<DuplicateLink>,
    pub unreadable: Vec<ReadFailure>,
    pub duplicate_files: Vec<DuplicateFile>,
}
