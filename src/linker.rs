use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::model::CatalogEntry;
use crate::text::TextNormalizer;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkerConfig {
    pub title_threshold: f64,
    pub page_tolerance: u32,
    pub size_tolerance: f64,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            title_threshold: 0.85,
            page_tolerance: 5,
            size_tolerance: 0.10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateLink {
    pub alias: String,
    pub canonical: String,
    pub similarity: f64,
}

/// Alias -> canonical assignments for one set of entries. Canonical entries
/// never appear as aliases.
#[derive(Debug, Clone, Default)]
pub struct LinkPlan {
    pub links: Vec<DuplicateLink>,
    targets: BTreeMap<String, String>,
}

impl LinkPlan {
    pub fn target_of(&self, id: &str) -> Option<&str> {
        self.targets.get(id).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

struct Candidate<'a> {
    entry: &'a CatalogEntry,
    key: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NearDuplicateLinker {
    normalizer: TextNormalizer,
    config: LinkerConfig,
}

impl NearDuplicateLinker {
    pub fn new(config: LinkerConfig) -> Result<Self> {
        Ok(Self {
            normalizer: TextNormalizer::new()?,
            config: LinkerConfig {
                title_threshold: config.title_threshold.clamp(0.0, 1.0),
                ..config
            },
        })
    }

    /// Walks entries from strongest to weakest rendition (more pages, then
    /// larger file, then smaller id). Each entry attaches to the first chosen
    /// canonical it matches, otherwise it becomes a canonical itself.
    pub fn plan<'a, I>(&self, entries: I) -> LinkPlan
    where
        I: IntoIterator<Item = &'a CatalogEntry>,
    {
        let mut candidates: Vec<Candidate<'a>> = entries
            .into_iter()
            .map(|entry| Candidate {
                entry,
                key: self.normalizer.title_key(&entry.title),
            })
            .collect();

        candidates.sort_by(|a, b| canonical_rank(a.entry).cmp(&canonical_rank(b.entry)));

        let mut canonicals: Vec<usize> = Vec::new();
        let mut plan = LinkPlan::default();

        for idx in 0..candidates.len() {
            let candidate = &candidates[idx];
            let matched = canonicals.iter().copied().find_map(|canonical_idx| {
                let canonical = &candidates[canonical_idx];
                self.match_score(canonical, candidate)
                    .map(|similarity| (canonical_idx, similarity))
            });

            match matched {
                Some((canonical_idx, similarity)) => {
                    let canonical_id = candidates[canonical_idx].entry.id.clone();
                    plan.targets
                        .insert(candidate.entry.id.clone(), canonical_id.clone());
                    plan.links.push(DuplicateLink {
                        alias: candidate.entry.id.clone(),
                        canonical: canonical_id,
                        similarity,
                    });
                }
                None => canonicals.push(idx),
            }
        }

        plan.links.sort_by(|a, b| a.alias.cmp(&b.alias));
        plan
    }

    fn match_score(&self, canonical: &Candidate<'_>, candidate: &Candidate<'_>) -> Option<f64> {
        if canonical.entry.content_hash == candidate.entry.content_hash {
            return None;
        }

        let similarity = title_similarity(&canonical.key, &candidate.key);
        if similarity < self.config.title_threshold {
            return None;
        }

        if !self.lengths_close(canonical.entry, candidate.entry) {
            return None;
        }

        Some(similarity)
    }

    fn lengths_close(&self, a: &CatalogEntry, b: &CatalogEntry) -> bool {
        match (a.pages, b.pages) {
            (Some(pa), Some(pb)) if pa > 0 && pb > 0 => {
                let larger = pa.max(pb);
                let allowed = self.config.page_tolerance.max(larger / 50);
                pa.abs_diff(pb) <= allowed
            }
            _ => {
                let larger = a.size_bytes.max(b.size_bytes);
                if larger == 0 {
                    return true;
                }
                let diff = a.size_bytes.abs_diff(b.size_bytes) as f64;
                diff / larger as f64 <= self.config.size_tolerance
            }
        }
    }
}

fn canonical_rank(entry: &CatalogEntry) -> (Reverse<u32>, Reverse<u64>, &str) {
    (
        Reverse(entry.pages.unwrap_or(0)),
        Reverse(entry.size_bytes),
        entry.id.as_str(),
    )
}

fn is_number(token: &str) -> bool {
    token.chars().all(|c| c.is_numeric())
}

/// Series designator such as `fm 21 76`: a letter code of at most four
/// characters followed by two or more number groups. `volume 2` is not one.
fn designator(key: &[String]) -> Option<Vec<&str>> {
    key.iter().enumerate().find_map(|(idx, token)| {
        if is_number(token) || token.chars().count() > 4 {
            return None;
        }
        let numbers: Vec<&str> = key[idx + 1..]
            .iter()
            .map(String::as_str)
            .take_while(|next| is_number(next))
            .collect();
        (numbers.len() >= 2).then(|| std::iter::once(token.as_str()).chain(numbers).collect())
    })
}

/// Similarity of two title keys in `[0, 1]`.
///
/// All numbers must agree exactly. When both titles carry the same series
/// designator, the overlap coefficient is used so a bare `FM 21-76` rendition
/// still matches `Army Survival FM21-76`. Everything else is compared with
/// normalized Levenshtein over the joined keys, so a title contained in a
/// longer one is not a match on its own.
pub fn title_similarity(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let numbers_a: Vec<&str> = a.iter().map(String::as_str).filter(|t| is_number(t)).collect();
    let numbers_b: Vec<&str> = b.iter().map(String::as_str).filter(|t| is_number(t)).collect();
    if numbers_a != numbers_b {
        return 0.0;
    }

    if let (Some(series_a), Some(series_b)) = (designator(a), designator(b))
        && series_a == series_b
    {
        let set_a: BTreeSet<&str> = a.iter().map(String::as_str).collect();
        let set_b: BTreeSet<&str> = b.iter().map(String::as_str).collect();
        let shared = set_a.intersection(&set_b).count();
        return shared as f64 / set_a.len().min(set_b.len()) as f64;
    }

    strsim::normalized_levenshtein(&a.join(" "), &b.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Origin, Relevance};

    fn entry(id: &str, title: &str, pages: Option<u32>, size_bytes: u64) -> CatalogEntry {
        CatalogEntry {
            id: id.to_string(),
            title: title.to_string(),
            filename: format!("{id}.pdf"),
            relative_path: format!("pdfs/{id}.pdf"),
            category: None,
            tier: None,
            relevance: Relevance::High,
            summary: String::new(),
            summary_origin: Origin::Auto,
            tier_origin: Origin::Auto,
            pages,
            size_bytes,
            size_mb: 0.0,
            content_hash: format!("hash-{id}"),
            content_duplicate_of: None,
            source: None,
            original_url: None,
            stale: false,
            review_flags: Vec::new(),
        }
    }

    fn key(title: &str) -> Vec<String> {
        TextNormalizer::new().unwrap().title_key(title)
    }

    #[test]
    fn similarity_requires_matching_designators() {
        assert_eq!(
            title_similarity(&key("FM 21-76 Survival"), &key("FM 21-76-1 Survival")),
            0.0
        );
        assert_eq!(
            title_similarity(&key("Army Survival FM21-76"), &key("fm 21 76 scan2")),
            1.0
        );
    }

    #[test]
    fn shared_volume_number_is_not_a_designator() {
        let score = title_similarity(
            &key("Medicine Volume 2"),
            &key("Veterinary Medicine Volume 2"),
        );
        assert!(score < 0.85, "score was {score}");

        let linker = NearDuplicateLinker::new(LinkerConfig::default()).unwrap();
        let entries = vec![
            entry("medicine-volume-2", "Medicine Volume 2", None, 5_000_000),
            entry(
                "veterinary-medicine-volume-2",
                "Veterinary Medicine Volume 2",
                None,
                5_200_000,
            ),
        ];
        assert!(linker.plan(&entries).is_empty());
    }

    #[test]
    fn similarity_rejects_unrelated_titles() {
        let score = title_similarity(
            &key("Where There is No Doctor"),
            &key("Where There is No Dentist"),
        );
        assert!(score < 0.85, "score was {score}");
        assert_eq!(title_similarity(&key(""), &key("anything")), 0.0);
    }

    #[test]
    fn similarity_tolerates_small_spelling_differences() {
        let score = title_similarity(
            &key("Nuclear War Survival Skills"),
            &key("Nuclear War Survival Skill"),
        );
        assert!(score >= 0.85, "score was {score}");
    }

    #[test]
    fn plan_links_rendition_to_higher_page_count() {
        let linker = NearDuplicateLinker::new(LinkerConfig::default()).unwrap();
        let entries = vec![
            entry("fm-21-76-scan2", "fm 21 76 scan2", Some(231), 13_736_345),
            entry("army-survival-fm21-76", "Army Survival FM21-76", Some(233), 13_317_000),
        ];

        let plan = linker.plan(&entries);
        assert_eq!(plan.links.len(), 1);
        assert_eq!(plan.links[0].alias, "fm-21-76-scan2");
        assert_eq!(plan.links[0].canonical, "army-survival-fm21-76");
        assert_eq!(plan.target_of("army-survival-fm21-76"), None);
    }

    #[test]
    fn plan_breaks_page_ties_by_size_then_id() {
        let linker = NearDuplicateLinker::new(LinkerConfig::default()).unwrap();
        let by_size = vec![
            entry("a-small", "First Aid Manual", Some(100), 1_000),
            entry("b-large", "First Aid Manual", Some(100), 1_050),
        ];
        let plan = linker.plan(&by_size);
        assert_eq!(plan.target_of("a-small"), Some("b-large"));

        let by_id = vec![
            entry("b-doc", "First Aid Manual", Some(100), 1_000),
            entry("a-doc", "First Aid Manual", Some(100), 1_000),
        ];
        let plan = linker.plan(&by_id);
        assert_eq!(plan.target_of("b-doc"), Some("a-doc"));
    }

    #[test]
    fn plan_requires_page_proximity() {
        let linker = NearDuplicateLinker::new(LinkerConfig::default()).unwrap();
        let entries = vec![
            entry("abridged", "Ranger Handbook", Some(120), 5_000_000),
            entry("full", "Ranger Handbook", Some(320), 5_100_000),
        ];
        assert!(linker.plan(&entries).is_empty());
    }

    #[test]
    fn plan_falls_back_to_size_when_pages_unknown() {
        let linker = NearDuplicateLinker::new(LinkerConfig::default()).unwrap();
        let close = vec![
            entry("one", "Field Hygiene and Sanitation", None, 1_000_000),
            entry("two", "Field Hygiene & Sanitation", None, 1_050_000),
        ];
        assert_eq!(linker.plan(&close).target_of("one"), Some("two"));

        let far = vec![
            entry("one", "Field Hygiene and Sanitation", None, 1_000_000),
            entry("two", "Field Hygiene and Sanitation", None, 3_000_000),
        ];
        assert!(linker.plan(&far).is_empty());
    }

    #[test]
    fn plan_never_chains_links() {
        let linker = NearDuplicateLinker::new(LinkerConfig::default()).unwrap();
        let entries = vec![
            entry("c", "Basic Emergency Plan", Some(10), 100),
            entry("a", "Basic Emergency Plan", Some(12), 100),
            entry("b", "Basic Emergency Plan", Some(11), 100),
        ];

        let plan = linker.plan(&entries);
        assert_eq!(plan.links.len(), 2);
        for link in &plan.links {
            assert_eq!(link.canonical, "a");
            assert_eq!(plan.target_of(&link.canonical), None);
        }
    }
}
