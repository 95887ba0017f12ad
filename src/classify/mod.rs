use anyhow::Result;
use tracing::debug;

use crate::model::{CatalogEntry, Category, ExtractedText, Origin, Relevance, ReviewFlag, Tier};
use crate::text::TextNormalizer;

mod rules;
mod summary;

use rules::*;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const MIN_USEFUL_TEXT_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierConfig {
    pub large_size_mb: f64,
    pub bulky_volume_mb: f64,
    pub compact_reference_mb: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            large_size_mb: 20.0,
            bulky_volume_mb: 15.0,
            compact_reference_mb: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
struct SignalTerm {
    tokens: Vec<String>,
    prefix_last: bool,
}

impl SignalTerm {
    fn weight(&self) -> u32 {
        self.tokens.len() as u32
    }

    fn matches(&self, haystack: &[String]) -> bool {
        let width = self.tokens.len();
        if width == 0 || haystack.len() < width {
            return false;
        }

        haystack.windows(width).any(|window| {
            window.iter().zip(&self.tokens).enumerate().all(|(idx, (word, term))| {
                if self.prefix_last && idx + 1 == width {
                    word.starts_with(term.as_str())
                } else {
                    word == term
                }
            })
        })
    }
}

#[derive(Debug, Clone)]
struct TermSet {
    terms: Vec<SignalTerm>,
}

impl TermSet {
    fn compile(normalizer: &TextNormalizer, raw: &[&str]) -> Self {
        let terms = raw
            .iter()
            .map(|term| {
                let prefix_last = term.ends_with('*');
                SignalTerm {
                    tokens: normalizer.tokens(term.trim_end_matches('*')),
                    prefix_last,
                }
            })
            .filter(|term| !term.tokens.is_empty())
            .collect();
        Self { terms }
    }

    fn matching<'a>(&'a self, haystack: &'a [String]) -> impl Iterator<Item = &'a SignalTerm> + 'a {
        self.terms.iter().filter(move |term| term.matches(haystack))
    }

    fn any_match(&self, haystack: &[String]) -> bool {
        self.matching(haystack).next().is_some()
    }

    fn weighted_score(&self, haystack: &[String]) -> u32 {
        self.matching(haystack).map(SignalTerm::weight).sum()
    }
}

/// Components of the automatic tier score, kept for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierScore {
    pub urgency: i32,
    pub practical: i32,
    pub compact_reference: i32,
    pub bulky_volume: i32,
    pub oversize: i32,
}

impl TierScore {
    pub fn total(&self) -> i32 {
        self.urgency + self.practical + self.compact_reference + self.bulky_volume + self.oversize
    }

    pub fn tier(&self) -> Tier {
        let total = self.total();
        if total >= 3 {
            Tier::Essential
        } else if total < 0 {
            Tier::Comprehensive
        } else {
            Tier::Standard
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub category: Category,
    pub category_score: u32,
    pub tier: Tier,
    pub tier_score: TierScore,
    pub relevance: Relevance,
    pub flags: Vec<ReviewFlag>,
}

#[derive(Debug, Clone)]
pub struct Classifier {
    normalizer: TextNormalizer,
    config: ClassifierConfig,
    categories: Vec<(Category, TermSet)>,
    life_critical: TermSet,
    practical: TermSet,
    compact_reference: TermSet,
    reference_volume: TermSet,
    low_relevance: TermSet,
    excluded_content: TermSet,
    topics: Vec<(&'static str, SignalTerm)>,
    document_kinds: Vec<(&'static str, SignalTerm)>,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Result<Self> {
        let normalizer = TextNormalizer::new()?;
        let categories = CATEGORY_RULES
            .iter()
            .map(|(category, terms)| (*category, TermSet::compile(&normalizer, terms)))
            .collect();
        let single = |raw: &str| SignalTerm {
            tokens: normalizer.tokens(raw),
            prefix_last: false,
        };
        let topics = SUMMARY_TOPICS
            .iter()
            .map(|topic| (*topic, single(topic)))
            .collect();
        let document_kinds = DOCUMENT_KINDS
            .iter()
            .map(|(cue, label)| (*label, single(cue)))
            .collect();

        Ok(Self {
            life_critical: TermSet::compile(&normalizer, LIFE_CRITICAL_TERMS),
            practical: TermSet::compile(&normalizer, PRACTICAL_TERMS),
            compact_reference: TermSet::compile(&normalizer, COMPACT_REFERENCE_TERMS),
            reference_volume: TermSet::compile(&normalizer, REFERENCE_VOLUME_TERMS),
            low_relevance: TermSet::compile(&normalizer, LOW_RELEVANCE_TERMS),
            excluded_content: TermSet::compile(&normalizer, EXCLUDED_CONTENT_TERMS),
            categories,
            topics,
            document_kinds,
            normalizer,
            config,
        })
    }

    pub fn classify(&self, title: &str, filename: &str, size_bytes: u64) -> Classification {
        let tokens = self.normalizer.tokens(&format!("{title} {filename}"));
        let mut flags = Vec::new();

        let (category, category_score) = match self.categorize(&tokens) {
            Some(best) => best,
            None => {
                flags.push(ReviewFlag::Unclassified);
                (FALLBACK_CATEGORY, 0)
            }
        };

        let tier_score = self.score_tier(&tokens, size_bytes);

        let excluded = self.excluded_content.any_match(&tokens);
        if excluded {
            flags.push(ReviewFlag::ExcludedContent);
        }
        let relevance = if excluded || self.low_relevance.any_match(&tokens) {
            Relevance::Low
        } else {
            Relevance::High
        };

        Classification {
            category,
            category_score,
            tier: tier_score.tier(),
            tier_score,
            relevance,
            flags,
        }
    }

    /// Highest weighted score wins; ties keep the earlier-declared category.
    fn categorize(&self, tokens: &[String]) -> Option<(Category, u32)> {
        let mut best: Option<(Category, u32)> = None;
        for (category, terms) in &self.categories {
            let score = terms.weighted_score(tokens);
            if score == 0 {
                continue;
            }
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((*category, score));
            }
        }
        best
    }

    pub fn score_tier(&self, tokens: &[String], size_bytes: u64) -> TierScore {
        let size_mb = size_bytes as f64 / BYTES_PER_MB;
        let urgent_matches = self.life_critical.matching(tokens).count().min(2) as i32;

        TierScore {
            urgency: 3 * urgent_matches,
            practical: i32::from(self.practical.any_match(tokens)),
            compact_reference: if size_mb < self.config.compact_reference_mb
                && self.compact_reference.any_match(tokens)
            {
                2
            } else {
                0
            },
            bulky_volume: if size_mb > self.config.bulky_volume_mb
                && self.reference_volume.any_match(tokens)
            {
                -4
            } else {
                0
            },
            oversize: if size_mb > self.config.large_size_mb {
                -10
            } else {
                0
            },
        }
    }

    /// Fills category, tier, relevance, review flags and summary. Manual tier
    /// and manual summary are left alone. Returns true when the entry changed.
    pub fn apply(&self, entry: &mut CatalogEntry, extracted: Option<&ExtractedText>) -> bool {
        let before = entry.clone();
        let classification = self.classify(&entry.title, &entry.filename, entry.size_bytes);
        debug!(
            id = %entry.id,
            category = %classification.category,
            category_score = classification.category_score,
            tier_score = classification.tier_score.total(),
            "classified entry"
        );

        entry.category = Some(classification.category);
        if entry.tier_origin != Origin::Manual || entry.tier.is_none() {
            entry.tier = Some(classification.tier);
            entry.tier_origin = Origin::Auto;
        }
        entry.relevance = classification.relevance;

        let text = useful_text(extracted);

        let mut flags = classification.flags;
        if text.is_none() {
            flags.push(ReviewFlag::MissingText);
        }
        flags.sort();
        flags.dedup();
        entry.review_flags = flags;

        if entry.summary_origin != Origin::Manual || entry.summary.trim().is_empty() {
            entry.summary = self.summarize(entry, text);
            entry.summary_origin = Origin::Auto;
        }

        entry.stale = false;
        *entry != before
    }
}

/// Extracted text long enough to summarize from; anything shorter counts as
/// missing.
pub fn useful_text(extracted: Option<&ExtractedText>) -> Option<&str> {
    extracted
        .map(|value| value.text.trim())
        .filter(|value| value.chars().count() >= MIN_USEFUL_TEXT_CHARS)
}
