use anyhow::{Context, Result};
use regex::Regex;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "by", "for", "from", "in", "of", "on", "or", "the", "to", "with",
];

const MAX_SLUG_LEN: usize = 96;

/// Word splitting shared by the linker and the classifier.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    raw_word: Regex,
    alpha_or_digits: Regex,
    rendition_marker: Regex,
}

impl TextNormalizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            raw_word: Regex::new(r"[\p{Alphabetic}\p{Nd}]+")
                .context("failed to compile word regex")?,
            alpha_or_digits: Regex::new(r"\p{Alphabetic}+|\p{Nd}+")
                .context("failed to compile alpha/digit regex")?,
            rendition_marker: Regex::new(
                r"^(scan|scanned|rescan|copy|ocr|alt|alternate|reprint|compressed|optimized|hq|lq|lowres|hires)\d*$",
            )
            .context("failed to compile rendition marker regex")?,
        })
    }

    /// Lowercased tokens with letter/digit runs split apart (`FM21-76` ->
    /// `fm 21 76`).
    pub fn tokens(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        self.alpha_or_digits
            .find_iter(&lowered)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Title key used for near-duplicate comparison: rendition markers and
    /// stop-words removed.
    pub fn title_key(&self, title: &str) -> Vec<String> {
        let lowered = title.to_lowercase();
        let mut out = Vec::new();
        for word in self.raw_word.find_iter(&lowered) {
            let word = word.as_str();
            if self.rendition_marker.is_match(word) {
                continue;
            }
            for piece in self.alpha_or_digits.find_iter(word) {
                let piece = piece.as_str();
                if STOP_WORDS.contains(&piece) {
                    continue;
                }
                out.push(piece.to_string());
            }
        }
        out
    }
}

/// URL-safe slug: lowercase ASCII alphanumerics joined by single dashes.
pub fn slugify(title: &str) -> String {
    let slug = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if slug.len() <= MAX_SLUG_LEN {
        return slug;
    }

    let cut = slug[..MAX_SLUG_LEN].rfind('-').unwrap_or(MAX_SLUG_LEN);
    slug[..cut].to_string()
}

/// Readable title for a file the acquisition layer did not describe.
pub fn title_from_filename(filename: &str) -> String {
    let stem = match filename.rfind('.') {
        Some(idx) if idx > 0 => &filename[..idx],
        _ => filename,
    };

    let spaced = stem.replace('_', " ");
    let spaced = if spaced.trim().contains(char::is_whitespace) {
        spaced
    } else {
        spaced.replace('-', " ")
    };

    let title = spaced.split_whitespace().collect::<Vec<&str>>().join(" ");
    if title.is_empty() {
        filename.to_string()
    } else {
        title
    }
}
