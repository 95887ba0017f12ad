use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use regex::Regex;
use tracing::{info, warn};

use crate::cli::ExtractArgs;
use crate::model::{ExtractedText, ExtractionManifest};
use crate::scan::discover_files;
use crate::util::{read_json_or_default, relative_path_string, write_json_pretty};

const MANIFEST_VERSION: u32 = 1;

pub fn run(args: ExtractArgs) -> Result<()> {
    let library_root = &args.library.library_root;
    let acquired_dir = args.library.acquired_path();
    let manifest_path = args
        .library
        .extraction_manifest(args.extraction_manifest.as_ref());

    for program in ["pdfinfo", "pdftotext"] {
        if !command_available(program) {
            warn!(program, "text extraction tool not available; skipping extraction");
            return Ok(());
        }
    }

    let mut manifest: ExtractionManifest = read_json_or_default(&manifest_path)?;
    manifest.manifest_version = MANIFEST_VERSION;

    let pending: Vec<(String, PathBuf)> = discover_files(&acquired_dir, &args.extensions)?
        .into_iter()
        .filter_map(|path| relative_path_string(library_root, &path).map(|rel| (rel, path)))
        .filter(|(rel, _)| args.refresh || !manifest.files.contains_key(rel))
        .collect();

    info!(
        pending = pending.len(),
        known = manifest.files.len(),
        "starting text extraction"
    );

    let pages_pattern =
        Regex::new(r"(?m)^Pages:\s+(\d+)").context("failed to compile pdfinfo pages regex")?;

    let results: Vec<(String, Result<ExtractedText>)> = pending
        .par_iter()
        .map(|(rel, path)| {
            let extracted = extract_file(path, &pages_pattern, args.max_pages, args.max_text_chars);
            (rel.clone(), extracted)
        })
        .collect();

    let mut extracted_count = 0_usize;
    let mut failed_count = 0_usize;
    for (rel, result) in results {
        match result {
            Ok(extracted) => {
                manifest.files.insert(rel, extracted);
                extracted_count += 1;
            }
            Err(err) => {
                warn!(path = %rel, error = %format!("{err:#}"), "text extraction failed");
                failed_count += 1;
            }
        }
    }

    if args.dry_run {
        info!(
            extracted = extracted_count,
            failed = failed_count,
            "extract dry-run complete"
        );
        return Ok(());
    }

    write_json_pretty(&manifest_path, &manifest)?;
    info!(
        path = %manifest_path.display(),
        extracted = extracted_count,
        failed = failed_count,
        total = manifest.files.len(),
        "wrote extraction manifest"
    );

    Ok(())
}

fn extract_file(
    path: &Path,
    pages_pattern: &Regex,
    max_pages: u32,
    max_text_chars: usize,
) -> Result<ExtractedText> {
    let info = run_tool("pdfinfo", &[path.as_os_str()], path)?;
    let pages = parse_page_count(&info, pages_pattern);

    let last_page = max_pages.max(1).to_string();
    let text = run_tool(
        "pdftotext",
        &[
            OsStr::new("-enc"),
            OsStr::new("UTF-8"),
            OsStr::new("-l"),
            OsStr::new(&last_page),
            path.as_os_str(),
            OsStr::new("-"),
        ],
        path,
    )?;

    Ok(ExtractedText {
        pages,
        text: normalize_text(&text, max_text_chars),
    })
}

fn run_tool(program: &str, args: &[&OsStr], path: &Path) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("failed to execute {program} for {}", path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "{program} returned non-zero exit status for {}: {}",
            path.display(),
            stderr.trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).replace('\u{0000}', ""))
}

fn command_available(program: &str) -> bool {
    Command::new(program).arg("-v").output().is_ok()
}

fn parse_page_count(info: &str, pattern: &Regex) -> Option<u32> {
    pattern
        .captures(info)
        .and_then(|captures| captures.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|pages| *pages > 0)
}

/// Collapses whitespace (form feeds included) and truncates on a char
/// boundary.
fn normalize_text(raw: &str, max_chars: usize) -> String {
    raw.split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
        .chars()
        .take(max_chars)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_count_is_read_from_pdfinfo_output() {
        let pattern = Regex::new(r"(?m)^Pages:\s+(\d+)").unwrap();
        let info = "Title:          FM 21-76\nProducer:       scan\nPages:          233\nEncrypted:      no\n";
        assert_eq!(parse_page_count(info, &pattern), Some(233));
        assert_eq!(parse_page_count("Pages:          0\n", &pattern), None);
        assert_eq!(parse_page_count("Title: none\n", &pattern), None);
    }

    #[test]
    fn extracted_text_is_collapsed_and_truncated() {
        let raw = "Chapter 1\n\n  Water\u{000C}procurement   and fire";
        assert_eq!(normalize_text(raw, 200), "Chapter 1 Water procurement and fire");
        assert_eq!(normalize_text(raw, 9), "Chapter 1");
    }
}
