use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

/// Recursively lists acquired files whose extension is in `extensions`
/// (case-insensitive). Hidden entries and in-flight `.tmp`/`.part` files are
/// skipped. Output is sorted.
pub fn discover_files(acquired_dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !acquired_dir.is_dir() {
        bail!("acquired directory not found: {}", acquired_dir.display());
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(acquired_dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "failed to access entry during scan");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        if has_wanted_extension(entry.path(), extensions) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn has_wanted_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };
    if ext.eq_ignore_ascii_case("tmp") || ext.eq_ignore_ascii_case("part") {
        return false;
    }
    extensions.is_empty()
        || extensions
            .iter()
            .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(ext))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn discover_files_walks_nested_dirs_and_filters_extensions() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("medicine")).unwrap();
        fs::create_dir_all(root.join(".cache")).unwrap();
        fs::write(root.join("a.pdf"), b"a").unwrap();
        fs::write(root.join("medicine").join("B.PDF"), b"b").unwrap();
        fs::write(root.join("notes.txt"), b"n").unwrap();
        fs::write(root.join(".hidden.pdf"), b"h").unwrap();
        fs::write(root.join(".cache").join("c.pdf"), b"c").unwrap();
        fs::write(root.join("partial.pdf.part"), b"p").unwrap();

        let files = discover_files(root, &["pdf".to_string()]).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|path| path.strip_prefix(root).unwrap().display().to_string())
            .collect();

        assert_eq!(names.len(), 2);
        assert!(names.contains(&"a.pdf".to_string()));
        assert!(names.iter().any(|name| name.ends_with("B.PDF")));
    }

    #[test]
    fn discover_files_fails_for_missing_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(discover_files(&dir.path().join("absent"), &[]).is_err());
    }
}
