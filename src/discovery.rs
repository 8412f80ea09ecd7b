//! Document discovery.
//!
//! Recursively scans a directory for template documents and loads them,
//! together with any sibling `<file>.map` source map.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::RenameOptions;
use crate::document::SourceDocument;
use crate::error::RenameError;
use crate::source_map::SourceMap;

fn is_excluded(relative: &Path, options: &RenameOptions) -> bool {
    relative.components().any(|c| {
        let part = c.as_os_str().to_string_lossy();
        options.excluded_paths.iter().any(|ex| part == ex.as_str())
    })
}

fn has_template_extension(path: &Path, options: &RenameOptions) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| options.file_extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
}

/// Template files under `root`, sorted so runs are reproducible.
pub fn find_template_files(root: &Path, options: &RenameOptions) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(root = %root.display(), "skipping unreadable entry: {}", err);
                continue;
            }
        };
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if path.is_file() && !is_excluded(relative, options) && has_template_extension(path, options) {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    files
}

fn read(path: &Path) -> Result<String, RenameError> {
    fs::read_to_string(path).map_err(|source| RenameError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Loads one document. Its id is the path relative to `root`, `/`-separated.
pub fn load_document(root: &Path, path: &Path) -> Result<SourceDocument, RenameError> {
    let content = read(path)?;
    let relative = path.strip_prefix(root).unwrap_or(path);
    let id = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");

    let mut document = SourceDocument::new(id, content);
    let mut map_path = path.as_os_str().to_owned();
    map_path.push(".map");
    let map_path = PathBuf::from(map_path);
    if map_path.is_file() {
        document = document.with_source_map(SourceMap::from_json(&read(&map_path)?)?);
    }
    Ok(document)
}

/// Finds and loads every template document under `root`.
pub fn discover_documents(root: &Path, options: &RenameOptions) -> Result<Vec<SourceDocument>, RenameError> {
    let files = find_template_files(root, options);
    debug!(root = %root.display(), files = files.len(), "discovered template files");
    files.iter().map(|path| load_document(root, path)).collect()
}
