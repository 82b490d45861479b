use log::debug;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::tokenizer::contains_resource;

pub const DEFAULT_EXTENSION: &str = "java";

/// Walks each root in file-name order and returns the files with one of
/// `extensions` that contain an `@Api` annotation block.
pub fn discover_resources(roots: &[PathBuf], extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();

    for root in roots {
        debug!("Scanning {:?} for annotated resources", root);
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|source| Error::ScanRoot {
                path: root.clone(),
                source,
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() || !has_extension(path, extensions) {
                continue;
            }

            match std::fs::read_to_string(path) {
                Ok(source) if contains_resource(&source) => {
                    debug!("Found resource file: {:?}", path);
                    found.push(path.to_path_buf());
                }
                Ok(_) => {}
                Err(e) => debug!("Skipping unreadable file {:?}: {}", path, e),
            }
        }
    }

    Ok(found)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(ext)))
}
