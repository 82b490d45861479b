use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::discovery::{discover_resources, DEFAULT_EXTENSION};
use crate::error::Result;
use crate::generator::Generator;
use crate::models::{ClassResource, Swagger};
use crate::parser::{ParserError, ResourceParser};

/// Caller-selected switches for one run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Leave out `@Internal` methods and entries flagged `production: false`
    pub production: bool,
    /// Directories searched for resources in addition to the configured list
    pub scan_dirs: Vec<PathBuf>,
    /// Extensions considered while scanning; `java` when empty
    pub extensions: Vec<String>,
}

/// Runs the whole pipeline for one configured project. Only configuration
/// and scan-root failures are returned as errors; everything else lands in
/// `diagnostics` and the affected unit is skipped.
pub fn build_document(
    config: &Config,
    options: &RunOptions,
    diagnostics: &mut Diagnostics,
) -> Result<Swagger> {
    config.validate(diagnostics);

    let resources = resource_files(config, options)?;
    let parser = ResourceParser::new().production(options.production);
    let mut generator = Generator::new(config.metadata(options.production));

    for path in &resources {
        if let Some(classes) = parse_resource(&parser, path, diagnostics) {
            let operations: usize = classes.iter().map(|class| class.operations.len()).sum();
            debug!("{:?}: {} class(es), {} operation(s)", path, classes.len(), operations);
            generator.add_resources(&classes, diagnostics);
        }
    }

    for path in config.model_paths(options.production) {
        generator.add_model(&path, diagnostics);
    }

    for name in generator.unresolved_references() {
        warn!("Referenced type '{}' has no definition in the loaded models", name);
    }

    let document = generator.build();
    info!(
        "Assembled {} path(s) and {} definition(s) from {} resource file(s)",
        document.paths.len(),
        document.definitions.len(),
        resources.len()
    );
    Ok(document)
}

/// Configured resources first, then scanned ones not already listed. In a
/// production run, scanned files whose configured entry is non-production
/// stay out.
fn resource_files(config: &Config, options: &RunOptions) -> Result<Vec<PathBuf>> {
    let mut files = config.resource_paths(options.production);
    if options.scan_dirs.is_empty() {
        return Ok(files);
    }

    let extensions = if options.extensions.is_empty() {
        vec![DEFAULT_EXTENSION.to_string()]
    } else {
        options.extensions.clone()
    };
    let mut seen: HashSet<PathBuf> = files.iter().map(|path| canonical(path)).collect();
    let excluded: HashSet<PathBuf> = config
        .excluded_resource_paths(options.production)
        .iter()
        .map(|path| canonical(path))
        .collect();

    for found in discover_resources(&options.scan_dirs, &extensions)? {
        let key = canonical(&found);
        if excluded.contains(&key) {
            debug!("{:?}: non-production resource left out of scan results", found);
            continue;
        }
        if seen.insert(key) {
            files.push(found);
        }
    }
    Ok(files)
}

/// Falls back to the path as written when it cannot be resolved on disk.
fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn parse_resource(
    parser: &ResourceParser,
    path: &Path,
    diagnostics: &mut Diagnostics,
) -> Option<Vec<ClassResource>> {
    let location = path.display().to_string();
    match parser.parse_file(path, diagnostics) {
        Ok(classes) => Some(classes),
        Err(ParserError::IOError(e)) => {
            let kind = if e.kind() == std::io::ErrorKind::NotFound {
                DiagnosticKind::MissingFile
            } else {
                DiagnosticKind::UnreadableFile
            };
            diagnostics.warn(kind, &location, format!("resource file skipped: {}", e));
            None
        }
        Err(ParserError::MissingApiBlock(_)) => {
            diagnostics.error(
                DiagnosticKind::MissingApiTag,
                &location,
                "listed resource file has no @Api annotation block",
            );
            None
        }
        Err(e @ ParserError::MalformedSignature(_)) => {
            diagnostics.warn(DiagnosticKind::MalformedSignature, &location, e.to_string());
            None
        }
    }
}
