use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::models::{Info, Swagger, Tag};

const KNOWN_SCHEMES: &[&str] = &["http", "https", "ws", "wss"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON configuration {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid YAML configuration {path:?}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

fn default_swagger_version() -> String {
    "2.0".to_string()
}

fn default_production() -> bool {
    true
}

/// A resource or model file, optionally excluded from production runs
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FileEntry {
    Path(PathBuf),
    Detailed {
        path: PathBuf,
        #[serde(default = "default_production")]
        production: bool,
    },
}

impl FileEntry {
    pub fn path(&self) -> &Path {
        match self {
            Self::Path(path) | Self::Detailed { path, .. } => path,
        }
    }

    pub fn production(&self) -> bool {
        match self {
            Self::Path(_) => true,
            Self::Detailed { production, .. } => *production,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TagEntry {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_production")]
    pub production: bool,
}

/// Project configuration: document metadata plus the files to scan
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_swagger_version")]
    pub swagger: String,
    pub info: Info,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub base_path: Option<String>,
    #[serde(default)]
    pub schemes: Vec<String>,
    #[serde(default)]
    pub tags: Vec<TagEntry>,
    #[serde(default)]
    pub resources: Vec<FileEntry>,
    #[serde(default)]
    pub models: Vec<FileEntry>,
    /// Directory relative entries resolve against
    #[serde(skip)]
    pub root: PathBuf,
}

impl Config {
    /// Loads a configuration file; `.json` files are read as JSON, anything
    /// else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("Loading configuration from {:?}", path);

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
        let mut config: Config = if is_json {
            serde_json::from_str(&text).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })?
        };

        config.root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(config)
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn resource_paths(&self, production: bool) -> Vec<PathBuf> {
        self.select(&self.resources, production)
    }

    pub fn model_paths(&self, production: bool) -> Vec<PathBuf> {
        self.select(&self.models, production)
    }

    /// Resources a production run must leave out, wherever else they turn up.
    pub fn excluded_resource_paths(&self, production: bool) -> Vec<PathBuf> {
        if !production {
            return Vec::new();
        }
        self.resources
            .iter()
            .filter(|entry| !entry.production())
            .map(|entry| self.resolve(entry.path()))
            .collect()
    }

    fn select(&self, entries: &[FileEntry], production: bool) -> Vec<PathBuf> {
        entries
            .iter()
            .filter(|entry| !production || entry.production())
            .map(|entry| self.resolve(entry.path()))
            .collect()
    }

    pub fn tags(&self, production: bool) -> Vec<Tag> {
        self.tags
            .iter()
            .filter(|tag| !production || tag.production)
            .map(|tag| Tag {
                name: tag.name.clone(),
                description: tag.description.clone(),
            })
            .collect()
    }

    /// The document skeleton: metadata and tags, no paths or definitions yet.
    pub fn metadata(&self, production: bool) -> Swagger {
        Swagger {
            swagger: self.swagger.clone(),
            info: self.info.clone(),
            host: self.host.clone(),
            basePath: self.base_path.clone(),
            schemes: self.schemes.clone(),
            tags: self.tags(production),
            paths: IndexMap::new(),
            definitions: IndexMap::new(),
        }
    }

    /// Reports metadata that would produce a questionable document.
    pub fn validate(&self, diagnostics: &mut Diagnostics) {
        if let Some(host) = self.host.as_deref() {
            if !is_bare_authority(host) {
                diagnostics.warn(
                    DiagnosticKind::InvalidConfig,
                    "host",
                    format!("'{}' is not a bare host[:port]", host),
                );
            }
        }

        if let Some(base_path) = self.base_path.as_deref() {
            if !base_path.starts_with('/') {
                diagnostics.warn(
                    DiagnosticKind::InvalidConfig,
                    "basePath",
                    format!("'{}' does not start with '/'", base_path),
                );
            }
        }

        for scheme in &self.schemes {
            if !KNOWN_SCHEMES.contains(&scheme.as_str()) {
                diagnostics.warn(
                    DiagnosticKind::InvalidConfig,
                    "schemes",
                    format!("unknown scheme '{}'", scheme),
                );
            }
        }
    }
}

fn is_bare_authority(host: &str) -> bool {
    if host.is_empty() || host.contains("://") {
        return false;
    }
    match Url::parse(&format!("http://{}", host)) {
        Ok(url) => {
            url.host_str().is_some()
                && url.path() == "/"
                && url.query().is_none()
                && url.fragment().is_none()
                && url.username().is_empty()
        }
        Err(_) => false,
    }
}
