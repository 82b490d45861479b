use anyhow::{Context, Result};
use log::{debug, info};
use serde_json::Value;
use std::{
    collections::BTreeSet,
    fs::{self, File},
    io::Write,
    path::Path,
};

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::models::{ClassResource, Schema, Swagger};
use crate::paths::{assemble_class, merge_paths, PathMap};

const DEFINITION_PREFIX: &str = "#/definitions/";

/// Outcome of reading one model file
#[derive(Debug, Clone, PartialEq)]
pub enum ModelLoad {
    Loaded { definitions: usize },
    Unreadable(String),
    ParseError(String),
    MissingDefinitions,
}

/// Accumulates paths and model definitions into one Swagger 2.0 document
pub struct Generator {
    document: Swagger,
}

impl Generator {
    /// Starts from a document carrying only metadata and tags
    pub fn new(metadata: Swagger) -> Self {
        Self { document: metadata }
    }

    /// Merges every class of one file, in source order.
    pub fn add_resources(&mut self, classes: &[ClassResource], diagnostics: &mut Diagnostics) {
        for class in classes {
            let paths = assemble_class(class, diagnostics);
            self.add_paths(paths, diagnostics);
        }
    }

    pub fn add_paths(&mut self, paths: PathMap, diagnostics: &mut Diagnostics) {
        merge_paths(&mut self.document.paths, paths, diagnostics);
    }

    /// Reads a model file (YAML for `.yaml`/`.yml`, JSON otherwise) and merges
    /// its `definitions`. A file that cannot contribute is reported and skipped.
    pub fn add_model(&mut self, path: impl AsRef<Path>, diagnostics: &mut Diagnostics) -> ModelLoad {
        let path = path.as_ref();
        let location = path.display().to_string();

        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                let kind = if e.kind() == std::io::ErrorKind::NotFound {
                    DiagnosticKind::MissingFile
                } else {
                    DiagnosticKind::UnreadableFile
                };
                diagnostics.warn(kind, &location, format!("model file skipped: {}", e));
                return ModelLoad::Unreadable(e.to_string());
            }
        };

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| matches!(ext.to_ascii_lowercase().as_str(), "yaml" | "yml"));
        self.add_model_source(&text, is_yaml, &location, diagnostics)
    }

    pub fn add_model_source(
        &mut self,
        text: &str,
        is_yaml: bool,
        location: &str,
        diagnostics: &mut Diagnostics,
    ) -> ModelLoad {
        let parsed: Result<Value, String> = if is_yaml {
            serde_yaml::from_str(text).map_err(|e| e.to_string())
        } else {
            serde_json::from_str(text).map_err(|e| e.to_string())
        };

        let value = match parsed {
            Ok(value) => value,
            Err(reason) => {
                diagnostics.warn(
                    DiagnosticKind::ModelParseError,
                    location,
                    format!("model file skipped: {}", reason),
                );
                return ModelLoad::ParseError(reason);
            }
        };

        let Some(definitions) = value.get("definitions").and_then(Value::as_object) else {
            diagnostics.warn(
                DiagnosticKind::ModelMissingDefinitions,
                location,
                "model file has no 'definitions' object and was skipped",
            );
            return ModelLoad::MissingDefinitions;
        };

        for (name, schema) in definitions {
            if self
                .document
                .definitions
                .insert(name.clone(), schema.clone())
                .is_some()
            {
                debug!("{}: definition '{}' replaces an earlier one", location, name);
            }
        }

        debug!("Loaded {} definition(s) from {}", definitions.len(), location);
        ModelLoad::Loaded {
            definitions: definitions.len(),
        }
    }

    /// `$ref` targets used by operations but absent from `definitions`
    pub fn unresolved_references(&self) -> Vec<String> {
        let mut references = BTreeSet::new();
        for item in self.document.paths.values() {
            for operation in item.operations.values() {
                for param in &operation.parameters {
                    collect_references(&param.inline, &mut references);
                    if let Some(schema) = &param.schema {
                        collect_references(schema, &mut references);
                    }
                }
                for response in operation.responses.values() {
                    if let Some(schema) = &response.schema {
                        collect_references(schema, &mut references);
                    }
                }
            }
        }

        references
            .into_iter()
            .filter(|name| !self.document.definitions.contains_key(name))
            .collect()
    }

    pub fn document(&self) -> &Swagger {
        &self.document
    }

    pub fn build(self) -> Swagger {
        self.document
    }
}

fn collect_references(schema: &Schema, references: &mut BTreeSet<String>) {
    if let Some(name) = schema.ref_.as_deref().and_then(|r| r.strip_prefix(DEFINITION_PREFIX)) {
        references.insert(name.to_string());
    }
    if let Some(items) = &schema.items {
        collect_references(items, references);
    }
}

/// Writes the document in the requested output formats (`json`, `yaml`)
pub fn generate(document: &Swagger, output_dir: impl AsRef<Path>, output_types: &[String]) -> Result<()> {
    let output_dir = output_dir.as_ref();

    fs::create_dir_all(output_dir)
        .context(format!("Failed to create output directory: {:?}", output_dir))?;

    for output_type in output_types {
        match output_type.as_str() {
            "json" => generate_json(output_dir, document)?,
            "yaml" => generate_yaml(output_dir, document)?,
            _ => debug!("Unknown output type: {}", output_type),
        }
    }

    Ok(())
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    let mut file = File::create(path).context(format!("Failed to create file: {:?}", path))?;
    file.write_all(content.as_bytes())
        .context(format!("Failed to write to file: {:?}", path))?;
    Ok(())
}

fn generate_json(output_dir: &Path, document: &Swagger) -> Result<()> {
    let json = serde_json::to_string_pretty(document)
        .context("Failed to serialize Swagger document to JSON")?;
    write_file(&output_dir.join("swagger.json"), &json)?;

    info!("Generated Swagger JSON output");
    Ok(())
}

fn generate_yaml(output_dir: &Path, document: &Swagger) -> Result<()> {
    let yaml = serde_yaml::to_string(document)
        .context("Failed to serialize Swagger document to YAML")?;
    write_file(&output_dir.join("swagger.yaml"), &yaml)?;

    info!("Generated Swagger YAML output");
    Ok(())
}
