use log::debug;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::attributes::{
    parse_aggregate, ApiAttrs, ImplicitParamAttrs, OperationAttrs, PathAttrs, ResponseAttrs,
    TagAttributes,
};
use crate::converter::build_operation;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::models::{ClassResource, HttpMethod, ParsedOperation};
use crate::tokenizer::{contains_resource, scan_blocks, AnnotationBlock, Signature, TagCall};

const INTERNAL_MARKER: &str = "Internal";
const RESPONSES_TAG: &str = "ApiResponses";
const IMPLICIT_PARAMS_TAG: &str = "ApiImplicitParams";

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Failed to read file: {0}")]
    IOError(#[from] std::io::Error),

    #[error("Malformed signature: '{0}'")]
    MalformedSignature(String),

    #[error("No @Api annotation block in {0:?}")]
    MissingApiBlock(PathBuf),
}

/// Where method blocks land while walking a file
enum ClassScope {
    BeforeFirstClass,
    Skipped,
    Open,
}

/// Extracts annotated classes and their operations from resource sources
#[derive(Debug, Clone, Default)]
pub struct ResourceParser {
    production: bool,
}

impl ResourceParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// In production mode, methods marked `@Internal` are left out.
    pub fn production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    pub fn parse_file(
        &self,
        file_path: impl AsRef<Path>,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<ClassResource>, ParserError> {
        let file_path = file_path.as_ref();
        debug!("Parsing resource file: {:?}", file_path);

        let source = std::fs::read_to_string(file_path)?;
        if !contains_resource(&source) {
            return Err(ParserError::MissingApiBlock(file_path.to_path_buf()));
        }
        Ok(self.parse_source(&source, &file_path.display().to_string(), diagnostics))
    }

    /// Walks the annotation blocks of one source text. A class block opens a
    /// new class; method blocks attach to the most recent class.
    pub fn parse_source(
        &self,
        source: &str,
        origin: &str,
        diagnostics: &mut Diagnostics,
    ) -> Vec<ClassResource> {
        let mut classes: Vec<ClassResource> = Vec::new();
        let mut scope = ClassScope::BeforeFirstClass;

        for block in scan_blocks(source) {
            let location = format!("{}:{}", origin, block.line);
            let signature = match block.parse_signature() {
                Ok(signature) => signature,
                Err(e) => {
                    diagnostics.warn(
                        DiagnosticKind::MalformedSignature,
                        &location,
                        format!("annotation block skipped: {}", e),
                    );
                    continue;
                }
            };

            match signature {
                Signature::Class { name } => {
                    scope = match self.parse_class(&block, &name, &location, diagnostics) {
                        Some(class) => {
                            classes.push(class);
                            ClassScope::Open
                        }
                        None => ClassScope::Skipped,
                    };
                }
                Signature::Method { name, return_type, .. } => {
                    let location = format!("{} {}", location, name);
                    match (&scope, classes.last_mut()) {
                        (ClassScope::Open, Some(class)) => {
                            if let Some(op) = self.parse_method(&block, &name, &location, diagnostics) {
                                debug!(
                                    "Parsed operation {} {} (returns {})",
                                    op.method, op.operation.operationId, return_type
                                );
                                class.operations.push(op);
                            }
                        }
                        (ClassScope::Skipped, _) => {
                            debug!("{}: method of a skipped class ignored", location);
                        }
                        _ => diagnostics.warn(
                            DiagnosticKind::OrphanMethod,
                            &location,
                            "method block appears before any @Api class and was skipped",
                        ),
                    }
                }
            }
        }

        classes
    }

    fn parse_class(
        &self,
        block: &AnnotationBlock,
        name: &str,
        location: &str,
        diagnostics: &mut Diagnostics,
    ) -> Option<ClassResource> {
        let calls = block.tag_calls();
        report_incomplete(&calls, location, diagnostics);

        let Some(api_call) = find_tag(&calls, ApiAttrs::TAG) else {
            diagnostics.error(
                DiagnosticKind::MissingApiTag,
                location,
                format!("class {} has no @Api tag and was skipped", name),
            );
            return None;
        };
        let api = ApiAttrs::parse(api_call.args.unwrap_or_default());
        if api.hidden {
            debug!("{}: class {} is hidden", location, name);
            return None;
        }

        let path = path_of(&calls)
            .or_else(|| api.value.clone())
            .unwrap_or_default();
        let tags = match api.tags {
            Some(tags) if !tags.is_empty() => tags,
            _ => {
                let tag = api.value.as_deref().unwrap_or(&path).trim().trim_matches('/');
                if tag.is_empty() {
                    Vec::new()
                } else {
                    vec![tag.to_string()]
                }
            }
        };

        debug!("Parsed class {} at '{}' with tags {:?}", name, path, tags);
        Some(ClassResource {
            name: name.to_string(),
            path,
            tags,
            produces: api.produces.filter(|p| !p.is_empty()),
            consumes: api.consumes.filter(|c| !c.is_empty()),
            operations: Vec::new(),
        })
    }

    fn parse_method(
        &self,
        block: &AnnotationBlock,
        name: &str,
        location: &str,
        diagnostics: &mut Diagnostics,
    ) -> Option<ParsedOperation> {
        let calls = block.tag_calls();

        if self.production && find_tag(&calls, INTERNAL_MARKER).is_some() {
            debug!("{}: @Internal method left out of production run", location);
            return None;
        }

        let Some(operation_call) = find_tag(&calls, OperationAttrs::TAG) else {
            diagnostics.warn(
                DiagnosticKind::MissingOperationTag,
                location,
                "method block has no @ApiOperation and was skipped",
            );
            return None;
        };
        report_incomplete(&calls, location, diagnostics);

        let attrs = OperationAttrs::parse(operation_call.args.unwrap_or_default());
        if attrs.hidden {
            debug!("{}: operation is hidden", location);
            return None;
        }
        let method = resolve_method(&calls, attrs.http_method.as_deref(), location, diagnostics)?;

        let responses: Vec<ResponseAttrs> = find_tag(&calls, RESPONSES_TAG)
            .and_then(|call| call.args)
            .map(parse_aggregate)
            .unwrap_or_default();
        let params: Vec<ImplicitParamAttrs> = find_tag(&calls, IMPLICIT_PARAMS_TAG)
            .and_then(|call| call.args)
            .map(parse_aggregate)
            .unwrap_or_default();

        Some(ParsedOperation {
            path: path_of(&calls),
            method,
            operation: build_operation(name, attrs, responses, params, location, diagnostics),
        })
    }
}

fn find_tag<'c, 'a>(calls: &'c [TagCall<'a>], name: &str) -> Option<&'c TagCall<'a>> {
    calls.iter().find(|call| call.name == name)
}

fn path_of(calls: &[TagCall<'_>]) -> Option<String> {
    find_tag(calls, PathAttrs::TAG)
        .and_then(|call| call.args)
        .and_then(|args| PathAttrs::parse(args).value)
}

fn report_incomplete(calls: &[TagCall<'_>], location: &str, diagnostics: &mut Diagnostics) {
    for call in calls.iter().filter(|call| !call.complete) {
        diagnostics.warn(
            DiagnosticKind::MalformedTag,
            location,
            format!("@{} is missing its closing parenthesis", call.name),
        );
    }
}

/// `httpMethod` wins over a verb marker such as `@GET`; either alone is enough.
fn resolve_method(
    calls: &[TagCall<'_>],
    http_method: Option<&str>,
    location: &str,
    diagnostics: &mut Diagnostics,
) -> Option<HttpMethod> {
    let marker = calls
        .iter()
        .filter(|call| call.args.is_none())
        .find_map(|call| HttpMethod::parse(call.name));

    let declared = match http_method {
        Some(raw) => match HttpMethod::parse(raw) {
            Some(method) => Some(method),
            None => {
                diagnostics.warn(
                    DiagnosticKind::MissingVerb,
                    location,
                    format!("unknown httpMethod '{}'", raw),
                );
                None
            }
        },
        None => None,
    };

    match (declared, marker) {
        (Some(declared), Some(marker)) if declared != marker => {
            diagnostics.warn(
                DiagnosticKind::VerbMismatch,
                location,
                format!("httpMethod {} overrides marker @{}", declared, marker),
            );
            Some(declared)
        }
        (Some(method), _) | (None, Some(method)) => Some(method),
        (None, None) => {
            diagnostics.warn(
                DiagnosticKind::MissingVerb,
                location,
                "operation has no HTTP verb and was skipped",
            );
            None
        }
    }
}
