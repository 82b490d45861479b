pub mod attributes;
pub mod config;
pub mod converter;
pub mod diagnostics;
pub mod discovery;
pub mod error;
pub mod generator;
pub mod lexer;
pub mod models;
pub mod parser;
pub mod paths;
pub mod project;
pub mod tokenizer;

pub use config::Config;
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use error::{Error, Result};
pub use models::Swagger;
pub use project::{build_document, RunOptions};
