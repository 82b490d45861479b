use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::{debug, info};
use std::path::PathBuf;

use swagger_scan::config::Config;
use swagger_scan::diagnostics::Diagnostics;
use swagger_scan::discovery::DEFAULT_EXTENSION;
use swagger_scan::generator::generate;
use swagger_scan::project::{build_document, RunOptions};

/// Generates Swagger 2.0 documents from `/*api ... */` annotation comments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct ProjectArgs {
    /// Project configuration file (YAML, or JSON with a .json extension)
    #[arg(short, long)]
    config: PathBuf,

    /// Extra directories to scan for annotated resources, comma separated
    #[arg(short, long)]
    dir: Option<String>,

    /// Leave out @Internal methods and non-production entries
    #[arg(long)]
    production: bool,

    /// File extensions to scan, comma separated
    #[arg(long, default_value = DEFAULT_EXTENSION)]
    ext: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate the Swagger document
    Generate {
        #[command(flatten)]
        project: ProjectArgs,

        /// Output directory for generated files
        #[arg(short, long, default_value = "./docs")]
        output: String,

        /// Output types to generate (json,yaml)
        #[arg(long = "ot", default_value = "json,yaml")]
        output_types: String,
    },

    /// Run the pipeline and report diagnostics without writing output
    Check {
        #[command(flatten)]
        project: ProjectArgs,
    },
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn run_project(project: &ProjectArgs, diagnostics: &mut Diagnostics) -> Result<swagger_scan::Swagger> {
    let config = Config::load(&project.config)
        .context(format!("Failed to load configuration: {:?}", project.config))?;

    let options = RunOptions {
        production: project.production,
        scan_dirs: project
            .dir
            .as_deref()
            .map(split_list)
            .unwrap_or_default()
            .into_iter()
            .map(PathBuf::from)
            .collect(),
        extensions: split_list(&project.ext),
    };
    debug!("Run options: {:?}", options);

    let document = build_document(&config, &options, diagnostics)?;
    Ok(document)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let env = Env::default().filter_or("RUST_LOG", if cli.verbose { "debug" } else { "info" });
    env_logger::init_from_env(env);

    debug!("Starting swagger-scan...");
    let mut diagnostics = Diagnostics::new();

    match &cli.command {
        Commands::Generate { project, output, output_types } => {
            let output_types = split_list(output_types);
            let document = run_project(project, &mut diagnostics)?;

            debug!("Output directory: {}", output);
            generate(&document, output, &output_types)?;

            info!(
                "Swagger documentation generated with {} diagnostic(s)",
                diagnostics.len()
            );
        }
        Commands::Check { project } => {
            run_project(project, &mut diagnostics)?;

            for diagnostic in diagnostics.entries() {
                println!("{}", diagnostic);
            }
            if diagnostics.has_errors() {
                bail!("{} diagnostic(s) reported, including errors", diagnostics.len());
            }
            info!("Check passed with {} warning(s)", diagnostics.len());
        }
    }

    Ok(())
}
