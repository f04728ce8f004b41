//! Ramo command line.
//!
//! Seeds sites into an in-memory store and validates documents against the
//! standard block library.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ramo_kernel::content::library::standard_registry;
use ramo_kernel::content::{codec, validate, validate_for_page_type};
use ramo_kernel::seed::{self, SiteDefinition};
use ramo_kernel::{Config, PageService, ValidationMode};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Seed a site in memory and print its page tree.
    Tree {
        /// Site definition (YAML). Defaults to RAMO_SITE_FILE, then the
        /// built-in portfolio site.
        site: Option<PathBuf>,
    },
    /// Validate a wire-format JSON document against the standard library.
    Validate {
        document: PathBuf,
        /// Also apply this page type's block rules.
        #[arg(long)]
        page_type: Option<String>,
        /// Let unknown kinds and undeclared fields through.
        #[arg(long)]
        lenient: bool,
    },
    /// Seed a site in memory and print its page and revision records.
    Export {
        /// Site definition (YAML), as for `tree`.
        site: Option<PathBuf>,
    },
}

fn main() -> Result<ExitCode> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let config = Config::from_env().context("failed to load configuration")?;
    let cli = Cli::parse();

    match cli.command {
        Command::Tree { site } => {
            let service = seed_service(&config, site)?;
            print_tree(&service);
            Ok(ExitCode::SUCCESS)
        }
        Command::Validate {
            document,
            page_type,
            lenient,
        } => run_validate(&document, page_type.as_deref(), lenient),
        Command::Export { site } => {
            let service = seed_service(&config, site)?;
            let json = serde_json::to_string_pretty(&service.export())
                .context("failed to serialize export")?;
            println!("{json}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_site(config: &Config, site: Option<PathBuf>) -> Result<SiteDefinition> {
    match site.or_else(|| config.site_file.clone()) {
        Some(path) => seed::load_site(&path),
        None => seed::portfolio_site(),
    }
}

fn seed_service(config: &Config, site: Option<PathBuf>) -> Result<PageService> {
    let registry = standard_registry().context("failed to build block library")?;
    let service = PageService::with_config(registry, config);
    let site = load_site(config, site)?;
    seed::apply_site(&service, &site)?;
    Ok(service)
}

fn print_tree(service: &PageService) {
    for page in service.pages() {
        let indent = "  ".repeat(page.depth.saturating_sub(1));
        let access = if page.members_only { " members-only" } else { "" };
        println!(
            "{:<24} {indent}{} [{}] {}{access}",
            page.path, page.slug, page.type_tag, page.state
        );
    }
}

fn run_validate(path: &Path, page_type: Option<&str>, lenient: bool) -> Result<ExitCode> {
    let registry = standard_registry().context("failed to build block library")?;
    let mode = if lenient {
        ValidationMode::Lenient
    } else {
        ValidationMode::Strict
    };

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let document = codec::decode_str(&text, &registry, mode)
        .with_context(|| format!("failed to decode {}", path.display()))?;

    let result = match page_type {
        Some(tag) => {
            let schema = registry
                .page_type(tag)
                .with_context(|| format!("unknown page type '{tag}'"))?;
            validate_for_page_type(&document, &registry, &schema, mode)
        }
        None => validate(&document, &registry, mode),
    };

    match result {
        Ok(()) => {
            info!(blocks = document.len(), %mode, "document is valid");
            println!("ok: {} block(s)", document.len());
            Ok(ExitCode::SUCCESS)
        }
        Err(report) => {
            for violation in &report {
                println!("{violation}");
            }
            Ok(ExitCode::FAILURE)
        }
    }
}
