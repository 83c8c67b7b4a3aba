//! Lad configuration CLI
//!
//! Entry point for the `lad-config` command-line tool.

use clap::{Parser, Subcommand};
use lad_config::{logger, AppConfig, ConfigBuilder, ConfigError, EnvironmentMap, OverlaySet};
use std::path::PathBuf;
use std::process;
use tracing::error;

#[derive(Parser)]
#[command(name = "lad-config")]
#[command(about = "Inspect the composed Lad application configuration", version)]
struct Cli {
    /// Environment overlay to apply (default: $LAD_ENV or development)
    #[arg(long, short = 'e', global = true)]
    env: Option<String>,

    /// Directory with <environment>.toml overlay files
    #[arg(long, global = true)]
    overlays: Option<PathBuf>,

    /// Directory relative configuration paths resolve under
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Log level when RUST_LOG is unset (default: the configured logger.level)
    #[arg(long, global = true, value_parser = log_level)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration with secrets redacted
    Show {
        /// Print only the value at this dot-separated path
        #[arg(long, short = 'p')]
        path: Option<String>,

        /// Print the provenance record instead of the tree
        #[arg(long)]
        provenance: bool,
    },

    /// Translate a phrase key
    Translate {
        /// Phrase key
        key: String,

        /// Target locale (default: the configured default locale)
        #[arg(long, short = 'l')]
        locale: Option<String>,

        /// Positional arguments for %s / %d placeholders
        args: Vec<String>,
    },

    /// Print SEO metadata for a page
    Meta {
        /// Page key or path (default: every page)
        page: Option<String>,

        /// Render with templates translated into this locale
        #[arg(long, short = 'l')]
        locale: Option<String>,
    },
}

fn main() {
    // A missing .env file is normal
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match load(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration failed");
            eprintln!("Configuration error: {}", e);
            process::exit(e.exit_code());
        }
    };

    match cli.command {
        Commands::Show { path, provenance } => run_show(&config, path.as_deref(), provenance),
        Commands::Translate { key, locale, args } => {
            run_translate(&config, &key, locale.as_deref(), &args)
        }
        Commands::Meta { page, locale } => run_meta(&config, page.as_deref(), locale.as_deref()),
    }
}

/// `--log-level` accepts what the logger accepts
fn log_level(value: &str) -> Result<String, String> {
    logger::parse_level(value)
        .map(|_| value.to_string())
        .map_err(|e| e.to_string())
}

fn load(cli: &Cli) -> Result<AppConfig, ConfigError> {
    let mut env = EnvironmentMap::from_process();
    if let Some(environment) = &cli.env {
        env = env.with(lad_config::ENVIRONMENT_VAR, environment.as_str());
    }

    let mut builder = ConfigBuilder::from_env(env).root(&cli.root);
    if let Some(dir) = &cli.overlays {
        builder = builder.overlays(OverlaySet::load_dir(dir)?);
    }

    // Logging must be up before the stages run, so the level comes from
    // the flag or the pre-augmentation tree
    let level = match &cli.log_level {
        Some(level) => level.clone(),
        None => builder
            .compose()?
            .tree
            .get("logger")
            .and_then(|l| l.get("level"))
            .and_then(|l| l.as_str())
            .unwrap_or("info")
            .to_string(),
    };
    logger::init(&level)?;

    builder.build()
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn run_show(config: &AppConfig, path: Option<&str>, provenance: bool) {
    if provenance {
        print_json(config.provenance());
        return;
    }

    let tree = config.redacted();
    match path {
        None => print_json(&tree),
        Some(path) => match lad_config::config::path::lookup(&tree, path) {
            Some(value) => print_json(value),
            None => {
                eprintln!("No value at '{}'", path);
                process::exit(1);
            }
        },
    }
}

fn run_translate(config: &AppConfig, key: &str, locale: Option<&str>, args: &[String]) {
    let locale = locale.unwrap_or_else(|| config.localizer().default_locale());
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    println!("{}", config.translate(key, locale, &args));
}

fn run_meta(config: &AppConfig, page: Option<&str>, locale: Option<&str>) {
    match (page, locale) {
        (Some(page), Some(locale)) => print_json(&config.page_meta_localized(page, locale)),
        (Some(page), None) => print_json(config.page_meta(page)),
        (None, Some(locale)) => {
            let pages: std::collections::BTreeMap<&str, _> = config
                .meta()
                .page_keys()
                .map(|key| (key, config.page_meta_localized(key, locale)))
                .collect();
            print_json(&pages);
        }
        (None, None) => print_json(&config.meta().to_value()),
    }
}
