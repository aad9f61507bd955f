use anyhow::Result;
use clap::{Parser, Subcommand};
use postshell::config::{Config, Overrides};
use postshell::site::{build_site, clean_site, Profile};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "postshell")]
#[command(about = "Builds a directory of markdown posts into HTML pages")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the project file (defaults to the nearest postshell.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of worker threads (0 = one per CPU)
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render every post into a standalone HTML page
    Build {
        /// Content directory (overrides the project file)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Write the converter output without the document shell
        #[arg(long)]
        raw: bool,
    },

    /// Build, then point canonical links at the local content directory
    /// (needs canonical_url in postshell.yaml or --canonical-url)
    Local {
        /// Content directory (overrides the project file)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Canonical URL prefix to rewrite (overrides the project file)
        #[arg(long)]
        canonical_url: Option<String>,
    },

    /// Delete every rendered page
    Clean {
        /// Content directory (overrides the project file)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        true => EnvFilter::new("debug"),
        false => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info")),
    };
    fmt().with_env_filter(filter).with_target(false).init();

    let config = match &cli.config {
        Some(path) => Config::from_project_file(path)?,
        None => Config::from_directory(&std::env::current_dir()?)?,
    };

    let (overrides, profile) = match cli.command {
        Commands::Build { dir, raw } => (
            Overrides {
                source_directory: dir,
                ..Overrides::default()
            },
            Some(match raw {
                true => Profile::Raw,
                false => Profile::Deploy,
            }),
        ),
        Commands::Local { dir, canonical_url } => (
            Overrides {
                source_directory: dir,
                canonical_url,
                ..Overrides::default()
            },
            Some(Profile::Local),
        ),
        Commands::Clean { dir } => (
            Overrides {
                source_directory: dir,
                ..Overrides::default()
            },
            None,
        ),
    };
    let config = config.with_overrides(Overrides {
        threads: cli.threads,
        ..overrides
    });

    match profile {
        Some(profile) => {
            let built = build_site(&config, profile)?;
            tracing::info!(
                pages = built.len(),
                profile = ?profile,
                "site built"
            );
        }
        None => {
            clean_site(&config)?;
        }
    }
    Ok(())
}
