mod colors;
mod commands;

use clap::{Args, CommandFactory, Parser, Subcommand};
use colors::ColorChoice;
use pkgmap::config::{self, Paths, Settings};
use pkgmap::platform::OsFamily;
use pkgmap::scheduler::Segment;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "pkgmap")]
#[command(author, version, about = "Cross-distro package mapping backed by Repology and Homebrew", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// When to use colors
    #[arg(long, value_enum, default_value_t = ColorChoice::Auto, global = true)]
    color: ColorChoice,

    #[command(flatten)]
    files: FileArgs,
}

#[derive(Args)]
struct FileArgs {
    /// Package cache file
    #[arg(long, env = "PKGMAP_CACHE", default_value = config::DEFAULT_CACHE_FILE, global = true)]
    cache: PathBuf,

    /// Homebrew-to-Repology name mapping file
    #[arg(long, env = "PKGMAP_NAME_MAPPINGS", default_value = config::DEFAULT_NAME_MAPPINGS_FILE, global = true)]
    name_mappings: PathBuf,

    /// Mapping table whose sections define the package universe
    #[arg(long, env = "PKGMAP_UNIVERSE", default_value = config::DEFAULT_UNIVERSE_FILE, global = true)]
    universe: PathBuf,

    /// Custom install overrides
    #[arg(long, env = "PKGMAP_OVERRIDES", default_value = config::DEFAULT_OVERRIDES_FILE, global = true)]
    overrides: PathBuf,

    /// Extra package list (Brewfile or one name per line); repeatable
    #[arg(long = "package-list", global = true)]
    package_lists: Vec<PathBuf>,

    /// Repology base URL
    #[arg(long, env = "PKGMAP_REPOLOGY_URL", default_value = config::DEFAULT_REPOLOGY_URL, global = true)]
    repology_url: String,
}

impl FileArgs {
    fn paths(&self) -> Paths {
        Paths {
            cache: self.cache.clone(),
            name_mappings: self.name_mappings.clone(),
            universe: self.universe.clone(),
            overrides: self.overrides.clone(),
            package_lists: self.package_lists.clone(),
        }
    }

    fn settings(&self) -> Settings {
        Settings {
            repology_url: self.repology_url.clone(),
            ..Settings::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh one day's segment of the cache (0-6) or everything (all)
    Refresh {
        /// Segment to refresh: 0-6 or "all"
        segment: Segment,

        /// Delay between packages in milliseconds (default 2100)
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Don't regenerate the mapping table afterwards
        #[arg(long)]
        no_generate: bool,
    },

    /// Check the mapping table against the cache without network access
    Validate {
        /// Treat drift from the committed table as a failure
        #[arg(long)]
        strict: bool,
    },

    /// Regenerate, validate, and write the mapping table
    Generate {
        /// Output file (defaults to the universe file)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only emit fields for this platform family
        #[arg(long, value_enum)]
        target: Option<OsFamily>,
    },

    /// Look up specific packages
    Query {
        /// Canonical package names
        #[arg(required = true)]
        names: Vec<String>,

        /// Ignore fresh cache entries
        #[arg(long)]
        force: bool,
    },

    /// Inspect or maintain the package cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Show the detected platform
    Platform,

    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show cache statistics
    Stats {
        /// Age after which an entry counts as expired
        #[arg(long, default_value_t = 7)]
        ttl_days: u64,
    },

    /// Remove expired entries
    Prune {
        #[arg(long, default_value_t = 7)]
        ttl_days: u64,

        /// Also remove negative entries so they are retried
        #[arg(long)]
        remove_negative: bool,
    },

    /// Delete the cache file
    Clear,

    /// Remove specific entries (canonical and mapped names)
    Evict {
        #[arg(required = true)]
        names: Vec<String>,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn days(n: u64) -> Duration {
    Duration::from_secs(n * 24 * 60 * 60)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    colors::init_colors(cli.color);

    let paths = cli.files.paths();
    let mut settings = cli.files.settings();

    match cli.command {
        Commands::Refresh {
            segment,
            delay_ms,
            no_generate,
        } => {
            if let Some(ms) = delay_ms {
                settings.rate_limit_delay = Duration::from_millis(ms);
            }
            commands::refresh(&paths, &settings, segment, !no_generate).await?;
        }
        Commands::Validate { strict } => {
            commands::validate(&paths, strict)?;
        }
        Commands::Generate { output, target } => {
            let output = output.unwrap_or_else(|| paths.universe.clone());
            commands::generate(&paths, &output, target)?;
        }
        Commands::Query { names, force } => {
            commands::query(&paths, &settings, &names, force).await?;
        }
        Commands::Cache { action } => match action {
            CacheAction::Stats { ttl_days } => commands::cache_stats(&paths, days(ttl_days))?,
            CacheAction::Prune {
                ttl_days,
                remove_negative,
            } => commands::cache_prune(&paths, days(ttl_days), remove_negative)?,
            CacheAction::Clear => commands::cache_clear(&paths)?,
            CacheAction::Evict { names } => commands::cache_evict(&paths, &names)?,
        },
        Commands::Platform => commands::platform(),
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "pkgmap", &mut std::io::stdout());
        }
    }

    Ok(())
}
