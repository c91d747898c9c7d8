use super::table;
use super::utils;
use colored::Colorize;
use pkgmap::cache::CacheStore;
use pkgmap::config::{Paths, Settings};
use pkgmap::homebrew::{BrewCli, HomebrewLookup};
use pkgmap::names::NameMappings;
use pkgmap::repology::RepologyClient;
use pkgmap::scheduler::{RefreshScheduler, Segment};

pub async fn refresh(
    paths: &Paths,
    settings: &Settings,
    segment: Segment,
    regenerate: bool,
) -> anyhow::Result<()> {
    let mut store = CacheStore::load(&paths.cache)?;
    let names = NameMappings::load(&paths.name_mappings)?;
    let packages = utils::load_packages(paths)?;

    let repology = RepologyClient::new(settings)?;
    let brew = BrewCli::new(settings.brew_program.clone());
    if !brew.available() {
        println!(
            "{} {} not found, skipping Homebrew metadata",
            "⚠".yellow(),
            settings.brew_program.bold()
        );
    }

    println!(
        "{} Refreshing segment {} of {} packages",
        "==>".bold().green(),
        segment.to_string().bold(),
        packages.len().to_string().bold()
    );

    let scheduler = RefreshScheduler::new(&repology, &brew, &names, settings.rate_limit_delay)
        .with_progress(utils::progress_bar());
    let summary = scheduler
        .run(&mut store, &packages, segment, &paths.plan())
        .await?;

    let mark = if summary.soft_errors > 0 {
        "⚠".yellow().bold()
    } else {
        "✓".green().bold()
    };
    println!("{} {} of {} packages: {}", mark, summary.processed(), summary.selected, summary);
    if !summary.failed.is_empty() {
        println!(
            "  Will retry next cycle: {}",
            summary.failed.join(", ").dimmed()
        );
    }

    if regenerate {
        table::generate(paths, &paths.universe, None)?;
    }
    Ok(())
}
