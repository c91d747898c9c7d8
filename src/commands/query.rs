//! Package lookup commands

use super::utils;
use colored::Colorize;
use pkgmap::cache::{CacheStore, now_timestamp};
use pkgmap::config::{Paths, Settings};
use pkgmap::homebrew::{self, AugmentOutcome, BrewCli};
use pkgmap::names::NameMappings;
use pkgmap::platform::EcosystemKey;
use pkgmap::record::PackageRecord;
use pkgmap::repology::{QueryOutcome, RepologyClient};

pub async fn query(
    paths: &Paths,
    settings: &Settings,
    packages: &[String],
    force: bool,
) -> anyhow::Result<()> {
    let mut store = CacheStore::load(&paths.cache)?;
    let names = NameMappings::load(&paths.name_mappings)?;
    let repology = RepologyClient::new(settings)?;
    let brew = BrewCli::new(settings.brew_program.clone());

    let mut needs_delay = false;
    for (i, name) in packages.iter().enumerate() {
        if i > 0 {
            println!();
        }
        if needs_delay && !settings.rate_limit_delay.is_zero() {
            tokio::time::sleep(settings.rate_limit_delay).await;
        }

        let spinner = utils::spinner(format!("Looking up {}...", name));
        let outcome = if force {
            let evicted = store.evict(&names.cache_keys(name));
            let outcome = repology.fetch(name, &names, &mut store).await?;
            if matches!(outcome, QueryOutcome::SoftError(_)) {
                store.restore(evicted);
            }
            outcome
        } else {
            repology.query(name, &names, &mut store).await?
        };
        needs_delay = !matches!(outcome, QueryOutcome::Cached(_));

        let augmented = match &outcome {
            QueryOutcome::Found(_) | QueryOutcome::NotFound(_) => {
                Some(homebrew::augment(&brew, name, &names, &mut store)?)
            }
            _ => None,
        };
        spinner.finish_and_clear();

        let source = match &outcome {
            QueryOutcome::Cached(_) => "cached".dimmed(),
            QueryOutcome::Found(_) => "fetched".green(),
            QueryOutcome::NotFound(_) => "not found".yellow(),
            QueryOutcome::SoftError(_) => "error".red(),
        };
        println!("{} {} ({})", "==>".bold().green(), name.bold(), source);

        if let QueryOutcome::SoftError(reason) = &outcome {
            println!("  {} {}", "✗".red(), reason);
            continue;
        }
        if let Some(AugmentOutcome::Failed(reason)) = &augmented {
            println!("  {} Homebrew: {}", "⚠".yellow(), reason);
        }

        // Show the stored record, which includes any Homebrew augmentation
        if let Some((key, record)) = names.lookup(&store, name) {
            if key != *name {
                println!("{}: {}", "Cached as".bold(), key.cyan());
            }
            print_record(record);
        }
    }

    Ok(())
}

fn print_record(record: &PackageRecord) {
    if let Some(desc) = &record.description {
        println!("{}", desc);
    }
    if record.is_negative() {
        println!("{}", "Not known to Repology".dimmed());
    }
    let age = record.age(now_timestamp());
    let refreshed = if age.is_finite() {
        format!("{} ago", utils::format_age(age))
    } else {
        "never".to_string()
    };
    println!("{}: {}", "Refreshed".bold(), refreshed);

    for key in EcosystemKey::ALL {
        let available = record.is_available(key);
        let mark = if available { "✓".green() } else { "✗".dimmed() };
        let name = record.package_name(key).unwrap_or("-");
        println!("  {} {:<14} {}", mark, key.as_str(), name);
    }

    if let Some(meta) = &record.homebrew_metadata {
        let kind = if meta.is_cask { "cask" } else { "formula" };
        let mut platforms = Vec::new();
        if meta.supports_darwin {
            platforms.push("macOS");
        }
        if meta.supports_linux {
            platforms.push("Linux");
        }
        println!(
            "{}: {} ({})",
            "Homebrew".bold(),
            kind,
            if platforms.is_empty() {
                "no platforms".to_string()
            } else {
                platforms.join(", ")
            }
        );
    }
}
