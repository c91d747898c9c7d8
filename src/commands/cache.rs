use super::utils::format_size;
use colored::Colorize;
use pkgmap::cache::{CacheStore, now_timestamp};
use pkgmap::config::Paths;
use pkgmap::names::NameMappings;
use pkgmap::scheduler::CyclePlan;
use std::time::Duration;

pub fn cache_stats(paths: &Paths, ttl: Duration) -> anyhow::Result<()> {
    let store = CacheStore::load(&paths.cache)?;
    let stats = store.stats(now_timestamp(), ttl);

    println!("{}", "==> Package Cache".bold().green());
    println!();
    println!(
        "{}: {}",
        "Location".bold(),
        paths.cache.display().to_string().cyan()
    );

    let Some(size) = stats.file_size else {
        println!("{}: {}", "Status".bold(), "Empty".dimmed());
        return Ok(());
    };

    println!("{}: {}", "Size".bold(), format_size(size).cyan());
    println!("{}: {}", "Entries".bold(), stats.total.to_string().cyan());
    println!("{}: {}", "Fresh".bold(), stats.fresh.to_string().green());
    println!("{}: {}", "Expired".bold(), stats.expired.to_string().yellow());
    if stats.never_refreshed > 0 {
        println!(
            "{}: {}",
            "No timestamp".bold(),
            stats.never_refreshed.to_string().yellow()
        );
    }
    println!("{}: {}", "Not found".bold(), stats.negative.to_string().dimmed());
    println!(
        "{}: {} packages/day",
        "Refresh quota".bold(),
        stats.daily_quota.to_string().cyan()
    );

    if let Some(plan) = CyclePlan::load(&paths.plan())? {
        println!(
            "{}: {} packages, started {}",
            "Cycle plan".bold(),
            plan.order.len(),
            format_timestamp(plan.created).dimmed()
        );
    }

    if stats.expired > 0 {
        println!();
        println!(
            "Run {} to drop expired entries",
            "pkgmap cache prune".dimmed()
        );
    }
    Ok(())
}

pub fn cache_prune(paths: &Paths, ttl: Duration, remove_negative: bool) -> anyhow::Result<()> {
    let mut store = CacheStore::load(&paths.cache)?;
    let report = store.prune(now_timestamp(), ttl, remove_negative)?;

    if report.removed() == 0 {
        println!("{} Nothing to prune ({} entries)", "✓".green(), report.kept);
        return Ok(());
    }

    println!(
        "{} Removed {} expired and {} negative entries, kept {}",
        "✓".green().bold(),
        report.expired_removed.to_string().bold(),
        report.negative_removed.to_string().bold(),
        report.kept
    );
    Ok(())
}

pub fn cache_clear(paths: &Paths) -> anyhow::Result<()> {
    let mut store = CacheStore::load(&paths.cache)?;
    let count = store.len();
    store.clear()?;
    CyclePlan::remove(&paths.plan())?;

    println!(
        "{} Cleared {} entries from {}",
        "✓".green().bold(),
        count.to_string().bold(),
        paths.cache.display()
    );
    Ok(())
}

pub fn cache_evict(paths: &Paths, packages: &[String]) -> anyhow::Result<()> {
    let mut store = CacheStore::load(&paths.cache)?;
    let names = NameMappings::load(&paths.name_mappings)?;

    for package in packages {
        let mut removed = Vec::new();
        for key in names.cache_keys(package) {
            if store.remove(&key)? {
                removed.push(key);
            }
        }

        if removed.is_empty() {
            println!("{} {} is not cached", "○".dimmed(), package.bold());
        } else {
            println!(
                "{} Evicted {} ({})",
                "✓".green(),
                package.bold(),
                removed.join(", ").dimmed()
            );
        }
    }
    Ok(())
}

fn format_timestamp(ts: f64) -> String {
    chrono::DateTime::from_timestamp(ts as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
