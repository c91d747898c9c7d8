//! Mapping table generation and validation

use super::utils::{self, Inputs};
use colored::Colorize;
use pkgmap::cache::write_atomic;
use pkgmap::config::Paths;
use pkgmap::mapping::{MappingTable, MappingTableGenerator};
use pkgmap::platform::{OsFamily, PlatformDescriptor};
use pkgmap::validate::{self, ValidationReport};
use std::path::Path;

/// Render the table and run the roundtrip checks on it.
fn build(inputs: &Inputs, target: Option<OsFamily>) -> (String, ValidationReport) {
    let mut generator = MappingTableGenerator::new(&inputs.store, &inputs.names, &inputs.overrides);
    if let Some(family) = target {
        generator = generator.for_platform(&PlatformDescriptor::new(family));
    }

    let text = generator.render(&inputs.packages);
    let report = validate::validate(&text, &inputs.required(), || {
        generator.render(&inputs.packages)
    });
    (text, report)
}

fn print_problems(report: &ValidationReport) {
    for problem in &report.problems {
        println!("  {} {}", "✗".red(), problem);
    }
}

/// Sections that differ between the committed table and a fresh one.
fn drift(committed: &str, fresh: &str) -> anyhow::Result<Vec<String>> {
    if committed == fresh {
        return Ok(Vec::new());
    }
    let old = MappingTable::parse(committed)?;
    let new = MappingTable::parse(fresh)?;

    let mut changed: Vec<String> = new
        .iter()
        .filter(|(name, entry)| old.get(name) != Some(*entry))
        .map(|(name, _)| name.to_string())
        .collect();
    changed.extend(
        old.iter()
            .filter(|(name, _)| !new.contains(name))
            .map(|(name, _)| format!("{} (removed)", name)),
    );
    if changed.is_empty() {
        // Same data, different layout
        changed.push("formatting only".to_string());
    }
    Ok(changed)
}

pub fn generate(paths: &Paths, output: &Path, target: Option<OsFamily>) -> anyhow::Result<()> {
    let inputs = Inputs::load(paths)?;
    let spinner = utils::spinner("Generating mapping table...");
    let (text, report) = build(&inputs, target);
    spinner.finish_and_clear();

    if !report.is_ok() {
        println!("{} Generated table failed validation:", "✗".red().bold());
        print_problems(&report);
    }
    let report = report.into_result()?;

    let unchanged = std::fs::read_to_string(output)
        .map(|existing| existing == text)
        .unwrap_or(false);
    if unchanged {
        println!(
            "{} {} is up to date ({} sections)",
            "✓".green(),
            output.display().to_string().cyan(),
            report.sections
        );
        return Ok(());
    }

    write_atomic(output, text.as_bytes())?;
    println!(
        "{} Wrote {} sections to {}",
        "✓".green().bold(),
        report.sections.to_string().bold(),
        output.display().to_string().cyan()
    );
    Ok(())
}

pub fn validate(paths: &Paths, strict: bool) -> anyhow::Result<()> {
    let inputs = Inputs::load(paths)?;
    let (text, report) = build(&inputs, None);

    println!("{}", "==> Mapping table".bold().green());
    println!("{}: {}", "Sections".bold(), report.sections.to_string().cyan());
    println!("{}: {}", "Cache entries".bold(), inputs.store.len().to_string().cyan());

    if !report.is_ok() {
        println!("{}: {}", "Roundtrip".bold(), "failed".red());
        print_problems(&report);
    }
    report.into_result()?;
    println!("{}: {}", "Roundtrip".bold(), "ok".green());

    let committed = std::fs::read_to_string(&paths.universe)?;
    let changed = match drift(&committed, &text) {
        Ok(changed) => changed,
        Err(e) => vec![format!("committed table is unreadable: {}", e)],
    };

    if changed.is_empty() {
        println!("{}: {}", "Drift".bold(), "none".green());
        return Ok(());
    }

    println!(
        "{}: {} section(s) would change",
        "Drift".bold(),
        changed.len().to_string().yellow()
    );
    for name in &changed {
        println!("  {} {}", "~".yellow(), name);
    }
    println!();
    println!("Run {} to update it", "pkgmap generate".dimmed());

    if strict {
        anyhow::bail!(
            "{} is out of date with the cache",
            paths.universe.display()
        );
    }
    Ok(())
}
