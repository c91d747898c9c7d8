use colored::Colorize;
use pkgmap::homebrew::{BrewCli, HomebrewLookup};
use pkgmap::platform::PlatformDescriptor;

pub fn platform() {
    let platform = PlatformDescriptor::detect();

    println!("{}", "==> Platform".bold().green());
    println!("{}: {}", "Family".bold(), platform.family.to_string().cyan());
    if let Some(id) = &platform.distro_id {
        println!("{}: {}", "Distro".bold(), id.cyan());
    }

    let ecosystems: Vec<&str> = platform.ecosystems().iter().map(|k| k.as_str()).collect();
    println!("{}: {}", "Ecosystems".bold(), ecosystems.join(", "));

    let brew = if BrewCli::default().available() {
        "available".green()
    } else {
        "not installed".dimmed()
    };
    println!("{}: {}", "Homebrew".bold(), brew);
}
