/// Color support with NO_COLOR and CLICOLOR environment variable handling
///
/// Implements the NO_COLOR standard (https://no-color.org/) and traditional
/// CLICOLOR conventions, with `--color` taking precedence over both.
///
/// **Environment Variables** (only consulted for `--color auto`):
/// - `NO_COLOR`: If set (to any value), disable colors
/// - `CLICOLOR`: If set to 0, disable colors
/// - `CLICOLOR_FORCE`: If set to non-zero, force colors even when not a TTY
use colored::control;

/// Value of the `--color` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Follow the environment and TTY detection
    #[default]
    Auto,
    Always,
    Never,
}

/// Configure color output for the whole program. Call once, early in main().
pub fn init_colors(choice: ColorChoice) {
    let enabled = match choice {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => colors_from_env(),
    };
    control::set_override(enabled);
}

fn colors_from_env() -> bool {
    // NO_COLOR takes precedence over everything
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }

    if std::env::var("CLICOLOR_FORCE")
        .map(|v| v != "0")
        .unwrap_or(false)
    {
        return true;
    }

    if std::env::var("CLICOLOR").map(|v| v == "0").unwrap_or(false) {
        return false;
    }

    std::io::IsTerminal::is_terminal(&std::io::stdout())
}
