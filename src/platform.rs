//! Platform detection and the ecosystem keys each OS family cares about.
//!
//! The mapping table covers seven package ecosystems. A given machine only
//! installs from a subset of them:
//! - **macOS**: Homebrew (formulae and casks)
//! - **Arch-like**: official repos, the AUR, Flatpak, Homebrew on Linux
//! - **Debian-like**: Debian/Ubuntu APT, Flatpak, Homebrew on Linux
//! - **Fedora-like**: dnf, Flatpak, Homebrew on Linux
//!
//! Linux distributions are recognized from `/etc/os-release` (`ID` and
//! `ID_LIKE`), so derivatives like Manjaro or Pop!_OS land in the right family.
//!
//! # Examples
//!
//! ```no_run
//! use pkgmap::platform::PlatformDescriptor;
//!
//! let platform = PlatformDescriptor::detect();
//! println!("{} uses {:?}", platform.family, platform.ecosystems());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the fixed package ecosystems tracked per package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EcosystemKey {
    ArchOfficial,
    ArchAur,
    Debian,
    Ubuntu,
    Fedora,
    Homebrew,
    Flatpak,
}

impl EcosystemKey {
    pub const ALL: [EcosystemKey; 7] = [
        EcosystemKey::ArchOfficial,
        EcosystemKey::ArchAur,
        EcosystemKey::Debian,
        EcosystemKey::Ubuntu,
        EcosystemKey::Fedora,
        EcosystemKey::Homebrew,
        EcosystemKey::Flatpak,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EcosystemKey::ArchOfficial => "arch_official",
            EcosystemKey::ArchAur => "arch_aur",
            EcosystemKey::Debian => "debian",
            EcosystemKey::Ubuntu => "ubuntu",
            EcosystemKey::Fedora => "fedora",
            EcosystemKey::Homebrew => "homebrew",
            EcosystemKey::Flatpak => "flatpak",
        }
    }
}

impl fmt::Display for EcosystemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EcosystemKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EcosystemKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| format!("unknown ecosystem key '{}'", s))
    }
}

/// Operating system family, coarse enough to pick package ecosystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OsFamily {
    Macos,
    ArchLike,
    DebianLike,
    FedoraLike,
    /// Linux we couldn't classify; only distro-agnostic ecosystems apply
    OtherLinux,
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OsFamily::Macos => "macOS",
            OsFamily::ArchLike => "Arch-like",
            OsFamily::DebianLike => "Debian-like",
            OsFamily::FedoraLike => "Fedora-like",
            OsFamily::OtherLinux => "Linux (unclassified)",
        };
        f.write_str(name)
    }
}

/// Facts about the current (or a target) platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformDescriptor {
    pub family: OsFamily,
    /// Raw `ID` from os-release, when there is one
    pub distro_id: Option<String>,
}

impl PlatformDescriptor {
    pub fn new(family: OsFamily) -> Self {
        Self {
            family,
            distro_id: None,
        }
    }

    /// Detect the platform this process runs on.
    pub fn detect() -> Self {
        #[cfg(target_os = "macos")]
        {
            Self::new(OsFamily::Macos)
        }

        #[cfg(not(target_os = "macos"))]
        {
            match std::fs::read_to_string("/etc/os-release") {
                Ok(content) => Self::from_os_release(&content),
                Err(e) => {
                    tracing::debug!("cannot read /etc/os-release: {}", e);
                    Self::new(OsFamily::OtherLinux)
                }
            }
        }
    }

    /// Classify a Linux system from the contents of `/etc/os-release`.
    pub fn from_os_release(content: &str) -> Self {
        let mut id = None;
        let mut id_like = Vec::new();

        for line in content.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"').trim_matches('\'');
            match key.trim() {
                "ID" => id = Some(value.to_lowercase()),
                "ID_LIKE" => {
                    id_like = value.split_whitespace().map(str::to_lowercase).collect();
                }
                _ => {}
            }
        }

        let candidates = id.iter().chain(id_like.iter());
        let mut family = OsFamily::OtherLinux;
        for candidate in candidates {
            family = match candidate.as_str() {
                "arch" | "archlinux" | "manjaro" | "endeavouros" | "cachyos" => OsFamily::ArchLike,
                "debian" | "ubuntu" | "linuxmint" | "pop" => OsFamily::DebianLike,
                "fedora" | "rhel" | "centos" | "rocky" | "almalinux" => OsFamily::FedoraLike,
                _ => continue,
            };
            break;
        }

        Self {
            family,
            distro_id: id,
        }
    }

    /// Ecosystem keys relevant when installing on this platform.
    pub fn ecosystems(&self) -> Vec<EcosystemKey> {
        use EcosystemKey::*;
        match self.family {
            OsFamily::Macos => vec![Homebrew],
            OsFamily::ArchLike => vec![ArchOfficial, ArchAur, Homebrew, Flatpak],
            OsFamily::DebianLike => vec![Debian, Ubuntu, Homebrew, Flatpak],
            OsFamily::FedoraLike => vec![Fedora, Homebrew, Flatpak],
            OsFamily::OtherLinux => vec![Homebrew, Flatpak],
        }
    }

    pub fn is_darwin(&self) -> bool {
        self.family == OsFamily::Macos
    }

    pub fn supports_flatpak(&self) -> bool {
        !self.is_darwin()
    }
}
