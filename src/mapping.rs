//! Installer-facing mapping table (`package_mappings.toml`).
//!
//! The table is derived entirely from the cache plus the hand-maintained
//! overrides, and rendered with a fixed layout so that regenerating from the
//! same inputs yields the same bytes:
//!
//! ```toml
//! [bat]
//! arch-pkg = "bat"
//! arch-is-aur = false
//! apt-pkg = "bat"
//! fedora-pkg = "bat"
//! brew-supports-darwin = true
//! brew-supports-linux = true
//! brew-is-cask = false
//! description = "Cat clone with wings"
//! ```
//!
//! Sections come in byte order of their name, fields in the order of
//! [`MappingEntry::fields`], and absent values are left out entirely.

use crate::cache::CacheStore;
use crate::error::Result;
use crate::names::NameMappings;
use crate::overrides::{InstallPriority, Overrides};
use crate::platform::{EcosystemKey, PlatformDescriptor};
use crate::record::{HomebrewMetadata, PackageRecord};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use toml::Value;
use tracing::debug;

/// Fixed preamble of every generated table. No timestamps, so output is byte-stable.
pub const HEADER: &str = "\
# Package mapping table, generated by pkgmap.
# Edit packages/custom_install.json for custom installs; everything else is
# regenerated from the Repology cache. Add an empty [name] section to start
# tracking a new package.
";

/// First components of reverse-DNS Flatpak application ids.
const FLATPAK_ID_PREFIXES: &[&str] = &[
    "org", "com", "app", "net", "io", "dev", "edu", "gov", "mil", "it", "us", "de", "uk",
];

const PRIORITY_FLATPAK: &str = "flatpak";

/// One section of the mapping table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct MappingEntry {
    pub arch_pkg: Option<String>,
    pub arch_is_aur: Option<bool>,
    pub apt_pkg: Option<String>,
    pub fedora_pkg: Option<String>,
    pub flatpak_pkg: Option<String>,
    pub brew_pkg: Option<String>,
    pub brew_tap: Option<String>,
    pub brew_supports_darwin: Option<bool>,
    pub brew_supports_linux: Option<bool>,
    pub brew_is_cask: Option<bool>,
    pub description: Option<String>,
    #[serde(rename = "prefer_flatpak")]
    pub prefer_flatpak: Option<bool>,
    pub priority: Option<String>,
    pub custom_install_priority: Option<InstallPriority>,
    pub requires_confirmation: Option<bool>,
    pub install_condition: Option<String>,
    #[serde(default)]
    pub custom_install: BTreeMap<String, Vec<String>>,
}

impl MappingEntry {
    /// Scalar fields that are present, in render order.
    pub fn fields(&self) -> Vec<(&'static str, Value)> {
        let string = |v: &Option<String>| v.clone().map(Value::String);
        let boolean = |v: &Option<bool>| v.map(Value::Boolean);

        let candidates = [
            ("arch-pkg", string(&self.arch_pkg)),
            ("arch-is-aur", boolean(&self.arch_is_aur)),
            ("apt-pkg", string(&self.apt_pkg)),
            ("fedora-pkg", string(&self.fedora_pkg)),
            ("flatpak-pkg", string(&self.flatpak_pkg)),
            ("brew-pkg", string(&self.brew_pkg)),
            ("brew-tap", string(&self.brew_tap)),
            ("brew-supports-darwin", boolean(&self.brew_supports_darwin)),
            ("brew-supports-linux", boolean(&self.brew_supports_linux)),
            ("brew-is-cask", boolean(&self.brew_is_cask)),
            ("description", string(&self.description)),
            ("prefer_flatpak", boolean(&self.prefer_flatpak)),
            ("priority", string(&self.priority)),
            (
                "custom-install-priority",
                self.custom_install_priority
                    .map(|p| Value::String(p.to_string())),
            ),
            ("requires-confirmation", boolean(&self.requires_confirmation)),
            ("install-condition", string(&self.install_condition)),
        ];

        candidates
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect()
    }

    /// The section as a TOML table, the shape it has after parsing.
    pub fn to_table(&self) -> toml::Table {
        let mut table: toml::Table = self
            .fields()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        if !self.custom_install.is_empty() {
            let custom: toml::Table = self
                .custom_install
                .iter()
                .map(|(platform, commands)| {
                    let commands = commands.iter().cloned().map(Value::String).collect();
                    (platform.clone(), Value::Array(commands))
                })
                .collect();
            table.insert("custom-install".to_string(), Value::Table(custom));
        }
        table
    }

    /// Whether any installer can do something with this entry.
    pub fn is_installable(&self) -> bool {
        self.arch_pkg.is_some()
            || self.apt_pkg.is_some()
            || self.fedora_pkg.is_some()
            || self.flatpak_pkg.is_some()
            || self.brew_supports_darwin == Some(true)
            || self.brew_supports_linux == Some(true)
            || !self.custom_install.is_empty()
    }

    fn is_flatpak_only(&self) -> bool {
        self.flatpak_pkg.is_some()
            && self.arch_pkg.is_none()
            && self.apt_pkg.is_none()
            && self.fedora_pkg.is_none()
            && self.brew_supports_darwin != Some(true)
            && self.brew_supports_linux != Some(true)
    }
}

/// Whole mapping table, keyed by section name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    sections: BTreeMap<String, MappingEntry>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse rendered table text.
    pub fn parse(text: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(text)?;
        let mut sections = BTreeMap::new();
        for (name, value) in table {
            let entry: MappingEntry = value.try_into()?;
            sections.insert(name, entry);
        }
        Ok(Self { sections })
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: MappingEntry) {
        self.sections.insert(name.into(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&MappingEntry> {
        self.sections.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MappingEntry)> {
        self.sections.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Render the table in its canonical layout.
    pub fn render(&self) -> String {
        let mut out = String::from(HEADER);
        for (name, entry) in &self.sections {
            let key = toml_key(name);
            out.push('\n');
            if !entry.is_installable() {
                let _ = writeln!(
                    out,
                    "# '{}' was not found on any platform; kept for periodic retry",
                    name
                );
            }
            let _ = writeln!(out, "[{}]", key);
            for (field, value) in entry.fields() {
                let _ = writeln!(out, "{} = {}", field, value);
            }
            if !entry.custom_install.is_empty() {
                let _ = writeln!(out, "\n[{}.custom-install]", key);
                for (platform, commands) in &entry.custom_install {
                    let commands = Value::Array(commands.iter().cloned().map(Value::String).collect());
                    let _ = writeln!(out, "{} = {}", toml_key(platform), commands);
                }
            }
        }
        out
    }
}

/// Bare key when TOML allows it, quoted otherwise.
fn toml_key(name: &str) -> String {
    let bare = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if bare {
        name.to_string()
    } else {
        Value::String(name.to_string()).to_string()
    }
}

/// Whether `name` is a reverse-DNS Flatpak application id such as `org.gnome.Boxes`.
pub fn is_flatpak_app_id(name: &str) -> bool {
    if name.contains('@') || name.contains('/') {
        return false;
    }
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() >= 2
        && parts.iter().all(|p| !p.is_empty())
        && FLATPAK_ID_PREFIXES.contains(&parts[0].to_ascii_lowercase().as_str())
}

/// Split `user/tap/name` into the tap and the formula name.
pub fn split_tap(name: &str) -> (Option<&str>, &str) {
    match name.rsplit_once('/') {
        Some((tap, formula)) if !tap.is_empty() && !formula.is_empty() => (Some(tap), formula),
        _ => (None, name),
    }
}

/// Builds [`MappingTable`]s from the cache and overrides.
pub struct MappingTableGenerator<'a> {
    store: &'a CacheStore,
    names: &'a NameMappings,
    overrides: &'a Overrides,
    ecosystems: Vec<EcosystemKey>,
}

impl<'a> MappingTableGenerator<'a> {
    /// A generator emitting every ecosystem's fields.
    pub fn new(store: &'a CacheStore, names: &'a NameMappings, overrides: &'a Overrides) -> Self {
        Self {
            store,
            names,
            overrides,
            ecosystems: EcosystemKey::ALL.to_vec(),
        }
    }

    /// Restrict per-ecosystem fields to what `platform` can install from.
    pub fn for_platform(mut self, platform: &PlatformDescriptor) -> Self {
        self.ecosystems = platform.ecosystems();
        self
    }

    /// One section for every name in `package_names`, plus every override.
    pub fn generate<I, S>(&self, package_names: I) -> MappingTable
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = MappingTable::new();
        let all_names = package_names
            .into_iter()
            .map(|n| n.as_ref().to_string())
            .chain(self.overrides.names().map(str::to_string));

        for name in all_names {
            if table.contains(&name) {
                continue;
            }
            let entry = self.entry_for(&name);
            table.insert(name, entry);
        }
        debug!("generated {} mapping sections", table.len());
        table
    }

    /// Generate and render in one step.
    pub fn render<I, S>(&self, package_names: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.generate(package_names).render()
    }

    pub fn entry_for(&self, name: &str) -> MappingEntry {
        let mut entry = MappingEntry::default();
        let (tap, formula) = split_tap(name);
        entry.brew_tap = tap.map(str::to_string);

        if let Some((_, record)) = self.names.lookup(self.store, name)
            && !record.is_negative()
        {
            self.apply_record(&mut entry, record, formula);
        }

        if entry.flatpak_pkg.is_none() && self.wants(EcosystemKey::Flatpak) && is_flatpak_app_id(name) {
            entry.flatpak_pkg = Some(name.to_string());
        }

        if entry.is_flatpak_only() {
            entry.prefer_flatpak = Some(true);
            entry.priority = Some(PRIORITY_FLATPAK.to_string());
        }

        if let Some(custom) = self.overrides.get(name) {
            if custom.description.is_some() {
                entry.description = custom.description.clone();
            }
            entry.custom_install = custom.custom_install.clone();
            if custom.custom_install_priority != InstallPriority::Always {
                entry.custom_install_priority = Some(custom.custom_install_priority);
            }
            entry.requires_confirmation = custom.requires_confirmation;
            entry.install_condition = custom.install_condition.clone();
        }

        entry
    }

    fn apply_record(&self, entry: &mut MappingEntry, record: &PackageRecord, formula: &str) {
        let name_for = |key: EcosystemKey| {
            self.wants(key)
                .then(|| record.package_name(key))
                .flatten()
                .map(str::to_string)
        };

        if let Some(official) = name_for(EcosystemKey::ArchOfficial) {
            entry.arch_pkg = Some(official);
            entry.arch_is_aur = Some(false);
        } else if let Some(aur) = name_for(EcosystemKey::ArchAur) {
            entry.arch_pkg = Some(aur);
            entry.arch_is_aur = Some(true);
        }

        entry.apt_pkg = name_for(EcosystemKey::Debian).or_else(|| name_for(EcosystemKey::Ubuntu));
        entry.fedora_pkg = name_for(EcosystemKey::Fedora);
        entry.flatpak_pkg = name_for(EcosystemKey::Flatpak);

        if self.wants(EcosystemKey::Homebrew) && record.is_available(EcosystemKey::Homebrew) {
            let metadata = record
                .homebrew_metadata
                .unwrap_or_else(HomebrewMetadata::formula);
            entry.brew_pkg = record
                .package_name(EcosystemKey::Homebrew)
                .filter(|brew_name| *brew_name != formula)
                .map(str::to_string);
            entry.brew_supports_darwin = Some(metadata.supports_darwin);
            entry.brew_supports_linux = Some(metadata.supports_linux);
            entry.brew_is_cask = Some(metadata.is_cask);
        }

        entry.description = record.description.clone();
    }

    fn wants(&self, key: EcosystemKey) -> bool {
        self.ecosystems.contains(&key)
    }
}
