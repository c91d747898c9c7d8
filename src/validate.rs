//! Roundtrip checks run before a generated mapping table is published.

use crate::error::{MapError, Result};
use crate::mapping::{MappingEntry, MappingTable};
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// Everything wrong with a generated table. Empty `problems` means it passed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub sections: usize,
    pub problems: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn into_result(self) -> Result<Self> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(MapError::Validation(self.problems))
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            write!(f, "{} sections, all checks passed", self.sections)
        } else {
            write!(f, "{} sections, {} problem(s)", self.sections, self.problems.len())
        }
    }
}

/// Check `table_text` against the package lists and a regeneration callback.
///
/// - every name in `package_lists` has a section
/// - every section re-serializes to the same fields
/// - re-rendering the parsed table reproduces `table_text` byte for byte
/// - two calls to `regenerate` agree with each other and with `table_text`
pub fn validate<F>(
    table_text: &str,
    package_lists: &BTreeSet<String>,
    mut regenerate: F,
) -> ValidationReport
where
    F: FnMut() -> String,
{
    let mut report = ValidationReport::default();

    let document: toml::Table = match toml::from_str(table_text) {
        Ok(doc) => doc,
        Err(e) => {
            report.problems.push(format!("table is not valid TOML: {}", e));
            return report;
        }
    };
    report.sections = document.len();

    for name in package_lists {
        if !document.contains_key(name) {
            report
                .problems
                .push(format!("package '{}' from the package lists has no section", name));
        }
    }

    let mut parsed = MappingTable::new();
    for (name, value) in document {
        let Some(original) = value.as_table().cloned() else {
            report
                .problems
                .push(format!("'{}' is not a table", name));
            continue;
        };
        match value.try_into::<MappingEntry>() {
            Ok(entry) => {
                if entry.to_table() != original {
                    report
                        .problems
                        .push(format!("section '{}' changes when re-serialized", name));
                }
                parsed.insert(name, entry);
            }
            Err(e) => report
                .problems
                .push(format!("section '{}' is malformed: {}", name, e)),
        }
    }

    if report.is_ok() && parsed.render() != table_text {
        report
            .problems
            .push("re-rendering the parsed table does not reproduce it".to_string());
    }

    let first = regenerate();
    let second = regenerate();
    if first != second {
        report
            .problems
            .push("regenerating twice from the same cache gave different output".to_string());
    } else if first != table_text {
        report
            .problems
            .push("table differs from a fresh regeneration".to_string());
    }

    debug!("validation: {}", report);
    report
}
