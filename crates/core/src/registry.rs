//! The canonical mapping table: internal key -> wiki name, icon name, display name.
//!
//! Loaded once per run, validated before anything touches the network, then handed to
//! every component by reference.

use std::{
    collections::{HashMap, HashSet},
    fmt, fs,
    path::Path,
};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{MapAccess, Visitor},
};

use crate::error::{ConfigError, ConfigIssue};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingEntry {
    /// Published identifier; embedded in icon filenames and locale/sequence keys.
    pub key: String,
    /// Name as listed on the wiki.
    pub source_name: String,
    /// SVG file stem in the icon repository.
    pub asset_name: String,
    pub display_name: String,
}

impl MappingEntry {
    pub fn new(
        key: impl Into<String>,
        source_name: impl Into<String>,
        asset_name: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            source_name: source_name.into(),
            asset_name: asset_name.into(),
            display_name: display_name.into(),
        }
    }
}

/// One row as written in the table file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TableRow {
    #[serde(default)]
    source: String,
    #[serde(default)]
    asset: String,
    #[serde(default)]
    name: String,
}

/// All rows in file order, duplicates included (a plain map would silently keep one).
struct TableRows(Vec<(String, TableRow)>);

impl<'de> Deserialize<'de> for TableRows {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RowsVisitor;

        impl<'de> Visitor<'de> for RowsVisitor {
            type Value = TableRows;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of key -> {source, asset, name}")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<TableRows, A::Error> {
                let mut rows = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, row)) = map.next_entry::<String, TableRow>()? {
                    rows.push((key, row));
                }
                Ok(TableRows(rows))
            }
        }

        deserializer.deserialize_map(RowsVisitor)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MappingRegistry {
    entries: IndexMap<String, MappingEntry>,
    by_source: HashMap<String, usize>,
    by_asset: HashMap<String, usize>,
}

impl MappingRegistry {
    /// Load and validate the table file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let origin = format!("mapping table {}", path.display());
        let text = fs::read_to_string(path).map_err(|e| {
            ConfigError::single(&origin, ConfigIssue::Unreadable(format!("read: {e}")))
        })?;
        Self::from_json_str(&text, &origin)
    }

    pub fn from_json_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let TableRows(rows) = serde_json::from_str(text).map_err(|e| {
            ConfigError::single(origin, ConfigIssue::Unreadable(format!("parse: {e}")))
        })?;
        let entries = rows
            .into_iter()
            .map(|(key, row)| MappingEntry::new(key, row.source, row.asset, row.name))
            .collect();
        Self::from_entries(entries).map_err(|mut e| {
            e.origin = origin.to_string();
            e
        })
    }

    /// Build from entries in declaration order, collecting every invariant violation.
    ///
    /// The first entry to claim a key, source name or asset name owns it even when that entry
    /// has problems of its own, so later claimants are still reported.
    pub fn from_entries(entries: Vec<MappingEntry>) -> Result<Self, ConfigError> {
        let mut issues = Vec::new();
        let mut keys: HashSet<String> = HashSet::new();
        let mut sources: HashMap<String, String> = HashMap::new();
        let mut assets: HashMap<String, String> = HashMap::new();

        for entry in &entries {
            for (field, value) in [
                ("key", &entry.key),
                ("source", &entry.source_name),
                ("asset", &entry.asset_name),
                ("name", &entry.display_name),
            ] {
                if value.trim().is_empty() {
                    issues.push(ConfigIssue::EmptyField {
                        key: entry.key.clone(),
                        field,
                    });
                }
            }
            if !entry.key.trim().is_empty() && !is_valid_key(&entry.key) {
                issues.push(ConfigIssue::InvalidKey(entry.key.clone()));
            }

            if !keys.insert(entry.key.clone()) {
                issues.push(ConfigIssue::DuplicateKey(entry.key.clone()));
            }
            if let Some(first) = claim(&mut sources, &entry.source_name, &entry.key) {
                issues.push(ConfigIssue::DuplicateSource {
                    name: entry.source_name.clone(),
                    first,
                    second: entry.key.clone(),
                });
            }
            if let Some(first) = claim(&mut assets, &entry.asset_name, &entry.key) {
                issues.push(ConfigIssue::DuplicateAsset {
                    name: entry.asset_name.clone(),
                    first,
                    second: entry.key.clone(),
                });
            }
        }

        if !issues.is_empty() {
            return Err(ConfigError::new("mapping table", issues));
        }

        let mut reg = MappingRegistry::default();
        for entry in entries {
            let ix = reg.entries.len();
            reg.by_source.insert(entry.source_name.clone(), ix);
            reg.by_asset.insert(entry.asset_name.clone(), ix);
            reg.entries.insert(entry.key.clone(), entry);
        }
        Ok(reg)
    }

    pub fn get(&self, key: &str) -> Option<&MappingEntry> {
        self.entries.get(key)
    }

    pub fn by_source_name(&self, name: &str) -> Option<&MappingEntry> {
        self.by_source.get(name).map(|&ix| &self.entries[ix])
    }

    pub fn by_asset_name(&self, name: &str) -> Option<&MappingEntry> {
        self.by_asset.get(name).map(|&ix| &self.entries[ix])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Entries in table-declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &MappingEntry> {
        self.entries.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Keys end up as file stems and JSON keys: word characters only.
pub fn is_valid_key(key: &str) -> bool {
    VALID_KEY.is_match(key)
}

static VALID_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+$").expect("valid regex"));

/// Record `owner` as the claimant of `name` unless someone got there first; returns that
/// earlier claimant. Blank names are reported as empty fields, not as collisions.
fn claim(claims: &mut HashMap<String, String>, name: &str, owner: &str) -> Option<String> {
    if name.trim().is_empty() {
        return None;
    }
    match claims.get(name) {
        Some(first) => Some(first.clone()),
        None => {
            claims.insert(name.to_string(), owner.to_string());
            None
        }
    }
}
