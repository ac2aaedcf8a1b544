//! Reconcile the wiki and the icon repository against the mapping table.
//!
//! Exact name equality is the only rule correctness relies on. The normalized-name pairing
//! behind `suggested_entries` only produces copy-paste candidates for a human; nothing here
//! edits the table.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use serde::Serialize;

use crate::{
    CoreLog,
    registry::{MappingEntry, MappingRegistry},
    sources::{assets::AssetRecord, wiki::WikiRecord},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestedEntry {
    pub key: String,
    pub source_name: String,
    pub asset_name: String,
    pub display_name: String,
    /// Set when the derived key is already taken (by the table or an earlier suggestion).
    pub collides_with: Option<String>,
}

/// A table entry whose upstream counterpart was not seen this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaleMapping {
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryReport {
    /// Sorted by name.
    pub unmapped_wiki_records: Vec<WikiRecord>,
    /// Sorted by name.
    pub unmapped_asset_records: Vec<AssetRecord>,
    /// Sorted by `source_name`.
    pub suggested_entries: Vec<SuggestedEntry>,
    /// Table order.
    pub stale_source_names: Vec<StaleMapping>,
    /// Table order.
    pub stale_asset_names: Vec<StaleMapping>,
}

impl DiscoveryReport {
    /// Nothing upstream is missing from the table.
    pub fn is_fully_mapped(&self) -> bool {
        self.unmapped_wiki_records.is_empty() && self.unmapped_asset_records.is_empty()
    }
}

/// Pure: same inputs, same report, same order.
pub fn reconcile(
    registry: &MappingRegistry,
    wiki: &[WikiRecord],
    assets: &[AssetRecord],
    logger: &Arc<dyn CoreLog>,
) -> DiscoveryReport {
    let mut unmapped_wiki: Vec<WikiRecord> = wiki
        .iter()
        .filter(|r| registry.by_source_name(&r.source_name).is_none())
        .cloned()
        .collect();
    unmapped_wiki.sort_by(|a, b| a.source_name.cmp(&b.source_name));

    let mut unmapped_assets: Vec<AssetRecord> = assets
        .iter()
        .filter(|r| registry.by_asset_name(&r.asset_name).is_none())
        .cloned()
        .collect();
    unmapped_assets.sort_by(|a, b| a.asset_name.cmp(&b.asset_name));

    let wiki_names: HashSet<&str> = wiki.iter().map(|r| r.source_name.as_str()).collect();
    let asset_names: HashSet<&str> = assets.iter().map(|r| r.asset_name.as_str()).collect();
    let stale_source_names = stale(registry, |e| &e.source_name, &wiki_names);
    let stale_asset_names = stale(registry, |e| &e.asset_name, &asset_names);

    let suggested_entries = suggest(registry, &unmapped_wiki, &unmapped_assets, logger);

    DiscoveryReport {
        unmapped_wiki_records: unmapped_wiki,
        unmapped_asset_records: unmapped_assets,
        suggested_entries,
        stale_source_names,
        stale_asset_names,
    }
}

fn stale(
    registry: &MappingRegistry,
    name_of: impl Fn(&MappingEntry) -> &String,
    seen: &HashSet<&str>,
) -> Vec<StaleMapping> {
    registry
        .iter()
        .filter(|e| !seen.contains(name_of(e).as_str()))
        .map(|e| StaleMapping {
            key: e.key.clone(),
            name: name_of(e).clone(),
        })
        .collect()
}

/// Pair unmapped wiki names with unmapped icons whose names match after case folding and
/// whitespace collapsing. Inputs arrive sorted, so "first" is deterministic.
fn suggest(
    registry: &MappingRegistry,
    unmapped_wiki: &[WikiRecord],
    unmapped_assets: &[AssetRecord],
    logger: &Arc<dyn CoreLog>,
) -> Vec<SuggestedEntry> {
    let mut by_norm: HashMap<String, &AssetRecord> = HashMap::new();
    for asset in unmapped_assets {
        let norm = normalize_name(&asset.asset_name);
        if let Some(first) = by_norm.get(&norm) {
            logger.warn(&format!(
                "[discover] icons `{}` and `{}` look alike; only `{}` is suggested",
                first.asset_name, asset.asset_name, first.asset_name
            ));
            continue;
        }
        by_norm.insert(norm, asset);
    }

    let mut claimed: HashMap<&str, &str> = HashMap::new();
    let mut taken_keys: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for record in unmapped_wiki {
        let Some(asset) = by_norm.get(&normalize_name(&record.source_name)) else {
            continue;
        };
        if let Some(prev) = claimed.get(asset.asset_name.as_str()) {
            logger.warn(&format!(
                "[discover] `{}` and `{}` both match icon `{}`; only `{}` is suggested",
                prev, record.source_name, asset.asset_name, prev
            ));
            continue;
        }
        claimed.insert(&asset.asset_name, &record.source_name);

        let key = suggest_key(&record.source_name);
        let collides_with = (registry.contains_key(&key) || taken_keys.contains(&key))
            .then(|| key.clone());
        taken_keys.insert(key.clone());

        out.push(SuggestedEntry {
            key,
            source_name: record.source_name.clone(),
            asset_name: asset.asset_name.clone(),
            display_name: record.source_name.clone(),
            collides_with,
        });
    }
    out
}

/// Case-folded, whitespace-collapsed form used for suggestion pairing only.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// PascalCase identifier from a display name:
/// `AX/LAS-5 "Guard Dog" Rover` -> `AXLAS5GuardDogRover`.
pub fn suggest_key(name: &str) -> String {
    let spaced: String = name
        .chars()
        .filter(|c| *c != '"' && *c != '\'')
        .map(|c| if matches!(c, '-' | '.' | '/') { ' ' } else { c })
        .collect();
    spaced
        .split_whitespace()
        .map(|word| {
            let clean: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
            let mut chars = clean.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core_log::{MemoryLog, NoopLog},
        sources::direction::Direction::*,
    };

    fn wiki(name: &str) -> WikiRecord {
        WikiRecord::new(name, vec![Up, Down, Left])
    }

    fn asset(name: &str) -> AssetRecord {
        AssetRecord {
            asset_name: name.into(),
            category: "General".into(),
            locator: format!("memory://General/{name}.svg"),
        }
    }

    fn registry(rows: &[(&str, &str, &str)]) -> MappingRegistry {
        MappingRegistry::from_entries(
            rows.iter()
                .map(|(k, s, a)| MappingEntry::new(*k, *s, *a, *s))
                .collect(),
        )
        .unwrap()
    }

    fn log() -> Arc<dyn CoreLog> {
        Arc::new(NoopLog)
    }

    #[test]
    fn unmapped_wiki_is_exactly_the_difference() {
        let reg = registry(&[("A", "A", "a"), ("B", "B", "b")]);
        let report = reconcile(&reg, &[wiki("C"), wiki("A"), wiki("B")], &[], &log());
        assert_eq!(report.unmapped_wiki_records, vec![wiki("C")]);
    }

    #[test]
    fn exact_match_means_nothing_to_do() {
        let reg = registry(&[
            ("Reinforce", "Reinforce", "Reinforce"),
            ("SOSBeacon", "SoS Beacon", "SOS Beacon"),
        ]);
        let report = reconcile(
            &reg,
            &[wiki("SoS Beacon"), wiki("Reinforce")],
            &[asset("SOS Beacon"), asset("Reinforce")],
            &log(),
        );
        assert!(report.is_fully_mapped());
        assert!(report.suggested_entries.is_empty());
        assert!(report.stale_source_names.is_empty());
        assert!(report.stale_asset_names.is_empty());
    }

    #[test]
    fn matching_is_exact_not_fuzzy() {
        // Same entry, but the table spells the wiki name differently.
        let reg = registry(&[("SOSBeacon", "SOS Beacon", "SOS Beacon")]);
        let report = reconcile(&reg, &[wiki("SoS Beacon")], &[asset("SOS Beacon")], &log());
        assert_eq!(report.unmapped_wiki_records, vec![wiki("SoS Beacon")]);
        assert!(report.unmapped_asset_records.is_empty());
        // The icon is already claimed, so there is nothing to pair with.
        assert!(report.suggested_entries.is_empty());
        assert_eq!(
            report.stale_source_names,
            vec![StaleMapping {
                key: "SOSBeacon".into(),
                name: "SOS Beacon".into()
            }]
        );
    }

    #[test]
    fn suggestions_pair_case_and_space_variants() {
        let reg = registry(&[]);
        let report = reconcile(
            &reg,
            &[wiki("Orbital 120mm HE Barrage"), wiki("Eagle  Rearm"), wiki("MG-43 Machine Gun")],
            &[asset("Orbital 120MM HE Barrage"), asset("Eagle Rearm"), asset("Machine Gun")],
            &log(),
        );
        assert_eq!(
            report.suggested_entries,
            vec![
                SuggestedEntry {
                    key: "EagleRearm".into(),
                    source_name: "Eagle  Rearm".into(),
                    asset_name: "Eagle Rearm".into(),
                    display_name: "Eagle  Rearm".into(),
                    collides_with: None,
                },
                SuggestedEntry {
                    key: "Orbital120mmHEBarrage".into(),
                    source_name: "Orbital 120mm HE Barrage".into(),
                    asset_name: "Orbital 120MM HE Barrage".into(),
                    display_name: "Orbital 120mm HE Barrage".into(),
                    collides_with: None,
                },
            ]
        );
        // Unpaired items are still reported individually.
        assert_eq!(report.unmapped_wiki_records.len(), 3);
        assert_eq!(report.unmapped_asset_records.len(), 3);
    }

    #[test]
    fn ambiguity_surfaces_instead_of_resolving() {
        let reg = registry(&[("HMGEmplacement", "E/MG-101 HMG Emplacement", "HMG Emplacement")]);
        let log = Arc::new(MemoryLog::new());
        let dyn_log: Arc<dyn CoreLog> = log.clone();
        let report = reconcile(
            &reg,
            &[wiki("Laser Sentry"), wiki("laser sentry"), wiki("HMG-Emplacement")],
            &[asset("Laser Sentry"), asset("LASER SENTRY"), asset("HMG-Emplacement")],
            &dyn_log,
        );
        let keys: Vec<_> = report.suggested_entries.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, ["HMGEmplacement", "LaserSentry"]);
        assert_eq!(
            report.suggested_entries[0].collides_with.as_deref(),
            Some("HMGEmplacement")
        );
        assert_eq!(log.warnings().len(), 2);
    }

    #[test]
    fn report_is_deterministic() {
        let reg = registry(&[("A", "A", "a")]);
        let w = [wiki("Zeta"), wiki("Alpha"), wiki("Mid")];
        let a = [asset("mid"), asset("zeta"), asset("alpha")];
        let first = reconcile(&reg, &w, &a, &log());
        let mut w2 = w.to_vec();
        w2.reverse();
        let mut a2 = a.to_vec();
        a2.reverse();
        assert_eq!(first, reconcile(&reg, &w2, &a2, &log()));
        let names: Vec<_> = first.suggested_entries.iter().map(|s| s.source_name.as_str()).collect();
        assert_eq!(names, ["Alpha", "Mid", "Zeta"]);
    }

    #[test]
    fn key_derivation() {
        assert_eq!(suggest_key("Orbital Gatling Barrage"), "OrbitalGatlingBarrage");
        assert_eq!(suggest_key("StA-X3 W.A.S.P. Launcher"), "StAX3WASPLauncher");
        assert_eq!(suggest_key("AX/LAS-5 \"Guard Dog\" Rover"), "AXLAS5GuardDogRover");
        assert_eq!(suggest_key("Eagle 500kg Bomb"), "Eagle500kgBomb");
        assert_eq!(suggest_key("Super-Destroyer's Flag"), "SuperDestroyersFlag");
    }

    #[test]
    fn normalization() {
        assert_eq!(normalize_name("  Eagle   500KG Bomb "), "eagle 500kg bomb");
    }
}
