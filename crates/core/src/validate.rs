//! Offline consistency check between the mapping table and the generated artifacts.
//! Never touches the network and never deletes anything.

use std::{collections::BTreeSet, fs, io, path::Path};

use serde::Serialize;

use crate::{
    config::PipelineConfig,
    error::PipelineError,
    generate::{ArtifactKind, labels::read_locale_file, sequences::read_sequence_file},
    registry::MappingRegistry,
};

/// Keys present in each artifact on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedKeys {
    pub icon_keys: BTreeSet<String>,
    pub sequence_keys: BTreeSet<String>,
    pub label_keys: BTreeSet<String>,
}

impl GeneratedKeys {
    /// Missing files or directories count as "no keys"; malformed files are errors.
    pub fn scan(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let sequence_keys = read_sequence_file(&config.sequences_file())?
            .map(|t| t.into_keys().collect())
            .unwrap_or_default();
        let label_keys = read_locale_file(&config.locale_file())?
            .map(|t| t.into_keys().collect())
            .unwrap_or_default();
        let mut icon_keys = scan_icon_dir(&config.icons_directory())?;
        for name in &config.static_icons {
            icon_keys.remove(name);
        }
        Ok(Self {
            icon_keys,
            sequence_keys,
            label_keys,
        })
    }
}

fn scan_icon_dir(dir: &Path) -> Result<BTreeSet<String>, PipelineError> {
    let parse_err = |e: io::Error| PipelineError::Parse {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    };
    let read = match fs::read_dir(dir) {
        Ok(r) => r,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(e) => return Err(parse_err(e)),
    };

    let mut keys = BTreeSet::new();
    for dent in read {
        let path = dent.map_err(parse_err)?.path();
        let is_png = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("png"));
        if !is_png || !path.is_file() {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            keys.insert(stem.to_string());
        }
    }
    Ok(keys)
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct OrphanedArtifact {
    pub artifact: ArtifactKind,
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub missing_icon: Vec<String>,
    pub missing_sequence: Vec<String>,
    pub missing_label: Vec<String>,
    pub orphaned_artifacts: Vec<OrphanedArtifact>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.missing_icon.is_empty()
            && self.missing_sequence.is_empty()
            && self.missing_label.is_empty()
            && self.orphaned_artifacts.is_empty()
    }

    pub fn finding_count(&self) -> usize {
        self.missing_icon.len()
            + self.missing_sequence.len()
            + self.missing_label.len()
            + self.orphaned_artifacts.len()
    }
}

/// Missing lists follow registry order; orphans are sorted by artifact, then key.
pub fn validate(registry: &MappingRegistry, generated: &GeneratedKeys) -> ValidationReport {
    let missing = |present: &BTreeSet<String>| -> Vec<String> {
        registry
            .keys()
            .filter(|k| !present.contains(*k))
            .map(str::to_string)
            .collect()
    };

    let mut orphaned_artifacts = Vec::new();
    for (artifact, keys) in [
        (ArtifactKind::Icon, &generated.icon_keys),
        (ArtifactKind::Sequence, &generated.sequence_keys),
        (ArtifactKind::Label, &generated.label_keys),
    ] {
        orphaned_artifacts.extend(
            keys.iter()
                .filter(|k| !registry.contains_key(k))
                .map(|k| OrphanedArtifact {
                    artifact,
                    key: k.clone(),
                }),
        );
    }
    orphaned_artifacts.sort();

    ValidationReport {
        missing_icon: missing(&generated.icon_keys),
        missing_sequence: missing(&generated.sequence_keys),
        missing_label: missing(&generated.label_keys),
        orphaned_artifacts,
    }
}
