//! Artifact generators. Each one regenerates its artifact from scratch on every run.
//!
//! - `sequences`: `key -> [Direction]` table from wiki records.
//! - `labels`: locale file with segmented button labels, from display names.
//! - `icons`: one `key.png` per entry, rasterized from the icon catalog.
//!
//! All writes go through an [`sink::ArtifactSink`]; a dry run skips only that call.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::error::{EntryError, PipelineError};

pub mod icons;
pub mod labels;
pub(crate) mod pool;
pub mod render;
pub mod sequences;
pub mod sink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Icon,
    Sequence,
    Label,
}

impl ArtifactKind {
    pub fn name(&self) -> &'static str {
        match self {
            ArtifactKind::Icon => "icons",
            ArtifactKind::Sequence => "sequences",
            ArtifactKind::Label => "labels",
        }
    }
}

/// Outcome of one generator pass. `skipped` is exactly the key set of `errors`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub artifact: ArtifactKind,
    pub written: BTreeSet<String>,
    pub skipped: BTreeSet<String>,
    pub errors: BTreeMap<String, EntryError>,
}

impl GenerationResult {
    pub fn new(artifact: ArtifactKind) -> Self {
        Self {
            artifact,
            written: BTreeSet::new(),
            skipped: BTreeSet::new(),
            errors: BTreeMap::new(),
        }
    }

    pub fn record_written(&mut self, key: &str) {
        self.written.insert(key.to_string());
    }

    pub fn record_error(&mut self, key: &str, err: EntryError) {
        self.skipped.insert(key.to_string());
        self.errors.insert(key.to_string(), err);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Pretty JSON (two-space indent) with a trailing newline.
pub(crate) fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, PipelineError> {
    let mut out = serde_json::to_vec_pretty(value)?;
    out.push(b'\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn json_keeps_insertion_order_and_non_ascii() {
        let mut map = IndexMap::new();
        map.insert("Zeta", "Überladung");
        map.insert("Alpha", "x");
        let text = String::from_utf8(render_json(&map).unwrap()).unwrap();
        assert_eq!(text, "{\n  \"Zeta\": \"Überladung\",\n  \"Alpha\": \"x\"\n}\n");
    }

    #[test]
    fn skipped_tracks_errors() {
        let mut res = GenerationResult::new(ArtifactKind::Icon);
        res.record_written("A");
        res.record_error("B", EntryError::MissingAsset("b".into()));
        assert_eq!(res.skipped, BTreeSet::from(["B".to_string()]));
        assert!(res.has_errors());
    }
}
