use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    CoreLog,
    config::PipelineConfig,
    error::PipelineError,
    generate::{ArtifactKind, GenerationResult, render_json, sink::ArtifactSink},
    registry::MappingRegistry,
};

/// The three text rows of a button face. Unused rows are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labels {
    pub top: String,
    pub center: String,
    pub bottom: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleEntry {
    pub name: String,
    pub labels: Labels,
}

/// Words of a display name; a double-quoted phrase counts as one word.
fn label_words(name: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut quoted: Option<Vec<&str>> = None;

    for word in name.split_whitespace() {
        match quoted.as_mut() {
            Some(parts) => {
                parts.push(word);
                if word.ends_with('"') {
                    out.push(parts.join(" "));
                    quoted = None;
                }
            }
            None if word.starts_with('"') && !(word.len() > 1 && word.ends_with('"')) => {
                quoted = Some(vec![word]);
            }
            None => out.push(word.to_string()),
        }
    }
    // Unterminated quote: keep what we have.
    if let Some(parts) = quoted {
        out.push(parts.join(" "));
    }
    out
}

/// Greedy word-wrap into at most three rows of `width` characters.
///
/// One line fills `bottom`, two fill `center` + `bottom`, three fill all rows. A word longer
/// than `width` gets a line of its own; lines past the third are appended to `bottom`, so no
/// text is ever dropped.
pub fn split_into_labels(name: &str, width: usize) -> Labels {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in label_words(name) {
        if current.is_empty() {
            current = word;
        } else if current.chars().count() + 1 + word.chars().count() <= width {
            current.push(' ');
            current.push_str(&word);
        } else {
            lines.push(std::mem::replace(&mut current, word));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    if lines.len() > 3 {
        let overflow = lines.split_off(2).join(" ");
        lines.push(overflow);
    }

    let mut rows = lines.into_iter();
    match rows.len() {
        0 => Labels::default(),
        1 => Labels {
            bottom: rows.next().unwrap_or_default(),
            ..Labels::default()
        },
        2 => Labels {
            top: String::new(),
            center: rows.next().unwrap_or_default(),
            bottom: rows.next().unwrap_or_default(),
        },
        _ => Labels {
            top: rows.next().unwrap_or_default(),
            center: rows.next().unwrap_or_default(),
            bottom: rows.next().unwrap_or_default(),
        },
    }
}

/// Writes the locale file: `key -> {name, labels}` for every registry entry.
#[derive(Debug, Clone)]
pub struct LabelGenerator {
    path: PathBuf,
    width: usize,
}

impl LabelGenerator {
    pub fn new(path: impl Into<PathBuf>, width: usize) -> Self {
        Self {
            path: path.into(),
            width,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.locale_file(), config.label_width)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry_for(&self, display_name: &str) -> LocaleEntry {
        LocaleEntry {
            name: display_name.to_string(),
            labels: split_into_labels(display_name, self.width),
        }
    }

    pub fn generate(
        &self,
        registry: &MappingRegistry,
        sink: &dyn ArtifactSink,
        dry_run: bool,
        logger: &Arc<dyn CoreLog>,
    ) -> Result<GenerationResult, PipelineError> {
        let mut result = GenerationResult::new(ArtifactKind::Label);
        let mut locale: IndexMap<&str, LocaleEntry> = IndexMap::with_capacity(registry.len());

        for entry in registry.iter() {
            let le = self.entry_for(&entry.display_name);
            logger.debug(&format!(
                "[locales] {} -> {:?} / {:?} / {:?}",
                entry.key, le.labels.top, le.labels.center, le.labels.bottom
            ));
            locale.insert(&entry.key, le);
            result.record_written(&entry.key);
        }

        let bytes = render_json(&locale)?;
        if dry_run {
            logger.info(&format!(
                "[locales] dry run: would write {} entries to {}",
                locale.len(),
                self.path.display()
            ));
        } else {
            sink.write(&self.path, &bytes)?;
            logger.info(&format!(
                "[locales] wrote {} entries to {}",
                locale.len(),
                self.path.display()
            ));
        }
        Ok(result)
    }
}

/// Read a locale file back. `Ok(None)` when the file doesn't exist.
pub fn read_locale_file(path: &Path) -> Result<Option<IndexMap<String, LocaleEntry>>, PipelineError> {
    let parse_err = |reason: String| PipelineError::Parse {
        path: path.to_path_buf(),
        reason,
    };
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(parse_err(e.to_string())),
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| parse_err(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{core_log::NoopLog, generate::sink::MemorySink, registry::MappingEntry};

    fn labels(top: &str, center: &str, bottom: &str) -> Labels {
        Labels {
            top: top.into(),
            center: center.into(),
            bottom: bottom.into(),
        }
    }

    fn squash(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn short_names_sit_at_the_bottom() {
        assert_eq!(split_into_labels("Reinforce", 12), labels("", "", "Reinforce"));
        assert_eq!(split_into_labels("SOS Beacon", 12), labels("", "", "SOS Beacon"));
    }

    #[test]
    fn two_and_three_lines() {
        assert_eq!(
            split_into_labels("Eagle Airstrike", 12),
            labels("", "Eagle", "Airstrike")
        );
        assert_eq!(
            split_into_labels("Orbital Gatling Barrage", 12),
            labels("Orbital", "Gatling", "Barrage")
        );
        assert_eq!(
            split_into_labels("Orbital Precision Strike Module", 12),
            labels("Orbital", "Precision", "Strike Module")
        );
    }

    #[test]
    fn quoted_phrase_stays_together() {
        assert_eq!(
            split_into_labels("AX/LAS-5 \"Guard Dog\" Rover", 12),
            labels("AX/LAS-5", "\"Guard Dog\"", "Rover")
        );
    }

    #[test]
    fn overflow_joins_bottom_line() {
        let l = split_into_labels("One Two Three Four", 3);
        assert_eq!(l, labels("One", "Two", "Three Four"));
    }

    #[test]
    fn segmentation_loses_no_text() {
        let names = [
            "Orbital 120mm HE Barrage",
            "LIFT-850 Jump Pack",
            "A/ARC-3 Tesla Tower",
            "Eagle 110mm Rocket Pods",
            "Anti-Personnel Minefield",
            "SH-32 Shield Generator Pack",
            "FAF-14 Spear",
            "\"Unterminated quote here",
        ];
        for name in names {
            for width in [4, 8, 12, 20] {
                let l = split_into_labels(name, width);
                let joined = format!("{}{}{}", l.top, l.center, l.bottom);
                assert_eq!(squash(&joined), squash(name), "{name} @ {width}");
            }
        }
        // Long enough to need more than one line.
        let l = split_into_labels("Orbital 120mm HE Barrage", 12);
        assert!(!l.center.is_empty());
    }

    #[test]
    fn locale_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locales/en_US.json");
        let registry = MappingRegistry::from_entries(vec![MappingEntry::new(
            "EagleRearm",
            "Eagle Rearm",
            "Eagle Rearm",
            "Eagle Rearm",
        )])
        .unwrap();
        let log: Arc<dyn CoreLog> = Arc::new(NoopLog);

        let sink = MemorySink::new();
        let generator = LabelGenerator::new(&path, 12);
        generator.generate(&registry, &sink, false, &log).unwrap();

        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, sink.get(&path).unwrap()).unwrap();
        let back = read_locale_file(&path).unwrap().unwrap();
        assert_eq!(
            back["EagleRearm"],
            LocaleEntry {
                name: "Eagle Rearm".into(),
                labels: labels("", "", "Eagle Rearm"),
            }
        );
    }
}
