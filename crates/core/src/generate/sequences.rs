use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use indexmap::IndexMap;

use crate::{
    CoreLog,
    config::PipelineConfig,
    error::{EntryError, PipelineError},
    generate::{ArtifactKind, GenerationResult, render_json, sink::ArtifactSink},
    registry::MappingRegistry,
    sources::{direction::Direction, wiki::WikiRecord},
};

/// Writes the `key -> [Direction]` table the plugin replays as key presses.
#[derive(Debug, Clone)]
pub struct SequenceGenerator {
    path: PathBuf,
}

impl SequenceGenerator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.sequences_file())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn generate(
        &self,
        registry: &MappingRegistry,
        wiki: &[WikiRecord],
        sink: &dyn ArtifactSink,
        dry_run: bool,
        logger: &Arc<dyn CoreLog>,
    ) -> Result<GenerationResult, PipelineError> {
        let mut by_name: HashMap<&str, &WikiRecord> = HashMap::with_capacity(wiki.len());
        for rec in wiki {
            by_name.entry(rec.source_name.as_str()).or_insert(rec);
        }

        let mut result = GenerationResult::new(ArtifactKind::Sequence);
        let mut table: IndexMap<&str, &[Direction]> = IndexMap::with_capacity(registry.len());

        for entry in registry.iter() {
            match by_name.get(entry.source_name.as_str()) {
                Some(rec) => {
                    table.insert(&entry.key, &rec.sequence);
                    result.record_written(&entry.key);
                }
                None => {
                    logger.warn(&format!(
                        "[sequences] {}: `{}` not on wiki",
                        entry.key, entry.source_name
                    ));
                    result.record_error(
                        &entry.key,
                        EntryError::MissingSource(entry.source_name.clone()),
                    );
                }
            }
        }

        let bytes = render_json(&table)?;
        if dry_run {
            logger.info(&format!(
                "[sequences] dry run: would write {} entries to {}",
                table.len(),
                self.path.display()
            ));
        } else {
            sink.write(&self.path, &bytes)?;
            logger.info(&format!(
                "[sequences] wrote {} entries to {}",
                table.len(),
                self.path.display()
            ));
        }
        Ok(result)
    }
}

/// Read a sequence table back. `Ok(None)` when the file doesn't exist.
pub fn read_sequence_file(
    path: &Path,
) -> Result<Option<IndexMap<String, Vec<Direction>>>, PipelineError> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(PipelineError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
        }
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| PipelineError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core_log::NoopLog, generate::sink::MemorySink, registry::MappingEntry,
        sources::direction::Direction::*,
    };

    fn registry() -> MappingRegistry {
        MappingRegistry::from_entries(vec![
            MappingEntry::new("Resupply", "Resupply", "Resupply", "Resupply"),
            MappingEntry::new("Reinforce", "Reinforce", "Reinforce", "Reinforce"),
            MappingEntry::new("Hellbomb", "Hellbomb", "Hellbomb", "Hellbomb"),
        ])
        .unwrap()
    }

    fn wiki() -> Vec<WikiRecord> {
        vec![
            WikiRecord::new("Reinforce", vec![Up, Down, Right, Left, Up]),
            WikiRecord::new("Resupply", vec![Down, Down, Up, Right]),
        ]
    }

    #[test]
    fn writes_registry_order_and_reports_missing() {
        let sink = MemorySink::new();
        let log: Arc<dyn CoreLog> = Arc::new(NoopLog);
        let generator = SequenceGenerator::new("seq.json");
        let res = generator
            .generate(&registry(), &wiki(), &sink, false, &log)
            .unwrap();

        let text = String::from_utf8(sink.get(Path::new("seq.json")).unwrap()).unwrap();
        let resupply = text.find("\"Resupply\"").unwrap();
        let reinforce = text.find("\"Reinforce\"").unwrap();
        assert!(resupply < reinforce);
        assert!(text.contains("\"Down\""));
        assert!(!text.contains("Hellbomb"));

        assert_eq!(res.written.len(), 2);
        assert_eq!(
            res.errors.get("Hellbomb"),
            Some(&EntryError::MissingSource("Hellbomb".into()))
        );
    }

    #[test]
    fn dry_run_reports_the_same_and_writes_nothing() {
        let log: Arc<dyn CoreLog> = Arc::new(NoopLog);
        let generator = SequenceGenerator::new("seq.json");
        let real_sink = MemorySink::new();
        let dry_sink = MemorySink::new();
        let real = generator
            .generate(&registry(), &wiki(), &real_sink, false, &log)
            .unwrap();
        let dry = generator
            .generate(&registry(), &wiki(), &dry_sink, true, &log)
            .unwrap();
        assert_eq!(real, dry);
        assert!(dry_sink.is_empty());
    }

    #[test]
    fn read_back_and_reject_bad_directions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stratagems.json");
        assert!(read_sequence_file(&path).unwrap().is_none());

        fs::write(&path, r#"{ "Resupply": ["Down", "Down", "Up", "Right"] }"#).unwrap();
        let table = read_sequence_file(&path).unwrap().unwrap();
        assert_eq!(table["Resupply"], vec![Down, Down, Up, Right]);

        fs::write(&path, r#"{ "Resupply": ["Down", "Sideways"] }"#).unwrap();
        assert!(matches!(
            read_sequence_file(&path),
            Err(PipelineError::Parse { .. })
        ));
    }
}
