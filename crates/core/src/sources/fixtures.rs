//! In-memory sources for tests and offline runs. They go through the same record types
//! and dedupe rules as the live sources, so nothing downstream can tell them apart.

use std::sync::Arc;

use crate::{
    CoreLog,
    error::SourceError,
    sources::{
        assets::{AssetCatalog, AssetRecord, dedupe_records},
        wiki::{self, WikiRecord, WikiSource},
    },
};

/// Serves a fixed list of wiki records.
#[derive(Debug, Clone, Default)]
pub struct StaticWikiSource {
    records: Vec<WikiRecord>,
}

impl StaticWikiSource {
    pub fn new(records: Vec<WikiRecord>) -> Self {
        Self { records }
    }
}

impl WikiSource for StaticWikiSource {
    fn fetch_all(&self, logger: &Arc<dyn CoreLog>) -> Result<Vec<WikiRecord>, SourceError> {
        Ok(wiki::dedupe_records(self.records.clone(), logger))
    }
}

/// Icons held in memory, addressed as `memory://<category>/<name>.svg`.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    icons: Vec<(AssetRecord, Vec<u8>)>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_icon(mut self, category: &str, name: &str, svg: impl Into<Vec<u8>>) -> Self {
        let record = AssetRecord {
            asset_name: name.to_string(),
            category: category.to_string(),
            locator: format!("memory://{category}/{name}.svg"),
        };
        self.icons.push((record, svg.into()));
        self
    }
}

impl AssetCatalog for MemoryCatalog {
    fn list_all(&self, logger: &Arc<dyn CoreLog>) -> Result<Vec<AssetRecord>, SourceError> {
        let records = self.icons.iter().map(|(r, _)| r.clone()).collect();
        Ok(dedupe_records(records, logger))
    }

    fn load(&self, record: &AssetRecord) -> Result<Vec<u8>, SourceError> {
        self.icons
            .iter()
            .find(|(r, _)| r.locator == record.locator)
            .map(|(_, svg)| svg.clone())
            .ok_or_else(|| SourceError::Unavailable {
                origin: "memory catalog".into(),
                attempts: 1,
                reason: format!("no icon at {}", record.locator),
            })
    }
}

/// A source that is always down; exercises the "fatal for this command" path.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnreachableSource;

impl UnreachableSource {
    fn error(origin: &str) -> SourceError {
        SourceError::Unavailable {
            origin: origin.to_string(),
            attempts: 3,
            reason: "connection refused".into(),
        }
    }
}

impl WikiSource for UnreachableSource {
    fn fetch_all(&self, _logger: &Arc<dyn CoreLog>) -> Result<Vec<WikiRecord>, SourceError> {
        Err(Self::error("wiki"))
    }
}

impl AssetCatalog for UnreachableSource {
    fn list_all(&self, _logger: &Arc<dyn CoreLog>) -> Result<Vec<AssetRecord>, SourceError> {
        Err(Self::error("icon catalog"))
    }

    fn load(&self, _record: &AssetRecord) -> Result<Vec<u8>, SourceError> {
        Err(Self::error("icon catalog"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{core_log::MemoryLog, sources::direction::Direction::*};

    #[test]
    fn static_wiki_keeps_first_of_duplicate_names() {
        let log = Arc::new(MemoryLog::new());
        let dyn_log: Arc<dyn CoreLog> = log.clone();
        let source = StaticWikiSource::new(vec![
            WikiRecord::new("Reinforce", vec![Up, Down, Right]),
            WikiRecord::new("Resupply", vec![Down, Down, Up]),
            WikiRecord::new("Reinforce", vec![Left, Left, Left]),
        ]);

        let records = source.fetch_all(&dyn_log).unwrap();
        assert_eq!(
            records,
            vec![
                WikiRecord::new("Reinforce", vec![Up, Down, Right]),
                WikiRecord::new("Resupply", vec![Down, Down, Up]),
            ]
        );
        assert_eq!(log.warnings().len(), 1);
        assert!(log.warnings()[0].contains("Reinforce"));
    }
}
