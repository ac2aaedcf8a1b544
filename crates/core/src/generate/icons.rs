use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::{
    CoreLog,
    config::PipelineConfig,
    error::{ConfigError, EntryError, PipelineError},
    generate::{
        ArtifactKind, GenerationResult, pool::map_bounded,
        render::{IconStyle, render_icon},
        sink::ArtifactSink,
    },
    registry::{MappingEntry, MappingRegistry},
    sources::assets::{AssetCatalog, AssetRecord},
};

enum Outcome {
    Written,
    Failed(EntryError),
    /// Not attempted because an earlier write failed.
    Aborted,
}

/// Renders one `key.png` per registry entry on a bounded worker pool.
#[derive(Debug, Clone)]
pub struct IconGenerator {
    dir: PathBuf,
    style: IconStyle,
    workers: usize,
}

impl IconGenerator {
    pub fn new(dir: impl Into<PathBuf>, style: IconStyle, workers: usize) -> Self {
        Self {
            dir: dir.into(),
            style,
            workers: workers.max(1),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.icons_directory(),
            IconStyle::from_settings(&config.icons)?,
            config.workers,
        ))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn icon_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.png"))
    }

    /// A failed write stops the remaining entries and is returned as the error; icons
    /// already renamed into place stay.
    pub fn generate(
        &self,
        registry: &MappingRegistry,
        catalog: &dyn AssetCatalog,
        assets: &[AssetRecord],
        sink: &dyn ArtifactSink,
        dry_run: bool,
        logger: &Arc<dyn CoreLog>,
    ) -> Result<GenerationResult, PipelineError> {
        let mut by_name: HashMap<&str, &AssetRecord> = HashMap::with_capacity(assets.len());
        for rec in assets {
            by_name.entry(rec.asset_name.as_str()).or_insert(rec);
        }

        let jobs: Vec<(&MappingEntry, Option<&AssetRecord>)> = registry
            .iter()
            .map(|e| (e, by_name.get(e.asset_name.as_str()).copied()))
            .collect();

        let abort = AtomicBool::new(false);
        let outcomes = map_bounded(jobs, self.workers, |(entry, asset)| {
            if abort.load(Ordering::SeqCst) {
                return Ok(Outcome::Aborted);
            }
            let res = self.one(entry, asset, catalog, sink, dry_run, logger);
            if res.is_err() {
                abort.store(true, Ordering::SeqCst);
            }
            res
        });

        let mut result = GenerationResult::new(ArtifactKind::Icon);
        let mut first_write_err = None;
        for (entry, outcome) in registry.iter().zip(outcomes) {
            match outcome {
                Ok(Outcome::Written) => result.record_written(&entry.key),
                Ok(Outcome::Failed(err)) => {
                    logger.warn(&format!("[icons] {}: {err}", entry.key));
                    result.record_error(&entry.key, err);
                }
                Ok(Outcome::Aborted) => {}
                Err(err) => {
                    first_write_err.get_or_insert(err);
                }
            }
        }
        if let Some(err) = first_write_err {
            logger.error(&format!("[icons] aborted: {err}"));
            return Err(err);
        }

        logger.info(&format!(
            "[icons] {} {} icon(s) in {}, {} skipped",
            if dry_run { "would write" } else { "wrote" },
            result.written.len(),
            self.dir.display(),
            result.skipped.len()
        ));
        Ok(result)
    }

    fn one(
        &self,
        entry: &MappingEntry,
        asset: Option<&AssetRecord>,
        catalog: &dyn AssetCatalog,
        sink: &dyn ArtifactSink,
        dry_run: bool,
        logger: &Arc<dyn CoreLog>,
    ) -> Result<Outcome, PipelineError> {
        let Some(asset) = asset else {
            return Ok(Outcome::Failed(EntryError::MissingAsset(
                entry.asset_name.clone(),
            )));
        };
        let svg = match catalog.load(asset) {
            Ok(bytes) => bytes,
            Err(e) => {
                return Ok(Outcome::Failed(EntryError::AssetUnreadable {
                    asset: asset.asset_name.clone(),
                    reason: e.to_string(),
                }));
            }
        };
        let icon = match render_icon(&svg, &self.style) {
            Ok(icon) => icon,
            Err(e) => return Ok(Outcome::Failed(e)),
        };

        logger.debug(&format!(
            "[icons] {} <- {} (accent {}{}{})",
            entry.key,
            asset.asset_name,
            icon.source_accent,
            if icon.accent != icon.source_accent {
                format!(" -> {}", icon.accent)
            } else {
                String::new()
            },
            if icon.stripped_corners {
                ", corners removed"
            } else {
                ""
            }
        ));

        if !dry_run {
            sink.write(&self.icon_path(&entry.key), &icon.png)?;
        }
        Ok(Outcome::Written)
    }
}
