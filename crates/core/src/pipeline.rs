//! Command-level entry points: one method per CLI mode.
//!
//! The registry and settings are validated by the caller before a `Pipeline` exists, so
//! nothing here starts network work on a bad table.

use std::sync::Arc;

use serde::Serialize;

use crate::{
    CoreLog,
    config::PipelineConfig,
    discovery::{DiscoveryReport, reconcile},
    error::PipelineError,
    generate::{
        GenerationResult,
        icons::IconGenerator,
        labels::LabelGenerator,
        sequences::{SequenceGenerator, read_sequence_file},
        sink::{ArtifactSink, FsSink},
    },
    registry::MappingRegistry,
    sources::{
        assets::{AssetCatalog, AssetRecord},
        direction::Direction,
        wiki::{WikiRecord, WikiSource},
    },
    validate::{GeneratedKeys, ValidationReport, validate},
};

/// Both upstream listings, fetched once per run.
#[derive(Debug, Clone, Default)]
pub struct Upstream {
    pub wiki: Vec<WikiRecord>,
    pub assets: Vec<AssetRecord>,
}

/// Per-generator results of a multi-generator run, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub results: Vec<GenerationResult>,
}

impl RunReport {
    pub fn has_errors(&self) -> bool {
        self.results.iter().any(GenerationResult::has_errors)
    }

    pub fn error_count(&self) -> usize {
        self.results.iter().map(|r| r.errors.len()).sum()
    }
}

/// One registry entry with its currently generated sequence, for `list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedEntry {
    pub key: String,
    pub source_name: String,
    pub asset_name: String,
    pub display_name: String,
    pub sequence: Option<Vec<Direction>>,
}

pub struct Pipeline<'a> {
    registry: &'a MappingRegistry,
    config: &'a PipelineConfig,
    logger: Arc<dyn CoreLog>,
    sink: Arc<dyn ArtifactSink>,
    dry_run: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        registry: &'a MappingRegistry,
        config: &'a PipelineConfig,
        logger: &Arc<dyn CoreLog>,
    ) -> Self {
        Self {
            registry,
            config,
            logger: logger.clone(),
            sink: Arc::new(FsSink),
            dry_run: false,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ArtifactSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Wiki and icon listings, fetched concurrently. Either failing fails the whole fetch.
    pub fn fetch_sources(
        &self,
        wiki: &dyn WikiSource,
        catalog: &dyn AssetCatalog,
    ) -> Result<Upstream, PipelineError> {
        let (wiki_res, asset_res) = std::thread::scope(|s| {
            let wiki_job = s.spawn(|| wiki.fetch_all(&self.logger));
            let assets = catalog.list_all(&self.logger);
            let records = wiki_job
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
            (records, assets)
        });
        Ok(Upstream {
            wiki: wiki_res?,
            assets: asset_res?,
        })
    }

    pub fn discover(
        &self,
        wiki: &dyn WikiSource,
        catalog: &dyn AssetCatalog,
    ) -> Result<DiscoveryReport, PipelineError> {
        let upstream = self.fetch_sources(wiki, catalog)?;
        Ok(self.discover_from(&upstream))
    }

    pub fn discover_from(&self, upstream: &Upstream) -> DiscoveryReport {
        let report = reconcile(self.registry, &upstream.wiki, &upstream.assets, &self.logger);
        self.logger.info(&format!(
            "[discover] {} unmapped wiki, {} unmapped icons, {} suggestion(s)",
            report.unmapped_wiki_records.len(),
            report.unmapped_asset_records.len(),
            report.suggested_entries.len()
        ));
        report
    }

    pub fn generate_sequences(
        &self,
        wiki: &dyn WikiSource,
    ) -> Result<GenerationResult, PipelineError> {
        let records = wiki.fetch_all(&self.logger)?;
        self.sequences_from(&records)
    }

    /// Offline: display names come from the registry.
    pub fn generate_locales(&self) -> Result<GenerationResult, PipelineError> {
        LabelGenerator::from_config(self.config).generate(
            self.registry,
            self.sink.as_ref(),
            self.dry_run,
            &self.logger,
        )
    }

    pub fn generate_icons(
        &self,
        catalog: &dyn AssetCatalog,
    ) -> Result<GenerationResult, PipelineError> {
        let assets = catalog.list_all(&self.logger)?;
        self.icons_from(catalog, &assets)
    }

    /// Sequences, locales, icons; one after another. A fatal error in one generator stops
    /// the run but keeps the results of those that already finished.
    pub fn generate_all(
        &self,
        wiki: &dyn WikiSource,
        catalog: &dyn AssetCatalog,
    ) -> Result<RunReport, PipelineError> {
        let upstream = self.fetch_sources(wiki, catalog)?;
        let mut results = Vec::with_capacity(3);
        if let Err(source) = self.run_generators(&upstream, catalog, &mut results) {
            self.logger.error(&format!(
                "[generate-all] stopped after {} generator(s): {source}",
                results.len()
            ));
            return Err(PipelineError::Interrupted {
                completed: results,
                source: Box::new(source),
            });
        }
        let report = RunReport { results };
        self.logger.info(&format!(
            "[generate-all] done{}: {} error(s)",
            if self.dry_run { " (dry run)" } else { "" },
            report.error_count()
        ));
        Ok(report)
    }

    /// Offline check of the artifacts currently on disk.
    pub fn validate(&self) -> Result<ValidationReport, PipelineError> {
        self.config.check_registry(self.registry)?;
        let generated = GeneratedKeys::scan(self.config)?;
        let report = validate(self.registry, &generated);
        if report.is_clean() {
            self.logger
                .info(&format!("[validate] {} entries complete", self.registry.len()));
        } else {
            self.logger.warn(&format!(
                "[validate] {} finding(s)",
                report.finding_count()
            ));
        }
        Ok(report)
    }

    /// Offline: registry entries joined with the sequence file, if there is one.
    pub fn list(&self) -> Result<Vec<ListedEntry>, PipelineError> {
        let sequences = read_sequence_file(&self.config.sequences_file())?.unwrap_or_default();
        Ok(self
            .registry
            .iter()
            .map(|e| ListedEntry {
                key: e.key.clone(),
                source_name: e.source_name.clone(),
                asset_name: e.asset_name.clone(),
                display_name: e.display_name.clone(),
                sequence: sequences.get(&e.key).cloned(),
            })
            .collect())
    }

    fn run_generators(
        &self,
        upstream: &Upstream,
        catalog: &dyn AssetCatalog,
        results: &mut Vec<GenerationResult>,
    ) -> Result<(), PipelineError> {
        results.push(self.sequences_from(&upstream.wiki)?);
        results.push(self.generate_locales()?);
        results.push(self.icons_from(catalog, &upstream.assets)?);
        Ok(())
    }

    fn sequences_from(&self, records: &[WikiRecord]) -> Result<GenerationResult, PipelineError> {
        SequenceGenerator::from_config(self.config).generate(
            self.registry,
            records,
            self.sink.as_ref(),
            self.dry_run,
            &self.logger,
        )
    }

    fn icons_from(
        &self,
        catalog: &dyn AssetCatalog,
        assets: &[AssetRecord],
    ) -> Result<GenerationResult, PipelineError> {
        let generator = IconGenerator::from_config(self.config)?;
        generator.generate(
            self.registry,
            catalog,
            assets,
            self.sink.as_ref(),
            self.dry_run,
            &self.logger,
        )
    }
}
