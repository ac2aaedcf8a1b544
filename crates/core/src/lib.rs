//! Core library for the Helldivers 2 Stream Deck asset pipeline.
//!
//! This crate is UI-agnostic and network-agnostic at its seams. It exposes:
//! - `registry`: the canonical key -> wiki name / icon name / display name table.
//! - `sources`: wiki scraper and icon catalogs (live, local, in-memory).
//! - `discovery`: reconcile upstream listings against the table.
//! - `generate`: sequence table, locale file and PNG icon generators.
//! - `validate`: offline artifact completeness check.
//! - `pipeline::Pipeline`: one method per CLI mode.
//! - `core_log::CoreLog`: thin logging trait the host (CLI/tests) can implement.
//!
//! Import the `prelude` if you want the most common types in scope.

pub mod core_log;

pub mod config;
pub mod discovery;
pub mod error;
pub mod generate;
pub mod pipeline;
pub mod registry;
pub mod sources;
pub mod validate;

/// Convenient re-exports for downstream users (CLI/tests).
pub use core_log::CoreLog;

pub mod prelude {
    pub use crate::core_log::{CoreLog, MemoryLog, NoopLog};

    // Settings + errors
    pub use crate::config::{HttpSettings, IconSettings, PipelineConfig};
    pub use crate::error::{ConfigError, ConfigIssue, EntryError, PipelineError, SourceError};

    // Table
    pub use crate::registry::{MappingEntry, MappingRegistry};

    // Upstream
    pub use crate::sources::assets::{
        ArchiveCatalog, AssetCatalog, AssetRecord, DirectoryCatalog,
    };
    pub use crate::sources::direction::Direction;
    pub use crate::sources::fixtures::{MemoryCatalog, StaticWikiSource, UnreachableSource};
    pub use crate::sources::wiki::{HttpWikiSource, WikiRecord, WikiSource};

    // Reports + generation
    pub use crate::discovery::{DiscoveryReport, StaleMapping, SuggestedEntry};
    pub use crate::generate::labels::{Labels, LocaleEntry, split_into_labels};
    pub use crate::generate::sink::{ArtifactSink, FsSink, MemorySink};
    pub use crate::generate::{ArtifactKind, GenerationResult};
    pub use crate::pipeline::{ListedEntry, Pipeline, RunReport, Upstream};
    pub use crate::validate::{GeneratedKeys, OrphanedArtifact, ValidationReport};
}
