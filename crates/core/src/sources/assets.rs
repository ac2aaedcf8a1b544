//! SVG icon listings. The upstream repository groups icons as `<category>/<Name>.svg`;
//! the file stem is the name the mapping table refers to.

use std::{
    collections::{HashMap, HashSet},
    fs,
    io::{Cursor, Read},
    path::{Path, PathBuf},
    sync::Arc,
};

use once_cell::sync::OnceCell;
use serde::Serialize;
use zip::ZipArchive;

use crate::{
    CoreLog,
    config::PipelineConfig,
    core_log::NoopLog,
    error::SourceError,
    sources::http::HttpFetcher,
};

const ORIGIN: &str = "icon catalog";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AssetRecord {
    pub asset_name: String,
    /// Folder the icon sits in upstream (e.g. "Hangar"). Informational only.
    pub category: String,
    pub locator: String,
}

pub trait AssetCatalog: Send + Sync {
    /// Every icon, names unique, sorted by name.
    fn list_all(&self, logger: &Arc<dyn CoreLog>) -> Result<Vec<AssetRecord>, SourceError>;

    /// SVG source of a listed icon.
    fn load(&self, record: &AssetRecord) -> Result<Vec<u8>, SourceError>;
}

/// `<category>/<Name>.svg` relative to the repository root -> (category, name).
/// Hidden folders, nested folders and non-SVG files are not icons.
pub(crate) fn icon_name_from_path(rel: &str) -> Option<(String, String)> {
    let mut parts = rel.split('/').filter(|p| !p.is_empty());
    let category = parts.next()?;
    let file = parts.next()?;
    if parts.next().is_some() || category.starts_with('.') {
        return None;
    }
    let stem = Path::new(file);
    let is_svg = stem
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("svg"));
    if !is_svg {
        return None;
    }
    let name = stem.file_stem()?.to_str()?;
    Some((category.to_string(), name.to_string()))
}

/// Input must already be in a stable order; the first record per name wins.
pub(crate) fn dedupe_records(
    records: Vec<AssetRecord>,
    logger: &Arc<dyn CoreLog>,
) -> Vec<AssetRecord> {
    let mut seen = HashSet::new();
    let mut out: Vec<AssetRecord> = records
        .into_iter()
        .filter(|r| {
            let first = seen.insert(r.asset_name.clone());
            if !first {
                logger.warn(&format!(
                    "[{ORIGIN}] duplicate icon `{}` at {}; keeping the first",
                    r.asset_name, r.locator
                ));
            }
            first
        })
        .collect();
    out.sort_by(|a, b| a.asset_name.cmp(&b.asset_name));
    out
}

// ───────────────────────────── GitHub archive ─────────────────────────────

struct ArchiveIndex {
    records: Vec<AssetRecord>,
    /// locator -> SVG bytes
    blobs: HashMap<String, Vec<u8>>,
}

/// Downloads the repository zip once and keeps the SVGs in memory for the whole run.
pub struct ArchiveCatalog {
    url: String,
    http: HttpFetcher,
    index: OnceCell<ArchiveIndex>,
}

impl ArchiveCatalog {
    pub fn new(config: &PipelineConfig) -> Result<Self, SourceError> {
        Ok(Self {
            url: config.icon_archive_url.clone(),
            http: HttpFetcher::new(&config.http)?,
            index: OnceCell::new(),
        })
    }

    fn index(&self, logger: &Arc<dyn CoreLog>) -> Result<&ArchiveIndex, SourceError> {
        self.index.get_or_try_init(|| {
            let bytes = self.http.get_bytes(ORIGIN, &self.url, logger)?;
            logger.debug(&format!("[{ORIGIN}] downloaded {} bytes", bytes.len()));
            read_archive(&self.url, &bytes, logger)
        })
    }
}

impl AssetCatalog for ArchiveCatalog {
    fn list_all(&self, logger: &Arc<dyn CoreLog>) -> Result<Vec<AssetRecord>, SourceError> {
        let index = self.index(logger)?;
        logger.info(&format!(
            "[{ORIGIN}] {} icons from {}",
            index.records.len(),
            self.url
        ));
        Ok(index.records.clone())
    }

    fn load(&self, record: &AssetRecord) -> Result<Vec<u8>, SourceError> {
        let quiet: Arc<dyn CoreLog> = Arc::new(NoopLog);
        self.index(&quiet)?
            .blobs
            .get(&record.locator)
            .cloned()
            .ok_or_else(|| SourceError::Parse {
                origin: ORIGIN.into(),
                fragment: record.locator.clone(),
                reason: "not present in archive".into(),
            })
    }
}

/// Zip headers are untrusted; icons are a few KiB, so anything bigger grows on demand.
const MAX_PREALLOC: u64 = 1 << 20;

fn prealloc_len(claimed: u64) -> usize {
    claimed.min(MAX_PREALLOC) as usize
}

/// Index a GitHub-style archive: everything lives under one top-level folder.
fn read_archive(
    url: &str,
    bytes: &[u8],
    logger: &Arc<dyn CoreLog>,
) -> Result<ArchiveIndex, SourceError> {
    let zip_err = |fragment: &str, e: zip::result::ZipError| SourceError::Parse {
        origin: ORIGIN.into(),
        fragment: fragment.to_string(),
        reason: e.to_string(),
    };
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| zip_err("zip archive", e))?;

    let mut names: Vec<(String, usize)> = (0..archive.len())
        .filter_map(|i| {
            let file = archive.by_index(i).ok()?;
            (!file.is_dir()).then(|| (file.name().to_string(), i))
        })
        .collect();
    names.sort();

    let mut records = Vec::new();
    let mut blobs = HashMap::new();
    for (name, i) in names {
        // Drop the `<repo>-<branch>/` prefix.
        let Some((_, rel)) = name.split_once('/') else {
            continue;
        };
        let Some((category, asset_name)) = icon_name_from_path(rel) else {
            continue;
        };
        let mut file = archive.by_index(i).map_err(|e| zip_err(&name, e))?;
        let mut svg = Vec::with_capacity(prealloc_len(file.size()));
        file.read_to_end(&mut svg).map_err(|e| SourceError::Parse {
            origin: ORIGIN.into(),
            fragment: name.clone(),
            reason: e.to_string(),
        })?;
        let locator = format!("{url}#{name}");
        blobs.insert(locator.clone(), svg);
        records.push(AssetRecord {
            asset_name,
            category,
            locator,
        });
    }

    if records.is_empty() {
        return Err(SourceError::Parse {
            origin: ORIGIN.into(),
            fragment: "<root>/<category>/*.svg".into(),
            reason: "archive contains no icons".into(),
        });
    }

    Ok(ArchiveIndex {
        records: dedupe_records(records, logger),
        blobs,
    })
}

// ───────────────────────────── local checkout ─────────────────────────────

/// The same layout on disk, e.g. a local clone of the icon repository.
pub struct DirectoryCatalog {
    root: PathBuf,
}

impl DirectoryCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetCatalog for DirectoryCatalog {
    fn list_all(&self, logger: &Arc<dyn CoreLog>) -> Result<Vec<AssetRecord>, SourceError> {
        let unavailable = |e: std::io::Error| SourceError::Unavailable {
            origin: ORIGIN.into(),
            attempts: 1,
            reason: format!("{}: {e}", self.root.display()),
        };

        let mut paths = Vec::new();
        for category in fs::read_dir(&self.root).map_err(unavailable)? {
            let category = category.map_err(unavailable)?;
            if !category.file_type().map_err(unavailable)?.is_dir() {
                continue;
            }
            for file in fs::read_dir(category.path()).map_err(unavailable)? {
                let file = file.map_err(unavailable)?;
                let rel = format!(
                    "{}/{}",
                    category.file_name().to_string_lossy(),
                    file.file_name().to_string_lossy()
                );
                paths.push((rel, file.path()));
            }
        }
        paths.sort();

        let records = paths
            .into_iter()
            .filter_map(|(rel, path)| {
                let (category, asset_name) = icon_name_from_path(&rel)?;
                let abs = fs::canonicalize(&path).unwrap_or(path);
                Some(AssetRecord {
                    asset_name,
                    category,
                    locator: format!("file://{}", abs.display()),
                })
            })
            .collect();
        Ok(dedupe_records(records, logger))
    }

    fn load(&self, record: &AssetRecord) -> Result<Vec<u8>, SourceError> {
        let path = record
            .locator
            .strip_prefix("file://")
            .unwrap_or(&record.locator);
        fs::read(path).map_err(|e| SourceError::Unavailable {
            origin: ORIGIN.into(),
            attempts: 1,
            reason: format!("{path}: {e}"),
        })
    }
}
