use std::{
    fs,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, ConfigIssue},
    registry::MappingRegistry,
};

pub const WIKI_STRATAGEMS_URL: &str = "https://helldivers.wiki.gg/wiki/Stratagems";
pub const ICON_ARCHIVE_URL: &str =
    "https://github.com/nvigneux/Helldivers-2-Stratagems-icons-svg/archive/refs/heads/master.zip";

/// Browser-like UA; the wiki answers bot agents with a challenge page.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Settings for one pipeline run. Every field has a default, so a config file only needs
/// the fields it wants to change (same idea as the bindgen JSON override in the mapper).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Plugin checkout the relative paths below are resolved against.
    pub root: PathBuf,
    pub mappings_path: PathBuf,
    pub sequences_path: PathBuf,
    pub locale_path: PathBuf,
    pub icons_dir: PathBuf,

    pub wiki_url: String,
    pub icon_archive_url: String,

    pub icons: IconSettings,
    /// Character budget per button label line.
    pub label_width: usize,
    /// Hand-made icons living next to generated ones; never reported as orphans.
    pub static_icons: Vec<String>,
    pub http: HttpSettings,
    /// Upper bound for per-entry worker threads.
    pub workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            mappings_path: PathBuf::from("assets/data/mappings.json"),
            sequences_path: PathBuf::from("assets/data/stratagems.json"),
            locale_path: PathBuf::from("locales/en_US.json"),
            icons_dir: PathBuf::from("assets/icons"),
            wiki_url: WIKI_STRATAGEMS_URL.to_string(),
            icon_archive_url: ICON_ARCHIVE_URL.to_string(),
            icons: IconSettings::default(),
            label_width: 12,
            static_icons: ["hero_on", "hero_off", "helldivers2_logo"]
                .into_iter()
                .map(String::from)
                .collect(),
            http: HttpSettings::default(),
            workers: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IconSettings {
    /// Edge length of the square output bitmap, in pixels.
    pub size: u32,
    /// Share of the canvas the vector icon occupies.
    pub scale: f32,
    pub background: String,
    /// Accent used for the corner border when the SVG has no usable fill colour.
    pub default_accent: String,
    /// Muted upstream accents -> saturated colours used in the PNGs.
    pub color_map: IndexMap<String, String>,
}

impl Default for IconSettings {
    fn default() -> Self {
        let color_map = [
            ("#c9b269", "#f0c628"),
            ("#de7b6c", "#d11a38"),
            ("#679552", "#60bf01"),
        ]
        .into_iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect();
        Self {
            size: 144,
            scale: 0.70,
            background: "#1a1a1a".to_string(),
            default_accent: "#c9b269".to_string(),
            color_map,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub attempts: u32,
    /// First retry delay; doubles on each further attempt.
    pub backoff_ms: u64,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            attempts: 3,
            backoff_ms: 500,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file. Missing fields fall back to defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let origin = format!("config {}", path.display());
        let text = fs::read_to_string(path).map_err(|e| {
            ConfigError::single(&origin, ConfigIssue::Unreadable(format!("read: {e}")))
        })?;
        serde_json::from_str(&text)
            .map_err(|e| ConfigError::single(&origin, ConfigIssue::Unreadable(format!("parse: {e}"))))
    }

    /// Check value ranges. Reports every bad setting at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut issues = Vec::new();
        let mut bad = |field: &'static str, reason: &str| {
            issues.push(ConfigIssue::InvalidSetting {
                field,
                reason: reason.to_string(),
            })
        };

        if self.icons.size == 0 {
            bad("icons.size", "must be at least 1 pixel");
        }
        if !(self.icons.scale > 0.0 && self.icons.scale <= 1.0) {
            bad("icons.scale", "must be in (0, 1]");
        }
        if crate::generate::render::parse_hex(&self.icons.background).is_none() {
            bad("icons.background", "expected a #rrggbb colour");
        }
        if crate::generate::render::parse_hex(&self.icons.default_accent).is_none() {
            bad("icons.default_accent", "expected a #rrggbb colour");
        }
        for (from, to) in &self.icons.color_map {
            if crate::generate::render::parse_hex(from).is_none()
                || crate::generate::render::parse_hex(to).is_none()
            {
                bad("icons.color_map", "entries must map #rrggbb to #rrggbb");
                break;
            }
        }
        if self.label_width == 0 {
            bad("label_width", "must be at least 1");
        }
        if self.http.attempts == 0 {
            bad("http.attempts", "must be at least 1");
        }
        if self.http.timeout_secs == 0 {
            bad("http.timeout_secs", "must be at least 1");
        }
        if self.workers == 0 {
            bad("workers", "must be at least 1");
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::new("pipeline settings", issues))
        }
    }

    /// Settings that depend on the table. A key named like a static icon would have its PNG
    /// hidden from the validator, so such keys are refused.
    pub fn check_registry(&self, registry: &MappingRegistry) -> Result<(), ConfigError> {
        let issues: Vec<_> = registry
            .keys()
            .filter(|key| self.static_icons.iter().any(|name| name == key))
            .map(|key| ConfigIssue::ReservedKey(key.to_string()))
            .collect();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::new("mapping table", issues))
        }
    }

    /// Resolve a configured path against `root` (absolute paths pass through).
    pub fn resolve(&self, p: &Path) -> PathBuf {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }

    pub fn mappings_file(&self) -> PathBuf {
        self.resolve(&self.mappings_path)
    }

    pub fn sequences_file(&self) -> PathBuf {
        self.resolve(&self.sequences_path)
    }

    pub fn locale_file(&self) -> PathBuf {
        self.resolve(&self.locale_path)
    }

    pub fn icons_directory(&self) -> PathBuf {
        self.resolve(&self.icons_dir)
    }
}
