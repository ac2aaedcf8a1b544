//! Stratagem names and input codes scraped from the wiki's `wikitable` listings.

use std::{collections::HashSet, sync::Arc};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::{
    CoreLog,
    config::PipelineConfig,
    error::SourceError,
    sources::{direction::Direction, http::HttpFetcher},
};

const ORIGIN: &str = "wiki";

/// Shorter codes are decorations or partial rows, not stratagems.
pub const MIN_SEQUENCE_LEN: usize = 3;

/// Link texts of navigation rows that share the tables with real entries.
const SKIP_NAMES: [&str; 5] = ["warbonds", "helldivers", "category", "ship module", "dlc"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct WikiRecord {
    pub source_name: String,
    pub sequence: Vec<Direction>,
}

impl WikiRecord {
    pub fn new(source_name: impl Into<String>, sequence: Vec<Direction>) -> Self {
        Self {
            source_name: source_name.into(),
            sequence,
        }
    }
}

pub trait WikiSource: Send + Sync {
    /// All stratagems listed upstream, in page order, names unique.
    fn fetch_all(&self, logger: &Arc<dyn CoreLog>) -> Result<Vec<WikiRecord>, SourceError>;
}

/// The live wiki page.
pub struct HttpWikiSource {
    url: String,
    http: HttpFetcher,
}

impl HttpWikiSource {
    pub fn new(config: &PipelineConfig) -> Result<Self, SourceError> {
        Ok(Self {
            url: config.wiki_url.clone(),
            http: HttpFetcher::new(&config.http)?,
        })
    }
}

impl WikiSource for HttpWikiSource {
    fn fetch_all(&self, logger: &Arc<dyn CoreLog>) -> Result<Vec<WikiRecord>, SourceError> {
        let html = self.http.get_text(ORIGIN, &self.url, logger)?;
        let records = parse_stratagem_page(&html, logger)?;
        logger.info(&format!(
            "[wiki] {} stratagems from {}",
            records.len(),
            self.url
        ));
        Ok(records)
    }
}

static TABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<table\b([^>]*)>(.*?)</table>").expect("table regex"));
static CLASS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bclass\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("class regex")
});
static ROW_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<tr\b").expect("row regex"));
static CELL_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<t[dh]\b").expect("cell regex"));
static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<a\b[^>]*>(.*?)</a>").expect("link regex"));
static IMG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<img\b[^>]*>").expect("img regex"));
static ALT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\balt\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("alt regex")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex"));
static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").expect("entity regex"));

/// Extract every stratagem row from the page. Unrelated markup is ignored; rows with an
/// unreadable input code are dropped with a warning.
pub fn parse_stratagem_page(
    html: &str,
    logger: &Arc<dyn CoreLog>,
) -> Result<Vec<WikiRecord>, SourceError> {
    let tables: Vec<&str> = TABLE_RE
        .captures_iter(html)
        .filter(|c| c.get(1).is_some_and(|attrs| has_class(attrs.as_str(), "wikitable")))
        .filter_map(|c| c.get(2).map(|m| m.as_str()))
        .collect();

    if tables.is_empty() {
        return Err(SourceError::Parse {
            origin: ORIGIN.into(),
            fragment: "table.wikitable".into(),
            reason: "no stratagem tables on page".into(),
        });
    }
    logger.debug(&format!("[wiki] {} stratagem tables", tables.len()));

    let mut records = Vec::new();

    for table in &tables {
        // Chunk 0 precedes the first <tr>; chunk 1 is the header row.
        for row in ROW_SPLIT_RE.split(table).skip(2) {
            let Some(name) = row_name(row) else {
                continue;
            };
            let lower = name.to_lowercase();
            if SKIP_NAMES.iter().any(|s| lower.contains(s)) {
                continue;
            }

            let arrows = arrow_alts(row);
            if arrows.is_empty() {
                continue;
            }

            let mut sequence = Vec::with_capacity(arrows.len());
            let mut unreadable = None;
            for alt in &arrows {
                match Direction::from_alt_text(alt) {
                    Some(d) => sequence.push(d),
                    None => {
                        unreadable = Some(alt.clone());
                        break;
                    }
                }
            }
            if let Some(alt) = unreadable {
                logger.warn(&format!(
                    "[wiki] dropping `{name}`: unrecognised arrow `{alt}`"
                ));
                continue;
            }
            if sequence.len() < MIN_SEQUENCE_LEN {
                logger.warn(&format!(
                    "[wiki] dropping `{name}`: code has {} input(s), expected at least {MIN_SEQUENCE_LEN}",
                    sequence.len()
                ));
                continue;
            }
            records.push(WikiRecord::new(name, sequence));
        }
    }

    if records.is_empty() {
        return Err(SourceError::Parse {
            origin: ORIGIN.into(),
            fragment: "table.wikitable tr".into(),
            reason: format!(
                "{} table(s) but no rows with an input code",
                tables.len()
            ),
        });
    }
    Ok(dedupe_records(records, logger))
}

/// Names must be unique per listing; the first record per name wins.
pub(crate) fn dedupe_records(
    records: Vec<WikiRecord>,
    logger: &Arc<dyn CoreLog>,
) -> Vec<WikiRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| {
            let first = seen.insert(r.source_name.clone());
            if !first {
                logger.warn(&format!(
                    "[wiki] `{}` listed more than once; keeping the first",
                    r.source_name
                ));
            }
            first
        })
        .collect()
}

fn has_class(attrs: &str, class: &str) -> bool {
    CLASS_RE
        .captures(attrs)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .is_some_and(|m| m.as_str().split_whitespace().any(|c| c == class))
}

/// First meaningful link text in the row, scanning one link per cell.
fn row_name(row: &str) -> Option<String> {
    CELL_SPLIT_RE.split(row).skip(1).find_map(|cell| {
        let link = LINK_RE.captures(cell)?.get(1)?;
        let text = clean_text(link.as_str());
        (text.chars().count() > 2 && !text.starts_with('[')).then_some(text)
    })
}

fn arrow_alts(row: &str) -> Vec<String> {
    IMG_RE
        .find_iter(row)
        .filter_map(|img| {
            let caps = ALT_RE.captures(img.as_str())?;
            let alt = caps.get(1).or_else(|| caps.get(2))?.as_str();
            let alt = decode_entities(alt);
            alt.to_lowercase().contains("arrow").then_some(alt)
        })
        .collect()
}

/// Strip tags, decode entities, collapse whitespace.
fn clean_text(fragment: &str) -> String {
    let no_tags = TAG_RE.replace_all(fragment, "");
    decode_entities(&no_tags)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_entities(s: &str) -> String {
    ENTITY_RE
        .replace_all(s, |caps: &regex::Captures| {
            let body = &caps[1];
            let decoded = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match body {
                    "amp" => Some('&'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "nbsp" => Some(' '),
                    _ => None,
                }
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_log::MemoryLog;
    use Direction::*;

    fn arrow(d: &str) -> String {
        format!(r#"<img alt="Arrow 4 {d}.png" src="/images/Arrow_4_{d}.png" width="20">"#)
    }

    fn row(name: &str, arrows: &[&str]) -> String {
        let imgs: String = arrows.iter().map(|d| arrow(d)).collect();
        format!(
            r#"<tr><td><a href="/wiki/x"><img alt="icon" src="i.png"></a></td><td><a href="/wiki/{name}" title="{name}">{name}</a></td><td>{imgs}</td><td>100</td></tr>"#
        )
    }

    fn page(rows: &[String]) -> String {
        format!(
            r##"<html><body>
            <div class="toc"><a href="#General">General</a></div>
            <table class="infobox"><tr><th>ignored</th></tr><tr><td><a href="/x">Not A Stratagem</a><img alt="Arrow Up"></td></tr></table>
            <table class="wikitable sortable"><tbody><tr><th>Icon</th><th>Name</th><th>Code</th></tr>
            {}
            </tbody></table>
            <p>Trailing prose with <a href="/wiki/Warbonds">Warbonds</a></p>
            </body></html>"##,
            rows.join("\n")
        )
    }

    fn parse(html: &str) -> (Result<Vec<WikiRecord>, SourceError>, Arc<MemoryLog>) {
        let log = Arc::new(MemoryLog::new());
        let dyn_log: Arc<dyn CoreLog> = log.clone();
        (parse_stratagem_page(html, &dyn_log), log)
    }

    #[test]
    fn extracts_rows_and_preserves_order() {
        let html = page(&[
            row("Reinforce", &["Up", "Down", "Right", "Left", "Up"]),
            row("MG-43 Machine Gun", &["Down", "Left", "Down", "Up", "Right"]),
        ]);
        let (res, log) = parse(&html);
        assert_eq!(
            res.unwrap(),
            vec![
                WikiRecord::new("Reinforce", vec![Up, Down, Right, Left, Up]),
                WikiRecord::new("MG-43 Machine Gun", vec![Down, Left, Down, Up, Right]),
            ]
        );
        assert!(log.warnings().is_empty());
    }

    #[test]
    fn navigation_and_arrowless_rows_are_ignored() {
        let html = page(&[
            row("Warbonds", &["Up", "Up", "Up"]),
            r#"<tr><td><a href="/wiki/Hangar">Hangar</a></td><td>no code here</td></tr>"#.to_string(),
            row("Hellbomb", &["Down", "Up", "Left", "Down", "Up", "Right", "Down", "Up"]),
        ]);
        let (res, log) = parse(&html);
        let recs = res.unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].source_name, "Hellbomb");
        assert!(log.warnings().is_empty());
    }

    #[test]
    fn unreadable_codes_are_dropped_with_a_warning() {
        let mut bad = row("Orbital Laser", &["Right", "Down", "Up"]);
        bad = bad.replace("Arrow 4 Down.png", "Arrow 4 Diagonal.png");
        let html = page(&[
            bad,
            row("Eagle Rearm", &["Up", "Up"]),
            row("Resupply", &["Down", "Down", "Up", "Right"]),
        ]);
        let (res, log) = parse(&html);
        assert_eq!(res.unwrap(), vec![WikiRecord::new("Resupply", vec![Down, Down, Up, Right])]);
        let warnings = log.warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("Orbital Laser"));
        assert!(warnings[1].contains("Eagle Rearm"));
    }

    #[test]
    fn duplicates_keep_the_first_row() {
        let html = page(&[
            row("Reinforce", &["Up", "Down", "Right", "Left", "Up"]),
            row("Reinforce", &["Down", "Down", "Down"]),
        ]);
        let (res, log) = parse(&html);
        let recs = res.unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].sequence[0], Up);
        assert_eq!(log.warnings().len(), 1);
    }

    #[test]
    fn names_are_decoded_and_trimmed() {
        let html = page(&[row(
            "AX/LAS-5 &quot;Guard Dog&quot;  Rover",
            &["Down", "Up", "Left", "Up", "Right", "Right"],
        )]);
        let (res, _) = parse(&html);
        assert_eq!(res.unwrap()[0].source_name, "AX/LAS-5 \"Guard Dog\" Rover");
    }

    #[test]
    fn page_without_tables_names_the_missing_fragment() {
        let (res, _) = parse("<html><body><p>Maintenance</p></body></html>");
        match res.unwrap_err() {
            SourceError::Parse { fragment, .. } => assert_eq!(fragment, "table.wikitable"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn tables_without_codes_are_a_parse_error() {
        let (res, _) = parse(&page(&[]));
        assert!(matches!(res, Err(SourceError::Parse { .. })));
    }
}
