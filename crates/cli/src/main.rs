//! Keep the Helldivers 2 plugin assets in sync with the wiki and the icon repository.
//!
//! Examples:
//!   hd2-assets discover
//!   hd2-assets generate-all --dry-run
//!   hd2-assets icons --size 72 --output-dir ./preview
//!   hd2-assets --root ../plugin --config ./pipeline.json validate
//!   hd2-assets list --format sequences
//!
//! Notes:
//! - The mapping table is loaded and checked before any network access.
//! - `validate` and `list` only read local files.
//! - Exit status: 0 ok, 1 per-entry errors or validation findings, 2 fatal error.

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;

use streamdeck_hd2_core::prelude::*;

// ───────────────────────────── CLI Args ─────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "hd2-assets",
    version,
    about = "Sync stratagem sequences, labels and icons for the Stream Deck plugin"
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Plugin checkout that relative paths resolve against (default: .)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Optional JSON file overriding pipeline settings
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Do everything except writing files
    #[arg(long, global = true)]
    dry_run: bool,

    /// Verbose logging (debug level, stale mapping lists)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Exit 0 even if some entries failed
    #[arg(long, global = true)]
    ignore_errors: bool,

    /// Read icons from a local checkout of the icon repository instead of downloading it
    #[arg(long, global = true, value_name = "DIR")]
    icon_source: Option<PathBuf>,

    /// Worker threads for icon rendering
    #[arg(long, global = true)]
    workers: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report wiki entries and icons missing from the mapping table
    Discover {
        /// Exit 1 when anything upstream is unmapped
        #[arg(long)]
        fail_on_unmapped: bool,
    },
    /// Regenerate sequences, locales and icons
    GenerateAll {
        #[command(flatten)]
        icons: IconArgs,
    },
    /// Regenerate icons only
    Icons {
        #[command(flatten)]
        icons: IconArgs,
    },
    /// Regenerate the locale file only (offline)
    Locales,
    /// Regenerate the sequence table only
    Sequences,
    /// Check every mapped key has all artifacts, and flag orphans (offline)
    Validate,
    /// Print mapped entries (offline)
    List {
        #[arg(long, value_enum, default_value_t = ListFormat::Keys)]
        format: ListFormat,
    },
}

#[derive(clap::Args, Debug, Default)]
struct IconArgs {
    /// Icon edge length in pixels
    #[arg(long)]
    size: Option<u32>,

    /// Share of the canvas the artwork fills, in (0, 1]
    #[arg(long)]
    icon_scale: Option<f32>,

    /// Write icons here instead of the configured icon directory
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ListFormat {
    Keys,
    Names,
    Sequences,
    Json,
}

// ───────────────────────────── Logger ─────────────────────────────

/// Forwards core log lines to `tracing`.
struct TracingLog;

impl CoreLog for TracingLog {
    fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }
    fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }
    fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }
    fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// ───────────────────────────── main ─────────────────────────────

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);
    let logger: Arc<dyn CoreLog> = Arc::new(TracingLog);

    match run(&args, &logger) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::from(2)
        }
    }
}

fn run(args: &Args, logger: &Arc<dyn CoreLog>) -> Result<ExitCode, PipelineError> {
    let config = load_config(args)?;
    logger.debug(&format!("settings: {config:?}"));

    // Table problems stop the run before anything is fetched.
    let registry = MappingRegistry::load(config.mappings_file())?;
    config.check_registry(&registry)?;
    logger.info(&format!(
        "{} mapped stratagems in {}",
        registry.len(),
        config.mappings_file().display()
    ));

    let pipeline = Pipeline::new(&registry, &config, logger).dry_run(args.dry_run);

    let code = match &args.command {
        Command::Discover { fail_on_unmapped } => {
            let wiki = HttpWikiSource::new(&config)?;
            let catalog = icon_catalog(args, &config)?;
            let report = pipeline.discover(&wiki, catalog.as_ref())?;
            print_discovery(&report, args.verbose)?;
            if *fail_on_unmapped && !report.is_fully_mapped() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Command::GenerateAll { .. } => {
            let wiki = HttpWikiSource::new(&config)?;
            let catalog = icon_catalog(args, &config)?;
            let report = match pipeline.generate_all(&wiki, catalog.as_ref()) {
                Ok(report) => report,
                Err(PipelineError::Interrupted { completed, source }) => {
                    for result in &completed {
                        print_generation(result, args.dry_run);
                    }
                    return Err(*source);
                }
                Err(e) => return Err(e),
            };
            for result in &report.results {
                print_generation(result, args.dry_run);
            }
            entry_errors_code(report.has_errors(), args.ignore_errors)
        }
        Command::Icons { .. } => {
            let catalog = icon_catalog(args, &config)?;
            let result = pipeline.generate_icons(catalog.as_ref())?;
            print_generation(&result, args.dry_run);
            entry_errors_code(result.has_errors(), args.ignore_errors)
        }
        Command::Locales => {
            let result = pipeline.generate_locales()?;
            print_generation(&result, args.dry_run);
            entry_errors_code(result.has_errors(), args.ignore_errors)
        }
        Command::Sequences => {
            let wiki = HttpWikiSource::new(&config)?;
            let result = pipeline.generate_sequences(&wiki)?;
            print_generation(&result, args.dry_run);
            entry_errors_code(result.has_errors(), args.ignore_errors)
        }
        Command::Validate => {
            let report = pipeline.validate()?;
            print_validation(&report);
            if report.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Command::List { format } => {
            print_list(&pipeline.list()?, *format)?;
            ExitCode::SUCCESS
        }
    };
    Ok(code)
}

// ───────────────────────────── helpers ─────────────────────────────

/// Defaults, then `--config`, then individual flags.
fn load_config(args: &Args) -> Result<PipelineConfig, ConfigError> {
    let mut config = match args.config.as_ref() {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(root) = args.root.as_ref() {
        config.root = root.clone();
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Command::GenerateAll { icons } | Command::Icons { icons } = &args.command {
        if let Some(size) = icons.size {
            config.icons.size = size;
        }
        if let Some(scale) = icons.icon_scale {
            config.icons.scale = scale;
        }
        if let Some(dir) = icons.output_dir.as_ref() {
            config.icons_dir = dir.clone();
        }
    }
    config.validate()?;
    Ok(config)
}

fn icon_catalog(args: &Args, config: &PipelineConfig) -> Result<Box<dyn AssetCatalog>, SourceError> {
    Ok(match args.icon_source.as_ref() {
        Some(dir) => Box::new(DirectoryCatalog::new(dir)),
        None => Box::new(ArchiveCatalog::new(config)?),
    })
}

fn entry_errors_code(has_errors: bool, ignore_errors: bool) -> ExitCode {
    if has_errors && !ignore_errors {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

fn arrows(seq: &[Direction]) -> String {
    seq.iter()
        .map(|d| d.arrow().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_discovery(report: &DiscoveryReport, verbose: bool) -> Result<(), PipelineError> {
    println!(
        "Discovery report ({})",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );

    println!(
        "\nWiki stratagems not in the mapping table ({}):",
        report.unmapped_wiki_records.len()
    );
    for rec in &report.unmapped_wiki_records {
        println!("  - {}  [{}]", rec.source_name, arrows(&rec.sequence));
    }

    println!(
        "\nIcons not in the mapping table ({}):",
        report.unmapped_asset_records.len()
    );
    for rec in &report.unmapped_asset_records {
        println!("  - {} ({})", rec.asset_name, rec.category);
    }

    if !report.suggested_entries.is_empty() {
        println!(
            "\nSuggested entries ({}), review before pasting into the mapping table:",
            report.suggested_entries.len()
        );
        for s in &report.suggested_entries {
            let row = json!({
                "source": s.source_name,
                "asset": s.asset_name,
                "name": s.display_name,
            });
            let line = format!("{}: {},", serde_json::to_string(&s.key)?, serde_json::to_string(&row)?);
            match s.collides_with.as_ref() {
                Some(existing) => println!("  {line}  // key collides with `{existing}`"),
                None => println!("  {line}"),
            }
        }
    }

    if verbose {
        println!(
            "\nMapped wiki names not found upstream ({}):",
            report.stale_source_names.len()
        );
        for s in &report.stale_source_names {
            println!("  - {}: {}", s.key, s.name);
        }
        println!(
            "\nMapped icon names not found upstream ({}):",
            report.stale_asset_names.len()
        );
        for s in &report.stale_asset_names {
            println!("  - {}: {}", s.key, s.name);
        }
    }

    if report.is_fully_mapped() {
        println!("\n✅ Everything upstream is mapped.");
    }
    Ok(())
}

fn print_generation(result: &GenerationResult, dry_run: bool) {
    println!(
        "{}: {} {}, {} skipped",
        result.artifact.name(),
        result.written.len(),
        if dry_run { "would be written" } else { "written" },
        result.skipped.len()
    );
    for (key, err) in &result.errors {
        println!("  ! {key}: {err}");
    }
}

fn print_validation(report: &ValidationReport) {
    let sections = [
        ("Missing icons", &report.missing_icon),
        ("Missing sequences", &report.missing_sequence),
        ("Missing labels", &report.missing_label),
    ];
    for (title, keys) in sections {
        if keys.is_empty() {
            continue;
        }
        println!("{title} ({}):", keys.len());
        for key in keys {
            println!("  - {key}");
        }
    }
    if !report.orphaned_artifacts.is_empty() {
        println!(
            "Orphaned artifacts ({}), not in the mapping table:",
            report.orphaned_artifacts.len()
        );
        for orphan in &report.orphaned_artifacts {
            println!("  - {} ({})", orphan.key, orphan.artifact.name());
        }
    }
    if report.is_clean() {
        println!("✅ All artifacts present, no orphans.");
    }
}

fn print_list(entries: &[ListedEntry], format: ListFormat) -> Result<(), PipelineError> {
    match format {
        ListFormat::Keys => {
            for e in entries {
                println!("{}", e.key);
            }
        }
        ListFormat::Names => {
            for e in entries {
                println!("{}\t{}", e.key, e.display_name);
            }
        }
        ListFormat::Sequences => {
            for e in entries {
                let seq = e
                    .sequence
                    .as_deref()
                    .map(arrows)
                    .unwrap_or_else(|| "(no sequence)".to_string());
                println!("{}\t{}", e.key, seq);
            }
        }
        ListFormat::Json => println!("{}", serde_json::to_string_pretty(entries)?),
    }
    Ok(())
}
