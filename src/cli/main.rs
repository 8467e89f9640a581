use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use photo_meta::config::Config;
use photo_meta::manager::{MetadataManager, MetadataRecord};
use photo_meta::pipeline::{self, ApplyOptions, ApplyResult, ImageKind};
use photo_meta::store::TemplateStore;
use photo_meta::value::{Value, parse_field_value};

#[derive(Parser, Debug)]
#[command(
    name = "photo-meta",
    version,
    about = "Photo metadata editor: view, write and strip EXIF/XMP, and rename photos from templates"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Output results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Display EXIF and XMP metadata
    Show {
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,
    },

    /// Write metadata fields (`|` or `,` in a value makes a list)
    Set {
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,

        /// EXIF tag, e.g. --exif Artist="Ann Lee"
        #[arg(long = "exif", value_name = "TAG=VALUE", value_parser = parse_assignment)]
        exif: Vec<(String, String)>,

        /// XMP property, e.g. --xmp subject="sea | sky"
        #[arg(long = "xmp", value_name = "PROP=VALUE", value_parser = parse_assignment)]
        xmp: Vec<(String, String)>,

        /// Keep existing tags that are not overridden
        #[arg(long)]
        merge: bool,
    },

    /// Remove all EXIF and embedded XMP metadata
    Clear {
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,
    },

    /// Rename images from a naming pattern
    Rename {
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,

        /// Pattern such as "{date}_{title}_{sequence:03d}"
        #[arg(short, long, conflicts_with = "naming")]
        pattern: Option<String>,

        /// Name of a stored naming convention
        #[arg(short, long)]
        naming: Option<String>,

        /// Preview new names without renaming
        #[arg(long)]
        dry_run: bool,
    },

    /// Write a stored template and optionally rename
    Apply {
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,

        /// Name of a stored template
        #[arg(short, long)]
        template: Option<String>,

        /// Name of a stored naming convention
        #[arg(short, long)]
        naming: Option<String>,

        /// Keep existing tags that the template does not set
        #[arg(long)]
        merge: bool,

        /// Preview without modifying files
        #[arg(long)]
        dry_run: bool,
    },

    /// Manage metadata templates
    Templates {
        #[command(subcommand)]
        action: StoreAction,
    },

    /// Manage naming conventions
    Naming {
        #[command(subcommand)]
        action: StoreAction,
    },

    /// Write a default config.json and seed the template store
    Init,
}

#[derive(Subcommand, Debug)]
enum StoreAction {
    /// List stored entries
    #[command(alias = "ls")]
    List,
    /// Delete an entry by name
    Delete { name: String },
    /// Import an entry from a JSON file
    Import { file: PathBuf },
    /// Print an entry as JSON, or write it to a file
    Export {
        name: String,
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

fn parse_assignment(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn to_fields(pairs: &[(String, String)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.clone(), parse_field_value(v)))
        .collect()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let mut config = match cli.command {
        Command::Init => Config::default(),
        _ => Config::load(cli.config.as_deref())?,
    };
    if cli.json {
        config.output.json = true;
    }
    let manager = MetadataManager::new();

    match cli.command {
        Command::Show { paths } => {
            let images = collect(&paths)?;
            if config.output.json {
                let records: BTreeMap<String, MetadataRecord> = images
                    .iter()
                    .map(|p| (p.display().to_string(), manager.get_metadata(p)))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                for image in &images {
                    print_metadata(image, &manager.get_metadata(image));
                }
            }
        }

        Command::Set { paths, exif, xmp, merge } => {
            let exif = to_fields(&exif);
            let xmp = to_fields(&xmp);
            if exif.is_empty() && xmp.is_empty() {
                anyhow::bail!("Nothing to write. Pass at least one --exif or --xmp field.");
            }
            let merge = merge || config.merge;
            let images = collect(&paths)?;
            let mut failed = 0;
            for image in &images {
                if !xmp.is_empty()
                    && !ImageKind::from_path(image).is_some_and(|k| k.supports_embedded_xmp())
                {
                    log::warn!("XMP fields are ignored for {}", image.display());
                }
                if config.output.backup_originals {
                    pipeline::backup_file(image)?;
                }
                if manager.set_metadata(image, &exif, &xmp, merge) {
                    log::info!("Updated: {}", image.display());
                } else {
                    failed += 1;
                }
            }
            summarize(images.len(), failed)?;
        }

        Command::Clear { paths } => {
            let images = collect(&paths)?;
            let mut failed = 0;
            for image in &images {
                if config.output.backup_originals {
                    pipeline::backup_file(image)?;
                }
                if manager.delete_metadata(image) {
                    log::info!("Cleared: {}", image.display());
                } else {
                    failed += 1;
                }
            }
            summarize(images.len(), failed)?;
        }

        Command::Rename { paths, pattern, naming, dry_run } => {
            let pattern = match (pattern, naming) {
                (Some(p), _) => p,
                (None, Some(name)) => stored_pattern(&config, &name)?,
                (None, None) => anyhow::bail!("Pass --pattern or --naming."),
            };
            let images = collect(&paths)?;
            let options = ApplyOptions {
                dry_run: dry_run || config.output.dry_run,
                ..ApplyOptions::from_config(&config)
            };
            let results = pipeline::apply_template(&images, None, Some(pattern.as_str()), &options);
            report(&results, &config)?;
        }

        Command::Apply { paths, template, naming, merge, dry_run } => {
            if template.is_none() && naming.is_none() {
                anyhow::bail!("Pass --template and/or --naming.");
            }
            let store = config.open_store()?;
            let template = match template {
                Some(name) => Some(
                    store
                        .template(&name)
                        .with_context(|| format!("No template named '{name}'"))?,
                ),
                None => None,
            };
            let pattern = match naming {
                Some(name) => Some(stored_pattern(&config, &name)?),
                None => None,
            };
            let images = collect(&paths)?;
            let defaults = ApplyOptions::from_config(&config);
            let options = ApplyOptions {
                merge: merge || defaults.merge,
                dry_run: dry_run || defaults.dry_run,
                ..defaults
            };
            if options.dry_run {
                log::info!("DRY RUN, no files will be modified");
            }
            let results =
                pipeline::apply_template(&images, template.as_ref(), pattern.as_deref(), &options);
            report(&results, &config)?;
        }

        Command::Templates { action } => {
            let store = config.open_store()?;
            match action {
                StoreAction::List => {
                    let templates = store.get_templates();
                    if config.output.json {
                        println!("{}", serde_json::to_string_pretty(&templates)?);
                    } else {
                        for (name, t) in &templates {
                            println!("{BOLD}{name}{RESET}");
                            print_fields("EXIF", &t.exif);
                            print_fields("XMP", &t.xmp);
                        }
                    }
                }
                StoreAction::Delete { name } => {
                    if !store.delete_template(&name) {
                        anyhow::bail!("No template named '{name}'");
                    }
                    println!("Deleted template '{name}'");
                }
                StoreAction::Import { file } => {
                    let text = read_text(&file)?;
                    let name = store.import_template(&text)?;
                    println!("Template '{name}' imported successfully");
                }
                StoreAction::Export { name, output } => {
                    write_or_print(&store.export_template(&name)?, output.as_deref())?;
                }
            }
        }

        Command::Naming { action } => {
            let store = config.open_store()?;
            match action {
                StoreAction::List => {
                    let conventions = store.get_naming_conventions();
                    if config.output.json {
                        println!("{}", serde_json::to_string_pretty(&conventions)?);
                    } else {
                        for (name, n) in &conventions {
                            print_row(name, &n.pattern);
                        }
                    }
                }
                StoreAction::Delete { name } => {
                    if !store.delete_naming(&name) {
                        anyhow::bail!("No naming convention named '{name}'");
                    }
                    println!("Deleted naming convention '{name}'");
                }
                StoreAction::Import { file } => {
                    let text = read_text(&file)?;
                    let name = store.import_naming(&text)?;
                    println!("Naming convention '{name}' imported successfully");
                }
                StoreAction::Export { name, output } => {
                    write_or_print(&store.export_naming(&name)?, output.as_deref())?;
                }
            }
        }

        Command::Init => {
            let path = config.save(cli.config.as_deref())?;
            println!("Default config written to {}", path.display());
            let store = config.open_store()?;
            let seeded = store.seed_defaults()?;
            println!(
                "Template store ready at {} ({seeded} defaults added)",
                store.root().display()
            );
        }
    }

    Ok(())
}

fn collect(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let images = pipeline::collect_images(paths);
    if images.is_empty() {
        anyhow::bail!("No supported image files found in the specified paths.");
    }
    log::debug!("Found {} image(s)", images.len());
    Ok(images)
}

fn stored_pattern(config: &Config, name: &str) -> Result<String> {
    let store: TemplateStore = config.open_store()?;
    let naming = store
        .naming(name)
        .with_context(|| format!("No naming convention named '{name}'"))?;
    Ok(naming.pattern)
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn write_or_print(json: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn summarize(total: usize, failed: usize) -> Result<()> {
    log::info!("Done: {} succeeded, {failed} failed out of {total} images", total - failed);
    if failed > 0 {
        anyhow::bail!("{failed} file(s) failed");
    }
    Ok(())
}

fn report(results: &[ApplyResult], config: &Config) -> Result<()> {
    if config.output.json {
        println!("{}", serde_json::to_string_pretty(results)?);
    } else {
        for r in results {
            let from = r.path.file_name().unwrap_or_default().to_string_lossy();
            match (&r.error, &r.new_path) {
                (Some(err), _) => println!("  {RED}{from} : {err}{RESET}"),
                (None, Some(to)) if r.renamed => {
                    println!("  {GREEN}{from} → {}{RESET}", to.display())
                }
                (None, Some(to)) => println!("  {DIM}{from} → {}{RESET}", to.display()),
                (None, None) if r.written => println!("  {GREEN}{from} : metadata written{RESET}"),
                (None, None) => println!("  {DIM}{from} : unchanged{RESET}"),
            }
        }
    }
    let failed = results.iter().filter(|r| r.error.is_some()).count();
    summarize(results.len(), failed)
}

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Max width for the value column before wrapping.
const VAL_WIDTH: usize = 46;
/// Indent for continuation lines (tag column width + " : " = 25 chars + 2 leading spaces).
const INDENT: &str = "                           ";

/// Print a file's metadata, EXIF then XMP.
fn print_metadata(path: &Path, record: &MetadataRecord) {
    println!();
    println!("{BOLD}File:{RESET} {}", path.display());
    println!("{DIM}{}{RESET}", "═".repeat(72));

    if record.is_empty() {
        println!("  {DIM}(no metadata found){RESET}");
        println!();
        return;
    }
    print_fields("EXIF", &record.exif);
    print_fields("XMP", &record.xmp);
}

fn print_fields(title: &str, fields: &BTreeMap<String, Value>) {
    if fields.is_empty() {
        return;
    }
    println!("  {BOLD}{title}{RESET}");
    println!("  {DIM}{}{RESET}", "─".repeat(70));
    for (tag, value) in fields {
        print_row(tag, &value.to_string());
    }
    println!();
}

/// Print a single row in the metadata display table.
fn print_row(tag: &str, val: &str) {
    let tag_col = format!("{:<22}", tag);
    let lines = wrap_text(val, VAL_WIDTH);
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            println!("  {tag_col} : {line}");
        } else {
            println!("  {INDENT}{line}");
        }
    }
}

/// Wrap text at word boundaries to fit within max_width.
fn wrap_text(s: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in s.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.len() + 1 + word.len() <= max_width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(current_line);
            current_line = word.to_string();
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(s.to_string());
    }

    lines
}
