//! `bac` - Backstage catalog autocomplete
//!
//! # Commands
//! - `bac serve`: JSON-lines completion session on stdin/stdout (see `session`)
//! - `bac fetch`: fetch the catalog once and print what was indexed
//! - `bac complete <field> [partial]` / `bac complete --line <prefix>`:
//!   fetch, then print matching candidates as JSON
//!
//! Logs go to stderr; stdout carries only command output.

use backstage_autocomplete::{
    resolve, resolve_line, Candidate, CatalogClient, CatalogError, CatalogIndex, EntitySource,
    FileSource, Overrides, Result, Session, Settings, TableKey, Unconfigured,
};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "bac", version, about = "Backstage catalog autocomplete")]
struct Cli {
    /// Backstage base URL (e.g. https://backstage.example.com)
    #[arg(long, global = true, env = "BACKSTAGE_BASE_URL")]
    base_url: Option<String>,

    /// Dump raw catalog payloads to stderr and log at debug level
    #[arg(long, global = true, env = "BACKSTAGE_DEBUG")]
    debug: bool,

    /// HTTP timeout in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Settings file (defaults to <config dir>/backstage-autocomplete/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Read a saved /api/catalog/entities response instead of calling Backstage
    #[arg(long, global = true)]
    from_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a completion session over stdin/stdout
    Serve,
    /// Fetch the catalog and print an index summary
    Fetch,
    /// Fetch the catalog and print completions for one field
    Complete {
        /// Field name, e.g. system, owner, kind
        #[arg(required_unless_present = "line")]
        field: Option<String>,

        /// Text already typed after the field
        #[arg(default_value = "")]
        partial: String,

        /// Line text up to the cursor, e.g. "  owner: te"
        #[arg(long, conflicts_with = "field")]
        line: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        error!("Error: {}", e);
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref())?.with_overrides(Overrides {
        base_url: cli.base_url,
        debug: cli.debug,
        timeout_secs: cli.timeout_secs,
    });
    debug!("Settings: {:?}", settings);

    let source = entity_source(cli.from_file, &settings, &cli.command)?;

    match cli.command {
        Command::Serve => {
            let session = Session::new(source);
            let stdin = io::stdin();
            session.run(stdin.lock(), io::stdout().lock())
        }
        Command::Fetch => {
            let index = fetch_index(&*source)?;
            print_summary(&index);
            Ok(())
        }
        Command::Complete {
            field,
            partial,
            line,
        } => {
            let candidates = complete(&*source, field.as_deref(), &partial, line.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&candidates)?);
            Ok(())
        }
    }
}

/// A saved response wins over HTTP. Only `serve` may start without a base URL.
fn entity_source(
    from_file: Option<PathBuf>,
    settings: &Settings,
    command: &Command,
) -> Result<Box<dyn EntitySource>> {
    if let Some(path) = from_file {
        return Ok(Box::new(FileSource::new(path, settings.debug)));
    }
    match CatalogClient::new(settings) {
        Ok(client) => Ok(Box::new(client)),
        Err(CatalogError::MissingBaseUrl) if matches!(command, Command::Serve) => {
            warn!("No Backstage base URL configured; refreshes will fail until one is set");
            Ok(Box::new(Unconfigured))
        }
        Err(e) => Err(e),
    }
}

/// `--line` takes precedence over a field name.
fn complete(
    source: &dyn EntitySource,
    field: Option<&str>,
    partial: &str,
    line: Option<&str>,
) -> Result<Vec<Candidate>> {
    let index = fetch_index(source)?;
    Ok(match (line, field) {
        (Some(line), _) => resolve_line(line, &index),
        (None, Some(field)) => resolve(field, partial, &index),
        (None, None) => Vec::new(),
    })
}

fn fetch_index(source: &dyn EntitySource) -> Result<CatalogIndex> {
    let decoded = source.fetch_entities()?;
    if decoded.skipped > 0 {
        info!("Skipped {} malformed catalog records", decoded.skipped);
    }
    Ok(CatalogIndex::build(&decoded.entities))
}

fn print_summary(index: &CatalogIndex) {
    println!(
        "{} {} entities",
        "Backstage entities fetched successfully!".green(),
        index.entity_count()
    );

    for key in TableKey::ALL {
        let table = index.table(key);
        println!(
            "  {:<10} {}",
            key.entity_kind().bold(),
            table.len().to_string().cyan()
        );
        for (name, description) in table.iter() {
            if description.is_empty() {
                println!("    {}", name);
            } else {
                println!("    {} {}", name, format!("- {}", description).dimmed());
            }
        }
    }

    let join = |values: &indexmap::IndexSet<String>| {
        values.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
    };
    println!("  {:<10} {}", "kinds".bold(), join(index.kinds()));
    println!("  {:<10} {}", "types".bold(), join(index.types()));
    println!("  {:<10} {}", "lifecycles".bold(), join(index.lifecycles()));
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const CATALOG: &str = r#"[
        {"kind":"System","metadata":{"name":"payments","description":"Payments system"}},
        {"kind":"Group","metadata":{"name":"team-a"}},
        {"kind":"Group","metadata":{"name":"platform"}},
        {"kind":"Component","metadata":{"name":"payments-api"},"spec":{"type":"service"}}
    ]"#;

    fn write_catalog(tag: &str) -> PathBuf {
        let path =
            std::env::temp_dir().join(format!("bac-main-{}-{}.json", tag, std::process::id()));
        fs::write(&path, CATALOG).unwrap();
        path
    }

    fn values(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.value.as_str()).collect()
    }

    #[test]
    fn test_serve_starts_without_base_url() {
        let source = entity_source(None, &Settings::default(), &Command::Serve).unwrap();
        assert!(matches!(
            source.fetch_entities(),
            Err(CatalogError::MissingBaseUrl)
        ));
    }

    #[test]
    fn test_one_shot_commands_need_base_url() {
        for command in [
            Command::Fetch,
            Command::Complete {
                field: Some("system".to_string()),
                partial: String::new(),
                line: None,
            },
        ] {
            match entity_source(None, &Settings::default(), &command) {
                Err(CatalogError::MissingBaseUrl) => {}
                Err(other) => panic!("unexpected error: {other}"),
                Ok(_) => panic!("{:?} started without a base URL", command),
            }
        }
    }

    #[test]
    fn test_from_file_needs_no_base_url() {
        let path = write_catalog("source");
        let source = entity_source(Some(path.clone()), &Settings::default(), &Command::Fetch)
            .unwrap();
        let decoded = source.fetch_entities().unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(decoded.entities.len(), 4);
    }

    #[test]
    fn test_complete_by_field_and_by_line() {
        let path = write_catalog("complete");
        let source = FileSource::new(&path, false);

        let by_field = complete(&source, Some("owner"), "", None).unwrap();
        let by_line = complete(&source, None, "", Some("  owner: pl")).unwrap();
        let line_wins = complete(&source, Some("system"), "", Some("kind: ")).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(values(&by_field), vec!["team-a", "platform"]);
        assert_eq!(by_field[0].detail, "Group entity");
        assert_eq!(values(&by_line), vec!["platform"]);
        assert_eq!(values(&line_wins), vec!["System", "Group", "Component"]);
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["bac", "complete", "--line", "  owner: te"]).unwrap();
        match cli.command {
            Command::Complete { field, line, .. } => {
                assert_eq!(field, None);
                assert_eq!(line.as_deref(), Some("  owner: te"));
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let cli = Cli::try_parse_from(["bac", "complete", "system", "pay"]).unwrap();
        match cli.command {
            Command::Complete { field, partial, .. } => {
                assert_eq!(field.as_deref(), Some("system"));
                assert_eq!(partial, "pay");
            }
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Cli::try_parse_from(["bac", "complete"]).is_err());
        assert!(Cli::try_parse_from(["bac", "complete", "system", "--line", "kind: "]).is_err());
    }
}
