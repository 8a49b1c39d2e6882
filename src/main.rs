use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

// Use library instead of local modules
use collection_import::{
    setup_database, BatchStatus, ImportConfig, ImportEngine, ImportFormat, ImportMode,
    RemoteCatalog, SqliteCatalog, SqliteOwnership,
};

const USAGE: &str = "Usage: collection-import [--config PATH] commit|preview \
                     [--format delver|csv|sqlite|json] [--mode add|replace] FILE...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Commit,
    Preview,
}

#[derive(Debug)]
struct CliArgs {
    config_path: PathBuf,
    command: Command,
    format: Option<ImportFormat>,
    mode: ImportMode,
    files: Vec<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<CliArgs> {
    let mut config_path = PathBuf::from("collection-import.toml");
    let mut command = None;
    let mut format = None;
    let mut mode = ImportMode::Add;
    let mut files = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let value = iter.next().context("--config needs a path")?;
                config_path = PathBuf::from(value);
            }
            "--format" => {
                let value = iter.next().context("--format needs a value")?;
                format = Some(value.parse::<ImportFormat>().map_err(anyhow::Error::msg)?);
            }
            "--mode" => {
                let value = iter.next().context("--mode needs a value")?;
                mode = value.parse::<ImportMode>().map_err(anyhow::Error::msg)?;
            }
            "commit" if command.is_none() => command = Some(Command::Commit),
            "preview" if command.is_none() => command = Some(Command::Preview),
            flag if flag.starts_with("--") => bail!("Unknown option: {}\n{}", flag, USAGE),
            file => files.push(PathBuf::from(file)),
        }
    }

    let Some(command) = command else {
        bail!("Missing command\n{}", USAGE);
    };
    if files.is_empty() {
        bail!("No input files\n{}", USAGE);
    }

    Ok(CliArgs {
        config_path,
        command,
        format,
        mode,
        files,
    })
}

#[cfg(feature = "scryfall")]
fn remote_catalog(config: &ImportConfig) -> Result<Box<dyn RemoteCatalog>> {
    let client = collection_import::ScryfallClient::new(&config.remote)?;
    Ok(Box::new(client))
}

#[cfg(not(feature = "scryfall"))]
fn remote_catalog(_config: &ImportConfig) -> Result<Box<dyn RemoteCatalog>> {
    Ok(Box::new(collection_import::OfflineCatalog))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let cli = parse_args(&args)?;

    let config = ImportConfig::load(&cli.config_path)?;

    let format = match cli.format {
        Some(format) => format,
        None => cli
            .files
            .first()
            .and_then(|p| ImportFormat::from_path(p))
            .context("Cannot guess the format from the file extension, pass --format")?,
    };

    println!("🃏 Collection Import v{}", collection_import::VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Open database
    println!("\n🔧 Opening {}...", config.database_path.display());
    let conn = Connection::open(&config.database_path)
        .with_context(|| format!("Failed to open {}", config.database_path.display()))?;
    setup_database(&conn)?;
    println!("✓ Database ready (WAL mode)");

    let catalog = SqliteCatalog::new(&conn);
    let ownership = SqliteOwnership::new(&conn);
    let remote = remote_catalog(&config)?;

    let engine =
        ImportEngine::new(&catalog, &ownership, remote.as_ref(), &config).with_audit_log(&conn);

    // 2. Run
    match cli.command {
        Command::Preview => {
            println!("\n🔭 Previewing {} file(s) as {}...", cli.files.len(), format);
            let report = engine.preview(&cli.files, format);

            println!(
                "✓ {} cards ({} unique), {} skipped",
                report.total_cards, report.unique_cards, report.skipped
            );
            if !report.missing_sets.is_empty() {
                println!("⚠️  Sets not in catalog: {:?}", report.missing_sets);
            }

            println!("\n{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Commit => {
            println!(
                "\n💾 Importing {} file(s) as {} ({} mode)...",
                cli.files.len(),
                format,
                cli.mode
            );
            let result = engine.commit(&cli.files, format, cli.mode);

            for set in &result.downloaded_sets {
                println!(
                    "✓ Downloaded set {} ({}, {} cards)",
                    set.code, set.name, set.card_count
                );
            }
            for error in &result.errors {
                println!("❌ {}", error);
            }

            println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            match result.status() {
                BatchStatus::Succeeded => println!("✅ {}", result.summary()),
                BatchStatus::SucceededWithWarnings => println!("⚠️  {}", result.summary()),
                BatchStatus::Failed => println!("❌ Import failed: {}", result.summary()),
            }

            println!("\n{}", serde_json::to_string_pretty(&result)?);

            if result.status() == BatchStatus::Failed {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
