//! Zalo Data Extractor - Browse and export the `SQLite` data of the Zalo desktop app.
//!
//! Opens a working copy of a Zalo database read-only, pages through its
//! tables, and extracts contacts, groups, messages and the account owner
//! into terminal tables or CSV / XLSX / HTML files.
//!
//! QUICK START:
//!   zl-extract tables Storage.db                    # List tables
//!   zl-extract browse Storage.db -t messages -p 2   # Second page of a table
//!   zl-extract contacts Storage.db -e xlsx          # Contacts to a workbook
//!   zl-extract login --config-file database-config.json --storage Storage.db
//!   zl-extract user                                 # Show the remembered account
//!   zl-extract export-all Storage.db -f csv         # Everything, one file per type
//!   zl-extract acquire ZaloData --consent           # Hashed copy of a data folder

mod application;
mod cli;
mod domain;
mod infrastructure;

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{
    extract_active_uid, find_user, format_contacts, format_groups, format_messages, format_page,
    format_rows, format_stats, format_table_list, format_user, load_contacts, load_groups,
    load_messages, search_rows, write_table, write_workbook, ExportFormat, Pager, RecordTable,
};
use cli::{Cli, Commands, ExportArgs};
use domain::{AppConfig, AppError, ExtractionStats, Page, Record};
use infrastructure::app_state::{KEY_CONFIG_PATH, KEY_STORAGE_PATH, KEY_UID};
use infrastructure::{
    acquire, ensure_config_exists, find_sqlite_files, load_config, AppState, Custody, Session,
};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Main application logic.
async fn run(cli: Cli) -> domain::Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Tables { db } => cmd_tables(&config, &db).await?,
        Commands::Browse {
            db,
            table,
            page,
            page_size,
            interactive,
            search,
            export,
        } => {
            let options = BrowseOptions {
                pager: Pager::new(page_size.unwrap_or(config.browse.page_size))?,
                interactive,
                search,
            };
            cmd_browse(&config, &db, &table, page, &options, &export).await?;
        }
        Commands::Contacts { db, export } => cmd_contacts(&config, &db, &export).await?,
        Commands::Groups {
            db,
            type_filter,
            export,
        } => {
            let mut config = config;
            if let Some(filter) = type_filter {
                config.extract.group_type = filter;
            }
            cmd_groups(&config, &db, &export).await?;
        }
        Commands::Messages { db, limit, export } => {
            let mut config = config;
            if let Some(limit) = limit {
                config.extract.message_limit = limit;
            }
            cmd_messages(&config, &db, &export).await?;
        }
        Commands::Uid { config_file } => cmd_uid(&config_file)?,
        Commands::Login {
            config_file,
            storage,
        } => cmd_login(&config, &config_file, &storage).await?,
        Commands::User { uid, storage } => cmd_user(&config, uid, storage).await?,
        Commands::ExportAll { db, format, dir } => {
            cmd_export_all(&config, &db, format, dir.as_deref()).await?;
        }
        Commands::Scan { dir } => cmd_scan(&dir)?,
        Commands::Acquire {
            input,
            out,
            case_id,
            collector,
            reason,
            consent,
        } => {
            let custody = Custody {
                case_id,
                collector,
                reason,
                consent,
            };
            let out = out.unwrap_or_else(|| config.acquisitions_dir());
            cmd_acquire(&input, &out, &custody)?;
        }
        Commands::State { clear } => cmd_state(&config, clear)?,
        Commands::Paths { init } => cmd_paths(&config, cli.config.as_deref(), init)?,
    }

    Ok(())
}

fn open_session(config: &AppConfig, db: &Path) -> domain::Result<Session> {
    let session = Session::open(db, &config.storage, &config.work_dir())?;
    tracing::debug!(opened = %session.opened_path().display(), "Session ready");
    println!(
        "{} {} {}",
        "📂".bold(),
        session.source().display(),
        format!("(sha256 {})", session.fingerprint()).dimmed()
    );
    Ok(session)
}

/// List tables command.
async fn cmd_tables(config: &AppConfig, db: &Path) -> domain::Result<()> {
    let session = open_session(config, db)?;
    let tables = session.list_tables().await?;

    println!("{}", format_table_list(&tables));
    println!("Total: {} table(s)", tables.len());
    Ok(())
}

/// How `browse` pages and filters.
struct BrowseOptions {
    pager: Pager,
    interactive: bool,
    search: Option<String>,
}

/// Browse a table starting at `page` (1-based).
async fn cmd_browse(
    config: &AppConfig,
    db: &Path,
    table: &str,
    page: u64,
    options: &BrowseOptions,
    export: &ExportArgs,
) -> domain::Result<()> {
    let page_index = page.checked_sub(1).ok_or_else(|| AppError::Config {
        message: "Page numbers start at 1".into(),
    })?;

    let pager = &options.pager;
    let search = options.search.as_deref();

    let session = open_session(config, db)?;
    let mut current = pager.load_page(&session, table, page_index).await?;
    print_page(&current, search);

    if options.interactive {
        let stdin = std::io::stdin();
        loop {
            print!("[n]ext [p]rev [q]uit > ");
            std::io::stdout()
                .flush()
                .map_err(|e| AppError::io("Failed to write prompt", e))?;

            let mut line = String::new();
            let read = stdin
                .read_line(&mut line)
                .map_err(|e| AppError::io("Failed to read input", e))?;

            let moved = match line.trim() {
                "n" | "next" => pager.next(&session, &current).await?,
                "p" | "prev" => pager.prev(&session, &current).await?,
                "q" | "quit" => break,
                _ if read == 0 => break,
                _ => continue,
            };

            match moved {
                Some(page) => {
                    current = page;
                    print_page(&current, search);
                }
                None => println!("{}", "No page in that direction".dimmed()),
            }
        }
    }

    if let Some(format) = export.export {
        let records = RecordTable::from_page(&current);
        let stem = format!("{}_page{}", current.table, current.page_index + 1);
        let path = export_path(config, export.output.as_deref(), &stem, format);
        write_table(&records, format, &path)?;
        print_exported(records.rows.len(), &path);
    }

    Ok(())
}

fn print_page(page: &Page, search: Option<&str>) {
    match search {
        Some(query) => {
            let matches = search_rows(page, query);
            println!("{}", format_rows(&page.columns, &matches));
            println!(
                "{} of {} row(s) on page {} / {} match '{}'",
                matches.len().to_string().cyan(),
                page.rows.len(),
                page.page_index + 1,
                page.page_count(),
                query
            );
        }
        None => println!("{}", format_page(page)),
    }

    let number = page.page_index + 1;
    if page.has_prev() {
        println!("  ◀ Prev: --page {}", number - 1);
    }
    if page.has_next() {
        println!("  ▶ Next: --page {}", number + 1);
    }
}

/// Extract contacts command.
async fn cmd_contacts(config: &AppConfig, db: &Path, export: &ExportArgs) -> domain::Result<()> {
    let session = open_session(config, db)?;
    let contacts = load_contacts(&session, &config.extract).await?;

    println!("{}", format_contacts(&contacts));
    println!("Total: {} contact(s)", contacts.len());
    export_records(config, &contacts, export)
}

/// Extract groups command.
async fn cmd_groups(config: &AppConfig, db: &Path, export: &ExportArgs) -> domain::Result<()> {
    let session = open_session(config, db)?;
    let groups = load_groups(&session, &config.extract).await?;

    println!("{}", format_groups(&groups));
    println!("Total: {} group(s)", groups.len());
    export_records(config, &groups, export)
}

/// Extract messages command.
async fn cmd_messages(config: &AppConfig, db: &Path, export: &ExportArgs) -> domain::Result<()> {
    let session = open_session(config, db)?;
    let messages = load_messages(&session, &config.extract).await?;

    println!("{}", format_messages(&messages));
    println!("Total: {} message(s)", messages.len());
    export_records(config, &messages, export)
}

fn export_records<T: Record>(
    config: &AppConfig,
    records: &[T],
    export: &ExportArgs,
) -> domain::Result<()> {
    let Some(format) = export.export else {
        return Ok(());
    };

    let table = RecordTable::from_records(records)?;
    let path = export_path(config, export.output.as_deref(), &table.title.to_lowercase(), format);
    write_table(&table, format, &path)?;
    print_exported(table.rows.len(), &path);
    Ok(())
}

/// Print the active uid of a `database-config.json`.
fn cmd_uid(config_file: &Path) -> domain::Result<()> {
    println!("{}", read_active_uid(config_file)?);
    Ok(())
}

/// Remember the picked files and the uid, then show the account.
async fn cmd_login(config: &AppConfig, config_file: &Path, storage: &Path) -> domain::Result<()> {
    let uid = read_active_uid(config_file)?;
    if !storage.is_file() {
        return Err(AppError::DatabaseNotFound {
            path: storage.to_path_buf(),
        });
    }

    let state = AppState::open(&config.state_db_path())?;
    state.set(KEY_CONFIG_PATH, &absolute(config_file).to_string_lossy())?;
    state.set(KEY_STORAGE_PATH, &absolute(storage).to_string_lossy())?;
    state.set(KEY_UID, &uid)?;
    tracing::info!(uid = %uid, "Saved login state");

    println!("{} Logged in as {}", "✓".green().bold(), uid.cyan());

    let session = open_session(config, storage)?;
    let user = find_user(&session, &config.extract, &uid).await?;
    println!("{}", format_user(&user));
    Ok(())
}

/// Show the account owner, falling back to the remembered uid and storage.
async fn cmd_user(
    config: &AppConfig,
    uid: Option<String>,
    storage: Option<PathBuf>,
) -> domain::Result<()> {
    let state = AppState::open(&config.state_db_path())?;

    let uid = match uid {
        Some(uid) => uid,
        None => state
            .get(KEY_UID)?
            .ok_or_else(|| AppError::not_found("remembered uid (run `login` or pass --uid)"))?,
    };
    let storage = match storage {
        Some(path) => path,
        None => state.get(KEY_STORAGE_PATH)?.map(PathBuf::from).ok_or_else(|| {
            AppError::not_found("remembered storage path (run `login` or pass --storage)")
        })?,
    };

    let session = open_session(config, &storage)?;
    let user = find_user(&session, &config.extract, &uid).await?;
    println!("{}", format_user(&user));
    Ok(())
}

/// Export contacts, groups and messages together.
async fn cmd_export_all(
    config: &AppConfig,
    db: &Path,
    format: ExportFormat,
    dir: Option<&Path>,
) -> domain::Result<()> {
    let session = open_session(config, db)?;

    let contacts = load_contacts(&session, &config.extract).await?;
    let groups = load_groups(&session, &config.extract).await?;
    let messages = load_messages(&session, &config.extract).await?;

    let stats = ExtractionStats {
        contacts: contacts.len(),
        groups: groups.len(),
        messages: messages.len(),
    };
    let tables = [
        RecordTable::from_records(&contacts)?,
        RecordTable::from_records(&groups)?,
        RecordTable::from_records(&messages)?,
    ];

    let dir = dir.map_or_else(|| config.exports_dir(), Path::to_path_buf);
    let stamp = timestamp();

    if format == ExportFormat::Xlsx {
        let path = dir.join(format!("zalo_export_{stamp}.xlsx"));
        write_workbook(&tables, &path)?;
        println!("{} Workbook → {}", "✓".green(), path.display());
    } else {
        for table in &tables {
            let path = dir.join(format!(
                "{}_{stamp}.{}",
                table.title.to_lowercase(),
                format.extension()
            ));
            write_table(table, format, &path)?;
            println!("{} {} → {}", "✓".green(), table.title.cyan(), path.display());
        }
    }

    println!();
    println!("{}", format_stats(&stats));
    println!("\n{} Exported to {}/", "📁".bold(), dir.display());
    Ok(())
}

/// Find database files under a directory.
fn cmd_scan(dir: &Path) -> domain::Result<()> {
    let files = find_sqlite_files(dir)?;

    println!("{}", "🔍 SQLite files".bold());
    println!();
    for (i, path) in files.iter().enumerate() {
        println!("  {}. {}", i + 1, path.display());
    }
    println!();
    println!("Total: {} file(s)", files.len());
    Ok(())
}

/// Copy a data folder into a hashed acquisition workspace.
fn cmd_acquire(input: &Path, out: &Path, custody: &Custody) -> domain::Result<()> {
    let acquisition = acquire(input, out, custody)?;

    println!(
        "{} Acquired {} file(s), {} bytes",
        "✓".green().bold(),
        acquisition.manifest.items.len(),
        acquisition.total_bytes()
    );
    println!("  Workspace: {}", acquisition.workspace.display());
    println!(
        "  Manifest:  {}",
        acquisition.workspace.join("manifest.json").display()
    );
    Ok(())
}

/// Show or clear the remembered state.
fn cmd_state(config: &AppConfig, clear: bool) -> domain::Result<()> {
    let state = AppState::open(&config.state_db_path())?;
    let entries = state.entries()?;

    if clear {
        for (key, _) in &entries {
            state.remove(key)?;
        }
        println!("{} Cleared {} entries", "✓".green().bold(), entries.len());
        return Ok(());
    }

    if entries.is_empty() {
        println!("No remembered state. Run `login` first.");
        return Ok(());
    }

    println!("{}", "💾 Remembered state".bold());
    for (key, value) in &entries {
        println!("  {}: {}", key.cyan(), value);
    }
    Ok(())
}

/// Show paths command.
fn cmd_paths(config: &AppConfig, explicit: Option<&Path>, init: bool) -> domain::Result<()> {
    let config_path = match explicit {
        Some(path) => path.to_path_buf(),
        None if init => ensure_config_exists()?,
        None => infrastructure::config::config_file_path(),
    };

    let status = if config_path.exists() {
        "found".green()
    } else {
        "defaults".yellow()
    };

    println!("{}", "📂 Zalo Data Extractor Paths".bold());
    println!();
    println!("  Config:  {} [{}]", config_path.display(), status);
    println!("  Data:    {}", config.data_dir().display());
    println!("  State:   {}", config.state_db_path().display());
    println!("  Work:    {}", config.work_dir().display());
    println!("  Exports: {}", config.exports_dir().display());
    println!("  Acquire: {}", config.acquisitions_dir().display());
    Ok(())
}

fn read_active_uid(config_file: &Path) -> domain::Result<String> {
    let content = std::fs::read_to_string(config_file).map_err(|e| {
        AppError::io(format!("Failed to read {}", config_file.display()), e)
    })?;
    extract_active_uid(&content)
}

/// Path for an export: the explicit one, else `<exports>/<stem>_<timestamp>.<ext>`.
fn export_path(
    config: &AppConfig,
    explicit: Option<&Path>,
    stem: &str,
    format: ExportFormat,
) -> PathBuf {
    explicit.map_or_else(
        || {
            config.exports_dir().join(format!(
                "{}_{}.{}",
                file_stem(stem),
                timestamp(),
                format.extension()
            ))
        },
        Path::to_path_buf,
    )
}

fn print_exported(rows: usize, path: &Path) {
    println!(
        "{} Exported {} row(s) to {}",
        "✓".green().bold(),
        rows,
        path.display()
    );
}

/// Keeps a table name usable as a file name.
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
