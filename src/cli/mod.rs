//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::application::ExportFormat;

/// Zalo Data Extractor - Browse and export the Zalo desktop app's `SQLite` data.
///
/// Quick start: zl-extract tables Storage.db | browse Storage.db -t messages | contacts Storage.db --export xlsx
#[derive(Parser, Debug)]
#[command(name = "zl-extract")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (defaults to ~/.zalo-data-extractor/config.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Optional export target shared by the listing commands.
#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Export format: csv, xlsx or html.
    #[arg(short, long)]
    pub export: Option<ExportFormat>,

    /// Output file (defaults to the exports directory).
    #[arg(short, long, requires = "export")]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the tables of a database.
    Tables {
        /// Path to the database file.
        db: PathBuf,
    },

    /// Show one page of a table.
    Browse {
        /// Path to the database file.
        db: PathBuf,

        /// Table to browse.
        #[arg(short, long)]
        table: String,

        /// Page number, starting at 1.
        #[arg(short, long, default_value = "1")]
        page: u64,

        /// Rows per page (overrides the configuration).
        #[arg(long)]
        page_size: Option<u64>,

        /// Step through pages with n / p, q to stop.
        #[arg(short, long)]
        interactive: bool,

        /// Only show rows of the page with a cell containing this text (case-insensitive).
        #[arg(short, long)]
        search: Option<String>,

        #[command(flatten)]
        export: ExportArgs,
    },

    /// Extract contacts from the info-cache table.
    Contacts {
        /// Path to the database file.
        db: PathBuf,

        #[command(flatten)]
        export: ExportArgs,
    },

    /// Extract groups from the info-cache table.
    Groups {
        /// Path to the database file.
        db: PathBuf,

        /// Value of zType that marks a group.
        #[arg(long)]
        type_filter: Option<String>,

        #[command(flatten)]
        export: ExportArgs,
    },

    /// Extract messages from the messages table.
    Messages {
        /// Path to the database file.
        db: PathBuf,

        /// Maximum number of messages (0 = all).
        #[arg(short, long)]
        limit: Option<u64>,

        #[command(flatten)]
        export: ExportArgs,
    },

    /// Print the active uid from a database-config.json file.
    Uid {
        /// Path to database-config.json.
        config_file: PathBuf,
    },

    /// Remember the config and storage files and the active uid.
    Login {
        /// Path to database-config.json.
        #[arg(long)]
        config_file: PathBuf,

        /// Path to the Storage.db file.
        #[arg(long)]
        storage: PathBuf,
    },

    /// Show the account owner.
    User {
        /// User id (defaults to the remembered uid).
        #[arg(long)]
        uid: Option<String>,

        /// Path to the Storage.db file (defaults to the remembered one).
        #[arg(long)]
        storage: Option<PathBuf>,
    },

    /// Export contacts, groups and messages in one go.
    ExportAll {
        /// Path to the database file.
        db: PathBuf,

        /// Export format: csv, xlsx or html.
        #[arg(short, long, default_value = "xlsx")]
        format: ExportFormat,

        /// Output directory (defaults to the exports directory).
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Find SQLite files under a directory.
    Scan {
        /// Directory to search.
        dir: PathBuf,
    },

    /// Copy a data folder into a new workspace with a sha256 manifest.
    Acquire {
        /// Folder to acquire.
        input: PathBuf,

        /// Directory receiving the workspace (defaults to the acquisitions directory).
        #[arg(long)]
        out: Option<PathBuf>,

        /// Case identifier recorded in the chain of custody.
        #[arg(long, default_value = "")]
        case_id: String,

        /// Person performing the acquisition.
        #[arg(long, default_value = "")]
        collector: String,

        /// Reason for the acquisition.
        #[arg(long, default_value = "")]
        reason: String,

        /// Confirm you are authorized to acquire this data.
        #[arg(long)]
        consent: bool,
    },

    /// Show or clear the remembered state.
    State {
        /// Remove all remembered entries.
        #[arg(long)]
        clear: bool,
    },

    /// Show the paths being used.
    Paths {
        /// Write a default config file if none exists.
        #[arg(long)]
        init: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_browse_arguments() {
        let cli = Cli::try_parse_from([
            "zl-extract", "-vv", "browse", "Storage.db", "-t", "messages", "-p", "3", "-e", "csv",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Browse {
                table,
                page,
                export,
                ..
            } => {
                assert_eq!(table, "messages");
                assert_eq!(page, 3);
                assert_eq!(export.export, Some(ExportFormat::Csv));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_browse_search_argument() {
        let cli = Cli::try_parse_from([
            "zl-extract", "browse", "Storage.db", "-t", "friend", "-s", "Nguyen",
        ])
        .unwrap();

        match cli.command {
            Commands::Browse { search, .. } => assert_eq!(search.as_deref(), Some("Nguyen")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_acquire_arguments() {
        let cli = Cli::try_parse_from([
            "zl-extract", "acquire", "ZaloData", "--case-id", "C-7", "--consent",
        ])
        .unwrap();

        match cli.command {
            Commands::Acquire {
                input,
                out,
                case_id,
                consent,
                ..
            } => {
                assert_eq!(input, PathBuf::from("ZaloData"));
                assert!(out.is_none());
                assert_eq!(case_id, "C-7");
                assert!(consent);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_output_requires_export() {
        let result = Cli::try_parse_from(["zl-extract", "contacts", "Storage.db", "-o", "out.csv"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_export_format_rejected() {
        let result = Cli::try_parse_from(["zl-extract", "contacts", "Storage.db", "-e", "pdfx"]);
        assert!(result.is_err());
    }
}
