// ABOUTME: CLI entry point for tabledump
// ABOUTME: Parses commands, resolves configuration, and routes to command handlers

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tabledump::config::{self, FileConfig, Options};
use tabledump::format::Format;
use tabledump::{commands, db, logging};

#[derive(Parser)]
#[command(name = "tabledump")]
#[command(about = "Dump database tables to portable files and load them back", long_about = None)]
#[command(version)]
struct Cli {
    /// Database URL (sqlite://path, sqlite::memory: or postgresql://...); falls back to the config file, then DATABASE_URL
    #[arg(long, global = true)]
    database: Option<String>,
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Show debug logging and keep logging on during dumps and loads
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Default)]
struct FormatArgs {
    /// Output/input format [default: json]
    #[arg(long, value_enum)]
    format: Option<Format>,
}

#[derive(Args, Clone, Default)]
struct DumpArgs {
    #[command(flatten)]
    format: FormatArgs,
    /// Rows fetched per query
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    page_size: Option<u64>,
    /// Skip these tables (comma-separated)
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,
}

#[derive(Args, Clone, Default)]
struct LoadArgs {
    #[command(flatten)]
    format: FormatArgs,
    /// Append rows instead of emptying each table first
    #[arg(long)]
    no_truncate: bool,
    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    yes: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump every table into a single file
    Dump {
        path: PathBuf,
        #[command(flatten)]
        args: DumpArgs,
    },
    /// Dump each non-empty table into its own file under a new directory
    DumpDir {
        dir: PathBuf,
        #[command(flatten)]
        args: DumpArgs,
    },
    /// Load a single dump file
    Load {
        path: PathBuf,
        #[command(flatten)]
        args: LoadArgs,
    },
    /// Load every file of a dump directory
    LoadDir {
        dir: PathBuf,
        #[command(flatten)]
        args: LoadArgs,
    },
    /// List tables and their row counts
    Tables {
        /// Skip these tables (comma-separated)
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let file_config = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let mut options = Options::default().apply_file(&file_config);
    if cli.verbose {
        options.quiet = false;
    }

    let url = config::resolve_database_url(cli.database, &file_config)?;
    let database = db::connect(&url).context("Failed to connect to database")?;
    let db = database.as_ref();

    match cli.command {
        Commands::Dump { path, args } => {
            commands::dump(db, dump_options(options, args), &path)?;
        }
        Commands::DumpDir { dir, args } => {
            commands::dump_dir(db, dump_options(options, args), &dir)?;
        }
        Commands::Load { path, args } => {
            let truncate = !args.no_truncate;
            commands::load(db, format_options(options, &args.format), &path, truncate, args.yes)?;
        }
        Commands::LoadDir { dir, args } => {
            let truncate = !args.no_truncate;
            commands::load_dir(db, format_options(options, &args.format), &dir, truncate, args.yes)?;
        }
        Commands::Tables { exclude } => {
            options.exclude_tables.extend(exclude);
            commands::tables(db, &options)?;
        }
    }

    Ok(())
}

fn format_options(options: Options, args: &FormatArgs) -> Options {
    match args.format {
        Some(format) => options.with_format(format),
        None => options,
    }
}

fn dump_options(options: Options, args: DumpArgs) -> Options {
    let mut options = format_options(options, &args.format);
    if let Some(page_size) = args.page_size {
        options = options.with_page_size(page_size);
    }
    options.exclude_tables.extend(args.exclude);
    options
}
