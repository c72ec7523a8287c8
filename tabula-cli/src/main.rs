use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process;
use tabula::system_db::SystemDb;
use tabula::{naming, DatabaseConfig};

/// Tabula CLI: inspect a Tabula SQLite database from the command line
#[derive(Parser)]
#[command(name = "tabula", version, about)]
struct Cli {
    /// Path to the database file
    #[arg(long, conflicts_with = "config")]
    db: Option<PathBuf>,

    /// YAML connection config (path, busy_timeout_ms)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// List tables
    Tables,

    /// Show the columns of a table with the field paths they map to
    Columns {
        /// Table name
        table: String,
    },

    /// Dump raw rows of a table
    Dump {
        /// Table name
        table: String,
        /// Maximum number of rows
        #[arg(long)]
        limit: Option<u64>,
    },

    /// Show the applied migration log
    Migrations,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match (&cli.config, &cli.db) {
        (Some(path), _) => DatabaseConfig::load(path)?,
        (None, Some(db)) => DatabaseConfig::file(db),
        (None, None) => return Err("either --db or --config is required".into()),
    };
    if let Some(path) = config.path.as_ref().filter(|p| !p.exists()) {
        return Err(format!("database file not found: {}", path.display()).into());
    }
    log::debug!("opening {:?}", config.path);
    let db = SystemDb::open(&config)?;

    let output = match cli.command {
        Command::Tables => serde_json::json!(db.list_tables()?),
        Command::Columns { table } => {
            let columns: Vec<serde_json::Value> = db
                .columns(&table)?
                .into_iter()
                .map(|c| {
                    serde_json::json!({
                        "name": c.name,
                        "field": naming::column_path(&c.name).join("."),
                        "type": c.sql_type,
                        "not_null": c.not_null,
                        "primary_key": c.primary_key,
                    })
                })
                .collect();
            serde_json::json!(columns)
        }
        Command::Dump { table, limit } => serde_json::json!(db.dump_table(&table, limit)?),
        Command::Migrations => {
            let records: Vec<serde_json::Value> = db
                .migrations()?
                .into_iter()
                .map(|m| {
                    serde_json::json!({
                        "id": m.id,
                        "table": m.table,
                        "description": m.description,
                        "applied_at": m.applied_at,
                    })
                })
                .collect();
            serde_json::json!(records)
        }
    };
    print_output(&output, &cli.format)
}

fn print_output(value: &serde_json::Value, format: &OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}
