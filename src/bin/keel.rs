//! keel — run SELECT and DELETE statements from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Select rows
//! keel select users --field id --field email --where 'email~%@example.com' --limit 10
//!
//! # Show the SQL and bindings without connecting
//! keel select users --where 'id:1,2,3' --where '|banned_at?null' --dry-run
//!
//! # Delete
//! keel delete sessions --where 'expires_at<2024-01-01'
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use keel::prelude::*;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "keel")]
#[command(version)]
#[command(about = "Parameterized SQL statements for MySQL", long_about = None)]
#[command(after_help = "EXAMPLES:
    keel select users --field id --field email --where 'active=1' --limit 10
    keel select posts --where 'title~%rust%' --where '|user_id:1,2' --dry-run
    keel delete sessions --where 'user_id=7' --format json")]
struct Cli {
    /// Don't execute, just show the generated SQL
    #[arg(short, long, global = true)]
    dry_run: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    format: OutputFormat,

    /// Config file (defaults to ./keel.toml, then the user config dir)
    #[arg(short, long, env = "KEEL_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Select rows from a table
    Select {
        table: String,

        /// Column to select (repeatable, defaults to *)
        #[arg(long = "field")]
        fields: Vec<String>,

        /// Condition such as `id=1`, `|name~%ann%` or `id:1,2,3` (repeatable)
        #[arg(short = 'w', long = "where")]
        wheres: Vec<String>,

        #[arg(short, long)]
        limit: Option<u64>,

        #[arg(short, long)]
        offset: Option<u64>,
    },
    /// Delete rows from a table
    Delete {
        table: String,

        /// Condition (repeatable, at least one)
        #[arg(short = 'w', long = "where", required = true)]
        wheres: Vec<String>,
    },
    /// List the supported statement kinds
    Types,
}

/// Stand-in executor for dry runs.
struct Offline;

#[async_trait]
impl Executor for Offline {
    async fn fetch_all(&self, _sql: &str, _params: &[Value]) -> KeelResult<Vec<Row>> {
        Err(KeelError::Connection("dry run has no connection".into()))
    }

    async fn execute(&self, _sql: &str, _params: &[Value]) -> KeelResult<Executed> {
        Err(KeelError::Connection("dry run has no connection".into()))
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "keel=debug" } else { "keel=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli).await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Types => {
            show_types();
            Ok(())
        }
        Commands::Select {
            table,
            fields,
            wheres,
            limit,
            offset,
        } => {
            let db = connect(cli).await?;
            let fields: Vec<&str> = if fields.is_empty() {
                vec!["*"]
            } else {
                fields.iter().map(String::as_str).collect()
            };

            let mut query = Query::select(&db, fields)
                .from(table.as_str())
                .filter(keel::filter::parse_all(wheres.as_slice())?);
            if let Some(limit) = limit {
                query = query.limit(*limit);
            }
            if let Some(offset) = offset {
                query = query.offset(*offset);
            }

            if cli.dry_run {
                let compiled = query.build()?;
                print_statement(&compiled.sql, &compiled.params);
                return Ok(());
            }

            let rows = query.run(false, false).await?.into_rows();
            format_output(&rows, cli.format);
            Ok(())
        }
        Commands::Delete { table, wheres } => {
            let db = connect(cli).await?;
            let mut query =
                Query::delete(&db, table.as_str()).filter(keel::filter::parse_all(wheres.as_slice())?);

            if cli.dry_run {
                let compiled = query.build()?;
                print_statement(&compiled.sql, &compiled.params);
                return Ok(());
            }

            query.run().await?;
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::json!({ "deleted": true })),
                OutputFormat::Table => println!("{} delete executed", "✓".green()),
            }
            Ok(())
        }
    }
}

async fn connect(cli: &Cli) -> anyhow::Result<Db> {
    if cli.dry_run {
        return Ok(Db::new(Arc::new(Offline), Registry::new()));
    }

    let config = DatabaseConfig::load(cli.config.as_deref())?;
    if cli.verbose {
        eprintln!(
            "{} {}@{}:{}/{}",
            "Connecting to:".dimmed(),
            config.username,
            config.host,
            config.port,
            config.schema
        );
    }

    Ok(Db::connect(&config, Registry::new()).await?)
}

fn print_statement(sql: &str, params: &[Value]) {
    println!("{}", "Generated SQL:".green().bold());
    println!("{}", sql.white());

    if !params.is_empty() {
        println!();
        println!("{}", "Bindings:".cyan());
        for (i, param) in params.iter().enumerate() {
            println!("  ?{} = {}", i + 1, param.to_string().yellow());
        }
    }
}

fn format_output(rows: &[Row], format: OutputFormat) {
    if rows.is_empty() {
        println!("{}", "(no results)".dimmed());
        return;
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(rows).unwrap_or_default());
        }
        OutputFormat::Table => {
            let columns: Vec<&String> = rows[0].keys().collect();

            let mut widths: Vec<usize> = columns.iter().map(|c| c.len()).collect();
            for row in rows {
                for (i, col) in columns.iter().enumerate() {
                    let len = row.get(*col).map(cell).unwrap_or_default().chars().count();
                    widths[i] = widths[i].max(len);
                }
            }

            let header: Vec<String> = columns
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:width$}", c, width = *w))
                .collect();
            println!("{}", header.join(" │ ").white().bold());

            let sep: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
            println!("{}", sep.join("─┼─").dimmed());

            for row in rows {
                let cells: Vec<String> = columns
                    .iter()
                    .zip(&widths)
                    .map(|(c, w)| {
                        let val = row.get(*c).map(cell).unwrap_or_default();
                        format!("{:width$}", val, width = *w)
                    })
                    .collect();
                println!("{}", cells.join(" │ "));
            }

            println!();
            println!("{} row(s) returned", rows.len().to_string().cyan());
        }
    }
}

fn cell(val: &Value) -> String {
    match val {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        _ => val.to_string(),
    }
}

fn show_types() {
    println!("{}", "Statement kinds".cyan().bold());
    println!();
    for kind in Query::types() {
        println!("  {}", kind.white());
    }
}
