//! rowgraph CLI
//!
//! Inspects and runs join queries over entities described in a JSON schema.

mod input;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use rowgraph::JoinGraph;

use crate::input::{SelectSpec, build_select, load_catalog};

/// Compile entity graphs into join queries and run them against SQLite.
#[derive(Parser)]
#[command(name = "rowgraph")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// JSON file describing the entities.
    #[arg(short, long, env = "ROWGRAPH_SCHEMA")]
    schema: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the SELECT for an entity.
    Sql(SelectArgs),

    /// Run the SELECT for an entity and print the records as JSON.
    Query(SelectArgs),

    /// Run a DDL script.
    Ddl {
        /// Script file.
        file: PathBuf,
    },

    /// Print the join graph of an entity.
    Describe {
        /// Root entity.
        entity: String,
    },
}

#[derive(Args)]
struct SelectArgs {
    /// Root entity.
    entity: String,

    /// WHERE fragment with `?` placeholders; may be repeated.
    #[arg(short = 'w', long = "where")]
    filter: Vec<String>,

    /// Placeholder value, in order: an integer, a real, `null`, or text.
    #[arg(short, long = "param")]
    param: Vec<String>,

    /// GROUP BY expression; may be repeated.
    #[arg(long)]
    group_by: Vec<String>,

    /// ORDER BY expression; may be repeated.
    #[arg(long)]
    order_by: Vec<String>,

    /// Row limit.
    #[arg(long)]
    limit: Option<u64>,

    /// Row offset.
    #[arg(long)]
    offset: Option<u64>,
}

impl From<SelectArgs> for SelectSpec {
    fn from(args: SelectArgs) -> Self {
        Self {
            filters: args.filter,
            params: args.param,
            group_by: args.group_by,
            order_by: args.order_by,
            limit: args.limit,
            offset: args.offset,
        }
    }
}

async fn connect(url: &str) -> anyhow::Result<SqlitePool> {
    info!(database = %url, "Connecting");
    Ok(SqlitePoolOptions::new().max_connections(5).connect(url).await?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Sql(args) => {
            let catalog = load_catalog(cli.schema.as_deref())?;
            let entity = args.entity.clone();
            let expression = build_select(&catalog, &entity, &args.into())?.to_expression();
            println!("{}", expression.sql());
            if !expression.params().is_empty() {
                println!("-- params: {}", serde_json::to_string(expression.params())?);
            }
        }

        Commands::Query(args) => {
            let catalog = load_catalog(cli.schema.as_deref())?;
            let entity = args.entity.clone();
            let query = build_select(&catalog, &entity, &args.into())?;
            let pool = connect(&cli.database).await?;
            let records = rowgraph::fetch_records(&pool, &query).await?;
            info!(entity = %entity, records = records.len(), "Query complete");
            println!("{}", serde_json::to_string_pretty(&records)?);
        }

        Commands::Ddl { file } => {
            let script = std::fs::read_to_string(&file)?;
            let pool = connect(&cli.database).await?;
            rowgraph::execute_ddl(&pool, &script).await?;
            info!(file = %file.display(), "DDL script executed");
        }

        Commands::Describe { entity } => {
            let catalog = load_catalog(cli.schema.as_deref())?;
            let graph = JoinGraph::build(&catalog, &entity)?;
            print!("{graph}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_select_args() {
        let cli = Cli::try_parse_from([
            "rowgraph",
            "--schema",
            "schema.json",
            "sql",
            "Article",
            "--where",
            "`article`.id = ?",
            "-p",
            "7",
            "--order-by",
            "`article`.id",
            "--limit",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.schema, Some(PathBuf::from("schema.json")));
        let Commands::Sql(args) = cli.command else {
            panic!("expected the sql command");
        };
        let spec = SelectSpec::from(args);
        assert_eq!(spec.filters, ["`article`.id = ?"]);
        assert_eq!(spec.params, ["7"]);
        assert_eq!(spec.order_by, ["`article`.id"]);
        assert_eq!(spec.limit, Some(3));
    }

    #[test]
    fn test_parse_ddl() {
        let cli = Cli::try_parse_from(["rowgraph", "-d", "sqlite::memory:", "ddl", "schema.sql"])
            .unwrap();
        assert_eq!(cli.database, "sqlite::memory:");
        assert!(matches!(
            cli.command,
            Commands::Ddl { file } if file == PathBuf::from("schema.sql")
        ));
    }
}
