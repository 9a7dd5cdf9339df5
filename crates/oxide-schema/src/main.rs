//! oxide-schema CLI
//!
//! Command-line tool for planning and applying declarative table schemas.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use oxide_schema::prelude::*;

/// Declarative table schemas for PostgreSQL, MySQL and CockroachDB.
#[derive(Parser)]
#[command(name = "oxide-schema")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database driver: postgres, mysql or cockroachdb.
    #[arg(long, env = "OXIDE_SCHEMA_DRIVER", default_value = "postgres", global = true)]
    driver: Dialect,

    /// Connection URI.
    #[arg(long, env = "OXIDE_SCHEMA_URI", global = true)]
    uri: Option<String>,

    /// File containing the connection URI. Takes precedence over --uri.
    #[arg(long, env = "OXIDE_SCHEMA_URI_FILE", global = true)]
    uri_file: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the statements that bring a table in line with its document.
    Plan {
        /// Table document to plan.
        #[arg(long)]
        spec_file: PathBuf,

        /// Write the statements to this file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Print the statements as a JSON array.
        #[arg(long)]
        json: bool,
    },

    /// Execute planned statements.
    Apply {
        /// Statement file written by `plan --out`.
        #[arg(long, conflicts_with = "spec_file", required_unless_present = "spec_file")]
        ddl: Option<PathBuf>,

        /// Table document to plan and apply in one step.
        #[arg(long)]
        spec_file: Option<PathBuf>,
    },

    /// Describe every table of the database as a table document.
    Generate {
        /// Write one file per table plus a manifest here instead of stdout.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Render CREATE statements for a directory of table documents.
    Fixtures {
        /// Directory of table documents.
        #[arg(long)]
        input_dir: PathBuf,

        /// Directory to write fixtures.sql into.
        #[arg(long)]
        output_dir: PathBuf,
    },
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

    let config = Config {
        dialect: cli.driver,
        uri: cli.uri,
        uri_file: cli.uri_file,
    };
    let orchestrator = Orchestrator::new(config);

    match cli.command {
        Commands::Plan {
            spec_file,
            out,
            json,
        } => {
            let statements = orchestrator.plan_file(&spec_file).await?;

            if let Some(path) = out {
                write_statement_file(&path, &statements)?;
                info!(
                    path = %path.display(),
                    statements = statements.len(),
                    "Wrote plan"
                );
            } else if json {
                println!("{}", serde_json::to_string_pretty(&statements)?);
            } else {
                for statement in &statements {
                    println!("{statement};");
                }
            }
        }

        Commands::Apply { ddl, spec_file } => {
            let statements = match (ddl, spec_file) {
                (Some(path), _) => read_statement_file(&path)?,
                (None, Some(path)) => orchestrator.plan_file(&path).await?,
                (None, None) => anyhow::bail!("either --ddl or --spec-file is required"),
            };
            let applied = orchestrator.apply(&statements).await?;
            info!(statements = applied, "Apply complete");
        }

        Commands::Generate { output_dir } => {
            let documents = orchestrator.generate().await?;

            match output_dir {
                Some(dir) => {
                    write_documents(&dir, &documents)?;
                }
                None => print!("{}", render_document_stream(&documents)?),
            }
        }

        Commands::Fixtures {
            input_dir,
            output_dir,
        } => {
            orchestrator.fixtures(&input_dir, &output_dir)?;
        }
    }

    Ok(())
}
