//! graphbridge CLI
//!
//! Command-line front end for:
//! - compiling JSON query files into Cypher + parameters
//! - lowering SQL `SELECT` text into Cypher
//! - compiling label/condition deletes
//! - flattening captured Neo4j REST Cypher results into records

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use graphbridge_client::{normalize_with, ClientError, Extraction, PropertyMap, RawExecutionResult};
use graphbridge_cypher::{CompiledQuery, CompilerConfig, CypherCompiler, Params};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

mod query_file;
mod sqlish;

use query_file::{ConditionIr, QueryFileV1};

#[derive(Parser)]
#[command(name = "graphbridge")]
#[command(author, version, about = "Compile SQL-shaped queries into Cypher")]
struct Cli {
    #[command(flatten)]
    output: OutputArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
struct OutputArgs {
    /// Print JSON instead of human-readable output.
    #[arg(long, global = true)]
    json: bool,
    /// Join clauses with a space instead of a newline.
    #[arg(long, global = true)]
    single_line: bool,
    /// Leave plain column names unqualified (no `n.` prefix).
    #[arg(long, global = true)]
    no_qualify: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a JSON query file (`-` for stdin) into Cypher.
    Compile {
        input: PathBuf,
        /// JSON object of caller parameters; wins over the file's own `params`.
        #[arg(long)]
        params: Option<PathBuf>,
    },

    /// Compile one SQL `SELECT` statement into Cypher.
    Sql {
        sql: String,
        #[arg(long)]
        params: Option<PathBuf>,
    },

    /// Compile a delete of matching nodes and their one-hop neighbourhood.
    Delete {
        /// Node label (repeatable).
        #[arg(long = "label", required = true)]
        labels: Vec<String>,
        /// Condition in query-file `where` form, e.g. `{"status": 0}`.
        #[arg(long = "where")]
        condition: Option<String>,
    },

    /// Flatten a captured REST Cypher payload (`-` for stdin) into records.
    Normalize {
        input: PathBuf,
        /// HTTP status the payload was captured with.
        #[arg(long, default_value_t = 200)]
        status: u16,
        /// One record per row keyed by column, scalars included.
        #[arg(long)]
        rows: bool,
    },
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let compiler = CypherCompiler::new(compiler_config(&cli.output));

    match cli.command {
        Commands::Compile { input, params } => {
            let file = QueryFileV1::parse(&read_input(&input)?)
                .with_context(|| format!("parsing {}", input.display()))?;
            let query = file.to_description()?;
            let compiled = compiler.build(&query, &load_params(params.as_deref())?)?;
            print_compiled(&compiled, &cli.output)?;
        }
        Commands::Sql { sql, params } => {
            let query = sqlish::parse_sql_query(&sql)?;
            let compiled = compiler.build(&query, &load_params(params.as_deref())?)?;
            print_compiled(&compiled, &cli.output)?;
        }
        Commands::Delete { labels, condition } => {
            let condition = condition
                .map(|text| -> Result<_> {
                    let ir: ConditionIr = serde_json::from_str(&text)
                        .map_err(|e| anyhow!("invalid --where condition: {e}"))?;
                    ir.to_condition()
                })
                .transpose()?;
            let compiled = compiler.delete(labels.as_slice(), condition.as_ref(), &Params::new())?;
            print_compiled(&compiled, &cli.output)?;
        }
        Commands::Normalize {
            input,
            status,
            rows,
        } => {
            let raw = RawExecutionResult::new(status, read_input(&input)?);
            let extraction = if rows {
                Extraction::Rows
            } else {
                Extraction::Properties
            };
            let records = normalize_with(&raw, extraction).map_err(describe_client_error)?;
            print_records(&records, &cli.output)?;
        }
    }
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Environment first, then command-line overrides.
fn compiler_config(output: &OutputArgs) -> CompilerConfig {
    let mut config = CompilerConfig::from_env();
    if output.single_line {
        config.separator = " ".to_string();
    }
    if output.no_qualify {
        config.qualify_columns = false;
    }
    debug!(?config, "compiler configuration");
    config
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("reading stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn load_params(path: Option<&Path>) -> Result<Params> {
    let Some(path) = path else {
        return Ok(Params::new());
    };
    let text = read_input(path)?;
    serde_json::from_str(&text)
        .map_err(|e| anyhow!("{} is not a JSON parameter object: {e}", path.display()))
}

fn describe_client_error(err: ClientError) -> anyhow::Error {
    match err {
        ClientError::ExecutionFailed {
            status,
            headers,
            payload,
        } => {
            let headers = headers
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect::<Vec<_>>()
                .join(", ");
            anyhow!("execution failed with status {status} [{headers}]: {payload}")
        }
        other => other.into(),
    }
}

// ============================================================================
// Output
// ============================================================================

fn print_compiled(compiled: &CompiledQuery, output: &OutputArgs) -> Result<()> {
    if output.json {
        println!("{}", serde_json::to_string_pretty(compiled)?);
        return Ok(());
    }
    println!("{}", compiled.cypher);
    if compiled.params.is_empty() {
        return Ok(());
    }
    println!();
    println!("{}", "params:".bold());
    for (name, value) in &compiled.params {
        println!("  {} = {}", name.cyan(), value);
    }
    Ok(())
}

fn print_records(records: &[PropertyMap], output: &OutputArgs) -> Result<()> {
    if output.json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }
    for (i, record) in records.iter().enumerate() {
        println!("{} {}", format!("[{i}]").dimmed(), serde_json::to_string(record)?);
    }
    eprintln!(
        "{} {} record(s)",
        "ok".green().bold(),
        records.len().to_string().bold()
    );
    Ok(())
}
