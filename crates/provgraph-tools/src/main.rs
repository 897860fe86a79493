//! CLI entry point for the provgraph knowledge-graph tools.
//!
//! Designed for subprocess invocation by an agent host: `call` reads the
//! tool arguments as JSON from stdin and writes the JSON response to stdout.

use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use tracing_subscriber::{fmt, EnvFilter};

use provgraph_core::{catalog, RecordSchema};
use provgraph_graph::{CypherFilter, GraphClient};
use provgraph_tools::dispatch::TOOLS;
use provgraph_tools::ops::TypeCatalog;
use provgraph_tools::{AppConfig, GraphTools};

#[derive(Parser)]
#[command(name = "provgraph")]
#[command(about = "Provenance-tracked knowledge graph tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: provgraph).
    #[arg(short, long, default_value = "provgraph", global = true)]
    config: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Invoke a tool (reads JSON arguments from stdin).
    Call {
        /// Tool name, e.g. `create_entity`.
        tool: String,
    },
    /// Compile a filter expression without touching storage.
    CheckFilter {
        /// Entity or relationship type the filter applies to.
        record_type: String,
        /// The filter expression.
        expr: String,
    },
    /// Create Neo4j constraints and indexes for the catalog.
    InitSchema,
    /// Print the registered entity and relationship types.
    Types,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if cli.log_json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    }

    let app = AppConfig::load(&cli.config)?;

    match cli.command {
        Command::Call { ref tool } => {
            let input = std::io::read_to_string(std::io::stdin())?;
            let args: Value = if input.trim().is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&input)?
            };
            let tools = GraphTools::from_config(&app).await?;
            let response = tools.call(tool, args).await;
            println!("{}", serde_json::to_string(&response.body)?);
            if !response.is_success() {
                std::process::exit(1);
            }
        }
        Command::CheckFilter {
            ref record_type,
            ref expr,
        } => {
            let registry = catalog::builtin()?;
            let schema: &dyn RecordSchema = match registry.lookup(record_type) {
                Ok(entity) => entity as &dyn RecordSchema,
                Err(_) => registry.relationship(record_type)?,
            };
            let predicate = provgraph_filter::compile(expr, schema, &app.filter)?;
            let cypher = CypherFilter::translate(&predicate, "n");
            let params: Map<String, Value> = cypher
                .params
                .iter()
                .map(|(name, literal)| (name.clone(), literal.to_json()))
                .collect();
            let out = json!({
                "record_type": schema.type_name(),
                "predicate": predicate,
                "cypher": { "where": cypher.clause, "params": params },
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::InitSchema => {
            let registry = catalog::builtin()?;
            let client = GraphClient::connect(&app.neo4j).await?;
            let applied = client.ensure_schema(&registry).await?;
            println!("{}", json!({ "success": true, "statements": applied }));
        }
        Command::Types => {
            let registry = catalog::builtin()?;
            let out = json!({ "types": TypeCatalog::of(&registry), "tools": TOOLS });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }

    Ok(())
}
