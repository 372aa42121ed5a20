use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde_json::{Map, Value};

use opsflow_rs::opsflow::config::EngineConfig;
use opsflow_rs::opsflow::server;
use opsflow_rs::opsflow::workflow::executor::{validate_definition, WorkflowExecutor};
use opsflow_rs::opsflow::workflow::graph::DependencyGraph;
use opsflow_rs::opsflow::workflow::loader::WorkflowLoader;
use opsflow_rs::opsflow::workflow::registry::ActionRegistry;
use opsflow_rs::opsflow::workflow::result::WorkflowStatus;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a workflow from a file and print the result as JSON
    Run {
        /// Path to the workflow file (YAML or JSON)
        file: String,

        /// Workflow input as key=value (repeatable)
        #[arg(short, long = "input", value_name = "KEY=VALUE")]
        inputs: Vec<String>,

        /// Workflow inputs as a JSON object; --input values are applied on top
        #[arg(long)]
        inputs_json: Option<String>,

        /// Ask handlers to describe instead of act
        #[arg(long)]
        dry_run: bool,

        /// Override execution.parallel_limit
        #[arg(long)]
        parallel_limit: Option<usize>,
    },
    /// Validate a workflow and print its concurrency waves
    Plan {
        /// Path to the workflow file (YAML or JSON)
        file: String,
    },
    /// Start the HTTP server
    Serve {
        /// Port to listen on (defaults to OPSFLOW_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let mut config = EngineConfig::from_env()?;

    match args.command {
        Commands::Run {
            file,
            inputs,
            inputs_json,
            dry_run,
            parallel_limit,
        } => {
            let mut definition = WorkflowLoader::new()
                .load_workflow(&file)
                .with_context(|| format!("failed to load workflow from {}", file))?;
            if dry_run {
                definition.execution.dry_run = true;
            }
            if let Some(limit) = parallel_limit {
                definition.execution.parallel_limit = limit;
            }

            let inputs = parse_inputs(inputs_json.as_deref(), &inputs)?;
            let registry = ActionRegistry::with_builtins(&config).await?;

            log::info!("Running workflow: {}", definition.name);
            let result = WorkflowExecutor::new(definition, registry)
                .execute(inputs)
                .await?;

            println!("{}", serde_json::to_string_pretty(&result)?);
            if result.status == WorkflowStatus::Failed {
                std::process::exit(1);
            }
        }
        Commands::Plan { file } => {
            let definition = WorkflowLoader::new()
                .load_workflow(&file)
                .with_context(|| format!("failed to load workflow from {}", file))?;
            let graph = validate_definition(&definition)?;
            print!("{}", render_plan(&definition.name, &graph));
        }
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            server::serve(config).await?;
        }
    }

    Ok(())
}

/// One line per wave; steps with dependencies list them after `<-`
fn render_plan(name: &str, graph: &DependencyGraph) -> String {
    let mut out = format!("Workflow '{}' ({} steps):\n", name, graph.len());
    for (index, wave) in graph.parallel_groups().iter().enumerate() {
        let steps: Vec<String> = wave
            .iter()
            .map(|id| match graph.dependencies_of(id) {
                [] => id.clone(),
                deps => format!("{} <- {}", id, deps.join(", ")),
            })
            .collect();
        out.push_str(&format!("  wave {}: {}\n", index + 1, steps.join("; ")));
    }
    out
}

/// Merge `--inputs-json` with `--input key=value` pairs.
///
/// Pair values that parse as JSON keep their type; anything else is a string.
fn parse_inputs(json: Option<&str>, pairs: &[String]) -> anyhow::Result<Map<String, Value>> {
    let mut inputs = match json {
        Some(raw) => match serde_json::from_str::<Value>(raw).context("--inputs-json is not valid JSON")? {
            Value::Object(map) => map,
            _ => bail!("--inputs-json must be a JSON object"),
        },
        None => Map::new(),
    };

    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("--input '{}' is not KEY=VALUE", pair))?;
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        inputs.insert(key.trim().to_string(), value);
    }
    Ok(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_inputs_merges_pairs_over_json() {
        let pairs = vec!["name=ops".to_string(), "count=3".to_string()];
        let inputs = parse_inputs(Some(r#"{"name": "base", "flag": true}"#), &pairs).unwrap();
        assert_eq!(inputs["name"], json!("ops"));
        assert_eq!(inputs["count"], json!(3));
        assert_eq!(inputs["flag"], json!(true));
    }

    #[test]
    fn test_render_plan_lists_dependencies() {
        let definition = WorkflowLoader::parse_yaml(
            r#"
name: deploy
execution: { mode: dependency_aware }
steps:
  - id: build
    action: transform
  - id: lint
    action: transform
  - id: ship
    action: transform
    depends_on: [build, lint]
"#,
        )
        .unwrap();
        let graph = validate_definition(&definition).unwrap();

        assert_eq!(
            render_plan(&definition.name, &graph),
            "Workflow 'deploy' (3 steps):\n  wave 1: build; lint\n  wave 2: ship <- build, lint\n"
        );
    }

    #[test]
    fn test_parse_inputs_rejects_bad_values() {
        assert!(parse_inputs(Some("[1, 2]"), &[]).is_err());
        assert!(parse_inputs(None, &["novalue".to_string()]).is_err());
    }
}
