use clap::{Parser, Subcommand};
use std::path::PathBuf;

use bureau::{BuildRequest, Failure, GraphService};

#[derive(Parser)]
#[command(name = "cartographer")]
#[command(about = "Call-and-containment graphs for Python source trees", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct BuildArgs {
    /// Project root to analyse.
    path: PathBuf,
    /// Builder pipeline: "function" or "file".
    #[arg(long, default_value = "function")]
    granularity: String,
    /// Keep engine-reported external definitions as pseudo-targets.
    #[arg(long)]
    include_external: bool,
    /// Call resolution: "semantic" (default) or "fallback_only" and friends.
    #[arg(long, default_value = "semantic")]
    resolve_calls: String,
    /// Ignore any cached graph for this key.
    #[arg(long)]
    force_rebuild: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the graph and print a summary (optionally the full graph).
    Build {
        #[command(flatten)]
        build: BuildArgs,
        /// Print the serialized graph value as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Fan-in/fan-out overview of the call graph.
    Overview {
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Substring search over node ids.
    Search {
        #[command(flatten)]
        build: BuildArgs,
        /// Substring to look for.
        query: String,
        #[arg(long, default_value_t = 12)]
        limit: usize,
    },
    /// Structural query: callers, callees, dependencies,
    /// reverse_dependencies, or path (synonyms accepted).
    Query {
        #[command(flatten)]
        build: BuildArgs,
        /// Query type.
        query_type: String,
        /// Target node reference (id, relpath, relpath:symbol, or suffix).
        target: String,
        /// Destination node for path queries.
        #[arg(long)]
        path_target: Option<String>,
    },
    /// Export a focused subgraph as Mermaid or DOT.
    Export {
        #[command(flatten)]
        build: BuildArgs,
        /// Output format: "mermaid" or "dot".
        #[arg(long, default_value = "mermaid")]
        format: String,
        /// Node reference to focus on.
        #[arg(long)]
        focus: Option<String>,
        /// Traversal direction: "out", "in", or "both".
        #[arg(long, default_value = "out")]
        direction: String,
        #[arg(long, default_value_t = 1)]
        depth: usize,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let service = GraphService::new(8);

    let outcome = match &cli.command {
        Commands::Build { build, json } => cmd_build(&service, build, *json),
        Commands::Overview { build } => cmd_overview(&service, build),
        Commands::Search {
            build,
            query,
            limit,
        } => cmd_search(&service, build, query, *limit),
        Commands::Query {
            build,
            query_type,
            target,
            path_target,
        } => cmd_query(&service, build, query_type, target, path_target.as_deref()),
        Commands::Export {
            build,
            format,
            focus,
            direction,
            depth,
        } => cmd_export(&service, build, format, focus.as_deref(), direction, *depth),
    };

    if let Err(failure) = outcome {
        println!("{}", serde_json::to_string_pretty(&failure)?);
        std::process::exit(1);
    }

    Ok(())
}

fn request_of(args: &BuildArgs) -> BuildRequest {
    let mut request = BuildRequest::new(args.path.to_string_lossy().to_string());
    request.granularity = args.granularity.clone();
    request.include_external = args.include_external;
    request.resolve_calls = args.resolve_calls.clone();
    request.force_rebuild = args.force_rebuild;
    request
}

/// Builds (or reuses) the graph and returns its id.
fn ensure_graph(service: &GraphService, args: &BuildArgs) -> Result<String, Failure> {
    Ok(service.build_graph(&request_of(args))?.graph_id)
}

fn cmd_build(service: &GraphService, args: &BuildArgs, json: bool) -> Result<(), Failure> {
    let mut request = request_of(args);
    request.return_graph = json;
    let reply = service.build_graph(&request)?;

    if json {
        if let Some(graph) = &reply.graph {
            match serde_json::to_string_pretty(graph) {
                Ok(text) => println!("{}", text),
                Err(e) => return Err(Failure::new(format!("Serialization failed: {}", e))),
            }
            return Ok(());
        }
    }

    println!("+------------------------------------------+");
    println!("| CARTOGRAPHER BUILD                       |");
    println!("+------------------------------------------+");
    println!("| Nodes          : {:>22} |", reply.summary.nodes);
    println!("| Edges          : {:>22} |", reply.summary.edges);
    println!("| Cached         : {:>22} |", reply.cached);
    println!("+------------------------------------------+");
    println!("graph_id: {}", reply.graph_id);
    println!("root:     {}", reply.root);
    Ok(())
}

fn cmd_overview(service: &GraphService, args: &BuildArgs) -> Result<(), Failure> {
    let graph_id = ensure_graph(service, args)?;
    let reply = service.overview(&graph_id, true)?;
    match serde_json::to_string_pretty(&reply.overview) {
        Ok(text) => println!("{}", text),
        Err(e) => return Err(Failure::new(format!("Serialization failed: {}", e))),
    }
    Ok(())
}

fn cmd_search(
    service: &GraphService,
    args: &BuildArgs,
    query: &str,
    limit: usize,
) -> Result<(), Failure> {
    let graph_id = ensure_graph(service, args)?;
    let reply = service.search_nodes(&graph_id, query, limit, true)?;
    for id in &reply.matches {
        println!("{}", id);
    }
    if reply.matches.is_empty() {
        println!("No matches for: {}", query);
    }
    Ok(())
}

fn cmd_query(
    service: &GraphService,
    args: &BuildArgs,
    query_type: &str,
    target: &str,
    path_target: Option<&str>,
) -> Result<(), Failure> {
    let graph_id = ensure_graph(service, args)?;
    let reply = service.query_graph(&graph_id, query_type, target, path_target, true)?;

    println!("target: {}", reply.target_resolved);
    for id in &reply.result {
        println!("  {}", id);
    }
    if reply.result.is_empty() {
        println!("  (empty)");
    }
    Ok(())
}

fn cmd_export(
    service: &GraphService,
    args: &BuildArgs,
    format: &str,
    focus: Option<&str>,
    direction: &str,
    depth: usize,
) -> Result<(), Failure> {
    let graph_id = ensure_graph(service, args)?;
    let reply = service.export_graph(&graph_id, format, focus, direction, depth, true)?;

    println!("{}", reply.text);
    eprintln!(
        "rendered {} nodes, {} edges{}",
        reply.meta.nodes_rendered,
        reply.meta.edges_rendered,
        if reply.meta.truncated {
            " (truncated)"
        } else {
            ""
        }
    );
    Ok(())
}
