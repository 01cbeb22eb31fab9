//! Demo binary for edge-cloud-router
//!
//! Routes a JSONL file of queries between the configured edge and cloud
//! models and prints the routing summary.
//!
//! ```text
//! edge-cloud-router --config router.toml --queries data.jsonl [--route-only]
//! ```
//!
//! Each line of the queries file is a JSON object with a `query` field and
//! an optional `gold` answer. With `--route-only` only routing decisions are
//! made; no tier is asked for an answer (the oracle still runs both tiers).
//!
//! ## Environment Variables
//!
//! - `LOG_FORMAT=json` overrides `observability.log_format`
//! - `RUST_LOG=info` log level filter

use std::path::PathBuf;
use std::sync::Arc;

use edge_cloud_router::config::loader;
use edge_cloud_router::{
    build_backend, init_tracing_with, metrics, release_backends, EdgeModel, FilterContext,
    FilterRegistry, LogFormat, ModelBackend, Query, QueryRouter, RouterConfig,
};
use tracing::{error, info, warn};

struct Args {
    config: PathBuf,
    queries: PathBuf,
    route_only: bool,
}

const USAGE: &str = "usage: edge-cloud-router --config <router.toml> --queries <data.jsonl> [--route-only]";

fn parse_args() -> Result<Args, String> {
    let mut config = None;
    let mut queries = None;
    let mut route_only = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config = args.next().map(PathBuf::from),
            "--queries" => queries = args.next().map(PathBuf::from),
            "--route-only" => route_only = true,
            "-h" | "--help" => return Err(USAGE.to_string()),
            other => return Err(format!("unknown argument '{other}'\n{USAGE}")),
        }
    }

    Ok(Args {
        config: config.ok_or_else(|| format!("--config is required\n{USAGE}"))?,
        queries: queries.ok_or_else(|| format!("--queries is required\n{USAGE}"))?,
        route_only,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(2);
        }
    };

    let config = loader::load_from_file(&args.config)?;

    let log_format = match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => LogFormat::Json,
        _ => config.observability.log_format.clone(),
    };
    let _ = init_tracing_with(&log_format);

    if config.observability.metrics_enabled {
        metrics::init_metrics()?;
    }

    info!(config = %args.config.display(), filter = %config.filter.kind, "starting edge-cloud-router");

    let edge = Arc::new(EdgeModel::new(config.edge.clone()));
    edge.load()?;
    let edge_backend: Arc<dyn ModelBackend> = edge.clone();
    let cloud = match build_backend(&config.cloud) {
        Ok(cloud) => cloud,
        Err(e) => {
            let _ = release_backends(&[edge_backend]).await;
            return Err(e.into());
        }
    };

    let outcome = run(&args, &config, edge.clone(), cloud.clone()).await;
    if let Err(e) = &outcome {
        error!(error = %e, "run aborted");
    }

    // Caches are persisted on every exit path once the backends exist.
    let released = release_backends(&[cloud, edge_backend]).await;
    outcome?;
    released?;

    info!("done");
    Ok(())
}

/// Route the queries file and print the summary. The router is shut down
/// before returning whenever it was built.
async fn run(
    args: &Args,
    config: &RouterConfig,
    edge: Arc<EdgeModel>,
    cloud: Arc<dyn ModelBackend>,
) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = FilterContext::new()
        .with_edge(edge.clone())
        .with_cloud(cloud.clone());
    let filter = FilterRegistry::new().build(&config.filter, &ctx)?;
    let router = QueryRouter::new(filter).with_edge(edge).with_cloud(cloud);

    let processed = process_queries(args, config, &router).await;
    let shut = router.shutdown().await;
    processed?;
    shut?;
    Ok(())
}

async fn process_queries(
    args: &Args,
    config: &RouterConfig,
    router: &QueryRouter,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = tokio::fs::read_to_string(&args.queries).await?;
    let mut records = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let query: Query = match serde_json::from_str(line) {
            Ok(query) => query,
            Err(e) => {
                warn!(line = line_no + 1, error = %e, "skipping malformed query");
                continue;
            }
        };

        if args.route_only {
            if let Err(e) = router.route(&query).await {
                error!(line = line_no + 1, error = %e, "routing failed");
            }
            continue;
        }

        match router.infer(&query).await {
            Ok(record) => records.push(record),
            Err(e) => error!(line = line_no + 1, error = %e, "inference failed"),
        }
    }

    let decisions = router.decisions();
    println!(
        "filter={} edge={} cloud={} errors={} cloud_fraction={:.3}",
        router.filter_name(),
        decisions.edge,
        decisions.cloud,
        decisions.errors,
        decisions.cloud_fraction()
    );

    match metrics::time_to_first_token(&records) {
        Ok(ttft) => println!("time_to_first_token={ttft:.3}s"),
        Err(e) => info!(reason = %e, "no TTFT to report"),
    }

    if let Some(report) = router.report() {
        println!("{report}");
    }

    if config.observability.metrics_enabled {
        print!("{}", metrics::gather_metrics());
    }
    Ok(())
}
