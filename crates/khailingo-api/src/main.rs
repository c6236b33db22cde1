//! `khailingo` - issue one authenticated call against the Khailingo backend
//!
//! Session cookies live for the duration of the process only, so this is
//! mostly useful against endpoints reachable with a fresh refresh cookie or
//! for checking how the backend reports errors.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};

use khailingo_api::config::ConfigManager;
use khailingo_api::{logging, ApiClient, ApiRequest, SessionEnd};

#[derive(Debug, Parser)]
#[command(name = "khailingo", version, about = "Call the Khailingo backend API")]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, env = "KHAILINGO_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides the configured API base URL
    #[arg(long, env = "KHAILINGO_BASE_URL")]
    base_url: Option<String>,

    /// Overrides the configured request timeout
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// GET an endpoint
    Get {
        endpoint: String,
        /// Query parameter as key=value; empty values are dropped
        #[arg(long = "param", short = 'p', value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// POST to an endpoint
    Post(BodyArgs),
    /// PUT to an endpoint
    Put(BodyArgs),
    /// PATCH an endpoint
    Patch(BodyArgs),
    /// DELETE an endpoint
    Delete { endpoint: String },
}

#[derive(Debug, Args)]
struct BodyArgs {
    endpoint: String,
    /// JSON request body
    #[arg(long, short = 'd')]
    data: Option<String>,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

impl Command {
    fn into_request(self) -> Result<ApiRequest> {
        let request = match self {
            Command::Get { endpoint, params } => {
                let query: Map<String, Value> = params
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect();
                ApiRequest::get(endpoint).query(&query)?
            }
            Command::Post(args) => with_body(ApiRequest::post(args.endpoint), args.data)?,
            Command::Put(args) => with_body(ApiRequest::put(args.endpoint), args.data)?,
            Command::Patch(args) => with_body(ApiRequest::patch(args.endpoint), args.data)?,
            Command::Delete { endpoint } => ApiRequest::delete(endpoint),
        };
        Ok(request)
    }
}

fn with_body(request: ApiRequest, data: Option<String>) -> Result<ApiRequest> {
    match data {
        Some(raw) => {
            let body: Value = serde_json::from_str(&raw).context("--data is not valid JSON")?;
            Ok(request.json(&body)?)
        }
        None => Ok(request),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init("info");

    let cli = Cli::parse();

    let manager = match cli.config {
        Some(path) => ConfigManager::load(path)?,
        None => ConfigManager::new()?,
    };
    let mut config = manager.get();
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.timeout_ms = timeout_ms;
    }

    let mut builder = ApiClient::builder(config.base_url.clone()).on_unauthorized(Arc::new(
        |reason: SessionEnd| match reason {
            SessionEnd::Forbidden => tracing::warn!("Access forbidden; signed out"),
            SessionEnd::RefreshFailed | SessionEnd::RetryRejected => {
                tracing::warn!("Session expired; sign in again");
            }
        },
    ));
    if let Some(timeout) = config.timeout() {
        builder = builder.timeout(timeout);
    }
    let client = builder.build()?;

    tracing::debug!(base_url = %client.base_url(), timeout_ms = ?client.timeout().map(|t| t.as_millis()), "Client ready");

    let request = cli.command.into_request()?;
    let method = request.method().clone();
    let endpoint = request.endpoint().to_string();

    let result: Value = client
        .send(request)
        .await
        .with_context(|| format!("{method} {endpoint} failed"))?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
