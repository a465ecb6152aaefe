use anyhow::{Context, Result, anyhow, bail};
use axum::http::{HeaderValue, Method};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use libsimdock::DemoEngine;
use simdock_server::api::{self, AppState};
use simdock_server::config::ServerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "simdock_server=info,libsimdock=info".into()),
        )
        .init();

    let config = Args::parse()?.into_config()?;
    let listen = SocketAddr::from_str(&config.listen)
        .with_context(|| format!("invalid listen address: {}", config.listen))?;

    let cors = build_cors(&config.allow_origins)?;
    let state = Arc::new(AppState::new(&config, Arc::new(DemoEngine::default()))?);
    let app = api::router(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("failed to bind listener on {listen}"))?;

    tracing::info!("simdock-server listening on http://{listen}");
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_cors(origins: &[String]) -> Result<CorsLayer> {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];

    if origins.iter().any(|o| o == "*") {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any));
    }

    let mut headers = Vec::with_capacity(origins.len());
    for origin in origins {
        headers.push(
            HeaderValue::from_str(origin)
                .with_context(|| format!("invalid --allow-origin value: {origin}"))?,
        );
    }

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(headers))
        .allow_methods(methods)
        .allow_headers(Any))
}

/// Command-line overrides applied on top of the config file.
#[derive(Debug, Default)]
struct Args {
    listen: Option<String>,
    data_dir: Option<PathBuf>,
    template_dir: Option<PathBuf>,
    allow_origins: Vec<String>,
}

impl Args {
    fn parse() -> Result<Self> {
        let mut parsed = Self::default();

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--listen" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--listen requires a value"))?;
                    parsed.listen = Some(value);
                }
                "--data-dir" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--data-dir requires a value"))?;
                    parsed.data_dir = Some(PathBuf::from(value));
                }
                "--template" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--template requires a value"))?;
                    parsed.template_dir = Some(PathBuf::from(value));
                }
                "--allow-origin" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--allow-origin requires a value"))?;
                    parsed.allow_origins.push(value);
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                other => bail!("unknown argument: {other}"),
            }
        }

        Ok(parsed)
    }

    fn into_config(self) -> Result<ServerConfig> {
        let mut config = ServerConfig::load()?;
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        if let Some(template_dir) = self.template_dir {
            config.template_dir = Some(template_dir);
        }
        if !self.allow_origins.is_empty() {
            config.allow_origins = self.allow_origins;
        }
        Ok(config)
    }
}

fn print_help() {
    println!(
        "simdock-server [--listen HOST:PORT] [--data-dir PATH] [--template PATH] [--allow-origin ORIGIN]"
    );
}
