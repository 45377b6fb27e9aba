use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use profmatch::api::{cors_layer, router, MatchLimits, MatchService, DEFAULT_ALLOWED_ORIGIN};
use profmatch::config::{EmbedderArgs, StoreArgs};
use profmatch::init_tracing;

#[derive(Parser, Debug)]
#[command(
    name = "profmatch-api",
    about = "HTTP API that matches student research interests to stored professors"
)]
struct ApiCli {
    /// Address to bind the HTTP server to (host:port).
    #[arg(long, env = "PROFMATCH_BIND", default_value = "127.0.0.1:8000")]
    bind: String,

    /// Browser origin allowed to call the API (repeatable)
    #[arg(
        long = "allowed-origin",
        env = "PROFMATCH_ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_value = DEFAULT_ALLOWED_ORIGIN
    )]
    allowed_origins: Vec<String>,

    /// Matches returned when the request omits `num_matches`
    #[arg(long, env = "PROFMATCH_DEFAULT_TOP_K", default_value_t = 5)]
    default_top_k: usize,

    /// Maximum matches allowed per request
    #[arg(long, env = "PROFMATCH_MAX_TOP_K", default_value_t = 12)]
    max_top_k: usize,

    #[command(flatten)]
    embedder: EmbedderArgs,

    #[command(flatten)]
    store: StoreArgs,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = ApiCli::parse();

    let addr: SocketAddr = cli
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", cli.bind))?;
    let cors = cors_layer(&cli.allowed_origins)?;
    let limits = MatchLimits {
        default_top_k: cli.default_top_k.max(1),
        max_top_k: cli.max_top_k.max(1),
    };

    // Blocking clients own runtimes of their own; build and drop them outside
    // the server runtime.
    let service = Arc::new(MatchService::new(
        cli.embedder.build()?,
        cli.store.connect()?,
        limits,
    ));
    let app = router(Arc::clone(&service)).layer(cors);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start server runtime")?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        tracing::info!(%addr, "profmatch-api listening");
        axum::serve(listener, app).await.context("server shutdown")
    })?;
    drop(runtime);
    drop(service);
    Ok(())
}
