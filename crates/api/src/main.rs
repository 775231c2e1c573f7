//! hook-sync: pull local working copies when a signed webhook arrives

use processor::GitPuller;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod error;
mod routes;
mod state;

use state::AppState;

fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("api=debug".parse()?)
        .add_directive("processor=debug".parse()?)
        .add_directive("github=debug".parse()?)
        .add_directive("common=info".parse()?);

    // LOG_FORMAT=json for log shippers
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    init_tracing()?;

    info!("Starting hook-sync {}", env!("CARGO_PKG_VERSION"));

    // Load configuration once; nothing mutates it afterwards
    let config = common::Config::from_env()?;

    let puller = Arc::new(GitPuller::from_command(&config.pull_command)?);
    let state = Arc::new(AppState::new(config.clone(), puller)?);

    let app = routes::router(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    info!(
        "Listening on {} for repositories under {}",
        addr,
        config.repo_root.display()
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
