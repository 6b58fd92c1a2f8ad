use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use token_broker::clock::SystemClock;
use token_broker::github::{GitHubApp, IdentityProvider};
use token_broker::jobs::sweeper::Sweeper;
use token_broker::lifecycle::TokenLifecycle;
use token_broker::store::registry::CredentialRegistry;
use token_broker::{api, cli, config, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = cli::Cli::parse();
    // Fail fast: nothing is served with a broken configuration.
    let cfg = config::load().context("invalid configuration")?;

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(cli::Commands::RateLimit) => print_rate_limit(&cfg).await,
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

fn init_tracing() {
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    // Export spans over OTLP only when a collector is configured.
    let telemetry_layer = match std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        Ok(_) => {
            match opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(opentelemetry_otlp::new_exporter().tonic())
                .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                    KeyValue::new("service.name", "token-broker"),
                ])))
                .install_batch(opentelemetry_sdk::runtime::Tokio)
            {
                Ok(tracer) => Some(tracing_opentelemetry::layer().with_tracer(tracer)),
                Err(e) => {
                    eprintln!("failed to install OpenTelemetry tracer: {}", e);
                    None
                }
            }
        }
        Err(_) => None,
    };

    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let json_layer = json_logs.then(|| tracing_subscriber::fmt::layer().json());
    let text_layer = (!json_logs).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "token_broker=debug,tower_http=debug".into()),
        ))
        .with(json_layer)
        .with(text_layer)
        .with(telemetry_layer)
        .init();
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    tracing::info!(
        app_id = %cfg.app_id,
        installation_id = %cfg.installation_id,
        api_url = %cfg.api_url,
        "Initializing GitHub App client..."
    );
    let provider: Arc<dyn IdentityProvider> = Arc::new(GitHubApp::new(&cfg)?);

    let registry = Arc::new(CredentialRegistry::new());
    let lifecycle = Arc::new(TokenLifecycle::new(
        registry,
        provider.clone(),
        Arc::new(SystemClock),
        cfg.token_lifespan,
    )?);

    let state = Arc::new(AppState {
        lifecycle: lifecycle.clone(),
        provider,
    });
    let app = api::router(state, cfg.cors_allowed_origin.as_deref());

    let sweeper = Sweeper::new(lifecycle, cfg.cleanup_interval).start();

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        lifespan_ms = cfg.token_lifespan_ms(),
        "Token broker listening on {}",
        addr
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.stop().await;
    tracing::info!("Token broker shut down");
    Ok(())
}

async fn print_rate_limit(cfg: &config::Config) -> anyhow::Result<()> {
    let app = GitHubApp::new(cfg)?;
    let info = app
        .rate_limit_snapshot()
        .await
        .context("could not fetch rate limit information")?;
    println!(
        "Rate limit:\n  Limit:     {}\n  Remaining: {}\n  Used:      {}\n  Resets:    {}",
        info.limit,
        info.remaining,
        info.used,
        chrono::DateTime::<chrono::Utc>::from_timestamp(info.reset, 0)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| info.reset.to_string())
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received, stopping");
}
