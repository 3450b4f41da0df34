//! Board client
//!
//! Command-line client for the board API:
//! 1. Loads configuration and the seed access token
//! 2. Optionally starts the in-process development backend
//! 3. Fetches popular posts through the authenticated client
//! 4. Prints them once, or keeps polling with `--watch`

mod board;
mod config;
mod mock;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use api_client::{ApiClient, ApiError};
use session_auth::CredentialStore;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::mock::MockBackend;

/// Exit code for an expired or rejected session.
const EXIT_SIGNED_OUT: u8 = 2;

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    config: Option<String>,
    watch: bool,
}

/// Simple flag parsing: `--config <path>` and `--watch`.
fn parse_args(args: &[String]) -> CliArgs {
    CliArgs {
        config: args
            .iter()
            .position(|a| a == "--config")
            .and_then(|i| args.get(i + 1))
            .cloned(),
        watch: args.iter().any(|a| a == "--watch"),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    info!("starting board-client");

    let args: Vec<String> = std::env::args().collect();
    let cli = parse_args(&args);

    let config_path = Config::resolve_path(cli.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    // The development backend is bound before the client sees its origin
    let origin = if config.dev.mock {
        mock::start(MockBackend::new()).await?
    } else {
        config.origin().context("invalid api.base_url")?
    };

    info!(
        origin = %origin,
        mock = config.dev.mock,
        watch = cli.watch,
        signed_in = config.session.token.is_some(),
        timeout_secs = config.api.timeout_secs,
        "configuration loaded"
    );

    let store = match config.session.token.clone() {
        Some(token) => CredentialStore::with_token(token),
        None => CredentialStore::new(),
    };
    let client = ApiClient::connect(
        origin,
        Arc::new(store),
        Duration::from_secs(config.api.timeout_secs),
    )
    .context("failed to build API client")?;

    let result = if cli.watch {
        watch_popular(&client, Duration::from_secs(config.dev.poll_interval_secs)).await
    } else {
        print_popular(&client).await
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) if is_signed_out(&e) => {
            error!(error = %e, "session expired, sign in again");
            Ok(ExitCode::from(EXIT_SIGNED_OUT))
        }
        Err(e) => Err(e),
    }
}

/// Whether `err` means the user has to sign in again.
fn is_signed_out(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ApiError>().is_some_and(ApiError::is_auth)
}

async fn print_popular(client: &ApiClient) -> Result<()> {
    let posts = board::popular_posts(client).await?;
    info!(posts = posts.len(), "fetched popular posts");
    println!("{}", serde_json::to_string_pretty(&posts)?);
    Ok(())
}

/// Poll until SIGINT/SIGTERM. Transient failures are logged and retried on
/// the next tick; an auth failure ends the loop.
async fn watch_popular(client: &ApiClient, interval: Duration) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => return Ok(()),
            _ = ticker.tick() => match print_popular(client).await {
                Ok(()) => {}
                Err(e) if is_signed_out(&e) => return Err(e),
                Err(e) => warn!(error = %e, retry_in_secs = interval.as_secs(), "fetching popular posts failed"),
            },
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_args_defaults() {
        assert_eq!(parse_args(&args(&["board-client"])), CliArgs::default());
    }

    #[test]
    fn parse_args_config_and_watch() {
        let cli = parse_args(&args(&["board-client", "--watch", "--config", "/etc/b.toml"]));
        assert_eq!(
            cli,
            CliArgs {
                config: Some("/etc/b.toml".into()),
                watch: true,
            }
        );
    }

    #[test]
    fn parse_args_dangling_config_is_ignored() {
        let cli = parse_args(&args(&["board-client", "--config"]));
        assert_eq!(cli.config, None);
    }

    #[test]
    fn auth_errors_mean_signed_out() {
        let auth = anyhow::Error::new(ApiError::Auth {
            status: 401,
            message: "token refresh failed".into(),
        });
        assert!(is_signed_out(&auth));

        let network = anyhow::Error::new(ApiError::Network("connection refused".into()));
        assert!(!is_signed_out(&network));

        let other = anyhow::anyhow!("config broken");
        assert!(!is_signed_out(&other));
    }

    #[tokio::test]
    async fn print_popular_against_development_backend() {
        let origin = mock::start(MockBackend::new()).await.unwrap();
        let client = ApiClient::connect(
            origin,
            Arc::new(CredentialStore::new()),
            Duration::from_secs(5),
        )
        .unwrap();

        print_popular(&client).await.unwrap();
    }

    #[tokio::test]
    async fn watch_stops_on_auth_failure() {
        let backend = MockBackend::new();
        let origin = mock::start(backend.clone()).await.unwrap();
        backend.revoke_session();
        let client = ApiClient::connect(
            origin,
            Arc::new(CredentialStore::new()),
            Duration::from_secs(5),
        )
        .unwrap();

        let err = watch_popular(&client, Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(is_signed_out(&err), "got: {err:?}");
    }
}
