use anyhow::Result;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bet_client::config::{bet_from_env, log_load_error, ClientConfig};
use bet_client::{BetClient, ClientError, CsvRecordSource, InvalidRecordPolicy, TcpConnector};

#[tokio::main]
async fn main() -> Result<()> {
    // Structured logging, JSON unless LOG_FORMAT says otherwise
    let use_json = std::env::var("LOG_FORMAT")
        .unwrap_or_else(|_| "json".to_string())
        .eq_ignore_ascii_case("json");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bet_client=info".into());

    if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let config = ClientConfig::load().inspect_err(log_load_error)?;
    tracing::info!(
        service = "bet-client",
        version = env!("CARGO_PKG_VERSION"),
        client_id = %config.client_id,
        server_address = %config.server_address,
        batch_max_amount = config.batch.max_amount,
        batch_max_bytes = config.batch.max_bytes,
        poll_delay_ms = config.poll.delay_ms,
        "Configuration loaded"
    );

    let cancel = CancellationToken::new();
    let signal_handle = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            wait_for_shutdown().await;
            tracing::info!("Shutdown signal received");
            cancel.cancel();
        }
    });

    let mut client = BetClient::new(
        &config,
        TcpConnector::new(config.server_address.clone()),
        cancel,
    );

    let result = match &config.file_path {
        Some(path) => {
            let policy = InvalidRecordPolicy::from_skip_flag(config.batch.skip_invalid_rows);
            match CsvRecordSource::open(path, config.client_id.clone(), policy) {
                Ok(records) => client.run(records).await,
                Err(e) => Err(e),
            }
        }
        None => match bet_from_env(&config.client_id) {
            Ok(record) => client.run_single(record).await,
            Err(e) => Err(ClientError::InvalidRecord(e)),
        },
    };

    signal_handle.abort();

    match result {
        Ok(outcome) => {
            tracing::info!(
                batches_sent = outcome.batches_sent,
                bets_sent = outcome.bets_sent,
                ack_mismatches = outcome.ack_mismatches,
                winners = outcome.winners.as_deref().unwrap_or("-"),
                "Client finished"
            );
            Ok(())
        }
        Err(ClientError::Cancelled) => {
            ClientError::Cancelled.log();
            Ok(())
        }
        Err(e) => {
            e.log();
            Err(e.into())
        }
    }
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
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
}
