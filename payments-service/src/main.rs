//! Payments service - creates Stripe checkout sessions and turns Stripe
//! webhooks into `payment.succeeded` messages on RabbitMQ.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal, sync::watch};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use payments::web::router;
use payments::{
    consumer, AppState, CheckoutSessionFactory, Config, DomainEventEmitter, Publisher,
    StripeClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("payments_service_starting");

    let config = Config::from_env();
    info!(
        port = config.port,
        stripe_api_base = %config.stripe_api_base,
        stripe_secret_set = !config.stripe_secret.is_empty(),
        endpoint_secret_set = !config.stripe_endpoint_secret.is_empty(),
        signature_tolerance_secs = config.signature_tolerance_secs,
        publish_timeout_ms = config.publish_timeout_ms,
        session_rpc_enabled = config.session_rpc_enabled,
        "config_loaded"
    );
    config.validate().context("Invalid configuration")?;

    let publisher = Publisher::new(config.amqp_url.clone());
    let emitter = DomainEventEmitter::new(Arc::new(publisher.clone()), config.publish_timeout());

    let stripe = StripeClient::new(&config)?;
    let sessions = Arc::new(CheckoutSessionFactory::new(
        Arc::new(stripe),
        config.stripe_success_url.clone(),
        config.stripe_cancel_url.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let consumer_task = if config.session_rpc_enabled {
        let amqp_url = config.amqp_url.clone();
        let sessions = Arc::clone(&sessions);
        let mut rx = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            let stop = async move {
                let _ = rx.changed().await;
            };
            if let Err(e) = consumer::run(&amqp_url, sessions, stop).await {
                error!(error = %format!("{:#}", e), "session_consumer_failed");
            }
        }))
    } else {
        None
    };

    let state = AppState::new(config.clone(), emitter, sessions);
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await
        .context("Server error")?;

    if let Some(task) = consumer_task {
        let _ = task.await;
    }

    publisher.close().await;

    info!("payments_service_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("payments_service_shutting_down");
}
