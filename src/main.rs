//! Standalone host for the device processor.
//!
//! Transactions are started by the authorization server embedding the
//! library through `DeviceProcessor::start_communication`. On its own the
//! binary serves the async callback endpoint and logs completions.

use ciba_device::application::callback::CallbackReceiver;
use ciba_device::application::completion::CompletionDispatcher;
use ciba_device::application::processor::DeviceProcessor;
use ciba_device::application::strategy::StrategyDeps;
use ciba_device::config::{Cli, ProcessorConfig};
use ciba_device::domain::ports::{CorrelationStoreRef, ProtocolEngineRef};
use ciba_device::infrastructure::http_device::HttpDeviceClient;
use ciba_device::infrastructure::in_memory::{InMemoryClaimDirectory, InMemoryCorrelationStore};
use ciba_device::infrastructure::logging_engine::LoggingProtocolEngine;
use ciba_device::interfaces::http;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = ProcessorConfig::try_from(&cli).into_diagnostic()?;

    // No protocol engine is attached to the standalone binary; completions
    // are logged.
    let engine: ProtocolEngineRef = Arc::new(LoggingProtocolEngine::log_only());
    let store: CorrelationStoreRef = Arc::new(InMemoryCorrelationStore::new());
    let dispatcher =
        CompletionDispatcher::new(engine).with_claims(Arc::new(InMemoryClaimDirectory::new()));

    let device = Arc::new(HttpDeviceClient::new(&config).into_diagnostic()?);
    let processor = DeviceProcessor::start(
        &config,
        StrategyDeps {
            device,
            store: store.clone(),
            dispatcher: dispatcher.clone(),
        },
    )
    .into_diagnostic()?;

    let app = http::router(CallbackReceiver::new(store, dispatcher));
    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .into_diagnostic()?;
    tracing::info!(
        address = %cli.bind,
        mode = %processor.mode(),
        device = %config.device_url,
        "callback endpoint listening on {}",
        http::CALLBACK_PATH
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .into_diagnostic()?;

    processor.shutdown().await;
    Ok(())
}
