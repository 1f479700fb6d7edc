//! Print agent
//!
//! Connects to the configured printer, composes a receipt (a built-in test
//! receipt, or the job in `PRINT_JOB`) and sends it.

mod config;
mod demo;
mod logger;

use anyhow::Context;
use crab_printer::{ChannelBackends, TransportEvent};
use crab_receipt::{Catalog, ReceiptComposer, ReceiptJob};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use config::AgentConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AgentConfig::from_env()?;
    logger::init_logger(&config.log_level, config.log_dir.as_deref());

    info!(
        target_kind = config.target.kind(),
        paper = %config.paper,
        charset = %config.charset,
        "Print agent starting"
    );

    let job = match &config.job_file {
        Some(path) => {
            let json = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            ReceiptJob::from_json(&json)?
        }
        None => demo::test_receipt(&config),
    };
    let catalog = Catalog::builtin(job.config.language);
    let bytes = ReceiptComposer::new(&job, &catalog).compose()?;

    let transport = config
        .target
        .clone()
        .into_transport(&ChannelBackends::platform(), config.transport.clone())?;

    let mut events = transport.subscribe();
    let watcher = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(TransportEvent::StateChanged { from, to }) => {
                    info!(%from, %to, "Printer state changed")
                }
                Ok(TransportEvent::Error(e)) => warn!(error = %e, "Printer error"),
                Ok(TransportEvent::Data(data)) => debug!(bytes = data.len(), "Printer sent data"),
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "Event watcher lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let result = async {
        transport.connect().await?;
        transport.send(&bytes).await
    }
    .await;

    match &result {
        Ok(()) => info!(order = %job.order.number, bytes = bytes.len(), "Receipt printed"),
        Err(e) => error!(error = %e, "Printing failed"),
    }

    transport.destroy().await;
    watcher.abort();
    result.context("printing receipt")
}
