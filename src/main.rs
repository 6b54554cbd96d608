//! prometheus alertmanager receiver that stores notifications in elasticsearch
//!
//! Features:
//! - indexes every notification into a date partitioned elasticsearch index
//! - forwards selected alert types to remediation endpoints
//! - exposes prometheus counters about received, invalid and stored alerts

use std::sync::Arc;

use anyhow::{Context, Result};
use document_store::ElasticsearchClient;
use metrics::IngestMetrics;
use prometheus::Registry;
use remediation::Dispatcher;
use settings::Settings;
use webhook_receiver::Ingestor;

mod alert;
mod document_store;
mod log;
mod metrics;
mod partition;
mod remediation;
mod settings;
mod telemetry_endpoint;
mod webhook_receiver;

/// exit the complete program if one thread panics
fn setup_panic_handler() {
	let default_panic = std::panic::take_hook();
	std::panic::set_hook(Box::new(move |info| {
		default_panic(info);
		std::process::exit(1);
	}));
}

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<()> {
	setup_panic_handler();

	let settings = Settings::load().context("failed to load config and command line arguments")?;

	log::setup_logging(&settings.log).context("could not setup logging")?;

	let registry = Registry::new();
	let metrics = IngestMetrics::new(&registry).context("failed to register metrics")?;

	let store = ElasticsearchClient::connect(&settings.elasticsearch)
		.await
		.context("failed to connect to elasticsearch")?;

	let dispatcher =
		Dispatcher::new(&settings.remediation).context("failed to construct remediation dispatcher")?;

	let ingestor = Arc::new(Ingestor::new(
		Arc::new(store),
		settings.elasticsearch.index.clone(),
		dispatcher,
		metrics,
	));

	tokio::try_join!(
		webhook_receiver::run_webhook_receiver(&settings.webhook_receiver, ingestor),
		telemetry_endpoint::run_telemetry_endpoint(&settings.telemetry_endpoint, registry),
	)?;

	Ok(())
}
