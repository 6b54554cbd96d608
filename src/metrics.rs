//! prometheus meters for the webhook receiver

use prometheus::{opts, IntCounter, Registry};

#[derive(Debug, Clone)]
/// counters owned by the [Ingestor](crate::webhook_receiver::Ingestor)
pub struct IngestMetrics {
	/// every webhook call, counted before validation
	pub received: IntCounter,
	/// calls rejected during validation or indexing
	pub invalid: IntCounter,
	/// notifications stored in elasticsearch
	pub successful: IntCounter,
}

impl IngestMetrics {
	/// construct prometheus meters and register them in `registry`
	pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
		let received = IntCounter::with_opts(
			opts!("alerts_received", "alertmanager2es received alerts").namespace("alertmanager2es"),
		)?;
		let invalid = IntCounter::with_opts(
			opts!("alerts_invalid", "alertmanager2es invalid alerts").namespace("alertmanager2es"),
		)?;
		let successful = IntCounter::with_opts(
			opts!("alerts_successful", "alertmanager2es successful stored alerts")
				.namespace("alertmanager2es"),
		)?;

		registry.register(Box::new(received.clone()))?;
		registry.register(Box::new(invalid.clone()))?;
		registry.register(Box::new(successful.clone()))?;

		Ok(Self { received, invalid, successful })
	}
}
