//! remediation handlers, one variant per supported alert type

use serde::Serialize;

use super::client::{RemediationClient, RemediationError};
use crate::alert::Notification;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemediationHandler {
	/// asks the remediation endpoint to deal with a restarting pod
	PodRestart,
	/// asks the remediation endpoint to deal with an unhealthy namespace
	NamespaceLowHealth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Result of a handler run that did not fail on the wire
pub enum Outcome {
	/// every alert entry was posted
	Completed,
	/// an alert entry lacked the named label, remaining entries were skipped
	MissingLabel(&'static str),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PodRestartRequest<'a> {
	pod_name: &'a str,
	namespace_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceLowHealthRequest<'a> {
	namespace_name: &'a str,
}

impl RemediationHandler {
	/// Posts one request per alert entry of `notification` to `url`.
	///
	/// Stops at the first entry with a missing label or a failed request, the
	/// remaining entries are not sent.
	pub async fn handle_event(
		&self,
		client: &RemediationClient,
		notification: &Notification,
		url: &str,
	) -> Result<Outcome, RemediationError> {
		for alert in notification.alerts.iter() {
			let namespace_name = alert.label("namespace");
			if namespace_name.is_empty() {
				tracing::error!("{:?}: namespace label is empty, skipping remaining alerts", self);
				return Ok(Outcome::MissingLabel("namespace"));
			}

			let result = match self {
				Self::PodRestart => {
					let pod_name = alert.label("pod");
					if pod_name.is_empty() {
						tracing::error!("{:?}: pod label is empty, skipping remaining alerts", self);
						return Ok(Outcome::MissingLabel("pod"));
					}

					client.post(url, &PodRestartRequest { pod_name, namespace_name }).await
				}
				Self::NamespaceLowHealth => {
					client.post(url, &NamespaceLowHealthRequest { namespace_name }).await
				}
			};

			result?;
		}

		Ok(Outcome::Completed)
	}
}
