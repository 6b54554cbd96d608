//! Forwards stored notifications of selected alert types to remediation
//! endpoints.
//!
//! The [Dispatcher] owns a routing table from `alertname` to a
//! [RemediationHandler] and the url it posts to. The table is built once at
//! startup and never changes afterwards.

use std::{collections::HashMap, time::Duration};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_with::{serde_as, DurationSecondsWithFrac};

use self::client::RemediationClient;
pub use self::handler::{Outcome, RemediationHandler};
use crate::alert::Notification;

mod client;
mod handler;

/// `alertname` handled by [RemediationHandler::PodRestart]
pub const POD_RESTART_ALERT: &str = "PodRestartTooMany>20";
/// `alertname` handled by [RemediationHandler::NamespaceLowHealth]
pub const NAMESPACE_LOW_HEALTH_ALERT: &str = "NamespaceLowHealthLevel";

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
/// remediation endpoints, a missing url is kept as empty string
pub struct RemediationSettings {
	#[serde(default)]
	pub pod_restart_url: String,
	#[serde(default)]
	pub namespace_low_health_url: String,
	/// timeout of a single remediation request
	#[serde_as(as = "DurationSecondsWithFrac<f64>")]
	#[serde(default = "default_request_timeout")]
	pub request_timeout: Duration,
}

fn default_request_timeout() -> Duration {
	Duration::from_secs(10)
}

impl Default for RemediationSettings {
	fn default() -> Self {
		Self {
			pod_restart_url: String::new(),
			namespace_low_health_url: String::new(),
			request_timeout: default_request_timeout(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// handler and target of one routing table entry
pub struct Route {
	pub handler: RemediationHandler,
	pub url: String,
}

#[derive(Debug)]
pub struct Dispatcher {
	client: RemediationClient,
	routes: HashMap<String, Route>,
}

impl Dispatcher {
	pub fn new(settings: &RemediationSettings) -> Result<Self> {
		let client = RemediationClient::new(settings.request_timeout)
			.context("failed to build remediation http client")?;

		let routes = HashMap::from([
			(
				POD_RESTART_ALERT.to_owned(),
				Route { handler: RemediationHandler::PodRestart, url: settings.pod_restart_url.clone() },
			),
			(
				NAMESPACE_LOW_HEALTH_ALERT.to_owned(),
				Route {
					handler: RemediationHandler::NamespaceLowHealth,
					url: settings.namespace_low_health_url.clone(),
				},
			),
		]);

		for (alert_name, route) in routes.iter() {
			if route.url.is_empty() {
				tracing::warn!("no remediation url configured for {alert_name}, its requests will fail");
			}
		}

		Ok(Self { client, routes })
	}

	/// routing table entry for the notification's `alertname`
	pub fn route(&self, notification: &Notification) -> Option<&Route> {
		notification.alert_name().and_then(|alert_name| self.routes.get(alert_name))
	}

	/// Runs the matching handler once for `notification`. Unknown alert names
	/// are ignored, handler errors are logged and swallowed.
	pub async fn dispatch(&self, notification: &Notification) {
		let Some(Route { handler, url }) = self.route(notification) else {
			return;
		};

		tracing::info!("dispatching {:?} to {handler:?}", notification.alert_name());

		match handler.handle_event(&self.client, notification, url).await {
			Ok(Outcome::Completed) => tracing::debug!("{handler:?} completed"),
			Ok(Outcome::MissingLabel(label)) => {
				tracing::debug!("{handler:?} skipped alerts without {label} label")
			}
			Err(err) => tracing::error!("{err}"),
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;
	use wiremock::{
		matchers::{body_json, method, path},
		Mock, MockServer, ResponseTemplate,
	};

	use super::*;

	fn settings(server: &MockServer) -> RemediationSettings {
		RemediationSettings {
			pod_restart_url: format!("{}/pod", server.uri()),
			namespace_low_health_url: format!("{}/namespace", server.uri()),
			request_timeout: Duration::from_secs(5),
		}
	}

	fn notification(alert_name: &str) -> Notification {
		serde_json::from_value(json!({
			"version": "4",
			"commonLabels": {"alertname": alert_name},
			"alerts": [{"labels": {"namespace": "ns1", "pod": "p1"}}]
		}))
		.unwrap()
	}

	#[test]
	fn routes_known_alert_names() {
		let dispatcher = Dispatcher::new(&RemediationSettings {
			pod_restart_url: "http://admin/pod".to_owned(),
			..Default::default()
		})
		.unwrap();

		assert_eq!(
			dispatcher.route(&notification(POD_RESTART_ALERT)),
			Some(&Route { handler: RemediationHandler::PodRestart, url: "http://admin/pod".to_owned() })
		);
		assert_eq!(
			dispatcher.route(&notification(NAMESPACE_LOW_HEALTH_ALERT)),
			Some(&Route { handler: RemediationHandler::NamespaceLowHealth, url: String::new() })
		);
	}

	#[test]
	fn alert_name_match_is_exact() {
		let dispatcher = Dispatcher::new(&RemediationSettings::default()).unwrap();

		assert_eq!(dispatcher.route(&notification("PodRestartTooMany")), None);
		assert_eq!(dispatcher.route(&notification("namespacelowhealthlevel")), None);
		assert_eq!(dispatcher.route(&Notification::default()), None);
	}

	#[tokio::test]
	async fn unknown_alert_sends_nothing() {
		let server = MockServer::start().await;
		Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

		let dispatcher = Dispatcher::new(&settings(&server)).unwrap();

		assert_eq!(dispatcher.route(&notification("UnknownAlert")), None);
		dispatcher.dispatch(&notification("UnknownAlert")).await;
	}

	#[tokio::test]
	async fn dispatches_pod_restart() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/pod"))
			.and(body_json(json!({"podName": "p1", "namespaceName": "ns1"})))
			.respond_with(ResponseTemplate::new(200))
			.expect(1)
			.mount(&server)
			.await;

		let dispatcher = Dispatcher::new(&settings(&server)).unwrap();

		dispatcher.dispatch(&notification(POD_RESTART_ALERT)).await;
	}

	#[tokio::test]
	async fn dispatches_namespace_low_health() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/namespace"))
			.and(body_json(json!({"namespaceName": "ns1"})))
			.respond_with(ResponseTemplate::new(200))
			.expect(1)
			.mount(&server)
			.await;

		let dispatcher = Dispatcher::new(&settings(&server)).unwrap();

		dispatcher.dispatch(&notification(NAMESPACE_LOW_HEALTH_ALERT)).await;
	}

	#[tokio::test]
	async fn handler_errors_are_swallowed() {
		let server = MockServer::start().await;
		Mock::given(method("POST")).respond_with(ResponseTemplate::new(502)).expect(1).mount(&server).await;

		let dispatcher = Dispatcher::new(&settings(&server)).unwrap();

		dispatcher.dispatch(&notification(NAMESPACE_LOW_HEALTH_ALERT)).await;
	}
}
