//! alertmanager webhook endpoint
//!
//! Every notification is validated, stamped with its arrival time and
//! indexed into elasticsearch. Stored notifications are handed to the
//! [Dispatcher] afterwards, notifications that failed to store never are.

use std::{
	net::{IpAddr, Ipv4Addr, SocketAddr},
	sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
	extract::{rejection::BytesRejection, Extension},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::post,
	Router,
};
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;

use crate::{
	alert::{Notification, PayloadError},
	document_store::{DocumentStore, StoreError},
	metrics::IngestMetrics,
	partition::PartitionTemplate,
	remediation::Dispatcher,
};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WebhookReceiverSettings {
	pub bind_address: IpAddr,
	pub port: u16,
	/// url path alertmanager posts to
	pub path: String,
}

impl Default for WebhookReceiverSettings {
	fn default() -> Self {
		Self { bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED), port: 9097, path: "/webhook".to_owned() }
	}
}

impl WebhookReceiverSettings {
	pub fn to_socket_addr(&self) -> SocketAddr {
		SocketAddr::new(self.bind_address, self.port)
	}
}

/// Reasons a webhook call is answered with an error
#[derive(Error, Debug)]
pub enum IngestError {
	#[error("failed to read request body: {0}")]
	ReadBody(BytesRejection),
	#[error(transparent)]
	Payload(#[from] PayloadError),
	#[error("failed to serialize notification: {0}")]
	Serialize(serde_json::Error),
	#[error("unable to insert document in elasticsearch: {0}")]
	Index(#[from] StoreError),
}

impl IntoResponse for IngestError {
	fn into_response(self) -> Response {
		let status = match self {
			Self::ReadBody(_) | Self::Serialize(_) => StatusCode::INTERNAL_SERVER_ERROR,
			Self::Payload(_) | Self::Index(_) => StatusCode::BAD_REQUEST,
		};

		(status, self.to_string()).into_response()
	}
}

/// request independent state of the webhook endpoint
pub struct Ingestor {
	store: Arc<dyn DocumentStore>,
	partition: PartitionTemplate,
	dispatcher: Dispatcher,
	metrics: IngestMetrics,
}

impl Ingestor {
	pub fn new(
		store: Arc<dyn DocumentStore>,
		partition: PartitionTemplate,
		dispatcher: Dispatcher,
		metrics: IngestMetrics,
	) -> Self {
		Self { store, partition, dispatcher, metrics }
	}

	/// Handles one webhook call.
	///
	/// `received` is counted for every call, `invalid` for every rejected
	/// one. Remediation failures don't affect the result.
	pub async fn ingest(&self, body: Result<Bytes, BytesRejection>) -> Result<(), IngestError> {
		self.metrics.received.inc();

		let notification = match self.store_notification(body).await {
			Ok(notification) => notification,
			Err(err) => {
				self.metrics.invalid.inc();
				tracing::error!("{err}");
				return Err(err);
			}
		};

		tracing::debug!(
			"received and stored alert at {}: {:?}",
			notification.timestamp().unwrap_or_default(),
			notification.common_labels
		);
		self.metrics.successful.inc();

		self.dispatcher.dispatch(&notification).await;

		Ok(())
	}

	async fn store_notification(
		&self,
		body: Result<Bytes, BytesRejection>,
	) -> Result<Notification, IngestError> {
		let body = body.map_err(IngestError::ReadBody)?;
		let mut notification = Notification::from_webhook_body(&body)?;

		let now = Utc::now();
		notification.stamp(now);

		let document = serde_json::to_vec(&notification).map_err(IngestError::Serialize)?;
		self.store.index(&self.partition.build(now), document).await?;

		Ok(notification)
	}
}

async fn receive(
	Extension(ingestor): Extension<Arc<Ingestor>>,
	body: Result<Bytes, BytesRejection>,
) -> Result<StatusCode, IngestError> {
	ingestor.ingest(body).await?;

	Ok(StatusCode::OK)
}

pub fn router(path: &str, ingestor: Arc<Ingestor>) -> Router {
	Router::new().route(path, post(receive)).layer(Extension(ingestor))
}

pub async fn run_webhook_receiver(settings: &WebhookReceiverSettings, ingestor: Arc<Ingestor>) -> Result<()> {
	let addr = settings.to_socket_addr();
	let app = router(&settings.path, ingestor);

	tracing::info!("listening for alertmanager webhooks on {addr}{}", settings.path);

	axum::Server::bind(&addr)
		.serve(app.into_make_service())
		.await
		.context("alertmanager webhook endpoint crashed")?;

	Ok(())
}
