//! Elasticsearch backed document sink.
//!
//! The webhook receiver only needs "index document into partition", that
//! capability is expressed by [DocumentStore]. [ElasticsearchClient] talks to
//! the elasticsearch REST api.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use backoff::backoff::{Backoff, Constant};
use reqwest::{header::CONTENT_TYPE, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_with::{serde_as, DurationSecondsWithFrac};
use thiserror::Error;
use url::Url;

use crate::partition::PartitionTemplate;

/// Error returned by a single store request
#[derive(Error, Debug)]
pub enum StoreError {
	#[error("request to elasticsearch failed: {0}")]
	Transport(#[from] reqwest::Error),
	#[error("elasticsearch responded with {status}: {body}")]
	Status { status: StatusCode, body: String },
}

/// Sink for notification documents
#[async_trait]
pub trait DocumentStore: Send + Sync {
	/// index the serialized `document` into `partition`
	async fn index(&self, partition: &str, document: Vec<u8>) -> Result<(), StoreError>;
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
/// connection settings of the elasticsearch cluster
pub struct ElasticsearchSettings {
	/// base url of the cluster
	pub address: Url,
	/// index name template, see [PartitionTemplate]
	#[serde(default)]
	pub index: PartitionTemplate,
	#[serde(default)]
	pub username: Option<String>,
	#[serde(default)]
	pub password: Option<String>,
	/// sent as `Authorization: ApiKey <api_key>`, takes precedence over basic
	/// auth
	#[serde(default)]
	pub api_key: Option<String>,
	/// skip tls certificate verification
	#[serde(default)]
	pub insecure: bool,
	/// number of reachability checks at startup before giving up
	#[serde(default = "default_connect_retries")]
	pub connect_retries: u32,
	#[serde_as(as = "DurationSecondsWithFrac<f64>")]
	#[serde(default = "default_connect_retry_delay")]
	pub connect_retry_delay: Duration,
}

fn default_connect_retries() -> u32 {
	5
}

fn default_connect_retry_delay() -> Duration {
	Duration::from_secs(5)
}

#[derive(Debug, Clone)]
pub struct ElasticsearchClient {
	client: reqwest::Client,
	address: String,
	username: Option<String>,
	password: Option<String>,
	api_key: Option<String>,
}

impl ElasticsearchClient {
	/// Builds the client and waits until the cluster answers.
	///
	/// The cluster info endpoint is polled `connect_retries` times with
	/// `connect_retry_delay` between attempts. Only startup is retried,
	/// [DocumentStore::index] calls are not.
	pub async fn connect(settings: &ElasticsearchSettings) -> Result<Self> {
		let client = reqwest::Client::builder()
			.danger_accept_invalid_certs(settings.insecure)
			.build()
			.context("failed to build elasticsearch http client")?;

		let store = Self {
			client,
			address: settings.address.as_str().trim_end_matches('/').to_owned(),
			username: settings.username.clone(),
			password: settings.password.clone(),
			api_key: settings.api_key.clone(),
		};

		let retries = settings.connect_retries.max(1);
		let mut backoff = Constant::new(settings.connect_retry_delay);
		let mut tries = 0;

		loop {
			match store.info().await {
				Ok(()) => break,
				Err(err) => {
					tries += 1;
					if tries >= retries {
						return Err(err).context(format!(
							"elasticsearch at {} unreachable after {tries} attempts",
							store.address
						));
					}

					tracing::info!("failed to connect to elasticsearch, retry...: {err}");
					if let Some(delay) = backoff.next_backoff() {
						tokio::time::sleep(delay).await;
					}
				}
			}
		}

		tracing::info!("connected to elasticsearch at {}", store.address);

		Ok(store)
	}

	/// cluster info request, used as reachability check
	async fn info(&self) -> Result<(), StoreError> {
		let response = self.authorize(self.client.get(&self.address)).send().await?;

		check_status(response).await
	}

	fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
		match (&self.api_key, &self.username) {
			(Some(api_key), _) => request.header("Authorization", format!("ApiKey {api_key}")),
			(None, Some(username)) => request.basic_auth(username, self.password.as_ref()),
			(None, None) => request,
		}
	}
}

async fn check_status(response: reqwest::Response) -> Result<(), StoreError> {
	let status = response.status();
	if status.is_success() {
		return Ok(());
	}

	let body = response.text().await.unwrap_or_default();
	Err(StoreError::Status { status, body })
}

#[async_trait]
impl DocumentStore for ElasticsearchClient {
	async fn index(&self, partition: &str, document: Vec<u8>) -> Result<(), StoreError> {
		let url = format!("{}/{partition}/_doc", self.address);

		let response = self
			.authorize(self.client.post(url))
			.header(CONTENT_TYPE, "application/json")
			.body(document)
			.send()
			.await?;

		check_status(response).await
	}
}
