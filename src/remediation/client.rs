//! http client used to call remediation endpoints

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemediationError {
	#[error("post to remediation endpoint {url:?} failed: {source}")]
	Post {
		url: String,
		#[source]
		source: reqwest::Error,
	},
}

#[derive(Debug, Clone)]
/// Shared client for remediation calls. Requests are bounded by the client
/// timeout, nothing is retried.
pub struct RemediationClient {
	client: reqwest::Client,
}

impl RemediationClient {
	pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
		let mut headers = HeaderMap::new();
		headers.insert(
			USER_AGENT,
			HeaderValue::from_static(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))),
		);

		let client = reqwest::Client::builder().timeout(timeout).default_headers(headers).build()?;

		Ok(Self { client })
	}

	/// POST `body` as json to `url`. Transport errors and non 2xx responses
	/// are failures.
	pub async fn post<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<(), RemediationError> {
		let to_error = |source| RemediationError::Post { url: url.to_owned(), source };

		self.client
			.post(url)
			.json(body)
			.send()
			.await
			.map_err(to_error)?
			.error_for_status()
			.map_err(to_error)?;

		Ok(())
	}
}
