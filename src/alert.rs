//! data structures for deserializing incoming alertmanager notifications
use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_with::{serde_as, DefaultOnNull};
use thiserror::Error;

/// the only alertmanager webhook payload version we understand
pub const SUPPORTED_WEBHOOK_VERSION: &str = "4";

/// label carrying the name of the alert group
pub const ALERT_NAME_LABEL: &str = "alertname";

/// written for alert times missing from the payload, alertmanager uses it for
/// alerts that did not end yet
const ZERO_TIME: &str = "0001-01-01T00:00:00Z";

/// Reasons a webhook body is rejected before it reaches the document store
#[derive(Error, Debug)]
pub enum PayloadError {
	#[error("got empty request body")]
	Empty,
	#[error("{0}")]
	Malformed(#[from] serde_json::Error),
	#[error(
		"do not understand webhook version {0:?}, only version {:?} is supported",
		SUPPORTED_WEBHOOK_VERSION
	)]
	UnsupportedVersion(String),
}

#[serde_as]
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
/// notification sent by alertmanager to the webhook receiver, `null` fields
/// read as empty
#[allow(clippy::missing_docs_in_private_items)]
pub struct Notification {
	#[serde_as(as = "DefaultOnNull")]
	pub version: String,
	#[serde_as(as = "DefaultOnNull")]
	pub group_key: String,

	#[serde_as(as = "DefaultOnNull")]
	pub receiver: String,
	#[serde_as(as = "DefaultOnNull")]
	pub status: String,
	#[serde_as(as = "DefaultOnNull")]
	pub alerts: Vec<AlertEntry>,
	#[serde_as(as = "DefaultOnNull<HashMap<_, DefaultOnNull>>")]
	pub group_labels: HashMap<String, String>,
	#[serde_as(as = "DefaultOnNull<HashMap<_, DefaultOnNull>>")]
	pub common_labels: HashMap<String, String>,
	#[serde_as(as = "DefaultOnNull<HashMap<_, DefaultOnNull>>")]
	pub common_annotations: HashMap<String, String>,
	#[serde_as(as = "DefaultOnNull")]
	#[serde(rename = "externalURL")]
	pub external_url: String,

	/// point in time the notification was received, never taken from the
	/// request body
	#[serde(rename = "@timestamp", skip_deserializing, skip_serializing_if = "Option::is_none")]
	timestamp: Option<String>,
}

#[serde_as]
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
/// single alert inside a [Notification]
#[allow(clippy::missing_docs_in_private_items)]
pub struct AlertEntry {
	#[serde_as(as = "DefaultOnNull")]
	pub status: String,
	#[serde_as(as = "DefaultOnNull<HashMap<_, DefaultOnNull>>")]
	pub labels: HashMap<String, String>,
	#[serde_as(as = "DefaultOnNull<HashMap<_, DefaultOnNull>>")]
	pub annotations: HashMap<String, String>,
	/// kept with the offset it was sent with
	#[serde(serialize_with = "serialize_alert_time")]
	pub starts_at: Option<DateTime<FixedOffset>>,
	#[serde(serialize_with = "serialize_alert_time")]
	pub ends_at: Option<DateTime<FixedOffset>>,
	#[serde_as(as = "DefaultOnNull")]
	#[serde(rename = "generatorURL")]
	pub generator_url: String,
}

/// RFC3339 with the original offset (`Z` for UTC) and only as many fraction
/// digits as needed, missing times are written as [ZERO_TIME]
fn serialize_alert_time<S: Serializer>(
	time: &Option<DateTime<FixedOffset>>,
	serializer: S,
) -> Result<S::Ok, S::Error> {
	match time {
		Some(time) => serializer.serialize_str(
			&time.to_rfc3339_opts(SecondsFormat::AutoSi, time.offset().local_minus_utc() == 0),
		),
		None => serializer.serialize_str(ZERO_TIME),
	}
}

impl Notification {
	/// Parses and validates a raw webhook body.
	///
	/// Checks are applied in order: body presence, json structure, payload
	/// version.
	pub fn from_webhook_body(body: &[u8]) -> Result<Self, PayloadError> {
		if body.is_empty() {
			return Err(PayloadError::Empty);
		}

		let notification: Self = serde_json::from_slice(body)?;

		if notification.version != SUPPORTED_WEBHOOK_VERSION {
			return Err(PayloadError::UnsupportedVersion(notification.version));
		}

		Ok(notification)
	}

	/// record the time the notification was received
	pub fn stamp(&mut self, at: DateTime<Utc>) {
		self.timestamp = Some(at.to_rfc3339_opts(SecondsFormat::Secs, true));
	}

	pub fn timestamp(&self) -> Option<&str> {
		self.timestamp.as_deref()
	}

	/// value of the `alertname` common label
	pub fn alert_name(&self) -> Option<&str> {
		self.common_labels.get(ALERT_NAME_LABEL).map(String::as_str)
	}
}

impl AlertEntry {
	/// label value, empty if the label is missing
	pub fn label(&self, name: &str) -> &str {
		self.labels.get(name).map_or("", String::as_str)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const FIRING: &str = r#"{
		"version": "4",
		"groupKey": "{}:{alertname=\"NamespaceLowHealthLevel\"}",
		"status": "firing",
		"receiver": "es",
		"groupLabels": {"alertname": "NamespaceLowHealthLevel"},
		"commonLabels": {"alertname": "NamespaceLowHealthLevel", "namespace": "ns1"},
		"commonAnnotations": {},
		"externalURL": "http://alertmanager:9093",
		"alerts": [
			{
				"status": "firing",
				"labels": {"alertname": "NamespaceLowHealthLevel", "namespace": "ns1"},
				"annotations": {"summary": "namespace unhealthy"},
				"startsAt": "2021-03-04T10:00:00Z",
				"endsAt": "0001-01-01T00:00:00Z",
				"generatorURL": "http://prometheus:9090/graph"
			}
		]
	}"#;

	#[test]
	fn parses_full_notification() {
		let notification = Notification::from_webhook_body(FIRING.as_bytes()).unwrap();

		assert_eq!(notification.alert_name(), Some("NamespaceLowHealthLevel"));
		assert_eq!(notification.external_url, "http://alertmanager:9093");
		assert_eq!(notification.alerts.len(), 1);
		assert_eq!(notification.alerts[0].label("namespace"), "ns1");
		assert_eq!(notification.alerts[0].label("pod"), "");
		assert!(notification.timestamp().is_none());
	}

	#[test]
	fn missing_fields_take_defaults() {
		let notification =
			Notification::from_webhook_body(br#"{"version":"4","alerts":[{"labels":{"pod":"p"}}]}"#)
				.unwrap();

		assert!(notification.common_labels.is_empty());
		assert_eq!(notification.alert_name(), None);
		assert_eq!(notification.alerts[0].label("pod"), "p");
		assert!(notification.alerts[0].starts_at.is_none());
	}

	#[test]
	fn alert_times_keep_their_offset() {
		let notification = Notification::from_webhook_body(
			br#"{"version":"4","alerts":[
				{"startsAt":"2021-03-04T10:00:00.123456789+02:00","endsAt":"0001-01-01T00:00:00Z"},
				{"status":"firing"}
			]}"#,
		)
		.unwrap();

		let document = serde_json::to_value(&notification).unwrap();
		assert_eq!(document["alerts"][0]["startsAt"], "2021-03-04T10:00:00.123456789+02:00");
		assert_eq!(document["alerts"][0]["endsAt"], "0001-01-01T00:00:00Z");
		assert_eq!(document["alerts"][1]["startsAt"], "0001-01-01T00:00:00Z");
		assert_eq!(document["alerts"][1]["endsAt"], "0001-01-01T00:00:00Z");
	}

	#[test]
	fn null_fields_read_as_empty() {
		let notification = Notification::from_webhook_body(
			br#"{
				"version": "4",
				"status": null,
				"receiver": null,
				"groupKey": null,
				"externalURL": null,
				"groupLabels": null,
				"commonLabels": {"alertname": "NamespaceLowHealthLevel", "severity": null},
				"commonAnnotations": null,
				"alerts": [{"labels": null, "annotations": null, "startsAt": null, "generatorURL": null}]
			}"#,
		)
		.unwrap();

		assert_eq!(notification.alert_name(), Some("NamespaceLowHealthLevel"));
		assert_eq!(notification.common_labels["severity"], "");
		assert!(notification.common_annotations.is_empty());
		assert!(notification.group_labels.is_empty());
		assert_eq!(notification.status, "");
		assert_eq!(notification.external_url, "");
		assert!(notification.alerts[0].labels.is_empty());
		assert!(notification.alerts[0].starts_at.is_none());

		let notification =
			Notification::from_webhook_body(br#"{"version":"4","alerts":null}"#).unwrap();
		assert!(notification.alerts.is_empty());
	}

	#[test]
	fn null_version_is_unsupported() {
		assert!(matches!(
			Notification::from_webhook_body(br#"{"version":null}"#),
			Err(PayloadError::UnsupportedVersion(ref v)) if v.is_empty()
		));
	}

	#[test]
	fn rejects_empty_body() {
		assert!(matches!(Notification::from_webhook_body(b""), Err(PayloadError::Empty)));
	}

	#[test]
	fn rejects_malformed_json() {
		assert!(matches!(
			Notification::from_webhook_body(b"{\"version\": "),
			Err(PayloadError::Malformed(_))
		));
		assert!(matches!(
			Notification::from_webhook_body(br#"{"version":"4","alerts":"nope"}"#),
			Err(PayloadError::Malformed(_))
		));
	}

	#[test]
	fn rejects_other_versions() {
		let err = Notification::from_webhook_body(br#"{"version":"3"}"#).unwrap_err();

		assert!(matches!(err, PayloadError::UnsupportedVersion(ref v) if v == "3"));
		assert_eq!(
			err.to_string(),
			r#"do not understand webhook version "3", only version "4" is supported"#
		);
	}

	#[test]
	fn inbound_timestamp_is_ignored() {
		let notification =
			Notification::from_webhook_body(br#"{"version":"4","@timestamp":"forged"}"#).unwrap();

		assert!(notification.timestamp().is_none());
		let document = serde_json::to_value(&notification).unwrap();
		assert!(document.get("@timestamp").is_none());
	}

	#[test]
	fn stamped_notification_serializes_timestamp() {
		let mut notification = Notification::from_webhook_body(FIRING.as_bytes()).unwrap();
		let at = DateTime::parse_from_rfc3339("2021-03-04T10:15:30.123Z")
			.unwrap()
			.with_timezone(&Utc);

		notification.stamp(at);

		let document = serde_json::to_value(&notification).unwrap();
		assert_eq!(document["@timestamp"], "2021-03-04T10:15:30Z");
		assert_eq!(document["externalURL"], "http://alertmanager:9093");
		assert_eq!(document["alerts"][0]["generatorURL"], "http://prometheus:9090/graph");
		assert_eq!(document["commonLabels"]["namespace"], "ns1");
	}
}
