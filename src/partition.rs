//! time partitioned index names
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Index name template. `%y`, `%m` and `%d` are replaced with the four digit
/// year, two digit month and two digit day of the indexing time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct PartitionTemplate(String);

impl PartitionTemplate {
	pub fn new(template: impl Into<String>) -> Self {
		Self(template.into())
	}

	/// Builds the partition name for `at`. Never cached, every indexing call
	/// computes its own name.
	pub fn build(&self, at: DateTime<Utc>) -> String {
		self.0
			.replace("%y", &at.format("%Y").to_string())
			.replace("%m", &at.format("%m").to_string())
			.replace("%d", &at.format("%d").to_string())
	}
}

impl Default for PartitionTemplate {
	fn default() -> Self {
		Self::new("alertmanager-%y.%m")
	}
}
