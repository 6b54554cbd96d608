use anyhow::{Context, Result};
use clap::{Arg, Command};
use config::Config;
use serde::Deserialize;

use crate::{
	document_store::ElasticsearchSettings, log::LogSettings, remediation::RemediationSettings,
	telemetry_endpoint::TelemetryEndpointSettings, webhook_receiver::WebhookReceiverSettings,
};

/// prefix of environment variables overriding the config file
const ENV_PREFIX: &str = "ALERTMANAGER2ES";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
	#[serde(default)]
	pub log: LogSettings,
	#[serde(default)]
	pub webhook_receiver: WebhookReceiverSettings,
	#[serde(default)]
	pub telemetry_endpoint: TelemetryEndpointSettings,
	pub elasticsearch: ElasticsearchSettings,
	#[serde(default)]
	pub remediation: RemediationSettings,
}

impl Settings {
	/// load settings from the config file given on the command line
	pub fn load() -> Result<Self> {
		let opts = Command::new(clap::crate_name!())
			.version(clap::crate_version!())
			.about(clap::crate_description!())
			.author(clap::crate_authors!())
			.arg(
				Arg::new("config")
					.help("path of config file")
					.takes_value(true)
					.short('c')
					.long("config")
					.default_value("./config.yaml"),
			)
			.arg(
				Arg::new("level")
					.help("log level")
					.possible_values(["error", "warn", "info", "debug", "trace"])
					.ignore_case(true)
					.takes_value(true)
					.long("log"),
			)
			.get_matches();

		let config_path = opts.value_of("config").context("no config path given")?;

		let mut settings = Self::from_source(config::File::with_name(config_path))
			.context(format!("can't load config {config_path}"))?;

		if let Some(level) = opts.value_of("level") {
			settings.log.level = level.to_string();
		}

		Ok(settings)
	}

	/// Reads settings from `source`, environment variables prefixed with
	/// `ALERTMANAGER2ES` take precedence.
	fn from_source<S>(source: S) -> Result<Self>
	where
		S: config::Source + Send + Sync + 'static,
	{
		let conf = Config::builder()
			.add_source(source)
			.add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
			.build()
			.context("can't read config")?;

		conf.try_deserialize().context("invalid config")
	}
}
