// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! RBAC configuration.
//!
//! Layered from multiple sources (defaults, TOML file, environment) in the
//! same way as the rest of the server configuration. Environment variables use
//! the `LOOM_SERVER_RBAC_*` prefix.
//!
//! ```toml
//! policy_path = "/etc/loom/policy.toml"
//! eval_timeout_ms = 250
//! log_decisions = false
//! ```

pub mod error;
pub mod sources;

pub use error::ConfigError;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Partially specified configuration from a single source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RbacConfigLayer {
	pub policy_path: Option<PathBuf>,
	pub eval_timeout_ms: Option<u64>,
	pub log_decisions: Option<bool>,
}

impl RbacConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.policy_path.is_some() {
			self.policy_path = other.policy_path;
		}
		if other.eval_timeout_ms.is_some() {
			self.eval_timeout_ms = other.eval_timeout_ms;
		}
		if other.log_decisions.is_some() {
			self.log_decisions = other.log_decisions;
		}
	}

	pub fn finalize(self) -> Result<RbacConfig, ConfigError> {
		if self.eval_timeout_ms == Some(0) {
			return Err(ConfigError::Validation(
				"eval_timeout_ms must be greater than zero; omit it to disable the deadline"
					.to_string(),
			));
		}

		Ok(RbacConfig {
			policy_path: self.policy_path,
			eval_timeout: self.eval_timeout_ms.map(Duration::from_millis),
			log_decisions: self.log_decisions.unwrap_or(false),
		})
	}
}

/// Fully resolved RBAC configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RbacConfig {
	/// Policy document to compile. The built-in policy is used when unset.
	pub policy_path: Option<PathBuf>,
	/// Deadline for each engine evaluation.
	pub eval_timeout: Option<Duration>,
	/// Log every decision at info level.
	pub log_decisions: bool,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`LOOM_SERVER_RBAC_*`)
/// 2. Config file (`/etc/loom/rbac.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<RbacConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource::default()),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(config_path: impl Into<PathBuf>) -> Result<RbacConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource::default()),
	])
}

/// Merge the given sources in precedence order and resolve the result.
pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<RbacConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = RbacConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	let config = merged.finalize()?;
	info!(
		policy_path = ?config.policy_path,
		eval_timeout_ms = config.eval_timeout.map(|t| t.as_millis() as u64),
		log_decisions = config.log_decisions,
		"RBAC configuration loaded"
	);
	Ok(config)
}
