// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Policy documents for the built-in decision engine.
//!
//! A policy names the permission levels that are consulted and their order of
//! precedence. The first level that reaches a decision wins:
//!
//! ```toml
//! name = "authz"
//! levels = ["site", "org", "user"]
//! require_org_membership = true
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::levels::LevelQuery;
use crate::error::PolicyError;

/// A permission level consulted by the built-in engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
	/// Permissions that apply to every object.
	Site,
	/// Permissions scoped to the organization that owns the object.
	Org,
	/// Permissions on objects owned by the subject.
	User,
}

impl fmt::Display for Level {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Level::Site => write!(f, "site"),
			Level::Org => write!(f, "org"),
			Level::User => write!(f, "user"),
		}
	}
}

fn default_name() -> String {
	"authz".to_string()
}

fn default_levels() -> Vec<Level> {
	vec![Level::Site, Level::Org, Level::User]
}

fn default_require_org_membership() -> bool {
	true
}

/// Declarative policy loaded at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
	#[serde(default = "default_name")]
	pub name: String,
	#[serde(default = "default_levels")]
	pub levels: Vec<Level>,
	/// User-level grants on an org-owned object require membership in that org.
	#[serde(default = "default_require_org_membership")]
	pub require_org_membership: bool,
}

impl Default for PolicyDocument {
	fn default() -> Self {
		Self {
			name: default_name(),
			levels: default_levels(),
			require_org_membership: default_require_org_membership(),
		}
	}
}

impl PolicyDocument {
	/// Parse a policy from TOML source.
	pub fn from_toml(source: &str) -> Result<Self, PolicyError> {
		Ok(toml::from_str(source)?)
	}

	/// Read and parse a policy file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
		let path = path.as_ref();
		debug!(path = %path.display(), "loading policy file");
		let content = std::fs::read_to_string(path).map_err(|e| PolicyError::Read {
			path: path.to_path_buf(),
			source: e,
		})?;
		Self::from_toml(&content)
	}

	/// Validate the document and produce an immutable query.
	pub fn compile(&self) -> Result<LevelQuery, PolicyError> {
		if self.name.trim().is_empty() {
			return Err(PolicyError::Invalid("policy name must not be empty".to_string()));
		}

		if self.levels.is_empty() {
			return Err(PolicyError::Invalid(
				"policy must consult at least one level".to_string(),
			));
		}

		let mut seen = HashSet::new();
		for level in &self.levels {
			if !seen.insert(*level) {
				return Err(PolicyError::Invalid(format!(
					"level '{level}' is listed more than once"
				)));
			}
		}

		debug!(
			policy = %self.name,
			levels = ?self.levels,
			require_org_membership = self.require_org_membership,
			"compiled policy"
		);

		Ok(LevelQuery::new(
			self.levels.clone(),
			self.require_org_membership,
		))
	}
}
