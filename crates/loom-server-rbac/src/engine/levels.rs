// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Built-in level-based decision engine.
//!
//! Each role carries permissions at three levels. For a request the engine
//! tallies every matching permission per level:
//!
//! 1. **Any matching negated permission**: the level votes deny
//! 2. **Any matching permission**: the level votes allow
//! 3. **Nothing matches**: the level abstains
//!
//! Levels are consulted in policy order and the first non-abstaining vote is
//! the decision. If every level abstains the request is denied.
//!
//! The org level only applies when the object is owned by an organization,
//! and only with the permissions roles hold for that organization. The user
//! level only applies when the subject owns the object.
//!
//! Partial evaluation computes every tally up front, since none of them depend
//! on the object's identity. Deciding an object is then a map lookup.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{CompiledQuery, Evaluation, PreparedQuery, Trace, Vote};
use crate::error::EngineError;
use crate::policy::Level;
use crate::types::{Action, Object, Permission, Role};

#[derive(Debug, Deserialize)]
struct SubjectDocument {
	id: String,
	#[serde(default)]
	roles: Vec<Role>,
}

#[derive(Debug, Deserialize)]
struct InputDocument {
	subject: SubjectDocument,
	action: Action,
	object: Object,
}

#[derive(Debug, Deserialize)]
struct ObjectTypeDocument {
	#[serde(rename = "type")]
	object_type: String,
}

#[derive(Debug, Deserialize)]
struct PartialDocument {
	subject: SubjectDocument,
	action: Action,
	object: ObjectTypeDocument,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Tally {
	vote: Vote,
	matched: usize,
}

impl Tally {
	const ABSTAIN: Tally = Tally {
		vote: Vote::Abstain,
		matched: 0,
	};

	fn of<'a>(
		permissions: impl Iterator<Item = &'a Permission>,
		action: Action,
		object_type: &str,
	) -> Self {
		let mut matched = 0;
		let mut negated = false;
		for permission in permissions.filter(|p| p.matches(action, object_type)) {
			matched += 1;
			negated |= permission.negate;
		}

		let vote = match (matched, negated) {
			(_, true) => Vote::Deny,
			(0, false) => Vote::Abstain,
			_ => Vote::Allow,
		};
		Tally { vote, matched }
	}
}

/// Everything known about a request before the object's fields are seen.
#[derive(Debug)]
struct Grants {
	subject_id: String,
	site: Tally,
	/// One tally per organization any role is scoped to. Presence of a key is
	/// what makes the subject a member of that organization.
	org: BTreeMap<String, Tally>,
	user: Tally,
}

impl Grants {
	fn new(subject: SubjectDocument, action: Action, object_type: &str) -> Self {
		let roles = &subject.roles;

		let site = Tally::of(roles.iter().flat_map(|r| r.site.iter()), action, object_type);
		let user = Tally::of(roles.iter().flat_map(|r| r.user.iter()), action, object_type);

		let mut by_org: BTreeMap<&str, Vec<&Permission>> = BTreeMap::new();
		for role in roles {
			for (org_id, permissions) in &role.org {
				by_org.entry(org_id.as_str()).or_default().extend(permissions.iter());
			}
		}
		let org = by_org
			.into_iter()
			.map(|(org_id, permissions)| {
				(
					org_id.to_string(),
					Tally::of(permissions.into_iter(), action, object_type),
				)
			})
			.collect();

		Self {
			subject_id: subject.id,
			site,
			org,
			user,
		}
	}

	fn is_org_member(&self, org_id: &str) -> bool {
		self.org.contains_key(org_id)
	}

	fn tally(&self, level: Level, object: &Object, require_org_membership: bool) -> Tally {
		match level {
			Level::Site => self.site,
			Level::Org => object
				.org_owner
				.as_deref()
				.and_then(|org_id| self.org.get(org_id).copied())
				.unwrap_or(Tally::ABSTAIN),
			Level::User => {
				let is_owner = object.owner.as_deref() == Some(self.subject_id.as_str());
				let membership_ok = !require_org_membership
					|| object
						.org_owner
						.as_deref()
						.map_or(true, |org_id| self.is_org_member(org_id));
				if is_owner && membership_ok {
					self.user
				} else {
					Tally::ABSTAIN
				}
			}
		}
	}

	fn decide(
		&self,
		levels: &[Level],
		object: &Object,
		require_org_membership: bool,
	) -> Evaluation {
		let mut trace = Trace::default();
		for level in levels {
			let tally = self.tally(*level, object, require_org_membership);
			trace.push(level.to_string(), tally.vote, tally.matched);
			match tally.vote {
				Vote::Allow => {
					return Evaluation {
						allowed: true,
						trace,
					}
				}
				Vote::Deny => {
					return Evaluation {
						allowed: false,
						trace,
					}
				}
				Vote::Abstain => {}
			}
		}

		Evaluation {
			allowed: false,
			trace,
		}
	}
}

/// Compiled form of a [`PolicyDocument`](crate::policy::PolicyDocument).
#[derive(Debug, Clone)]
pub struct LevelQuery {
	levels: Arc<[Level]>,
	require_org_membership: bool,
}

impl LevelQuery {
	pub(crate) fn new(levels: Vec<Level>, require_org_membership: bool) -> Self {
		Self {
			levels: levels.into(),
			require_org_membership,
		}
	}

	pub fn levels(&self) -> &[Level] {
		&self.levels
	}
}

#[async_trait]
impl CompiledQuery for LevelQuery {
	async fn eval(&self, input: &Value) -> Result<Evaluation, EngineError> {
		let input = InputDocument::deserialize(input)?;
		let grants = Grants::new(input.subject, input.action, &input.object.object_type);
		Ok(grants.decide(&self.levels, &input.object, self.require_org_membership))
	}

	async fn partial_eval(&self, input: &Value) -> Result<Arc<dyn PreparedQuery>, EngineError> {
		let input = PartialDocument::deserialize(input)?;
		let object_type = input.object.object_type;
		let grants = Grants::new(input.subject, input.action, &object_type);
		Ok(Arc::new(PreparedLevels {
			grants,
			object_type,
			levels: Arc::clone(&self.levels),
			require_org_membership: self.require_org_membership,
		}))
	}
}

/// A [`LevelQuery`] with every tally resolved for one subject, action and type.
#[derive(Debug)]
struct PreparedLevels {
	grants: Grants,
	object_type: String,
	levels: Arc<[Level]>,
	require_org_membership: bool,
}

#[async_trait]
impl PreparedQuery for PreparedLevels {
	async fn eval(&self, object: &Value) -> Result<Evaluation, EngineError> {
		let object = Object::deserialize(object)?;
		if object.object_type != self.object_type {
			return Err(EngineError::TypeMismatch {
				expected: self.object_type.clone(),
				found: object.object_type,
			});
		}
		Ok(self
			.grants
			.decide(&self.levels, &object, self.require_org_membership))
	}
}
