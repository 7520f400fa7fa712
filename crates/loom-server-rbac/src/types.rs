// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Type definitions for RBAC evaluation.
//!
//! - [`Action`]: The operation being performed (create, read, update, delete)
//! - [`Permission`]: A single allow or deny grant on a resource type
//! - [`Role`]: A named bundle of permissions at site, organization and user level
//! - [`Object`]: The target of an action, tagged with its resource type
//! - [`Objecter`]: Anything that can describe itself as an [`Object`]
//!
//! All types serialize into the input document handed to the decision engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Resource type tags understood by the built-in roles.
pub mod resources {
	/// Matches every resource type or every action inside a permission.
	pub const WILDCARD: &str = "*";

	pub const WORKSPACE: &str = "workspace";
	pub const TEMPLATE: &str = "template";
	pub const FILE: &str = "file";
	pub const USER: &str = "user";
	pub const ORGANIZATION: &str = "organization";
	pub const ORGANIZATION_MEMBER: &str = "organization_member";
}

/// Actions that can be performed on objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
	Create,
	Read,
	Update,
	Delete,
	/// Only meaningful inside a [`Permission`], where it matches any action.
	#[serde(rename = "*")]
	Wildcard,
}

impl Action {
	/// Returns the concrete actions (everything except [`Action::Wildcard`]).
	pub fn all() -> &'static [Action] {
		&[Action::Create, Action::Read, Action::Update, Action::Delete]
	}

	/// Returns true if a permission granted for `self` covers `requested`.
	pub fn covers(self, requested: Action) -> bool {
		self == Action::Wildcard || self == requested
	}
}

impl fmt::Display for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Action::Create => write!(f, "create"),
			Action::Read => write!(f, "read"),
			Action::Update => write!(f, "update"),
			Action::Delete => write!(f, "delete"),
			Action::Wildcard => write!(f, "*"),
		}
	}
}

/// A single grant (or explicit denial when `negate` is set) of an action on a
/// resource type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
	#[serde(default)]
	pub negate: bool,
	pub resource_type: String,
	pub action: Action,
}

impl Permission {
	pub fn allow(resource_type: impl Into<String>, action: Action) -> Self {
		Self {
			negate: false,
			resource_type: resource_type.into(),
			action,
		}
	}

	pub fn deny(resource_type: impl Into<String>, action: Action) -> Self {
		Self {
			negate: true,
			resource_type: resource_type.into(),
			action,
		}
	}

	/// Returns true if this permission applies to the given action and type.
	pub fn matches(&self, action: Action, resource_type: &str) -> bool {
		self.action.covers(action)
			&& (self.resource_type == resources::WILDCARD || self.resource_type == resource_type)
	}
}

/// A named bundle of permissions.
///
/// Permissions are grouped by the level at which they apply: `site` applies
/// to every object, `org` applies to objects owned by the keyed organization,
/// and `user` applies to objects owned by the subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
	pub name: String,
	#[serde(default)]
	pub site: Vec<Permission>,
	#[serde(default)]
	pub org: BTreeMap<String, Vec<Permission>>,
	#[serde(default)]
	pub user: Vec<Permission>,
}

impl Role {
	/// Creates a role with no permissions.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Default::default()
		}
	}

	/// Builder: add a site-wide permission.
	pub fn with_site(mut self, permission: Permission) -> Self {
		self.site.push(permission);
		self
	}

	/// Builder: add a permission scoped to an organization.
	pub fn with_org(mut self, org_id: impl Into<String>, permission: Permission) -> Self {
		self.org.entry(org_id.into()).or_default().push(permission);
		self
	}

	/// Builder: add a permission on resources the subject owns.
	pub fn with_user(mut self, permission: Permission) -> Self {
		self.user.push(permission);
		self
	}
}

/// The target of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Object {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub owner: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub org_owner: Option<String>,
	#[serde(rename = "type")]
	pub object_type: String,
}

impl Object {
	/// Creates an object of the given type with no identifying fields.
	pub fn new(object_type: impl Into<String>) -> Self {
		Self {
			id: None,
			owner: None,
			org_owner: None,
			object_type: object_type.into(),
		}
	}

	/// Builder: set the object id.
	pub fn with_id(mut self, id: impl Into<String>) -> Self {
		self.id = Some(id.into());
		self
	}

	/// Builder: set the owning user.
	pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
		self.owner = Some(owner.into());
		self
	}

	/// Builder: set the owning organization.
	pub fn in_org(mut self, org_id: impl Into<String>) -> Self {
		self.org_owner = Some(org_id.into());
		self
	}
}

/// Capability of any entity that takes part in authorization.
pub trait Objecter {
	fn rbac_object(&self) -> Object;
}

impl Objecter for Object {
	fn rbac_object(&self) -> Object {
		self.clone()
	}
}

impl<T: Objecter + ?Sized> Objecter for &T {
	fn rbac_object(&self) -> Object {
		(**self).rbac_object()
	}
}
