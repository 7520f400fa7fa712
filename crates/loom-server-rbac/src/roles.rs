// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role registry: resolves role names into [`Role`] definitions.
//!
//! Resolution is pure. The same names always produce the same roles, and a
//! single unknown name fails the whole lookup rather than returning a partial
//! result.
//!
//! # Built-in roles
//!
//! | Name | Grants |
//! |------|--------|
//! | `admin` | every action on every resource |
//! | `member` | every action on resources the subject owns |
//! | `auditor` | read on every resource |
//! | `org-admin:<org_id>` | every action on resources owned by the organization |
//! | `org-member:<org_id>` | membership, plus read on the organization itself |

use std::collections::HashMap;

use crate::error::RbacError;
use crate::types::{resources, Action, Permission, Role};

pub const ADMIN: &str = "admin";
pub const MEMBER: &str = "member";
pub const AUDITOR: &str = "auditor";
pub const ORG_ADMIN_PREFIX: &str = "org-admin";
pub const ORG_MEMBER_PREFIX: &str = "org-member";

/// Lookup contract for role definitions.
pub trait RoleRegistry: Send + Sync {
	fn roles_by_names(&self, names: &[String]) -> Result<Vec<Role>, RbacError>;
}

/// Formats the scoped name of an organization admin role.
pub fn org_admin(org_id: &str) -> String {
	format!("{ORG_ADMIN_PREFIX}:{org_id}")
}

/// Formats the scoped name of an organization member role.
pub fn org_member(org_id: &str) -> String {
	format!("{ORG_MEMBER_PREFIX}:{org_id}")
}

/// In-memory registry of the built-in roles plus any custom ones.
#[derive(Debug, Clone, Default)]
pub struct BuiltinRoles {
	custom: HashMap<String, Role>,
}

impl BuiltinRoles {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder: register a custom role. Custom roles shadow built-in names.
	pub fn with_role(mut self, role: Role) -> Self {
		self.custom.insert(role.name.clone(), role);
		self
	}

	/// Resolves a single role name.
	pub fn role_by_name(&self, name: &str) -> Option<Role> {
		if let Some(role) = self.custom.get(name) {
			return Some(role.clone());
		}

		let everything = || Permission::allow(resources::WILDCARD, Action::Wildcard);

		match name.split_once(':') {
			None => match name {
				ADMIN => Some(Role::new(ADMIN).with_site(everything())),
				MEMBER => Some(Role::new(MEMBER).with_user(everything())),
				AUDITOR => {
					let read_all = Permission::allow(resources::WILDCARD, Action::Read);
					Some(Role::new(AUDITOR).with_site(read_all))
				}
				_ => None,
			},
			Some((_, "")) => None,
			Some((ORG_ADMIN_PREFIX, org_id)) => {
				Some(Role::new(name).with_org(org_id, everything()))
			}
			Some((ORG_MEMBER_PREFIX, org_id)) => {
				let read_org = Permission::allow(resources::ORGANIZATION, Action::Read);
				Some(Role::new(name).with_org(org_id, read_org))
			}
			Some(_) => None,
		}
	}
}

impl RoleRegistry for BuiltinRoles {
	fn roles_by_names(&self, names: &[String]) -> Result<Vec<Role>, RbacError> {
		names
			.iter()
			.map(|name| {
				self
					.role_by_name(name)
					.ok_or_else(|| RbacError::UnknownRole(name.clone()))
			})
			.collect()
	}
}
