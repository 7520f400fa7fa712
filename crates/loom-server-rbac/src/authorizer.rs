// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization facade.
//!
//! [`RbacAuthorizer`] is the entry point the rest of the server uses:
//!
//! ```text
//! by_role_name ──► RoleRegistry ──► authorize
//!     └──► DecisionEngine::evaluate ──► Ok | Forbidden
//! prepare_by_role_name ──► RoleRegistry ──► prepare
//!     └──► DecisionEngine::prepare ──► PreparedAuthorizer
//! ```
//!
//! Role names are resolved before the engine is touched, so an unknown role
//! never costs an evaluation.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::adapter::DecisionEngine;
use crate::error::RbacError;
use crate::input::{AuthzRequest, PartialRequest};
use crate::prepared::PreparedAuthorizer;
use crate::roles::{BuiltinRoles, RoleRegistry};
use crate::types::{Action, Object, Role};

/// Role-name based authorization, as consumed by [`filter`](crate::filter::filter).
#[async_trait]
pub trait Authorizer: Send + Sync {
	type Prepared: PreparedAuthorized;

	async fn by_role_name(
		&self,
		cancel: &CancellationToken,
		subject_id: &str,
		role_names: &[String],
		action: Action,
		object: &Object,
	) -> Result<(), RbacError>;

	async fn prepare_by_role_name(
		&self,
		cancel: &CancellationToken,
		subject_id: &str,
		role_names: &[String],
		action: Action,
		object_type: &str,
	) -> Result<Self::Prepared, RbacError>;
}

/// A decision procedure prepared for one object type.
#[async_trait]
pub trait PreparedAuthorized: Send + Sync {
	async fn authorize(&self, cancel: &CancellationToken, object: &Object) -> Result<(), RbacError>;
}

/// Authorizer backed by a [`DecisionEngine`] and a [`RoleRegistry`].
#[derive(Clone)]
pub struct RbacAuthorizer {
	engine: DecisionEngine,
	roles: Arc<dyn RoleRegistry>,
}

impl std::fmt::Debug for RbacAuthorizer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RbacAuthorizer")
			.field("engine", &self.engine)
			.finish_non_exhaustive()
	}
}

impl RbacAuthorizer {
	pub fn new(engine: DecisionEngine, roles: Arc<dyn RoleRegistry>) -> Self {
		Self { engine, roles }
	}

	/// An authorizer using the built-in roles.
	pub fn with_builtin_roles(engine: DecisionEngine) -> Self {
		Self::new(engine, Arc::new(BuiltinRoles::new()))
	}

	/// Authorize with explicit roles.
	///
	/// Useful when the caller already holds role definitions, e.g. custom roles
	/// in tests.
	#[instrument(
		level = "debug",
		skip(self, cancel, roles, object),
		fields(object_type = %object.object_type, object_id = ?object.id)
	)]
	pub async fn authorize(
		&self,
		cancel: &CancellationToken,
		subject_id: &str,
		roles: &[Role],
		action: Action,
		object: &Object,
	) -> Result<(), RbacError> {
		let request = AuthzRequest::new(subject_id, roles, action, object);
		self.engine.evaluate(cancel, &request).await
	}

	/// Partially evaluate the policy for every object of `object_type`.
	///
	/// Much cheaper than repeated [`authorize`](Self::authorize) calls when
	/// checking a batch of objects of the same type.
	#[instrument(level = "debug", skip(self, cancel, roles))]
	pub async fn prepare(
		&self,
		cancel: &CancellationToken,
		subject_id: &str,
		roles: &[Role],
		action: Action,
		object_type: &str,
	) -> Result<PreparedAuthorizer, RbacError> {
		let request = PartialRequest::new(subject_id, roles, action, object_type);
		self.engine.prepare(cancel, &request).await
	}
}

#[async_trait]
impl Authorizer for RbacAuthorizer {
	type Prepared = PreparedAuthorizer;

	async fn by_role_name(
		&self,
		cancel: &CancellationToken,
		subject_id: &str,
		role_names: &[String],
		action: Action,
		object: &Object,
	) -> Result<(), RbacError> {
		let roles = self.roles.roles_by_names(role_names)?;
		self.authorize(cancel, subject_id, &roles, action, object).await
	}

	async fn prepare_by_role_name(
		&self,
		cancel: &CancellationToken,
		subject_id: &str,
		role_names: &[String],
		action: Action,
		object_type: &str,
	) -> Result<PreparedAuthorizer, RbacError> {
		let roles = self.roles.roles_by_names(role_names)?;
		self.prepare(cancel, subject_id, &roles, action, object_type).await
	}
}
