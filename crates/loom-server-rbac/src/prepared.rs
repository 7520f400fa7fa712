// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Prepared decision procedures.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::adapter::{conclude, guard, EvalOptions};
use crate::authorizer::PreparedAuthorized;
use crate::engine::PreparedQuery;
use crate::error::{EngineError, Forbidden, RbacError};
use crate::types::Object;

/// A policy partially evaluated for one subject, role set, action and object type.
///
/// Immutable once built, so it can be shared between tasks. It is meant to
/// live for one batch; nothing caches it across requests.
#[derive(Clone)]
pub struct PreparedAuthorizer {
	query: Arc<dyn PreparedQuery>,
	object_type: String,
	/// The partial input document, kept for audit context on denial.
	input: Value,
	options: EvalOptions,
}

impl std::fmt::Debug for PreparedAuthorizer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PreparedAuthorizer")
			.field("object_type", &self.object_type)
			.finish_non_exhaustive()
	}
}

impl PreparedAuthorizer {
	pub(crate) fn new(
		query: Arc<dyn PreparedQuery>,
		object_type: String,
		input: Value,
		options: EvalOptions,
	) -> Self {
		Self {
			query,
			object_type,
			input,
			options,
		}
	}

	/// The object type this procedure was prepared for.
	pub fn object_type(&self) -> &str {
		&self.object_type
	}

	/// Decide a single object of the prepared type.
	pub async fn authorize(
		&self,
		cancel: &CancellationToken,
		object: &Object,
	) -> Result<(), RbacError> {
		let document = serde_json::to_value(object).map_err(|e| {
			warn!(error = %e, "failed to encode object document");
			let fault = Forbidden::fault(EngineError::MalformedInput(e), self.input.clone());
			RbacError::from(fault)
		})?;

		let result = guard(cancel, self.options.eval_timeout, self.query.eval(&document)).await?;

		let mut input = self.input.clone();
		input["object"] = document;
		conclude(self.options, input, result)
	}
}

#[async_trait]
impl PreparedAuthorized for PreparedAuthorizer {
	async fn authorize(
		&self,
		cancel: &CancellationToken,
		object: &Object,
	) -> Result<(), RbacError> {
		PreparedAuthorizer::authorize(self, cancel, object).await
	}
}
