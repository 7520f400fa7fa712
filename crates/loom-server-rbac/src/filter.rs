// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Batch filtering of objects a subject may act on.

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::authorizer::{Authorizer, PreparedAuthorized};
use crate::error::RbacError;
use crate::types::{Action, Objecter};

/// Removes every object the subject may not perform `action` on.
///
/// All objects must share one object type: the policy is partially evaluated
/// once for that type and each object is decided against the prepared
/// procedure. Kept objects stay in their original order.
///
/// An empty input is returned as is without touching the authorizer. A denied
/// object (including one the engine faulted on) is dropped; any other error
/// aborts the whole call with no partial result.
#[instrument(
	level = "debug",
	skip(cancel, auth, subject_roles, objects),
	fields(count = objects.len())
)]
pub async fn filter<A, O>(
	cancel: &CancellationToken,
	auth: &A,
	subject_id: &str,
	subject_roles: &[String],
	action: Action,
	objects: Vec<O>,
) -> Result<Vec<O>, RbacError>
where
	A: Authorizer + ?Sized,
	O: Objecter,
{
	if objects.is_empty() {
		return Ok(objects);
	}
	let object_type = objects[0].rbac_object().object_type;

	let prepared = auth
		.prepare_by_role_name(cancel, subject_id, subject_roles, action, &object_type)
		.await?;

	let total = objects.len();
	let mut filtered = Vec::with_capacity(total);
	for object in objects {
		let rbac_object = object.rbac_object();
		if rbac_object.object_type != object_type {
			return Err(RbacError::HeterogeneousBatch {
				expected: object_type,
				found: rbac_object.object_type,
			});
		}

		match prepared.authorize(cancel, &rbac_object).await {
			Ok(()) => filtered.push(object),
			Err(RbacError::Forbidden(_)) => {}
			Err(e) => return Err(e),
		}
	}

	debug!(
		object_type = %object_type,
		kept = filtered.len(),
		dropped = total - filtered.len(),
		"filtered objects"
	);
	Ok(filtered)
}
