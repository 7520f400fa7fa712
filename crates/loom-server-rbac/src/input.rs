// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Typed request documents.
//!
//! The facade builds these per call. They are converted to the engine's JSON
//! input shape only inside [`DecisionEngine`](crate::adapter::DecisionEngine).

use serde::Serialize;

use crate::types::{Action, Object, Role};

/// The subject of a single evaluation. Never outlives the call that built it.
#[derive(Debug, Clone, Serialize)]
pub struct Subject<'a> {
	pub id: &'a str,
	pub roles: &'a [Role],
}

/// Input for a full evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct AuthzRequest<'a> {
	pub subject: Subject<'a>,
	pub action: Action,
	pub object: &'a Object,
}

/// The part of an object known before partial evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectType<'a> {
	#[serde(rename = "type")]
	pub object_type: &'a str,
}

/// Input for a partial evaluation: the object is reduced to its type.
#[derive(Debug, Clone, Serialize)]
pub struct PartialRequest<'a> {
	pub subject: Subject<'a>,
	pub action: Action,
	pub object: ObjectType<'a>,
}

impl<'a> AuthzRequest<'a> {
	pub fn new(subject_id: &'a str, roles: &'a [Role], action: Action, object: &'a Object) -> Self {
		Self {
			subject: Subject {
				id: subject_id,
				roles,
			},
			action,
			object,
		}
	}
}

impl<'a> PartialRequest<'a> {
	pub fn new(
		subject_id: &'a str,
		roles: &'a [Role],
		action: Action,
		object_type: &'a str,
	) -> Self {
		Self {
			subject: Subject {
				id: subject_id,
				roles,
			},
			action,
			object: ObjectType { object_type },
		}
	}
}
