// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for RBAC authorization.
//!
//! [`Forbidden`] is the only error an end caller should ever render. Its
//! `Display` is a fixed string; the engine fault, input document and trace it
//! carries are reachable only through accessors for internal logging and audit.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::engine::Trace;

/// Errors returned by the authorization facade and the batch filter.
#[derive(Debug, Error)]
pub enum RbacError {
	#[error("unknown role: {0}")]
	UnknownRole(String),

	#[error("policy compilation failed: {0}")]
	PolicyCompilation(#[from] PolicyError),

	#[error(transparent)]
	Forbidden(Box<Forbidden>),

	#[error("object types must be uniform across the set ({expected}), found {found}")]
	HeterogeneousBatch { expected: String, found: String },

	#[error("authorization cancelled")]
	Cancelled,

	#[error("authorization deadline of {0:?} exceeded")]
	DeadlineExceeded(Duration),
}

impl RbacError {
	/// Returns the denial, if this error is one.
	pub fn as_forbidden(&self) -> Option<&Forbidden> {
		match self {
			RbacError::Forbidden(forbidden) => Some(forbidden),
			_ => None,
		}
	}

	pub fn is_forbidden(&self) -> bool {
		matches!(self, RbacError::Forbidden(_))
	}

	/// Returns true for errors caused by the caller's cancellation signal or deadline.
	pub fn is_cancellation(&self) -> bool {
		matches!(self, RbacError::Cancelled | RbacError::DeadlineExceeded(_))
	}
}

impl From<Forbidden> for RbacError {
	fn from(forbidden: Forbidden) -> Self {
		RbacError::Forbidden(Box::new(forbidden))
	}
}

/// Why a request was denied. Internal only.
#[derive(Debug)]
pub enum ForbiddenReason {
	/// The policy evaluated and did not allow the request.
	PolicyDenied,
	/// The engine itself failed; treated as a denial.
	EngineFault(EngineError),
}

/// The request was denied.
#[derive(Debug, Error)]
#[error("forbidden")]
pub struct Forbidden {
	reason: ForbiddenReason,
	input: Value,
	trace: Trace,
}

impl Forbidden {
	pub(crate) fn denied(input: Value, trace: Trace) -> Self {
		Self {
			reason: ForbiddenReason::PolicyDenied,
			input,
			trace,
		}
	}

	pub(crate) fn fault(error: EngineError, input: Value) -> Self {
		let (error, trace) = error.into_parts();
		Self {
			reason: ForbiddenReason::EngineFault(error),
			input,
			trace,
		}
	}

	/// The internal reason for the denial. Never show this to the denied party.
	pub fn internal(&self) -> &ForbiddenReason {
		&self.reason
	}

	/// The input document that was evaluated, for auditing.
	pub fn input(&self) -> &Value {
		&self.input
	}

	/// Diagnostic trace from the engine, empty when the engine faulted early.
	pub fn trace(&self) -> &Trace {
		&self.trace
	}

	pub fn is_engine_fault(&self) -> bool {
		matches!(self.reason, ForbiddenReason::EngineFault(_))
	}
}

/// Faults raised by a decision engine, as opposed to a policy decision.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("malformed input document: {0}")]
	MalformedInput(#[from] serde_json::Error),

	#[error("prepared for object type '{expected}', got '{found}'")]
	TypeMismatch { expected: String, found: String },

	#[error("engine failure: {0}")]
	Internal(String),

	/// A fault raised part-way through evaluation, with the trace gathered so far.
	#[error("{error}")]
	Traced {
		error: Box<EngineError>,
		trace: Trace,
	},
}

impl EngineError {
	/// Attach the partial trace collected before the fault.
	pub fn with_trace(self, trace: Trace) -> Self {
		let error = match self {
			EngineError::Traced { error, .. } => error,
			other => Box::new(other),
		};
		EngineError::Traced { error, trace }
	}

	/// Splits off any attached trace.
	pub(crate) fn into_parts(self) -> (EngineError, Trace) {
		match self {
			EngineError::Traced { error, trace } => (*error, trace),
			other => (other, Trace::default()),
		}
	}
}

/// Errors loading or compiling a policy document.
#[derive(Debug, Error)]
pub enum PolicyError {
	#[error("failed to read policy file {path}: {source}")]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse policy: {0}")]
	Syntax(#[from] toml::de::Error),

	#[error("invalid policy: {0}")]
	Invalid(String),
}
