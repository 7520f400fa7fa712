// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Decision engine contract.
//!
//! A decision engine evaluates a JSON input document of the shape
//!
//! ```json
//! {
//!   "subject": { "id": "...", "roles": [...] },
//!   "action": "read",
//!   "object": { "type": "...", ... }
//! }
//! ```
//!
//! and answers allow or deny. An engine error is a fault, never a decision.
//! A fault may carry the trace gathered before it via
//! [`EngineError::with_trace`].
//!
//! Engines also support partial evaluation: everything except the object's
//! non-type fields is fixed up front, and the returned [`PreparedQuery`]
//! accepts just the object document.
//!
//! [`levels`] is the built-in engine compiled from a
//! [`PolicyDocument`](crate::policy::PolicyDocument).

pub mod levels;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;

/// Outcome of a single rule or level during evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vote {
	Allow,
	Deny,
	Abstain,
}

/// One step of a diagnostic trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
	pub rule: String,
	pub vote: Vote,
	pub matched: usize,
}

/// Diagnostic trace of an evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trace(pub Vec<TraceEntry>);

impl Trace {
	pub fn push(&mut self, rule: impl Into<String>, vote: Vote, matched: usize) {
		self.0.push(TraceEntry {
			rule: rule.into(),
			vote,
			matched,
		});
	}

	pub fn entries(&self) -> &[TraceEntry] {
		&self.0
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

/// Result of evaluating a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
	pub allowed: bool,
	pub trace: Trace,
}

/// A policy query compiled once and shared for the lifetime of the process.
#[async_trait]
pub trait CompiledQuery: Send + Sync {
	/// Evaluate a complete input document.
	async fn eval(&self, input: &Value) -> Result<Evaluation, EngineError>;

	/// Partially evaluate an input document whose object carries only its type.
	async fn partial_eval(&self, input: &Value) -> Result<Arc<dyn PreparedQuery>, EngineError>;
}

/// A partially evaluated query awaiting the object document.
#[async_trait]
pub trait PreparedQuery: Send + Sync {
	async fn eval(&self, object: &Value) -> Result<Evaluation, EngineError>;
}
