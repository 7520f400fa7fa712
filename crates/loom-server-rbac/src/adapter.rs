// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Decision engine adapter.
//!
//! [`DecisionEngine`] owns the one compiled query built at startup and is the
//! only place typed requests are turned into the engine's JSON input. It
//! enforces the fail-closed contract:
//!
//! - allow only when the engine evaluated and said allow
//! - a policy denial becomes [`Forbidden`] carrying the input and trace
//! - an engine fault becomes [`Forbidden`] carrying the fault, never an allow
//! - cancellation or a missed deadline aborts with a cancellation-kind error

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RbacConfig;
use crate::engine::{CompiledQuery, Evaluation};
use crate::error::{EngineError, Forbidden, RbacError};
use crate::input::{AuthzRequest, PartialRequest};
use crate::policy::PolicyDocument;
use crate::prepared::PreparedAuthorizer;

/// Evaluation settings shared by the adapter and every procedure it prepares.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct EvalOptions {
	pub eval_timeout: Option<Duration>,
	pub log_decisions: bool,
}

/// Wraps a compiled policy query.
#[derive(Clone)]
pub struct DecisionEngine {
	query: Arc<dyn CompiledQuery>,
	options: EvalOptions,
}

impl std::fmt::Debug for DecisionEngine {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DecisionEngine")
			.field("eval_timeout", &self.options.eval_timeout)
			.field("log_decisions", &self.options.log_decisions)
			.finish_non_exhaustive()
	}
}

impl DecisionEngine {
	/// Compile a policy document. Failure here must stop startup.
	pub fn new(policy: &PolicyDocument) -> Result<Self, RbacError> {
		let query = policy.compile()?;
		Ok(Self::from_query(Arc::new(query)))
	}

	/// Compile the policy stored at `path`.
	pub fn from_policy_file(path: impl AsRef<Path>) -> Result<Self, RbacError> {
		Self::new(&PolicyDocument::load(path)?)
	}

	/// Build an engine from resolved configuration.
	///
	/// Uses the built-in policy when no policy path is configured.
	pub fn from_config(config: &RbacConfig) -> Result<Self, RbacError> {
		let engine = match &config.policy_path {
			Some(path) => Self::from_policy_file(path)?,
			None => Self::new(&PolicyDocument::default())?,
		};
		Ok(engine
			.with_eval_timeout(config.eval_timeout)
			.with_decision_logging(config.log_decisions))
	}

	/// Wrap an already compiled query, e.g. from an external engine.
	pub fn from_query(query: Arc<dyn CompiledQuery>) -> Self {
		Self {
			query,
			options: EvalOptions::default(),
		}
	}

	/// Builder: bound every evaluation by a deadline.
	pub fn with_eval_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.options.eval_timeout = timeout;
		self
	}

	/// Builder: log every decision at info level.
	pub fn with_decision_logging(mut self, enabled: bool) -> Self {
		self.options.log_decisions = enabled;
		self
	}

	/// Fully evaluate a request.
	pub async fn evaluate(
		&self,
		cancel: &CancellationToken,
		request: &AuthzRequest<'_>,
	) -> Result<(), RbacError> {
		let input = to_input(request)?;
		let result = guard(cancel, self.options.eval_timeout, self.query.eval(&input)).await?;
		conclude(self.options, input, result)
	}

	/// Partially evaluate a request, leaving the object's fields open.
	pub async fn prepare(
		&self,
		cancel: &CancellationToken,
		request: &PartialRequest<'_>,
	) -> Result<PreparedAuthorizer, RbacError> {
		let input = to_input(request)?;
		let result = guard(
			cancel,
			self.options.eval_timeout,
			self.query.partial_eval(&input),
		)
		.await?;

		match result {
			Ok(query) => {
				debug!("prepared partial evaluation");
				Ok(PreparedAuthorizer::new(
					query,
					request.object.object_type.to_string(),
					input,
					self.options,
				))
			}
			Err(error) => {
				warn!(error = %error, "partial evaluation failed");
				Err(Forbidden::fault(error, input).into())
			}
		}
	}
}

fn to_input<T: Serialize>(request: &T) -> Result<Value, RbacError> {
	serde_json::to_value(request).map_err(|e| {
		warn!(error = %e, "failed to encode input document");
		Forbidden::fault(EngineError::MalformedInput(e), Value::Null).into()
	})
}

/// Run an engine call under the caller's cancellation signal and the
/// configured deadline.
pub(crate) async fn guard<T>(
	cancel: &CancellationToken,
	timeout: Option<Duration>,
	evaluation: impl Future<Output = T>,
) -> Result<T, RbacError> {
	let bounded = async {
		match timeout {
			Some(limit) => tokio::time::timeout(limit, evaluation)
				.await
				.map_err(|_| RbacError::DeadlineExceeded(limit)),
			None => Ok(evaluation.await),
		}
	};

	let outcome = tokio::select! {
		biased;
		_ = cancel.cancelled() => Err(RbacError::Cancelled),
		result = bounded => result,
	};

	if let Err(e) = &outcome {
		debug!(error = %e, "evaluation abandoned");
	}
	outcome
}

/// Turn an engine result into the facade's answer.
pub(crate) fn conclude(
	options: EvalOptions,
	input: Value,
	result: Result<Evaluation, EngineError>,
) -> Result<(), RbacError> {
	match result {
		Ok(evaluation) if evaluation.allowed => {
			if options.log_decisions {
				log_decision(&input, "allow");
			} else {
				debug!(trace = ?evaluation.trace, "policy allows request");
			}
			Ok(())
		}
		Ok(evaluation) => {
			if options.log_decisions {
				log_decision(&input, "deny");
			} else {
				info!("policy disallows request");
			}
			debug!(trace = ?evaluation.trace, "denial trace");
			Err(Forbidden::denied(input, evaluation.trace).into())
		}
		Err(error) => {
			warn!(error = %error, "decision engine fault, denying request");
			Err(Forbidden::fault(error, input).into())
		}
	}
}

fn log_decision(input: &Value, decision: &'static str) {
	info!(
		subject_id = input["subject"]["id"].as_str().unwrap_or_default(),
		action = input["action"].as_str().unwrap_or_default(),
		object_type = input["object"]["type"].as_str().unwrap_or_default(),
		decision,
		"authorization decision"
	);
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::engine::{PreparedQuery, Trace, Vote};
	use crate::error::ForbiddenReason;
	use crate::policy::Level;
	use crate::types::{resources, Action, Object, Permission, Role};
	use async_trait::async_trait;

	struct Stalled;

	#[async_trait]
	impl CompiledQuery for Stalled {
		async fn eval(&self, _input: &Value) -> Result<Evaluation, EngineError> {
			std::future::pending().await
		}

		async fn partial_eval(
			&self,
			_input: &Value,
		) -> Result<Arc<dyn PreparedQuery>, EngineError> {
			std::future::pending().await
		}
	}

	struct Broken;

	#[async_trait]
	impl CompiledQuery for Broken {
		async fn eval(&self, _input: &Value) -> Result<Evaluation, EngineError> {
			Err(EngineError::Internal("evaluator crashed".to_string()))
		}

		async fn partial_eval(
			&self,
			_input: &Value,
		) -> Result<Arc<dyn PreparedQuery>, EngineError> {
			Err(EngineError::Internal("evaluator crashed".to_string()))
		}
	}

	/// Faults after consulting the site level.
	struct HalfWay;

	#[async_trait]
	impl CompiledQuery for HalfWay {
		async fn eval(&self, _input: &Value) -> Result<Evaluation, EngineError> {
			let mut trace = Trace::default();
			trace.push("site", Vote::Abstain, 0);
			Err(EngineError::Internal("org lookup failed".to_string()).with_trace(trace))
		}

		async fn partial_eval(
			&self,
			_input: &Value,
		) -> Result<Arc<dyn PreparedQuery>, EngineError> {
			Err(EngineError::Internal("org lookup failed".to_string()))
		}
	}

	fn reader() -> Vec<Role> {
		vec![Role::new("reader").with_site(Permission::allow(resources::WILDCARD, Action::Read))]
	}

	#[tokio::test]
	async fn allows_and_denies_with_builtin_policy() {
		let engine = DecisionEngine::new(&PolicyDocument::default()).unwrap();
		let roles = reader();
		let object = Object::new("doc").with_id("1");
		let cancel = CancellationToken::new();

		let allowed = AuthzRequest::new("alice", &roles, Action::Read, &object);
		assert!(engine.evaluate(&cancel, &allowed).await.is_ok());

		let denied = AuthzRequest::new("alice", &roles, Action::Delete, &object);
		let err = engine.evaluate(&cancel, &denied).await.unwrap_err();
		let forbidden = err.as_forbidden().unwrap();
		assert!(!forbidden.is_engine_fault());
		assert_eq!(forbidden.input()["action"], "delete");
		assert_eq!(forbidden.trace().entries().len(), 3);
	}

	#[tokio::test]
	async fn invalid_policy_refuses_to_build() {
		let policy = PolicyDocument {
			levels: vec![Level::User, Level::User],
			..Default::default()
		};
		let err = DecisionEngine::new(&policy).unwrap_err();
		assert!(matches!(err, RbacError::PolicyCompilation(_)));
	}

	#[tokio::test]
	async fn engine_fault_is_forbidden() {
		let engine = DecisionEngine::from_query(Arc::new(Broken));
		let roles = reader();
		let object = Object::new("doc");
		let err = engine
			.evaluate(
				&CancellationToken::new(),
				&AuthzRequest::new("alice", &roles, Action::Read, &object),
			)
			.await
			.unwrap_err();

		assert_eq!(err.to_string(), "forbidden");
		let forbidden = err.as_forbidden().unwrap();
		assert!(matches!(
			forbidden.internal(),
			ForbiddenReason::EngineFault(EngineError::Internal(_))
		));
	}

	#[tokio::test]
	async fn engine_fault_keeps_partial_trace() {
		let engine = DecisionEngine::from_query(Arc::new(HalfWay));
		let roles = reader();
		let object = Object::new("doc");
		let err = engine
			.evaluate(
				&CancellationToken::new(),
				&AuthzRequest::new("alice", &roles, Action::Read, &object),
			)
			.await
			.unwrap_err();

		assert_eq!(err.to_string(), "forbidden");
		let forbidden = err.as_forbidden().unwrap();
		assert_eq!(forbidden.trace().entries().len(), 1);
		assert_eq!(forbidden.trace().entries()[0].rule, "site");
		assert!(matches!(
			forbidden.internal(),
			ForbiddenReason::EngineFault(EngineError::Internal(_))
		));
	}

	#[tokio::test]
	async fn prepare_fault_is_forbidden() {
		let engine = DecisionEngine::from_query(Arc::new(Broken));
		let err = engine
			.prepare(
				&CancellationToken::new(),
				&PartialRequest::new("alice", &[], Action::Read, "doc"),
			)
			.await
			.unwrap_err();
		assert!(err.as_forbidden().unwrap().is_engine_fault());
	}

	#[tokio::test]
	async fn cancelled_token_aborts_evaluation() {
		let engine = DecisionEngine::from_query(Arc::new(Stalled));
		let cancel = CancellationToken::new();
		let object = Object::new("doc");

		let trigger = cancel.clone();
		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_millis(10)).await;
			trigger.cancel();
		});

		let err = engine
			.evaluate(&cancel, &AuthzRequest::new("alice", &[], Action::Read, &object))
			.await
			.unwrap_err();
		assert!(matches!(err, RbacError::Cancelled));
	}

	#[tokio::test]
	async fn deadline_aborts_evaluation() {
		let engine = DecisionEngine::from_query(Arc::new(Stalled))
			.with_eval_timeout(Some(Duration::from_millis(5)));
		let err = engine
			.prepare(
				&CancellationToken::new(),
				&PartialRequest::new("alice", &[], Action::Read, "doc"),
			)
			.await
			.unwrap_err();
		assert!(matches!(err, RbacError::DeadlineExceeded(_)));
		assert!(err.is_cancellation());
	}

	#[tokio::test]
	async fn already_cancelled_token_never_reaches_engine() {
		let engine = DecisionEngine::new(&PolicyDocument::default()).unwrap();
		let cancel = CancellationToken::new();
		cancel.cancel();
		let roles = reader();
		let object = Object::new("doc");

		let err = engine
			.evaluate(&cancel, &AuthzRequest::new("alice", &roles, Action::Read, &object))
			.await
			.unwrap_err();
		assert!(matches!(err, RbacError::Cancelled));
	}

	#[tokio::test]
	async fn from_config_loads_policy_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("policy.toml");
		std::fs::write(&path, "levels = [\"user\"]\n").unwrap();

		let config = RbacConfig {
			policy_path: Some(path),
			..Default::default()
		};
		let engine = DecisionEngine::from_config(&config).unwrap();
		let roles = reader();
		let object = Object::new("doc");

		// Site grants are not consulted by a user-only policy.
		let err = engine
			.evaluate(
				&CancellationToken::new(),
				&AuthzRequest::new("alice", &roles, Action::Read, &object),
			)
			.await
			.unwrap_err();
		assert!(err.is_forbidden());
	}

	#[tokio::test]
	async fn from_config_with_missing_policy_file_fails() {
		let config = RbacConfig {
			policy_path: Some("/nonexistent/rbac/policy.toml".into()),
			..Default::default()
		};
		let err = DecisionEngine::from_config(&config).unwrap_err();
		assert!(matches!(err, RbacError::PolicyCompilation(_)));
	}
}
