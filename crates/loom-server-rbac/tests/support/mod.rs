// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared fixtures for RBAC integration tests.

#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use loom_server_rbac::engine::levels::LevelQuery;
use loom_server_rbac::{
	resources, Action, BuiltinRoles, CompiledQuery, DecisionEngine, EngineError, Evaluation,
	Object, Objecter, Permission, PolicyDocument, PreparedQuery, RbacAuthorizer, Role,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::fmt::MakeWriter;

/// Counts every call that reaches the decision engine.
#[derive(Debug, Default)]
pub struct EngineCalls {
	pub evals: AtomicUsize,
	pub partial_evals: AtomicUsize,
	pub prepared_evals: AtomicUsize,
}

impl EngineCalls {
	pub fn total(&self) -> usize {
		self.evals.load(Ordering::SeqCst)
			+ self.partial_evals.load(Ordering::SeqCst)
			+ self.prepared_evals.load(Ordering::SeqCst)
	}

	pub fn partial_evals(&self) -> usize {
		self.partial_evals.load(Ordering::SeqCst)
	}

	pub fn prepared_evals(&self) -> usize {
		self.prepared_evals.load(Ordering::SeqCst)
	}
}

/// Wraps the built-in query and records every call.
pub struct SpyQuery {
	inner: LevelQuery,
	calls: Arc<EngineCalls>,
}

#[async_trait]
impl CompiledQuery for SpyQuery {
	async fn eval(&self, input: &Value) -> Result<Evaluation, EngineError> {
		self.calls.evals.fetch_add(1, Ordering::SeqCst);
		self.inner.eval(input).await
	}

	async fn partial_eval(&self, input: &Value) -> Result<Arc<dyn PreparedQuery>, EngineError> {
		self.calls.partial_evals.fetch_add(1, Ordering::SeqCst);
		let inner = self.inner.partial_eval(input).await?;
		Ok(Arc::new(SpyPrepared {
			inner,
			calls: Arc::clone(&self.calls),
		}))
	}
}

struct SpyPrepared {
	inner: Arc<dyn PreparedQuery>,
	calls: Arc<EngineCalls>,
}

#[async_trait]
impl PreparedQuery for SpyPrepared {
	async fn eval(&self, object: &Value) -> Result<Evaluation, EngineError> {
		self.calls.prepared_evals.fetch_add(1, Ordering::SeqCst);
		self.inner.eval(object).await
	}
}

/// Faults on every full evaluation, and on prepared evaluations of objects
/// whose id is `"boom"`. Everything else is delegated to the built-in query.
pub struct FaultyQuery {
	inner: LevelQuery,
}

#[async_trait]
impl CompiledQuery for FaultyQuery {
	async fn eval(&self, _input: &Value) -> Result<Evaluation, EngineError> {
		Err(EngineError::Internal("evaluator crashed".to_string()))
	}

	async fn partial_eval(&self, input: &Value) -> Result<Arc<dyn PreparedQuery>, EngineError> {
		let inner = self.inner.partial_eval(input).await?;
		Ok(Arc::new(FaultyPrepared { inner }))
	}
}

struct FaultyPrepared {
	inner: Arc<dyn PreparedQuery>,
}

#[async_trait]
impl PreparedQuery for FaultyPrepared {
	async fn eval(&self, object: &Value) -> Result<Evaluation, EngineError> {
		if object["id"] == "boom" {
			return Err(EngineError::Internal("evaluator crashed".to_string()));
		}
		self.inner.eval(object).await
	}
}

/// Cancels `cancel` from inside the prepared evaluation numbered `after`,
/// simulating a caller that gives up part-way through a batch.
pub struct CancellingQuery {
	inner: LevelQuery,
	cancel: CancellationToken,
	after: usize,
	calls: Arc<EngineCalls>,
}

#[async_trait]
impl CompiledQuery for CancellingQuery {
	async fn eval(&self, input: &Value) -> Result<Evaluation, EngineError> {
		self.calls.evals.fetch_add(1, Ordering::SeqCst);
		self.inner.eval(input).await
	}

	async fn partial_eval(&self, input: &Value) -> Result<Arc<dyn PreparedQuery>, EngineError> {
		self.calls.partial_evals.fetch_add(1, Ordering::SeqCst);
		let inner = self.inner.partial_eval(input).await?;
		Ok(Arc::new(CancellingPrepared {
			inner,
			cancel: self.cancel.clone(),
			after: self.after,
			calls: Arc::clone(&self.calls),
		}))
	}
}

struct CancellingPrepared {
	inner: Arc<dyn PreparedQuery>,
	cancel: CancellationToken,
	after: usize,
	calls: Arc<EngineCalls>,
}

#[async_trait]
impl PreparedQuery for CancellingPrepared {
	async fn eval(&self, object: &Value) -> Result<Evaluation, EngineError> {
		let seen = self.calls.prepared_evals.fetch_add(1, Ordering::SeqCst) + 1;
		if seen == self.after {
			self.cancel.cancel();
		}
		self.inner.eval(object).await
	}
}

fn builtin_query() -> LevelQuery {
	PolicyDocument::default().compile().unwrap()
}

/// Built-in roles plus a `reader` role that may read every resource type and
/// a `nobody` role with no permissions at all.
pub fn registry() -> BuiltinRoles {
	BuiltinRoles::new()
		.with_role(
			Role::new("reader").with_site(Permission::allow(resources::WILDCARD, Action::Read)),
		)
		.with_role(Role::new("nobody"))
}

pub fn authorizer() -> RbacAuthorizer {
	RbacAuthorizer::new(
		DecisionEngine::new(&PolicyDocument::default()).unwrap(),
		Arc::new(registry()),
	)
}

pub fn spy_authorizer() -> (RbacAuthorizer, Arc<EngineCalls>) {
	let calls = Arc::new(EngineCalls::default());
	let query = SpyQuery {
		inner: builtin_query(),
		calls: Arc::clone(&calls),
	};
	let auth = RbacAuthorizer::new(
		DecisionEngine::from_query(Arc::new(query)),
		Arc::new(registry()),
	);
	(auth, calls)
}

pub fn faulty_authorizer() -> RbacAuthorizer {
	let query = FaultyQuery {
		inner: builtin_query(),
	};
	RbacAuthorizer::new(
		DecisionEngine::from_query(Arc::new(query)),
		Arc::new(registry()),
	)
}

pub fn cancelling_authorizer(
	cancel: &CancellationToken,
	after: usize,
) -> (RbacAuthorizer, Arc<EngineCalls>) {
	let calls = Arc::new(EngineCalls::default());
	let query = CancellingQuery {
		inner: builtin_query(),
		cancel: cancel.clone(),
		after,
		calls: Arc::clone(&calls),
	};
	let auth = RbacAuthorizer::new(
		DecisionEngine::from_query(Arc::new(query)),
		Arc::new(registry()),
	);
	(auth, calls)
}

/// Formatted log output collected in memory.
#[derive(Clone, Default)]
pub struct CapturedLogs {
	output: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
	pub fn contents(&self) -> String {
		String::from_utf8_lossy(&self.output.lock().unwrap()).into_owned()
	}
}

pub struct CapturedWriter {
	output: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for CapturedWriter {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.output.lock().unwrap().extend_from_slice(buf);
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}

impl<'a> MakeWriter<'a> for CapturedLogs {
	type Writer = CapturedWriter;

	fn make_writer(&'a self) -> Self::Writer {
		CapturedWriter {
			output: Arc::clone(&self.output),
		}
	}
}

pub fn names(names: &[&str]) -> Vec<String> {
	names.iter().map(|n| n.to_string()).collect()
}

/// A document, as an application would store it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Doc {
	pub id: u32,
	pub owner: String,
	pub org: Option<String>,
}

impl Doc {
	pub fn new(id: u32, owner: &str) -> Self {
		Self {
			id,
			owner: owner.to_string(),
			org: None,
		}
	}
}

impl Objecter for Doc {
	fn rbac_object(&self) -> Object {
		let object = Object::new("doc")
			.with_id(self.id.to_string())
			.with_owner(&self.owner);
		match &self.org {
			Some(org) => object.in_org(org),
			None => object,
		}
	}
}

/// A user record, a different object type from [`Doc`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
	pub id: u32,
}

impl Objecter for UserRecord {
	fn rbac_object(&self) -> Object {
		Object::new(resources::USER).with_id(self.id.to_string())
	}
}

/// Either kind of record, for mixed-type batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
	Doc(Doc),
	User(UserRecord),
}

impl Objecter for Record {
	fn rbac_object(&self) -> Object {
		match self {
			Record::Doc(doc) => doc.rbac_object(),
			Record::User(user) => user.rbac_object(),
		}
	}
}
