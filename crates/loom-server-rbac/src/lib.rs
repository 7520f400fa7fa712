// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role-based access control for Loom.
//!
//! This crate decides whether a subject holding a set of roles may perform an
//! action on an object, and filters lists of objects down to the ones the
//! subject may act on.
//!
//! # Architecture
//!
//! ```text
//! caller ──► RbacAuthorizer ──► RoleRegistry (names → roles)
//!                 │
//!                 ▼
//!           DecisionEngine ──► CompiledQuery (compiled once at startup)
//!                 │
//!                 ├── evaluate ──► Ok(()) | Forbidden
//!                 └── prepare  ──► PreparedAuthorizer ──► filter()
//! ```
//!
//! # Security Properties
//!
//! - Fail-closed: an engine fault is reported as [`Forbidden`], never as allow
//! - [`Forbidden`] displays as `forbidden`; internal faults and traces stay internal
//! - Unknown role names are rejected before any evaluation
//! - Evaluations honour the caller's [`CancellationToken`](tokio_util::sync::CancellationToken)
//!
//! # Example
//!
//! ```ignore
//! use loom_server_rbac::{filter, Action, DecisionEngine, RbacAuthorizer};
//!
//! let config = loom_server_rbac::config::load_config()?;
//! let auth = RbacAuthorizer::with_builtin_roles(DecisionEngine::from_config(&config)?);
//!
//! let visible = filter(&cancel, &auth, &user_id, &role_names, Action::Read, workspaces).await?;
//! ```

pub mod adapter;
pub mod authorizer;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod input;
pub mod policy;
pub mod prepared;
pub mod roles;
pub mod types;

pub use adapter::DecisionEngine;
pub use authorizer::{Authorizer, PreparedAuthorized, RbacAuthorizer};
pub use config::{RbacConfig, RbacConfigLayer};
pub use engine::{CompiledQuery, Evaluation, PreparedQuery, Trace, TraceEntry, Vote};
pub use error::{EngineError, Forbidden, ForbiddenReason, PolicyError, RbacError};
pub use filter::filter;
pub use policy::{Level, PolicyDocument};
pub use prepared::PreparedAuthorizer;
pub use roles::{BuiltinRoles, RoleRegistry};
pub use types::{resources, Action, Object, Objecter, Permission, Role};
