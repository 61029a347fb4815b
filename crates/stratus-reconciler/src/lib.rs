//! stratus-reconciler
//!
//! Idempotent reconcile-and-diff for ARM resources. Each supported
//! resource kind implements [`ResourceHandler`] (validate, translate,
//! diff, normalize); [`reconcile`] drives the fetch → diff →
//! (conditionally) write cycle through a [`stratus_arm::ResourceTransport`].
//!
//! Public API:
//! - `reconcile()` — converge one resource toward its desired state
//! - `AutoscaleHandler` / `SqlServerHandler` — per-kind desired state
//! - `facts` — read-only queries returning normalized resource maps
//!
//! The reconciler is stateless: nothing is cached between invocations,
//! and the remote state is fetched fresh every call.

pub mod drift;
pub mod facts;
pub mod handler;
pub mod handlers;
pub mod reconcile;

pub use crate::drift::FieldDrift;
pub use crate::handler::{Presence, ResourceHandler};
pub use crate::handlers::autoscale::{AutoscaleHandler, AutoscaleSpec};
pub use crate::handlers::sql_server::{SqlServerHandler, SqlServerSpec};
pub use crate::reconcile::{reconcile, ReconcileOptions, ReconcileResult};
