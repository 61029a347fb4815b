//! stratus-core
//!
//! Shared vocabulary of the stratus system: ARM resource identity, the
//! error taxonomy, and value-normalization helpers. No HTTP dependency —
//! everything here is pure.

use std::future::Future;
use std::pin::Pin;

pub mod error;
pub mod id;
pub mod norm;

pub use crate::error::{StratusError, ValidationError};
pub use crate::id::ResourceId;

/// Boxed future for dyn-compatible async traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
