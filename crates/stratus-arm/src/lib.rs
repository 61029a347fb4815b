//! stratus-arm
//!
//! The external collaborators of the reconciler, made concrete for Azure
//! Resource Manager:
//!
//! - [`ResourceTransport`] — the read/write interface the reconciler
//!   drives, plus [`ArmTransport`], its REST implementation
//! - [`CredentialProvider`] — lazy bearer-token acquisition (managed
//!   identity first, service principal fallback), cached per audience
//! - [`KeyVaultClient`] — secret retrieval over the same credential flow
//!
//! No retries, no backoff, no timeouts: one request per operation, with
//! failures surfaced verbatim.

pub mod credentials;
pub mod keyvault;
pub mod transport;

pub use crate::credentials::{CredentialProvider, ServicePrincipal};
pub use crate::keyvault::KeyVaultClient;
pub use crate::transport::{ArmTransport, ResourceTransport};
