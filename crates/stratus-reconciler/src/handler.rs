use serde::{Deserialize, Serialize};
use serde_json::Value;

use stratus_core::{ResourceId, StratusError, ValidationError};

use crate::drift::FieldDrift;

/// Whether the caller wants the resource to exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    #[default]
    Present,
    Absent,
}

/// One impl per resource kind. The handler owns the desired state and
/// carries all translation: desired → ARM payload, remote → flat
/// normalized map, and the structural comparison between the two.
///
/// Handlers never perform I/O — [`crate::reconcile`] drives the transport
/// and feeds normalized remote state back in.
pub trait ResourceHandler: Send + Sync {
    /// Resource kind label used in logs, e.g. "autoscale_setting".
    fn kind(&self) -> &'static str;

    /// The ARM identity of the managed resource.
    fn identity(&self) -> &ResourceId;

    /// The management API version this kind speaks.
    fn api_version(&self) -> &'static str;

    /// Desired presence from the caller's `state` field.
    fn presence(&self) -> Presence;

    /// Precondition check over the desired state alone. Runs before any
    /// network call; a non-empty result aborts the invocation.
    fn validate(&self) -> Vec<ValidationError>;

    /// Construct the full-replace PUT payload. Pure: no network I/O, no
    /// mutation of the desired state. `current` is the normalized remote
    /// state when the resource already exists, used to carry over
    /// remote-only tags and the location.
    fn build_payload(&self, current: Option<&Value>) -> Result<Value, StratusError>;

    /// Compare the normalized remote state against desired state. Only
    /// caller-supplied fields and the provider-managed set (tags, target,
    /// enabled) are considered; list-valued sub-resources compare
    /// order-independently. Empty result means in sync.
    fn diff(&self, current: &Value) -> Vec<FieldDrift>;

    /// Flatten the provider's nested object graph into a map of
    /// primitives. Idempotent; durations come out as whole minutes.
    fn normalize(&self, remote: &Value) -> Value;
}
