use serde::Serialize;
use serde_json::Value;

use stratus_arm::ResourceTransport;
use stratus_core::StratusError;

use crate::handler::{Presence, ResourceHandler};

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    /// Compute `changed` but skip every write (dry run). Uses the same
    /// diff code path as a real apply, so the answer matches what a real
    /// run would do.
    pub check_mode: bool,
}

/// Outcome of one reconcile invocation. `changed` is computed once and
/// only set when a write succeeded (or would have, in check mode).
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileResult {
    pub changed: bool,
    pub state: Value,
}

/// Converge one resource toward its desired state: fetch → diff →
/// (conditionally) write.
///
/// At most one read and one write per invocation. "Not found" on fetch is
/// absence, not an error; a delete racing into "not found" is tolerated
/// as already-satisfied desired state.
pub async fn reconcile(
    handler: &dyn ResourceHandler,
    transport: &dyn ResourceTransport,
    options: &ReconcileOptions,
) -> Result<ReconcileResult, StratusError> {
    let errors = handler.validate();
    if !errors.is_empty() {
        return Err(StratusError::Validation(errors));
    }

    let id = handler.identity();
    let api_version = handler.api_version();

    tracing::debug!(kind = handler.kind(), resource = %id, "fetching current state");
    let remote = transport.get(id, api_version).await?;
    let current = remote.map(|r| handler.normalize(&r));

    match (handler.presence(), current) {
        // Nothing there, nothing wanted.
        (Presence::Absent, None) => Ok(ReconcileResult {
            changed: false,
            state: Value::Null,
        }),

        (Presence::Absent, Some(_)) => {
            if options.check_mode {
                tracing::info!(kind = handler.kind(), resource = %id, "would delete (check mode)");
                return Ok(ReconcileResult {
                    changed: true,
                    state: Value::Null,
                });
            }
            tracing::info!(kind = handler.kind(), resource = %id, "deleting resource");
            let deleted = transport.delete(id, api_version).await?;
            if !deleted {
                tracing::debug!(resource = %id, "resource vanished before delete");
            }
            Ok(ReconcileResult {
                changed: deleted,
                state: Value::Null,
            })
        }

        (Presence::Present, None) => {
            let payload = handler.build_payload(None)?;
            if options.check_mode {
                tracing::info!(kind = handler.kind(), resource = %id, "would create (check mode)");
                return Ok(ReconcileResult {
                    changed: true,
                    state: handler.normalize(&payload),
                });
            }
            tracing::info!(kind = handler.kind(), resource = %id, "creating resource");
            let created = transport.create_or_update(id, api_version, &payload).await?;
            Ok(ReconcileResult {
                changed: true,
                state: handler.normalize(&created),
            })
        }

        (Presence::Present, Some(current)) => {
            let drift = handler.diff(&current);
            if drift.is_empty() {
                tracing::debug!(kind = handler.kind(), resource = %id, "in sync, no write needed");
                return Ok(ReconcileResult {
                    changed: false,
                    state: current,
                });
            }

            let fields: Vec<&str> = drift.iter().map(|d| d.field.as_str()).collect();
            let payload = handler.build_payload(Some(&current))?;
            if options.check_mode {
                tracing::info!(
                    kind = handler.kind(),
                    resource = %id,
                    drift = ?fields,
                    "would update (check mode)"
                );
                return Ok(ReconcileResult {
                    changed: true,
                    state: handler.normalize(&payload),
                });
            }
            tracing::info!(kind = handler.kind(), resource = %id, drift = ?fields, "updating resource");
            let updated = transport.create_or_update(id, api_version, &payload).await?;
            Ok(ReconcileResult {
                changed: true,
                state: handler.normalize(&updated),
            })
        }
    }
}
