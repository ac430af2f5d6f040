//! Audit trail
//!
//! Every protocol mutation appends one [`AuditLogEntry`] inside the same
//! transaction as the writes it describes, so the trail and the data commit
//! or abort together. After the commit an `audit`-target tracing event is
//! emitted for the log files.

use serde_json::Value;
use shared::models::{AuditAction, AuditLogEntry, CallerIdentity, collections};
use shared::store::{Direction, Query};
use shared::util::{new_doc_id, now_millis};

use crate::db::{DocStore, StoreResult, Transaction};

/// Buffer an audit entry in `tx`; returns the entry id
pub fn record(
    tx: &mut Transaction,
    action: AuditAction,
    caller: &CallerIdentity,
    target_type: &str,
    target_id: &str,
    metadata: Value,
) -> StoreResult<String> {
    let entry = AuditLogEntry {
        id: new_doc_id(),
        action,
        performed_by: caller.uid.clone(),
        performed_by_role: caller.role,
        target_type: target_type.to_string(),
        target_id: target_id.to_string(),
        metadata,
        timestamp: now_millis(),
    };
    tx.set(collections::AUDIT_LOGS, &entry.id, &entry)?;
    Ok(entry.id)
}

/// Log a committed mutation to the audit log target
pub fn emit_committed(
    action: AuditAction,
    caller: &CallerIdentity,
    target_type: &str,
    target_id: &str,
) {
    tracing::info!(
        target: "audit",
        action = %action,
        performed_by = %caller.uid,
        role = %caller.role,
        target_type,
        target_id,
        "Mutation committed"
    );
}

/// Audit entries recorded against one target, oldest first
pub fn entries_for(store: &DocStore, target_id: &str) -> StoreResult<Vec<AuditLogEntry>> {
    store.query_as(
        &Query::new(collections::AUDIT_LOGS)
            .where_eq("targetId", target_id)
            .order_by("timestamp", Direction::Asc),
    )
}
