use serde_json::json;
use shared::AppResult;
use shared::models::{AuditAction, CallerIdentity, RequestHeader, RequestType};
use shared::util::now_millis;

use super::{ApprovalService, RejectResult, guard};
use crate::audit;
use crate::db::Transaction;

impl ApprovalService {
    /// Reject a pending request of any type. Only the request itself and
    /// the audit trail change.
    pub async fn reject(
        &self,
        request_id: &str,
        request_type: RequestType,
        caller: &CallerIdentity,
        reason: Option<String>,
    ) -> AppResult<RejectResult> {
        guard::require_approver(caller)?;

        let (id, who) = (request_id.to_string(), caller.clone());
        let result = self
            .store
            .run_transaction_async(move |tx| reject_tx(tx, &id, request_type, &who, reason.as_deref()))
            .await?;

        audit::emit_committed(
            AuditAction::RejectRegistration,
            caller,
            request_type.collection(),
            request_id,
        );
        tracing::info!(request_id, request_type = request_type.as_str(), "Registration rejected");
        Ok(result)
    }
}

fn reject_tx(
    tx: &mut Transaction,
    request_id: &str,
    request_type: RequestType,
    caller: &CallerIdentity,
    reason: Option<&str>,
) -> AppResult<RejectResult> {
    let collection = request_type.collection();
    let header: RequestHeader = tx
        .get_as(collection, request_id)?
        .ok_or_else(|| guard::request_not_found(request_type, request_id))?;
    guard::authorize_club(caller, &header.club_id)?;
    guard::ensure_pending(header.status)?;

    tx.update(
        collection,
        request_id,
        json!({
            "status": "rejected",
            "rejectedBy": caller.uid,
            "rejectedAt": now_millis(),
            "rejectedReason": reason,
        }),
    )?;
    audit::record(
        tx,
        AuditAction::RejectRegistration,
        caller,
        collection,
        request_id,
        json!({
            "requestType": request_type,
            "reason": reason,
            "clubId": header.club_id,
        }),
    )?;

    Ok(RejectResult {
        request_id: request_id.to_string(),
        request_type,
    })
}
