use serde_json::json;
use shared::AppResult;
use shared::models::{
    AdultRegistrationRequest, AuditAction, CallerIdentity, Member, MemberCategory, MemberType,
    RequestType, User, UserStatus, collections,
};
use shared::util::{new_doc_id, now_millis};

use super::{AdultApproval, ApprovalService, guard};
use crate::audit;
use crate::db::Transaction;

impl ApprovalService {
    /// Approve an adult registration: one active individual member, the
    /// pending requester activated and linked to it.
    pub async fn approve_adult(
        &self,
        request_id: &str,
        caller: &CallerIdentity,
    ) -> AppResult<AdultApproval> {
        guard::require_approver(caller)?;

        let id = request_id.to_string();
        let who = caller.clone();
        let result = self
            .store
            .run_transaction_async(move |tx| approve_adult_tx(tx, &id, &who))
            .await?;

        audit::emit_committed(
            AuditAction::ApproveAdultRegistration,
            caller,
            collections::ADULT_REGISTRATION_REQUESTS,
            request_id,
        );
        tracing::info!(
            request_id,
            member_id = %result.member_id,
            user_id = ?result.user_id,
            "Adult registration approved"
        );
        Ok(result)
    }
}

pub(super) fn approve_adult_tx(
    tx: &mut Transaction,
    request_id: &str,
    caller: &CallerIdentity,
) -> AppResult<AdultApproval> {
    let request: AdultRegistrationRequest = tx
        .get_as(collections::ADULT_REGISTRATION_REQUESTS, request_id)?
        .ok_or_else(|| guard::request_not_found(RequestType::Adult, request_id))?;
    guard::ensure_pending(request.status)?;
    guard::authorize_club(caller, &request.club_id)?;

    let now = now_millis();
    let member_id = new_doc_id();
    let applicant = &request.applicant;
    let mut member = Member::new(
        &member_id,
        &applicant.name,
        &request.club_id,
        MemberCategory::Adult,
        MemberType::Individual,
        now,
    )
    .approved(&caller.uid, now);
    member.club_name = request.club_name.clone();
    member.date_of_birth = applicant.birth_date.clone();
    member.gender = applicant.gender.clone();
    member.phone_number = applicant.phone_number.clone();
    member.email = applicant.email.clone();

    let mut linked_user = None;
    if let Some(uid) = request.requested_by.as_deref()
        && let Some(user) = tx.get_as::<User>(collections::USERS, uid)?
        && user.status == UserStatus::Pending
    {
        tx.update(
            collections::USERS,
            uid,
            json!({
                "status": UserStatus::Active,
                "linkedMemberId": member_id,
                "clubId": request.club_id,
                "clubName": request.club_name,
                "updatedAt": now,
            }),
        )?;
        member.user_id.get_or_insert_with(|| uid.to_string());
        linked_user = Some(uid.to_string());
    }

    tx.set(collections::MEMBERS, &member_id, &member)?;
    tx.update(
        collections::ADULT_REGISTRATION_REQUESTS,
        request_id,
        json!({
            "status": "approved",
            "approvedBy": caller.uid,
            "approvedAt": now,
            "createdMemberId": member_id,
        }),
    )?;
    audit::record(
        tx,
        AuditAction::ApproveAdultRegistration,
        caller,
        collections::ADULT_REGISTRATION_REQUESTS,
        request_id,
        json!({
            "requestData": request,
            "memberId": member_id,
            "userId": linked_user,
        }),
    )?;

    Ok(AdultApproval {
        member_id,
        user_id: linked_user,
    })
}
