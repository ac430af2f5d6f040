use serde_json::json;
use shared::AppResult;
use shared::models::{
    AuditAction, CallerIdentity, Member, MemberCategory, MemberRegistrationRequest, MemberType,
    RequestType, User, UserStatus, collections,
};
use shared::store::Query;
use shared::util::{new_doc_id, now_millis};

use super::{AdultApproval, ApprovalService, guard};
use crate::audit;
use crate::db::Transaction;

impl ApprovalService {
    /// Approve a general member registration. The account to link is the
    /// request's user, its requester, or failing both the account with the
    /// request's email.
    pub async fn approve_member(
        &self,
        request_id: &str,
        caller: &CallerIdentity,
    ) -> AppResult<AdultApproval> {
        guard::require_approver(caller)?;

        let id = request_id.to_string();
        let who = caller.clone();
        let result = self
            .store
            .run_transaction_async(move |tx| approve_member_tx(tx, &id, &who))
            .await?;

        audit::emit_committed(
            AuditAction::ApproveMemberRegistration,
            caller,
            collections::MEMBER_REGISTRATION_REQUESTS,
            request_id,
        );
        tracing::info!(
            request_id,
            member_id = %result.member_id,
            user_id = ?result.user_id,
            "Member registration approved"
        );
        Ok(result)
    }
}

fn find_target_user(
    tx: &mut Transaction,
    request: &MemberRegistrationRequest,
) -> AppResult<Option<User>> {
    if let Some(uid) = request.target_user() {
        return Ok(tx.get_as(collections::USERS, uid)?);
    }
    let Some(email) = request.email.as_deref() else {
        return Ok(None);
    };
    let mut users: Vec<User> = tx.query_as(
        &Query::new(collections::USERS)
            .where_eq("email", email)
            .limit(1),
    )?;
    Ok(users.pop())
}

pub(super) fn approve_member_tx(
    tx: &mut Transaction,
    request_id: &str,
    caller: &CallerIdentity,
) -> AppResult<AdultApproval> {
    let request: MemberRegistrationRequest = tx
        .get_as(collections::MEMBER_REGISTRATION_REQUESTS, request_id)?
        .ok_or_else(|| guard::request_not_found(RequestType::Member, request_id))?;
    guard::ensure_pending(request.status)?;
    guard::authorize_club(caller, &request.club_id)?;

    let now = now_millis();
    let member_id = new_doc_id();
    let mut member = Member::new(
        &member_id,
        &request.name,
        &request.club_id,
        MemberCategory::Adult,
        request.member_type.unwrap_or(MemberType::Individual),
        now,
    )
    .approved(&caller.uid, now);
    member.club_name = request.club_name.clone();
    member.family_role = request.family_role;
    member.date_of_birth = request.date_of_birth.clone();
    member.gender = request.gender.clone();
    member.phone_number = request.phone_number.clone();
    member.email = request.email.clone();

    // Only a pending account is activated and linked; an active account
    // keeps whatever link it already has.
    let mut linked_user = None;
    if let Some(user) = find_target_user(tx, &request)?
        && user.status == UserStatus::Pending
    {
        tx.update(
            collections::USERS,
            &user.uid,
            json!({
                "status": UserStatus::Active,
                "linkedMemberId": member_id,
                "clubId": request.club_id,
                "clubName": request.club_name,
                "updatedAt": now,
            }),
        )?;
        member.user_id = Some(user.uid.clone());
        linked_user = Some(user.uid);
    }

    tx.set(collections::MEMBERS, &member_id, &member)?;
    tx.update(
        collections::MEMBER_REGISTRATION_REQUESTS,
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
        AuditAction::ApproveMemberRegistration,
        caller,
        collections::MEMBER_REGISTRATION_REQUESTS,
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
