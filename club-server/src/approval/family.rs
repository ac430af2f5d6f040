use serde_json::{Map, Value, json};
use shared::models::{
    AuditAction, CallerIdentity, FamilyRegistrationRequest, FamilyRole, Member, MemberCategory,
    MemberType, RequestType, User, UserStatus, collections,
};
use shared::util::{new_doc_id, now_millis};
use shared::{AppError, AppResult};

use super::{ApprovalService, FamilyApproval, guard};
use crate::audit;
use crate::db::Transaction;

impl ApprovalService {
    /// Approve a family registration: one member per parent, then one per
    /// child with the parents as guardians. The requester is linked to the
    /// first parent.
    pub async fn approve_family(
        &self,
        request_id: &str,
        caller: &CallerIdentity,
    ) -> AppResult<FamilyApproval> {
        guard::require_approver(caller)?;

        let id = request_id.to_string();
        let who = caller.clone();
        let result = self
            .store
            .run_transaction_async(move |tx| approve_family_tx(tx, &id, &who))
            .await?;

        audit::emit_committed(
            AuditAction::ApproveFamilyRegistration,
            caller,
            collections::FAMILY_REGISTRATION_REQUESTS,
            request_id,
        );
        tracing::info!(
            request_id,
            parents = result.parent_member_ids.len(),
            children = result.child_member_ids.len(),
            "Family registration approved"
        );
        Ok(result)
    }
}

fn family_member(
    request: &FamilyRegistrationRequest,
    name: &str,
    category: MemberCategory,
    role: FamilyRole,
    caller: &CallerIdentity,
    now: i64,
) -> Member {
    let mut member = Member::new(
        new_doc_id(),
        name,
        &request.club_id,
        category,
        MemberType::Family,
        now,
    )
    .approved(&caller.uid, now);
    member.club_name = request.club_name.clone();
    member.family_role = Some(role);
    member
}

pub(super) fn approve_family_tx(
    tx: &mut Transaction,
    request_id: &str,
    caller: &CallerIdentity,
) -> AppResult<FamilyApproval> {
    let request: FamilyRegistrationRequest = tx
        .get_as(collections::FAMILY_REGISTRATION_REQUESTS, request_id)?
        .ok_or_else(|| guard::request_not_found(RequestType::Family, request_id))?;
    guard::ensure_pending(request.status)?;
    guard::authorize_club(caller, &request.club_id)?;

    let now = now_millis();

    let mut parent_member_ids = Vec::with_capacity(request.parents.len());
    for (index, parent) in request.parents.iter().enumerate() {
        if parent.name.trim().is_empty() {
            return Err(AppError::required_field(format!("parents[{index}].name")));
        }
        let mut member = family_member(
            &request,
            &parent.name,
            MemberCategory::Adult,
            FamilyRole::Parent,
            caller,
            now,
        );
        member.date_of_birth = parent.birth_date.clone();
        member.gender = parent.gender.clone();
        member.phone_number = parent.phone_number.clone();
        member.email = parent.email.clone();
        tx.set(collections::MEMBERS, &member.id, &member)?;
        parent_member_ids.push(member.id);
    }

    // Denormalized guardian contact: first parent, else the external guardian
    let (guardian_name, guardian_phone) = match request.parents.first() {
        Some(parent) => (Some(parent.name.clone()), parent.phone_number.clone()),
        None => match &request.external_guardian {
            Some(g) => (Some(g.name.clone()), g.phone_number.clone()),
            None => (None, None),
        },
    };
    let guardian_relation = request
        .external_guardian
        .as_ref()
        .and_then(|g| g.relation.clone());

    let mut child_member_ids = Vec::with_capacity(request.children.len());
    for (index, child) in request.children.iter().enumerate() {
        if child.name.trim().is_empty() {
            return Err(AppError::required_field(format!("children[{index}].name")));
        }
        let mut member = family_member(
            &request,
            &child.name,
            MemberCategory::Child,
            FamilyRole::Child,
            caller,
            now,
        );
        member.date_of_birth = child.birth_date.clone();
        member.gender = child.gender.clone();
        member.grade = child.grade.clone();
        member.guardian_ids = parent_member_ids.clone();
        member.guardian_user_ids = request.requested_by.iter().cloned().collect();
        member.guardian_name = guardian_name.clone();
        member.guardian_phone = guardian_phone.clone();
        member.guardian_relation = guardian_relation.clone();
        tx.set(collections::MEMBERS, &member.id, &member)?;
        child_member_ids.push(member.id);
    }

    let mut linked_user = None;
    if let Some(uid) = request.requested_by.as_deref()
        && let Some(first_parent) = parent_member_ids.first()
        && let Some(user) = tx.get_as::<User>(collections::USERS, uid)?
    {
        let mut patch = Map::new();
        patch.insert("linkedMemberId".into(), json!(first_parent));
        patch.insert("clubId".into(), json!(request.club_id));
        patch.insert("clubName".into(), json!(request.club_name));
        patch.insert("updatedAt".into(), json!(now));
        // Never downgrade an account that is already active
        if user.status == UserStatus::Pending {
            patch.insert("status".into(), json!(UserStatus::Active));
        }
        tx.update(collections::USERS, uid, Value::Object(patch))?;
        tx.update(collections::MEMBERS, first_parent, json!({ "userId": uid }))?;
        linked_user = Some(uid.to_string());
    }

    let created: Vec<&String> = parent_member_ids
        .iter()
        .chain(child_member_ids.iter())
        .collect();
    tx.update(
        collections::FAMILY_REGISTRATION_REQUESTS,
        request_id,
        json!({
            "status": "approved",
            "approvedBy": caller.uid,
            "approvedAt": now,
            "createdMemberIds": created,
        }),
    )?;
    audit::record(
        tx,
        AuditAction::ApproveFamilyRegistration,
        caller,
        collections::FAMILY_REGISTRATION_REQUESTS,
        request_id,
        json!({
            "requestData": request,
            "parentMemberIds": parent_member_ids,
            "childMemberIds": child_member_ids,
            "userId": request.requested_by,
        }),
    )?;

    Ok(FamilyApproval {
        parent_member_ids,
        child_member_ids,
        user_id: linked_user,
    })
}
