//! User ↔ member linking
//!
//! A user points at its member through `linkedMemberId` and the member
//! points back through `userId`. Linking refuses to overwrite an existing
//! link on either side unless forced; a forced link first clears the stale
//! back-reference of each displaced partner so both sides stay consistent.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use shared::models::{AuditAction, CallerIdentity, Member, User, collections};
use shared::util::now_millis;
use shared::{AppError, AppResult, ErrorCode};

use super::{ApprovalService, LinkResult, guard};
use crate::audit;
use crate::db::Transaction;

/// Consistency view of one user/member pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkStatus {
    pub is_linked: bool,
    pub user_to_member: bool,
    pub member_to_user: bool,
    pub consistent: bool,
}

/// Inspect how a user and a member reference each other
pub fn link_status(user: &User, member: &Member) -> LinkStatus {
    let user_to_member = user.linked_member_id.as_deref() == Some(member.id.as_str());
    let member_to_user = member.user_id.as_deref() == Some(user.uid.as_str());
    LinkStatus {
        is_linked: user_to_member && member_to_user,
        user_to_member,
        member_to_user,
        consistent: user_to_member == member_to_user,
    }
}

impl ApprovalService {
    /// Link a user account and a member record in both directions
    pub async fn link_user_to_member(
        &self,
        user_id: &str,
        member_id: &str,
        caller: &CallerIdentity,
        force_update: bool,
    ) -> AppResult<LinkResult> {
        guard::require_approver(caller)?;

        let (uid, mid, who) = (user_id.to_string(), member_id.to_string(), caller.clone());
        let result = self
            .store
            .run_transaction_async(move |tx| link_tx(tx, &uid, &mid, &who, force_update))
            .await?;

        audit::emit_committed(AuditAction::LinkUserMember, caller, collections::USERS, user_id);
        tracing::info!(user_id, member_id, force_update, "User linked to member");
        Ok(result)
    }

    /// Remove an existing mutual link
    pub async fn unlink_user_from_member(
        &self,
        user_id: &str,
        member_id: &str,
        caller: &CallerIdentity,
    ) -> AppResult<LinkResult> {
        guard::require_approver(caller)?;

        let (uid, mid, who) = (user_id.to_string(), member_id.to_string(), caller.clone());
        let result = self
            .store
            .run_transaction_async(move |tx| unlink_tx(tx, &uid, &mid, &who))
            .await?;

        audit::emit_committed(AuditAction::UnlinkUserMember, caller, collections::USERS, user_id);
        tracing::info!(user_id, member_id, "User unlinked from member");
        Ok(result)
    }

    /// Current link state of a pair, read outside any transaction
    pub fn link_status(&self, user_id: &str, member_id: &str) -> AppResult<LinkStatus> {
        let (user, member) = (
            self.store()
                .get_as::<User>(collections::USERS, user_id)?
                .ok_or_else(|| user_not_found(user_id))?,
            self.store()
                .get_as::<Member>(collections::MEMBERS, member_id)?
                .ok_or_else(|| member_not_found(member_id))?,
        );
        Ok(link_status(&user, &member))
    }
}

fn user_not_found(user_id: &str) -> AppError {
    AppError::new(ErrorCode::UserNotFound).with_detail("userId", user_id)
}

fn member_not_found(member_id: &str) -> AppError {
    AppError::new(ErrorCode::MemberNotFound).with_detail("memberId", member_id)
}

fn load_pair(tx: &mut Transaction, user_id: &str, member_id: &str) -> AppResult<(User, Member)> {
    let user: User = tx
        .get_as(collections::USERS, user_id)?
        .ok_or_else(|| user_not_found(user_id))?;
    let member: Member = tx
        .get_as(collections::MEMBERS, member_id)?
        .ok_or_else(|| member_not_found(member_id))?;
    Ok((user, member))
}

fn link_tx(
    tx: &mut Transaction,
    user_id: &str,
    member_id: &str,
    caller: &CallerIdentity,
    force_update: bool,
) -> AppResult<LinkResult> {
    let (user, member) = load_pair(tx, user_id, member_id)?;
    guard::authorize_club(caller, &member.club_id)?;

    let previous_member = user
        .linked_member_id
        .clone()
        .filter(|linked| linked != member_id);
    let previous_user = member.user_id.clone().filter(|linked| linked != user_id);

    if !force_update {
        if let Some(linked) = &previous_member {
            return Err(AppError::with_message(
                ErrorCode::UserAlreadyLinked,
                format!("User is already linked to member {linked}. Use forceUpdate to override."),
            )
            .with_detail("linkedMemberId", linked.as_str()));
        }
        if let Some(linked) = &previous_user {
            return Err(AppError::with_message(
                ErrorCode::MemberAlreadyLinked,
                format!("Member is already linked to user {linked}. Use forceUpdate to override."),
            )
            .with_detail("userId", linked.as_str()));
        }
    }

    let now = now_millis();

    // Clear back-references that would otherwise dangle
    if let Some(old_uid) = &previous_user
        && let Some(old_user) = tx.get_as::<User>(collections::USERS, old_uid)?
        && old_user.linked_member_id.as_deref() == Some(member_id)
    {
        tx.update(
            collections::USERS,
            old_uid,
            json!({ "linkedMemberId": Value::Null, "updatedAt": now }),
        )?;
    }
    if let Some(old_mid) = &previous_member
        && let Some(old_member) = tx.get_as::<Member>(collections::MEMBERS, old_mid)?
        && old_member.user_id.as_deref() == Some(user_id)
    {
        tx.update(
            collections::MEMBERS,
            old_mid,
            json!({ "userId": Value::Null, "updatedAt": now }),
        )?;
    }

    tx.update(
        collections::USERS,
        user_id,
        json!({
            "linkedMemberId": member_id,
            "clubId": member.club_id,
            "clubName": member.club_name,
            "updatedAt": now,
        }),
    )?;
    tx.update(
        collections::MEMBERS,
        member_id,
        json!({ "userId": user_id, "updatedAt": now }),
    )?;
    audit::record(
        tx,
        AuditAction::LinkUserMember,
        caller,
        collections::USERS,
        user_id,
        json!({
            "userId": user_id,
            "memberId": member_id,
            "forceUpdate": force_update,
            "previousLinkedMemberId": user.linked_member_id,
            "previousUserId": member.user_id,
        }),
    )?;

    Ok(LinkResult {
        user_id: user_id.to_string(),
        member_id: member_id.to_string(),
    })
}

fn unlink_tx(
    tx: &mut Transaction,
    user_id: &str,
    member_id: &str,
    caller: &CallerIdentity,
) -> AppResult<LinkResult> {
    let (user, member) = load_pair(tx, user_id, member_id)?;
    guard::authorize_club(caller, &member.club_id)?;

    let status = link_status(&user, &member);
    if !status.is_linked {
        return Err(AppError::with_message(
            ErrorCode::NotLinked,
            "User and member are not linked to each other",
        )
        .with_detail("userToMember", status.user_to_member)
        .with_detail("memberToUser", status.member_to_user));
    }

    let now = now_millis();
    tx.update(
        collections::USERS,
        user_id,
        json!({ "linkedMemberId": Value::Null, "updatedAt": now }),
    )?;
    tx.update(
        collections::MEMBERS,
        member_id,
        json!({ "userId": Value::Null, "updatedAt": now }),
    )?;
    audit::record(
        tx,
        AuditAction::UnlinkUserMember,
        caller,
        collections::USERS,
        user_id,
        json!({ "userId": user_id, "memberId": member_id }),
    )?;

    Ok(LinkResult {
        user_id: user_id.to_string(),
        member_id: member_id.to_string(),
    })
}
