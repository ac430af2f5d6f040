//! Public registration submission
//!
//! A user may hold at most one pending request per registration type. The
//! duplicate check is a query inside the creating transaction, so two
//! concurrent submissions from the same user cannot both commit.

use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::models::{
    AdultRegistrationRequest, Applicant, AuditAction, CallerIdentity, ChildApplicant, Decision,
    ExternalGuardian, FamilyRegistrationRequest, RequestStatus, RequestType,
};
use shared::store::Query;
use shared::util::{new_doc_id, now_millis};
use shared::{AppError, AppResult, ErrorCode};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::audit;
use crate::db::{DocStore, Transaction};

/// Adult registration form
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdultRegistrationSubmission {
    #[validate(length(min = 1, message = "clubId is required"))]
    pub club_id: String,
    #[serde(default)]
    pub club_name: Option<String>,
    #[serde(flatten)]
    #[validate(nested)]
    pub applicant: Applicant,
}

/// Family registration form
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_family_shape", skip_on_field_errors = false))]
pub struct FamilyRegistrationSubmission {
    #[validate(length(min = 1, message = "clubId is required"))]
    pub club_id: String,
    #[serde(default)]
    pub club_name: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub parents: Vec<Applicant>,
    #[serde(default)]
    #[validate(nested)]
    pub children: Vec<ChildApplicant>,
    #[serde(default)]
    #[validate(nested)]
    pub external_guardian: Option<ExternalGuardian>,
}

fn validate_family_shape(form: &FamilyRegistrationSubmission) -> Result<(), ValidationError> {
    if form.parents.is_empty() && form.children.is_empty() {
        return Err(ValidationError::new("empty_family")
            .with_message("at least one parent or child is required".into()));
    }
    if !form.children.is_empty() && form.parents.is_empty() && form.external_guardian.is_none() {
        return Err(ValidationError::new("guardian_required")
            .with_message("children need a parent or an external guardian".into()));
    }
    Ok(())
}

/// Convert validator output into an `InvalidInput` error listing each field
pub fn validation_error(errors: &ValidationErrors) -> AppError {
    let mut err = AppError::validation("Invalid registration form");
    for (field, problems) in errors.field_errors() {
        let messages: Vec<String> = problems
            .iter()
            .map(|p| {
                p.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| p.code.to_string())
            })
            .collect();
        err = err.with_detail(field.to_string(), messages.join(", "));
    }
    if !errors.errors().is_empty() && err.details.as_ref().is_none_or(|d| d.is_empty()) {
        err = err.with_detail("form", errors.to_string());
    }
    err
}

/// Accepts registration submissions
#[derive(Clone)]
pub struct RegistrationService {
    store: DocStore,
}

impl RegistrationService {
    pub fn new(store: DocStore) -> Self {
        Self { store }
    }

    /// Create a pending adult request for the caller; returns the request id
    pub async fn submit_adult(
        &self,
        caller: &CallerIdentity,
        form: AdultRegistrationSubmission,
    ) -> AppResult<String> {
        form.validate().map_err(|e| validation_error(&e))?;

        let who = caller.clone();
        let request_id = self
            .store
            .run_transaction_async(move |tx| {
                ensure_no_pending(tx, RequestType::Adult, &who.uid)?;
                let request = AdultRegistrationRequest {
                    id: new_doc_id(),
                    requested_by: Some(who.uid.clone()),
                    club_id: form.club_id.clone(),
                    club_name: form.club_name.clone(),
                    status: RequestStatus::Pending,
                    applicant: form.applicant.clone(),
                    decision: Decision::default(),
                    created_member_id: None,
                    created_at: now_millis(),
                };
                tx.set(RequestType::Adult.collection(), &request.id, &request)?;
                audit::record(
                    tx,
                    AuditAction::SubmitAdultRegistration,
                    &who,
                    RequestType::Adult.collection(),
                    &request.id,
                    json!({ "clubId": request.club_id }),
                )?;
                Ok(request.id)
            })
            .await?;

        audit::emit_committed(
            AuditAction::SubmitAdultRegistration,
            caller,
            RequestType::Adult.collection(),
            &request_id,
        );
        Ok(request_id)
    }

    /// Create a pending family request for the caller; returns the request id
    pub async fn submit_family(
        &self,
        caller: &CallerIdentity,
        form: FamilyRegistrationSubmission,
    ) -> AppResult<String> {
        form.validate().map_err(|e| validation_error(&e))?;

        let who = caller.clone();
        let request_id = self
            .store
            .run_transaction_async(move |tx| {
                ensure_no_pending(tx, RequestType::Family, &who.uid)?;
                let request = FamilyRegistrationRequest {
                    id: new_doc_id(),
                    requested_by: Some(who.uid.clone()),
                    club_id: form.club_id.clone(),
                    club_name: form.club_name.clone(),
                    status: RequestStatus::Pending,
                    parents: form.parents.clone(),
                    children: form.children.clone(),
                    external_guardian: form.external_guardian.clone(),
                    decision: Decision::default(),
                    created_member_ids: Vec::new(),
                    created_at: now_millis(),
                };
                tx.set(RequestType::Family.collection(), &request.id, &request)?;
                audit::record(
                    tx,
                    AuditAction::SubmitFamilyRegistration,
                    &who,
                    RequestType::Family.collection(),
                    &request.id,
                    json!({
                        "clubId": request.club_id,
                        "parents": request.parents.len(),
                        "children": request.children.len(),
                    }),
                )?;
                Ok(request.id)
            })
            .await?;

        audit::emit_committed(
            AuditAction::SubmitFamilyRegistration,
            caller,
            RequestType::Family.collection(),
            &request_id,
        );
        Ok(request_id)
    }
}

fn ensure_no_pending(tx: &mut Transaction, kind: RequestType, uid: &str) -> AppResult<()> {
    let existing = tx.query(
        &Query::new(kind.collection())
            .where_eq("requestedBy", uid)
            .where_eq("status", RequestStatus::Pending.as_str())
            .limit(1),
    )?;
    if let Some(doc) = existing.first() {
        return Err(AppError::with_message(
            ErrorCode::DuplicatePendingRequest,
            format!("A pending {} registration already exists", kind.as_str()),
        )
        .with_detail("requestId", doc.id.as_str()));
    }
    Ok(())
}
