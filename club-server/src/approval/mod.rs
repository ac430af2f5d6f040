//! Approval and linking protocol
//!
//! Each operation runs as one store transaction. Guards (existence, pending
//! state, club scope) execute inside the transaction body, so a concurrent
//! commit that changes what a guard saw forces the body to re-run and the
//! guard to fail instead of double-applying. Bodies only read and write the
//! store; the audit tracing event is emitted after commit.
//!
//! | Operation | Result |
//! |-----------|--------|
//! | [`ApprovalService::approve_adult`] | [`AdultApproval`] |
//! | [`ApprovalService::approve_family`] | [`FamilyApproval`] |
//! | [`ApprovalService::approve_member`] | [`AdultApproval`] |
//! | [`ApprovalService::link_user_to_member`] | [`LinkResult`] |
//! | [`ApprovalService::unlink_user_from_member`] | [`LinkResult`] |
//! | [`ApprovalService::reject`] | [`RejectResult`] |

mod adult;
mod family;
pub mod guard;
mod link;
mod member;
mod reject;

pub use link::{LinkStatus, link_status};

use serde::{Deserialize, Serialize};
use shared::models::RequestType;

use crate::db::DocStore;

/// Result of an adult or general member approval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdultApproval {
    pub member_id: String,
    /// Requester account that was activated and linked, if any
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyApproval {
    pub parent_member_ids: Vec<String>,
    pub child_member_ids: Vec<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkResult {
    pub user_id: String,
    pub member_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectResult {
    pub request_id: String,
    #[serde(rename = "type")]
    pub request_type: RequestType,
}

/// Entry point for the protocol mutations
#[derive(Clone)]
pub struct ApprovalService {
    store: DocStore,
}

impl ApprovalService {
    pub fn new(store: DocStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &DocStore {
        &self.store
    }
}
