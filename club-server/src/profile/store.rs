use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use shared::AppResult;
use shared::models::{
    ClubOwnerRequest, MemberRegistrationRequest, RequestStatus, SuperAdminRequest, User,
    collections,
};
use shared::store::{Filter, Query};

use super::ProfileStore;
use crate::db::DocStore;

fn by_email(collection: &str, email: &str) -> Query {
    Query::new(collection).where_eq("email", email)
}

/// Every call hops to the blocking pool: redb reads and the single-writer
/// commit must not run on a runtime worker.
#[async_trait]
impl ProfileStore for DocStore {
    async fn get_user(&self, uid: &str) -> AppResult<Option<User>> {
        let uid = uid.to_string();
        self.blocking(move |store| Ok(store.get_as(collections::USERS, &uid)?))
            .await
    }

    async fn create_user(&self, user: &User) -> AppResult<()> {
        let user = user.clone();
        self.blocking(move |store| Ok(store.set(collections::USERS, &user.uid, &user)?))
            .await
    }

    async fn update_user(&self, uid: &str, patch: Value) -> AppResult<()> {
        let uid = uid.to_string();
        self.blocking(move |store| Ok(store.update(collections::USERS, &uid, patch)?))
            .await
    }

    async fn find_club_owner_request(&self, email: &str) -> AppResult<Option<ClubOwnerRequest>> {
        let query = by_email(collections::CLUB_OWNER_REQUESTS, email)
            .filter(Filter::is_in(
                "status",
                vec![
                    json!(RequestStatus::Pending.as_str()),
                    json!(RequestStatus::Approved.as_str()),
                ],
            ))
            .limit(1);
        first_match(self, query).await
    }

    async fn find_approved_super_admin_request(
        &self,
        email: &str,
    ) -> AppResult<Option<SuperAdminRequest>> {
        let query = by_email(collections::SUPER_ADMIN_REQUESTS, email)
            .where_eq("status", RequestStatus::Approved.as_str())
            .limit(1);
        first_match(self, query).await
    }

    async fn find_approved_member_request(
        &self,
        email: &str,
    ) -> AppResult<Option<MemberRegistrationRequest>> {
        let query = by_email(collections::MEMBER_REGISTRATION_REQUESTS, email)
            .where_eq("status", RequestStatus::Approved.as_str())
            .limit(1);
        first_match(self, query).await
    }

    async fn find_club_id_by_name(&self, club_name: &str) -> AppResult<Option<String>> {
        let query = Query::new(collections::CLUBS)
            .where_eq("name", club_name)
            .limit(1);
        self.blocking(move |store| Ok(store.query(&query)?.into_iter().next().map(|doc| doc.id)))
            .await
    }
}

async fn first_match<T>(store: &DocStore, query: Query) -> AppResult<Option<T>>
where
    T: DeserializeOwned + Send + 'static,
{
    store
        .blocking(move |store| Ok(store.query_as(&query)?.pop()))
        .await
}
