#![allow(dead_code)]

use club_server::DocStore;
use shared::models::{
    Applicant, CallerIdentity, ChildApplicant, Decision, ExternalGuardian,
    FamilyRegistrationRequest, Member, MemberCategory, MemberRegistrationRequest, MemberType,
    RequestStatus, User, UserRole, UserStatus, collections,
};

pub fn store() -> DocStore {
    DocStore::open_in_memory().expect("in-memory store")
}

pub fn staff(club_id: &str) -> CallerIdentity {
    CallerIdentity::new("staff-1", UserRole::ClubManager, Some(club_id))
}

pub fn admin() -> CallerIdentity {
    CallerIdentity::new("admin-1", UserRole::SuperAdmin, None)
}

pub fn member_caller(uid: &str) -> CallerIdentity {
    CallerIdentity::new(uid, UserRole::Member, None)
}

pub fn user(uid: &str, status: UserStatus) -> User {
    User {
        uid: uid.into(),
        email: format!("{uid}@example.com"),
        display_name: uid.into(),
        role: UserRole::Member,
        status,
        club_id: None,
        club_name: None,
        linked_member_id: None,
        phone_number: None,
        photo_url: None,
        provider: Some("email".into()),
        created_at: 1,
        updated_at: 1,
        profile_error: false,
    }
}

pub fn seed_user(store: &DocStore, uid: &str, status: UserStatus) -> User {
    let user = user(uid, status);
    store.set(collections::USERS, uid, &user).expect("seed user");
    user
}

pub fn seed_member(store: &DocStore, id: &str, club_id: &str) -> Member {
    let member = Member::new(id, id, club_id, MemberCategory::Adult, MemberType::Individual, 1);
    store.set(collections::MEMBERS, id, &member).expect("seed member");
    member
}

pub fn applicant(name: &str, phone: Option<&str>) -> Applicant {
    Applicant {
        name: name.into(),
        birth_date: Some("1985-04-02".into()),
        gender: None,
        phone_number: phone.map(str::to_string),
        email: None,
    }
}

pub fn child(name: &str) -> ChildApplicant {
    ChildApplicant {
        name: name.into(),
        birth_date: Some("2016-09-12".into()),
        gender: None,
        grade: Some("2".into()),
    }
}

/// Family request written straight to the store, bypassing form validation
pub fn seed_family(
    store: &DocStore,
    id: &str,
    club_id: &str,
    requested_by: Option<&str>,
    parents: Vec<Applicant>,
    children: Vec<ChildApplicant>,
    external_guardian: Option<ExternalGuardian>,
) -> FamilyRegistrationRequest {
    let request = FamilyRegistrationRequest {
        id: id.into(),
        requested_by: requested_by.map(str::to_string),
        club_id: club_id.into(),
        club_name: Some(format!("Club {club_id}")),
        status: RequestStatus::Pending,
        parents,
        children,
        external_guardian,
        decision: Decision::default(),
        created_member_ids: Vec::new(),
        created_at: 1,
    };
    store
        .set(collections::FAMILY_REGISTRATION_REQUESTS, id, &request)
        .expect("seed family request");
    request
}

/// General member request naming its account only by email
pub fn seed_member_request(
    store: &DocStore,
    id: &str,
    club_id: &str,
    email: &str,
) -> MemberRegistrationRequest {
    let request = MemberRegistrationRequest {
        id: id.into(),
        user_id: None,
        requested_by: None,
        email: Some(email.into()),
        name: "Park Jisoo".into(),
        date_of_birth: Some("1990-01-20".into()),
        gender: None,
        phone_number: Some("010-3333-4444".into()),
        club_id: club_id.into(),
        club_name: Some(format!("Club {club_id}")),
        member_type: None,
        family_role: None,
        status: RequestStatus::Pending,
        decision: Decision::default(),
        created_member_id: None,
        created_at: 1,
    };
    store
        .set(collections::MEMBER_REGISTRATION_REQUESTS, id, &request)
        .expect("seed member request");
    request
}

pub fn get_user(store: &DocStore, uid: &str) -> User {
    store
        .get_as(collections::USERS, uid)
        .expect("read user")
        .expect("user exists")
}

pub fn get_member(store: &DocStore, id: &str) -> Member {
    store
        .get_as(collections::MEMBERS, id)
        .expect("read member")
        .expect("member exists")
}
