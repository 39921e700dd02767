//! Who may view, edit, approve or delete a request
use super::filter::RequestFilters;
use super::request::{Request, User};

/// The identity performing an operation, with department and admin-group
/// membership already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user: User,
    pub is_hr_admin: bool,
}

/// Derived per (request, actor). Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserPermissions {
    pub can_edit: bool,
    // reported for callers; this crate has no delete operation
    pub can_delete: bool,
    pub can_approve: bool,
    pub can_view: bool,
    pub is_owner: bool,
    pub is_hr_admin: bool,
}

/// Which slice of the request list an actor may retrieve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalScope {
    Unrestricted,
    Department(String),
    // non-admin with no known department
    Nothing,
}

impl Actor {
    pub fn new(user: User, is_hr_admin: bool) -> Self {
        Self { user, is_hr_admin }
    }
    pub fn email(&self) -> &str {
        &self.user.email
    }
    pub fn department(&self) -> Option<&str> {
        self.user.department.as_deref()
    }
    // approval does not depend on the request
    pub fn can_approve(&self) -> bool {
        self.is_hr_admin
    }
    pub fn permissions_for(&self, request: &Request) -> UserPermissions {
        compute_permissions(request, &self.user, self.is_hr_admin)
    }
}

// Owner match is exact, case included.
pub fn compute_permissions(request: &Request, actor: &User, actor_is_hr_admin: bool) -> UserPermissions {
    let is_owner = request.author.email == actor.email;
    let same_department = actor.department.as_deref() == Some(request.department.as_str());

    UserPermissions {
        can_edit: actor_is_hr_admin || (is_owner && !request.status.is_terminal()),
        can_delete: actor_is_hr_admin,
        can_approve: actor_is_hr_admin,
        can_view: actor_is_hr_admin || is_owner || same_department,
        is_owner,
        is_hr_admin: actor_is_hr_admin,
    }
}

pub fn retrieval_scope(actor: &Actor) -> RetrievalScope {
    if actor.is_hr_admin {
        return RetrievalScope::Unrestricted;
    }
    match actor.department() {
        Some(department) if !department.is_empty() => {
            RetrievalScope::Department(department.to_string())
        }
        _ => RetrievalScope::Nothing,
    }
}

/// Narrow a caller's filters to what the actor may retrieve. Returns `None`
/// when the actor may retrieve nothing at all.
///
/// A non-admin's department always wins over any department the caller asked
/// for; asking for another department yields an empty result rather than a
/// widened one.
pub fn scoped_filters(actor: &Actor, filters: &RequestFilters) -> Option<RequestFilters> {
    match retrieval_scope(actor) {
        RetrievalScope::Unrestricted => Some(filters.clone()),
        RetrievalScope::Department(department) => match filters.department.as_deref() {
            Some(requested) if requested != department => None,
            _ => Some(filters.clone().set_department(&department)),
        },
        RetrievalScope::Nothing => None,
    }
}
