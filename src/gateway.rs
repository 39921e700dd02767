//! Collaborator contracts for request storage and directory lookups
//!
//! Both are opaque boundaries: implementations own transport, retries and
//! timeouts. The core only relies on the behavior documented here.
use super::error::GatewayError;
use super::filter::RequestFilters;
use super::request::{NewRequest, Request, RequestId, RequestPatch, User};

pub trait RequestStore {
    /// Persist a new request in the `Submitted` state and return it with its
    /// assigned id and timestamps.
    fn create_request(&self, new_request: &NewRequest) -> Result<Request, GatewayError>;

    /// Matching requests, newest created first, at most `limit` of them.
    fn get_requests(
        &self,
        filters: Option<&RequestFilters>,
        limit: Option<usize>,
    ) -> Result<Vec<Request>, GatewayError>;

    fn get_request_by_id(&self, id: RequestId) -> Result<Request, GatewayError>;

    /// Merge `patch` into the stored request.
    fn update_request(&self, id: RequestId, patch: &RequestPatch) -> Result<(), GatewayError>;

    fn upload_attachment(
        &self,
        id: RequestId,
        file_name: &str,
        content: &[u8],
    ) -> Result<(), GatewayError>;

    fn current_user(&self) -> Result<User, GatewayError>;

    fn is_current_user_in_admin_group(&self) -> Result<bool, GatewayError>;
}

pub trait Directory {
    /// Empty when the directory has no department for the current user.
    fn current_user_department(&self) -> Result<String, GatewayError>;

    /// Sorted and deduplicated.
    fn all_departments(&self) -> Result<Vec<String>, GatewayError>;

    /// Bounded number of users whose name or email starts with `term`.
    fn search_users(&self, term: &str, department: Option<&str>) -> Result<Vec<User>, GatewayError>;
}
