//! Client-side narrowing of an already fetched request list
use super::request::{Request, RequestStatus};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Conjunctive query descriptor. Absent fields impose no constraint; an
/// empty status set is the same as no status set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFilters {
    pub status: Vec<RequestStatus>,
    pub department: Option<String>,
    pub request_type: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

/// Distinct values used to populate filter options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Facets {
    pub departments: Vec<String>,
    pub request_types: Vec<String>,
}

impl RequestFilters {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_status(mut self, status: &[RequestStatus]) -> Self {
        self.status = status.to_vec();
        self
    }
    pub fn set_department(mut self, department: &str) -> Self {
        self.department = Some(department.to_string());
        self
    }
    pub fn set_request_type(mut self, request_type: &str) -> Self {
        self.request_type = Some(request_type.to_string());
        self
    }
    pub fn set_date_from(mut self, from: DateTime<Utc>) -> Self {
        self.date_from = Some(from);
        self
    }
    pub fn set_date_to(mut self, to: DateTime<Utc>) -> Self {
        self.date_to = Some(to);
        self
    }
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, request: &Request) -> bool {
        if !self.status.is_empty() && !self.status.contains(&request.status) {
            return false;
        }
        if self
            .department
            .as_ref()
            .is_some_and(|department| request.department != *department)
        {
            return false;
        }
        if self
            .request_type
            .as_ref()
            .is_some_and(|request_type| request.request_type != *request_type)
        {
            return false;
        }

        let created = request.created.to_datetime_utc();
        if self.date_from.is_some_and(|from| created < from) {
            return false;
        }
        if self.date_to.is_some_and(|to| created > to) {
            return false;
        }

        true
    }
}

/// Keep the requests matching every provided filter, in input order.
pub fn apply_filters(requests: &[Request], filters: &RequestFilters) -> Vec<Request> {
    requests
        .iter()
        .filter(|request| filters.matches(request))
        .cloned()
        .collect()
}

pub fn derive_facets(requests: &[Request]) -> Facets {
    let departments: BTreeSet<&str> = requests.iter().map(|r| r.department.as_str()).collect();
    let request_types: BTreeSet<&str> = requests.iter().map(|r| r.request_type.as_str()).collect();

    Facets {
        departments: departments.into_iter().map(String::from).collect(),
        request_types: request_types.into_iter().map(String::from).collect(),
    }
}
