//! Core request records and the partial updates applied to them
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

/// Numeric identifier assigned by the request store. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct User {
    #[n(0)]
    pub id: u64,
    #[n(1)]
    pub display_name: String,
    #[n(2)]
    pub email: String,
    #[n(3)]
    pub department: Option<String>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestStatus {
    #[n(0)]
    Draft,
    #[n(1)]
    Submitted,
    #[n(2)]
    PendingApproval,
    #[n(3)]
    Approved,
    #[n(4)]
    Rejected,
    #[n(5)]
    Completed,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApprovalOutcome {
    #[n(0)]
    Approved,
    #[n(1)]
    Rejected,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    #[n(0)]
    pub file_name: String,
    #[n(1)]
    pub server_relative_url: String,
    #[n(2)]
    pub content_type: String,
    #[n(3)]
    pub length: u64,
    #[n(4)]
    pub digest: String, // sha256 of the stored bytes
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Request {
    #[n(0)]
    pub id: RequestId,
    #[n(1)]
    pub title: String,
    #[n(2)]
    pub request_type: String,
    #[n(3)]
    pub description: String,
    #[n(4)]
    pub department: String,
    #[n(5)]
    pub requestor: User,
    #[n(6)]
    pub manager: Option<User>,
    #[n(7)]
    pub status: RequestStatus,
    #[n(8)]
    pub approval_outcome: Option<ApprovalOutcome>,
    #[n(9)]
    pub approver_comments: Option<String>,
    #[n(10)]
    pub created: TimeStamp<Utc>,
    #[n(11)]
    pub modified: TimeStamp<Utc>,
    #[n(12)]
    pub author: User,
    #[n(13)]
    pub editor: User,
    #[n(14)]
    pub attachments: Vec<Attachment>,
}

/// The fields a caller supplies when creating a request. The store fills in
/// the id, status, parties and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRequest {
    pub title: String,
    pub request_type: String,
    pub description: String,
    pub department: String,
    pub requestor: User,
    pub manager: Option<User>,
}

/// Merge-style update. `None` leaves the stored field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestPatch {
    pub title: Option<String>,
    pub request_type: Option<String>,
    pub description: Option<String>,
    pub department: Option<String>,
    pub manager: Option<User>,
    pub status: Option<RequestStatus>,
    pub approval_outcome: Option<ApprovalOutcome>,
    pub approver_comments: Option<String>,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl<T: TimeZone + Eq> PartialOrd for TimeStamp<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: TimeZone + Eq> Ord for TimeStamp<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        min: u32,
        sec: u32,
    ) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(Into::into)
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 6] = [
        RequestStatus::Draft,
        RequestStatus::Submitted,
        RequestStatus::PendingApproval,
        RequestStatus::Approved,
        RequestStatus::Rejected,
        RequestStatus::Completed,
    ];

    /// Approved, Rejected and Completed have no outgoing transition.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestStatus::Approved | RequestStatus::Rejected | RequestStatus::Completed
        )
    }
}

impl From<ApprovalOutcome> for RequestStatus {
    fn from(outcome: ApprovalOutcome) -> Self {
        match outcome {
            ApprovalOutcome::Approved => RequestStatus::Approved,
            ApprovalOutcome::Rejected => RequestStatus::Rejected,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RequestStatus::Draft => "Draft",
            RequestStatus::Submitted => "Submitted",
            RequestStatus::PendingApproval => "Pending Approval",
            RequestStatus::Approved => "Approved",
            RequestStatus::Rejected => "Rejected",
            RequestStatus::Completed => "Completed",
        };
        f.write_str(label)
    }
}

impl fmt::Display for ApprovalOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalOutcome::Approved => f.write_str("Approved"),
            ApprovalOutcome::Rejected => f.write_str("Rejected"),
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Request {
    /// An outcome is recorded exactly when the request carries a decision.
    pub fn outcome_is_consistent(&self) -> bool {
        match (self.status, self.approval_outcome) {
            (RequestStatus::Approved, Some(ApprovalOutcome::Approved)) => true,
            (RequestStatus::Rejected, Some(ApprovalOutcome::Rejected)) => true,
            (RequestStatus::Approved | RequestStatus::Rejected, _) => false,
            (_, outcome) => outcome.is_none(),
        }
    }

    /// Merge a patch into the record. Identity, author and creation time are
    /// never touched; stores stamp `editor` and `modified` themselves.
    pub fn apply_patch(&mut self, patch: &RequestPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(request_type) = &patch.request_type {
            self.request_type = request_type.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(department) = &patch.department {
            self.department = department.clone();
        }
        if let Some(manager) = &patch.manager {
            self.manager = Some(manager.clone());
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(outcome) = patch.approval_outcome {
            self.approval_outcome = Some(outcome);
        }
        if let Some(comments) = &patch.approver_comments {
            self.approver_comments = Some(comments.clone());
        }
    }
}

impl User {
    pub fn new(id: u64, display_name: &str, email: &str) -> Self {
        Self {
            id,
            display_name: display_name.to_string(),
            email: email.to_string(),
            department: None,
        }
    }
    pub fn with_department(mut self, department: &str) -> Self {
        self.department = Some(department.to_string());
        self
    }
}

impl RequestPatch {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }
    pub fn set_request_type(mut self, request_type: &str) -> Self {
        self.request_type = Some(request_type.to_string());
        self
    }
    pub fn set_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
    pub fn set_department(mut self, department: &str) -> Self {
        self.department = Some(department.to_string());
        self
    }
    pub fn set_manager(mut self, manager: User) -> Self {
        self.manager = Some(manager);
        self
    }
    /// True when the patch touches `status`, `approval_outcome` or
    /// `approver_comments`.
    pub fn touches_lifecycle(&self) -> bool {
        self.status.is_some() || self.approval_outcome.is_some() || self.approver_comments.is_some()
    }
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl<C> minicbor::Encode<C> for RequestId {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.u64(self.0)?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for RequestId {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        Ok(RequestId(d.u64()?))
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}
