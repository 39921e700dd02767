use crate::request::{RequestId, RequestStatus};
use std::fmt;

/// Every violated form or file constraint, in the order they were checked.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("request failed validation: {}", .errors.join("; "))]
pub struct ValidationError {
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    Edit,
    Approve,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{actor} is not permitted to {action} {}", describe_target(.request))]
pub struct AuthorizationError {
    pub actor: String,
    pub action: Action,
    pub request: Option<RequestId>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Request cannot move from {from} to {to}")]
    NotAllowed {
        from: RequestStatus,
        to: RequestStatus,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("Request {0} was not found")]
    NotFound(RequestId),
    #[error("Stored attachment {file_name} does not match its digest")]
    Integrity { file_name: String },
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(thiserror::Error, Debug)]
pub enum RequestError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Unauthorized(#[from] AuthorizationError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Action::View => "view",
            Action::Edit => "edit",
            Action::Approve => "approve",
        };
        f.write_str(verb)
    }
}

fn describe_target(request: &Option<RequestId>) -> String {
    match request {
        Some(id) => format!("request {id}"),
        None => "requests".to_string(),
    }
}

impl ValidationError {
    pub fn new(errors: Vec<String>) -> Self {
        Self { errors }
    }
}

impl AuthorizationError {
    pub fn new(actor: &str, action: Action, request: Option<RequestId>) -> Self {
        Self {
            actor: actor.to_string(),
            action,
            request,
        }
    }
}
