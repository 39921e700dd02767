//! Service layer API for request workflow operations
use super::config::ServiceConfig;
use super::error::{Action, AuthorizationError, RequestError, ValidationError};
use super::filter::RequestFilters;
use super::gateway::{Directory, RequestStore};
use super::lifecycle::{self, Decision};
use super::permissions::{Actor, UserPermissions, scoped_filters};
use super::request::{NewRequest, Request, RequestId, RequestPatch, User};
use super::utils;
use super::validation::{RequestDraft, validate_patch, validate_request_form, validate_single_file};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Orchestrates one session's requests against injected collaborators.
pub struct RequestService<S, D> {
    store: Arc<S>,
    directory: Arc<D>,
    config: ServiceConfig,
}

#[derive(Debug)]
pub struct BulkFailure {
    pub id: RequestId,
    pub error: RequestError,
}

/// Per-item result of a bulk decision, each list in input order.
#[derive(Debug, Default)]
pub struct BulkReport {
    pub succeeded: Vec<RequestId>,
    pub failed: Vec<BulkFailure>,
}

impl BulkReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
    pub fn failed_ids(&self) -> Vec<RequestId> {
        self.failed.iter().map(|f| f.id).collect()
    }
}

impl<S: RequestStore, D: Directory> RequestService<S, D> {
    pub fn new(store: Arc<S>, directory: Arc<D>, config: ServiceConfig) -> Self {
        Self {
            store,
            directory,
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn request_type_options(&self) -> &[String] {
        &self.config.request_types
    }

    pub fn departments(&self) -> Result<Vec<String>, RequestError> {
        Ok(self.directory.all_departments()?)
    }

    pub fn search_users(&self, term: &str, department: Option<&str>) -> Result<Vec<User>, RequestError> {
        Ok(self.directory.search_users(term, department)?)
    }

    /// Who is acting, with the directory's department and admin-group
    /// membership folded in. Lookup failures fall back to the profile
    /// department and to non-admin.
    pub fn resolve_actor(&self) -> Result<Actor, RequestError> {
        let mut user = self.store.current_user()?;

        match self.directory.current_user_department() {
            Ok(department) if !department.is_empty() => user.department = Some(department),
            Ok(_) => {}
            Err(e) => warn!(
                error = %e,
                email = %user.email,
                "Department lookup failed, using profile department"
            ),
        }

        let is_hr_admin = self.store.is_current_user_in_admin_group().unwrap_or_else(|e| {
            warn!(
                error = %e,
                email = %user.email,
                group = %self.config.admin_group,
                "Admin group lookup failed, treating user as non-admin"
            );
            false
        });

        Ok(Actor::new(user, is_hr_admin))
    }

    /// A blank form with the actor's department filled in.
    pub fn new_draft(&self, actor: &Actor) -> RequestDraft {
        RequestDraft::new().set_department(actor.department().unwrap_or_default())
    }

    pub fn permissions(&self, actor: &Actor, request: &Request) -> UserPermissions {
        actor.permissions_for(request)
    }

    /// Validate, create in `Submitted`, upload the single attachment, and
    /// return the persisted request.
    pub fn submit_request(&self, actor: &Actor, draft: RequestDraft) -> Result<Request, RequestError> {
        let mut errors = validate_request_form(&draft).errors;
        if let Some(file) = &draft.attachment {
            errors.extend(validate_single_file(Some(file), self.config.max_file_size_mb));
        }
        if !errors.is_empty() {
            return Err(ValidationError::new(errors).into());
        }
        let file = draft.attachment.ok_or_else(|| {
            ValidationError::new(vec!["Exactly one attachment is required".to_string()])
        })?;

        let created = self.store.create_request(&NewRequest {
            title: draft.title,
            request_type: draft.request_type,
            description: draft.description,
            department: draft.department,
            requestor: actor.user.clone(),
            manager: draft.manager,
        })?;
        self.store
            .upload_attachment(created.id, &file.name, &file.content)?;

        info!(
            request_id = %created.id,
            department = %created.department,
            request_type = %created.request_type,
            "Request submitted"
        );

        Ok(self.store.get_request_by_id(created.id)?)
    }

    /// Requests the actor may see, narrowed by `filters`. Non-admins only
    /// ever get their own department.
    pub fn load_requests(
        &self,
        actor: &Actor,
        filters: &RequestFilters,
    ) -> Result<Vec<Request>, RequestError> {
        let Some(scoped) = scoped_filters(actor, filters) else {
            debug!(email = %actor.email(), "Actor has no retrievable requests");
            return Ok(vec![]);
        };
        debug!(
            email = %actor.email(),
            department = ?scoped.department,
            "Loading requests"
        );

        Ok(self
            .store
            .get_requests(Some(&scoped), Some(self.config.items_per_page))?)
    }

    pub fn get_request(&self, actor: &Actor, id: RequestId) -> Result<Request, RequestError> {
        let request = self.store.get_request_by_id(id)?;
        if !actor.permissions_for(&request).can_view {
            return Err(AuthorizationError::new(actor.email(), Action::View, Some(id)).into());
        }
        Ok(request)
    }

    /// Change descriptive fields. Lifecycle fields are refused here.
    pub fn edit_request(
        &self,
        actor: &Actor,
        id: RequestId,
        patch: &RequestPatch,
    ) -> Result<Request, RequestError> {
        let request = self.store.get_request_by_id(id)?;
        if !actor.permissions_for(&request).can_edit {
            return Err(AuthorizationError::new(actor.email(), Action::Edit, Some(id)).into());
        }
        let result = validate_patch(patch);
        if !result.is_valid {
            return Err(ValidationError::new(result.errors).into());
        }
        if patch.is_empty() {
            return Ok(request);
        }

        self.store.update_request(id, patch)?;
        Ok(self.store.get_request_by_id(id)?)
    }

    pub fn submit_draft(&self, actor: &Actor, id: RequestId) -> Result<Request, RequestError> {
        let request = self.store.get_request_by_id(id)?;
        let patch = lifecycle::submit(&request, actor.email(), &actor.permissions_for(&request))?;

        self.store.update_request(id, &patch)?;
        info!(request_id = %id, "Draft submitted");

        Ok(self.store.get_request_by_id(id)?)
    }

    pub fn decide(
        &self,
        actor: &Actor,
        id: RequestId,
        decision: &Decision,
    ) -> Result<Request, RequestError> {
        self.apply_decision(actor, id, decision)?;
        Ok(self.store.get_request_by_id(id)?)
    }

    // Authorize, transition and persist. Once this returns Ok the decision
    // is stored, whatever happens to a later read.
    fn apply_decision(
        &self,
        actor: &Actor,
        id: RequestId,
        decision: &Decision,
    ) -> Result<(), RequestError> {
        let request = self.store.get_request_by_id(id)?;
        let patch = lifecycle::decide(
            &request,
            decision,
            actor.email(),
            &actor.permissions_for(&request),
        )?;

        self.store.update_request(id, &patch)?;
        info!(
            request_id = %id,
            outcome = %decision.outcome,
            approver = %actor.email(),
            "Request decided"
        );
        Ok(())
    }

    /// Apply one decision to every id independently. A failed item is
    /// reported and never stops or undoes the others. Items are not re-read;
    /// callers reload their snapshot afterwards.
    pub fn bulk_decide(
        &self,
        actor: &Actor,
        ids: &[RequestId],
        decision: &Decision,
    ) -> Result<BulkReport, RequestError> {
        if !actor.can_approve() {
            return Err(AuthorizationError::new(actor.email(), Action::Approve, None).into());
        }
        let batch_id =
            utils::new_uuid_to_bech32("batch_").unwrap_or_else(|_| "batch_unassigned".to_string());

        let mut report = BulkReport::default();
        for &id in ids {
            match self.apply_decision(actor, id, decision) {
                Ok(()) => report.succeeded.push(id),
                Err(e) => {
                    error!(
                        batch_id = %batch_id,
                        request_id = %id,
                        error = %e,
                        "Bulk decision item failed"
                    );
                    report.failed.push(BulkFailure { id, error: e });
                }
            }
        }

        info!(
            batch_id = %batch_id,
            outcome = %decision.outcome,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Bulk decision finished"
        );

        Ok(report)
    }
}
