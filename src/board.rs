//! Non-visual state behind the department and HR admin request grids
use super::error::RequestError;
use super::filter::{Facets, RequestFilters, apply_filters, derive_facets};
use super::gateway::{Directory, RequestStore};
use super::lifecycle::Decision;
use super::permissions::Actor;
use super::request::{Request, RequestId};
use super::service::{BulkReport, RequestService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardKind {
    /// Requests of the actor's own department. Admins see every request.
    Department,
    /// Every request. Empty for non-admins.
    HrAdmin,
}

/// A fetched snapshot plus the filters narrowing it. The snapshot is only
/// replaced by `reload`, which every write goes through.
#[derive(Debug, Clone)]
pub struct RequestBoard {
    kind: BoardKind,
    actor: Actor,
    snapshot: Vec<Request>,
    filters: RequestFilters,
}

impl RequestBoard {
    pub fn load<S: RequestStore, D: Directory>(
        service: &RequestService<S, D>,
        actor: Actor,
        kind: BoardKind,
    ) -> Result<Self, RequestError> {
        let mut board = Self {
            kind,
            actor,
            snapshot: vec![],
            filters: RequestFilters::new(),
        };
        board.reload(service)?;
        Ok(board)
    }

    pub fn reload<S: RequestStore, D: Directory>(
        &mut self,
        service: &RequestService<S, D>,
    ) -> Result<(), RequestError> {
        // load_requests pins non-admins to their own department
        self.snapshot = match self.kind {
            BoardKind::HrAdmin if !self.actor.is_hr_admin => vec![],
            BoardKind::HrAdmin | BoardKind::Department => {
                service.load_requests(&self.actor, &RequestFilters::new())?
            }
        };
        Ok(())
    }

    pub fn kind(&self) -> BoardKind {
        self.kind
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn snapshot(&self) -> &[Request] {
        &self.snapshot
    }

    pub fn filters(&self) -> &RequestFilters {
        &self.filters
    }

    pub fn set_filters(&mut self, filters: RequestFilters) {
        self.filters = filters;
    }

    pub fn clear_filters(&mut self) {
        self.filters = RequestFilters::new();
    }

    pub fn visible(&self) -> Vec<Request> {
        apply_filters(&self.snapshot, &self.filters)
    }

    pub fn facets(&self) -> Facets {
        derive_facets(&self.snapshot)
    }

    pub fn selection_summary(&self) -> String {
        format!(
            "Showing {} of {} requests",
            self.visible().len(),
            self.snapshot.len()
        )
    }

    pub fn decide<S: RequestStore, D: Directory>(
        &mut self,
        service: &RequestService<S, D>,
        id: RequestId,
        decision: &Decision,
    ) -> Result<Request, RequestError> {
        let decided = service.decide(&self.actor, id, decision)?;
        self.reload(service)?;
        Ok(decided)
    }

    pub fn bulk_decide<S: RequestStore, D: Directory>(
        &mut self,
        service: &RequestService<S, D>,
        ids: &[RequestId],
        decision: &Decision,
    ) -> Result<BulkReport, RequestError> {
        let report = service.bulk_decide(&self.actor, ids, decision)?;
        self.reload(service)?;
        Ok(report)
    }
}
