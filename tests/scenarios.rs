use anyhow::Context;
use hr_requests::{
    board::{BoardKind, RequestBoard},
    config::ServiceConfig,
    directory::StaticDirectory,
    error::{Action, GatewayError, RequestError, TransitionError},
    filter::RequestFilters,
    gateway::{Directory, RequestStore},
    lifecycle::Decision,
    permissions::Actor,
    request::{
        ApprovalOutcome, NewRequest, Request, RequestId, RequestPatch, RequestStatus, User,
    },
    service::RequestService,
    store::SledRequestStore,
    validation::{FileUpload, RequestDraft},
};
use std::sync::Arc;

use tempfile::tempdir; // Use for test db cleanup.

type Service<S = SledRequestStore, D = StaticDirectory> = RequestService<S, D>;

fn ada() -> User {
    User::new(1, "Ada Lovelace", "ada@contoso.com").with_department("Engineering")
}

fn grace() -> User {
    User::new(2, "Grace Hopper", "grace@contoso.com").with_department("Engineering")
}

fn bob() -> User {
    User::new(3, "Bob Marley", "bob@contoso.com").with_department("Finance")
}

fn hana() -> User {
    User::new(4, "Hana Ito", "hana@contoso.com").with_department("Human Resources")
}

fn drifter() -> User {
    User::new(5, "Dee Rifter", "dee@contoso.com")
}

fn roster() -> StaticDirectory {
    StaticDirectory::new(vec![ada(), grace(), bob(), hana(), drifter()], "", 50)
}

fn laptop_draft(title: &str, department: &str) -> RequestDraft {
    RequestDraft::new()
        .set_title(title)
        .set_request_type("Equipment")
        .set_description("Replacement for a failing laptop")
        .set_department(department)
        .set_attachment(FileUpload::new(
            "quote.pdf",
            "application/pdf",
            b"%PDF-1.7 quote".to_vec(),
        ))
}

/// A fresh database in a temp dir with Hana registered as an HR admin.
fn open_store(dir: &tempfile::TempDir) -> anyhow::Result<SledRequestStore> {
    let db = sled::open(dir.path().join("requests.db"))?;
    let store = SledRequestStore::open(Arc::new(db), &ServiceConfig::default(), ada())?;
    store.add_group_member("HR Admins", &hana().email)?;
    Ok(store)
}

fn session(
    store: &SledRequestStore,
    directory: &StaticDirectory,
    user: User,
) -> anyhow::Result<(Service, Actor)> {
    let email = user.email.clone();
    let service = RequestService::new(
        Arc::new(store.for_user(user)),
        Arc::new(directory.for_user(&email)),
        ServiceConfig::default(),
    );
    let actor = service.resolve_actor()?;
    Ok((service, actor))
}

#[test]
fn submit_and_approve_request() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let store = open_store(&temp_dir)?;
    let directory = roster();

    let (service, ada_actor) = session(&store, &directory, ada())?;
    assert!(!ada_actor.is_hr_admin);

    let draft = service.new_draft(&ada_actor);
    assert_eq!(draft.department, "Engineering");

    let submitted = service
        .submit_request(&ada_actor, laptop_draft("Laptop request", "Engineering"))
        .context("Request failed on submit: ")?;
    assert_eq!(submitted.status, RequestStatus::Submitted);
    assert_eq!(submitted.author.email, "ada@contoso.com");
    assert_eq!(submitted.attachments.len(), 1);
    assert_eq!(
        submitted.attachments[0].server_relative_url,
        format!("/Lists/HR%20Requests/Attachments/{}/quote.pdf", submitted.id)
    );
    assert_eq!(
        store.read_attachment(&submitted.attachments[0])?,
        b"%PDF-1.7 quote"
    );

    let (service, hana_actor) = session(&store, &directory, hana())?;
    assert!(hana_actor.is_hr_admin);

    let decided = service
        .decide(
            &hana_actor,
            submitted.id,
            &Decision::approve().with_comments("Budget confirmed"),
        )
        .context("Request failed on approval: ")?;

    assert_eq!(decided.status, RequestStatus::Approved);
    assert_eq!(decided.approval_outcome, Some(ApprovalOutcome::Approved));
    assert_eq!(decided.approver_comments.as_deref(), Some("Budget confirmed"));
    assert_eq!(decided.editor.email, "hana@contoso.com");
    assert_eq!(decided.author.email, "ada@contoso.com");
    assert!(decided.outcome_is_consistent());

    Ok(())
}

#[test]
fn rejection_without_comments_records_empty_comments() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let store = open_store(&temp_dir)?;
    let directory = roster();

    let (service, ada_actor) = session(&store, &directory, ada())?;
    let submitted = service.submit_request(&ada_actor, laptop_draft("Desk", "Engineering"))?;

    let (service, hana_actor) = session(&store, &directory, hana())?;
    let decided = service.decide(&hana_actor, submitted.id, &Decision::reject())?;

    assert_eq!(decided.status, RequestStatus::Rejected);
    assert_eq!(decided.approval_outcome, Some(ApprovalOutcome::Rejected));
    assert_eq!(decided.approver_comments.as_deref(), Some(""));

    // decided requests are final
    let err = service
        .decide(&hana_actor, submitted.id, &Decision::approve())
        .unwrap_err();
    assert!(matches!(
        err,
        RequestError::Transition(TransitionError::NotAllowed {
            from: RequestStatus::Rejected,
            to: RequestStatus::Approved,
        })
    ));

    Ok(())
}

#[test]
fn invalid_submission_writes_nothing() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let store = open_store(&temp_dir)?;
    let (service, ada_actor) = session(&store, &roster(), ada())?;

    let oversized = FileUpload::new("scan.pdf", "application/pdf", vec![0u8; 15 * 1024 * 1024]);
    let draft = laptop_draft("", "Engineering").set_attachment(oversized);

    let err = service.submit_request(&ada_actor, draft).unwrap_err();
    let RequestError::Invalid(validation) = err else {
        panic!("expected a validation error");
    };
    assert_eq!(
        validation.errors,
        vec![
            "Title is required".to_string(),
            "File size must be 10MB or less".to_string(),
        ]
    );

    let missing_file = RequestDraft::new()
        .set_title("Desk")
        .set_request_type("Facilities")
        .set_description("Standing desk")
        .set_department("Engineering");
    let err = service.submit_request(&ada_actor, missing_file).unwrap_err();
    assert!(matches!(err, RequestError::Invalid(_)));

    assert!(store.get_requests(None, None)?.is_empty());
    Ok(())
}

#[test]
fn retrieval_is_scoped_to_department() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let store = open_store(&temp_dir)?;
    let directory = roster();

    let (service, ada_actor) = session(&store, &directory, ada())?;
    let engineering = service.submit_request(&ada_actor, laptop_draft("Laptop", "Engineering"))?;

    let (service, bob_actor) = session(&store, &directory, bob())?;
    let finance = service.submit_request(&bob_actor, laptop_draft("Calculator", "Finance"))?;

    // grace sees her department's requests, including ada's
    let (service, grace_actor) = session(&store, &directory, grace())?;
    let seen = service.load_requests(&grace_actor, &RequestFilters::new())?;
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].id, engineering.id);
    assert!(service.get_request(&grace_actor, engineering.id).is_ok());

    // asking for another department never widens the scope
    let widened = service.load_requests(
        &grace_actor,
        &RequestFilters::new().set_department("Finance"),
    )?;
    assert!(widened.is_empty());

    let err = service.get_request(&grace_actor, finance.id).unwrap_err();
    assert!(matches!(
        err,
        RequestError::Unauthorized(ref e) if e.action == Action::View
    ));

    // no department, no requests
    let (service, dee_actor) = session(&store, &directory, drifter())?;
    assert!(dee_actor.department().is_none());
    assert!(service.load_requests(&dee_actor, &RequestFilters::new())?.is_empty());

    let (service, hana_actor) = session(&store, &directory, hana())?;
    let everything = service.load_requests(&hana_actor, &RequestFilters::new())?;
    assert_eq!(everything.len(), 2);
    // newest first
    assert_eq!(everything[0].id, finance.id);

    let finance_only = service.load_requests(
        &hana_actor,
        &RequestFilters::new().set_department("Finance"),
    )?;
    assert_eq!(finance_only.len(), 1);

    Ok(())
}

#[test]
fn non_admin_cannot_decide() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let store = open_store(&temp_dir)?;
    let (service, ada_actor) = session(&store, &roster(), ada())?;

    let submitted = service.submit_request(&ada_actor, laptop_draft("Laptop", "Engineering"))?;

    let err = service
        .decide(&ada_actor, submitted.id, &Decision::approve())
        .unwrap_err();
    assert!(matches!(
        err,
        RequestError::Unauthorized(ref e) if e.action == Action::Approve
    ));

    let err = service
        .bulk_decide(&ada_actor, &[submitted.id], &Decision::approve())
        .unwrap_err();
    assert!(matches!(err, RequestError::Unauthorized(_)));

    let unchanged = service.get_request(&ada_actor, submitted.id)?;
    assert_eq!(unchanged.status, RequestStatus::Submitted);
    assert_eq!(unchanged.approval_outcome, None);

    Ok(())
}

#[test]
fn owner_edits_until_decided() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let store = open_store(&temp_dir)?;
    let directory = roster();

    let (ada_service, ada_actor) = session(&store, &directory, ada())?;
    let submitted =
        ada_service.submit_request(&ada_actor, laptop_draft("Laptop", "Engineering"))?;

    let edited = ada_service.edit_request(
        &ada_actor,
        submitted.id,
        &RequestPatch::new().set_title("Laptop and dock"),
    )?;
    assert_eq!(edited.title, "Laptop and dock");

    let sneaky = RequestPatch {
        status: Some(RequestStatus::Approved),
        ..RequestPatch::new()
    };
    let err = ada_service
        .edit_request(&ada_actor, submitted.id, &sneaky)
        .unwrap_err();
    assert!(matches!(err, RequestError::Invalid(_)));

    // same department, not the owner
    let (grace_service, grace_actor) = session(&store, &directory, grace())?;
    let err = grace_service
        .edit_request(&grace_actor, submitted.id, &RequestPatch::new().set_title("Mine"))
        .unwrap_err();
    assert!(matches!(
        err,
        RequestError::Unauthorized(ref e) if e.action == Action::Edit
    ));

    let (hana_service, hana_actor) = session(&store, &directory, hana())?;
    hana_service.decide(&hana_actor, submitted.id, &Decision::approve())?;

    let err = ada_service
        .edit_request(&ada_actor, submitted.id, &RequestPatch::new().set_title("Late"))
        .unwrap_err();
    assert!(matches!(err, RequestError::Unauthorized(_)));

    // admins can still correct descriptive fields
    let corrected = hana_service.edit_request(
        &hana_actor,
        submitted.id,
        &RequestPatch::new().set_description("Laptop with docking station"),
    )?;
    assert_eq!(corrected.description, "Laptop with docking station");
    assert_eq!(corrected.status, RequestStatus::Approved);

    Ok(())
}

#[test]
fn drafts_are_submitted_once() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let store = open_store(&temp_dir)?;
    let (service, ada_actor) = session(&store, &roster(), ada())?;

    let created = store.create_request(&NewRequest {
        title: "Training budget".into(),
        request_type: "Training".into(),
        description: "Conference ticket".into(),
        department: "Engineering".into(),
        requestor: ada(),
        manager: None,
    })?;
    // park it as a draft
    store.update_request(
        created.id,
        &RequestPatch {
            status: Some(RequestStatus::Draft),
            ..RequestPatch::new()
        },
    )?;

    let submitted = service.submit_draft(&ada_actor, created.id)?;
    assert_eq!(submitted.status, RequestStatus::Submitted);

    let err = service.submit_draft(&ada_actor, created.id).unwrap_err();
    assert!(matches!(err, RequestError::Transition(_)));

    Ok(())
}

#[test]
fn bulk_decision_continues_past_failures() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let store = open_store(&temp_dir)?;
    let directory = roster();

    let (service, ada_actor) = session(&store, &directory, ada())?;
    let first = service.submit_request(&ada_actor, laptop_draft("Laptop", "Engineering"))?;
    let second = service.submit_request(&ada_actor, laptop_draft("Monitor", "Engineering"))?;
    let third = service.submit_request(&ada_actor, laptop_draft("Keyboard", "Engineering"))?;

    let (service, hana_actor) = session(&store, &directory, hana())?;
    service.decide(&hana_actor, second.id, &Decision::approve())?;

    let missing = RequestId(9_999);
    let report = service.bulk_decide(
        &hana_actor,
        &[first.id, second.id, third.id, missing],
        &Decision::reject().with_comments("Freeze on purchases"),
    )?;

    assert!(!report.is_complete());
    assert_eq!(report.succeeded, vec![first.id, third.id]);
    assert_eq!(report.failed_ids(), vec![second.id, missing]);
    assert!(matches!(
        report.failed[0].error,
        RequestError::Transition(TransitionError::NotAllowed { .. })
    ));
    assert!(matches!(
        report.failed[1].error,
        RequestError::Gateway(GatewayError::NotFound(_))
    ));

    // the earlier approval is untouched
    let second = service.get_request(&hana_actor, second.id)?;
    assert_eq!(second.status, RequestStatus::Approved);
    let third = service.get_request(&hana_actor, third.id)?;
    assert_eq!(third.status, RequestStatus::Rejected);
    assert_eq!(third.approver_comments.as_deref(), Some("Freeze on purchases"));

    Ok(())
}

/// Delegates to a sled store but refuses updates to one request.
struct FlakyStore {
    inner: SledRequestStore,
    broken: RequestId,
}

impl RequestStore for FlakyStore {
    fn create_request(&self, new_request: &NewRequest) -> Result<Request, GatewayError> {
        self.inner.create_request(new_request)
    }
    fn get_requests(
        &self,
        filters: Option<&RequestFilters>,
        limit: Option<usize>,
    ) -> Result<Vec<Request>, GatewayError> {
        self.inner.get_requests(filters, limit)
    }
    fn get_request_by_id(&self, id: RequestId) -> Result<Request, GatewayError> {
        self.inner.get_request_by_id(id)
    }
    fn update_request(&self, id: RequestId, patch: &RequestPatch) -> Result<(), GatewayError> {
        if id == self.broken {
            return Err(anyhow::anyhow!("connection reset by peer").into());
        }
        self.inner.update_request(id, patch)
    }
    fn upload_attachment(
        &self,
        id: RequestId,
        file_name: &str,
        content: &[u8],
    ) -> Result<(), GatewayError> {
        self.inner.upload_attachment(id, file_name, content)
    }
    fn current_user(&self) -> Result<User, GatewayError> {
        self.inner.current_user()
    }
    fn is_current_user_in_admin_group(&self) -> Result<bool, GatewayError> {
        self.inner.is_current_user_in_admin_group()
    }
}

/// A directory that is always down.
struct OfflineDirectory;

impl Directory for OfflineDirectory {
    fn current_user_department(&self) -> Result<String, GatewayError> {
        Err(anyhow::anyhow!("directory unavailable").into())
    }
    fn all_departments(&self) -> Result<Vec<String>, GatewayError> {
        Err(anyhow::anyhow!("directory unavailable").into())
    }
    fn search_users(&self, _: &str, _: Option<&str>) -> Result<Vec<User>, GatewayError> {
        Err(anyhow::anyhow!("directory unavailable").into())
    }
}

#[test]
fn backend_failure_is_isolated_to_one_item() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let store = open_store(&temp_dir)?;

    let (service, ada_actor) = session(&store, &roster(), ada())?;
    let first = service.submit_request(&ada_actor, laptop_draft("Laptop", "Engineering"))?;
    let second = service.submit_request(&ada_actor, laptop_draft("Monitor", "Engineering"))?;
    let third = service.submit_request(&ada_actor, laptop_draft("Keyboard", "Engineering"))?;

    let flaky: Service<FlakyStore, OfflineDirectory> = RequestService::new(
        Arc::new(FlakyStore {
            inner: store.for_user(hana()),
            broken: second.id,
        }),
        Arc::new(OfflineDirectory),
        ServiceConfig::default(),
    );

    // the profile department is used when the directory is down
    let hana_actor = flaky.resolve_actor()?;
    assert!(hana_actor.is_hr_admin);
    assert_eq!(hana_actor.department(), Some("Human Resources"));
    assert!(flaky.departments().is_err());

    let report = flaky.bulk_decide(
        &hana_actor,
        &[first.id, second.id, third.id],
        &Decision::approve(),
    )?;

    assert_eq!(report.succeeded, vec![first.id, third.id]);
    assert_eq!(report.failed_ids(), vec![second.id]);
    assert!(matches!(
        report.failed[0].error,
        RequestError::Gateway(GatewayError::Backend(_))
    ));

    let second = store.get_request_by_id(second.id)?;
    assert_eq!(second.status, RequestStatus::Submitted);
    assert_eq!(second.approval_outcome, None);

    Ok(())
}

#[test]
fn boards_refresh_after_decisions() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let store = open_store(&temp_dir)?;
    let directory = roster();

    let (service, ada_actor) = session(&store, &directory, ada())?;
    let laptop = service.submit_request(&ada_actor, laptop_draft("Laptop", "Engineering"))?;
    service.submit_request(
        &ada_actor,
        laptop_draft("Course", "Engineering").set_request_type("Training"),
    )?;
    let (bob_service, bob_actor) = session(&store, &directory, bob())?;
    bob_service.submit_request(&bob_actor, laptop_draft("Calculator", "Finance"))?;

    let department = RequestBoard::load(&service, ada_actor.clone(), BoardKind::Department)?;
    assert_eq!(department.snapshot().len(), 2);
    assert_eq!(department.selection_summary(), "Showing 2 of 2 requests");

    let hidden = RequestBoard::load(&service, ada_actor, BoardKind::HrAdmin)?;
    assert!(hidden.snapshot().is_empty());

    let (service, hana_actor) = session(&store, &directory, hana())?;
    let mut admin = RequestBoard::load(&service, hana_actor, BoardKind::HrAdmin)?;
    assert_eq!(admin.snapshot().len(), 3);
    assert_eq!(admin.facets().departments, vec!["Engineering", "Finance"]);
    assert_eq!(admin.facets().request_types, vec!["Equipment", "Training"]);

    admin.set_filters(
        RequestFilters::new()
            .set_status(&[RequestStatus::Submitted])
            .set_request_type("Equipment"),
    );
    assert_eq!(admin.selection_summary(), "Showing 2 of 3 requests");

    admin.decide(&service, laptop.id, &Decision::approve())?;
    assert_eq!(admin.selection_summary(), "Showing 1 of 3 requests");

    let pending: Vec<RequestId> = admin.visible().iter().map(|r| r.id).collect();
    let report = admin.bulk_decide(&service, &pending, &Decision::reject())?;
    assert!(report.is_complete());
    assert!(admin.visible().is_empty());

    admin.clear_filters();
    assert_eq!(admin.visible().len(), 3);

    Ok(())
}

#[test]
fn admin_department_board_is_unrestricted() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let store = open_store(&temp_dir)?;
    let directory = roster();

    let (service, ada_actor) = session(&store, &directory, ada())?;
    service.submit_request(&ada_actor, laptop_draft("Laptop", "Engineering"))?;
    service.submit_request(&ada_actor, laptop_draft("Monitor", "Engineering"))?;
    let (bob_service, bob_actor) = session(&store, &directory, bob())?;
    bob_service.submit_request(&bob_actor, laptop_draft("Calculator", "Finance"))?;

    // hana's own department has no requests at all
    let (service, hana_actor) = session(&store, &directory, hana())?;
    assert_eq!(hana_actor.department(), Some("Human Resources"));

    let board = RequestBoard::load(&service, hana_actor, BoardKind::Department)?;
    assert_eq!(board.snapshot().len(), 3);
    assert_eq!(board.facets().departments, vec!["Engineering", "Finance"]);

    let bob_board = RequestBoard::load(&bob_service, bob_actor, BoardKind::Department)?;
    assert_eq!(bob_board.snapshot().len(), 1);

    Ok(())
}

/// Delegates to a sled store, but reads of decided requests fail.
struct StaleReadStore {
    inner: SledRequestStore,
}

impl RequestStore for StaleReadStore {
    fn create_request(&self, new_request: &NewRequest) -> Result<Request, GatewayError> {
        self.inner.create_request(new_request)
    }
    fn get_requests(
        &self,
        filters: Option<&RequestFilters>,
        limit: Option<usize>,
    ) -> Result<Vec<Request>, GatewayError> {
        self.inner.get_requests(filters, limit)
    }
    fn get_request_by_id(&self, id: RequestId) -> Result<Request, GatewayError> {
        let request = self.inner.get_request_by_id(id)?;
        if request.status.is_terminal() {
            return Err(anyhow::anyhow!("read timed out").into());
        }
        Ok(request)
    }
    fn update_request(&self, id: RequestId, patch: &RequestPatch) -> Result<(), GatewayError> {
        self.inner.update_request(id, patch)
    }
    fn upload_attachment(
        &self,
        id: RequestId,
        file_name: &str,
        content: &[u8],
    ) -> Result<(), GatewayError> {
        self.inner.upload_attachment(id, file_name, content)
    }
    fn current_user(&self) -> Result<User, GatewayError> {
        self.inner.current_user()
    }
    fn is_current_user_in_admin_group(&self) -> Result<bool, GatewayError> {
        self.inner.is_current_user_in_admin_group()
    }
}

#[test]
fn stored_bulk_decisions_count_as_succeeded() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let store = open_store(&temp_dir)?;

    let (service, ada_actor) = session(&store, &roster(), ada())?;
    let first = service.submit_request(&ada_actor, laptop_draft("Laptop", "Engineering"))?;
    let second = service.submit_request(&ada_actor, laptop_draft("Monitor", "Engineering"))?;
    let third = service.submit_request(&ada_actor, laptop_draft("Keyboard", "Engineering"))?;

    let stale = RequestService::new(
        Arc::new(StaleReadStore {
            inner: store.for_user(hana()),
        }),
        Arc::new(roster().for_user(&hana().email)),
        ServiceConfig::default(),
    );
    let hana_actor = stale.resolve_actor()?;

    let report = stale.bulk_decide(&hana_actor, &[first.id, second.id], &Decision::approve())?;
    assert!(report.is_complete());
    assert_eq!(report.succeeded, vec![first.id, second.id]);

    for id in [first.id, second.id] {
        let stored = store.get_request_by_id(id)?;
        assert_eq!(stored.status, RequestStatus::Approved);
        assert_eq!(stored.approval_outcome, Some(ApprovalOutcome::Approved));
    }

    // a single decision still surfaces the failed read, after writing
    let err = stale
        .decide(&hana_actor, third.id, &Decision::reject())
        .unwrap_err();
    assert!(matches!(err, RequestError::Gateway(GatewayError::Backend(_))));
    assert_eq!(store.get_request_by_id(third.id)?.status, RequestStatus::Rejected);

    Ok(())
}
