//! Embedded request store backed by sled
//!
//! Records live in one tree named after the configured list title:
//!
//! * `request/<id be bytes>` holds a CBOR encoded [`Request`]
//! * `blob/<sha256>` holds raw attachment bytes, addressed by digest
//! * `member/<group>/<email>` marks group membership
use super::attachment::{content_type_for, server_relative_url};
use super::config::ServiceConfig;
use super::error::GatewayError;
use super::filter::RequestFilters;
use super::gateway::RequestStore;
use super::request::{
    Attachment, NewRequest, Request, RequestId, RequestPatch, RequestStatus, TimeStamp, User,
};
use anyhow::Context;
use sled::{Batch, Db, Tree};
use std::sync::Arc;

const REQUEST_PREFIX: &[u8] = b"request/";
const BLOB_PREFIX: &[u8] = b"blob/";
const MEMBER_PREFIX: &[u8] = b"member/";

/// One session's view of the request list. The acting user is fixed for the
/// lifetime of the handle; use [`SledRequestStore::for_user`] to act as
/// someone else against the same database.
#[derive(Clone)]
pub struct SledRequestStore {
    instance: Arc<Db>,
    records: Tree,
    list_title: String,
    admin_group: String,
    current_user: User,
}

fn request_key(id: RequestId) -> Vec<u8> {
    [REQUEST_PREFIX, id.0.to_be_bytes().as_slice()].concat()
}

fn blob_key(digest: &str) -> Vec<u8> {
    [BLOB_PREFIX, digest.as_bytes()].concat()
}

fn member_key(group: &str, email: &str) -> Vec<u8> {
    [MEMBER_PREFIX, format!("{group}/{email}").as_bytes()].concat()
}

fn encode(request: &Request) -> anyhow::Result<Vec<u8>> {
    minicbor::to_vec(request).context("failed to encode request")
}

fn decode(bytes: &[u8]) -> anyhow::Result<Request> {
    minicbor::decode(bytes).context("failed to decode request")
}

impl SledRequestStore {
    pub fn open(
        instance: Arc<Db>,
        config: &ServiceConfig,
        current_user: User,
    ) -> anyhow::Result<Self> {
        let records = instance
            .open_tree(config.list_title.as_bytes())
            .with_context(|| format!("failed to open list '{}'", config.list_title))?;

        Ok(Self {
            instance,
            records,
            list_title: config.list_title.clone(),
            admin_group: config.admin_group.clone(),
            current_user,
        })
    }

    pub fn for_user(&self, user: User) -> Self {
        Self {
            current_user: user,
            ..self.clone()
        }
    }

    pub fn add_group_member(&self, group: &str, email: &str) -> anyhow::Result<()> {
        self.records
            .insert(member_key(group, email), Vec::<u8>::new())
            .context("failed to record group membership")?;
        Ok(())
    }

    /// Fetch stored attachment bytes and check them against their digest.
    pub fn read_attachment(&self, attachment: &Attachment) -> Result<Vec<u8>, GatewayError> {
        let bytes = self
            .records
            .get(blob_key(&attachment.digest))
            .context("failed to read attachment")?
            .with_context(|| format!("attachment {} has no stored content", attachment.file_name))?;

        if sha256::digest(&bytes[..]) != attachment.digest {
            return Err(GatewayError::Integrity {
                file_name: attachment.file_name.clone(),
            });
        }

        Ok(bytes.to_vec())
    }

    fn load(&self, id: RequestId) -> Result<Request, GatewayError> {
        let bytes = self
            .records
            .get(request_key(id))
            .context("failed to read request")?
            .ok_or(GatewayError::NotFound(id))?;

        Ok(decode(&bytes)?)
    }

    fn save(&self, request: &Request) -> Result<(), GatewayError> {
        self.records
            .insert(request_key(request.id), encode(request)?)
            .context("failed to write request")?;
        Ok(())
    }

    fn stamp(&self, request: &mut Request) {
        request.editor = self.current_user.clone();
        request.modified = TimeStamp::new();
    }
}

impl RequestStore for SledRequestStore {
    fn create_request(&self, new_request: &NewRequest) -> Result<Request, GatewayError> {
        let id = RequestId(
            self.instance
                .generate_id()
                .context("failed to allocate request id")?
                + 1,
        );
        let now = TimeStamp::new();

        let request = Request {
            id,
            title: new_request.title.clone(),
            request_type: new_request.request_type.clone(),
            description: new_request.description.clone(),
            department: new_request.department.clone(),
            requestor: new_request.requestor.clone(),
            manager: new_request.manager.clone(),
            status: RequestStatus::Submitted,
            approval_outcome: None,
            approver_comments: None,
            created: now.clone(),
            modified: now,
            author: self.current_user.clone(),
            editor: self.current_user.clone(),
            attachments: vec![],
        };
        self.save(&request)?;

        Ok(request)
    }

    fn get_requests(
        &self,
        filters: Option<&RequestFilters>,
        limit: Option<usize>,
    ) -> Result<Vec<Request>, GatewayError> {
        let mut requests = Vec::new();
        for entry in self.records.scan_prefix(REQUEST_PREFIX) {
            let (_, bytes) = entry.context("failed to scan requests")?;
            let request = decode(&bytes)?;
            if filters.is_none_or(|f| f.matches(&request)) {
                requests.push(request);
            }
        }

        requests.sort_by(|a, b| b.created.cmp(&a.created).then(b.id.cmp(&a.id)));
        if let Some(limit) = limit {
            requests.truncate(limit);
        }

        Ok(requests)
    }

    fn get_request_by_id(&self, id: RequestId) -> Result<Request, GatewayError> {
        self.load(id)
    }

    fn update_request(&self, id: RequestId, patch: &RequestPatch) -> Result<(), GatewayError> {
        let mut request = self.load(id)?;
        request.apply_patch(patch);
        self.stamp(&mut request);
        self.save(&request)
    }

    fn upload_attachment(
        &self,
        id: RequestId,
        file_name: &str,
        content: &[u8],
    ) -> Result<(), GatewayError> {
        let mut request = self.load(id)?;
        let digest = sha256::digest(content);

        request.attachments.push(Attachment {
            file_name: file_name.to_string(),
            server_relative_url: server_relative_url(&self.list_title, id, file_name),
            content_type: content_type_for(file_name).to_string(),
            length: content.len() as u64,
            digest: digest.clone(),
        });
        self.stamp(&mut request);

        // blob and record land together
        let mut batch = Batch::default();
        batch.insert(blob_key(&digest), content);
        batch.insert(request_key(id), encode(&request)?);
        self.records
            .apply_batch(batch)
            .context("failed to store attachment")?;

        Ok(())
    }

    fn current_user(&self) -> Result<User, GatewayError> {
        Ok(self.current_user.clone())
    }

    fn is_current_user_in_admin_group(&self) -> Result<bool, GatewayError> {
        let member = self
            .records
            .contains_key(member_key(&self.admin_group, &self.current_user.email))
            .context("failed to check admin group membership")?;
        Ok(member)
    }
}
