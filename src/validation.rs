//! Field and attachment constraints checked before a request is submitted
use super::attachment::extension_of;
use super::request::{RequestPatch, User};

pub const MAX_TITLE_CHARS: usize = 255;
pub const MAX_DESCRIPTION_CHARS: usize = 2000;

const ALLOWED_FILE_TYPES: [&str; 17] = [
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "rtf", "jpg", "jpeg", "png", "gif",
    "bmp", "zip", "rar", "7z",
];

/// A file picked for upload, before it is attached to anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// What an employee fills in on the request form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestDraft {
    pub title: String,
    pub request_type: String,
    pub description: String,
    pub department: String,
    pub manager: Option<User>,
    pub attachment: Option<FileUpload>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

impl FileUpload {
    pub fn new(name: &str, content_type: &str, content: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            content_type: content_type.to_string(),
            content,
        }
    }
    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
    /// Text after the last dot, lowercased. A name without a dot is its own
    /// extension.
    pub fn extension(&self) -> String {
        extension_of(&self.name)
    }
}

impl RequestDraft {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }
    pub fn set_request_type(mut self, request_type: &str) -> Self {
        self.request_type = request_type.to_string();
        self
    }
    pub fn set_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
    pub fn set_department(mut self, department: &str) -> Self {
        self.department = department.to_string();
        self
    }
    pub fn set_manager(mut self, manager: User) -> Self {
        self.manager = Some(manager);
        self
    }
    pub fn set_attachment(mut self, file: FileUpload) -> Self {
        self.attachment = Some(file);
        self
    }
}

pub fn allowed_file_types() -> &'static [&'static str] {
    &ALLOWED_FILE_TYPES
}

fn trimmed_len(value: &str) -> usize {
    value.trim().chars().count()
}

/// Collect every violated form constraint. Order: title, request type,
/// description, department, attachment.
pub fn validate_request_form(draft: &RequestDraft) -> ValidationResult {
    let mut errors = Vec::new();

    if trimmed_len(&draft.title) == 0 {
        errors.push("Title is required".to_string());
    } else if trimmed_len(&draft.title) > MAX_TITLE_CHARS {
        errors.push(format!("Title must be {MAX_TITLE_CHARS} characters or less"));
    }

    if trimmed_len(&draft.request_type) == 0 {
        errors.push("Request type is required".to_string());
    }

    if trimmed_len(&draft.description) == 0 {
        errors.push("Description is required".to_string());
    } else if trimmed_len(&draft.description) > MAX_DESCRIPTION_CHARS {
        errors.push(format!(
            "Description must be {MAX_DESCRIPTION_CHARS} characters or less"
        ));
    }

    if trimmed_len(&draft.department) == 0 {
        errors.push("Department is required".to_string());
    }

    if draft.attachment.is_none() {
        errors.push("Exactly one attachment is required".to_string());
    }

    ValidationResult::from_errors(errors)
}

// The extension must equal a token; the MIME type only has to contain one.
fn type_allowed(file: &FileUpload, allowed: &[&str]) -> bool {
    let extension = file.extension();
    let mime = file.content_type.to_lowercase();

    allowed.iter().any(|token| {
        let token = token.to_lowercase();
        extension == token || mime.contains(&token)
    })
}

fn type_error(allowed: &[&str]) -> String {
    format!("File type not allowed. Allowed types: {}", allowed.join(", "))
}

fn size_error(max_size_mb: u64) -> String {
    format!("File size must be {max_size_mb}MB or less")
}

fn exceeds(file: &FileUpload, max_size_mb: u64) -> bool {
    file.size() > max_size_mb.saturating_mul(1024 * 1024)
}

pub fn validate_single_file(file: Option<&FileUpload>, max_size_mb: u64) -> Vec<String> {
    let Some(file) = file else {
        return vec!["Please select a file to upload".to_string()];
    };
    let mut errors = Vec::new();

    if exceeds(file, max_size_mb) {
        errors.push(size_error(max_size_mb));
    }
    if !type_allowed(file, allowed_file_types()) {
        errors.push(type_error(allowed_file_types()));
    }

    errors
}

/// Size check plus an optional type allow-list; an empty list skips the type
/// check entirely.
pub fn validate_file(file: &FileUpload, max_size_mb: u64, allowed_types: &[&str]) -> ValidationResult {
    let mut errors = Vec::new();

    if exceeds(file, max_size_mb) {
        errors.push(size_error(max_size_mb));
    }
    if !allowed_types.is_empty() && !type_allowed(file, allowed_types) {
        errors.push(type_error(allowed_types));
    }

    ValidationResult::from_errors(errors)
}

/// Descriptive edits get the same limits as the form, applied only to the
/// fields being changed.
pub fn validate_patch(patch: &RequestPatch) -> ValidationResult {
    let mut errors = Vec::new();

    if let Some(title) = &patch.title {
        if trimmed_len(title) == 0 {
            errors.push("Title is required".to_string());
        } else if trimmed_len(title) > MAX_TITLE_CHARS {
            errors.push(format!("Title must be {MAX_TITLE_CHARS} characters or less"));
        }
    }
    if patch
        .request_type
        .as_deref()
        .is_some_and(|t| trimmed_len(t) == 0)
    {
        errors.push("Request type is required".to_string());
    }
    if let Some(description) = &patch.description {
        if trimmed_len(description) == 0 {
            errors.push("Description is required".to_string());
        } else if trimmed_len(description) > MAX_DESCRIPTION_CHARS {
            errors.push(format!(
                "Description must be {MAX_DESCRIPTION_CHARS} characters or less"
            ));
        }
    }
    if patch
        .department
        .as_deref()
        .is_some_and(|d| trimmed_len(d) == 0)
    {
        errors.push("Department is required".to_string());
    }
    if patch.touches_lifecycle() {
        errors.push("Status, outcome and comments can only change through a decision".to_string());
    }

    ValidationResult::from_errors(errors)
}
