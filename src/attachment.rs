//! Helpers for presenting and storing request attachments
use super::request::RequestId;

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Broad category of a file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Word,
    Excel,
    PowerPoint,
    Text,
    Image,
    Archive,
    Document,
}

pub(crate) fn extension_of(file_name: &str) -> String {
    file_name
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

impl FileKind {
    pub fn from_file_name(file_name: &str) -> Self {
        match extension_of(file_name).as_str() {
            "pdf" => FileKind::Pdf,
            "doc" | "docx" => FileKind::Word,
            "xls" | "xlsx" => FileKind::Excel,
            "ppt" | "pptx" => FileKind::PowerPoint,
            "txt" => FileKind::Text,
            "jpg" | "jpeg" | "png" | "gif" | "bmp" => FileKind::Image,
            "zip" | "rar" | "7z" => FileKind::Archive,
            _ => FileKind::Document,
        }
    }
}

/// Human readable size, two decimals at most: `0 Bytes`, `1.5 KB`, `2 MB`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    while unit + 1 < SIZE_UNITS.len() && bytes >= 1024u64.pow(unit as u32 + 1) {
        unit += 1;
    }
    let scaled = bytes as f64 / 1024f64.powi(unit as i32);
    let rounded = (scaled * 100.0).round() / 100.0;

    format!("{} {}", rounded, SIZE_UNITS[unit])
}

/// MIME type recorded for a stored attachment.
pub fn content_type_for(file_name: &str) -> &'static str {
    match extension_of(file_name).as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "txt" => "text/plain",
        "rtf" => "application/rtf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "zip" => "application/zip",
        "rar" => "application/vnd.rar",
        "7z" => "application/x-7z-compressed",
        _ => "application/octet-stream",
    }
}

pub fn server_relative_url(list_title: &str, id: RequestId, file_name: &str) -> String {
    format!(
        "/Lists/{}/Attachments/{}/{}",
        list_title.replace(' ', "%20"),
        id,
        file_name
    )
}
