//! Finds file descriptors inside arbitrary tool results.
//!
//! Any object carrying string `fileName` and `filePath` fields is a file.
//! The walk continues into that object's own fields, so a descriptor can
//! wrap further descriptors (e.g. a zip listing its generated files).

use std::path::Path;

use agentforge_core::FileDescriptor;
use serde_json::{Map, Value};

const DEFAULT_MIME: &str = "application/octet-stream";

/// Extension → MIME type for the file kinds tools are known to produce.
pub fn infer_mime_type(file_path: &str) -> &'static str {
    let ext = Path::new(file_path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        Some("pdf") => "application/pdf",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("csv") => "text/csv",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ics") => "text/calendar",
        _ => DEFAULT_MIME,
    }
}

/// Lazy depth-first walk over a value, yielding each file descriptor once.
pub struct FileDescriptors<'a> {
    stack: Vec<&'a Value>,
}

/// Walk `value` for file descriptors.
pub fn extract_files(value: &Value) -> FileDescriptors<'_> {
    FileDescriptors { stack: vec![value] }
}

/// Parse `raw` as JSON and collect its descriptors. Unparsable input yields nothing.
pub fn extract_files_from_str(raw: &str) -> Vec<FileDescriptor> {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => extract_files(&value).collect(),
        Err(_) => Vec::new(),
    }
}

impl<'a> Iterator for FileDescriptors<'a> {
    type Item = FileDescriptor;

    fn next(&mut self) -> Option<FileDescriptor> {
        while let Some(node) = self.stack.pop() {
            match node {
                Value::Object(map) => {
                    // Reverse so children are visited in map key order (sorted unless
                    // serde_json preserves insertion order).
                    self.stack.extend(map.values().rev());
                    if let Some(descriptor) = descriptor_from(map) {
                        return Some(descriptor);
                    }
                }
                Value::Array(items) => self.stack.extend(items.iter().rev()),
                _ => {}
            }
        }
        None
    }
}

fn descriptor_from(map: &Map<String, Value>) -> Option<FileDescriptor> {
    let file_name = map.get("fileName")?.as_str()?;
    let file_path = map.get("filePath")?.as_str()?;
    if file_name.trim().is_empty() || file_path.trim().is_empty() {
        return None;
    }

    let download_url = map
        .get("downloadUrl")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(String::from);

    let size_bytes = map
        .get("sizeBytes")
        .and_then(|v| {
            v.as_u64()
                .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
        })
        .unwrap_or(0);

    let mime_type = map
        .get("mimeType")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(String::from)
        .unwrap_or_else(|| infer_mime_type(file_path).to_string());

    Some(FileDescriptor {
        file_name: file_name.to_string(),
        file_path: file_path.to_string(),
        download_url,
        mime_type,
        size_bytes,
    })
}
