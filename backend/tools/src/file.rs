use std::path::Path;

use agentforge_core::{CancellationToken, Tool};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::fs;
use tracing::info;

use crate::artifacts::infer_mime_type;

fn path_arg(args: &Value) -> anyhow::Result<&str> {
    let path_str = args["path"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("Missing 'path' argument"))?;

    // Basic safety check: ensure path doesn't contain ".."
    if path_str.contains("..") {
        return Err(anyhow::anyhow!("Security violation: Path cannot contain '..'"));
    }
    Ok(path_str)
}

pub struct FileReadTool;

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read the contents of a text file at the given path."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to read"
                }
            },
            "required": ["path"]
        })
    }

    async fn invoke(&self, args: Value, _cancel: CancellationToken) -> anyhow::Result<Value> {
        let path_str = path_arg(&args)?;
        let content = fs::read_to_string(path_str).await?;
        Ok(json!({ "path": path_str, "content": content }))
    }
}

/// Writes a file and reports it as a file descriptor, so the run tracks it
/// as an artifact.
pub struct FileWriteTool;

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write content to a file. Overwrites if exists."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to write"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn invoke(&self, args: Value, _cancel: CancellationToken) -> anyhow::Result<Value> {
        let path_str = path_arg(&args)?;
        let content = args["content"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'content' argument"))?;

        let path = Path::new(path_str);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, content).await?;
        info!(path = %path_str, bytes = content.len(), "Wrote file");

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path_str.to_string());

        Ok(json!({
            "success": true,
            "fileName": file_name,
            "filePath": path_str,
            "sizeBytes": content.len(),
            "mimeType": infer_mime_type(path_str),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::extract_files;

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes").join("todo.md");
        let path_str = path.to_string_lossy().to_string();

        let written = FileWriteTool
            .invoke(
                json!({"path": path_str, "content": "- ship it"}),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(written["success"], true);
        assert_eq!(written["fileName"], "todo.md");
        assert_eq!(written["sizeBytes"], 9);

        let files: Vec<_> = extract_files(&written).collect();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].mime_type, "text/markdown");

        let read = FileReadTool
            .invoke(json!({"path": path_str}), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(read["content"], "- ship it");
    }

    #[tokio::test]
    async fn test_rejects_parent_traversal_and_missing_args() {
        let err = FileReadTool
            .invoke(json!({"path": "../etc/passwd"}), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Security violation"));

        let err = FileWriteTool
            .invoke(json!({"path": "x.txt"}), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("content"));
    }
}
