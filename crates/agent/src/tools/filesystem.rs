//! Built-in file tools

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::path_utils::resolve_path;
use super::{parse_args, FailureReason, ToolOutcome, ToolTrait};

fn io_failure(path: &Path, e: std::io::Error) -> ToolOutcome {
    ToolOutcome::failure(FailureReason::Io, format!("{}: {}", path.display(), e))
}

/// Return the full contents of a file
pub struct ReadFileTool {
    root: PathBuf,
}

impl ReadFileTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ReadFileArgs {
    path: String,
}

#[async_trait]
impl ToolTrait for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }
    fn description(&self) -> &str {
        "Read a file and return its full contents as text."
    }
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "path": { "type": "string", "description": "File to read" } },
            "required": ["path"]
        })
    }
    async fn execute(&self, args: Value) -> ToolOutcome {
        let args: ReadFileArgs = match parse_args(self.name(), args) {
            Ok(args) => args,
            Err(outcome) => return outcome,
        };
        let path = resolve_path(&args.path, &self.root);

        debug!("Reading {:?}", path);
        if path.is_dir() {
            return ToolOutcome::failure(
                FailureReason::Io,
                format!("{} is a directory", path.display()),
            );
        }
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => ToolOutcome::success(content),
            Err(e) => io_failure(&path, e),
        }
    }
}

/// Overwrite or append to a file, creating parent directories
pub struct WriteFileTool {
    root: PathBuf,
}

impl WriteFileTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WriteFileArgs {
    path: String,
    text: String,
    #[serde(default)]
    append: bool,
}

async fn write_text(path: &Path, text: &str, append: bool) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    if append {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(text.as_bytes()).await?;
        file.flush().await
    } else {
        tokio::fs::write(path, text).await
    }
}

#[async_trait]
impl ToolTrait for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }
    fn description(&self) -> &str {
        "Write text to a file, replacing it unless append is true. Creates parent directories."
    }
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File to write" },
                "text": { "type": "string", "description": "Text to write" },
                "append": { "type": "boolean", "description": "Append instead of overwrite", "default": false }
            },
            "required": ["path", "text"]
        })
    }
    async fn execute(&self, args: Value) -> ToolOutcome {
        let args: WriteFileArgs = match parse_args(self.name(), args) {
            Ok(args) => args,
            Err(outcome) => return outcome,
        };
        let path = resolve_path(&args.path, &self.root);

        debug!("Writing {:?} (append: {})", path, args.append);
        match write_text(&path, &args.text, args.append).await {
            Ok(()) => ToolOutcome::success(format!(
                "{} {} bytes to {}",
                if args.append { "Appended" } else { "Wrote" },
                args.text.len(),
                args.path
            )),
            Err(e) => io_failure(&path, e),
        }
    }
}

/// Replace every literal occurrence of a string in a file
pub struct SearchAndReplaceTool {
    root: PathBuf,
}

impl SearchAndReplaceTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchAndReplaceArgs {
    path: String,
    search: String,
    replace: String,
}

#[async_trait]
impl ToolTrait for SearchAndReplaceTool {
    fn name(&self) -> &str {
        "search_and_replace"
    }
    fn description(&self) -> &str {
        "Replace all literal occurrences of search with replace in a file."
    }
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File to edit" },
                "search": { "type": "string", "description": "Exact text to find" },
                "replace": { "type": "string", "description": "Replacement text" }
            },
            "required": ["path", "search", "replace"]
        })
    }
    async fn execute(&self, args: Value) -> ToolOutcome {
        let args: SearchAndReplaceArgs = match parse_args(self.name(), args) {
            Ok(args) => args,
            Err(outcome) => return outcome,
        };
        if args.search.is_empty() {
            return ToolOutcome::failure(
                FailureReason::InvalidArguments,
                "search must not be empty",
            );
        }
        let path = resolve_path(&args.path, &self.root);

        debug!("Editing {:?}", path);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => return io_failure(&path, e),
        };
        let count = content.matches(&args.search).count();
        if count == 0 {
            return ToolOutcome::failure(
                FailureReason::SearchNotFound,
                format!("search text not found in {}", args.path),
            );
        }
        let updated = content.replace(&args.search, &args.replace);
        match tokio::fs::write(&path, updated).await {
            Ok(()) => ToolOutcome::success(format!(
                "Replaced {} occurrence{} in {}",
                count,
                if count == 1 { "" } else { "s" },
                args.path
            )),
            Err(e) => io_failure(&path, e),
        }
    }
}
