// AICoder: Toolbox Agent
// File-system utilities shared with persistence: filename sanitization, path
// traversal validation, and content fingerprinting. The agent node exposes
// these as recorded tool results.

use async_trait::async_trait;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};

use super::AgentNode;
use crate::llm::LlmGateway;
use crate::state::{AgentName, WorkflowState};

const DANGEROUS_CHARS: [char; 9] = ['<', '>', ':', '"', '|', '?', '*', '\\', '/'];
const MAX_FILENAME_LEN: usize = 255;

/// Replace characters unsafe in filenames and cap the length.
pub fn sanitize_filename(filename: &str) -> String {
    let mut sanitized: String = filename
        .chars()
        .map(|c| if DANGEROUS_CHARS.contains(&c) { '_' } else { c })
        .collect();
    sanitized.truncate(MAX_FILENAME_LEN);
    sanitized
}

/// Validate that a generated filename stays inside the project directory:
/// relative, no parent or root components, no home expansion.
pub fn validate_relative_path(path: &str) -> anyhow::Result<PathBuf> {
    if path.is_empty() {
        anyhow::bail!("Empty file path");
    }
    if path.starts_with('~') {
        anyhow::bail!("Home-relative path not allowed: {}", path);
    }

    let candidate = Path::new(path);
    for component in candidate.components() {
        match component {
            Component::Normal(_) => {}
            Component::CurDir => {}
            _ => anyhow::bail!("Unsafe file path: {}", path),
        }
    }

    Ok(candidate.to_path_buf())
}

/// Stable content fingerprint used to detect unchanged files.
pub fn file_hash(content: &str) -> String {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    content.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

pub struct Toolbox;

#[async_trait]
impl AgentNode for Toolbox {
    fn name(&self) -> AgentName {
        AgentName::Toolbox
    }

    async fn run(&self, state: WorkflowState, _gateway: &LlmGateway) -> WorkflowState {
        let mut state = state;

        // Validate every parsed filename and fingerprint the contents.
        let mut validated = Vec::new();
        let mut rejected = Vec::new();
        for (filename, content) in &state.parsed_files {
            match validate_relative_path(filename) {
                Ok(_) => validated.push(serde_json::json!({
                    "file": filename,
                    "hash": file_hash(content),
                })),
                Err(e) => rejected.push(format!("{}", e)),
            }
        }

        if rejected.is_empty() {
            let result = serde_json::json!({
                "tool_result": { "validated_files": validated },
            });
            state.record_agent_result(AgentName::Toolbox, "completed", result);
        } else {
            state.record_agent_failure(AgentName::Toolbox, &rejected.join("; "));
        }

        state
    }
}
