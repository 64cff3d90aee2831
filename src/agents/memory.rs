// AICoder: Memory Agent
// JSON-file store of past workflow runs. Each run saves a tagged, scored
// entry; retrieval ranks stored entries by keyword relevance and merges the
// best matches into the workflow context.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::AgentNode;
use crate::llm::LlmGateway;
use crate::state::{AgentName, WorkflowState};

const MEMORY_FILE: &str = "memory.json";
const MAX_ENTRIES: usize = 1000;
const MAX_RETRIEVED: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub timestamp: String,
    pub user_input: String,
    pub context: String,
    pub workflow_status: String,
    pub tags: Vec<String>,
    pub importance: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryData {
    pub memories: Vec<MemoryEntry>,
}

/// Load/save wrapper over the JSON store.
pub struct MemoryManager {
    storage_path: PathBuf,
}

impl MemoryManager {
    pub fn new(storage_path: &Path) -> Self {
        Self {
            storage_path: storage_path.to_path_buf(),
        }
    }

    fn file_path(&self) -> PathBuf {
        self.storage_path.join(MEMORY_FILE)
    }

    pub fn load(&self) -> MemoryData {
        match std::fs::read_to_string(self.file_path()) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => MemoryData::default(),
        }
    }

    pub fn save(&self, data: &MemoryData) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.storage_path)?;
        let raw = serde_json::to_string_pretty(data)?;
        std::fs::write(self.file_path(), raw)?;
        Ok(())
    }

    /// Append an entry for the current state, trimming the store to the most
    /// recent `MAX_ENTRIES`.
    pub fn store(&self, state: &WorkflowState) -> anyhow::Result<String> {
        let mut data = self.load();

        let entry = MemoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            user_input: state.user_input.clone(),
            context: state.context.clone(),
            workflow_status: state.status().as_str().to_string(),
            tags: extract_tags(state),
            importance: calculate_importance(state),
        };
        let id = entry.id.clone();

        data.memories.push(entry);
        if data.memories.len() > MAX_ENTRIES {
            let excess = data.memories.len() - MAX_ENTRIES;
            data.memories.drain(..excess);
        }
        self.save(&data)?;

        log::info!("Stored memory entry {}", id);
        Ok(id)
    }

    /// Relevance-ranked retrieval: keyword overlap weighted by stored
    /// importance; entries below a minimal overlap are dropped.
    pub fn retrieve_relevant(&self, query: &str) -> Vec<MemoryEntry> {
        let data = self.load();
        let mut scored: Vec<(f64, MemoryEntry)> = data
            .memories
            .into_iter()
            .filter_map(|entry| {
                let score = relevance(&entry, query);
                if score > 0.0 {
                    Some((score, entry))
                } else {
                    None
                }
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(MAX_RETRIEVED)
            .map(|(_, entry)| entry)
            .collect()
    }
}

fn relevance(entry: &MemoryEntry, query: &str) -> f64 {
    let query_words: HashSet<String> = query
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.to_string())
        .collect();
    if query_words.is_empty() {
        return 0.0;
    }

    let entry_text = format!("{} {}", entry.user_input, entry.tags.join(" ")).to_lowercase();
    let entry_words: HashSet<String> = entry_text
        .split_whitespace()
        .map(|w| w.to_string())
        .collect();

    let overlap = query_words.intersection(&entry_words).count() as f64 / query_words.len() as f64;
    overlap * (0.5 + entry.importance / 2.0)
}

/// Tags from recognized domain keywords plus the workflow status.
pub fn extract_tags(state: &WorkflowState) -> Vec<String> {
    let lower = state.user_input.to_lowercase();
    let mut tags: HashSet<String> = HashSet::new();

    if lower.contains("api") {
        tags.insert("api".to_string());
    }
    if lower.contains("database") {
        tags.insert("database".to_string());
    }
    if lower.contains("frontend") || lower.contains("ui") {
        tags.insert("frontend".to_string());
    }
    if lower.contains("backend") {
        tags.insert("backend".to_string());
    }
    if lower.contains("test") {
        tags.insert("testing".to_string());
    }
    tags.insert(state.status().as_str().to_string());

    let mut out: Vec<String> = tags.into_iter().collect();
    out.sort();
    out
}

/// Completed runs and failures both matter more than routine snapshots.
pub fn calculate_importance(state: &WorkflowState) -> f64 {
    let mut importance: f64 = 0.5;
    if state.status() == crate::state::WorkflowStatus::Completed {
        importance += 0.3;
    }
    if state.error.is_some() {
        importance += 0.2;
    }
    if state.user_input.len() > 100 {
        importance += 0.1;
    }
    importance.min(1.0)
}

/// Merge retrieved entries into the running context string.
pub fn merge_contexts(current: &str, retrieved: &[MemoryEntry]) -> String {
    if retrieved.is_empty() {
        return current.to_string();
    }

    let summaries: Vec<String> = retrieved
        .iter()
        .map(|e| format!("[{}] {}", e.tags.join(","), e.user_input))
        .collect();

    if current.is_empty() {
        format!("Relevant history:\n{}", summaries.join("\n"))
    } else {
        format!("{}\n\nRelevant history:\n{}", current, summaries.join("\n"))
    }
}

/// Memory node: stores the current run and folds relevant history into the
/// state's context.
pub struct MemoryAgent {
    storage_path: PathBuf,
}

impl Default for MemoryAgent {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("memory_storage"),
        }
    }
}

impl MemoryAgent {
    pub fn new(storage_path: &Path) -> Self {
        Self {
            storage_path: storage_path.to_path_buf(),
        }
    }
}

#[async_trait]
impl AgentNode for MemoryAgent {
    fn name(&self) -> AgentName {
        AgentName::Memory
    }

    async fn run(&self, state: WorkflowState, _gateway: &LlmGateway) -> WorkflowState {
        let mut state = state;
        let manager = MemoryManager::new(&self.storage_path);

        if let Err(e) = manager.store(&state) {
            state.record_agent_failure(AgentName::Memory, &format!("Error storing memory: {}", e));
            return state;
        }

        let retrieved = manager.retrieve_relevant(&state.user_input);
        state.context = merge_contexts(&state.context, &retrieved);

        let result = serde_json::json!({
            "memory_context": retrieved,
        });
        state.record_agent_result(AgentName::Memory, "completed", result);

        log::info!("Memory processing completed, {} entries retrieved", retrieved_len(&state));
        state
    }
}

fn retrieved_len(state: &WorkflowState) -> usize {
    state
        .agent_results
        .get("memory")
        .and_then(|v| v.get("memory_context"))
        .and_then(|v| v.as_array())
        .map(|a| a.len())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_and_retrieve_by_keyword() {
        let dir = tempfile::TempDir::new().unwrap();
        let manager = MemoryManager::new(dir.path());

        let mut state = WorkflowState::new("build a REST api for a bookstore");
        state.workflow_status = Some(crate::state::WorkflowStatus::Completed);
        manager.store(&state).unwrap();

        let other = WorkflowState::new("write a poem");
        manager.store(&other).unwrap();

        let hits = manager.retrieve_relevant("bookstore api design");
        assert_eq!(hits.len(), 1);
        assert!(hits[0].user_input.contains("bookstore"));
        assert!(hits[0].tags.contains(&"api".to_string()));
    }

    #[test]
    fn importance_rewards_completion_and_errors() {
        let mut state = WorkflowState::new("x");
        assert!((calculate_importance(&state) - 0.5).abs() < f64::EPSILON);

        state.workflow_status = Some(crate::state::WorkflowStatus::Completed);
        state.error = Some("boom".to_string());
        assert!((calculate_importance(&state) - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn node_merges_history_into_context() {
        let dir = tempfile::TempDir::new().unwrap();
        let manager = MemoryManager::new(dir.path());
        manager
            .store(&WorkflowState::new("build a landing page for a bakery"))
            .unwrap();

        let mut config = crate::llm::LlmConfig::openai();
        config.api_key = None;
        let gateway = LlmGateway::new(config, vec![]);

        let agent = MemoryAgent::new(dir.path());
        let out = agent
            .run(WorkflowState::new("build a landing page for a florist"), &gateway)
            .await;

        assert_eq!(out.agent_status(AgentName::Memory), Some("completed"));
        assert!(out.context.contains("Relevant history"));
        assert!(out.context.contains("bakery"));
    }
}
