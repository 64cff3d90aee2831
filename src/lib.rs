// AICoder: Multi-Agent Code Generation Pipeline
// Turns a natural-language request into generated, repaired, validated, and
// persisted source files by chaining LLM calls through role-specialized
// agents.

// Agent system - planner, coder, tester, enhancer, memory, toolbox
pub mod agents;

// Configuration loaded from config.json
pub mod config;

// LLM abstraction layer - gateway with fallback, providers, prompts
pub mod llm;

// Dependency manifests derived from the plan
pub mod manifest;

// Response splitting into named files
pub mod parser;

// Staged file persistence and the external build runner
pub mod persist;

// Heuristic source repair passes
pub mod repair;

// Workflow state model
pub mod state;

// Static validation of generated files
pub mod validator;

// Orchestrator state machine
pub mod workflow;

// Re-export the surface callers actually use
pub use agents::{AgentNode, Planner, Toolbox};
pub use config::{AppConfig, OutputFormat};
pub use llm::{LlmConfig, LlmGateway};
pub use parser::parse_response;
pub use persist::{BuildResult, BuildRunner};
pub use repair::RepairEngine;
pub use state::{WorkflowState, WorkflowStatus};
pub use validator::{validate, ValidationReport};
pub use workflow::{Orchestrator, WorkflowError};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Outcome of one full pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub success: bool,
    pub error: Option<String>,
    pub user_prompt: String,
    pub project_dir: Option<PathBuf>,
    pub generated_files: Vec<String>,
    pub validation: Option<ValidationReport>,
    pub build: Option<BuildResult>,
    pub build_after_fix: Option<BuildResult>,
}

impl WorkflowReport {
    fn failure(user_prompt: &str, error: String) -> Self {
        Self {
            success: false,
            error: Some(error),
            user_prompt: user_prompt.to_string(),
            ..Default::default()
        }
    }
}

/// The complete pipeline: workflow execution, extraction, repair, validation,
/// persistence, and the optional external build.
pub struct AiCoderWorkflow {
    config: AppConfig,
    gateway: LlmGateway,
}

impl AiCoderWorkflow {
    pub fn new(config: AppConfig) -> Self {
        let gateway = LlmGateway::from_env()
            .with_timeout(std::time::Duration::from_secs(config.llm_timeout_secs));
        Self { config, gateway }
    }

    pub fn with_gateway(config: AppConfig, gateway: LlmGateway) -> Self {
        Self { config, gateway }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run the workflow from prompt to saved files.
    pub async fn run_complete_workflow(&self, user_prompt: &str) -> WorkflowReport {
        log::info!("Starting complete AICoder workflow");
        log::info!("User prompt: {}", user_prompt);

        // Step 1: drive the agents to completion, by status routing or by the
        // configured linear sequence.
        let orchestrator = Orchestrator::new(&self.config);
        let initial = WorkflowState::new(user_prompt);
        let run = match self.config.workflow_type {
            config::WorkflowType::Conditional => orchestrator.run(initial, &self.gateway).await,
            config::WorkflowType::Simple => {
                orchestrator
                    .run_linear(initial, &self.gateway, &self.config.agents)
                    .await
            }
        };
        let state = match run {
            Ok(state) => state,
            Err(e) => return WorkflowReport::failure(user_prompt, e.to_string()),
        };

        let report = self.finish(user_prompt, state).await;
        log::info!("Complete workflow finished");
        report
    }

    /// Post-agent half of the pipeline: extract files from the completed
    /// state, write them back into it, gate them through the toolbox node,
    /// validate, persist, build.
    async fn finish(&self, user_prompt: &str, mut state: WorkflowState) -> WorkflowReport {
        // Step 2: extract the generated files and add the manifests the
        // format calls for.
        let Some(generated_code) = state.generated_code.clone() else {
            return WorkflowReport::failure(user_prompt, "No code was generated".to_string());
        };
        let mut files = parse_response(&generated_code, self.config.output_format);
        if files.is_empty() {
            return WorkflowReport::failure(user_prompt, "No code was generated".to_string());
        }
        manifest::add_manifests(&mut files, state.plan.as_ref(), self.config.output_format);

        // Step 3: repair. Only web projects get the TSX pass battery; module
        // formats are saved as produced.
        if self.config.output_format.is_web_project() {
            files = RepairEngine::repair_all(&files);
        }

        // Step 4: the toolbox node checks every path in the final file set
        // before anything touches disk. It reads `state.parsed_files`, so the
        // repaired set goes into the state first.
        state.parsed_files = files.clone();
        state = Toolbox.run(state, &self.gateway).await;
        if state.agent_status(state::AgentName::Toolbox) == Some("failed") {
            let detail = state
                .error
                .clone()
                .unwrap_or_else(|| "toolbox rejected the generated files".to_string());
            return WorkflowReport::failure(
                user_prompt,
                format!("Generated files failed safety checks: {}", detail),
            );
        }

        // Step 5: validate, then persist via the staging directory. The
        // project directory is resolved exactly once per run; module formats
        // mint a timestamped directory, so resolving it again would point the
        // report somewhere else than where the files went.
        let validation = validate(&files, self.config.output_format);
        state.validation = Some(validation.clone());

        let project_dir = self.config.project_dir();
        if let Err(e) = persist::save_files(&files, &project_dir) {
            return WorkflowReport::failure(user_prompt, format!("Failed to save files: {}", e));
        }
        if self.config.save_intermediate_results {
            self.save_state_snapshot(&state);
        }

        let mut report = WorkflowReport {
            success: true,
            error: None,
            user_prompt: user_prompt.to_string(),
            project_dir: Some(project_dir.clone()),
            generated_files: files.keys().cloned().collect(),
            validation: Some(validation),
            build: None,
            build_after_fix: None,
        };

        // Step 6: optional external build with one auto-fix retry.
        if self.config.run_build && self.config.output_format.is_web_project() {
            report = self.build_with_auto_fix(report, files, &project_dir).await;
        }

        report
    }

    /// Dump the final workflow state next to the output for inspection.
    /// Best-effort: a failed dump is logged, never fatal.
    fn save_state_snapshot(&self, state: &WorkflowState) {
        let path = self.config.output_dir.join("workflow_state.json");
        match serde_json::to_string_pretty(state) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&path, json) {
                    log::warn!("Failed to write {}: {}", path.display(), e);
                }
            }
            Err(e) => log::warn!("Failed to serialize workflow state: {}", e),
        }
    }

    async fn build_with_auto_fix(
        &self,
        mut report: WorkflowReport,
        mut files: BTreeMap<String, String>,
        project_dir: &std::path::Path,
    ) -> WorkflowReport {
        // The build runs at the site root, two levels above src/app.
        let build_dir = self.config.output_dir.clone();
        let runner = BuildRunner::new(&self.config);

        let result = runner.build(&build_dir).await;
        if result.success {
            report.build = Some(result);
            return report;
        }

        persist::auto_fix_build_errors(&mut files, &result.errors);
        report.build = Some(result);

        if let Err(e) = persist::save_files(&files, project_dir) {
            log::error!("Failed to save auto-fixed files: {}", e);
            return report;
        }
        report.generated_files = files.keys().cloned().collect();

        let retry = runner.build(&build_dir).await;
        if !retry.success {
            log::error!(
                "Website still has compilation errors after auto-fixes ({} error(s))",
                retry.errors.len()
            );
        }
        report.build_after_fix = Some(retry);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::planner::ProjectPlan;

    fn workflow_for(config: AppConfig) -> AiCoderWorkflow {
        let mut llm = llm::LlmConfig::openai();
        llm.api_key = None;
        AiCoderWorkflow::with_gateway(config, LlmGateway::new(llm, vec![]))
    }

    fn finished_state(prompt: &str, code: &str) -> WorkflowState {
        let mut state = WorkflowState::new(prompt);
        state.generated_code = Some(code.to_string());
        state
    }

    #[tokio::test]
    async fn traversal_filenames_fail_the_run_before_any_write() {
        let out = tempfile::TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.output_format = OutputFormat::Tsx;
        config.output_dir = out.path().join("site");
        config.run_build = false;

        let workflow = workflow_for(config);
        let blob = "// ../evil.tsx\nexport default function Evil() { return <div /> }";
        let report = workflow.finish("x", finished_state("x", blob)).await;

        assert!(!report.success);
        assert!(report.error.as_deref().unwrap().contains("safety checks"));
        assert!(!out.path().join("site").join("src").join("app").exists());
    }

    #[tokio::test]
    async fn report_names_the_directory_the_files_landed_in() {
        let out = tempfile::TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.output_format = OutputFormat::Python;
        config.output_dir = out.path().to_path_buf();
        config.run_build = false;

        let workflow = workflow_for(config);
        let mut state = finished_state("cli tool", "print('hi')");
        state.plan = Some(ProjectPlan {
            dependencies: vec!["- flask: web framework".to_string()],
            ..Default::default()
        });

        let report = workflow.finish("cli tool", state).await;

        assert!(report.success, "{:?}", report.error);
        let dir = report.project_dir.as_deref().unwrap();
        assert!(dir.join("main.py").exists());
        let requirements = std::fs::read_to_string(dir.join("requirements.txt")).unwrap();
        assert!(requirements.contains("flask"));
        assert!(out.path().join("workflow_state.json").exists());
    }
}
