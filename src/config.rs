// AICoder: Configuration
// config.json in the working directory, field-by-field defaults when absent

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Output format for generated projects. Web mode targets a Next.js app
/// directory with fixed required files; the module modes emit a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Python,
    Typescript,
    Tsx,
}

impl OutputFormat {
    /// Default filename when an LLM response contains no file markers.
    pub fn default_filename(&self) -> &'static str {
        match self {
            OutputFormat::Python => "main.py",
            OutputFormat::Typescript => "index.ts",
            OutputFormat::Tsx => "page.tsx",
        }
    }

    /// Required top-level files for this format, if any.
    pub fn required_files(&self) -> &'static [&'static str] {
        match self {
            OutputFormat::Tsx => &["page.tsx", "layout.tsx", "globals.css"],
            _ => &[],
        }
    }

    pub fn is_web_project(&self) -> bool {
        matches!(self, OutputFormat::Tsx)
    }
}

/// Routing style for the workflow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowType {
    /// Fixed linear agent sequence.
    Simple,
    /// Status-driven routing through the orchestrator.
    #[default]
    Conditional,
}

/// Application configuration, loaded from `config.json` next to the binary's
/// working directory. Missing fields fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub workflow_type: WorkflowType,
    pub output_format: OutputFormat,
    pub agents: Vec<String>,
    pub output_dir: PathBuf,
    /// Per-state retry cap for the orchestrator loop.
    pub max_retries: u32,
    /// Timeout for each outbound LLM call, in seconds.
    pub llm_timeout_secs: u64,
    /// Timeout for the external build subprocess, in seconds.
    pub build_timeout_secs: u64,
    /// Run `npm run build` after persisting a web project.
    pub run_build: bool,
    pub save_intermediate_results: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workflow_type: WorkflowType::Conditional,
            output_format: OutputFormat::Python,
            agents: vec![
                "planner".to_string(),
                "coder".to_string(),
                "tester".to_string(),
            ],
            output_dir: PathBuf::from("generated_code"),
            max_retries: 3,
            llm_timeout_secs: 30,
            build_timeout_secs: 120,
            run_build: false,
            save_intermediate_results: true,
        }
    }
}

impl AppConfig {
    /// Load from `config.json`, merging over defaults. A missing or unreadable
    /// file yields the defaults; a malformed file is reported as a warning
    /// rather than an error, matching the lenient loading of the original CLI.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<AppConfig>(&raw) {
                Ok(config) => {
                    log::info!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    AppConfig::default()
                }
            },
            Err(_) => {
                log::info!("No {} found, using default configuration", path.display());
                AppConfig::default()
            }
        }
    }

    /// Resolved output directory for this run. Web projects write into the
    /// app directory of the target site; other formats get a timestamped
    /// project directory under `output_dir`.
    pub fn project_dir(&self) -> PathBuf {
        if self.output_format.is_web_project() {
            self.output_dir.join("src").join("app")
        } else {
            let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
            self.output_dir.join(format!("project_{}", stamp))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_for_missing_fields() {
        let config: AppConfig =
            serde_json::from_str(r#"{"output_format": "tsx", "max_retries": 5}"#).unwrap();
        assert_eq!(config.output_format, OutputFormat::Tsx);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.workflow_type, WorkflowType::Conditional);
        assert_eq!(config.llm_timeout_secs, 30);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = AppConfig::load(Path::new("definitely/not/here/config.json"));
        assert_eq!(config.output_format, OutputFormat::Python);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn required_files_only_for_web_projects() {
        assert_eq!(
            OutputFormat::Tsx.required_files(),
            &["page.tsx", "layout.tsx", "globals.css"]
        );
        assert!(OutputFormat::Python.required_files().is_empty());
        assert_eq!(OutputFormat::Typescript.default_filename(), "index.ts");
    }
}
